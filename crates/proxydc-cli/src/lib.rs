//! Library half of the `proxydc` binary: argument parsing, error type, and
//! the command dispatch table. Kept separate from `main.rs` so the
//! `assert_cmd` integration tests can also build a `Manager` with fakes
//! wired in through `proxydc-core`'s `test-support` feature.

mod cli;
mod commands;

pub use cli::{Cli, Commands, SessionCommand};
pub use commands::dispatch;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] proxydc_config::ConfigError),

    #[error(transparent)]
    Core(#[from] proxydc_core::CoreError),

    #[error("{0}")]
    Usage(String),
}

pub type Result<T> = std::result::Result<T, CliError>;
