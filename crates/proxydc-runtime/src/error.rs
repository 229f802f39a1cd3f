//! Error types for the Runtime Adapter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("container runtime unavailable: {0}")]
    RuntimeUnavailable(String),

    #[error("container not found: {0}")]
    ContainerNotFound(String),

    #[error("malformed output from runtime CLI: {0}")]
    MalformedOutput(String),

    #[error("exec failed: {0}")]
    ExecFailed(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,
}

pub type Result<T> = std::result::Result<T, ProviderError>;
