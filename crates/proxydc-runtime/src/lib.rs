//! Runtime Adapter — a thin typed wrapper over the container runtime CLI
//! (§4.A): list, inspect, exec, and compose lifecycle commands.

mod cli_adapter;
pub mod command_runner;
mod error;
pub mod format;
mod types;

pub use cli_adapter::CliRuntimeAdapter;
pub use command_runner::{CommandOutput, CommandRunner, ProcessCommandRunner};
pub use error::*;
pub use types::*;

use async_trait::async_trait;
use std::path::Path;
use tokio_util::sync::CancellationToken;

/// Operations every container runtime (docker, podman) must support.
/// Every method takes a cancellation token and is honoured at the
/// subprocess boundary (§5).
#[async_trait]
pub trait RuntimeAdapter: Send + Sync {
    fn kind(&self) -> RuntimeKind;

    /// `ps -a --filter label=<managed-by-us>=true --format json`.
    async fn list_containers(&self, cancel: &CancellationToken) -> Result<Vec<ListedRecord>>;

    async fn start(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()>;
    async fn stop(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()>;
    async fn remove(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()>;

    async fn exec(
        &self,
        id: &ContainerId,
        cmd: &[String],
        cancel: &CancellationToken,
    ) -> Result<String>;

    async fn exec_as(
        &self,
        id: &ContainerId,
        user: &str,
        cmd: &[String],
        cancel: &CancellationToken,
    ) -> Result<String>;

    async fn inspect(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<InspectInfo>;

    async fn compose_up(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn compose_start(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn compose_stop(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;

    async fn compose_down(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()>;
}
