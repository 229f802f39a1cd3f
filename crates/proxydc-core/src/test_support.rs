//! Test-only constructors wiring a [`Manager`] to [`FakeCommandRunner`]s,
//! mirroring the teacher's `new_for_testing` pattern one layer up: the
//! Runtime Adapter here is the real `CliRuntimeAdapter`, just pointed at a
//! scripted executor instead of a real `docker`/`podman` binary.

use crate::manager::Manager;
use crate::{ProxyArtifactStore, TemplateRenderer};
use async_trait::async_trait;
use proxydc_config::GlobalConfig;
use proxydc_runtime::command_runner::{CommandOutput, CommandRunner, FakeCommandRunner};
use proxydc_runtime::{CliRuntimeAdapter, Result as RuntimeResult, RuntimeKind};
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Adapts a shared `Arc<FakeCommandRunner>` to the boxed `CommandRunner`
/// trait object both `CliRuntimeAdapter` and `Manager` expect, so the same
/// fake can be scripted before the adapter or Manager is constructed.
pub struct ArcCommandRunner(pub Arc<FakeCommandRunner>);

#[async_trait]
impl CommandRunner for ArcCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> RuntimeResult<CommandOutput> {
        self.0.run(program, args, cwd, cancel).await
    }
}

/// A Manager wired to fakes, holding the temp dirs alive for its lifetime.
pub struct TestManager {
    pub manager: Manager,
    _data_dir: TempDir,
    _templates_dir: Option<TempDir>,
}

impl std::ops::Deref for TestManager {
    type Target = Manager;
    fn deref(&self) -> &Manager {
        &self.manager
    }
}

/// Build a Manager backed by `adapter_runner` (scripts the Runtime Adapter's
/// `docker`/`podman` subprocess calls) and `devcontainer_runner` (scripts
/// the external `devcontainer` CLI), with an empty template directory.
pub fn test_manager(
    kind: RuntimeKind,
    adapter_runner: Arc<FakeCommandRunner>,
    devcontainer_runner: Arc<FakeCommandRunner>,
) -> Manager {
    let data_dir = TempDir::new().unwrap();
    let templates_dir = TempDir::new().unwrap();
    build_manager(kind, adapter_runner, devcontainer_runner, templates_dir.path(), data_dir.path())
}

/// Same as [`test_manager`] but pointed at a caller-supplied template
/// directory (for Create tests that need real `.tmpl` files on disk).
pub fn test_manager_with_template_dir(
    kind: RuntimeKind,
    adapter_runner: Arc<FakeCommandRunner>,
    devcontainer_runner: Arc<FakeCommandRunner>,
    templates_dir: &Path,
) -> Manager {
    let data_dir = TempDir::new().unwrap();
    build_manager(kind, adapter_runner, devcontainer_runner, templates_dir, data_dir.path())
}

fn build_manager(
    kind: RuntimeKind,
    adapter_runner: Arc<FakeCommandRunner>,
    devcontainer_runner: Arc<FakeCommandRunner>,
    templates_dir: &Path,
    data_dir: &Path,
) -> Manager {
    let adapter = CliRuntimeAdapter::with_runner(kind, Box::new(ArcCommandRunner(adapter_runner)));
    let renderer = TemplateRenderer::new(templates_dir);
    let proxy_store = ProxyArtifactStore::new(data_dir);
    let config = GlobalConfig::default();

    Manager::new_for_testing(
        Box::new(adapter),
        Box::new(ArcCommandRunner(devcontainer_runner)),
        renderer,
        proxy_store,
        config,
    )
}
