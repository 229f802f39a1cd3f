//! Manager (§4.G): the orchestrator. Owns the in-memory container and
//! sidecar maps, reconciles them from the Runtime Adapter, and drives
//! create/start/stop/destroy via the adapter and the external devcontainer
//! CLI.

mod create;
mod lifecycle;
mod reconcile;
mod sessions;

pub use create::CreateOptions;

use crate::model::{Container, Sidecar};
use crate::{CoreError, ProxyArtifactStore, Result, TemplateRenderer};
use proxydc_config::GlobalConfig;
use proxydc_runtime::command_runner::{CommandRunner, ProcessCommandRunner};
use proxydc_runtime::{ContainerId, RuntimeAdapter};
use std::collections::HashMap;
use std::sync::Mutex as StdMutex;
use tokio::sync::{mpsc, RwLock};
use tokio_util::sync::CancellationToken;

/// Both maps share one lock (§3 invariant): every read takes the shared
/// lock, every mutation the exclusive lock, and Refresh replaces both
/// atomically.
#[derive(Default)]
pub(super) struct State {
    containers: HashMap<ContainerId, Container>,
    sidecars: HashMap<ContainerId, Sidecar>,
}

pub struct Manager {
    pub(super) adapter: Box<dyn RuntimeAdapter>,
    /// Runs the external devcontainer CLI; a thin reuse of the same
    /// injectable-executor seam the Runtime Adapter uses for its own
    /// subprocess boundary.
    pub(super) devcontainer_runner: Box<dyn CommandRunner>,
    pub(super) renderer: TemplateRenderer,
    pub(super) proxy_store: ProxyArtifactStore,
    pub(super) config: GlobalConfig,
    state: RwLock<State>,
    /// Cancellation handle for each Container's running Proxy Log Reader.
    pub(super) proxy_log_cancels: RwLock<HashMap<ContainerId, CancellationToken>>,
    change_tx: StdMutex<Option<mpsc::UnboundedSender<()>>>,
}

impl Manager {
    pub fn new(
        adapter: Box<dyn RuntimeAdapter>,
        renderer: TemplateRenderer,
        proxy_store: ProxyArtifactStore,
        config: GlobalConfig,
    ) -> Self {
        Self {
            adapter,
            devcontainer_runner: Box::new(ProcessCommandRunner),
            renderer,
            proxy_store,
            config,
            state: RwLock::new(State::default()),
            proxy_log_cancels: RwLock::new(HashMap::new()),
            change_tx: StdMutex::new(None),
        }
    }

    /// Construct with an injected devcontainer-CLI executor, for tests.
    #[cfg(any(test, feature = "test-support"))]
    pub fn new_for_testing(
        adapter: Box<dyn RuntimeAdapter>,
        devcontainer_runner: Box<dyn CommandRunner>,
        renderer: TemplateRenderer,
        proxy_store: ProxyArtifactStore,
        config: GlobalConfig,
    ) -> Self {
        Self {
            adapter,
            devcontainer_runner,
            renderer,
            proxy_store,
            config,
            state: RwLock::new(State::default()),
            proxy_log_cancels: RwLock::new(HashMap::new()),
            change_tx: StdMutex::new(None),
        }
    }

    /// Registers the state-change callback. Single-shot: call before
    /// concurrent use begins. The callback runs on a dedicated task fed by
    /// a queue, so it is never invoked while the Manager holds its lock and
    /// is free to call back into the Manager (§5).
    pub fn set_on_change<F>(&self, callback: F)
    where
        F: Fn() + Send + 'static,
    {
        let (tx, mut rx) = mpsc::unbounded_channel::<()>();
        *self.change_tx.lock().unwrap() = Some(tx);
        tokio::spawn(async move {
            while rx.recv().await.is_some() {
                callback();
            }
        });
    }

    pub(super) fn notify_change(&self) {
        if let Some(tx) = self.change_tx.lock().unwrap().as_ref() {
            let _ = tx.send(());
        }
    }

    /// All currently known Containers.
    pub async fn list(&self) -> Vec<Container> {
        self.state.read().await.containers.values().cloned().collect()
    }

    pub(super) async fn state_read(&self) -> tokio::sync::RwLockReadGuard<'_, State> {
        self.state.read().await
    }

    pub(super) async fn state_write(&self) -> tokio::sync::RwLockWriteGuard<'_, State> {
        self.state.write().await
    }

    pub(super) fn lookup_by_id_or_prefix<'a>(
        state: &'a State,
        id: &ContainerId,
    ) -> Option<&'a Container> {
        state
            .containers
            .get(id)
            .or_else(|| state.containers.values().find(|c| c.id.is_prefix_of(id)))
    }

    async fn require_container(&self, id: &ContainerId) -> Result<Container> {
        let state = self.state.read().await;
        Self::lookup_by_id_or_prefix(&state, id)
            .cloned()
            .ok_or_else(|| CoreError::ContainerNotFound(id.to_string()))
    }
}
