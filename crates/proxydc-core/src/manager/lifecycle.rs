//! Start / Stop / Destroy and the read-only diagnostic helpers (§4.G).
//!
//! Start and Stop are idempotent at the Manager boundary: stopping an
//! already-stopped Container returns success; destroying a not-found
//! Container returns `ContainerNotFound`.

use super::Manager;
use crate::model::{ContainerState, IsolationInfo, Sidecar};
use crate::Result;
use proxydc_runtime::{format, ContainerId};
use tokio_util::sync::CancellationToken;

impl Manager {
    pub async fn start(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        let container = self.require_container(id).await?;
        if container.state == ContainerState::Running {
            return Ok(());
        }
        self.adapter
            .compose_start(&container.project_path, &compose_project_name(&container), cancel)
            .await?;
        self.refresh(cancel).await?;
        Ok(())
    }

    pub async fn stop(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        let container = self.require_container(id).await?;
        if container.state == ContainerState::Stopped {
            return Ok(());
        }
        self.adapter
            .compose_stop(&container.project_path, &compose_project_name(&container), cancel)
            .await?;
        self.refresh(cancel).await?;
        Ok(())
    }

    /// On success, cancels the Container's Proxy Log Reader and removes its
    /// proxy artifacts. Idempotent: a second Destroy on the same ID returns
    /// `ContainerNotFound`.
    pub async fn destroy(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        let container = self.require_container(id).await?;

        self.adapter
            .compose_down(&container.project_path, &compose_project_name(&container), cancel)
            .await?;

        if let Some(handle) = self.proxy_log_cancels.write().await.remove(id) {
            handle.cancel();
        }
        self.proxy_store.cleanup_proxy_configs(&container.project_path)?;

        // refresh() already fires onChange; no separate notify needed here.
        self.refresh(cancel).await?;
        Ok(())
    }

    pub async fn get_container_isolation_info(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<IsolationInfo> {
        let info = self.adapter.inspect(id, cancel).await?;
        let (network_name, container_ip, gateway_ip) = info
            .networks
            .iter()
            .next()
            .map(|(name, entry)| (Some(name.clone()), entry.ip_address.clone(), entry.gateway.clone()))
            .unwrap_or((None, None, None));

        Ok(IsolationInfo {
            cap_drop: info.cap_drop,
            cap_add: info.cap_add,
            memory_limit: format::format_bytes(info.memory_bytes),
            cpu_limit: format::format_nano_cpus(info.nano_cpus),
            pids_limit: info.pids_limit,
            non_default_network: !info.networks.is_empty(),
            network_name,
            container_ip,
            gateway_ip,
            proxy_address: info
                .env
                .iter()
                .find_map(|kv| kv.strip_prefix("HTTP_PROXY=").map(str::to_string)),
        })
    }

    pub async fn get_sidecars_for_project(&self, project_ref: &str) -> Vec<Sidecar> {
        self.state_read()
            .await
            .sidecars
            .values()
            .filter(|s| s.parent_ref == project_ref)
            .cloned()
            .collect()
    }
}

pub(super) fn compose_project_name(container: &crate::model::Container) -> String {
    container
        .labels
        .get(proxydc_config::labels::COMPOSE_PROJECT)
        .cloned()
        .unwrap_or_else(|| container.name.clone())
}
