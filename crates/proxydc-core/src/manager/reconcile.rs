//! Refresh (§4.G): reconcile the in-memory maps from a single
//! `ListContainers` call.

use super::{Manager, State};
use crate::model::{Container, ContainerState, Sidecar};
use crate::Result;
use chrono::Utc;
use proxydc_config::labels;
use proxydc_runtime::ListedRecord;
use tokio_util::sync::CancellationToken;

impl Manager {
    /// Partitions the runtime's listing into Containers (records lacking
    /// the sidecar-type label) and Sidecars (records carrying it), then
    /// rebuilds both maps atomically under the exclusive lock.
    pub async fn refresh(&self, cancel: &CancellationToken) -> Result<()> {
        let records = self.adapter.list_containers(cancel).await?;
        let mut next = State::default();

        for record in records {
            if record.labels.contains_key(labels::SIDECAR_TYPE) {
                next.sidecars.insert(record.id.clone(), sidecar_from_record(&record));
            } else {
                next.containers.insert(record.id.clone(), container_from_record(&record));
            }
        }

        let mut state = self.state_write().await;
        *state = next;
        drop(state);

        self.notify_change();
        Ok(())
    }
}

fn container_from_record(record: &ListedRecord) -> Container {
    Container {
        id: record.id.clone(),
        name: record.name.clone(),
        project_path: record
            .labels
            .get(labels::PROJECT_PATH)
            .map(Into::into)
            .unwrap_or_default(),
        template: record
            .labels
            .get(labels::TEMPLATE)
            .cloned()
            .unwrap_or_default(),
        state: ContainerState::from(record.state),
        created_at: Utc::now(),
        labels: record.labels.clone(),
        remote_user: record
            .labels
            .get(labels::REMOTE_USER)
            .cloned()
            .unwrap_or_else(|| "vscode".to_string()),
        sessions: Vec::new(),
    }
}

fn sidecar_from_record(record: &ListedRecord) -> Sidecar {
    Sidecar {
        id: record.id.clone(),
        name: record.name.clone(),
        sidecar_type: record
            .labels
            .get(labels::SIDECAR_TYPE)
            .cloned()
            .unwrap_or_default(),
        parent_ref: record
            .labels
            .get(labels::COMPOSE_PROJECT)
            .cloned()
            .unwrap_or_default(),
        state: ContainerState::from(record.state),
        network_name: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manager::CreateOptions;
    use crate::test_support::test_manager;
    use proxydc_runtime::command_runner::{CommandOutput, FakeCommandRunner};
    use proxydc_runtime::RuntimeKind;
    use std::sync::Arc;

    #[tokio::test]
    async fn partitions_containers_and_sidecars_by_sidecar_type_label() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.script(
            "ps",
            CommandOutput {
                success: true,
                stdout: concat!(
                    r#"{"ID":"c1","Names":"p-1","State":"running","Labels":"io.proxydc.managed=true,com.docker.compose.project=p-1"}"#,
                    "\n",
                    r#"{"ID":"s1","Names":"p-1-proxy","State":"running","Labels":"io.proxydc.managed=true,io.proxydc.sidecar_type=proxy,com.docker.compose.project=p-1"}"#,
                    "\n"
                )
                .to_string(),
                stderr: String::new(),
            },
        );
        let manager = test_manager(RuntimeKind::Docker, runner, Arc::new(FakeCommandRunner::new()));

        manager.refresh(&CancellationToken::new()).await.unwrap();

        let containers = manager.list().await;
        assert_eq!(containers.len(), 1);
        assert_eq!(containers[0].name, "p-1");

        let sidecars = manager.get_sidecars_for_project("p-1").await;
        assert_eq!(sidecars.len(), 1);
        assert_eq!(sidecars[0].parent_ref, "p-1");
        let _ = CreateOptions {
            project_path: std::path::PathBuf::new(),
            template: String::new(),
            name: String::new(),
        };
    }

    #[tokio::test]
    async fn refresh_replaces_maps_atomically_dropping_stale_entries() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.script(
            "ps",
            CommandOutput {
                success: true,
                stdout: r#"{"ID":"c1","Names":"p-1","State":"running","Labels":"io.proxydc.managed=true"}"#.to_string(),
                stderr: String::new(),
            },
        );
        let manager = test_manager(RuntimeKind::Docker, runner.clone(), Arc::new(FakeCommandRunner::new()));
        manager.refresh(&CancellationToken::new()).await.unwrap();
        assert_eq!(manager.list().await.len(), 1);

        runner.script(
            "ps",
            CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            },
        );
        manager.refresh(&CancellationToken::new()).await.unwrap();
        assert!(manager.list().await.is_empty());
    }
}
