//! Create (§4.G): the composite create. Renders the template, prepares
//! tokens and proxy directories, invokes the external devcontainer CLI,
//! reconciles, then starts the Proxy Log Reader for the new Container.

use super::Manager;
use crate::credentials::{resolve_agent_token, resolve_forge_token};
use crate::model::Container;
use crate::{CoreError, ProxyLogReader, Result};
use proxydc_config::TemplateData;
use proxydc_runtime::ContainerId;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

pub struct CreateOptions {
    pub project_path: PathBuf,
    pub template: String,
    pub name: String,
}

impl Manager {
    pub async fn create(
        &self,
        opts: CreateOptions,
        log_sink: mpsc::Sender<crate::model::LogEntry>,
        cancel: &CancellationToken,
    ) -> Result<Container> {
        // 1. Render the template bundle.
        let agent = resolve_agent_token(self.config.defaults.agent_token_path.as_deref(), None);
        let forge = resolve_forge_token(self.config.defaults.forge_token_path.as_deref());
        let scope = format!("container.{}", opts.name);
        for warning in [&agent.warning, &forge.warning].into_iter().flatten() {
            let _ = log_sink.try_send(crate::model::LogEntry::new(
                crate::model::Severity::Warn,
                scope.clone(),
                warning.clone(),
            ));
        }

        let data = TemplateData::new(
            opts.project_path.clone(),
            opts.template.clone(),
            opts.name.clone(),
            self.config.proxy.image.clone(),
            self.config.proxy.listen_port,
            self.config.defaults.remote_user.clone(),
            self.config.proxy.container_log_path.clone(),
            agent.value.as_ref().map(|_| agent.host_path.clone()),
            forge.value.as_ref().map(|_| forge.host_path.clone()),
        );
        self.renderer.render(&opts.template, &data)?;

        // 2. Prepare proxy directories (tokens are already resolved above).
        self.proxy_store.get_proxy_cert_dir(&opts.project_path)?;

        // 3. Shell out to the external devcontainer CLI.
        let new_id = self.run_devcontainer_up(&opts.project_path, cancel).await?;

        // 4. Refresh.
        self.refresh(cancel).await?;

        // 5. Look up the new ID, falling back to prefix matching.
        let container = {
            let state = self.state_read().await;
            Self::lookup_by_id_or_prefix(&state, &new_id)
                .cloned()
                .ok_or_else(|| {
                    CoreError::CreationFailed(format!(
                        "refresh did not surface container {new_id} after create"
                    ))
                })?
        };

        // 6. Start the Proxy Log Reader for this Container, cancellable on destroy.
        let reader_cancel = CancellationToken::new();
        let log_path = PathBuf::from(&self.config.proxy.container_log_path);
        let reader = ProxyLogReader::new(log_path, container.name.clone());
        let reader_cancel_clone = reader_cancel.clone();
        tokio::spawn(async move {
            let _ = reader.start(log_sink, reader_cancel_clone).await;
        });
        self.proxy_log_cancels
            .write()
            .await
            .insert(container.id.clone(), reader_cancel);

        // onChange already fired inside refresh() in step 4.
        Ok(container)
    }

    async fn run_devcontainer_up(&self, project_path: &std::path::Path, cancel: &CancellationToken) -> Result<ContainerId> {
        let mut args = vec![
            "up".to_string(),
            "--workspace-folder".to_string(),
            project_path.to_string_lossy().into_owned(),
        ];
        if self.adapter.kind() != default_runtime_kind(&self.config) {
            args.push("--docker-path".to_string());
            args.push(self.adapter.kind().binary().to_string());
        }

        let out = self
            .devcontainer_runner
            .run("devcontainer", &args, Some(project_path), cancel)
            .await
            .map_err(|e| CoreError::CreationFailed(e.to_string()))?;

        if !out.success {
            return Err(CoreError::CreationFailed(out.stderr));
        }

        let value: serde_json::Value = serde_json::from_str(&out.stdout)
            .map_err(|_| CoreError::CreationFailed("devcontainer CLI returned non-JSON output".to_string()))?;
        let id = value
            .get("containerId")
            .and_then(|v| v.as_str())
            .ok_or_else(|| CoreError::CreationFailed("devcontainer CLI output missing containerId".to_string()))?;
        Ok(ContainerId::new(id))
    }
}

fn default_runtime_kind(config: &proxydc_config::GlobalConfig) -> proxydc_runtime::RuntimeKind {
    config
        .defaults
        .runtime
        .parse()
        .unwrap_or(proxydc_runtime::RuntimeKind::Docker)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proxydc_runtime::command_runner::{CommandOutput, FakeCommandRunner};
    use proxydc_runtime::RuntimeKind;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn write_basic_template(templates_dir: &std::path::Path) {
        let devc = templates_dir.join("basic").join(".devcontainer");
        std::fs::create_dir_all(&devc).unwrap();
        std::fs::write(
            devc.join("docker-compose.yml.tmpl"),
            "name: {{container_name}}\nmem_limit: 4g\n",
        )
        .unwrap();
    }

    #[tokio::test]
    async fn happy_path_create_surfaces_new_container_and_starts_log_reader() {
        let project = tempdir().unwrap();
        let templates = tempdir().unwrap();
        write_basic_template(templates.path());

        let devcontainer_runner = Arc::new(FakeCommandRunner::new());
        devcontainer_runner.script(
            "up",
            CommandOutput {
                success: true,
                stdout: r#"{"containerId":"abcdef123456"}"#.to_string(),
                stderr: String::new(),
            },
        );

        let adapter_runner = Arc::new(FakeCommandRunner::new());
        adapter_runner.script(
            "ps",
            CommandOutput {
                success: true,
                stdout: r#"{"ID":"abcdef123456","Names":"p-1","State":"running","Labels":"io.proxydc.managed=true"}"#.to_string(),
                stderr: String::new(),
            },
        );

        let manager = test_manager_with_templates(RuntimeKind::Docker, adapter_runner, devcontainer_runner, templates.path());

        let (tx, _rx) = mpsc::channel(16);
        let container = manager
            .create(
                CreateOptions {
                    project_path: project.path().to_path_buf(),
                    template: "basic".to_string(),
                    name: "p-1".to_string(),
                },
                tx,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(container.name, "p-1");
        assert_eq!(container.state, crate::model::ContainerState::Running);
        assert!(project.path().join(".devcontainer/docker-compose.yml").exists());
    }

    #[tokio::test]
    async fn non_json_devcontainer_output_fails_creation() {
        let project = tempdir().unwrap();
        let templates = tempdir().unwrap();
        write_basic_template(templates.path());

        let devcontainer_runner = Arc::new(FakeCommandRunner::new());
        devcontainer_runner.script(
            "up",
            CommandOutput {
                success: true,
                stdout: "not json".to_string(),
                stderr: String::new(),
            },
        );
        let adapter_runner = Arc::new(FakeCommandRunner::new());
        let manager = test_manager_with_templates(RuntimeKind::Docker, adapter_runner, devcontainer_runner, templates.path());

        let (tx, _rx) = mpsc::channel(16);
        let err = manager
            .create(
                CreateOptions {
                    project_path: project.path().to_path_buf(),
                    template: "basic".to_string(),
                    name: "p-1".to_string(),
                },
                tx,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CoreError::CreationFailed(_)));
    }

    fn test_manager_with_templates(
        kind: RuntimeKind,
        adapter_runner: Arc<FakeCommandRunner>,
        devcontainer_runner: Arc<FakeCommandRunner>,
        templates_dir: &std::path::Path,
    ) -> Manager {
        crate::test_support::test_manager_with_template_dir(kind, adapter_runner, devcontainer_runner, templates_dir)
    }
}
