//! CLI-based Runtime Adapter (§4.A), grounded in the CLI-subprocess shape
//! the spec requires bit-for-bit.

use crate::command_runner::{compose_invocation, CommandOutput, CommandRunner, ProcessCommandRunner};
use crate::{InspectInfo, ListedRecord, NetworkEntry, ProviderError, Result, RuntimeKind, RuntimeState};
use crate::{ContainerId, RuntimeAdapter};
use async_trait::async_trait;
use proxydc_config::labels;
use std::collections::HashMap;
use std::path::Path;
use tokio_util::sync::CancellationToken;

pub struct CliRuntimeAdapter {
    kind: RuntimeKind,
    runner: Box<dyn CommandRunner>,
}

impl CliRuntimeAdapter {
    pub fn new(kind: RuntimeKind) -> Self {
        Self {
            kind,
            runner: Box::new(ProcessCommandRunner),
        }
    }

    /// Construct with an injected executor, the seam §4.A calls for.
    pub fn with_runner(kind: RuntimeKind, runner: Box<dyn CommandRunner>) -> Self {
        Self { kind, runner }
    }

    async fn run(&self, args: &[String], cancel: &CancellationToken) -> Result<CommandOutput> {
        self.runner.run(self.kind.binary(), args, None, cancel).await
    }

    async fn run_ok(&self, args: &[String], cancel: &CancellationToken) -> Result<String> {
        let out = self.run(args, cancel).await?;
        if !out.success {
            return Err(ProviderError::RuntimeUnavailable(out.stderr));
        }
        Ok(out.stdout)
    }

    fn compose_args(&self, project_dir: &Path, project_name: &str, verb: &[&str]) -> (String, Vec<String>) {
        let (program, mut args) = compose_invocation(self.kind);
        let compose_path = project_dir
            .join(".devcontainer")
            .join("docker-compose.yml");
        args.push("-f".to_string());
        args.push(compose_path.to_string_lossy().into_owned());
        args.push("-p".to_string());
        args.push(project_name.to_string());
        args.extend(verb.iter().map(|s| s.to_string()));
        (program, args)
    }

    async fn run_compose(
        &self,
        project_dir: &Path,
        project_name: &str,
        verb: &[&str],
        cancel: &CancellationToken,
    ) -> Result<()> {
        let (program, args) = self.compose_args(project_dir, project_name, verb);
        let out = self
            .runner
            .run(&program, &args, Some(project_dir), cancel)
            .await?;
        if !out.success {
            return Err(ProviderError::RuntimeUnavailable(out.stderr));
        }
        Ok(())
    }
}

#[async_trait]
impl RuntimeAdapter for CliRuntimeAdapter {
    fn kind(&self) -> RuntimeKind {
        self.kind
    }

    async fn list_containers(&self, cancel: &CancellationToken) -> Result<Vec<ListedRecord>> {
        let filter = format!("label={}=true", labels::MANAGED);
        let args = vec![
            "ps".to_string(),
            "-a".to_string(),
            "--filter".to_string(),
            filter,
            "--format".to_string(),
            "json".to_string(),
        ];
        let out = self.run_ok(&args, cancel).await?;
        Ok(parse_ps_json(&out))
    }

    async fn start(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        self.run_ok(&["start".to_string(), id.0.clone()], cancel)
            .await?;
        Ok(())
    }

    async fn stop(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        self.run_ok(&["stop".to_string(), id.0.clone()], cancel)
            .await?;
        Ok(())
    }

    async fn remove(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<()> {
        self.run_ok(
            &["rm".to_string(), "-f".to_string(), id.0.clone()],
            cancel,
        )
        .await?;
        Ok(())
    }

    async fn exec(
        &self,
        id: &ContainerId,
        cmd: &[String],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut args = vec!["exec".to_string(), id.0.clone()];
        args.extend(cmd.iter().cloned());
        self.run_ok(&args, cancel).await
    }

    async fn exec_as(
        &self,
        id: &ContainerId,
        user: &str,
        cmd: &[String],
        cancel: &CancellationToken,
    ) -> Result<String> {
        let mut args = vec![
            "exec".to_string(),
            "-u".to_string(),
            user.to_string(),
            id.0.clone(),
        ];
        args.extend(cmd.iter().cloned());
        self.run_ok(&args, cancel).await
    }

    async fn inspect(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<InspectInfo> {
        let args = vec!["inspect".to_string(), id.0.clone()];
        let out = self.run_ok(&args, cancel).await?;
        parse_inspect_json(&out).ok_or_else(|| ProviderError::ContainerNotFound(id.0.clone()))
    }

    async fn compose_up(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run_compose(project_dir, project_name, &["up", "-d"], cancel)
            .await
    }

    async fn compose_start(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run_compose(project_dir, project_name, &["start"], cancel)
            .await
    }

    async fn compose_stop(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run_compose(project_dir, project_name, &["stop"], cancel)
            .await
    }

    async fn compose_down(
        &self,
        project_dir: &Path,
        project_name: &str,
        cancel: &CancellationToken,
    ) -> Result<()> {
        self.run_compose(project_dir, project_name, &["down"], cancel)
            .await
    }
}

/// Parse `ps -a --format json` output: one JSON object per line. Tolerates
/// empty output and skips malformed records without failing the whole call.
fn parse_ps_json(output: &str) -> Vec<ListedRecord> {
    let mut records = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let value: serde_json::Value = match serde_json::from_str(line) {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(error = %e, "skipping malformed ps record");
                continue;
            }
        };
        let Some(id) = value.get("ID").and_then(|v| v.as_str()) else {
            continue;
        };
        let name = value
            .get("Names")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        let state = value
            .get("State")
            .and_then(|v| v.as_str())
            .map(RuntimeState::from)
            .unwrap_or(RuntimeState::Stopped);
        let labels = value
            .get("Labels")
            .and_then(|v| v.as_str())
            .map(parse_label_string)
            .unwrap_or_default();

        records.push(ListedRecord {
            id: ContainerId::new(id),
            name,
            state,
            labels,
        });
    }
    records
}

/// `docker ps --format json` flattens labels into `"k=v,k2=v2"`.
fn parse_label_string(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|pair| {
            let mut parts = pair.splitn(2, '=');
            let key = parts.next()?.trim();
            if key.is_empty() {
                return None;
            }
            let value = parts.next().unwrap_or_default().trim();
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn parse_inspect_json(output: &str) -> Option<InspectInfo> {
    let docs: Vec<serde_json::Value> = serde_json::from_str(output).ok()?;
    let info = docs.first()?;

    let host_config = info.get("HostConfig").and_then(|v| v.as_object());
    let config = info.get("Config").and_then(|v| v.as_object());
    let network_settings = info.get("NetworkSettings").and_then(|v| v.as_object());

    let string_array = |v: Option<&serde_json::Value>| -> Vec<String> {
        v.and_then(|v| v.as_array())
            .map(|arr| {
                arr.iter()
                    .filter_map(|e| e.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    };

    let cap_add = string_array(host_config.and_then(|h| h.get("CapAdd")));
    let cap_drop = string_array(host_config.and_then(|h| h.get("CapDrop")));
    let memory_bytes = host_config
        .and_then(|h| h.get("Memory"))
        .and_then(|v| v.as_u64())
        .unwrap_or(0);
    let nano_cpus = host_config
        .and_then(|h| h.get("NanoCpus"))
        .and_then(|v| v.as_i64())
        .unwrap_or(0);
    let pids_limit = host_config
        .and_then(|h| h.get("PidsLimit"))
        .and_then(|v| v.as_i64());
    let env = string_array(config.and_then(|c| c.get("Env")));

    let networks = network_settings
        .and_then(|ns| ns.get("Networks"))
        .and_then(|v| v.as_object())
        .map(|nets| {
            nets.iter()
                .map(|(name, net)| {
                    let entry = NetworkEntry {
                        network_id: net
                            .get("NetworkID")
                            .and_then(|v| v.as_str())
                            .unwrap_or_default()
                            .to_string(),
                        ip_address: net
                            .get("IPAddress")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                        gateway: net
                            .get("Gateway")
                            .and_then(|v| v.as_str())
                            .map(str::to_string),
                    };
                    (name.clone(), entry)
                })
                .collect()
        })
        .unwrap_or_default();

    Some(InspectInfo {
        cap_add,
        cap_drop,
        memory_bytes,
        nano_cpus,
        pids_limit,
        env,
        networks,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command_runner::FakeCommandRunner;
    use std::sync::Arc;

    fn adapter_with(runner: Arc<FakeCommandRunner>) -> CliRuntimeAdapter {
        CliRuntimeAdapter::with_runner(RuntimeKind::Docker, Box::new(ArcRunner(runner)))
    }

    struct ArcRunner(Arc<FakeCommandRunner>);

    #[async_trait]
    impl CommandRunner for ArcRunner {
        async fn run(
            &self,
            program: &str,
            args: &[String],
            cwd: Option<&Path>,
            cancel: &CancellationToken,
        ) -> Result<CommandOutput> {
            self.0.run(program, args, cwd, cancel).await
        }
    }

    #[tokio::test]
    async fn list_containers_skips_malformed_lines_and_tolerates_empty_output() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.script(
            "ps",
            CommandOutput {
                success: true,
                stdout: "not json\n{\"ID\":\"abc123\",\"Names\":\"p-1\",\"State\":\"running\",\"Labels\":\"io.proxydc.managed=true\"}\n\n".to_string(),
                stderr: String::new(),
            },
        );
        let adapter = adapter_with(runner);
        let records = adapter
            .list_containers(&CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "p-1");
        assert_eq!(records[0].state, RuntimeState::Running);
    }

    #[tokio::test]
    async fn empty_ps_output_yields_empty_list() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.script(
            "ps",
            CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            },
        );
        let adapter = adapter_with(runner);
        let records = adapter
            .list_containers(&CancellationToken::new())
            .await
            .unwrap();
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn inspect_extracts_isolation_fields() {
        let runner = Arc::new(FakeCommandRunner::new());
        let json = r#"[{"HostConfig":{"CapAdd":["SYS_PTRACE"],"CapDrop":["ALL"],"Memory":4294967296,"NanoCpus":1500000000,"PidsLimit":512},"Config":{"Env":["FOO=bar"]},"NetworkSettings":{"Networks":{"proj_net":{"NetworkID":"net1","IPAddress":"10.0.0.2","Gateway":"10.0.0.1"}}}}]"#;
        runner.script(
            "inspect",
            CommandOutput {
                success: true,
                stdout: json.to_string(),
                stderr: String::new(),
            },
        );
        let adapter = adapter_with(runner);
        let info = adapter
            .inspect(&ContainerId::new("abc"), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(info.cap_add, vec!["SYS_PTRACE"]);
        assert_eq!(info.memory_bytes, 4294967296);
        assert_eq!(info.pids_limit, Some(512));
        assert_eq!(info.networks.get("proj_net").unwrap().ip_address.as_deref(), Some("10.0.0.2"));
    }
}
