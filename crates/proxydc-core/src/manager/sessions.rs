//! CreateSession / KillSession / ListSessions (§4.G): delegate to the
//! runtime adapter's `exec`, invoking `tmux` inside the container.

use super::Manager;
use crate::model::Session;
use crate::Result;
use proxydc_runtime::ContainerId;
use tokio_util::sync::CancellationToken;

impl Manager {
    pub async fn create_session(&self, id: &ContainerId, name: &str, cancel: &CancellationToken) -> Result<()> {
        let container = self.require_container(id).await?;
        self.adapter
            .exec_as(
                id,
                &container.remote_user,
                &["tmux".to_string(), "new-session".to_string(), "-d".to_string(), "-s".to_string(), name.to_string()],
                cancel,
            )
            .await?;
        self.notify_change();
        Ok(())
    }

    pub async fn kill_session(&self, id: &ContainerId, name: &str, cancel: &CancellationToken) -> Result<()> {
        let container = self.require_container(id).await?;
        self.adapter
            .exec_as(
                id,
                &container.remote_user,
                &["tmux".to_string(), "kill-session".to_string(), "-t".to_string(), name.to_string()],
                cancel,
            )
            .await?;
        self.notify_change();
        Ok(())
    }

    /// An exec error (no tmux server running) maps to the empty list, not
    /// a failure.
    pub async fn list_sessions(&self, id: &ContainerId, cancel: &CancellationToken) -> Result<Vec<Session>> {
        let container = self.require_container(id).await?;
        let output = match self
            .adapter
            .exec_as(
                id,
                &container.remote_user,
                &[
                    "tmux".to_string(),
                    "list-sessions".to_string(),
                    "-F".to_string(),
                    "#{session_name}: #{session_windows} windows#{?session_attached, (attached),}".to_string(),
                ],
                cancel,
            )
            .await
        {
            Ok(out) => out,
            Err(_) => return Ok(Vec::new()),
        };

        Ok(parse_tmux_sessions(&output, id))
    }
}

/// Parses `name: N windows [flags]` lines from `tmux list-sessions`.
fn parse_tmux_sessions(output: &str, container_id: &ContainerId) -> Vec<Session> {
    let mut sessions = Vec::new();
    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some((name, rest)) = line.split_once(':') else {
            continue;
        };
        let rest = rest.trim();
        let windows = rest
            .split_whitespace()
            .next()
            .and_then(|n| n.parse::<u32>().ok())
            .unwrap_or(0);
        let attached = rest.contains("attached");

        sessions.push(Session {
            name: name.trim().to_string(),
            container_id: container_id.clone(),
            windows,
            attached,
        });
    }
    sessions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::test_manager;
    use proxydc_runtime::command_runner::{CommandOutput, FakeCommandRunner};
    use proxydc_runtime::RuntimeKind;
    use std::sync::Arc;

    #[test]
    fn parses_name_window_count_and_attached_flag() {
        let output = "main: 2 windows (attached)\nbg: 1 windows\n";
        let sessions = parse_tmux_sessions(output, &ContainerId::new("c1"));
        assert_eq!(sessions.len(), 2);
        assert_eq!(sessions[0].name, "main");
        assert_eq!(sessions[0].windows, 2);
        assert!(sessions[0].attached);
        assert_eq!(sessions[1].name, "bg");
        assert!(!sessions[1].attached);
    }

    #[tokio::test]
    async fn exec_failure_maps_to_empty_list_not_error() {
        let runner = Arc::new(FakeCommandRunner::new());
        runner.script(
            "ps",
            CommandOutput {
                success: true,
                stdout: r#"{"ID":"c1","Names":"p-1","State":"running","Labels":"io.proxydc.managed=true"}"#.to_string(),
                stderr: String::new(),
            },
        );
        runner.script_err("exec", proxydc_runtime::ProviderError::ExecFailed("no server running on /tmp/tmux".to_string()));

        let manager = test_manager(RuntimeKind::Docker, runner, Arc::new(FakeCommandRunner::new()));
        let cancel = CancellationToken::new();
        manager.refresh(&cancel).await.unwrap();

        let sessions = manager.list_sessions(&ContainerId::new("c1"), &cancel).await.unwrap();
        assert!(sessions.is_empty());
    }
}
