//! Injectable process executor boundary (§4.A: "an injectable command executor (for tests)").

use crate::{ProviderError, Result};
use async_trait::async_trait;
use std::path::Path;
use std::process::Stdio;
use tokio_util::sync::CancellationToken;

/// The captured result of running one subprocess to completion.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

/// Seam over subprocess execution so the CLI Runtime Adapter can be tested
/// without a real `docker`/`podman` binary on PATH.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput>;
}

/// Real executor: spawns `program` via `tokio::process::Command`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessCommandRunner;

#[async_trait]
impl CommandRunner for ProcessCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: Option<&Path>,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput> {
        let mut cmd = tokio::process::Command::new(program);
        cmd.args(args);
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        if let Some(dir) = cwd {
            cmd.current_dir(dir);
        }

        let child = cmd.spawn().map_err(ProviderError::Io)?;

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ProviderError::Cancelled),
            result = child.wait_with_output() => result.map_err(ProviderError::Io)?,
        };

        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Resolve a compose sub-CLI invocation per §4.A: for docker it is
/// `docker compose` (a subcommand); for podman it is the standalone
/// `podman-compose` binary with no leading subcommand.
pub fn compose_invocation(runtime: crate::RuntimeKind) -> (String, Vec<String>) {
    match runtime {
        crate::RuntimeKind::Docker => ("docker".to_string(), vec!["compose".to_string()]),
        crate::RuntimeKind::Podman => ("podman-compose".to_string(), Vec::new()),
    }
}

/// Test double recording invocations and returning scripted responses,
/// keyed by the first argument (the subcommand).
#[cfg(any(test, feature = "test-support"))]
pub struct FakeCommandRunner {
    pub responses: std::sync::Mutex<std::collections::HashMap<String, Result<CommandOutput>>>,
    pub calls: std::sync::Mutex<Vec<(String, Vec<String>)>>,
}

#[cfg(any(test, feature = "test-support"))]
impl FakeCommandRunner {
    pub fn new() -> Self {
        Self {
            responses: std::sync::Mutex::new(std::collections::HashMap::new()),
            calls: std::sync::Mutex::new(Vec::new()),
        }
    }

    pub fn script(&self, key: impl Into<String>, output: CommandOutput) {
        self.responses
            .lock()
            .unwrap()
            .insert(key.into(), Ok(output));
    }

    pub fn script_err(&self, key: impl Into<String>, err: ProviderError) {
        self.responses.lock().unwrap().insert(key.into(), Err(err));
    }

    pub fn calls(&self) -> Vec<(String, Vec<String>)> {
        self.calls.lock().unwrap().clone()
    }
}

#[cfg(any(test, feature = "test-support"))]
impl Default for FakeCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(any(test, feature = "test-support"))]
#[async_trait]
impl CommandRunner for FakeCommandRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        _cwd: Option<&Path>,
        _cancel: &CancellationToken,
    ) -> Result<CommandOutput> {
        self.calls
            .lock()
            .unwrap()
            .push((program.to_string(), args.to_vec()));
        let key = args.first().cloned().unwrap_or_default();
        match self.responses.lock().unwrap().get(&key) {
            Some(Ok(out)) => Ok(out.clone()),
            Some(Err(e)) => Err(clone_provider_error(e)),
            None => Ok(CommandOutput {
                success: true,
                stdout: String::new(),
                stderr: String::new(),
            }),
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
fn clone_provider_error(err: &ProviderError) -> ProviderError {
    ProviderError::RuntimeUnavailable(err.to_string())
}
