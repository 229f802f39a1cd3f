//! Process Supervisor (§4.F): spawns, watches, and restarts a child process
//! per a configurable restart policy, with SIGTERM-then-SIGKILL shutdown.

use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartPolicy {
    Never,
    OnFailure,
    Always,
}

pub struct SupervisorConfig {
    pub name: String,
    pub binary: String,
    pub args: Vec<String>,
    pub policy: RestartPolicy,
    pub max_retries: u32,
    pub retry_delay: Duration,
}

/// Generic child-process manager; one per long-running child (the Proxy Log
/// Reader's own process model lives elsewhere — this supervises things like
/// the devcontainer CLI's long-running helpers when configured to restart).
pub struct ProcessSupervisor {
    config: SupervisorConfig,
    started: AtomicBool,
    stop_requested: Arc<AtomicBool>,
    done_tx: watch::Sender<bool>,
    done_rx: watch::Receiver<bool>,
}

impl ProcessSupervisor {
    pub fn new(config: SupervisorConfig) -> Self {
        let (done_tx, done_rx) = watch::channel(false);
        Self {
            config,
            started: AtomicBool::new(false),
            stop_requested: Arc::new(AtomicBool::new(false)),
            done_tx,
            done_rx,
        }
    }

    /// Spawns the supervision loop and returns immediately. Calling this
    /// twice on the same supervisor fails.
    pub fn start(self: &Arc<Self>, cancel: CancellationToken) -> Result<(), String> {
        if self.started.swap(true, Ordering::SeqCst) {
            return Err("supervisor already started".to_string());
        }
        let this = self.clone();
        tokio::spawn(async move {
            this.run(cancel).await;
            let _ = this.done_tx.send(true);
        });
        Ok(())
    }

    /// A channel that reports `true` once the supervisor has terminated.
    pub fn done(&self) -> watch::Receiver<bool> {
        self.done_rx.clone()
    }

    /// Signals SIGTERM, waits up to 5 seconds, then SIGKILLs. Safe to call
    /// even when the child has already exited.
    pub fn stop(&self) {
        self.stop_requested.store(true, Ordering::SeqCst);
    }

    async fn run(&self, cancel: CancellationToken) {
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() || self.stop_requested.load(Ordering::SeqCst) {
                return;
            }

            let child = match self.spawn_child() {
                Ok(child) => child,
                Err(e) => {
                    error!(name = %self.config.name, error = %e, "failed to spawn supervised process");
                    return;
                }
            };

            let status = self.run_child_to_completion(child, cancel.clone()).await;

            if cancel.is_cancelled() || self.stop_requested.load(Ordering::SeqCst) {
                return;
            }

            let should_restart = match self.config.policy {
                RestartPolicy::Never => false,
                RestartPolicy::OnFailure => !matches!(status, Some(0)),
                RestartPolicy::Always => true,
            };

            if !should_restart {
                return;
            }

            attempt += 1;
            if attempt > self.config.max_retries {
                error!(name = %self.config.name, attempts = attempt, "retry cap reached, giving up");
                return;
            }

            tokio::select! {
                _ = cancel.cancelled() => return,
                _ = tokio::time::sleep(self.config.retry_delay) => {}
            }
        }
    }

    fn spawn_child(&self) -> std::io::Result<Child> {
        Command::new(&self.config.binary)
            .args(&self.config.args)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
    }

    async fn run_child_to_completion(&self, mut child: Child, cancel: CancellationToken) -> Option<i32> {
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let name = self.config.name.clone();

        let stdout_name = name.clone();
        let stdout_task = stdout.map(|s| {
            tokio::spawn(pump_lines(BufReader::new(s), stdout_name, "stdout"))
        });
        let stderr_name = name.clone();
        let stderr_task = stderr.map(|s| {
            tokio::spawn(pump_lines(BufReader::new(s), stderr_name, "stderr"))
        });

        let stop_requested = self.stop_requested.clone();
        let wait_result = loop {
            tokio::select! {
                result = child.wait() => break result,
                _ = cancel.cancelled() => {
                    self.terminate(&mut child).await;
                    break child.wait().await;
                }
                _ = tokio::time::sleep(Duration::from_millis(100)) => {
                    if stop_requested.load(Ordering::SeqCst) {
                        self.terminate(&mut child).await;
                        break child.wait().await;
                    }
                }
            }
        };

        if let Some(task) = stdout_task {
            let _ = task.await;
        }
        if let Some(task) = stderr_task {
            let _ = task.await;
        }

        match wait_result {
            Ok(status) => status.code(),
            Err(e) => {
                warn!(name = %self.config.name, error = %e, "error waiting for child");
                None
            }
        }
    }

    async fn terminate(&self, child: &mut Child) {
        #[cfg(unix)]
        {
            if let Some(pid) = child.id() {
                let pid = nix::unistd::Pid::from_raw(pid as i32);
                let _ = nix::sys::signal::kill(pid, nix::sys::signal::Signal::SIGTERM);
            }
        }

        let graceful = tokio::time::timeout(SHUTDOWN_GRACE, child.wait()).await;
        if graceful.is_err() {
            let _ = child.kill().await;
        }
    }
}

async fn pump_lines<R: tokio::io::AsyncRead + Unpin>(reader: BufReader<R>, name: String, stream: &'static str) {
    let mut lines = reader.lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => info!(process = %name, stream, "{line}"),
            Ok(None) => break,
            Err(_) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(binary: &str, args: &[&str], policy: RestartPolicy) -> SupervisorConfig {
        SupervisorConfig {
            name: "test-proc".to_string(),
            binary: binary.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            policy,
            max_retries: 2,
            retry_delay: Duration::from_millis(10),
        }
    }

    #[tokio::test]
    async fn never_policy_does_not_restart_after_clean_exit() {
        let supervisor = Arc::new(ProcessSupervisor::new(config(
            "true",
            &[],
            RestartPolicy::Never,
        )));
        let cancel = CancellationToken::new();
        supervisor.start(cancel).unwrap();

        let mut done = supervisor.done();
        tokio::time::timeout(Duration::from_secs(3), done.changed())
            .await
            .expect("supervisor should finish")
            .unwrap();
        assert!(*done.borrow());
    }

    #[tokio::test]
    async fn second_start_call_fails() {
        let supervisor = Arc::new(ProcessSupervisor::new(config(
            "true",
            &[],
            RestartPolicy::Never,
        )));
        supervisor.start(CancellationToken::new()).unwrap();
        let err = supervisor.start(CancellationToken::new());
        assert!(err.is_err());
    }

    #[tokio::test]
    async fn on_failure_policy_restarts_until_cap_then_stops() {
        let supervisor = Arc::new(ProcessSupervisor::new(config(
            "false",
            &[],
            RestartPolicy::OnFailure,
        )));
        let cancel = CancellationToken::new();
        supervisor.start(cancel).unwrap();

        let mut done = supervisor.done();
        tokio::time::timeout(Duration::from_secs(5), done.changed())
            .await
            .expect("supervisor should eventually give up")
            .unwrap();
        assert!(*done.borrow());
    }

    #[tokio::test]
    async fn cancellation_terminates_a_long_running_child() {
        let supervisor = Arc::new(ProcessSupervisor::new(config(
            "sleep",
            &["30"],
            RestartPolicy::Never,
        )));
        let cancel = CancellationToken::new();
        supervisor.start(cancel.clone()).unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();

        let mut done = supervisor.done();
        tokio::time::timeout(Duration::from_secs(6), done.changed())
            .await
            .expect("supervisor should stop after cancellation")
            .unwrap();
    }
}
