//! Supervised execution of sandboxed processes.

use crate::error::SandboxError;
use crate::process::bwrap::build_arguments;
use crate::process::capability::{Capabilities, IsolationBackend};
use crate::process::options::ProcessSandboxOptions;
use crate::Result;
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

/// Grace period between the terminate signal and the forced kill.
const KILL_GRACE: Duration = Duration::from_secs(1);

/// Outcome of one sandboxed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionOutput {
    /// Exit code; -1 when the process died without one (signal).
    pub exit_code: i32,

    /// Captured standard output.
    pub stdout: String,

    /// Captured standard error.
    pub stderr: String,

    /// Whether OS-level isolation was actually in effect. False on the
    /// degraded fallback path, so reduced isolation is observable rather
    /// than silent.
    pub sandboxed: bool,

    /// Whether the process was killed by the timeout escalation.
    pub killed: bool,

    /// Wall time of the invocation in milliseconds.
    pub duration_ms: u64,
}

impl ExecutionOutput {
    /// True when the process exited cleanly.
    pub fn success(&self) -> bool {
        self.exit_code == 0 && !self.killed
    }
}

/// Spawns one isolated process per [`execute`](Self::execute) call and
/// supervises its lifetime.
///
/// The isolation backend comes from a [`Capabilities`] probe performed by
/// the caller at startup. When no backend is available, or the isolation
/// tool fails to spawn, execution transparently falls back to running the
/// raw command, marked `sandboxed: false` in the result.
pub struct ProcessSandbox {
    options: ProcessSandboxOptions,
    capabilities: Capabilities,
}

impl ProcessSandbox {
    /// Create a sandbox from per-invocation options and a capability probe.
    pub fn new(options: ProcessSandboxOptions, capabilities: Capabilities) -> Self {
        Self {
            options,
            capabilities,
        }
    }

    /// The options this sandbox spawns with.
    pub fn options(&self) -> &ProcessSandboxOptions {
        &self.options
    }

    /// Execute a command inside the sandbox.
    ///
    /// Streams stdout/stderr incrementally (capped per stream), enforces
    /// the configured timeout with terminate-then-kill escalation, and
    /// resolves exactly once, on exit or on spawn failure via the
    /// unsandboxed fallback.
    pub async fn execute(&self, command: &str, args: &[&str]) -> Result<ExecutionOutput> {
        let started = Instant::now();

        if self.capabilities.backend != IsolationBackend::Bubblewrap {
            debug!(
                backend = ?self.capabilities.backend,
                "no namespace backend, executing unsandboxed"
            );
            return self.execute_fallback(command, args, started).await;
        }

        let argv = build_arguments(&self.options, command, args);
        let mut cmd = Command::new("bwrap");
        cmd.args(&argv)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(self.options.filtered_env());

        match cmd.spawn() {
            Ok(child) => self.supervise(child, true, started).await,
            Err(e) => {
                warn!(error = %e, "isolation tool failed to spawn, falling back unsandboxed");
                self.execute_fallback(command, args, started).await
            }
        }
    }

    /// Run the raw command without isolation. The result is marked
    /// `sandboxed: false`.
    async fn execute_fallback(
        &self,
        command: &str,
        args: &[&str],
        started: Instant,
    ) -> Result<ExecutionOutput> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .current_dir(&self.options.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .env_clear()
            .envs(self.options.filtered_env());

        let child = cmd
            .spawn()
            .map_err(|e| SandboxError::spawn_failed(format!("{command}: {e}")))?;
        self.supervise(child, false, started).await
    }

    /// Drain output, enforce the timeout, and collect the exit status.
    async fn supervise(
        &self,
        mut child: Child,
        sandboxed: bool,
        started: Instant,
    ) -> Result<ExecutionOutput> {
        let stdout_task = spawn_reader(child.stdout.take(), self.options.max_output_size);
        let stderr_task = spawn_reader(child.stderr.take(), self.options.max_output_size);

        let mut killed = false;
        let status = match self.options.timeout_ms {
            None => child.wait().await?,
            Some(timeout_ms) => {
                match timeout(Duration::from_millis(timeout_ms), child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        killed = self.escalate(&mut child).await?;
                        child.wait().await?
                    }
                }
            }
        };

        let stdout = join_reader(stdout_task).await;
        let stderr = join_reader(stderr_task).await;

        let exit_code = status.code().unwrap_or(-1);
        debug!(exit_code, killed, sandboxed, "process finished");

        Ok(ExecutionOutput {
            exit_code,
            stdout,
            stderr,
            sandboxed,
            killed,
            duration_ms: started.elapsed().as_millis() as u64,
        })
    }

    /// Terminate-then-kill escalation after the timeout fires.
    ///
    /// The process may have exited naturally while the timer raced it, so
    /// aliveness is checked before each signal. Returns whether a signal
    /// was actually delivered.
    async fn escalate(&self, child: &mut Child) -> Result<bool> {
        if child.try_wait()?.is_some() {
            return Ok(false);
        }

        debug!("timeout exceeded, sending terminate signal");
        send_terminate(child);

        if timeout(KILL_GRACE, child.wait()).await.is_err() {
            warn!("process survived terminate signal, killing");
            child.start_kill()?;
        }
        Ok(true)
    }
}

/// Send a graceful terminate signal.
#[cfg(unix)]
fn send_terminate(child: &Child) {
    use nix::sys::signal::{kill, Signal};
    use nix::unistd::Pid;

    if let Some(pid) = child.id() {
        let _ = kill(Pid::from_raw(pid as i32), Signal::SIGTERM);
    }
}

/// On platforms without SIGTERM the escalation starts with the hard kill.
#[cfg(not(unix))]
fn send_terminate(child: &Child) {
    let _ = child;
}

/// Stream a pipe incrementally into a capped buffer.
fn spawn_reader(
    stream: Option<impl tokio::io::AsyncRead + Unpin + Send + 'static>,
    max_size: usize,
) -> Option<JoinHandle<String>> {
    let stream = stream?;
    Some(tokio::spawn(async move {
        let mut reader = BufReader::new(stream);
        let mut output = String::new();
        let mut truncated = false;

        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => break,
                Ok(_) => {
                    if output.len() + line.len() > max_size {
                        if !truncated {
                            output.push_str("\n[output truncated]\n");
                            truncated = true;
                        }
                        // Keep draining so the child never blocks on a
                        // full pipe.
                        continue;
                    }
                    output.push_str(&line);
                }
                Err(e) => {
                    warn!(error = %e, "error reading process output");
                    break;
                }
            }
        }

        output
    }))
}

async fn join_reader(task: Option<JoinHandle<String>>) -> String {
    match task {
        Some(task) => task.await.unwrap_or_default(),
        None => String::new(),
    }
}
