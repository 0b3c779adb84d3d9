//! Filesystem sandbox: policy ownership and scoped temporary directories.

use crate::error::SandboxError;
use crate::fs::policy::{FilesystemPolicy, PathOperation};
use crate::fs::port::{CheckedFs, FileSystemPort, TokioFs};
use crate::Result;
use parking_lot::Mutex;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, warn};

/// Conventional exit code after SIGINT.
const EXIT_INTERRUPT: i32 = 130;
/// Conventional exit code after SIGTERM.
const EXIT_TERMINATE: i32 = 143;

/// Long-lived filesystem sandbox for one agent session.
///
/// Owns a [`FilesystemPolicy`], hands out checked file facades, and manages
/// temporary directories whose lifetime is scoped to the sandbox: every
/// directory created through [`create_temp_dir`](Self::create_temp_dir) is
/// registered and removed exactly once, either by an explicit
/// [`cleanup_temp_dirs`](Self::cleanup_temp_dirs) call, by the `Drop`
/// finalizer, or by the best-effort signal safety net.
pub struct FilesystemSandbox {
    policy: Arc<FilesystemPolicy>,
    temp_dirs: Arc<Mutex<HashSet<PathBuf>>>,
}

impl FilesystemSandbox {
    /// Create a sandbox enforcing the given policy.
    pub fn new(policy: FilesystemPolicy) -> Self {
        Self {
            policy: Arc::new(policy),
            temp_dirs: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// The policy this sandbox enforces.
    pub fn policy(&self) -> &FilesystemPolicy {
        &self.policy
    }

    /// Check whether `operation` on `path` is permitted.
    pub fn is_allowed(&self, path: impl AsRef<Path>, operation: PathOperation) -> bool {
        self.policy.is_allowed(path, operation)
    }

    /// Wrap an arbitrary backend in a policy-checking facade.
    pub fn wrap_fs<B: FileSystemPort>(&self, backend: B) -> CheckedFs<B> {
        CheckedFs::new(Arc::clone(&self.policy), backend)
    }

    /// Checked facade over the real filesystem.
    pub fn checked_fs(&self) -> CheckedFs<TokioFs> {
        self.wrap_fs(TokioFs)
    }

    /// Create a temporary directory under the system temp dir and register
    /// it for scoped cleanup. The directory name is `{prefix}` followed by a
    /// random suffix.
    pub async fn create_temp_dir(&self, prefix: &str) -> Result<PathBuf> {
        let prefix = format!("cordon-{prefix}");
        let created = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .tempdir_in(std::env::temp_dir())
                // Detach from tempfile's drop-deletion: lifetime is owned by
                // the sandbox registry.
                .map(tempfile::TempDir::into_path)
        })
        .await
        .map_err(|e| SandboxError::Io(std::io::Error::other(e)))??;

        debug!(path = %created.display(), "created scoped temp dir");
        self.temp_dirs.lock().insert(created.clone());
        Ok(created)
    }

    /// Paths currently registered for cleanup.
    pub fn temp_dirs(&self) -> Vec<PathBuf> {
        self.temp_dirs.lock().iter().cloned().collect()
    }

    /// Remove every registered temporary directory.
    ///
    /// Each removal is attempted independently: one failure does not abort
    /// the rest. Failures are collected and reported as a single combined
    /// error only after every entry has been attempted. The registry is
    /// cleared regardless, so the call is idempotent: a second invocation
    /// finds nothing to do.
    pub async fn cleanup_temp_dirs(&self) -> Result<()> {
        let dirs: Vec<PathBuf> = {
            let mut registry = self.temp_dirs.lock();
            registry.drain().collect()
        };

        let mut failures = Vec::new();
        for dir in dirs {
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => debug!(path = %dir.display(), "removed temp dir"),
                // Already gone counts as cleaned up.
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    warn!(path = %dir.display(), error = %e, "failed to remove temp dir");
                    failures.push((dir, e.to_string()));
                }
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(SandboxError::Cleanup { failures })
        }
    }

    /// Install the secondary cleanup safety net for interrupt/termination
    /// signals.
    ///
    /// The primary cleanup mechanism is scoped: explicit
    /// [`cleanup_temp_dirs`](Self::cleanup_temp_dirs) or the `Drop`
    /// finalizer. This task covers the remaining gap, a signal arriving
    /// while directories are still registered, by removing them
    /// synchronously (asynchronous work cannot be awaited once the process
    /// is tearing down), swallowing any errors, and exiting with the
    /// conventional code for the signal (130 for SIGINT, 143 for SIGTERM).
    #[cfg(unix)]
    pub fn spawn_signal_cleanup(&self) -> tokio::task::JoinHandle<()> {
        use tokio::signal::unix::{signal, SignalKind};

        let registry = Arc::clone(&self.temp_dirs);
        tokio::spawn(async move {
            let mut interrupt = match signal(SignalKind::interrupt()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGINT handler");
                    return;
                }
            };
            let mut terminate = match signal(SignalKind::terminate()) {
                Ok(stream) => stream,
                Err(e) => {
                    warn!(error = %e, "failed to install SIGTERM handler");
                    return;
                }
            };

            let code = tokio::select! {
                _ = interrupt.recv() => EXIT_INTERRUPT,
                _ = terminate.recv() => EXIT_TERMINATE,
            };

            cleanup_sync(&registry);
            std::process::exit(code);
        })
    }
}

/// Synchronous best-effort removal of every registered directory.
///
/// Used from contexts that cannot await: `Drop` and the signal safety net.
/// Errors are swallowed; the process is terminating regardless.
fn cleanup_sync(registry: &Mutex<HashSet<PathBuf>>) {
    let dirs: Vec<PathBuf> = {
        let mut guard = registry.lock();
        guard.drain().collect()
    };
    for dir in dirs {
        let _ = std::fs::remove_dir_all(&dir);
    }
}

impl Drop for FilesystemSandbox {
    fn drop(&mut self) {
        cleanup_sync(&self.temp_dirs);
    }
}
