//! Sandbox error types.

use crate::fs::PathOperation;
use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur during sandbox operations.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// I/O error from a delegated file operation.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// A file operation was denied by the filesystem policy.
    ///
    /// Raised at the checked-facade boundary before any I/O is attempted.
    #[error("Access denied: {operation} on {}", .path.display())]
    AccessDenied {
        path: PathBuf,
        operation: PathOperation,
    },

    /// A network request was denied by the network policy.
    ///
    /// Raised at the checked-facade boundary before any network I/O.
    #[error("Request denied: {url}: {reason}")]
    RequestDenied { url: String, reason: String },

    /// Malformed request handed to the HTTP facade.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Error from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Spawning a process failed, including the unsandboxed fallback.
    #[error("Failed to spawn process: {0}")]
    SpawnFailed(String),

    /// One or more temporary directories could not be removed.
    ///
    /// Collected per entry; every registered directory was attempted before
    /// this error was produced.
    #[error("Cleanup failed for {} directories: {}", .failures.len(), format_failures(.failures))]
    Cleanup { failures: Vec<(PathBuf, String)> },
}

fn format_failures(failures: &[(PathBuf, String)]) -> String {
    failures
        .iter()
        .map(|(path, reason)| format!("{}: {}", path.display(), reason))
        .collect::<Vec<_>>()
        .join("; ")
}

impl SandboxError {
    /// Create a new spawn-failed error.
    pub fn spawn_failed(msg: impl Into<String>) -> Self {
        Self::SpawnFailed(msg.into())
    }

    /// Create an access-denied error for a path operation.
    pub fn access_denied(path: impl Into<PathBuf>, operation: PathOperation) -> Self {
        Self::AccessDenied {
            path: path.into(),
            operation,
        }
    }

    /// Create a request-denied error.
    pub fn request_denied(url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::RequestDenied {
            url: url.into(),
            reason: reason.into(),
        }
    }

    /// True when this error is a policy denial rather than an I/O failure.
    pub fn is_denial(&self) -> bool {
        matches!(self, Self::AccessDenied { .. } | Self::RequestDenied { .. })
    }
}
