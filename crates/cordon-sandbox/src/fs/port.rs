//! File-operation port and its checked decorator.
//!
//! `FileSystemPort` is the seam between policy enforcement and real I/O:
//! `TokioFs` is the concrete backend, and `CheckedFs` wraps any backend with
//! a policy check per call. The trait, not structural convention, is what
//! guarantees the wrapped surface stays substitutable for the unwrapped one.

use crate::error::SandboxError;
use crate::fs::policy::{FilesystemPolicy, PathOperation};
use crate::Result;
use async_trait::async_trait;
use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Standard file-operation surface.
#[async_trait]
pub trait FileSystemPort: Send + Sync {
    /// Read a file's contents as bytes.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Read a file's contents as UTF-8 text.
    async fn read_to_string(&self, path: &Path) -> Result<String>;

    /// Write bytes to a file, creating or truncating it.
    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()>;

    /// List the entries of a directory.
    async fn list(&self, path: &Path) -> Result<Vec<PathBuf>>;

    /// Fetch metadata for a path.
    async fn metadata(&self, path: &Path) -> Result<Metadata>;

    /// Create a directory and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> Result<()>;

    /// Remove a file.
    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory and all its contents.
    async fn remove_dir_all(&self, path: &Path) -> Result<()>;

    /// Check whether a path exists.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Resolve a path to its canonical form, following symlinks.
    async fn canonicalize(&self, path: &Path) -> Result<PathBuf>;
}

/// Concrete backend delegating to `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioFs;

#[async_trait]
impl FileSystemPort for TokioFs {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(path).await?)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        Ok(tokio::fs::write(path, contents).await?)
    }

    async fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let mut entries = tokio::fs::read_dir(path).await?;
        let mut paths = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            paths.push(entry.path());
        }
        Ok(paths)
    }

    async fn metadata(&self, path: &Path) -> Result<Metadata> {
        Ok(tokio::fs::metadata(path).await?)
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        Ok(tokio::fs::create_dir_all(path).await?)
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        Ok(tokio::fs::remove_file(path).await?)
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        Ok(tokio::fs::remove_dir_all(path).await?)
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(tokio::fs::try_exists(path).await?)
    }

    async fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        Ok(tokio::fs::canonicalize(path).await?)
    }
}

/// Policy-checking decorator around a [`FileSystemPort`] backend.
///
/// Every call evaluates the filesystem policy for the appropriate operation
/// before delegating; a denial returns [`SandboxError::AccessDenied`] and
/// performs no I/O at all.
#[derive(Debug, Clone)]
pub struct CheckedFs<B> {
    policy: Arc<FilesystemPolicy>,
    backend: B,
}

impl<B: FileSystemPort> CheckedFs<B> {
    /// Wrap a backend with the given policy.
    pub fn new(policy: Arc<FilesystemPolicy>, backend: B) -> Self {
        Self { policy, backend }
    }

    /// The policy this facade enforces.
    pub fn policy(&self) -> &FilesystemPolicy {
        &self.policy
    }

    fn check(&self, path: &Path, operation: PathOperation) -> Result<()> {
        if self.policy.is_allowed(path, operation) {
            Ok(())
        } else {
            debug!(path = %path.display(), %operation, "file operation denied");
            Err(SandboxError::access_denied(path, operation))
        }
    }
}

#[async_trait]
impl<B: FileSystemPort> FileSystemPort for CheckedFs<B> {
    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        self.check(path, PathOperation::Read)?;
        self.backend.read(path).await
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        self.check(path, PathOperation::Read)?;
        self.backend.read_to_string(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        self.check(path, PathOperation::Write)?;
        self.backend.write(path, contents).await
    }

    async fn list(&self, path: &Path) -> Result<Vec<PathBuf>> {
        self.check(path, PathOperation::Read)?;
        self.backend.list(path).await
    }

    async fn metadata(&self, path: &Path) -> Result<Metadata> {
        self.check(path, PathOperation::Read)?;
        self.backend.metadata(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.check(path, PathOperation::Write)?;
        self.backend.create_dir_all(path).await
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        self.check(path, PathOperation::Write)?;
        self.backend.remove_file(path).await
    }

    async fn remove_dir_all(&self, path: &Path) -> Result<()> {
        self.check(path, PathOperation::Write)?;
        self.backend.remove_dir_all(path).await
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        self.check(path, PathOperation::Read)?;
        self.backend.exists(path).await
    }

    async fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        self.check(path, PathOperation::Read)?;
        self.backend.canonicalize(path).await
    }
}
