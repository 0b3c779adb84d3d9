//! Host isolation capability probing.
//!
//! Probing happens once, at startup, and the result is handed to
//! [`ProcessSandbox`](crate::process::ProcessSandbox) constructors. Keeping
//! the probe explicit, rather than a memoized module global, makes the
//! detection mockable and the chosen backend visible in one place.

use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// An isolation mechanism, in fixed preference order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationBackend {
    /// Namespace/mount isolation via the bubblewrap binary (Linux).
    Bubblewrap,
    /// Userspace syscall-translation sandbox (Linux, unprivileged).
    Proot,
    /// OS-native sandbox profiles via sandbox-exec (macOS).
    SandboxExec,
    /// Container runtime (podman or docker).
    ContainerRuntime,
    /// No isolation mechanism available; execution degrades to unsandboxed.
    None,
}

impl IsolationBackend {
    /// True when this backend provides any isolation at all.
    pub fn is_available(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Result of probing the host for isolation mechanisms.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Capabilities {
    /// Best available backend.
    pub backend: IsolationBackend,
    /// Version string reported by the backend tool, when it has one.
    pub version: Option<String>,
}

impl Capabilities {
    /// Capabilities reporting no isolation support at all.
    pub fn unavailable() -> Self {
        Self {
            backend: IsolationBackend::None,
            version: None,
        }
    }

    /// Capabilities pinned to a specific backend, for tests and callers
    /// that manage their own detection.
    pub fn with_backend(backend: IsolationBackend) -> Self {
        Self {
            backend,
            version: None,
        }
    }
}

/// Probes which isolation mechanisms the host offers.
pub struct CapabilityDetector;

impl CapabilityDetector {
    /// Probe the host, returning the first available mechanism in
    /// preference order: bubblewrap, proot, sandbox-exec, container
    /// runtime. Call once at startup and pass the result into sandbox
    /// constructors.
    pub async fn probe() -> Capabilities {
        // Namespace tools are only a candidate on Linux-family hosts.
        if cfg!(target_os = "linux") {
            if let Some(version) = probe_version("bwrap").await {
                info!(%version, "isolation backend: bubblewrap");
                return Capabilities {
                    backend: IsolationBackend::Bubblewrap,
                    version: Some(version),
                };
            }
            if let Some(version) = probe_version("proot").await {
                info!(%version, "isolation backend: proot");
                return Capabilities {
                    backend: IsolationBackend::Proot,
                    version: Some(version),
                };
            }
        }

        if cfg!(target_os = "macos") && Path::new("/usr/bin/sandbox-exec").exists() {
            info!("isolation backend: sandbox-exec");
            return Capabilities {
                backend: IsolationBackend::SandboxExec,
                version: None,
            };
        }

        for runtime in ["podman", "docker"] {
            if let Some(version) = probe_version(runtime).await {
                info!(runtime, %version, "isolation backend: container runtime");
                return Capabilities {
                    backend: IsolationBackend::ContainerRuntime,
                    version: Some(version),
                };
            }
        }

        debug!("no isolation backend available");
        Capabilities::unavailable()
    }
}

/// Run `{tool} --version` and return the first output line on success.
async fn probe_version(tool: &str) -> Option<String> {
    let output = tokio::process::Command::new(tool)
        .arg("--version")
        .output()
        .await
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let stdout = String::from_utf8_lossy(&output.stdout);
    stdout.lines().next().map(|line| line.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_none_backend_is_unavailable() {
        assert!(!IsolationBackend::None.is_available());
        assert!(IsolationBackend::Bubblewrap.is_available());
        assert!(!Capabilities::unavailable().backend.is_available());
    }

    #[test]
    fn test_pinned_backend() {
        let caps = Capabilities::with_backend(IsolationBackend::Bubblewrap);
        assert_eq!(caps.backend, IsolationBackend::Bubblewrap);
        assert!(caps.version.is_none());
    }

    #[tokio::test]
    async fn test_probe_does_not_panic() {
        // Whatever the host offers, probing must produce a usable answer.
        let caps = CapabilityDetector::probe().await;
        if caps.backend == IsolationBackend::None {
            assert!(caps.version.is_none());
        }
    }

    #[tokio::test]
    async fn test_probe_version_missing_tool() {
        assert!(probe_version("cordon-no-such-tool").await.is_none());
    }
}
