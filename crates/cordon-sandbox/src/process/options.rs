//! Options describing one sandboxed process invocation.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// A host path exposed inside the isolated process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindMount {
    /// Path on the host.
    pub source: PathBuf,
    /// Path inside the sandbox.
    pub dest: PathBuf,
    /// Mount read-only.
    #[serde(default)]
    pub readonly: bool,
}

impl BindMount {
    /// Bind a path read-write at the same location.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        Self {
            source: path.clone(),
            dest: path,
            readonly: false,
        }
    }

    /// Bind a path read-only at the same location.
    pub fn read_only(path: impl Into<PathBuf>) -> Self {
        Self {
            readonly: true,
            ..Self::new(path)
        }
    }

    /// Bind a source to a different destination.
    pub fn mapped(source: impl Into<PathBuf>, dest: impl Into<PathBuf>) -> Self {
        Self {
            source: source.into(),
            dest: dest.into(),
            readonly: false,
        }
    }
}

/// A tmpfs mounted inside the isolated process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TmpfsMount {
    /// Mount point inside the sandbox.
    pub dest: PathBuf,
}

impl TmpfsMount {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }
}

/// Environment variable names stripped from sandboxed processes.
///
/// Loader and interpreter injection vectors: anything here can redirect
/// code execution before the sandboxed command even starts.
pub const BLOCKED_ENV_VARS: &[&str] = &[
    // Dynamic linker injection
    "LD_PRELOAD",
    "LD_LIBRARY_PATH",
    "LD_AUDIT",
    "DYLD_INSERT_LIBRARIES",
    "DYLD_LIBRARY_PATH",
    // Runtime injection
    "NODE_OPTIONS",
    "PYTHONSTARTUP",
    "PYTHONPATH",
    "RUBYOPT",
    "PERL5OPT",
    // Shell injection
    "BASH_ENV",
    "ENV",
    "IFS",
];

/// Configuration for one sandboxed invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessSandboxOptions {
    /// Unshare the user namespace.
    #[serde(default)]
    pub unshare_user: bool,

    /// Unshare the PID namespace.
    #[serde(default)]
    pub unshare_pid: bool,

    /// Unshare the network namespace.
    #[serde(default)]
    pub unshare_network: bool,

    /// Re-share the host network even under full namespace isolation.
    #[serde(default)]
    pub share_network: bool,

    /// Kill the sandboxed process when its supervisor dies.
    #[serde(default = "default_true")]
    pub die_with_parent: bool,

    /// Start the process in a new session, detached from the controlling
    /// terminal.
    #[serde(default = "default_true")]
    pub new_session: bool,

    /// Read-only bind mounts.
    #[serde(default)]
    pub ro_binds: Vec<BindMount>,

    /// Writable bind mounts.
    #[serde(default)]
    pub rw_binds: Vec<BindMount>,

    /// tmpfs mounts.
    #[serde(default)]
    pub tmpfs: Vec<TmpfsMount>,

    /// Mount a full /proc; omitted when false.
    #[serde(default)]
    pub full_proc: bool,

    /// Bind the whole host /dev; a minimal device set otherwise.
    #[serde(default)]
    pub full_dev: bool,

    /// Working directory, bound read-write and set as the chdir target.
    pub working_dir: PathBuf,

    /// Environment for the sandboxed process. Blocked injection variables
    /// are stripped regardless of what the caller supplies.
    #[serde(default)]
    pub env: HashMap<String, String>,

    /// Wall-clock timeout in milliseconds; `None` waits indefinitely.
    #[serde(default)]
    pub timeout_ms: Option<u64>,

    /// Cap on captured bytes per output stream.
    #[serde(default = "default_max_output")]
    pub max_output_size: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_output() -> usize {
    10 * 1024 * 1024 // 10 MB
}

impl Default for ProcessSandboxOptions {
    fn default() -> Self {
        Self {
            unshare_user: false,
            unshare_pid: false,
            unshare_network: false,
            share_network: false,
            die_with_parent: true,
            new_session: true,
            ro_binds: Vec::new(),
            rw_binds: Vec::new(),
            tmpfs: Vec::new(),
            full_proc: false,
            full_dev: false,
            working_dir: PathBuf::from("/"),
            env: HashMap::new(),
            timeout_ms: None,
            max_output_size: default_max_output(),
        }
    }
}

impl ProcessSandboxOptions {
    /// Create options rooted at the given working directory.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            ..Default::default()
        }
    }

    /// Fully isolated options: user/pid/network namespaces unshared, private
    /// /tmp, minimal /dev, no /proc.
    pub fn isolated(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            unshare_user: true,
            unshare_pid: true,
            unshare_network: true,
            tmpfs: vec![TmpfsMount::new("/tmp")],
            ..Self::new(working_dir)
        }
    }

    /// Builder method to unshare user/pid/network namespaces.
    pub fn with_full_isolation(mut self) -> Self {
        self.unshare_user = true;
        self.unshare_pid = true;
        self.unshare_network = true;
        self
    }

    /// Builder method to re-share the host network.
    pub fn with_network(mut self) -> Self {
        self.share_network = true;
        self
    }

    /// Builder method to add a read-only bind mount.
    pub fn with_ro_bind(mut self, path: impl Into<PathBuf>) -> Self {
        self.ro_binds.push(BindMount::read_only(path));
        self
    }

    /// Builder method to add a writable bind mount.
    pub fn with_rw_bind(mut self, path: impl Into<PathBuf>) -> Self {
        self.rw_binds.push(BindMount::new(path));
        self
    }

    /// Builder method to add a tmpfs mount.
    pub fn with_tmpfs(mut self, dest: impl Into<PathBuf>) -> Self {
        self.tmpfs.push(TmpfsMount::new(dest));
        self
    }

    /// Builder method to set an environment variable.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Builder method to set the timeout in milliseconds.
    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// True when any namespace unsharing was requested.
    pub fn wants_namespace_isolation(&self) -> bool {
        self.unshare_user || self.unshare_pid || self.unshare_network
    }

    /// The caller's environment with injection variables stripped.
    pub fn filtered_env(&self) -> HashMap<String, String> {
        self.env
            .iter()
            .filter(|(key, _)| !BLOCKED_ENV_VARS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = ProcessSandboxOptions::default();
        assert!(options.die_with_parent);
        assert!(options.new_session);
        assert!(!options.wants_namespace_isolation());
    }

    #[test]
    fn test_isolated_preset() {
        let options = ProcessSandboxOptions::isolated("/work");
        assert!(options.wants_namespace_isolation());
        assert_eq!(options.working_dir, PathBuf::from("/work"));
        assert_eq!(options.tmpfs, vec![TmpfsMount::new("/tmp")]);
    }

    #[test]
    fn test_builder_chain() {
        let options = ProcessSandboxOptions::new("/work")
            .with_full_isolation()
            .with_network()
            .with_ro_bind("/data")
            .with_timeout_ms(5_000);

        assert!(options.unshare_network);
        assert!(options.share_network);
        assert_eq!(options.ro_binds, vec![BindMount::read_only("/data")]);
        assert_eq!(options.timeout_ms, Some(5_000));
    }

    #[test]
    fn test_env_filtering() {
        let options = ProcessSandboxOptions::new("/work")
            .with_env("PATH", "/usr/bin")
            .with_env("LD_PRELOAD", "/tmp/evil.so")
            .with_env("BASH_ENV", "/tmp/evil.sh");

        let env = options.filtered_env();
        assert_eq!(env.get("PATH").map(String::as_str), Some("/usr/bin"));
        assert!(!env.contains_key("LD_PRELOAD"));
        assert!(!env.contains_key("BASH_ENV"));
    }
}
