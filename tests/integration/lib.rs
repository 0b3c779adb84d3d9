//! Shared helpers for Cordon integration tests.

use cordon_sandbox::{FilesystemPolicy, NetworkPolicy, NetworkSandbox};
use std::path::Path;

/// A network sandbox restricted to the documented allowlist scenario.
pub fn scenario_network_sandbox() -> NetworkSandbox {
    NetworkSandbox::new(NetworkPolicy::allow_domains([
        "api.github.com",
        "*.anthropic.com",
    ]))
}

/// A strict filesystem policy rooted at the given workspace.
pub fn strict_policy(workspace: &Path) -> FilesystemPolicy {
    FilesystemPolicy::strict(workspace)
}
