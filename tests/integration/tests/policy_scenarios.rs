//! End-to-end policy scenarios across the filesystem and network sandboxes.

use cordon_integration_tests::{scenario_network_sandbox, strict_policy};
use cordon_sandbox::{
    FileSystemPort, FilesystemPolicy, FilesystemSandbox, PathOperation, PathRule, PolicyAction,
};
use std::path::Path;

#[test]
fn strict_policy_allows_workspace_only() {
    let policy = strict_policy(Path::new("/work"));

    assert!(policy.is_allowed("/work/a.ts", PathOperation::Read));
    assert!(policy.is_allowed("/work/nested/deep/b.rs", PathOperation::Write));
    assert!(!policy.is_allowed("/etc/passwd", PathOperation::Read));
    assert!(!policy.is_allowed("/home/user/other", PathOperation::Read));
}

#[test]
fn deny_rules_always_win() {
    let policy = FilesystemPolicy {
        allowed_paths: vec![PathRule::new("/work/**", "workspace")],
        denied_paths: vec![PathRule::new("/work/.env", "env secrets")],
        default_action: PolicyAction::Deny,
        case_sensitive: true,
    };

    assert!(policy.is_allowed("/work/src/main.rs", PathOperation::Read));
    assert!(!policy.is_allowed("/work/.env", PathOperation::Read));
    // Lexical traversal back into the denied file is still denied.
    assert!(!policy.is_allowed("/work/src/../.env", PathOperation::Read));
}

#[test]
fn default_deny_with_no_rules_denies_all() {
    let policy = FilesystemPolicy::default();
    for path in ["/", "/tmp/x", "/home/user/file", "relative/file"] {
        for operation in [
            PathOperation::Read,
            PathOperation::Write,
            PathOperation::Execute,
        ] {
            assert!(!policy.is_allowed(path, operation), "{path} {operation}");
        }
    }
}

#[test]
fn network_allowlist_scenario() {
    let sandbox = scenario_network_sandbox();

    assert!(sandbox.is_request_allowed("https://api.github.com/users"));
    assert!(!sandbox.is_request_allowed("https://random.com/api"));
    assert!(sandbox.is_request_allowed("https://sub.anthropic.com/x"));
    // The wildcard base itself is not a subdomain.
    assert!(!sandbox.is_request_allowed("https://anthropic.com/"));
}

#[tokio::test]
async fn checked_fs_denies_outside_workspace() {
    let workspace = tempfile::tempdir().unwrap();
    let sandbox = FilesystemSandbox::new(FilesystemPolicy::strict(workspace.path()));
    let fs = sandbox.checked_fs();

    let inside = workspace.path().join("notes.txt");
    fs.write(&inside, b"in bounds").await.unwrap();
    assert_eq!(fs.read_to_string(&inside).await.unwrap(), "in bounds");

    let err = fs.read(Path::new("/etc/hostname")).await.unwrap_err();
    assert!(err.is_denial());
}

#[tokio::test]
async fn temp_dirs_live_inside_strict_policy() {
    let workspace = tempfile::tempdir().unwrap();
    let sandbox = FilesystemSandbox::new(FilesystemPolicy::strict(workspace.path()));

    // Sandbox-owned temp dirs are covered by the strict policy's scoped
    // temp rules.
    let temp = sandbox.create_temp_dir("scenario").await.unwrap();
    assert!(sandbox.is_allowed(temp.join("scratch"), PathOperation::Write));

    sandbox.cleanup_temp_dirs().await.unwrap();
    sandbox.cleanup_temp_dirs().await.unwrap();
}

#[test]
fn policies_roundtrip_through_json() {
    let policy = FilesystemPolicy::strict("/work");
    let json = serde_json::to_string(&policy).unwrap();
    let loaded: FilesystemPolicy = serde_json::from_str(&json).unwrap();

    assert!(loaded.is_allowed("/work/a.ts", PathOperation::Read));
    assert!(!loaded.is_allowed("/etc/passwd", PathOperation::Read));
}
