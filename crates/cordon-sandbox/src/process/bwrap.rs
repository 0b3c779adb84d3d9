//! Bubblewrap argument construction.
//!
//! The flag names and their ordering are an external compatibility contract
//! with the `bwrap` binary: mounts apply in argument order and later mounts
//! shadow earlier ones, so this vector must be reproduced exactly for the
//! isolation to take effect.

use crate::process::options::ProcessSandboxOptions;
use std::path::Path;

/// System library and binary roots exposed read-only when present.
const SYSTEM_RO_PATHS: &[&str] = &["/usr", "/lib", "/lib64", "/bin", "/sbin", "/opt"];

/// Identity, resolver, and certificate files under /etc exposed read-only
/// when present. Nothing else from /etc is visible.
const ETC_RO_PATHS: &[&str] = &[
    "/etc/resolv.conf",
    "/etc/hosts",
    "/etc/nsswitch.conf",
    "/etc/ssl",
    "/etc/ca-certificates",
    "/etc/passwd",
    "/etc/group",
    "/etc/localtime",
];

/// Device nodes bound when the full host /dev is not shared.
const MINIMAL_DEV_NODES: &[&str] = &["/dev/null", "/dev/zero", "/dev/random", "/dev/urandom"];

/// Build the complete bwrap argument vector for one invocation.
///
/// The returned vector ends with the `--` end-of-options separator followed
/// immediately by `command` and `args`. Bind mounts whose source does not
/// exist on disk are silently excluded; bwrap would otherwise refuse to
/// start.
pub fn build_arguments(
    options: &ProcessSandboxOptions,
    command: &str,
    args: &[&str],
) -> Vec<String> {
    let mut argv: Vec<String> = Vec::new();

    // 1. Namespace isolation.
    if options.wants_namespace_isolation() {
        argv.push("--unshare-all".to_string());
    }

    // 2. Re-share the host network when explicitly requested.
    if options.share_network {
        argv.push("--share-net".to_string());
    }

    // 3. Supervision flags.
    if options.die_with_parent {
        argv.push("--die-with-parent".to_string());
    }
    if options.new_session {
        argv.push("--new-session".to_string());
    }

    // 4. Caller read-only binds.
    for bind in &options.ro_binds {
        if bind.source.exists() {
            push_bind(&mut argv, "--ro-bind", &bind.source, &bind.dest);
        }
    }

    // 5. Caller writable binds.
    for bind in &options.rw_binds {
        if bind.source.exists() {
            let flag = if bind.readonly { "--ro-bind" } else { "--bind" };
            push_bind(&mut argv, flag, &bind.source, &bind.dest);
        }
    }

    // 6. System library and binary roots.
    for path in SYSTEM_RO_PATHS {
        let path = Path::new(path);
        if path.exists() {
            push_bind(&mut argv, "--ro-bind", path, path);
        }
    }

    // 7. Identity/resolver/certificate files.
    for path in ETC_RO_PATHS {
        let path = Path::new(path);
        if path.exists() {
            push_bind(&mut argv, "--ro-bind", path, path);
        }
    }

    // 8. /proc, full or absent.
    if options.full_proc {
        argv.push("--proc".to_string());
        argv.push("/proc".to_string());
    }

    // 9. Devices.
    if options.full_dev {
        push_bind(&mut argv, "--dev-bind", Path::new("/dev"), Path::new("/dev"));
    } else {
        for node in MINIMAL_DEV_NODES {
            let node = Path::new(node);
            if node.exists() {
                push_bind(&mut argv, "--dev-bind", node, node);
            }
        }
    }

    // 10. tmpfs mounts.
    for mount in &options.tmpfs {
        argv.push("--tmpfs".to_string());
        argv.push(mount.dest.to_string_lossy().into_owned());
    }

    // 11. Working directory, writable and current.
    if options.working_dir.exists() {
        push_bind(&mut argv, "--bind", &options.working_dir, &options.working_dir);
    }
    argv.push("--chdir".to_string());
    argv.push(options.working_dir.to_string_lossy().into_owned());

    // 12. Caller's home, read-only.
    if let Some(home) = dirs::home_dir() {
        if home.exists() {
            push_bind(&mut argv, "--ro-bind", &home, &home);
        }
    }

    // 13. End of options, then the real command.
    argv.push("--".to_string());
    argv.push(command.to_string());
    argv.extend(args.iter().map(|arg| arg.to_string()));

    argv
}

fn push_bind(argv: &mut Vec<String>, flag: &str, source: &Path, dest: &Path) {
    argv.push(flag.to_string());
    argv.push(source.to_string_lossy().into_owned());
    argv.push(dest.to_string_lossy().into_owned());
}
