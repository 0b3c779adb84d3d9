//! Process sandbox execution scenarios.
//!
//! These run against whatever the host offers: with bubblewrap present the
//! commands execute isolated, otherwise the fallback path runs them
//! unsandboxed. Assertions only rely on behavior common to both paths,
//! except where `sandboxed` is pinned through an explicit capability.

use cordon_sandbox::{
    build_arguments, Capabilities, CapabilityDetector, ProcessSandbox, ProcessSandboxOptions,
};
use std::time::{Duration, Instant};

#[tokio::test]
async fn probed_capabilities_execute_commands() -> anyhow::Result<()> {
    let capabilities = CapabilityDetector::probe().await;
    let sandbox = ProcessSandbox::new(ProcessSandboxOptions::new("/"), capabilities);

    let output = sandbox.execute("echo", &["containment"]).await?;
    assert_eq!(output.exit_code, 0);
    assert!(output.stdout.contains("containment"));
    Ok(())
}

#[tokio::test]
async fn unavailable_backend_degrades_observably() {
    let sandbox = ProcessSandbox::new(
        ProcessSandboxOptions::new("/"),
        Capabilities::unavailable(),
    );

    let output = sandbox.execute("echo", &["degraded"]).await.unwrap();
    assert!(output.success());
    // Reduced isolation is surfaced, never hidden.
    assert!(!output.sandboxed);
}

#[tokio::test]
async fn timeout_escalation_kills_sleeper() {
    let sandbox = ProcessSandbox::new(
        ProcessSandboxOptions::new("/").with_timeout_ms(5_000),
        Capabilities::unavailable(),
    );

    let started = Instant::now();
    let output = sandbox.execute("sleep", &["30"]).await.unwrap();
    let elapsed = started.elapsed();

    assert!(output.killed);
    assert!(!output.success());
    // 5s timeout plus at most 1s terminate-to-kill grace, with headroom.
    assert!(elapsed < Duration::from_secs(8), "took {elapsed:?}");
}

#[test]
fn argument_vector_contract() {
    let options = ProcessSandboxOptions::isolated("/work")
        .with_ro_bind("/nonexistent/model-cache");
    let argv = build_arguments(&options, "cargo", &["build", "--release"]);

    // The end-of-options separator sits immediately before the command.
    let separator = argv.iter().position(|arg| arg == "--").unwrap();
    let tail: Vec<&str> = argv[separator..].iter().map(String::as_str).collect();
    assert_eq!(tail, vec!["--", "cargo", "build", "--release"]);

    // Absent bind sources never appear.
    assert!(!argv.iter().any(|arg| arg.contains("/nonexistent")));
}
