//! Sandbox policy engine for AI agent tool execution.
//!
//! Cordon bounds the blast radius of model-generated shell commands, file
//! operations, and network requests with three cooperating layers:
//!
//! - **Filesystem**: an allow/deny glob policy evaluated before any file I/O,
//!   plus scoped temporary-directory management
//! - **Network**: domain/port/protocol filtering with sliding-window rate
//!   limiting, request logging, and aggregate statistics
//! - **Process**: OS-level namespace isolation via bubblewrap, with
//!   capability probing and graceful degradation to unsandboxed execution
//!
//! All checks fail closed: unparseable paths and URLs are denied, and deny
//! rules always win over allow rules.

pub mod error;
pub mod fs;
pub mod net;
pub mod process;

pub use error::SandboxError;
pub use fs::{
    CheckedFs, FileSystemPort, FilesystemPolicy, FilesystemSandbox, PathOperation, PathRule,
    PolicyAction, TokioFs,
};
pub use net::{
    CheckedHttp, HttpPort, HttpRequest, HttpResponse, NetworkPolicy, NetworkSandbox, NetworkStats,
    RequestLogEntry, ReqwestHttp,
};
pub use process::{
    build_arguments, BindMount, Capabilities, CapabilityDetector, ExecutionOutput,
    IsolationBackend, ProcessSandbox, ProcessSandboxOptions, TmpfsMount,
};

/// Result type for sandbox operations.
pub type Result<T> = std::result::Result<T, SandboxError>;
