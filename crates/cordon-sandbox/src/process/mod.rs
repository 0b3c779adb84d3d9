//! Process sandboxing: bubblewrap argument construction, supervised
//! execution with timeout escalation, and capability probing.

pub mod bwrap;
pub mod capability;
pub mod executor;
pub mod options;

pub use bwrap::build_arguments;
pub use capability::{Capabilities, CapabilityDetector, IsolationBackend};
pub use executor::{ExecutionOutput, ProcessSandbox};
pub use options::{BindMount, ProcessSandboxOptions, TmpfsMount};
