//! # cordon-core
//!
//! Shared foundations for the Cordon sandbox crates:
//!
//! - **Errors**: the core error enum and `Result` alias
//! - **Paths**: home/base directory resolution and tilde expansion
//! - **Validation**: structured, never-throwing validation reports

pub mod error;
pub mod paths;
pub mod validation;

pub use error::{Error, Result};
pub use validation::ValidationReport;
