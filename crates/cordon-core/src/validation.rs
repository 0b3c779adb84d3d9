//! Structured validation reporting.
//!
//! Policy validation never fails with an error: malformed configuration is
//! reported as a list of messages the caller can surface, log, or reject on.

use serde::{Deserialize, Serialize};

/// Outcome of a structural validation pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationReport {
    /// True when no problems were found.
    pub valid: bool,
    /// Human-readable descriptions of every problem found.
    pub errors: Vec<String>,
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::ok()
    }
}

impl ValidationReport {
    /// Create a passing report.
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Build a report from collected error messages.
    ///
    /// An empty list yields a passing report.
    pub fn from_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Record a problem, marking the report invalid.
    pub fn push(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_report() {
        let report = ValidationReport::ok();
        assert!(report.valid);
        assert!(report.errors.is_empty());
    }

    #[test]
    fn test_from_errors() {
        let report = ValidationReport::from_errors(vec!["bad pattern".to_string()]);
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 1);

        let empty = ValidationReport::from_errors(Vec::new());
        assert!(empty.valid);
    }

    #[test]
    fn test_push_marks_invalid() {
        let mut report = ValidationReport::ok();
        report.push("rule 2: empty pattern");
        assert!(!report.valid);
    }
}
