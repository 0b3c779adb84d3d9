//! Filesystem access policy.
//!
//! A policy is an ordered pair of rule lists evaluated deny-first: a path
//! matched by any deny rule is refused regardless of allow rules. Paths that
//! match no rule fall through to the default action.

use crate::fs::glob::{match_path_pattern, normalize_path};
use cordon_core::validation::ValidationReport;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::Path;
use tracing::debug;

/// A file operation subject to policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PathOperation {
    Read,
    Write,
    Execute,
}

impl fmt::Display for PathOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read => write!(f, "read"),
            Self::Write => write!(f, "write"),
            Self::Execute => write!(f, "execute"),
        }
    }
}

/// Whether unmatched paths are allowed or denied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyAction {
    Allow,
    #[default]
    Deny,
}

/// A single allow or deny rule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PathRule {
    /// Glob pattern the normalized path is matched against.
    pub pattern: String,

    /// Operations this rule applies to. `None` means all operations.
    #[serde(default)]
    pub operations: Option<Vec<PathOperation>>,

    /// Human-readable description for audit output.
    #[serde(default)]
    pub description: String,
}

impl PathRule {
    /// Create a rule covering all operations.
    pub fn new(pattern: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            operations: None,
            description: description.into(),
        }
    }

    /// Restrict the rule to specific operations.
    pub fn with_operations(mut self, operations: Vec<PathOperation>) -> Self {
        self.operations = Some(operations);
        self
    }

    /// True when this rule covers the requested operation.
    pub fn applies_to(&self, operation: PathOperation) -> bool {
        match &self.operations {
            Some(operations) => operations.contains(&operation),
            None => true,
        }
    }

    /// Canonical form of the operation set, used for deduplication.
    fn operations_key(&self) -> Option<Vec<PathOperation>> {
        self.operations.as_ref().map(|ops| {
            let mut sorted = ops.clone();
            sorted.sort();
            sorted.dedup();
            sorted
        })
    }
}

/// Ordered allow/deny policy over path globs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilesystemPolicy {
    /// Rules granting access.
    #[serde(default)]
    pub allowed_paths: Vec<PathRule>,

    /// Rules refusing access. Evaluated first; a match always wins.
    #[serde(default)]
    pub denied_paths: Vec<PathRule>,

    /// Action when no rule matches.
    #[serde(default)]
    pub default_action: PolicyAction,

    /// Whether pattern matching distinguishes case.
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
}

fn default_true() -> bool {
    true
}

impl Default for FilesystemPolicy {
    fn default() -> Self {
        Self {
            allowed_paths: Vec::new(),
            denied_paths: Vec::new(),
            default_action: PolicyAction::Deny,
            case_sensitive: true,
        }
    }
}

/// Credential and key locations refused even by permissive policies.
const SENSITIVE_HOME_PATHS: &[(&str, &str)] = &[
    (".ssh", "SSH keys"),
    (".gnupg", "GPG keys"),
    (".aws", "AWS credentials"),
    (".config/gcloud", "Google Cloud credentials"),
];

impl FilesystemPolicy {
    /// Check whether `operation` on `path` is permitted.
    ///
    /// The path is normalized to an absolute lexical form first; a path that
    /// cannot be normalized is denied. Deny rules are evaluated before allow
    /// rules and always win on match.
    pub fn is_allowed(&self, path: impl AsRef<Path>, operation: PathOperation) -> bool {
        let path = path.as_ref();
        let Some(normalized) = normalize_path(path) else {
            debug!(path = %path.display(), "path normalization failed, denying");
            return false;
        };
        let normalized = normalized.to_string_lossy();

        for rule in &self.denied_paths {
            if rule.applies_to(operation)
                && match_path_pattern(&normalized, &rule.pattern, self.case_sensitive)
            {
                debug!(path = %normalized, rule = %rule.pattern, "denied by rule");
                return false;
            }
        }

        for rule in &self.allowed_paths {
            if rule.applies_to(operation)
                && match_path_pattern(&normalized, &rule.pattern, self.case_sensitive)
            {
                return true;
            }
        }

        self.default_action == PolicyAction::Allow
    }

    /// Default policy for agent sessions: the working directory, the system
    /// temp directory, and the Cordon config directory are accessible;
    /// credential stores and the shadow password file are refused; anything
    /// else falls through to deny.
    pub fn default_policy(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_string_lossy().into_owned();
        let temp = cordon_core::paths::temp_dir().to_string_lossy().into_owned();

        let mut allowed_paths = vec![
            PathRule::new(working_dir, "Working directory"),
            PathRule::new(temp, "System temporary directory"),
        ];
        if let Ok(base) = cordon_core::paths::base_dir() {
            allowed_paths.push(PathRule::new(
                base.to_string_lossy().into_owned(),
                "Cordon configuration",
            ));
        }

        Self {
            allowed_paths,
            denied_paths: Self::sensitive_rules(),
            default_action: PolicyAction::Deny,
            case_sensitive: true,
        }
    }

    /// Permissive policy: everything is accessible except key material and
    /// the shadow password file. The working directory is implicitly covered
    /// by the blanket allow rule.
    pub fn permissive(_working_dir: impl AsRef<Path>) -> Self {
        Self {
            allowed_paths: vec![PathRule::new("/**", "Entire filesystem")],
            denied_paths: Self::sensitive_rules(),
            default_action: PolicyAction::Allow,
            case_sensitive: true,
        }
    }

    /// Strict policy: only the working directory and sandbox-owned temporary
    /// directories are accessible. No deny rules; everything else falls
    /// through to the deny default.
    pub fn strict(working_dir: impl AsRef<Path>) -> Self {
        let working_dir = working_dir.as_ref().to_string_lossy().into_owned();
        let temp = cordon_core::paths::temp_dir();
        let temp_scoped = temp.join("cordon-*").to_string_lossy().into_owned();

        Self {
            allowed_paths: vec![
                PathRule::new(&working_dir, "Working directory"),
                PathRule::new(temp_scoped.clone(), "Sandbox temporary directories"),
                PathRule::new(format!("{temp_scoped}/**"), "Sandbox temporary files"),
            ],
            denied_paths: Vec::new(),
            default_action: PolicyAction::Deny,
            case_sensitive: true,
        }
    }

    fn sensitive_rules() -> Vec<PathRule> {
        let mut rules = Vec::new();
        for (relative, description) in SENSITIVE_HOME_PATHS {
            if let Ok(pattern) = cordon_core::paths::home_pattern(relative) {
                rules.push(PathRule::new(pattern, *description));
            }
        }
        rules.push(PathRule::new("/etc/shadow", "Shadow password file"));
        rules
    }

    /// Merge policies in order: later `default_action` and `case_sensitive`
    /// win; rule lists concatenate with exact duplicates (same pattern and
    /// same operation set) removed.
    pub fn merge(policies: impl IntoIterator<Item = FilesystemPolicy>) -> Self {
        let mut merged = Self::default();
        for policy in policies {
            merged.default_action = policy.default_action;
            merged.case_sensitive = policy.case_sensitive;
            merged.allowed_paths.extend(policy.allowed_paths);
            merged.denied_paths.extend(policy.denied_paths);
        }

        merged.allowed_paths = dedup_rules(merged.allowed_paths);
        merged.denied_paths = dedup_rules(merged.denied_paths);
        merged
    }

    /// Structural validation. Never fails: problems are reported as a list.
    ///
    /// Operation names are already constrained by the type system; what
    /// remains checkable is pattern presence and empty operation sets.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        for (index, rule) in self.denied_paths.iter().enumerate() {
            validate_rule(rule, "denied", index, &mut errors);
        }
        for (index, rule) in self.allowed_paths.iter().enumerate() {
            validate_rule(rule, "allowed", index, &mut errors);
        }
        ValidationReport::from_errors(errors)
    }
}

fn validate_rule(rule: &PathRule, list: &str, index: usize, errors: &mut Vec<String>) {
    if rule.pattern.is_empty() {
        errors.push(format!("{list} rule {index}: empty pattern"));
    }
    if let Some(operations) = &rule.operations {
        if operations.is_empty() {
            errors.push(format!(
                "{list} rule {index} ({}): empty operation set matches nothing",
                rule.pattern
            ));
        }
    }
}

fn dedup_rules(rules: Vec<PathRule>) -> Vec<PathRule> {
    let mut seen: HashSet<(String, Option<Vec<PathOperation>>)> = HashSet::new();
    rules
        .into_iter()
        .filter(|rule| seen.insert((rule.pattern.clone(), rule.operations_key())))
        .collect()
}
