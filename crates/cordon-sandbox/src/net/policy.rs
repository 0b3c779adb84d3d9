//! Network access policy and rate limiting.

use crate::net::glob::match_domain_pattern;
use cordon_core::validation::ValidationReport;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Width of the rate-limiting window.
const RATE_WINDOW: Duration = Duration::from_secs(60);

/// Domain/port/protocol policy for outbound requests.
///
/// Each dimension is evaluated deny-first; an empty allow list means
/// unrestricted for that dimension (open by default when unconfigured).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkPolicy {
    /// Domain patterns granted access. Empty means every domain.
    #[serde(default)]
    pub allowed_domains: Vec<String>,

    /// Domain patterns refused access. Evaluated first; a match always wins.
    #[serde(default)]
    pub denied_domains: Vec<String>,

    /// Ports granted access. Empty means every port.
    #[serde(default)]
    pub allowed_ports: Vec<u16>,

    /// Ports refused access.
    #[serde(default)]
    pub denied_ports: Vec<u16>,

    /// URL schemes granted access. Empty means every scheme.
    #[serde(default = "default_protocols")]
    pub allowed_protocols: Vec<String>,

    /// Admissions per sliding 60-second window. `None` means unlimited.
    #[serde(default)]
    pub max_requests_per_minute: Option<u32>,

    /// Whether the sandbox records a log entry per request.
    #[serde(default = "default_true")]
    pub enable_logging: bool,
}

fn default_protocols() -> Vec<String> {
    vec!["http".to_string(), "https".to_string()]
}

fn default_true() -> bool {
    true
}

impl Default for NetworkPolicy {
    fn default() -> Self {
        Self {
            allowed_domains: Vec::new(),
            denied_domains: Vec::new(),
            allowed_ports: Vec::new(),
            denied_ports: Vec::new(),
            allowed_protocols: default_protocols(),
            max_requests_per_minute: None,
            enable_logging: true,
        }
    }
}

impl NetworkPolicy {
    /// Restrict requests to the given domain patterns.
    pub fn allow_domains(domains: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            allowed_domains: domains.into_iter().map(Into::into).collect(),
            ..Default::default()
        }
    }

    /// Check a hostname: deny-list match refuses; an empty allow list admits
    /// everything else; otherwise an allow-list match is required.
    pub fn is_domain_allowed(&self, domain: &str) -> bool {
        if self
            .denied_domains
            .iter()
            .any(|pattern| match_domain_pattern(domain, pattern))
        {
            return false;
        }
        if self.allowed_domains.is_empty() {
            return true;
        }
        self.allowed_domains
            .iter()
            .any(|pattern| match_domain_pattern(domain, pattern))
    }

    /// Check a port against the deny then allow lists (exact membership).
    pub fn is_port_allowed(&self, port: u16) -> bool {
        if self.denied_ports.contains(&port) {
            return false;
        }
        self.allowed_ports.is_empty() || self.allowed_ports.contains(&port)
    }

    /// Check a URL scheme against the allow list (exact membership,
    /// case-insensitive).
    pub fn is_protocol_allowed(&self, protocol: &str) -> bool {
        let protocol = protocol.to_lowercase();
        self.allowed_protocols.is_empty()
            || self
                .allowed_protocols
                .iter()
                .any(|allowed| allowed.to_lowercase() == protocol)
    }

    /// Structural validation. Never fails: problems are reported as a list.
    pub fn validate(&self) -> ValidationReport {
        let mut errors = Vec::new();
        for (index, pattern) in self
            .denied_domains
            .iter()
            .chain(self.allowed_domains.iter())
            .enumerate()
        {
            if pattern.is_empty() {
                errors.push(format!("domain pattern {index}: empty"));
            }
        }
        for protocol in &self.allowed_protocols {
            if protocol.is_empty() {
                errors.push("allowed protocol: empty".to_string());
            }
        }
        if self.max_requests_per_minute == Some(0) {
            errors.push("max_requests_per_minute of 0 admits nothing".to_string());
        }
        ValidationReport::from_errors(errors)
    }
}

/// Sliding-window admission counter.
///
/// Keeps a timestamp per admitted request and continuously evicts entries
/// older than 60 seconds. Checking is separate from recording: a check
/// purges and compares, while recording appends. Callers record only for
/// admitted requests that actually proceed to dispatch.
#[derive(Debug)]
pub struct RateLimiter {
    max_per_minute: Option<u32>,
    timestamps: Vec<Instant>,
}

impl RateLimiter {
    /// Create a limiter. `None` disables limiting entirely.
    pub fn new(max_per_minute: Option<u32>) -> Self {
        Self {
            max_per_minute,
            timestamps: Vec::new(),
        }
    }

    /// Would a request at `now` be admitted?
    pub fn check_at(&mut self, now: Instant) -> bool {
        self.purge(now);
        match self.max_per_minute {
            None => true,
            Some(max) => self.timestamps.len() < max as usize,
        }
    }

    /// Record a dispatched request at `now`.
    pub fn record_at(&mut self, now: Instant) {
        self.timestamps.push(now);
    }

    /// Would a request right now be admitted?
    pub fn check(&mut self) -> bool {
        self.check_at(Instant::now())
    }

    /// Record a dispatched request right now.
    pub fn record(&mut self) {
        self.record_at(Instant::now());
    }

    fn purge(&mut self, now: Instant) {
        self.timestamps
            .retain(|stamp| now.duration_since(*stamp) < RATE_WINDOW);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_domain_deny_wins() {
        let policy = NetworkPolicy {
            allowed_domains: vec!["**.example.com".to_string()],
            denied_domains: vec!["internal.example.com".to_string()],
            ..Default::default()
        };
        assert!(policy.is_domain_allowed("api.example.com"));
        assert!(!policy.is_domain_allowed("internal.example.com"));
    }

    #[test]
    fn test_empty_allow_list_is_open() {
        let policy = NetworkPolicy::default();
        assert!(policy.is_domain_allowed("anything.example.net"));
        assert!(policy.is_port_allowed(8443));
    }

    #[test]
    fn test_allow_list_scenario() {
        let policy =
            NetworkPolicy::allow_domains(["api.github.com", "*.anthropic.com"]);
        assert!(policy.is_domain_allowed("api.github.com"));
        assert!(policy.is_domain_allowed("sub.anthropic.com"));
        assert!(!policy.is_domain_allowed("random.com"));
        // `*.base` excludes the base domain itself.
        assert!(!policy.is_domain_allowed("anthropic.com"));
    }

    #[test]
    fn test_port_lists() {
        let policy = NetworkPolicy {
            allowed_ports: vec![443, 8443],
            denied_ports: vec![8443],
            ..Default::default()
        };
        assert!(policy.is_port_allowed(443));
        assert!(!policy.is_port_allowed(8443));
        assert!(!policy.is_port_allowed(80));
    }

    #[test]
    fn test_protocols() {
        let policy = NetworkPolicy::default();
        assert!(policy.is_protocol_allowed("https"));
        assert!(policy.is_protocol_allowed("HTTP"));
        assert!(!policy.is_protocol_allowed("ftp"));

        let open = NetworkPolicy {
            allowed_protocols: Vec::new(),
            ..Default::default()
        };
        assert!(open.is_protocol_allowed("ftp"));
    }

    #[test]
    fn test_rate_limiter_window() {
        let mut limiter = RateLimiter::new(Some(5));
        let base = Instant::now();

        for _ in 0..5 {
            assert!(limiter.check_at(base));
            limiter.record_at(base);
        }
        // Sixth admission within the window is refused.
        assert!(!limiter.check_at(base));

        // After the window slides past the burst, admission resumes.
        let later = base + Duration::from_secs(61);
        assert!(limiter.check_at(later));
    }

    #[test]
    fn test_rate_limiter_unlimited() {
        let mut limiter = RateLimiter::new(None);
        let base = Instant::now();
        for _ in 0..1000 {
            assert!(limiter.check_at(base));
            limiter.record_at(base);
        }
    }

    #[test]
    fn test_check_does_not_consume_budget() {
        let mut limiter = RateLimiter::new(Some(1));
        let base = Instant::now();
        assert!(limiter.check_at(base));
        assert!(limiter.check_at(base));
        limiter.record_at(base);
        assert!(!limiter.check_at(base));
    }

    #[test]
    fn test_validate() {
        let good = NetworkPolicy::allow_domains(["api.github.com"]);
        assert!(good.validate().valid);

        let bad = NetworkPolicy {
            allowed_domains: vec![String::new()],
            max_requests_per_minute: Some(0),
            ..Default::default()
        };
        let report = bad.validate();
        assert!(!report.valid);
        assert_eq!(report.errors.len(), 2);
    }
}
