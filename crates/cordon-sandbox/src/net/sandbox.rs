//! Network sandbox: admission checks, request logging, and statistics.

use crate::net::policy::{NetworkPolicy, RateLimiter};
use crate::net::port::{CheckedHttp, HttpPort, ReqwestHttp};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Ring-buffer capacity of the request log; the oldest entry is evicted
/// once the cap is reached.
const MAX_LOG_ENTRIES: usize = 10_000;

/// One observed request, allowed or denied.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestLogEntry {
    /// When the request was evaluated.
    pub timestamp: DateTime<Utc>,
    /// Full request URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// URL scheme.
    pub protocol: String,
    /// Target hostname.
    pub hostname: String,
    /// Target port.
    pub port: u16,
    /// Whether the request was admitted.
    pub allowed: bool,
    /// Denial reason, present only for denied requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Wall time of the dispatched request in milliseconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
    /// HTTP status code of the response, when one arrived.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Transport-level error, when the dispatch failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Aggregate request statistics.
#[derive(Debug, Clone, Serialize)]
pub struct NetworkStats {
    /// Requests evaluated, allowed or denied.
    pub total: u64,
    /// Requests admitted.
    pub allowed: u64,
    /// Requests refused.
    pub denied: u64,
    /// Log entries observed in the trailing 60 seconds.
    pub last_minute: u64,
    /// Ten most-requested hostnames with counts, most frequent first;
    /// ties break alphabetically.
    pub top_domains: Vec<(String, u64)>,
    /// Ten most-requested ports with counts.
    pub top_ports: Vec<(u16, u64)>,
    /// Request count per URL scheme.
    pub protocols: HashMap<String, u64>,
}

#[derive(Debug, Default)]
pub(crate) struct Counters {
    total: u64,
    allowed: u64,
    denied: u64,
    domains: HashMap<String, u64>,
    ports: HashMap<u16, u64>,
    protocols: HashMap<String, u64>,
}

/// State shared between a [`NetworkSandbox`] and its checked HTTP facades.
pub(crate) struct NetState {
    pub(crate) limiter: Mutex<RateLimiter>,
    log: Mutex<VecDeque<RequestLogEntry>>,
    counters: Mutex<Counters>,
}

impl NetState {
    fn new(policy: &NetworkPolicy) -> Self {
        Self {
            limiter: Mutex::new(RateLimiter::new(policy.max_requests_per_minute)),
            log: Mutex::new(VecDeque::new()),
            counters: Mutex::new(Counters::default()),
        }
    }

    /// Update counters and, when logging is enabled, append the entry to the
    /// capped log. Domain/port/protocol counters move only for allowed
    /// requests.
    pub(crate) fn record(&self, entry: RequestLogEntry, log_enabled: bool) {
        {
            let mut counters = self.counters.lock();
            counters.total += 1;
            if entry.allowed {
                counters.allowed += 1;
                *counters.domains.entry(entry.hostname.clone()).or_insert(0) += 1;
                *counters.ports.entry(entry.port).or_insert(0) += 1;
                *counters
                    .protocols
                    .entry(entry.protocol.clone())
                    .or_insert(0) += 1;
            } else {
                counters.denied += 1;
            }
        }

        if log_enabled {
            let mut log = self.log.lock();
            if log.len() == MAX_LOG_ENTRIES {
                log.pop_front();
            }
            log.push_back(entry);
        }
    }
}

/// The parsed, admitted target of a request.
pub(crate) struct Admission {
    pub(crate) hostname: String,
    pub(crate) port: u16,
    pub(crate) protocol: String,
}

/// Evaluate a URL against the policy, short-circuiting on the first failing
/// dimension: parse, protocol, domain, port, then rate limit.
///
/// Side-effect-free apart from rate-window purging; the admission timestamp
/// is recorded separately, only for requests that proceed to dispatch.
pub(crate) fn evaluate(
    policy: &NetworkPolicy,
    state: &NetState,
    url: &str,
) -> Result<Admission, String> {
    let parsed = Url::parse(url).map_err(|e| format!("unparseable URL: {e}"))?;

    let protocol = parsed.scheme().to_string();
    if !policy.is_protocol_allowed(&protocol) {
        return Err(format!("protocol '{protocol}' not allowed"));
    }

    let hostname = parsed
        .host_str()
        .ok_or_else(|| "URL has no host".to_string())?
        .to_string();
    if !policy.is_domain_allowed(&hostname) {
        return Err(format!("domain '{hostname}' not allowed"));
    }

    let port = parsed
        .port_or_known_default()
        .ok_or_else(|| format!("no known port for scheme '{protocol}'"))?;
    if !policy.is_port_allowed(port) {
        return Err(format!("port {port} not allowed"));
    }

    if !state.limiter.lock().check() {
        return Err("rate limit exceeded".to_string());
    }

    Ok(Admission {
        hostname,
        port,
        protocol,
    })
}

/// Long-lived network sandbox for one agent session.
///
/// Owns a [`NetworkPolicy`] and the session's request log, counters, and
/// rate-limiter window; hands out checked HTTP facades that consult all of
/// them before any network I/O.
pub struct NetworkSandbox {
    policy: Arc<NetworkPolicy>,
    state: Arc<NetState>,
}

impl NetworkSandbox {
    /// Create a sandbox enforcing the given policy.
    pub fn new(policy: NetworkPolicy) -> Self {
        let state = Arc::new(NetState::new(&policy));
        Self {
            policy: Arc::new(policy),
            state,
        }
    }

    /// The policy this sandbox enforces.
    pub fn policy(&self) -> &NetworkPolicy {
        &self.policy
    }

    /// Check whether a request to `url` would be admitted.
    ///
    /// Pure admission check: nothing is logged and no rate-limit budget is
    /// consumed (expired window entries are purged as a side effect).
    pub fn is_request_allowed(&self, url: &str) -> bool {
        match evaluate(&self.policy, &self.state, url) {
            Ok(_) => true,
            Err(reason) => {
                debug!(url, %reason, "request would be denied");
                false
            }
        }
    }

    /// Wrap an arbitrary HTTP backend in a policy-checking facade.
    pub fn wrap_http<B: HttpPort>(&self, backend: B) -> CheckedHttp<B> {
        CheckedHttp::new(
            Arc::clone(&self.policy),
            Arc::clone(&self.state),
            backend,
        )
    }

    /// Checked facade over a real reqwest client.
    pub fn checked_http(&self) -> CheckedHttp<ReqwestHttp> {
        self.wrap_http(ReqwestHttp::new())
    }

    /// Snapshot of the request log, oldest first.
    pub fn request_log(&self) -> Vec<RequestLogEntry> {
        self.state.log.lock().iter().cloned().collect()
    }

    /// Aggregate statistics over everything observed so far.
    pub fn stats(&self) -> NetworkStats {
        let counters = self.state.counters.lock();
        let cutoff = Utc::now() - ChronoDuration::seconds(60);
        let last_minute = self
            .state
            .log
            .lock()
            .iter()
            .filter(|entry| entry.timestamp > cutoff)
            .count() as u64;

        NetworkStats {
            total: counters.total,
            allowed: counters.allowed,
            denied: counters.denied,
            last_minute,
            top_domains: top_entries(&counters.domains),
            top_ports: top_entries(&counters.ports),
            protocols: counters.protocols.clone(),
        }
    }
}

/// Top ten entries by count, descending; ties resolved by key order so the
/// result is stable.
fn top_entries<K: Clone + Ord>(counts: &HashMap<K, u64>) -> Vec<(K, u64)> {
    let mut entries: Vec<(K, u64)> = counts.iter().map(|(k, v)| (k.clone(), *v)).collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    entries.truncate(10);
    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(hostname: &str, port: u16, allowed: bool) -> RequestLogEntry {
        RequestLogEntry {
            timestamp: Utc::now(),
            url: format!("https://{hostname}/"),
            method: "GET".to_string(),
            protocol: "https".to_string(),
            hostname: hostname.to_string(),
            port,
            allowed,
            reason: None,
            duration_ms: None,
            status: None,
            error: None,
        }
    }

    #[test]
    fn test_allowlist_scenario() {
        let sandbox = NetworkSandbox::new(NetworkPolicy::allow_domains([
            "api.github.com",
            "*.anthropic.com",
        ]));
        assert!(sandbox.is_request_allowed("https://api.github.com/users"));
        assert!(!sandbox.is_request_allowed("https://random.com/api"));
        assert!(sandbox.is_request_allowed("https://sub.anthropic.com/x"));
    }

    #[test]
    fn test_unparseable_url_denied() {
        let sandbox = NetworkSandbox::new(NetworkPolicy::default());
        assert!(!sandbox.is_request_allowed("not a url"));
        assert!(!sandbox.is_request_allowed(""));
    }

    #[test]
    fn test_protocol_denied() {
        let sandbox = NetworkSandbox::new(NetworkPolicy::default());
        assert!(!sandbox.is_request_allowed("ftp://example.com/file"));
        assert!(sandbox.is_request_allowed("https://example.com/file"));
    }

    #[test]
    fn test_port_denied() {
        let sandbox = NetworkSandbox::new(NetworkPolicy {
            denied_ports: vec![8080],
            ..Default::default()
        });
        assert!(!sandbox.is_request_allowed("http://example.com:8080/"));
        assert!(sandbox.is_request_allowed("http://example.com/"));
    }

    #[test]
    fn test_default_port_from_scheme() {
        let sandbox = NetworkSandbox::new(NetworkPolicy {
            allowed_ports: vec![443],
            ..Default::default()
        });
        assert!(sandbox.is_request_allowed("https://example.com/"));
        assert!(!sandbox.is_request_allowed("http://example.com/"));
    }

    #[test]
    fn test_check_consumes_no_rate_budget() {
        let sandbox = NetworkSandbox::new(NetworkPolicy {
            max_requests_per_minute: Some(1),
            ..Default::default()
        });
        // Pure checks never consume the budget.
        for _ in 0..5 {
            assert!(sandbox.is_request_allowed("https://example.com/"));
        }
        sandbox.state.limiter.lock().record();
        assert!(!sandbox.is_request_allowed("https://example.com/"));
    }

    #[test]
    fn test_counters_only_move_for_allowed() {
        let sandbox = NetworkSandbox::new(NetworkPolicy::default());
        sandbox.state.record(entry("a.example.com", 443, true), true);
        sandbox.state.record(entry("b.example.com", 443, false), true);

        let stats = sandbox.stats();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.allowed, 1);
        assert_eq!(stats.denied, 1);
        assert_eq!(stats.top_domains, vec![("a.example.com".to_string(), 1)]);
        assert_eq!(stats.top_ports, vec![(443, 1)]);
        assert_eq!(stats.protocols.get("https"), Some(&1));
    }

    #[test]
    fn test_top_entries_stable_on_ties() {
        let mut counts = HashMap::new();
        for host in ["zeta.com", "alpha.com", "mid.com"] {
            counts.insert(host.to_string(), 3);
        }
        counts.insert("busy.com".to_string(), 9);

        let top = top_entries(&counts);
        assert_eq!(top[0].0, "busy.com");
        // Equal counts fall back to lexicographic order.
        assert_eq!(top[1].0, "alpha.com");
        assert_eq!(top[2].0, "mid.com");
        assert_eq!(top[3].0, "zeta.com");
    }

    #[test]
    fn test_log_ring_buffer_caps() {
        let sandbox = NetworkSandbox::new(NetworkPolicy::default());
        for index in 0..(MAX_LOG_ENTRIES + 5) {
            let mut e = entry("example.com", 443, true);
            e.url = format!("https://example.com/{index}");
            sandbox.state.record(e, true);
        }

        let log = sandbox.request_log();
        assert_eq!(log.len(), MAX_LOG_ENTRIES);
        // Oldest entries were evicted first.
        assert_eq!(log[0].url, "https://example.com/5");
    }

    #[test]
    fn test_logging_disabled_still_counts() {
        let sandbox = NetworkSandbox::new(NetworkPolicy {
            enable_logging: false,
            ..Default::default()
        });
        sandbox.state.record(entry("example.com", 443, true), false);
        assert!(sandbox.request_log().is_empty());
        assert_eq!(sandbox.stats().total, 1);
    }

    #[test]
    fn test_last_minute_counts_recent_entries() {
        let sandbox = NetworkSandbox::new(NetworkPolicy::default());
        let mut old = entry("example.com", 443, true);
        old.timestamp = Utc::now() - ChronoDuration::seconds(120);
        sandbox.state.record(old, true);
        sandbox.state.record(entry("example.com", 443, true), true);

        assert_eq!(sandbox.stats().last_minute, 1);
    }
}
