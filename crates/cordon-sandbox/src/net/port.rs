//! HTTP port and its checked decorator.
//!
//! `HttpPort` is the seam between policy enforcement and the real network:
//! `ReqwestHttp` is the concrete backend, and `CheckedHttp` wraps any
//! backend with admission control, request logging, and rate-limit
//! bookkeeping. Denial happens strictly before any network I/O.

use crate::error::SandboxError;
use crate::net::policy::NetworkPolicy;
use crate::net::sandbox::{evaluate, NetState, RequestLogEntry};
use crate::Result;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

/// An outbound HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    /// HTTP method, uppercase.
    pub method: String,
    /// Target URL.
    pub url: String,
    /// Header name/value pairs, applied in order.
    pub headers: Vec<(String, String)>,
    /// Optional request body.
    pub body: Option<Vec<u8>>,
    /// Per-request timeout.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    /// Create a request with the given method and URL.
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into().to_uppercase(),
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    /// Create a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new("GET", url)
    }

    /// Append a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set the request body.
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Set a per-request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// A received HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// Status code.
    pub status: u16,
    /// Response headers.
    pub headers: HashMap<String, String>,
    /// Response body bytes.
    pub body: Vec<u8>,
}

impl HttpResponse {
    /// True for 2xx status codes.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Body decoded as UTF-8, lossily.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Standard HTTP client surface.
#[async_trait]
pub trait HttpPort: Send + Sync {
    /// Dispatch a request and await its response.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

/// Concrete backend delegating to a shared reqwest client.
#[derive(Debug, Clone)]
pub struct ReqwestHttp {
    client: reqwest::Client,
}

impl ReqwestHttp {
    /// Create a backend with a default 30-second timeout.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .unwrap_or_default();
        Self { client }
    }

    /// Create a backend around an existing client.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestHttp {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpPort for ReqwestHttp {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = reqwest::Method::from_bytes(request.method.as_bytes())
            .map_err(|_| SandboxError::InvalidRequest(format!("method '{}'", request.method)))?;

        let mut builder = self.client.request(method, &request.url);
        if let Some(timeout) = request.timeout {
            builder = builder.timeout(timeout);
        }
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response.bytes().await?.to_vec();

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Admission-checking decorator around an [`HttpPort`] backend.
///
/// Every request is evaluated against the network policy first. When
/// logging is enabled a log entry is recorded unconditionally: for denied
/// requests with the denial reason, for dispatched requests with duration,
/// status, and any transport error. Denied requests never touch the
/// network, and only dispatched requests consume rate-limit budget.
#[derive(Clone)]
pub struct CheckedHttp<B> {
    policy: Arc<NetworkPolicy>,
    state: Arc<NetState>,
    backend: B,
}

impl<B: HttpPort> CheckedHttp<B> {
    pub(crate) fn new(policy: Arc<NetworkPolicy>, state: Arc<NetState>, backend: B) -> Self {
        Self {
            policy,
            state,
            backend,
        }
    }

    /// The policy this facade enforces.
    pub fn policy(&self) -> &NetworkPolicy {
        &self.policy
    }

    /// Convenience GET.
    pub async fn fetch(&self, url: impl Into<String>) -> Result<HttpResponse> {
        self.send(HttpRequest::get(url)).await
    }
}

/// Best-effort target decomposition for log entries of denied requests,
/// whose URLs may not parse at all.
fn parsed_target(url: &str) -> (String, String, u16) {
    match Url::parse(url) {
        Ok(parsed) => (
            parsed.scheme().to_string(),
            parsed.host_str().unwrap_or_default().to_string(),
            parsed.port_or_known_default().unwrap_or(0),
        ),
        Err(_) => (String::new(), String::new(), 0),
    }
}

#[async_trait]
impl<B: HttpPort> HttpPort for CheckedHttp<B> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let log_enabled = self.policy.enable_logging;

        match evaluate(&self.policy, &self.state, &request.url) {
            Err(reason) => {
                debug!(url = %request.url, %reason, "request denied");
                let (protocol, hostname, port) = parsed_target(&request.url);
                self.state.record(
                    RequestLogEntry {
                        timestamp: Utc::now(),
                        url: request.url.clone(),
                        method: request.method.clone(),
                        protocol,
                        hostname,
                        port,
                        allowed: false,
                        reason: Some(reason.clone()),
                        duration_ms: None,
                        status: None,
                        error: None,
                    },
                    log_enabled,
                );
                Err(SandboxError::request_denied(request.url, reason))
            }
            Ok(admission) => {
                // The admission proceeds to dispatch, so it consumes
                // rate-limit budget; pure checks do not.
                self.state.limiter.lock().record();

                let url = request.url.clone();
                let method = request.method.clone();
                let started = Instant::now();
                let outcome = self.backend.send(request).await;
                let duration_ms = started.elapsed().as_millis() as u64;

                self.state.record(
                    RequestLogEntry {
                        timestamp: Utc::now(),
                        url,
                        method,
                        protocol: admission.protocol,
                        hostname: admission.hostname,
                        port: admission.port,
                        allowed: true,
                        reason: None,
                        duration_ms: Some(duration_ms),
                        status: outcome.as_ref().ok().map(|response| response.status),
                        error: outcome.as_ref().err().map(|e| e.to_string()),
                    },
                    log_enabled,
                );

                outcome
            }
        }
    }
}
