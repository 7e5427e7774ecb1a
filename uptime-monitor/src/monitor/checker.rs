//! Website reachability probes.
//!
//! A probe is a single GET against a site, bounded by a timeout. Whatever
//! happens, the caller gets a [`CheckResult`]; transport failures are
//! normalized into a small vocabulary of reasons so alerting does not depend
//! on the exact error text of the networking stack.

use std::error::Error as StdError;
use std::fmt;
use std::io;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::Result;
use crate::utils::http_client::{build_probe_client, default_user_agent};
use crate::utils::url::parse_http_url;

/// Default bound on a single probe.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reachability of a site as seen by one probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Up,
    Down,
}

impl SiteStatus {
    /// Classify an HTTP status code. Redirects count as reachable.
    pub fn from_code(code: u16) -> Self {
        if (200..400).contains(&code) {
            SiteStatus::Up
        } else {
            SiteStatus::Down
        }
    }

    pub fn is_up(&self) -> bool {
        matches!(self, SiteStatus::Up)
    }
}

impl fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SiteStatus::Up => f.write_str("UP"),
            SiteStatus::Down => f.write_str("DOWN"),
        }
    }
}

/// Outcome of a single probe.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResult {
    pub url: String,
    pub status: SiteStatus,
    /// HTTP status code, `None` when no response was received.
    pub code: Option<u16>,
    /// Milliseconds spent on the request, including failed ones.
    pub response_time: u64,
    pub checked_at: DateTime<Utc>,
    /// Failure reason, `None` when the site is up.
    pub error: Option<String>,
}

impl CheckResult {
    fn responded(url: &str, code: u16, response_time: u64) -> Self {
        let status = SiteStatus::from_code(code);
        Self {
            url: url.to_string(),
            status,
            code: Some(code),
            response_time,
            checked_at: Utc::now(),
            error: match status {
                SiteStatus::Up => None,
                SiteStatus::Down => Some(format!("HTTP {code}")),
            },
        }
    }

    fn failed(url: &str, reason: String, response_time: u64) -> Self {
        Self {
            url: url.to_string(),
            status: SiteStatus::Down,
            code: None,
            response_time,
            checked_at: Utc::now(),
            error: Some(reason),
        }
    }
}

/// Recognized categories of transport failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    DnsResolution,
    ConnectionRefused,
    ConnectionReset,
    CertificateExpired,
    CertificateInvalid,
    Network,
}

impl FailureKind {
    /// Human-readable reason reported in [`CheckResult::error`].
    pub fn reason(&self, timeout: Duration) -> String {
        match self {
            FailureKind::Timeout => format!("Request timeout ({})", format_timeout(timeout)),
            FailureKind::DnsResolution => "DNS resolution failed".to_string(),
            FailureKind::ConnectionRefused => "Connection refused".to_string(),
            FailureKind::ConnectionReset => "Connection reset".to_string(),
            FailureKind::CertificateExpired => "SSL certificate expired".to_string(),
            FailureKind::CertificateInvalid => "SSL certificate verification failed".to_string(),
            FailureKind::Network => "Network error".to_string(),
        }
    }
}

/// Library-independent description of a failed request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProbeFailure {
    pub timed_out: bool,
    /// The failure happened while establishing the connection.
    pub connect: bool,
    /// Kinds of every `io::Error` found in the error chain.
    pub io_kinds: Vec<io::ErrorKind>,
    /// Messages of the error chain, outermost first.
    pub messages: Vec<String>,
}

impl ProbeFailure {
    pub fn timed_out() -> Self {
        Self {
            timed_out: true,
            ..Default::default()
        }
    }

    /// Collect the chain of `err`.
    pub fn from_error(err: &(dyn StdError + 'static)) -> Self {
        let mut failure = Self::default();
        let mut current = Some(err);

        while let Some(e) = current {
            failure.messages.push(e.to_string());
            if let Some(io_err) = e.downcast_ref::<io::Error>() {
                failure.io_kinds.push(io_err.kind());
                // io::Error::source skips the wrapped error itself.
                if let Some(inner) = io_err.get_ref() {
                    failure.messages.push(inner.to_string());
                }
            }
            current = e.source();
        }

        failure
    }

    pub fn from_reqwest(err: &reqwest::Error) -> Self {
        let mut failure = Self::from_error(err);
        failure.timed_out |= err.is_timeout();
        failure.connect = err.is_connect();
        failure
    }

    /// The raw error chain, used when no category matches.
    pub fn detail(&self) -> String {
        let mut parts: Vec<&str> = Vec::new();
        for message in &self.messages {
            if !parts.iter().any(|p| p.contains(message.as_str())) {
                parts.push(message);
            }
        }
        if parts.is_empty() {
            "Unknown error".to_string()
        } else {
            parts.join(": ")
        }
    }

    fn haystack(&self) -> String {
        self.messages.join(" | ").to_lowercase()
    }

    fn has_kind(&self, kinds: &[io::ErrorKind]) -> bool {
        self.io_kinds.iter().any(|k| kinds.contains(k))
    }

    fn mentions(&self, needles: &[&str]) -> bool {
        let haystack = self.haystack();
        needles.iter().any(|n| haystack.contains(n))
    }

    /// First matching category, in priority order.
    pub fn classify(&self) -> Option<FailureKind> {
        FAILURE_RULES
            .iter()
            .find(|(_, matches)| matches(self))
            .map(|(kind, _)| *kind)
    }

    /// Reason string for a probe bounded by `timeout`.
    pub fn reason(&self, timeout: Duration) -> String {
        match self.classify() {
            Some(kind) => kind.reason(timeout),
            None => self.detail(),
        }
    }
}

type FailureRule = (FailureKind, fn(&ProbeFailure) -> bool);

/// Evaluated top to bottom; the first match wins. TLS rules sit before the
/// generic network rule because handshake failures are connect errors too.
const FAILURE_RULES: &[FailureRule] = &[
    (FailureKind::Timeout, |f: &ProbeFailure| {
        f.timed_out || f.has_kind(&[io::ErrorKind::TimedOut])
    }),
    (FailureKind::DnsResolution, |f: &ProbeFailure| {
        f.mentions(&[
            "dns error",
            "failed to lookup address",
            "name or service not known",
            "nodename nor servname",
            "no such host",
            "temporary failure in name resolution",
        ])
    }),
    (FailureKind::ConnectionRefused, |f: &ProbeFailure| {
        f.has_kind(&[io::ErrorKind::ConnectionRefused]) || f.mentions(&["connection refused"])
    }),
    (FailureKind::ConnectionReset, |f: &ProbeFailure| {
        f.has_kind(&[io::ErrorKind::ConnectionReset]) || f.mentions(&["connection reset"])
    }),
    (FailureKind::CertificateExpired, |f: &ProbeFailure| {
        f.mentions(&["certificate"]) && f.mentions(&["expired"])
    }),
    (FailureKind::CertificateInvalid, |f: &ProbeFailure| {
        f.mentions(&["certificate"])
    }),
    (FailureKind::Network, |f: &ProbeFailure| {
        f.connect
            || f.has_kind(&[
                io::ErrorKind::NotConnected,
                io::ErrorKind::ConnectionAborted,
                io::ErrorKind::BrokenPipe,
                io::ErrorKind::UnexpectedEof,
                io::ErrorKind::NetworkUnreachable,
                io::ErrorKind::HostUnreachable,
                io::ErrorKind::AddrNotAvailable,
            ])
    }),
];

fn format_timeout(timeout: Duration) -> String {
    if timeout.subsec_millis() == 0 && timeout.as_secs() > 0 {
        format!("{}s", timeout.as_secs())
    } else {
        format!("{}ms", timeout.as_millis())
    }
}

/// Configuration for a [`SiteChecker`].
#[derive(Debug, Clone)]
pub struct CheckerConfig {
    /// Bound on a single probe.
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for CheckerConfig {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_PROBE_TIMEOUT,
            user_agent: default_user_agent(),
        }
    }
}

/// Issues reachability probes.
///
/// Holds no per-call state, so one checker can run any number of probes
/// concurrently.
#[derive(Debug, Clone)]
pub struct SiteChecker {
    client: reqwest::Client,
    config: CheckerConfig,
}

impl SiteChecker {
    pub fn new() -> Result<Self> {
        Self::with_config(CheckerConfig::default())
    }

    pub fn with_config(config: CheckerConfig) -> Result<Self> {
        let client = build_probe_client(&config.user_agent)?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &CheckerConfig {
        &self.config
    }

    /// Probe `url` with the configured timeout.
    pub async fn check_site(&self, url: &str) -> CheckResult {
        self.check_site_with_timeout(url, self.config.timeout).await
    }

    /// Probe `url`, aborting the request once `timeout` has elapsed.
    pub async fn check_site_with_timeout(&self, url: &str, timeout: Duration) -> CheckResult {
        let started = Instant::now();
        let outcome = self.probe(url, timeout).await;
        let response_time = started.elapsed().as_millis() as u64;

        let result = match outcome {
            Ok(code) => CheckResult::responded(url, code, response_time),
            Err(reason) => CheckResult::failed(url, reason, response_time),
        };

        debug!(
            url = %result.url,
            status = %result.status,
            code = ?result.code,
            response_time_ms = result.response_time,
            error = ?result.error,
            "site checked"
        );
        result
    }

    async fn probe(&self, url: &str, timeout: Duration) -> std::result::Result<u16, String> {
        let target = parse_http_url(url).map_err(|e| e.to_string())?;

        let deadline = tokio::time::Instant::now() + timeout;
        let request = self.client.get(target).send();

        match tokio::time::timeout_at(deadline, request).await {
            Ok(Ok(response)) => Ok(response.status().as_u16()),
            Ok(Err(e)) => {
                let failure = ProbeFailure::from_reqwest(&e);
                debug!(url, error = %failure.detail(), "probe request failed");
                Err(failure.reason(timeout))
            }
            Err(_) => Err(ProbeFailure::timed_out().reason(timeout)),
        }
    }
}
