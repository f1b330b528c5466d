//! Request outcome classification
//!
//! Every executed request is reduced to a `RequestOutcome` that the
//! scheduler consumes immediately: the proxy pool scores on it, the retry
//! logic branches on it, and terminal outcomes cross the sink boundary.

use std::fmt;
use std::time::Duration;

/// Classification of a single executed request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutcomeStatus {
    /// 2xx/3xx response
    Success,

    /// Timeout, transport error, 5xx, 429, or proxy exhaustion; worth retrying
    RetryableFailure,

    /// 4xx other than 429; retrying will not help
    FatalFailure,
}

impl OutcomeStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableFailure)
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::FatalFailure)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RetryableFailure => "retryable_failure",
            Self::FatalFailure => "fatal_failure",
        }
    }
}

impl fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of one executed request
///
/// Transient: passed by value, consumed by the scheduler, never persisted
/// by the core.
#[derive(Debug, Clone)]
pub struct RequestOutcome {
    /// The classification driving retry and scoring decisions
    pub status: OutcomeStatus,

    /// HTTP status code, when a response was received
    pub http_status: Option<u16>,

    /// Wall time spent on the attempt
    pub latency: Duration,

    /// Transport or classification error text, when no usable response arrived
    pub error: Option<String>,

    /// Raw response body on success
    pub body: Option<String>,
}

impl RequestOutcome {
    /// A successful response with its raw body
    pub fn success(http_status: u16, latency: Duration, body: String) -> Self {
        Self {
            status: OutcomeStatus::Success,
            http_status: Some(http_status),
            latency,
            error: None,
            body: Some(body),
        }
    }

    /// A retryable HTTP failure (5xx or 429)
    pub fn retryable_http(http_status: u16, latency: Duration) -> Self {
        Self {
            status: OutcomeStatus::RetryableFailure,
            http_status: Some(http_status),
            latency,
            error: Some(format!("HTTP {}", http_status)),
            body: None,
        }
    }

    /// A fatal HTTP failure (4xx other than 429)
    pub fn fatal_http(http_status: u16, latency: Duration) -> Self {
        Self {
            status: OutcomeStatus::FatalFailure,
            http_status: Some(http_status),
            latency,
            error: Some(format!("HTTP {}", http_status)),
            body: None,
        }
    }

    /// A transport-level failure (connection reset, DNS, TLS); retryable
    pub fn transport(error: impl Into<String>, latency: Duration) -> Self {
        Self {
            status: OutcomeStatus::RetryableFailure,
            http_status: None,
            latency,
            error: Some(error.into()),
            body: None,
        }
    }

    /// A request aborted by the executor timeout; retryable
    pub fn timeout(latency: Duration) -> Self {
        Self {
            status: OutcomeStatus::RetryableFailure,
            http_status: None,
            latency,
            error: Some("Request timeout".to_string()),
            body: None,
        }
    }

    /// Proxy pool exhaustion; treated like a retryable failure so the
    /// health prober gets time to recover a proxy
    pub fn no_healthy_proxy() -> Self {
        Self {
            status: OutcomeStatus::RetryableFailure,
            http_status: None,
            latency: Duration::ZERO,
            error: Some("No healthy proxy available".to_string()),
            body: None,
        }
    }

    /// Short description of the failure, for logs and the sink's failure path
    pub fn describe(&self) -> String {
        match (&self.error, self.http_status) {
            (Some(err), _) => err.clone(),
            (None, Some(status)) => format!("HTTP {}", status),
            (None, None) => self.status.to_string(),
        }
    }
}
