//! Request execution
//!
//! This module executes one outbound request through an optional proxy,
//! applying a strict timeout and classifying the result:
//! - 2xx/3xx -> Success (with the raw body)
//! - 429 and 5xx -> RetryableFailure
//! - other 4xx -> FatalFailure
//! - timeout and transport errors -> RetryableFailure
//!
//! Retry policy lives one level up in the scheduler, which must coordinate
//! retries with proxy rotation.

use crate::proxy::ProxyEndpoint;
use crate::state::RequestOutcome;
use crate::ScoutError;
use reqwest::{Client, StatusCode};
use std::time::{Duration, Instant};

/// Default User-Agent, matching what the target marketplaces expect from a browser
const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) \
     AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";

/// Ceiling on the connect phase so a dead proxy fails fast
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Executes single outbound requests with timeout and classification
pub struct RequestExecutor {
    user_agent: String,
}

impl RequestExecutor {
    /// Creates an executor with the default browser-like User-Agent
    pub fn new() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }

    /// Creates an executor with a custom User-Agent
    pub fn with_user_agent(user_agent: impl Into<String>) -> Self {
        Self {
            user_agent: user_agent.into(),
        }
    }

    /// Builds an HTTP client for one attempt
    ///
    /// The client is per-attempt because the proxy (and thus the connection
    /// pool) changes between attempts.
    fn build_client(
        &self,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> Result<Client, ScoutError> {
        let mut builder = Client::builder()
            .user_agent(&self.user_agent)
            .timeout(timeout)
            .connect_timeout(timeout.min(CONNECT_TIMEOUT))
            .gzip(true)
            .brotli(true);

        if let Some(endpoint) = proxy {
            builder = builder.proxy(endpoint.to_reqwest_proxy()?);
        }

        Ok(builder.build()?)
    }

    /// Executes one request and classifies the result
    ///
    /// The timeout is strict: a request still in flight when it expires is
    /// aborted and classified as a retryable failure. This is also the
    /// cancellation bound for in-flight work during shutdown.
    ///
    /// # Arguments
    ///
    /// * `url` - The URL to fetch
    /// * `proxy` - Proxy to route through, if the site policy requires one
    /// * `timeout` - Hard limit on the whole request
    pub async fn execute(
        &self,
        url: &str,
        proxy: Option<&ProxyEndpoint>,
        timeout: Duration,
    ) -> RequestOutcome {
        let started = Instant::now();

        let client = match self.build_client(proxy, timeout) {
            Ok(client) => client,
            Err(e) => return RequestOutcome::transport(e.to_string(), started.elapsed()),
        };

        tracing::debug!(
            "GET {} (proxy: {})",
            url,
            proxy.map(|p| p.label()).unwrap_or_else(|| "none".to_string())
        );

        match client.get(url).send().await {
            Ok(response) => {
                let status = response.status();
                let latency = started.elapsed();

                if status.is_success() || status.is_redirection() {
                    match response.text().await {
                        Ok(body) => RequestOutcome::success(status.as_u16(), latency, body),
                        Err(e) => RequestOutcome::transport(e.to_string(), started.elapsed()),
                    }
                } else if status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error() {
                    RequestOutcome::retryable_http(status.as_u16(), latency)
                } else if status.is_client_error() {
                    RequestOutcome::fatal_http(status.as_u16(), latency)
                } else {
                    // Informational statuses should not surface here; treat
                    // them as transient
                    RequestOutcome::retryable_http(status.as_u16(), latency)
                }
            }
            Err(e) if e.is_timeout() => RequestOutcome::timeout(started.elapsed()),
            Err(e) if e.is_connect() => {
                RequestOutcome::transport(format!("Connection error: {}", e), started.elapsed())
            }
            Err(e) => RequestOutcome::transport(e.to_string(), started.elapsed()),
        }
    }
}

impl Default for RequestExecutor {
    fn default() -> Self {
        Self::new()
    }
}
