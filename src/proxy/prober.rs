//! Background proxy health probing
//!
//! One prober runs per deployment. Each cycle it re-checks every proxy that
//! is out of rotation: deactivated proxies whose cooldown has elapsed and
//! degraded proxies awaiting confirmation. A successful probe returns the
//! proxy to rotation; a failed one extends its cooldown. Optionally it also
//! hygiene-checks healthy proxies to catch silent degradation.
//!
//! The prober never blocks the schedulers: it communicates only through the
//! pool's shared state and holds no lock across a probe request.

use crate::proxy::pool::ProxyPool;
use crate::proxy::record::{ProxyEndpoint, ProxyHealth};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Result of probing a single proxy endpoint
#[derive(Debug, Clone)]
pub struct ProbeOutcome {
    /// Whether the probe request completed with a 2xx response
    pub success: bool,

    /// Wall time the probe took
    pub latency: Duration,

    /// Failure description when the probe did not succeed
    pub error: Option<String>,
}

/// Issues one lightweight request through the given proxy
///
/// # Arguments
///
/// * `endpoint` - The proxy to probe
/// * `probe_url` - URL fetched through the proxy (e.g. "https://httpbin.org/ip")
/// * `timeout` - Hard limit on the probe request
pub async fn probe_endpoint(
    endpoint: &ProxyEndpoint,
    probe_url: &str,
    timeout: Duration,
) -> ProbeOutcome {
    let started = Instant::now();

    let failure = |error: String, started: Instant| ProbeOutcome {
        success: false,
        latency: started.elapsed(),
        error: Some(error),
    };

    let proxy = match endpoint.to_reqwest_proxy() {
        Ok(proxy) => proxy,
        Err(e) => return failure(e.to_string(), started),
    };

    let client = match reqwest::Client::builder()
        .proxy(proxy)
        .timeout(timeout)
        .build()
    {
        Ok(client) => client,
        Err(e) => return failure(e.to_string(), started),
    };

    match client.get(probe_url).send().await {
        Ok(response) if response.status().is_success() => ProbeOutcome {
            success: true,
            latency: started.elapsed(),
            error: None,
        },
        Ok(response) => failure(format!("HTTP {}", response.status().as_u16()), started),
        Err(e) if e.is_timeout() => failure("Probe timeout".to_string(), started),
        Err(e) => failure(e.to_string(), started),
    }
}

/// Periodic background health checker for the proxy pool
pub struct HealthProber {
    pool: Arc<ProxyPool>,
    cancel: CancellationToken,
}

impl HealthProber {
    /// Creates a prober over the given pool
    ///
    /// Probe URL, timeout, interval, and the hygiene flag all come from the
    /// pool's settings.
    pub fn new(pool: Arc<ProxyPool>, cancel: CancellationToken) -> Self {
        Self { pool, cancel }
    }

    /// Runs probe cycles on a fixed interval until cancelled
    pub async fn run(self) {
        let mut interval = tokio::time::interval(self.pool.settings().health_check_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        // The first tick of a tokio interval fires immediately; skip it so
        // startup probes don't race the initial crawl traffic
        interval.tick().await;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    tracing::debug!("Health prober shutting down");
                    break;
                }
                _ = interval.tick() => {
                    self.run_cycle().await;
                }
            }
        }
    }

    /// Probes every proxy that is due for a check
    pub async fn run_cycle(&self) {
        let settings = self.pool.settings().clone();

        for slot in self.pool.slots() {
            // Decide under the lock, probe outside it
            let prior = {
                let state = slot.state();
                let due = match state.health {
                    ProxyHealth::Deactivated => state.cooldown_elapsed(Instant::now()),
                    ProxyHealth::Degraded => true,
                    ProxyHealth::Healthy => settings.probe_healthy,
                };
                if !due {
                    continue;
                }
                state.health
            };

            let probe = probe_endpoint(
                slot.endpoint(),
                &settings.probe_url,
                settings.health_check_timeout(),
            )
            .await;

            let mut state = slot.state();
            if probe.success {
                if prior == ProxyHealth::Healthy {
                    state.last_checked_at = Some(chrono::Utc::now());
                } else {
                    state.probe_succeeded();
                    tracing::info!(
                        "Proxy {} recovered ({}ms probe)",
                        slot.endpoint().label(),
                        probe.latency.as_millis()
                    );
                }
            } else {
                let reason = probe.error.unwrap_or_else(|| "probe failed".to_string());
                match prior {
                    // Hygiene failures demote rather than deactivate,
                    // giving the proxy one more chance
                    ProxyHealth::Healthy => {
                        state.demote();
                        tracing::warn!(
                            "Proxy {} failed hygiene probe, degraded: {}",
                            slot.endpoint().label(),
                            reason
                        );
                    }
                    _ => {
                        state.probe_failed(Instant::now(), settings.cooldown());
                        tracing::warn!(
                            "Proxy {} still failing probes, cooldown extended: {}",
                            slot.endpoint().label(),
                            reason
                        );
                    }
                }
            }
        }
    }
}
