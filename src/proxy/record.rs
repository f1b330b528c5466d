use crate::config::{PoolConfig, ProxyEntry};
use crate::ScoutError;
use chrono::{DateTime, Utc};
use std::fmt;
use std::time::{Duration, Instant};

/// Health classification of a proxy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProxyHealth {
    /// Eligible for selection
    Healthy,

    /// Failed a hygiene probe; excluded from selection until re-confirmed
    Degraded,

    /// Tripped a failure threshold; excluded until cooldown elapses and a probe succeeds
    Deactivated,
}

impl ProxyHealth {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Healthy => "healthy",
            Self::Degraded => "degraded",
            Self::Deactivated => "deactivated",
        }
    }
}

impl fmt::Display for ProxyHealth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Immutable identity of a proxy egress endpoint
#[derive(Debug, Clone)]
pub struct ProxyEndpoint {
    /// Hostname or IP address
    pub host: String,

    /// Port number
    pub port: u16,

    /// Protocol scheme: http, https, or socks5
    pub protocol: String,

    /// Username for authentication
    pub username: Option<String>,

    /// Password for authentication
    pub password: Option<String>,

    /// ISO country code, informational
    pub country: Option<String>,

    /// Provider label, informational
    pub provider: Option<String>,

    /// Site names this proxy must never serve
    pub banned_sites: Vec<String>,
}

impl ProxyEndpoint {
    /// Builds an endpoint from a config entry
    pub fn from_entry(entry: &ProxyEntry) -> Self {
        Self {
            host: entry.host.clone(),
            port: entry.port,
            protocol: entry.protocol.clone(),
            username: entry.username.clone(),
            password: entry.password.clone(),
            country: entry.country.clone(),
            provider: entry.provider.clone(),
            banned_sites: entry.banned_sites.clone(),
        }
    }

    /// The proxy URL without credentials (e.g. "http://51.158.68.133:8811")
    pub fn url(&self) -> String {
        format!("{}://{}:{}", self.protocol, self.host, self.port)
    }

    /// Short label for logs
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Whether this proxy is banned for the given site
    pub fn is_banned_for(&self, site: &str) -> bool {
        self.banned_sites.iter().any(|s| s == site)
    }

    /// Converts the endpoint into a `reqwest::Proxy`, attaching credentials
    pub fn to_reqwest_proxy(&self) -> Result<reqwest::Proxy, ScoutError> {
        let mut proxy =
            reqwest::Proxy::all(self.url()).map_err(|e| ScoutError::InvalidProxy {
                endpoint: self.label(),
                message: e.to_string(),
            })?;

        if let (Some(username), Some(password)) = (&self.username, &self.password) {
            proxy = proxy.basic_auth(username, password);
        }

        Ok(proxy)
    }
}

/// Mutable health and scoring state of a proxy
///
/// All mutation happens while the owning pool holds this record's lock.
/// Time-dependent checks take an explicit `Instant` so they can be tested
/// without waiting.
#[derive(Debug, Clone)]
pub struct ProxyState {
    /// Current health classification
    pub health: ProxyHealth,

    /// Number of successful requests served
    pub success_count: u32,

    /// Number of failed requests served
    pub failure_count: u32,

    /// Failures since the last success
    pub consecutive_failures: u32,

    /// When this proxy last served a request (monotonic, for LRU tie-breaks)
    pub last_used: Option<Instant>,

    /// When the prober last checked this proxy
    pub last_checked_at: Option<DateTime<Utc>>,

    /// Earliest instant at which a deactivated proxy may be re-probed
    pub cooldown_until: Option<Instant>,

    /// Why the proxy last failed
    pub last_failure_reason: Option<String>,
}

impl ProxyState {
    /// Creates a fresh, healthy proxy state
    pub fn new() -> Self {
        Self {
            health: ProxyHealth::Healthy,
            success_count: 0,
            failure_count: 0,
            consecutive_failures: 0,
            last_used: None,
            last_checked_at: None,
            cooldown_until: None,
            last_failure_reason: None,
        }
    }

    /// Total recorded outcomes
    pub fn sample_count(&self) -> u32 {
        self.success_count + self.failure_count
    }

    /// Fraction of recorded outcomes that succeeded
    ///
    /// A proxy with no recorded outcomes scores 1.0 so that fresh proxies
    /// are eligible under the score strategy before their first use.
    pub fn success_rate(&self) -> f64 {
        let total = self.sample_count();
        if total == 0 {
            return 1.0;
        }
        self.success_count as f64 / total as f64
    }

    /// Whether selection may return this proxy right now
    pub fn is_selectable(&self) -> bool {
        self.health == ProxyHealth::Healthy
    }

    /// Whether a deactivated proxy's cooldown has elapsed
    pub fn cooldown_elapsed(&self, now: Instant) -> bool {
        match self.cooldown_until {
            Some(until) => now >= until,
            None => true,
        }
    }

    /// Marks the proxy as bound to a request
    pub fn mark_used(&mut self, now: Instant) {
        self.last_used = Some(now);
    }

    /// Records a successful request outcome
    pub fn record_success(&mut self) {
        self.success_count += 1;
        self.consecutive_failures = 0;
        if self.health == ProxyHealth::Degraded {
            self.health = ProxyHealth::Healthy;
        }
    }

    /// Records a failed request outcome and applies the deactivation thresholds
    ///
    /// Returns true if this failure deactivated the proxy.
    pub fn record_failure(
        &mut self,
        reason: impl Into<String>,
        settings: &PoolConfig,
        now: Instant,
    ) -> bool {
        self.failure_count += 1;
        self.consecutive_failures += 1;
        self.last_failure_reason = Some(reason.into());

        let over_failure_ceiling = self.consecutive_failures >= settings.max_consecutive_failures;
        // The success-rate floor only applies once enough outcomes exist,
        // so a single early failure cannot deactivate a proxy
        let under_rate_floor = self.sample_count() >= settings.min_sample_size
            && self.success_rate() < settings.min_success_rate;

        if over_failure_ceiling || under_rate_floor {
            self.deactivate(now, settings.cooldown());
            return true;
        }

        false
    }

    /// Transitions the proxy to Deactivated with a fresh cooldown window
    pub fn deactivate(&mut self, now: Instant, cooldown: Duration) {
        self.health = ProxyHealth::Deactivated;
        self.cooldown_until = Some(now + cooldown);
    }

    /// Applies a successful health probe: back to Healthy with failure counters reset
    pub fn probe_succeeded(&mut self) {
        self.health = ProxyHealth::Healthy;
        self.consecutive_failures = 0;
        self.failure_count = 0;
        self.cooldown_until = None;
        self.last_checked_at = Some(Utc::now());
    }

    /// Applies a failed health probe: stays out of rotation, cooldown extended
    pub fn probe_failed(&mut self, now: Instant, cooldown: Duration) {
        self.health = ProxyHealth::Deactivated;
        self.cooldown_until = Some(now + cooldown);
        self.last_checked_at = Some(Utc::now());
    }

    /// Demotes a healthy proxy that failed a hygiene probe
    ///
    /// Degraded is one step short of Deactivated: the proxy leaves rotation
    /// but skips the cooldown, and the next probe decides its fate.
    pub fn demote(&mut self) {
        if self.health == ProxyHealth::Healthy {
            self.health = ProxyHealth::Degraded;
        }
        self.last_checked_at = Some(Utc::now());
    }
}

impl Default for ProxyState {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SelectionStrategy;

    fn test_settings() -> PoolConfig {
        PoolConfig {
            selection_strategy: SelectionStrategy::Score,
            min_success_rate: 0.5,
            min_sample_size: 5,
            max_consecutive_failures: 3,
            cooldown_minutes: 10,
            health_check_interval_secs: 60,
            health_check_timeout_secs: 10,
            probe_url: "https://httpbin.org/ip".to_string(),
            probe_healthy: false,
        }
    }

    fn test_entry() -> ProxyEntry {
        ProxyEntry {
            host: "proxy.example.com".to_string(),
            port: 8080,
            protocol: "http".to_string(),
            username: None,
            password: None,
            country: Some("US".to_string()),
            provider: Some("public".to_string()),
            banned_sites: vec!["ebay".to_string()],
        }
    }

    #[test]
    fn test_endpoint_url() {
        let endpoint = ProxyEndpoint::from_entry(&test_entry());
        assert_eq!(endpoint.url(), "http://proxy.example.com:8080");
        assert_eq!(endpoint.label(), "proxy.example.com:8080");
    }

    #[test]
    fn test_endpoint_banned_sites() {
        let endpoint = ProxyEndpoint::from_entry(&test_entry());
        assert!(endpoint.is_banned_for("ebay"));
        assert!(!endpoint.is_banned_for("amazon"));
    }

    #[test]
    fn test_to_reqwest_proxy() {
        let endpoint = ProxyEndpoint::from_entry(&test_entry());
        assert!(endpoint.to_reqwest_proxy().is_ok());
    }

    #[test]
    fn test_new_state() {
        let state = ProxyState::new();
        assert_eq!(state.health, ProxyHealth::Healthy);
        assert_eq!(state.sample_count(), 0);
        assert!(state.is_selectable());
    }

    #[test]
    fn test_success_rate_no_samples() {
        let state = ProxyState::new();
        assert_eq!(state.success_rate(), 1.0);
    }

    #[test]
    fn test_success_rate() {
        let mut state = ProxyState::new();
        state.success_count = 8;
        state.failure_count = 2;
        assert!((state.success_rate() - 0.8).abs() < f64::EPSILON);
    }

    #[test]
    fn test_record_success_resets_consecutive_failures() {
        let mut state = ProxyState::new();
        state.consecutive_failures = 2;

        state.record_success();

        assert_eq!(state.success_count, 1);
        assert_eq!(state.consecutive_failures, 0);
    }

    #[test]
    fn test_consecutive_failures_deactivate() {
        let settings = test_settings();
        let mut state = ProxyState::new();
        let now = Instant::now();

        assert!(!state.record_failure("HTTP 503", &settings, now));
        assert!(!state.record_failure("HTTP 503", &settings, now));
        assert_eq!(state.health, ProxyHealth::Healthy);

        // Third consecutive failure trips the ceiling
        assert!(state.record_failure("HTTP 503", &settings, now));
        assert_eq!(state.health, ProxyHealth::Deactivated);
        assert!(state.cooldown_until.is_some());
        assert_eq!(state.last_failure_reason.as_deref(), Some("HTTP 503"));
    }

    #[test]
    fn test_success_rate_floor_needs_min_samples() {
        let settings = test_settings();
        let mut state = ProxyState::new();
        let now = Instant::now();

        // One success, one failure: 0.5 rate but only 2 samples (< 5),
        // and only 1 consecutive failure, so no deactivation
        state.record_success();
        assert!(!state.record_failure("timeout", &settings, now));
        assert_eq!(state.health, ProxyHealth::Healthy);
    }

    #[test]
    fn test_success_rate_floor_deactivates_after_min_samples() {
        let mut settings = test_settings();
        settings.max_consecutive_failures = 10; // keep the ceiling out of the way
        let mut state = ProxyState::new();
        let now = Instant::now();

        // 2 successes then 3 failures: 5 samples, rate 0.4 < 0.5
        state.record_success();
        state.record_success();
        assert!(!state.record_failure("timeout", &settings, now));
        assert!(!state.record_failure("timeout", &settings, now));
        assert!(state.record_failure("timeout", &settings, now));
        assert_eq!(state.health, ProxyHealth::Deactivated);
    }

    #[test]
    fn test_cooldown_elapsed() {
        let mut state = ProxyState::new();
        let now = Instant::now();
        state.deactivate(now, Duration::from_secs(600));

        assert!(!state.cooldown_elapsed(now));
        assert!(!state.cooldown_elapsed(now + Duration::from_secs(599)));
        assert!(state.cooldown_elapsed(now + Duration::from_secs(600)));
        assert!(state.cooldown_elapsed(now + Duration::from_secs(601)));
    }

    #[test]
    fn test_probe_succeeded_restores_health() {
        let settings = test_settings();
        let mut state = ProxyState::new();
        let now = Instant::now();

        state.record_success();
        state.record_failure("HTTP 503", &settings, now);
        state.deactivate(now, Duration::from_secs(600));

        state.probe_succeeded();

        assert_eq!(state.health, ProxyHealth::Healthy);
        assert_eq!(state.consecutive_failures, 0);
        assert_eq!(state.failure_count, 0);
        assert!(state.cooldown_until.is_none());
        assert!(state.last_checked_at.is_some());
        // Success history survives a probe reset
        assert_eq!(state.success_count, 1);
    }

    #[test]
    fn test_probe_failed_extends_cooldown() {
        let mut state = ProxyState::new();
        let now = Instant::now();
        state.deactivate(now, Duration::from_secs(600));

        let later = now + Duration::from_secs(700);
        state.probe_failed(later, Duration::from_secs(600));

        assert_eq!(state.health, ProxyHealth::Deactivated);
        assert!(!state.cooldown_elapsed(later + Duration::from_secs(599)));
        assert!(state.cooldown_elapsed(later + Duration::from_secs(600)));
    }

    #[test]
    fn test_demote_healthy_to_degraded() {
        let mut state = ProxyState::new();
        state.demote();
        assert_eq!(state.health, ProxyHealth::Degraded);
        assert!(!state.is_selectable());
    }

    #[test]
    fn test_success_promotes_degraded() {
        let mut state = ProxyState::new();
        state.demote();

        state.record_success();
        assert_eq!(state.health, ProxyHealth::Healthy);
    }
}
