use serde::Deserialize;
use std::time::Duration;

/// Main configuration structure for Pricescout
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub pool: PoolConfig,
    #[serde(rename = "site", default)]
    pub sites: Vec<SiteConfig>,
    #[serde(rename = "proxy", default)]
    pub proxies: Vec<ProxyEntry>,
}

impl Config {
    /// Looks up a site policy by name
    pub fn site(&self, name: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|s| s.name == name)
    }
}

/// Strategy used by the proxy pool to pick among healthy proxies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SelectionStrategy {
    /// Highest success rate, ties broken by least-recently-used
    Score,

    /// Cyclic over healthy proxies
    RoundRobin,

    /// Uniform over healthy proxies
    Random,
}

/// Pool-wide proxy management configuration
#[derive(Debug, Clone, Deserialize)]
pub struct PoolConfig {
    /// How the pool picks among healthy proxies
    #[serde(rename = "selection-strategy")]
    pub selection_strategy: SelectionStrategy,

    /// Success-rate floor below which a proxy is deactivated
    #[serde(rename = "min-success-rate")]
    pub min_success_rate: f64,

    /// Minimum number of recorded outcomes before the success-rate floor applies
    #[serde(rename = "min-sample-size")]
    pub min_sample_size: u32,

    /// Consecutive failures that deactivate a proxy
    #[serde(rename = "max-consecutive-failures")]
    pub max_consecutive_failures: u32,

    /// How long a deactivated proxy waits before it may be re-probed
    #[serde(rename = "cooldown-minutes")]
    pub cooldown_minutes: u64,

    /// Interval between health prober cycles (seconds)
    #[serde(rename = "health-check-interval-secs")]
    pub health_check_interval_secs: u64,

    /// Timeout applied to each health probe request (seconds)
    #[serde(rename = "health-check-timeout-secs")]
    pub health_check_timeout_secs: u64,

    /// URL fetched through a proxy to verify it works
    #[serde(rename = "probe-url", default = "default_probe_url")]
    pub probe_url: String,

    /// Whether the prober also hygiene-checks healthy proxies
    #[serde(rename = "probe-healthy", default)]
    pub probe_healthy: bool,
}

fn default_probe_url() -> String {
    "https://httpbin.org/ip".to_string()
}

impl PoolConfig {
    pub fn cooldown(&self) -> Duration {
        Duration::from_secs(self.cooldown_minutes * 60)
    }

    pub fn health_check_interval(&self) -> Duration {
        Duration::from_secs(self.health_check_interval_secs)
    }

    pub fn health_check_timeout(&self) -> Duration {
        Duration::from_secs(self.health_check_timeout_secs)
    }
}

/// Per-site crawl policy
///
/// One entry per target marketplace. Immutable after load; owned by that
/// site's scheduler.
#[derive(Debug, Clone, Deserialize)]
pub struct SiteConfig {
    /// Site identifier used to route tasks (e.g. "ebay")
    pub name: String,

    /// Base URL of the site
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Whether requests to this site must go through a proxy
    #[serde(rename = "requires-proxy")]
    pub requires_proxy: bool,

    /// Sustained admission rate (requests per minute)
    #[serde(rename = "rate-limit-per-minute")]
    pub rate_limit_per_minute: u32,

    /// Extra admissions allowed on top of one sustained token
    #[serde(rename = "burst-allowance")]
    pub burst_allowance: u32,

    /// Retries allowed after the initial attempt
    #[serde(rename = "retry-attempts")]
    pub retry_attempts: u32,

    /// Exponential backoff multiplier between retries
    #[serde(rename = "retry-backoff-multiplier")]
    pub retry_backoff_multiplier: f64,

    /// Base delay for the backoff formula (milliseconds)
    #[serde(rename = "retry-base-delay-ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound on any single backoff wait (milliseconds)
    #[serde(rename = "retry-max-delay-ms", default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Timeout applied to each outbound request (seconds)
    #[serde(rename = "request-timeout-secs")]
    pub request_timeout_secs: u64,

    /// Requests per proxy before the scheduler forces a rotation
    #[serde(rename = "proxy-rotation-interval")]
    pub proxy_rotation_interval: u32,

    /// Maximum concurrent in-flight requests for this site
    #[serde(rename = "max-in-flight")]
    pub max_in_flight: u32,

    /// Delay between admission re-attempts when the rate limit denies (milliseconds)
    #[serde(rename = "admission-poll-ms", default = "default_admission_poll_ms")]
    pub admission_poll_ms: u64,

    /// URLs submitted as crawl tasks when the binary starts
    #[serde(rename = "seed-urls", default)]
    pub seed_urls: Vec<String>,
}

fn default_retry_max_delay_ms() -> u64 {
    60_000
}

fn default_admission_poll_ms() -> u64 {
    250
}

impl SiteConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    pub fn retry_max_delay(&self) -> Duration {
        Duration::from_millis(self.retry_max_delay_ms)
    }

    pub fn admission_poll(&self) -> Duration {
        Duration::from_millis(self.admission_poll_ms)
    }
}

/// A proxy credential entry loaded at startup
#[derive(Debug, Clone, Deserialize)]
pub struct ProxyEntry {
    /// Hostname or IP address of the proxy
    pub host: String,

    /// Port number
    pub port: u16,

    /// Proxy protocol: "http", "https", or "socks5"
    #[serde(default = "default_protocol")]
    pub protocol: String,

    /// Username for authentication (requires password)
    #[serde(default)]
    pub username: Option<String>,

    /// Password for authentication (requires username)
    #[serde(default)]
    pub password: Option<String>,

    /// ISO country code, informational
    #[serde(default)]
    pub country: Option<String>,

    /// Proxy provider label, informational
    #[serde(default)]
    pub provider: Option<String>,

    /// Site names this proxy must never be selected for
    #[serde(rename = "banned-sites", default)]
    pub banned_sites: Vec<String>,
}

fn default_protocol() -> String {
    "http".to_string()
}
