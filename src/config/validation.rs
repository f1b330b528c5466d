use crate::config::types::{Config, PoolConfig, ProxyEntry, SiteConfig};
use crate::ConfigError;
use url::Url;

/// Allowed proxy protocols
const PROTOCOLS: [&str; 3] = ["http", "https", "socks5"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_pool_config(&config.pool)?;
    validate_sites(&config.sites)?;
    validate_proxies(&config.proxies)?;

    // A site that requires a proxy is unusable with an empty pool
    if config.proxies.is_empty() {
        if let Some(site) = config.sites.iter().find(|s| s.requires_proxy) {
            return Err(ConfigError::Validation(format!(
                "Site '{}' requires a proxy but no [[proxy]] entries are configured",
                site.name
            )));
        }
    }

    Ok(())
}

/// Validates pool-wide proxy management settings
fn validate_pool_config(config: &PoolConfig) -> Result<(), ConfigError> {
    if !(config.min_success_rate > 0.0 && config.min_success_rate <= 1.0) {
        return Err(ConfigError::Validation(format!(
            "min_success_rate must be in (0.0, 1.0], got {}",
            config.min_success_rate
        )));
    }

    if config.min_sample_size < 1 {
        return Err(ConfigError::Validation(
            "min_sample_size must be >= 1".to_string(),
        ));
    }

    if config.max_consecutive_failures < 1 {
        return Err(ConfigError::Validation(
            "max_consecutive_failures must be >= 1".to_string(),
        ));
    }

    if config.cooldown_minutes < 1 {
        return Err(ConfigError::Validation(
            "cooldown_minutes must be >= 1".to_string(),
        ));
    }

    if config.health_check_interval_secs < 1 {
        return Err(ConfigError::Validation(
            "health_check_interval_secs must be >= 1".to_string(),
        ));
    }

    if config.health_check_timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "health_check_timeout_secs must be >= 1".to_string(),
        ));
    }

    Url::parse(&config.probe_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid probe_url: {}", e)))?;

    Ok(())
}

/// Validates all site entries
fn validate_sites(sites: &[SiteConfig]) -> Result<(), ConfigError> {
    if sites.is_empty() {
        return Err(ConfigError::Validation(
            "At least one [[site]] entry is required".to_string(),
        ));
    }

    for (i, site) in sites.iter().enumerate() {
        validate_site(site)?;

        // Site names route tasks, so duplicates would shadow each other
        if sites[..i].iter().any(|other| other.name == site.name) {
            return Err(ConfigError::Validation(format!(
                "Duplicate site name '{}'",
                site.name
            )));
        }
    }

    Ok(())
}

/// Validates a single site policy
fn validate_site(site: &SiteConfig) -> Result<(), ConfigError> {
    validate_site_name(&site.name)?;

    Url::parse(&site.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base_url for '{}': {}", site.name, e))
    })?;

    if site.rate_limit_per_minute < 1 {
        return Err(ConfigError::Validation(format!(
            "Site '{}': rate_limit_per_minute must be >= 1, got {}",
            site.name, site.rate_limit_per_minute
        )));
    }

    if site.retry_backoff_multiplier < 1.0 {
        return Err(ConfigError::Validation(format!(
            "Site '{}': retry_backoff_multiplier must be >= 1.0, got {}",
            site.name, site.retry_backoff_multiplier
        )));
    }

    if site.retry_base_delay_ms < 1 {
        return Err(ConfigError::Validation(format!(
            "Site '{}': retry_base_delay_ms must be >= 1, got {}",
            site.name, site.retry_base_delay_ms
        )));
    }

    if site.retry_max_delay_ms < site.retry_base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "Site '{}': retry_max_delay_ms must be >= retry_base_delay_ms",
            site.name
        )));
    }

    if site.request_timeout_secs < 1 {
        return Err(ConfigError::Validation(format!(
            "Site '{}': request_timeout_secs must be >= 1, got {}",
            site.name, site.request_timeout_secs
        )));
    }

    if site.proxy_rotation_interval < 1 {
        return Err(ConfigError::Validation(format!(
            "Site '{}': proxy_rotation_interval must be >= 1, got {}",
            site.name, site.proxy_rotation_interval
        )));
    }

    if site.max_in_flight < 1 || site.max_in_flight > 100 {
        return Err(ConfigError::Validation(format!(
            "Site '{}': max_in_flight must be between 1 and 100, got {}",
            site.name, site.max_in_flight
        )));
    }

    if site.admission_poll_ms < 10 {
        return Err(ConfigError::Validation(format!(
            "Site '{}': admission_poll_ms must be >= 10ms, got {}ms",
            site.name, site.admission_poll_ms
        )));
    }

    for seed in &site.seed_urls {
        let url = Url::parse(seed)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid seed URL '{}': {}", seed, e)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::Validation(format!(
                "Seed URL '{}' must use an HTTP(S) scheme",
                seed
            )));
        }
    }

    Ok(())
}

/// Validates a site name: non-empty, alphanumeric + hyphens only
fn validate_site_name(name: &str) -> Result<(), ConfigError> {
    if name.is_empty() {
        return Err(ConfigError::Validation(
            "Site name cannot be empty".to_string(),
        ));
    }

    if !name.chars().all(|c| c.is_alphanumeric() || c == '-') {
        return Err(ConfigError::Validation(format!(
            "Site name must contain only alphanumeric characters and hyphens, got '{}'",
            name
        )));
    }

    Ok(())
}

/// Validates all proxy entries
fn validate_proxies(proxies: &[ProxyEntry]) -> Result<(), ConfigError> {
    for proxy in proxies {
        validate_proxy(proxy)?;
    }
    Ok(())
}

/// Validates a single proxy entry
fn validate_proxy(proxy: &ProxyEntry) -> Result<(), ConfigError> {
    if proxy.host.is_empty() {
        return Err(ConfigError::Validation(
            "Proxy host cannot be empty".to_string(),
        ));
    }

    if proxy.port == 0 {
        return Err(ConfigError::Validation(format!(
            "Proxy '{}' has invalid port 0",
            proxy.host
        )));
    }

    if !PROTOCOLS.contains(&proxy.protocol.as_str()) {
        return Err(ConfigError::Validation(format!(
            "Proxy '{}': protocol must be one of {:?}, got '{}'",
            proxy.host, PROTOCOLS, proxy.protocol
        )));
    }

    // Credentials come as a pair or not at all
    if proxy.username.is_some() != proxy.password.is_some() {
        return Err(ConfigError::Validation(format!(
            "Proxy '{}': username and password must be either both provided or both omitted",
            proxy.host
        )));
    }

    for site in &proxy.banned_sites {
        if site.is_empty() {
            return Err(ConfigError::Validation(format!(
                "Proxy '{}': banned-sites entries cannot be empty",
                proxy.host
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_pool_config() -> PoolConfig {
        PoolConfig {
            selection_strategy: crate::config::SelectionStrategy::Score,
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

    fn test_site_config(name: &str) -> SiteConfig {
        SiteConfig {
            name: name.to_string(),
            base_url: "https://www.ebay.com".to_string(),
            requires_proxy: false,
            rate_limit_per_minute: 10,
            burst_allowance: 2,
            retry_attempts: 3,
            retry_backoff_multiplier: 1.5,
            retry_base_delay_ms: 1000,
            retry_max_delay_ms: 60_000,
            request_timeout_secs: 30,
            proxy_rotation_interval: 5,
            max_in_flight: 4,
            admission_poll_ms: 250,
            seed_urls: vec![],
        }
    }

    fn test_proxy_entry(host: &str) -> ProxyEntry {
        ProxyEntry {
            host: host.to_string(),
            port: 8080,
            protocol: "http".to_string(),
            username: None,
            password: None,
            country: None,
            provider: None,
            banned_sites: vec![],
        }
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config {
            pool: test_pool_config(),
            sites: vec![test_site_config("ebay")],
            proxies: vec![test_proxy_entry("proxy.example.com")],
        };
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_validate_rejects_empty_sites() {
        let config = Config {
            pool: test_pool_config(),
            sites: vec![],
            proxies: vec![],
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_duplicate_site_names() {
        let config = Config {
            pool: test_pool_config(),
            sites: vec![test_site_config("ebay"), test_site_config("ebay")],
            proxies: vec![],
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_rejects_proxyless_site_requiring_proxy() {
        let mut site = test_site_config("ebay");
        site.requires_proxy = true;
        let config = Config {
            pool: test_pool_config(),
            sites: vec![site],
            proxies: vec![],
        };
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_validate_site_name() {
        assert!(validate_site_name("ebay").is_ok());
        assert!(validate_site_name("shop-goodwill").is_ok());

        assert!(validate_site_name("").is_err());
        assert!(validate_site_name("e bay").is_err());
        assert!(validate_site_name("ebay!").is_err());
    }

    #[test]
    fn test_validate_pool_success_rate_range() {
        let mut pool = test_pool_config();
        pool.min_success_rate = 0.0;
        assert!(validate_pool_config(&pool).is_err());

        pool.min_success_rate = 1.5;
        assert!(validate_pool_config(&pool).is_err());

        pool.min_success_rate = 1.0;
        assert!(validate_pool_config(&pool).is_ok());
    }

    #[test]
    fn test_validate_backoff_multiplier() {
        let mut site = test_site_config("ebay");
        site.retry_backoff_multiplier = 0.5;
        assert!(validate_site(&site).is_err());

        site.retry_backoff_multiplier = 1.0;
        assert!(validate_site(&site).is_ok());
    }

    #[test]
    fn test_validate_proxy_protocol() {
        let mut proxy = test_proxy_entry("proxy.example.com");
        assert!(validate_proxy(&proxy).is_ok());

        proxy.protocol = "socks5".to_string();
        assert!(validate_proxy(&proxy).is_ok());

        proxy.protocol = "ftp".to_string();
        assert!(validate_proxy(&proxy).is_err());
    }

    #[test]
    fn test_validate_proxy_credentials_pair() {
        let mut proxy = test_proxy_entry("proxy.example.com");
        proxy.username = Some("user".to_string());
        assert!(validate_proxy(&proxy).is_err());

        proxy.password = Some("pass".to_string());
        assert!(validate_proxy(&proxy).is_ok());
    }

    #[test]
    fn test_validate_seed_urls() {
        let mut site = test_site_config("ebay");
        site.seed_urls = vec!["https://www.ebay.com/sch/i.html?_nkw=camera".to_string()];
        assert!(validate_site(&site).is_ok());

        site.seed_urls = vec!["not a url".to_string()];
        assert!(validate_site(&site).is_err());

        site.seed_urls = vec!["ftp://www.ebay.com/listing".to_string()];
        assert!(validate_site(&site).is_err());
    }
}
