//! Pricescout: a proxy-aware marketplace crawl scheduler
//!
//! This crate crawls multiple third-party marketplaces under site-specific
//! rate limits, rotating proxy egress IPs to avoid blocking. Normalized
//! results flow out through a sink boundary to an external price-arbitrage
//! analysis stage.

pub mod config;
pub mod crawler;
pub mod output;
pub mod proxy;
pub mod state;

use thiserror::Error;

/// Main error type for Pricescout operations
#[derive(Debug, Error)]
pub enum ScoutError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No healthy proxy available for site '{site}'")]
    NoHealthyProxy { site: String },

    #[error("Unknown site '{0}': no scheduler is configured for it")]
    UnknownSite(String),

    #[error("Invalid proxy endpoint '{endpoint}': {message}")]
    InvalidProxy { endpoint: String, message: String },

    #[error("Task queue for site '{site}' is closed")]
    QueueClosed { site: String },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// Result type alias for Pricescout operations
pub type Result<T> = std::result::Result<T, ScoutError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::{Config, SelectionStrategy};
pub use crawler::{CrawlEngine, EngineHandle, RateLimiter, RequestExecutor};
pub use proxy::{ProxyEndpoint, ProxyHealth, ProxyPool};
pub use state::{CrawlTask, OutcomeStatus, RequestOutcome, TaskState};
