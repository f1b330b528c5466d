//! Crawler module for scheduling and executing marketplace requests
//!
//! This module contains the core crawling logic, including:
//! - Token-bucket rate limiting per site
//! - Request execution with timeout and outcome classification
//! - The per-site scheduling state machine with retry and backoff
//! - Engine orchestration across sites, the proxy pool, and the prober

mod engine;
mod executor;
mod limiter;
mod scheduler;

pub use engine::{CrawlEngine, EngineHandle};
pub use executor::RequestExecutor;
pub use limiter::RateLimiter;
pub use scheduler::SiteScheduler;

use crate::config::Config;
use crate::output::{Sink, StatsSnapshot};
use crate::proxy::PoolStatus;
use crate::state::CrawlTask;
use crate::Result;
use std::sync::Arc;

/// Runs a complete crawl of every configured seed URL
///
/// This is the main entry point for the CLI. It will:
/// 1. Build the proxy pool from the configuration
/// 2. Start one scheduler per site plus the health prober
/// 3. Submit each site's seed URLs as crawl tasks
/// 4. Run until every task reaches a terminal state
///
/// # Arguments
///
/// * `config` - The validated configuration
/// * `sink` - Receiver for terminal outcomes
///
/// # Returns
///
/// The final crawl counters and proxy pool status
pub async fn run_crawl(config: Config, sink: Arc<dyn Sink>) -> Result<(StatsSnapshot, PoolStatus)> {
    let seeds: Vec<CrawlTask> = config
        .sites
        .iter()
        .flat_map(|site| {
            site.seed_urls
                .iter()
                .map(|url| CrawlTask::new(site.name.clone(), url.clone()))
        })
        .collect();

    if seeds.is_empty() {
        tracing::warn!("No seed URLs configured; nothing to crawl");
    }

    let engine = CrawlEngine::new(config, sink);
    let handle = engine.handle();
    let stats = engine.stats();
    let pool = engine.pool();

    for task in seeds {
        handle.submit(task).await?;
    }
    drop(handle);

    engine.run().await;
    Ok((stats.snapshot(), pool.status()))
}
