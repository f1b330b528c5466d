//! Crawl engine orchestration
//!
//! The engine wires one scheduler per configured site to a shared proxy
//! pool, starts the background health prober, and exposes a clonable submit
//! handle. `run` drives everything until every handle is dropped and all
//! in-flight tasks reach a state boundary, then shuts the prober down.

use crate::config::Config;
use crate::crawler::executor::RequestExecutor;
use crate::crawler::scheduler::SiteScheduler;
use crate::output::{CrawlStats, Sink};
use crate::proxy::{HealthProber, ProxyPool};
use crate::state::CrawlTask;
use crate::{Result, ScoutError};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Per-site task queue depth
const TASK_QUEUE_CAPACITY: usize = 1024;

/// Clonable handle for submitting crawl tasks to a running engine
///
/// Dropping every handle closes the task queues, which lets `run` finish
/// once in-flight work drains.
#[derive(Clone)]
pub struct EngineHandle {
    senders: HashMap<String, mpsc::Sender<CrawlTask>>,
}

impl EngineHandle {
    /// Submits a task to its site's scheduler
    ///
    /// # Errors
    ///
    /// * `ScoutError::UnknownSite` - No scheduler is configured for the task's site
    /// * `ScoutError::QueueClosed` - The engine has already shut down
    pub async fn submit(&self, task: CrawlTask) -> Result<()> {
        let sender = self
            .senders
            .get(&task.site)
            .ok_or_else(|| ScoutError::UnknownSite(task.site.clone()))?;

        sender.send(task).await.map_err(|e| ScoutError::QueueClosed {
            site: e.0.site.clone(),
        })
    }

    /// The site names this handle can submit to
    pub fn sites(&self) -> Vec<String> {
        self.senders.keys().cloned().collect()
    }
}

/// The assembled crawl system: schedulers, pool, prober, and sink
pub struct CrawlEngine {
    schedulers: Vec<(Arc<SiteScheduler>, mpsc::Receiver<CrawlTask>)>,
    senders: HashMap<String, mpsc::Sender<CrawlTask>>,
    pool: Arc<ProxyPool>,
    stats: Arc<CrawlStats>,
    cancel: CancellationToken,
}

impl CrawlEngine {
    /// Builds an engine from a validated configuration
    ///
    /// Proxies are loaded into the pool once here; rotation and health
    /// logic are internal from this point on.
    pub fn new(config: Config, sink: Arc<dyn Sink>) -> Self {
        let pool = Arc::new(ProxyPool::from_config(&config));
        let executor = Arc::new(RequestExecutor::new());
        let stats = Arc::new(CrawlStats::new());
        let cancel = CancellationToken::new();

        let mut schedulers = Vec::new();
        let mut senders = HashMap::new();

        for site in &config.sites {
            let (tx, rx) = mpsc::channel(TASK_QUEUE_CAPACITY);
            let scheduler = Arc::new(SiteScheduler::new(
                site.clone(),
                pool.clone(),
                executor.clone(),
                sink.clone(),
                stats.clone(),
                cancel.clone(),
            ));
            senders.insert(site.name.clone(), tx);
            schedulers.push((scheduler, rx));
        }

        Self {
            schedulers,
            senders,
            pool,
            stats,
            cancel,
        }
    }

    /// A handle for submitting tasks; call before `run` consumes the engine
    pub fn handle(&self) -> EngineHandle {
        EngineHandle {
            senders: self.senders.clone(),
        }
    }

    /// Token that cancels every scheduler and the prober when triggered
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The shared proxy pool, for status reporting
    pub fn pool(&self) -> Arc<ProxyPool> {
        self.pool.clone()
    }

    /// The shared crawl counters
    pub fn stats(&self) -> Arc<CrawlStats> {
        self.stats.clone()
    }

    /// Runs every site scheduler and the health prober
    ///
    /// Completes when all submit handles are dropped and in-flight tasks
    /// have drained, or when the cancellation token fires. The prober is
    /// stopped on the way out.
    pub async fn run(mut self) {
        // The engine's own senders must go, or the queues never close
        self.senders.clear();

        let prober_cancel = self.cancel.child_token();
        let prober = HealthProber::new(self.pool.clone(), prober_cancel.clone());
        let prober_handle = tokio::spawn(prober.run());

        let mut workers = Vec::new();
        for (scheduler, rx) in self.schedulers.drain(..) {
            tracing::info!("Starting scheduler for site {}", scheduler.site());
            workers.push(tokio::spawn(scheduler.run(rx)));
        }

        for worker in workers {
            let _ = worker.await;
        }

        prober_cancel.cancel();
        let _ = prober_handle.await;

        let status = self.pool.status();
        tracing::info!(
            "Engine stopped: {} proxies ({} healthy, {} degraded, {} deactivated)",
            status.total,
            status.healthy,
            status.degraded,
            status.deactivated
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PoolConfig, SelectionStrategy, SiteConfig};
    use crate::output::MemorySink;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_site(name: &str) -> SiteConfig {
        SiteConfig {
            name: name.to_string(),
            base_url: "https://example.com".to_string(),
            requires_proxy: false,
            rate_limit_per_minute: 600,
            burst_allowance: 10,
            retry_attempts: 1,
            retry_backoff_multiplier: 2.0,
            retry_base_delay_ms: 10,
            retry_max_delay_ms: 60_000,
            request_timeout_secs: 5,
            proxy_rotation_interval: 5,
            max_in_flight: 4,
            admission_poll_ms: 10,
            seed_urls: vec![],
        }
    }

    fn test_config(sites: Vec<SiteConfig>) -> Config {
        Config {
            pool: PoolConfig {
                selection_strategy: SelectionStrategy::Score,
                min_success_rate: 0.5,
                min_sample_size: 5,
                max_consecutive_failures: 3,
                cooldown_minutes: 10,
                health_check_interval_secs: 3600,
                health_check_timeout_secs: 10,
                probe_url: "https://httpbin.org/ip".to_string(),
                probe_healthy: false,
            },
            sites,
            proxies: vec![],
        }
    }

    #[tokio::test]
    async fn test_engine_runs_to_completion() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let engine = CrawlEngine::new(test_config(vec![test_site("ebay")]), sink.clone());
        let handle = engine.handle();

        let submit = tokio::spawn({
            let uri = server.uri();
            async move {
                for i in 0..5 {
                    handle
                        .submit(CrawlTask::new("ebay", format!("{}/itm/{}", uri, i)))
                        .await
                        .unwrap();
                }
                // handle drops here, closing the queue
            }
        });

        engine.run().await;
        submit.await.unwrap();

        assert_eq!(sink.success_count(), 5);
    }

    #[tokio::test]
    async fn test_engine_routes_by_site() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/ebay"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/amazon"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let engine = CrawlEngine::new(
            test_config(vec![test_site("ebay"), test_site("amazon")]),
            sink.clone(),
        );
        let handle = engine.handle();

        let uri = server.uri();
        handle
            .submit(CrawlTask::new("ebay", format!("{}/ebay", uri)))
            .await
            .unwrap();
        handle
            .submit(CrawlTask::new("amazon", format!("{}/amazon", uri)))
            .await
            .unwrap();
        drop(handle);

        engine.run().await;

        assert_eq!(sink.success_count(), 2);
    }

    #[tokio::test]
    async fn test_submit_to_unknown_site() {
        let sink = Arc::new(MemorySink::new());
        let engine = CrawlEngine::new(test_config(vec![test_site("ebay")]), sink);
        let handle = engine.handle();

        let result = handle
            .submit(CrawlTask::new("craigslist", "https://example.com/"))
            .await;

        assert!(matches!(result, Err(ScoutError::UnknownSite(_))));
    }

    #[tokio::test]
    async fn test_cancellation_stops_engine() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let sink = Arc::new(MemorySink::new());
        let engine = CrawlEngine::new(test_config(vec![test_site("ebay")]), sink);
        let handle = engine.handle();
        let cancel = engine.cancellation_token();

        // Keep a handle alive: without cancellation the engine would wait
        // on the open queue forever
        let run = tokio::spawn(engine.run());
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        cancel.cancel();

        tokio::time::timeout(std::time::Duration::from_secs(5), run)
            .await
            .expect("engine did not stop after cancellation")
            .unwrap();

        drop(handle);
    }
}
