//! Per-site crawl scheduling
//!
//! This module handles:
//! - Pulling crawl tasks from the site's queue
//! - Bounding in-flight requests via a semaphore
//! - Rate-limit admission with bounded polling
//! - Proxy acquisition, rotation cadence, and outcome reporting
//! - Retry with exponential backoff, re-admitted through the rate limiter
//!
//! One scheduler runs per configured site. Schedulers share nothing except
//! the proxy pool, so one site's stalls never block another's.

use crate::config::SiteConfig;
use crate::crawler::executor::RequestExecutor;
use crate::crawler::limiter::RateLimiter;
use crate::output::{CrawlStats, Sink};
use crate::proxy::ProxyPool;
use crate::state::{CrawlTask, OutcomeStatus, RequestOutcome, TaskState};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

/// Computes the backoff wait before the given retry attempt
///
/// `base_delay * multiplier^attempt`, capped at the policy's maximum, so
/// consecutive retries wait longer each time.
fn retry_backoff(policy: &SiteConfig, attempt: u32) -> Duration {
    let backoff = policy.retry_base_delay().as_secs_f64()
        * policy.retry_backoff_multiplier.powi(attempt as i32);
    let capped = backoff.min(policy.retry_max_delay().as_secs_f64());
    Duration::from_secs_f64(capped)
}

/// Coordinator for one site's crawl tasks
///
/// Drives each task through the state machine
/// `Admitting -> Executing -> {Succeeded, Retrying, Exhausted}`, consulting
/// the site's rate limiter before every attempt and the shared proxy pool
/// whenever the site policy requires a proxy.
pub struct SiteScheduler {
    policy: SiteConfig,
    limiter: RateLimiter,
    pool: Arc<ProxyPool>,
    executor: Arc<RequestExecutor>,
    sink: Arc<dyn Sink>,
    stats: Arc<CrawlStats>,
    cancel: CancellationToken,

    /// Proxied requests served so far, for the rotation cadence
    proxied_requests: AtomicU32,
}

impl SiteScheduler {
    /// Creates a scheduler for the given site policy
    pub fn new(
        policy: SiteConfig,
        pool: Arc<ProxyPool>,
        executor: Arc<RequestExecutor>,
        sink: Arc<dyn Sink>,
        stats: Arc<CrawlStats>,
        cancel: CancellationToken,
    ) -> Self {
        let limiter = RateLimiter::new(policy.rate_limit_per_minute, policy.burst_allowance);
        Self {
            policy,
            limiter,
            pool,
            executor,
            sink,
            stats,
            cancel,
            proxied_requests: AtomicU32::new(0),
        }
    }

    /// The site this scheduler serves
    pub fn site(&self) -> &str {
        &self.policy.name
    }

    /// Worker loop: pulls tasks from the queue until it closes or the
    /// engine shuts down, driving each task concurrently up to the site's
    /// in-flight bound
    pub async fn run(self: Arc<Self>, mut tasks: mpsc::Receiver<CrawlTask>) {
        let semaphore = Arc::new(Semaphore::new(self.policy.max_in_flight as usize));

        loop {
            let task = tokio::select! {
                task = tasks.recv() => match task {
                    Some(task) => task,
                    None => break,
                },
                _ = self.cancel.cancelled() => break,
            };

            let permit = match semaphore.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.drive(task).await;
                drop(permit);
            });
        }

        // Drain: wait for every in-flight task to reach a state boundary
        let _ = semaphore.acquire_many(self.policy.max_in_flight).await;
        tracing::debug!("Scheduler for site {} stopped", self.policy.name);
    }

    /// Drives one task to a terminal state
    ///
    /// Returns the state the task ended in. A non-terminal return means the
    /// task was cancelled at a state boundary.
    pub async fn drive(&self, mut task: CrawlTask) -> TaskState {
        self.stats.record_task_started();

        loop {
            // Admitting: wait until the rate limiter grants a slot. Denial
            // is backpressure, not a failure, so it costs no attempt.
            task.state = TaskState::Admitting;
            loop {
                if self.cancel.is_cancelled() {
                    return task.state;
                }
                if self.limiter.try_acquire() {
                    break;
                }

                self.stats.record_admission_denied();
                let poll = self.policy.admission_poll();
                let wait = self.limiter.time_until_token().unwrap_or(poll).min(poll);
                tokio::select! {
                    _ = tokio::time::sleep(wait) => {}
                    _ = self.cancel.cancelled() => return task.state,
                }
            }

            // Executing
            task.state = TaskState::Executing;
            let outcome = self.execute_attempt(&task).await;

            match outcome.status {
                OutcomeStatus::Success => {
                    task.state = TaskState::Succeeded;
                    self.stats.record_succeeded();
                    let body = outcome.body.as_deref().unwrap_or("");
                    self.sink.on_success(&task, &outcome, body);
                    return task.state;
                }

                // Fatal failures skip the retry path entirely
                OutcomeStatus::FatalFailure => {
                    task.state = TaskState::Exhausted;
                    self.stats.record_exhausted();
                    self.sink.on_exhausted(&task, &outcome);
                    return task.state;
                }

                OutcomeStatus::RetryableFailure => {
                    if task.attempt >= self.policy.retry_attempts {
                        task.state = TaskState::Exhausted;
                        self.stats.record_exhausted();
                        self.sink.on_exhausted(&task, &outcome);
                        return task.state;
                    }

                    task.state = TaskState::Retrying;
                    task.attempt += 1;
                    self.stats.record_retry();

                    let delay = retry_backoff(&self.policy, task.attempt);
                    tracing::debug!(
                        "Retrying {} in {}ms (attempt {}/{}): {}",
                        task.url,
                        delay.as_millis(),
                        task.attempt,
                        self.policy.retry_attempts,
                        outcome.describe()
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = self.cancel.cancelled() => return task.state,
                    }
                    // Loop back to Admitting: retries respect the rate limit
                }
            }
        }
    }

    /// One attempt: bind a proxy if the policy requires one, execute the
    /// request, and report the outcome back to the pool
    async fn execute_attempt(&self, task: &CrawlTask) -> RequestOutcome {
        let lease = if self.policy.requires_proxy {
            match self.pool.acquire(&self.policy.name) {
                Ok(lease) => Some(lease),
                // Proxy scarcity is transient: classify like a retryable
                // failure so the health prober gets time to recover one
                Err(_) => {
                    tracing::warn!(
                        "No healthy proxy for site {}, treating as retryable",
                        self.policy.name
                    );
                    return RequestOutcome::no_healthy_proxy();
                }
            }
        } else {
            None
        };

        let outcome = self
            .executor
            .execute(
                &task.url,
                lease.as_ref().map(|l| l.endpoint()),
                self.policy.request_timeout(),
            )
            .await;

        if let Some(lease) = lease {
            self.pool.release(lease, &outcome);

            let served = self.proxied_requests.fetch_add(1, Ordering::Relaxed) + 1;
            if served % self.policy.proxy_rotation_interval == 0 {
                // Periodic rotation cadence from the site policy
                self.pool.force_rotate(&self.policy.name);
            } else if outcome.status.is_retryable() {
                // A failed egress should not serve the retry
                self.pool.force_rotate(&self.policy.name);
            }
        }

        outcome
    }
}
