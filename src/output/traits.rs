//! Outbound sink boundary
//!
//! Terminal task outcomes leave the core through the `Sink` trait: successes
//! carry the raw response body to an external extraction and storage
//! pipeline, exhausted tasks go to an external failure-handling path. The
//! core never parses or persists anything itself.

use crate::state::{CrawlTask, RequestOutcome};
use std::sync::Mutex;

/// Receiver for terminal crawl outcomes
///
/// Implementations must be thread-safe: every site scheduler calls into the
/// same sink concurrently. Sinks should return quickly; anything expensive
/// belongs on the far side of a queue.
pub trait Sink: Send + Sync {
    /// Called once per task that succeeded
    ///
    /// # Arguments
    ///
    /// * `task` - The completed task
    /// * `outcome` - The final request outcome
    /// * `body` - The raw response body, for the external parser
    fn on_success(&self, task: &CrawlTask, outcome: &RequestOutcome, body: &str);

    /// Called once per task that exhausted its retries or failed fatally
    ///
    /// # Arguments
    ///
    /// * `task` - The failed task
    /// * `outcome` - The last request outcome observed
    fn on_exhausted(&self, task: &CrawlTask, outcome: &RequestOutcome);
}

/// Sink that logs terminal outcomes via tracing
///
/// The default for the CLI: downstream pipelines replace this with their
/// own implementation.
pub struct LogSink;

impl Sink for LogSink {
    fn on_success(&self, task: &CrawlTask, outcome: &RequestOutcome, body: &str) {
        tracing::info!(
            "Crawled {} [{}] {} bytes in {}ms (attempt {})",
            task.url,
            outcome.http_status.unwrap_or(0),
            body.len(),
            outcome.latency.as_millis(),
            task.attempt + 1
        );
    }

    fn on_exhausted(&self, task: &CrawlTask, outcome: &RequestOutcome) {
        tracing::warn!(
            "Giving up on {} after {} attempts: {}",
            task.url,
            task.attempt + 1,
            outcome.describe()
        );
    }
}

/// Sink that collects terminal outcomes in memory, for tests
#[derive(Default)]
pub struct MemorySink {
    successes: Mutex<Vec<(CrawlTask, RequestOutcome, String)>>,
    failures: Mutex<Vec<(CrawlTask, RequestOutcome)>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of recorded successes
    pub fn successes(&self) -> Vec<(CrawlTask, RequestOutcome, String)> {
        self.successes.lock().unwrap().clone()
    }

    /// Snapshot of recorded failures
    pub fn failures(&self) -> Vec<(CrawlTask, RequestOutcome)> {
        self.failures.lock().unwrap().clone()
    }

    pub fn success_count(&self) -> usize {
        self.successes.lock().unwrap().len()
    }

    pub fn failure_count(&self) -> usize {
        self.failures.lock().unwrap().len()
    }
}

impl Sink for MemorySink {
    fn on_success(&self, task: &CrawlTask, outcome: &RequestOutcome, body: &str) {
        self.successes
            .lock()
            .unwrap()
            .push((task.clone(), outcome.clone(), body.to_string()));
    }

    fn on_exhausted(&self, task: &CrawlTask, outcome: &RequestOutcome) {
        self.failures
            .lock()
            .unwrap()
            .push((task.clone(), outcome.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_memory_sink_records_success() {
        let sink = MemorySink::new();
        let task = CrawlTask::new("ebay", "https://www.ebay.com/itm/1");
        let outcome = RequestOutcome::success(200, Duration::from_millis(50), String::new());

        sink.on_success(&task, &outcome, "<html></html>");

        assert_eq!(sink.success_count(), 1);
        assert_eq!(sink.failure_count(), 0);
        let (recorded_task, _, body) = &sink.successes()[0];
        assert_eq!(recorded_task.url, task.url);
        assert_eq!(body, "<html></html>");
    }

    #[test]
    fn test_memory_sink_records_failure() {
        let sink = MemorySink::new();
        let task = CrawlTask::new("ebay", "https://www.ebay.com/itm/2");
        let outcome = RequestOutcome::retryable_http(503, Duration::from_millis(20));

        sink.on_exhausted(&task, &outcome);

        assert_eq!(sink.failure_count(), 1);
        let (_, recorded_outcome) = &sink.failures()[0];
        assert_eq!(recorded_outcome.http_status, Some(503));
    }
}
