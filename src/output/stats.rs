//! Crawl statistics
//!
//! Thread-safe counters updated by every site scheduler, with a plain
//! snapshot type for display. Counters are informational: they never drive
//! control flow, so relaxed atomics are enough.

use crate::proxy::PoolStatus;
use std::sync::atomic::{AtomicU64, Ordering};

/// Shared crawl counters
#[derive(Debug, Default)]
pub struct CrawlStats {
    tasks_started: AtomicU64,
    tasks_succeeded: AtomicU64,
    tasks_exhausted: AtomicU64,
    retries: AtomicU64,
    admission_denials: AtomicU64,
}

impl CrawlStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a task entering its scheduler's state machine
    pub fn record_task_started(&self) {
        self.tasks_started.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task reaching the Succeeded terminal state
    pub fn record_succeeded(&self) {
        self.tasks_succeeded.fetch_add(1, Ordering::Relaxed);
    }

    /// Records a task reaching the Exhausted terminal state
    pub fn record_exhausted(&self) {
        self.tasks_exhausted.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one retry wait
    pub fn record_retry(&self) {
        self.retries.fetch_add(1, Ordering::Relaxed);
    }

    /// Records one admission denial by a rate limiter
    pub fn record_admission_denied(&self) {
        self.admission_denials.fetch_add(1, Ordering::Relaxed);
    }

    /// Takes a point-in-time copy of all counters
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            tasks_started: self.tasks_started.load(Ordering::Relaxed),
            tasks_succeeded: self.tasks_succeeded.load(Ordering::Relaxed),
            tasks_exhausted: self.tasks_exhausted.load(Ordering::Relaxed),
            retries: self.retries.load(Ordering::Relaxed),
            admission_denials: self.admission_denials.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the crawl counters
#[derive(Debug, Clone, Default)]
pub struct StatsSnapshot {
    pub tasks_started: u64,
    pub tasks_succeeded: u64,
    pub tasks_exhausted: u64,
    pub retries: u64,
    pub admission_denials: u64,
}

impl StatsSnapshot {
    /// Tasks that reached a terminal state
    pub fn terminal_tasks(&self) -> u64 {
        self.tasks_succeeded + self.tasks_exhausted
    }

    /// Fraction of terminal tasks that succeeded, as a percentage
    pub fn success_rate(&self) -> f64 {
        let terminal = self.terminal_tasks();
        if terminal == 0 {
            return 0.0;
        }
        (self.tasks_succeeded as f64 / terminal as f64) * 100.0
    }
}

/// Prints a crawl summary to stdout
///
/// # Arguments
///
/// * `stats` - The crawl counter snapshot
/// * `pool` - The proxy pool status at the same moment
pub fn print_summary(stats: &StatsSnapshot, pool: &PoolStatus) {
    println!("=== Crawl Summary ===\n");

    println!("Tasks:");
    println!("  Started: {}", stats.tasks_started);
    println!("  Succeeded: {}", stats.tasks_succeeded);
    println!("  Exhausted: {}", stats.tasks_exhausted);
    println!("  Success rate: {:.1}%", stats.success_rate());
    println!();

    println!("Scheduling:");
    println!("  Retries: {}", stats.retries);
    println!("  Admission denials: {}", stats.admission_denials);
    println!();

    println!("Proxy Pool:");
    println!("  Total: {}", pool.total);
    println!("  Healthy: {}", pool.healthy);
    println!("  Degraded: {}", pool.degraded);
    println!("  Deactivated: {}", pool.deactivated);
    println!("  Request success rate: {:.1}%", pool.success_rate * 100.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_accumulate() {
        let stats = CrawlStats::new();

        stats.record_task_started();
        stats.record_task_started();
        stats.record_succeeded();
        stats.record_exhausted();
        stats.record_retry();
        stats.record_retry();
        stats.record_admission_denied();

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.tasks_started, 2);
        assert_eq!(snapshot.tasks_succeeded, 1);
        assert_eq!(snapshot.tasks_exhausted, 1);
        assert_eq!(snapshot.retries, 2);
        assert_eq!(snapshot.admission_denials, 1);
    }

    #[test]
    fn test_success_rate() {
        let stats = CrawlStats::new();
        for _ in 0..8 {
            stats.record_succeeded();
        }
        for _ in 0..2 {
            stats.record_exhausted();
        }

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.terminal_tasks(), 10);
        assert!((snapshot.success_rate() - 80.0).abs() < 0.01);
    }

    #[test]
    fn test_success_rate_no_terminal_tasks() {
        let snapshot = StatsSnapshot::default();
        assert_eq!(snapshot.success_rate(), 0.0);
    }
}
