/// Task state definitions for the per-site scheduler
///
/// This module defines the states a crawl task moves through while the
/// scheduler drives it.
use chrono::{DateTime, Utc};
use std::fmt;

/// Represents where a crawl task currently is in the scheduler's state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskState {
    // ===== Active States =====
    /// Task is waiting in the site queue
    Idle,

    /// Task is waiting for the rate limiter to grant admission
    Admitting,

    /// Task's request is in flight through the executor
    Executing,

    /// Task hit a retryable failure and is waiting out its backoff
    Retrying,

    // ===== Terminal States =====
    /// The request succeeded; the response was handed to the sink
    Succeeded,

    /// Retries are exhausted or the failure was fatal
    Exhausted,
}

impl TaskState {
    /// Returns true if this is a terminal state (no further processing)
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Exhausted)
    }

    /// Returns true if the task may still make progress
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }

    /// Returns true if this represents a successful completion
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded)
    }

    /// String representation used in logs
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Admitting => "admitting",
            Self::Executing => "executing",
            Self::Retrying => "retrying",
            Self::Succeeded => "succeeded",
            Self::Exhausted => "exhausted",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One unit of scraping work targeting a single URL on a single site
///
/// Created by an external task source (or from configured seed URLs) and
/// destroyed on terminal success or exhausted retries.
#[derive(Debug, Clone)]
pub struct CrawlTask {
    /// Name of the target site; routes the task to that site's scheduler
    pub site: String,

    /// The URL to fetch
    pub url: String,

    /// Number of retries already taken (0 for the initial attempt)
    pub attempt: u32,

    /// Current state in the scheduler's state machine
    pub state: TaskState,

    /// When the task was submitted
    pub submitted_at: DateTime<Utc>,
}

impl CrawlTask {
    /// Creates a new task for the given site and URL
    pub fn new(site: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            site: site.into(),
            url: url.into(),
            attempt: 0,
            state: TaskState::Idle,
            submitted_at: Utc::now(),
        }
    }
}
