//! Token-bucket admission control
//!
//! One limiter per site, owned by that site's scheduler. Tokens accumulate
//! continuously at `rate_limit_per_minute / 60` per second, capped at
//! `burst_allowance + 1`, and each admitted request consumes one. There is
//! no blocking variant: a denied caller decides its own delay policy.

use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-site token bucket
pub struct RateLimiter {
    bucket: Mutex<Bucket>,
}

#[derive(Debug)]
struct Bucket {
    /// Available admissions; fractional while refilling
    tokens: f64,

    /// When tokens were last accrued
    last_refill: Instant,

    /// Refill rate in tokens per second
    rate_per_sec: f64,

    /// Upper bound on accumulated tokens (burst + 1)
    capacity: f64,
}

impl Bucket {
    /// Accrues tokens for the time elapsed since the last refill
    fn refill(&mut self, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill);
        if elapsed > Duration::ZERO {
            self.tokens = (self.tokens + elapsed.as_secs_f64() * self.rate_per_sec)
                .min(self.capacity);
            self.last_refill = now;
        }
    }
}

impl RateLimiter {
    /// Creates a full bucket for the given per-minute rate and burst allowance
    pub fn new(rate_limit_per_minute: u32, burst_allowance: u32) -> Self {
        let capacity = (burst_allowance + 1) as f64;
        Self {
            bucket: Mutex::new(Bucket {
                tokens: capacity,
                last_refill: Instant::now(),
                rate_per_sec: rate_limit_per_minute as f64 / 60.0,
                capacity,
            }),
        }
    }

    /// Tries to admit one request right now
    ///
    /// Returns true and consumes a token if one is available; returns false
    /// without consuming anything otherwise.
    pub fn try_acquire(&self) -> bool {
        self.try_acquire_at(Instant::now())
    }

    /// Tries to admit one request as of the given instant
    ///
    /// Time is injected so admission sequences can be tested without
    /// sleeping.
    pub fn try_acquire_at(&self, now: Instant) -> bool {
        let mut bucket = self.bucket.lock().unwrap();
        bucket.refill(now);

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// How long until a token becomes available
    ///
    /// Returns None if a request would be admitted right now. Callers use
    /// this to bound their admission poll sleep.
    pub fn time_until_token(&self) -> Option<Duration> {
        self.time_until_token_at(Instant::now())
    }

    /// How long until a token becomes available, as of the given instant
    pub fn time_until_token_at(&self, now: Instant) -> Option<Duration> {
        let mut bucket = self.bucket.lock().unwrap();
        bucket.refill(now);

        if bucket.tokens >= 1.0 {
            return None;
        }

        let needed = 1.0 - bucket.tokens;
        Some(Duration::from_secs_f64(needed / bucket.rate_per_sec))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_burst_capacity() {
        // rate 10/min, burst 2: exactly burst + 1 = 3 instantaneous grants
        let limiter = RateLimiter::new(10, 2);
        let now = Instant::now();

        let granted = (0..12).filter(|_| limiter.try_acquire_at(now)).count();
        assert_eq!(granted, 3);
    }

    #[test]
    fn test_zero_burst_allows_single_admission() {
        let limiter = RateLimiter::new(60, 0);
        let now = Instant::now();

        assert!(limiter.try_acquire_at(now));
        assert!(!limiter.try_acquire_at(now));
    }

    #[test]
    fn test_denial_consumes_nothing() {
        let limiter = RateLimiter::new(10, 0);
        let now = Instant::now();

        assert!(limiter.try_acquire_at(now));
        // Repeated denials must not push the next grant further out
        for _ in 0..5 {
            assert!(!limiter.try_acquire_at(now));
        }

        // A token has comfortably accrued after 7 seconds at 10/min
        assert!(limiter.try_acquire_at(now + Duration::from_secs(7)));
    }

    #[test]
    fn test_refill_rate() {
        let limiter = RateLimiter::new(10, 0);
        let now = Instant::now();

        assert!(limiter.try_acquire_at(now));
        assert!(!limiter.try_acquire_at(now + Duration::from_secs(3)));
        assert!(limiter.try_acquire_at(now + Duration::from_secs(7)));
    }

    #[test]
    fn test_tokens_capped_at_burst_plus_one() {
        let limiter = RateLimiter::new(60, 2);
        let now = Instant::now();

        // A long idle period must not accumulate beyond the cap
        let later = now + Duration::from_secs(3600);
        let granted = (0..10).filter(|_| limiter.try_acquire_at(later)).count();
        assert_eq!(granted, 3);
    }

    #[test]
    fn test_window_bound() {
        // Over any T-second window: at most burst + 1 + rate * T grants
        let limiter = RateLimiter::new(60, 4); // 1 token/sec, capacity 5
        let start = Instant::now();

        let mut granted = 0;
        for second in 0..10 {
            let now = start + Duration::from_secs(second);
            while limiter.try_acquire_at(now) {
                granted += 1;
            }
        }

        // capacity 5 up front + 9 seconds of refill
        assert_eq!(granted, 5 + 9);
    }

    #[test]
    fn test_time_until_token() {
        let limiter = RateLimiter::new(10, 0);
        let now = Instant::now();

        assert!(limiter.time_until_token_at(now).is_none());
        assert!(limiter.try_acquire_at(now));

        let wait = limiter.time_until_token_at(now).unwrap();
        // Next token in roughly 6 seconds at 10/min
        assert!(wait > Duration::from_millis(5900) && wait < Duration::from_millis(6100));

        let wait = limiter.time_until_token_at(now + Duration::from_secs(3)).unwrap();
        assert!(wait > Duration::from_millis(2900) && wait < Duration::from_millis(3100));

        assert!(limiter
            .time_until_token_at(now + Duration::from_secs(7))
            .is_none());
    }

    #[test]
    fn test_fractional_tokens_accumulate() {
        let limiter = RateLimiter::new(30, 0); // 0.5 tokens/sec
        let now = Instant::now();

        assert!(limiter.try_acquire_at(now));
        assert!(!limiter.try_acquire_at(now + Duration::from_secs(1)));
        assert!(limiter.try_acquire_at(now + Duration::from_secs(2)));
    }
}
