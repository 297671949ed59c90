//! Per-user fixed-window rate limiting for operator commands.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

pub const DEFAULT_MAX_PER_WINDOW: u32 = 30;
pub const DEFAULT_WINDOW_SECS: i64 = 60;

/// Counts events per user in fixed windows of `window_secs`.
///
/// Time is split into buckets `floor(ts / window_secs)`; a user's count
/// resets when they act in a new bucket.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    max_per_window: u32,
    window_secs: i64,
    buckets: HashMap<i64, (i64, u32)>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PER_WINDOW, DEFAULT_WINDOW_SECS)
    }
}

impl RateLimiter {
    pub fn new(max_per_window: u32, window_secs: i64) -> Self {
        Self {
            max_per_window,
            window_secs: window_secs.max(1),
            buckets: HashMap::new(),
        }
    }

    fn bucket(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp().div_euclid(self.window_secs)
    }

    /// Count one event for `user`; `false` once the window's budget is spent.
    pub fn check(&mut self, user: i64, now: DateTime<Utc>) -> bool {
        let bucket = self.bucket(now);
        let entry = self.buckets.entry(user).or_insert((bucket, 0));
        if entry.0 != bucket {
            *entry = (bucket, 0);
        }
        if entry.1 >= self.max_per_window {
            return false;
        }
        entry.1 += 1;
        true
    }

    /// Forget users whose last bucket is older than the current one.
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let bucket = self.bucket(now);
        self.buckets.retain(|_, (b, _)| *b == bucket);
    }

    pub fn tracked_users(&self) -> usize {
        self.buckets.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_040 + secs, 0).unwrap()
    }

    #[test]
    fn budget_exhausted_within_window() {
        let mut limiter = RateLimiter::new(3, 60);
        assert!(limiter.check(1, at(0)));
        assert!(limiter.check(1, at(1)));
        assert!(limiter.check(1, at(2)));
        assert!(!limiter.check(1, at(3)));
    }

    #[test]
    fn users_are_independent() {
        let mut limiter = RateLimiter::new(1, 60);
        assert!(limiter.check(1, at(0)));
        assert!(limiter.check(2, at(0)));
        assert!(!limiter.check(1, at(0)));
    }

    #[test]
    fn new_bucket_resets() {
        let mut limiter = RateLimiter::new(1, 60);
        // 1_700_000_040 is a multiple of 60.
        assert!(limiter.check(1, at(0)));
        assert!(!limiter.check(1, at(59)));
        assert!(limiter.check(1, at(60)));
    }

    #[test]
    fn sweep_drops_stale_users() {
        let mut limiter = RateLimiter::default();
        limiter.check(1, at(0));
        limiter.check(2, at(61));
        limiter.sweep(at(61));
        assert_eq!(limiter.tracked_users(), 1);
    }
}
