//! Per-user submission rate limiting.
//!
//! Tracks the timestamp of each user's last successful submission. Reads are
//! pure lookups; the only mutator is [`RateLimiter::record_submission`],
//! which the finalization pipeline calls exactly once, immediately after a
//! fully successful finalize.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::time::{Duration, Instant};
use teloxide::types::UserId;

/// Thread-safe per-user cooldown tracker
pub struct RateLimiter {
    cooldown: Duration,
    submissions: Mutex<HashMap<UserId, Instant>>,
}

impl RateLimiter {
    pub fn new(cooldown: Duration) -> Self {
        Self {
            cooldown,
            submissions: Mutex::new(HashMap::new()),
        }
    }

    /// Remaining cooldown for the user, or `None` when a new application may
    /// start. A user with no recorded submission is never limited.
    pub fn remaining_cooldown(&self, user_id: UserId) -> Option<Duration> {
        self.remaining_at(user_id, Instant::now())
    }

    fn remaining_at(&self, user_id: UserId, now: Instant) -> Option<Duration> {
        let submissions = self.submissions.lock();
        let last = submissions.get(&user_id)?;
        let elapsed = now.duration_since(*last);
        if elapsed < self.cooldown {
            Some(self.cooldown - elapsed)
        } else {
            None
        }
    }

    /// Record a successful submission for the user
    pub fn record_submission(&self, user_id: UserId) {
        self.submissions.lock().insert(user_id, Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_user_is_never_limited() {
        let limiter = RateLimiter::new(Duration::from_secs(600));
        assert!(limiter.remaining_cooldown(UserId(1)).is_none());
    }

    #[test]
    fn test_recorded_submission_limits_within_cooldown() {
        let limiter = RateLimiter::new(Duration::from_secs(600));
        limiter.record_submission(UserId(1));
        assert!(limiter.remaining_cooldown(UserId(1)).is_some());
        // Other users are unaffected
        assert!(limiter.remaining_cooldown(UserId(2)).is_none());
    }

    #[test]
    fn test_zero_cooldown_never_limits() {
        let limiter = RateLimiter::new(Duration::ZERO);
        limiter.record_submission(UserId(1));
        assert!(limiter.remaining_cooldown(UserId(1)).is_none());
    }

    #[test]
    fn test_check_is_idempotent() {
        let limiter = RateLimiter::new(Duration::from_secs(600));
        limiter.record_submission(UserId(1));

        // Two reads without an intervening record agree on the verdict
        let first = limiter.remaining_cooldown(UserId(1)).is_some();
        let second = limiter.remaining_cooldown(UserId(1)).is_some();
        assert_eq!(first, second);
    }

    #[test]
    fn test_expired_cooldown_clears() {
        let limiter = RateLimiter::new(Duration::from_millis(1));
        limiter.record_submission(UserId(1));
        std::thread::sleep(Duration::from_millis(5));
        assert!(limiter.remaining_cooldown(UserId(1)).is_none());
    }
}
