// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Failed-login throttle.
//!
//! Counts consecutive failed logins per email. Once the count reaches the
//! configured maximum, further attempts are refused for a window that starts
//! at `base` and doubles with every additional failure, up to `cap`. A
//! successful login forgets the email.
//!
//! The table is an LRU bounded to [`MAX_TRACKED_EMAILS`] entries so a flood of
//! distinct addresses cannot grow it without limit.

use std::num::NonZeroUsize;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use lru::LruCache;

/// Upper bound on tracked emails.
pub const MAX_TRACKED_EMAILS: usize = 10_000;

/// Throttle tuning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThrottleConfig {
    /// Consecutive failures tolerated before lockout starts
    pub max_failures: u32,
    /// First lockout length
    pub base_lockout: Duration,
    /// Longest lockout
    pub max_lockout: Duration,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        Self {
            max_failures: 5,
            base_lockout: Duration::from_secs(30),
            max_lockout: Duration::from_secs(15 * 60),
        }
    }
}

struct FailureRecord {
    failures: u32,
    locked_until: Option<Instant>,
}

/// Per-email failed-login counter.
pub struct LoginThrottle {
    config: ThrottleConfig,
    records: Mutex<LruCache<String, FailureRecord>>,
}

impl LoginThrottle {
    pub fn new(config: ThrottleConfig) -> Self {
        Self::with_capacity(config, MAX_TRACKED_EMAILS)
    }

    pub fn with_capacity(config: ThrottleConfig, capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            config,
            records: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// `Err(retry_after)` while `email` is locked out.
    pub fn check(&self, email: &str) -> Result<(), Duration> {
        self.check_at(email, Instant::now())
    }

    pub fn record_failure(&self, email: &str) {
        self.record_failure_at(email, Instant::now());
    }

    pub fn record_success(&self, email: &str) {
        if let Ok(mut records) = self.records.lock() {
            records.pop(email);
        }
    }

    pub(crate) fn check_at(&self, email: &str, now: Instant) -> Result<(), Duration> {
        let Ok(records) = self.records.lock() else {
            return Ok(());
        };
        match records.peek(email).and_then(|r| r.locked_until) {
            Some(until) if until > now => Err(until - now),
            _ => Ok(()),
        }
    }

    pub(crate) fn record_failure_at(&self, email: &str, now: Instant) {
        let Ok(mut records) = self.records.lock() else {
            return;
        };
        let record = records.get_or_insert_mut(email.to_string(), || FailureRecord {
            failures: 0,
            locked_until: None,
        });

        record.failures = record.failures.saturating_add(1);
        if record.failures >= self.config.max_failures {
            let excess = record.failures - self.config.max_failures;
            record.locked_until = Some(now + self.lockout_for(excess));
        }
    }

    fn lockout_for(&self, excess: u32) -> Duration {
        let factor = 1u32.checked_shl(excess).unwrap_or(u32::MAX);
        self.config
            .base_lockout
            .checked_mul(factor)
            .unwrap_or(self.config.max_lockout)
            .min(self.config.max_lockout)
    }

    #[cfg(test)]
    fn tracked(&self) -> usize {
        self.records.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn throttle() -> LoginThrottle {
        LoginThrottle::new(ThrottleConfig {
            max_failures: 3,
            base_lockout: Duration::from_secs(10),
            max_lockout: Duration::from_secs(60),
        })
    }

    #[test]
    fn allows_attempts_below_threshold() {
        let throttle = throttle();
        let now = Instant::now();

        throttle.record_failure_at("a@saop.edu", now);
        throttle.record_failure_at("a@saop.edu", now);
        assert!(throttle.check_at("a@saop.edu", now).is_ok());
    }

    #[test]
    fn locks_out_at_threshold() {
        let throttle = throttle();
        let now = Instant::now();

        for _ in 0..3 {
            throttle.record_failure_at("a@saop.edu", now);
        }
        assert_eq!(
            throttle.check_at("a@saop.edu", now),
            Err(Duration::from_secs(10))
        );
        // Other accounts are unaffected.
        assert!(throttle.check_at("b@saop.edu", now).is_ok());
    }

    #[test]
    fn lockout_expires() {
        let throttle = throttle();
        let now = Instant::now();

        for _ in 0..3 {
            throttle.record_failure_at("a@saop.edu", now);
        }
        assert!(throttle.check_at("a@saop.edu", now + Duration::from_secs(10)).is_ok());
    }

    #[test]
    fn lockout_doubles_and_caps() {
        let throttle = throttle();
        let mut now = Instant::now();

        for _ in 0..3 {
            throttle.record_failure_at("a@saop.edu", now);
        }
        let mut expected = [20, 40, 60, 60].into_iter();
        for _ in 0..4 {
            now += Duration::from_secs(61);
            throttle.record_failure_at("a@saop.edu", now);
            let wait = throttle.check_at("a@saop.edu", now).unwrap_err();
            assert_eq!(wait, Duration::from_secs(expected.next().unwrap()));
        }
    }

    #[test]
    fn success_resets_counter() {
        let throttle = throttle();
        let now = Instant::now();

        for _ in 0..3 {
            throttle.record_failure_at("a@saop.edu", now);
        }
        throttle.record_success("a@saop.edu");
        assert!(throttle.check_at("a@saop.edu", now).is_ok());

        throttle.record_failure_at("a@saop.edu", now);
        assert!(throttle.check_at("a@saop.edu", now).is_ok());
    }

    #[test]
    fn table_is_bounded() {
        let throttle = LoginThrottle::with_capacity(ThrottleConfig::default(), 2);
        for email in ["a@x", "b@x", "c@x"] {
            throttle.record_failure(email);
        }
        assert_eq!(throttle.tracked(), 2);
    }
}
