//! Exponential backoff with additive jitter.
//!
//! `delay(n) = min(base * 2^n, max) + uniform[0, jitter)`

use std::time::Duration;

use rand::Rng;

use crate::config::ClientConfig;

/// Reconnect delay policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Backoff {
    base_ms: u64,
    max_ms: u64,
    jitter_ms: u64,
}

impl Backoff {
    #[must_use]
    pub const fn new(base_ms: u64, max_ms: u64, jitter_ms: u64) -> Self {
        Self {
            base_ms,
            max_ms,
            jitter_ms,
        }
    }

    #[must_use]
    pub const fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.base_delay_ms, config.max_delay_ms, config.jitter_ms)
    }

    /// Deterministic part of the delay for a 0-indexed attempt.
    #[must_use]
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.base_ms.saturating_mul(factor).min(self.max_ms))
    }

    /// Delay before reconnect attempt `attempt`, jitter included.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay(attempt) + Duration::from_millis(self.jitter())
    }

    fn jitter(&self) -> u64 {
        if self.jitter_ms == 0 {
            return 0;
        }
        rand::thread_rng().gen_range(0..self.jitter_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_in_window(delay: Duration, low_ms: u64, high_ms: u64) {
        let ms = delay.as_millis() as u64;
        assert!(
            (low_ms..high_ms).contains(&ms),
            "delay {ms}ms not within [{low_ms}, {high_ms})"
        );
    }

    #[test]
    fn doubles_per_attempt() {
        let backoff = Backoff::new(5000, 30_000, 0);
        assert_eq!(backoff.base_delay(0), Duration::from_millis(5000));
        assert_eq!(backoff.base_delay(1), Duration::from_millis(10_000));
        assert_eq!(backoff.base_delay(2), Duration::from_millis(20_000));
    }

    #[test]
    fn caps_at_max_delay() {
        let backoff = Backoff::new(5000, 30_000, 0);
        assert_eq!(backoff.base_delay(3), Duration::from_millis(30_000));
        assert_eq!(backoff.base_delay(10), Duration::from_millis(30_000));
    }

    #[test]
    fn huge_attempt_does_not_overflow() {
        let backoff = Backoff::new(5000, 30_000, 0);
        assert_eq!(backoff.base_delay(64), Duration::from_millis(30_000));
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_millis(30_000));
    }

    #[test]
    fn jittered_delay_stays_in_window() {
        let backoff = Backoff::new(5000, 30_000, 1000);
        for attempt in 0..8u32 {
            let floor = (5000u64 << attempt).min(30_000);
            for _ in 0..50 {
                assert_in_window(backoff.delay(attempt), floor, floor + 1000);
            }
        }
    }

    #[test]
    fn zero_jitter_is_exact() {
        let backoff = Backoff::new(100, 1000, 0);
        assert_eq!(backoff.delay(1), Duration::from_millis(200));
    }

    #[test]
    fn from_config_uses_client_settings() {
        let config = ClientConfig::default();
        let backoff = Backoff::from_config(&config);
        assert_in_window(backoff.delay(0), 5000, 6000);
    }
}
