//! Exponential reconnect backoff.

use crate::config::BackoffConfig;
use rand::Rng;
use std::time::Duration;

/// Delay schedule for reconnect attempts.
///
/// Delays grow by `factor` per attempt up to `max`, with optional symmetric
/// jitter. There is no attempt limit.
#[derive(Debug, Clone)]
pub struct Backoff {
    initial: Duration,
    max: Duration,
    factor: f64,
    jitter: f64,
    attempt: u32,
}

impl Backoff {
    pub fn new(initial: Duration, max: Duration, factor: f64, jitter: f64) -> Self {
        Self {
            initial,
            max: max.max(initial),
            factor: factor.max(1.0),
            jitter: jitter.clamp(0.0, 1.0),
            attempt: 0,
        }
    }

    pub fn from_config(config: &BackoffConfig) -> Self {
        Self::new(
            Duration::from_millis(config.initial_ms),
            Duration::from_millis(config.max_ms),
            config.factor,
            config.jitter,
        )
    }

    /// Number of delays handed out since the last reset.
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// Un-jittered delay for a 0-indexed attempt.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let initial_ms = self.initial.as_millis() as f64;
        let max_ms = self.max.as_millis() as f64;
        // 2^31 is already far beyond any sane max delay
        let exp = attempt.min(31) as i32;
        let ms = (initial_ms * self.factor.powi(exp)).min(max_ms);
        Duration::from_millis(ms as u64)
    }

    /// Delay before the next attempt; advances the attempt counter.
    pub fn next_delay(&mut self) -> Duration {
        let base = self.base_delay(self.attempt);
        self.attempt = self.attempt.saturating_add(1);

        if self.jitter <= 0.0 {
            return base;
        }
        let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
        let ms = (base.as_millis() as f64 * (1.0 + spread)).max(0.0);
        Duration::from_millis(ms as u64).min(self.max)
    }

    /// Start over from the initial delay.
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backoff() -> Backoff {
        Backoff::new(Duration::from_millis(100), Duration::from_secs(1), 2.0, 0.0)
    }

    #[test]
    fn test_exponential_growth_is_capped() {
        let mut backoff = backoff();
        let delays: Vec<u64> = (0..6).map(|_| backoff.next_delay().as_millis() as u64).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1000, 1000]);
        assert_eq!(backoff.attempt(), 6);
    }

    #[test]
    fn test_reset() {
        let mut backoff = backoff();
        backoff.next_delay();
        backoff.next_delay();
        backoff.reset();
        assert_eq!(backoff.next_delay(), Duration::from_millis(100));
    }

    #[test]
    fn test_huge_attempt_does_not_overflow() {
        let backoff = backoff();
        assert_eq!(backoff.base_delay(u32::MAX), Duration::from_secs(1));
    }

    #[test]
    fn test_jitter_stays_in_bounds() {
        let mut backoff = Backoff::new(Duration::from_millis(1000), Duration::from_secs(10), 2.0, 0.1);
        for _ in 0..50 {
            backoff.reset();
            let delay = backoff.next_delay().as_millis() as u64;
            assert!((899..=1100).contains(&delay), "delay {} out of range", delay);
        }
    }

    #[test]
    fn test_config_is_sanitized() {
        let backoff = Backoff::new(Duration::from_millis(500), Duration::from_millis(10), 0.5, 3.0);
        assert_eq!(backoff.base_delay(0), Duration::from_millis(500));
        assert_eq!(backoff.base_delay(4), Duration::from_millis(500));
    }
}
