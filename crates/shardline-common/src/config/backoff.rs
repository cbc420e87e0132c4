//! Bounded exponential backoff shared by shard reconnects and REST retries

use rand::Rng;
use std::time::Duration;

/// Backoff policy: `min(base * multiplier^attempt, max)`, shortened by a
/// random fraction of at most `jitter`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffConfig {
    pub base: Duration,
    pub max: Duration,
    pub multiplier: f64,
    /// Fraction in `[0, 1]` of the delay that may be shaved off at random
    pub jitter: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(default_base_ms()),
            max: Duration::from_millis(default_max_ms()),
            multiplier: 2.0,
            jitter: default_jitter(),
        }
    }
}

pub(crate) fn default_base_ms() -> u64 {
    1_000
}

pub(crate) fn default_max_ms() -> u64 {
    60_000
}

pub(crate) fn default_jitter() -> f64 {
    0.25
}

impl BackoffConfig {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            ..Self::default()
        }
    }

    /// Disable jitter, for deterministic schedules
    pub fn without_jitter(mut self) -> Self {
        self.jitter = 0.0;
        self
    }

    /// Delay before retry number `attempt` (0-based) with no jitter applied
    pub fn ceiling(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(32) as i32;
        let factor = self.multiplier.max(1.0).powi(exponent);
        let millis = (self.base.as_millis() as f64 * factor).min(self.max.as_millis() as f64);
        Duration::from_millis(millis as u64).min(self.max)
    }

    /// Delay before retry number `attempt`, with random jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let sample = rand::thread_rng().gen_range(0.0..=1.0);
        self.delay_with_sample(attempt, sample)
    }

    /// Deterministic core of [`Self::delay_for_attempt`]. `sample` is in `[0, 1]`.
    pub fn delay_with_sample(&self, attempt: u32, sample: f64) -> Duration {
        let ceiling = self.ceiling(attempt);
        let jitter = self.jitter.clamp(0.0, 1.0) * sample.clamp(0.0, 1.0);
        ceiling.mul_f64(1.0 - jitter)
    }

    /// Like [`Self::delay_for_attempt`], but never shorter than a server hint.
    pub fn delay_with_hint(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        let delay = self.delay_for_attempt(attempt);
        match hint {
            Some(hint) => delay.max(hint),
            None => delay,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_with_base_delay() {
        let policy = BackoffConfig::new(Duration::from_millis(250), Duration::from_secs(8));
        assert_eq!(policy.ceiling(0), Duration::from_millis(250));
    }

    #[test]
    fn scales_exponentially_for_attempts() {
        let policy = BackoffConfig::new(Duration::from_millis(100), Duration::from_secs(10));
        assert_eq!(policy.ceiling(3), Duration::from_millis(800));
    }

    #[test]
    fn caps_delay_at_max() {
        let policy = BackoffConfig::new(Duration::from_secs(1), Duration::from_secs(4));
        assert_eq!(policy.ceiling(5), Duration::from_secs(4));
        assert_eq!(policy.ceiling(u32::MAX), Duration::from_secs(4));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = BackoffConfig {
            base: Duration::from_secs(1),
            max: Duration::from_secs(60),
            multiplier: 2.0,
            jitter: 0.5,
        };
        assert_eq!(policy.delay_with_sample(1, 0.0), Duration::from_secs(2));
        assert_eq!(policy.delay_with_sample(1, 1.0), Duration::from_secs(1));

        for attempt in 0..10 {
            let delay = policy.delay_for_attempt(attempt);
            let ceiling = policy.ceiling(attempt);
            assert!(delay <= ceiling);
            assert!(delay >= ceiling.mul_f64(0.5));
        }
    }

    #[test]
    fn without_jitter_is_deterministic() {
        let policy = BackoffConfig::default().without_jitter();
        assert_eq!(policy.delay_for_attempt(2), Duration::from_secs(4));
    }

    #[test]
    fn honors_server_hint() {
        let policy = BackoffConfig::default().without_jitter();
        assert_eq!(
            policy.delay_with_hint(0, Some(Duration::from_secs(5))),
            Duration::from_secs(5)
        );
        assert_eq!(policy.delay_with_hint(0, None), Duration::from_secs(1));
    }
}
