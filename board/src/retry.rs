// Backoff strategy for store failures
//
// Used by the tick driver and the listen loop. These are long-lived loops,
// not bounded executions, so delays cap at a maximum instead of giving up.

use rand::Rng;
use std::time::Duration;

/// Calculates the delay before the next attempt after consecutive failures.
pub trait RetryStrategy: Send + Sync {
    fn next_delay(&self, consecutive_failures: u32) -> Duration;
}

/// Exponential backoff with jitter. Sequence (defaults): 1s, 3s, 9s, 27s,
/// capped at 60s, with up to 10% random jitter to avoid thundering herds.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    base_delay_ms: u64,
    max_delay_ms: u64,
    jitter_factor: f64,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            base_delay_ms: 1_000,
            max_delay_ms: 60_000,
            jitter_factor: 0.1,
        }
    }
}

impl ExponentialBackoff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(base_delay_ms: u64, max_delay_ms: u64, jitter_factor: f64) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    fn base_delay_ms(&self, consecutive_failures: u32) -> u64 {
        let exponent = consecutive_failures.min(20);
        self.base_delay_ms
            .saturating_mul(3_u64.saturating_pow(exponent))
            .min(self.max_delay_ms)
    }

    fn add_jitter_ms(&self, base_ms: u64) -> u64 {
        if self.jitter_factor == 0.0 {
            return base_ms;
        }
        let jitter_range_ms = (base_ms as f64 * self.jitter_factor) as u64;
        if jitter_range_ms == 0 {
            return base_ms;
        }
        let mut rng = rand::thread_rng();
        base_ms + rng.gen_range(0..=jitter_range_ms)
    }
}

impl RetryStrategy for ExponentialBackoff {
    fn next_delay(&self, consecutive_failures: u32) -> Duration {
        let base_ms = self.base_delay_ms(consecutive_failures);
        Duration::from_millis(self.add_jitter_ms(base_ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_delays_grow_exponentially() {
        let backoff = ExponentialBackoff::with_config(1_000, 60_000, 0.0);
        assert_eq!(backoff.next_delay(0), Duration::from_secs(1));
        assert_eq!(backoff.next_delay(1), Duration::from_secs(3));
        assert_eq!(backoff.next_delay(2), Duration::from_secs(9));
    }

    #[test]
    fn test_delay_caps_at_max() {
        let backoff = ExponentialBackoff::with_config(1_000, 60_000, 0.0);
        assert_eq!(backoff.next_delay(10), Duration::from_secs(60));
        assert_eq!(backoff.next_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_jitter_stays_within_bounds() {
        let backoff = ExponentialBackoff::with_config(1_000, 60_000, 0.1);
        for _ in 0..100 {
            let delay = backoff.next_delay(0);
            assert!(delay >= Duration::from_millis(1_000));
            assert!(delay <= Duration::from_millis(1_100));
        }
    }
}
