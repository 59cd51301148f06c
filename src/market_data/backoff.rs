// =============================================================================
// Reconnect Backoff
// =============================================================================
//
// delay(attempt) = min(max, base * 2^attempt * jitter), jitter in [0.8, 1.2].
// The attempt counter is owned by the feed and reset after a candle arrives.
// =============================================================================

use std::time::Duration;

use rand::Rng;

use crate::runtime_config::EngineConfig;

pub const JITTER_MIN: f64 = 0.8;
pub const JITTER_MAX: f64 = 1.2;

/// Exponent cap so `2^attempt` stays finite long after `max` dominates.
const MAX_EXPONENT: u32 = 30;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BackoffPolicy {
    pub base_ms: u64,
    pub max_ms: u64,
}

impl BackoffPolicy {
    pub fn new(base_ms: u64, max_ms: u64) -> Self {
        Self { base_ms, max_ms: max_ms.max(base_ms) }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.backoff_base_ms, config.backoff_max_ms)
    }

    /// Delay for a given attempt with an explicit jitter factor (clamped into
    /// the jitter range).
    pub fn delay_with_jitter(&self, attempt: u32, jitter: f64) -> Duration {
        let jitter = jitter.clamp(JITTER_MIN, JITTER_MAX);
        let growth = 2f64.powi(attempt.min(MAX_EXPONENT) as i32);
        let ms = (self.base_ms as f64 * growth * jitter).min(self.max_ms as f64);
        Duration::from_millis(ms.round() as u64)
    }

    pub fn delay<R: Rng + ?Sized>(&self, attempt: u32, rng: &mut R) -> Duration {
        self.delay_with_jitter(attempt, rng.gen_range(JITTER_MIN..=JITTER_MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn grows_exponentially_until_capped() {
        let policy = BackoffPolicy::new(500, 30_000);
        assert_eq!(policy.delay_with_jitter(0, 1.0), Duration::from_millis(500));
        assert_eq!(policy.delay_with_jitter(3, 1.0), Duration::from_millis(4_000));
        assert_eq!(policy.delay_with_jitter(10, 1.0), Duration::from_millis(30_000));
        assert_eq!(policy.delay_with_jitter(u32::MAX, 1.2), Duration::from_millis(30_000));
    }

    #[test]
    fn jittered_delays_stay_in_bounds() {
        let policy = BackoffPolicy::new(1_000, 60_000);
        let mut rng = StdRng::seed_from_u64(11);
        for attempt in 0..12 {
            let nominal = (1_000f64 * 2f64.powi(attempt as i32)).min(60_000.0);
            let lower = (nominal * JITTER_MIN).min(60_000.0);
            for _ in 0..50 {
                let d = policy.delay(attempt, &mut rng).as_millis() as f64;
                assert!(d >= lower.floor() && d <= 60_000.0, "attempt {attempt}: {d}");
                assert!(d <= (nominal * JITTER_MAX).ceil());
            }
        }
    }

    #[test]
    fn max_never_below_base() {
        let policy = BackoffPolicy::new(2_000, 100);
        assert_eq!(policy.max_ms, 2_000);
    }
}
