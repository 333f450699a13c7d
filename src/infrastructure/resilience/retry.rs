//! Backoff policy for transient provider failures

use std::time::Duration;

use rand::Rng;

use crate::config::RetryConfig;
use crate::domain::llm::TransientKind;

/// Exponential backoff with jitter and error-type-dependent attempt budgets
///
/// Throttling responses get a larger budget than other transient failures:
/// the provider told us to slow down, not that it is broken.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_retries: u32,
    throttle_max_retries: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_enabled: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            throttle_max_retries: config.throttle_max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
            jitter_enabled: config.jitter_enabled,
        }
    }

    /// Total call attempts allowed for a transient failure of `kind`
    pub fn max_attempts(&self, kind: TransientKind) -> u32 {
        let retries = match kind {
            TransientKind::Throttled => self.throttle_max_retries,
            TransientKind::Timeout | TransientKind::Unavailable => self.max_retries,
        };
        retries + 1
    }

    /// Nominal delay before retry number `attempt` (0-indexed), without jitter
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = 2f64.powi(attempt.min(31) as i32);
        let delay = self.base_delay.as_millis() as f64 * exp;
        Duration::from_millis(delay.min(self.max_delay.as_millis() as f64) as u64)
    }

    /// Delay with jitter applied, still capped at the maximum delay
    pub fn backoff(&self, attempt: u32) -> Duration {
        let nominal = self.delay_for_attempt(attempt);

        if !self.jitter_enabled {
            return nominal;
        }

        let factor: f64 = rand::thread_rng().gen_range(0.5..1.5);
        nominal.mul_f64(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}
