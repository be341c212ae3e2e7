//! Exponential backoff policy for transient delivery failures

use std::time::Duration;

use courier_shared::DispatchConfig;
use rand::Rng;

use super::traits::TransportError;

/// Retry policy: `base * factor^(n-1)` with +/- jitter, capped at `max_delay`
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Total send attempts, the first one included
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
    /// Fraction of the delay added or removed at random (0.2 = +/-20%)
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            factor: 2.0,
            max_delay: Duration::from_secs(8),
            jitter: 0.2,
        }
    }
}

impl From<&DispatchConfig> for RetryPolicy {
    fn from(config: &DispatchConfig) -> Self {
        Self {
            max_attempts: config.max_send_retries.max(1),
            base_delay: Duration::from_millis(config.retry_base_delay_ms),
            factor: config.retry_factor,
            max_delay: Duration::from_millis(config.retry_max_delay_ms),
            jitter: config.retry_jitter,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt should follow the failed attempt `attempt` (1-based)
    pub fn should_retry(&self, attempt: u32, error: &TransportError) -> bool {
        error.is_transient() && attempt < self.max_attempts
    }

    /// Delay before the attempt following attempt `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        let nominal = self.base_delay.as_secs_f64() * self.factor.powi(exponent);

        let jittered = if self.jitter > 0.0 {
            let spread = rand::thread_rng().gen_range(-self.jitter..=self.jitter);
            nominal * (1.0 + spread)
        } else {
            nominal
        };

        self.capped(jittered)
    }

    /// Sum of the largest possible delays over a full retry sequence
    pub fn worst_case_total_delay(&self) -> Duration {
        (1..self.max_attempts)
            .map(|attempt| {
                let nominal = self.base_delay.as_secs_f64()
                    * self.factor.powi(attempt.saturating_sub(1).min(30) as i32)
                    * (1.0 + self.jitter);
                self.capped(nominal)
            })
            .fold(Duration::ZERO, Duration::saturating_add)
    }

    /// Clamp a delay in seconds to `[0, max_delay]` before converting it
    fn capped(&self, seconds: f64) -> Duration {
        let max = self.max_delay.as_secs_f64();
        if seconds.is_nan() || seconds >= max {
            return self.max_delay;
        }
        Duration::try_from_secs_f64(seconds.max(0.0)).unwrap_or(self.max_delay)
    }
}
