//! Exponential backoff for delivery retries

use std::time::Duration;

use rand::Rng;

use crate::config::QueueConfig;

/// Exponential backoff configuration
#[derive(Debug, Clone)]
pub struct BackoffConfig {
    /// Initial delay in milliseconds
    pub initial_delay_ms: u64,
    /// Maximum delay in milliseconds
    pub max_delay_ms: u64,
    /// Multiplier for exponential growth
    pub multiplier: f64,
    /// Jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 500,
            max_delay_ms: 60_000, // 1 minute
            multiplier: 2.0,
            jitter_factor: 0.1, // 10% jitter
        }
    }
}

impl From<&QueueConfig> for BackoffConfig {
    fn from(config: &QueueConfig) -> Self {
        Self {
            initial_delay_ms: config.retry_initial_delay_ms,
            max_delay_ms: config.retry_max_delay_ms,
            ..Default::default()
        }
    }
}

/// Stateless exponential backoff with jitter.
///
/// The delay depends only on the attempt number, so a task carrying its own
/// attempt count can be retried by any worker.
#[derive(Debug, Clone, Default)]
pub struct ExponentialBackoff {
    config: BackoffConfig,
}

impl ExponentialBackoff {
    pub fn with_config(config: BackoffConfig) -> Self {
        Self { config }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32) as i32;
        let base_delay = self.config.initial_delay_ms as f64 * self.config.multiplier.powi(exponent);
        let capped_delay = base_delay.min(self.config.max_delay_ms as f64);

        // Apply jitter only if jitter_factor > 0
        let final_delay = if self.config.jitter_factor > 0.0 && capped_delay > 1.0 {
            let jitter_range = capped_delay * self.config.jitter_factor;
            let jitter = rand::rng().random_range(-jitter_range..jitter_range);
            (capped_delay + jitter).max(1.0) as u64
        } else {
            capped_delay.max(1.0) as u64
        };

        Duration::from_millis(final_delay)
    }
}
