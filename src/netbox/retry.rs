use rand::Rng;
use std::time::Duration;

/// Bounded exponential backoff for inventory requests
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    pub max_retries: u32,
    pub initial_backoff: Duration,
    pub multiplier: f64,
    pub max_backoff: Duration,
    pub use_jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(500),
            multiplier: 2.0,
            max_backoff: Duration::from_secs(8),
            use_jitter: true,
        }
    }
}

impl RetryPolicy {
    /// No retries at all, used by the connectivity probe
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay before retry number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let base = self.initial_backoff.as_millis() as f64 * self.multiplier.powi(attempt as i32 - 1);
        let capped = base.min(self.max_backoff.as_millis() as f64);

        let delay_ms = if self.use_jitter && capped > 0.0 {
            // up to 25% either way
            let jitter_range = capped * 0.25;
            let jitter = rand::thread_rng().gen_range(-jitter_range..=jitter_range);
            (capped + jitter).max(0.0)
        } else {
            capped
        };

        Duration::from_millis(delay_ms as u64)
    }
}
