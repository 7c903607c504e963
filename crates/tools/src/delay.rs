//! Artificial delays that make demo runs feel like real diagnostics.

use std::time::Duration;

use rand::Rng;

/// Delay range applied to every simulated tool invocation.
///
/// The default is no delay so tests stay fast; the CLI opts into a visible
/// range for live demos.
#[derive(Debug, Clone, Copy)]
pub struct DelayConfig {
    pub min: Duration,
    pub max: Duration,
    pub enabled: bool,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self::disabled()
    }
}

impl DelayConfig {
    /// No delay at all.
    pub fn disabled() -> Self {
        Self {
            min: Duration::ZERO,
            max: Duration::ZERO,
            enabled: false,
        }
    }

    /// Uniform random delay between `min_ms` and `max_ms` milliseconds.
    pub fn range_ms(min_ms: u64, max_ms: u64) -> Self {
        Self {
            min: Duration::from_millis(min_ms.min(max_ms)),
            max: Duration::from_millis(min_ms.max(max_ms)),
            enabled: true,
        }
    }

    /// Draws the delay for one invocation.
    pub fn sample(&self) -> Duration {
        if !self.enabled || self.max.is_zero() {
            return Duration::ZERO;
        }
        if self.min == self.max {
            return self.min;
        }
        rand::thread_rng().gen_range(self.min..=self.max)
    }

    /// Sleeps on the current thread. Only for tools on the blocking pool.
    pub fn simulate_work(&self, operation: &str) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::debug!(operation, delay_ms = delay.as_millis() as u64, "simulating work");
            std::thread::sleep(delay);
        }
        delay
    }

    /// Awaitable sleep for suspending tools.
    pub async fn simulate_work_async(&self, operation: &str) -> Duration {
        let delay = self.sample();
        if !delay.is_zero() {
            tracing::debug!(operation, delay_ms = delay.as_millis() as u64, "simulating work");
            tokio::time::sleep(delay).await;
        }
        delay
    }
}
