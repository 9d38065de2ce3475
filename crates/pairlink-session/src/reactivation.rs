use std::time::Duration;

/// Bounded, exponentially backed-off reactivation after the platform
/// deactivates the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReactivationPolicy {
    /// Reactivations allowed between two successful activations. Zero
    /// disables reactivation.
    pub max_attempts: u32,
    /// Delay before the first reactivation.
    pub initial_backoff: Duration,
    /// Upper bound for the doubled delay.
    pub max_backoff: Duration,
}

impl Default for ReactivationPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(8),
        }
    }
}

impl ReactivationPolicy {
    /// A policy that never reactivates.
    pub fn disabled() -> Self {
        Self {
            max_attempts: 0,
            ..Self::default()
        }
    }

    /// Delay before the 1-based `attempt`, or `None` once the budget is spent.
    pub fn delay_for(&self, attempt: u32) -> Option<Duration> {
        if attempt == 0 || attempt > self.max_attempts {
            return None;
        }
        let factor = 1u32.checked_shl(attempt - 1).unwrap_or(u32::MAX);
        Some(
            self.initial_backoff
                .saturating_mul(factor)
                .min(self.max_backoff),
        )
    }
}
