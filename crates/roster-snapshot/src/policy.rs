use std::time::Duration;

/// Retry ceiling and exponential backoff between retry rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Failed attempts allowed per entry before it is marked exhausted.
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 32_000,
        }
    }
}

impl RetryPolicy {
    /// No waiting between rounds. Used by tests and replayed fixtures.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 0,
            max_delay_ms: 0,
        }
    }

    /// Delay before retry round `round` (1-based).
    ///
    /// `min(base_delay * 2^(round - 1), max_delay)`
    pub fn delay_for_retry(&self, round: u32) -> Duration {
        let shift = round.saturating_sub(1);
        let exp_delay = self
            .base_delay_ms
            .saturating_mul(1u64.checked_shl(shift).unwrap_or(u64::MAX));
        Duration::from_millis(exp_delay.min(self.max_delay_ms))
    }
}

/// When an epoch may become current and how many superseded epochs survive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionPolicy {
    /// Promote epochs whose required endpoints did not all succeed.
    pub allow_partial: bool,
    /// Retired epochs kept after a promotion, newest first.
    pub keep_previous: usize,
}

impl Default for PromotionPolicy {
    fn default() -> Self {
        Self {
            allow_partial: false,
            keep_previous: 2,
        }
    }
}
