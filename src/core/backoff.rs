//! Flush health tracking and backoff for the periodic batcher.

use std::time::Duration;

use crate::config::BackoffConfig;

/// Consecutive-failure tracker that derives the next flush interval.
///
/// Zero failures yields the base period. Each further failure doubles the wait,
/// starting from `max(period, minimum_backoff)` and capped at `maximum_backoff`;
/// the result is never shorter than the base period.
#[derive(Debug, Clone)]
pub struct BatchStatus {
    period: Duration,
    policy: BackoffConfig,
    failures_since_success: u32,
}

impl BatchStatus {
    /// Tracker for a sink flushing every `period`.
    #[must_use]
    pub const fn new(period: Duration, policy: BackoffConfig) -> Self {
        Self {
            period,
            policy,
            failures_since_success: 0,
        }
    }

    /// Record a successful flush; clears the failure streak.
    pub fn mark_success(&mut self) {
        self.failures_since_success = 0;
    }

    /// Record a failed flush.
    pub fn mark_failure(&mut self) {
        self.failures_since_success = self.failures_since_success.saturating_add(1);
    }

    /// Current failure streak.
    #[must_use]
    pub const fn failures(&self) -> u32 {
        self.failures_since_success
    }

    /// Whether the staged batch should be discarded.
    #[must_use]
    pub const fn should_drop_batch(&self) -> bool {
        self.failures_since_success >= self.policy.failures_before_dropping_batch
    }

    /// Whether everything still queued should be discarded.
    #[must_use]
    pub const fn should_drop_queue(&self) -> bool {
        self.failures_since_success >= self.policy.failures_before_dropping_queue
    }

    /// Interval to wait before the next flush attempt.
    #[must_use]
    pub fn next_interval(&self) -> Duration {
        if self.failures_since_success == 0 {
            return self.period;
        }

        let factor = 1u32
            .checked_shl(self.failures_since_success - 1)
            .unwrap_or(u32::MAX);
        let base = self.period.max(self.policy.minimum_backoff());
        let backed_off = base.saturating_mul(factor);
        let capped = backed_off.min(self.policy.maximum_backoff());
        self.period.max(capped)
    }
}
