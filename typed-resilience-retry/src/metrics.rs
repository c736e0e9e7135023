//! Retry metrics.

use crate::policy::Completion;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Sink for retry events and terminal retry outcomes.
///
/// Shared by every call of a retry, so implementations must be safe under
/// concurrent use.
pub trait RetryMetrics: Send + Sync {
    /// A call succeeded on its first attempt.
    fn record_success_without_retry(&self);

    /// A call succeeded after at least one retry.
    fn record_success_after_retry(&self);

    /// A call used up every allowed attempt.
    fn record_failure_exhausted(&self);

    /// A call failed with an error excluded from retries.
    fn record_failure_ignored(&self);

    /// Attempt `attempt` is about to be retried after `delay`.
    ///
    /// Runs once per scheduled retry, before the wait.
    fn record_retry(&self, _attempt: u32, _delay: Duration) {}

    /// Record a completion. Aborted calls are not counted.
    fn record(&self, completion: Completion) {
        match completion {
            Completion::SucceededWithoutRetry => self.record_success_without_retry(),
            Completion::SucceededAfterRetry => self.record_success_after_retry(),
            Completion::FailedAfterRetry => self.record_failure_exhausted(),
            Completion::FailedWithoutRetry => self.record_failure_ignored(),
            Completion::Aborted => {}
        }
    }
}

/// Lock-free counters, the default [`RetryMetrics`].
#[derive(Debug, Default)]
pub struct RetryCounters {
    successful_without_retry: AtomicU64,
    successful_with_retry: AtomicU64,
    failed_with_retry: AtomicU64,
    failed_without_retry: AtomicU64,
}

impl RetryCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Calls that succeeded on the first attempt.
    pub fn successful_calls_without_retry(&self) -> u64 {
        self.successful_without_retry.load(Ordering::Relaxed)
    }

    /// Calls that succeeded after retrying.
    pub fn successful_calls_with_retry(&self) -> u64 {
        self.successful_with_retry.load(Ordering::Relaxed)
    }

    /// Calls that exhausted their attempts.
    pub fn failed_calls_with_retry(&self) -> u64 {
        self.failed_with_retry.load(Ordering::Relaxed)
    }

    /// Calls that failed with an ignored error.
    pub fn failed_calls_without_retry(&self) -> u64 {
        self.failed_without_retry.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    pub fn snapshot(&self) -> RetryMetricsSnapshot {
        RetryMetricsSnapshot {
            successful_calls_without_retry: self.successful_calls_without_retry(),
            successful_calls_with_retry: self.successful_calls_with_retry(),
            failed_calls_with_retry: self.failed_calls_with_retry(),
            failed_calls_without_retry: self.failed_calls_without_retry(),
        }
    }
}

impl RetryMetrics for RetryCounters {
    fn record_success_without_retry(&self) {
        self.successful_without_retry.fetch_add(1, Ordering::Relaxed);
    }

    fn record_success_after_retry(&self) {
        self.successful_with_retry.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure_exhausted(&self) {
        self.failed_with_retry.fetch_add(1, Ordering::Relaxed);
    }

    fn record_failure_ignored(&self) {
        self.failed_without_retry.fetch_add(1, Ordering::Relaxed);
    }
}

/// Copy of [`RetryCounters`] values.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct RetryMetricsSnapshot {
    /// Calls that succeeded on the first attempt.
    pub successful_calls_without_retry: u64,
    /// Calls that succeeded after retrying.
    pub successful_calls_with_retry: u64,
    /// Calls that exhausted their attempts.
    pub failed_calls_with_retry: u64,
    /// Calls that failed with an ignored error.
    pub failed_calls_without_retry: u64,
}

impl RetryMetricsSnapshot {
    /// Total calls that reached a terminal decision.
    pub fn total(&self) -> u64 {
        self.successful_calls_without_retry
            + self.successful_calls_with_retry
            + self.failed_calls_with_retry
            + self.failed_calls_without_retry
    }
}
