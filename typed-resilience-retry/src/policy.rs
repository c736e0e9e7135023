//! Retry decisions.
//!
//! [`RetryConfig::decide`] is the only place that looks at an outcome. Both
//! the blocking and the async executor drive their loop from it.

use crate::config::{ResultBackoff, RetryConfig};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Duration;

/// What to do after an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// Invoke the operation again after the delay.
    Retry(Duration),
    /// Stop and return the outcome of this attempt.
    Complete(Completion),
}

/// How a call ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Accepted on the first attempt.
    SucceededWithoutRetry,
    /// Accepted after at least one retry.
    SucceededAfterRetry,
    /// Every allowed attempt was used up.
    FailedAfterRetry,
    /// The error is excluded from retries.
    FailedWithoutRetry,
    /// A predicate panicked while classifying the outcome.
    Aborted,
}

impl Completion {
    /// Label used in log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SucceededWithoutRetry => "succeeded_without_retry",
            Self::SucceededAfterRetry => "succeeded_after_retry",
            Self::FailedAfterRetry => "failed_after_retry",
            Self::FailedWithoutRetry => "failed_without_retry",
            Self::Aborted => "aborted",
        }
    }
}

impl<T, E> RetryConfig<T, E> {
    /// Decide what follows the given 1-based attempt.
    ///
    /// A panic inside a predicate is caught and turned into
    /// [`Completion::Aborted`], so the in-flight outcome is returned as is.
    pub fn decide(&self, attempt: u32, outcome: &Result<T, E>) -> Decision {
        let has_attempts_left = attempt < self.max_attempts();

        match outcome {
            Err(error) => match guarded(|| self.is_ignored(error)) {
                None => Decision::Complete(Completion::Aborted),
                Some(true) => Decision::Complete(Completion::FailedWithoutRetry),
                Some(false) if has_attempts_left => Decision::Retry(self.wait().calculate(attempt)),
                Some(false) => Decision::Complete(Completion::FailedAfterRetry),
            },
            Ok(value) => match guarded(|| self.needs_retry(value)) {
                None => Decision::Complete(Completion::Aborted),
                Some(true) if has_attempts_left => Decision::Retry(match self.result_backoff() {
                    ResultBackoff::Immediate => Duration::ZERO,
                    ResultBackoff::UseWaitStrategy => self.wait().calculate(attempt),
                }),
                Some(true) => Decision::Complete(Completion::FailedAfterRetry),
                Some(false) if attempt <= 1 => Decision::Complete(Completion::SucceededWithoutRetry),
                Some(false) => Decision::Complete(Completion::SucceededAfterRetry),
            },
        }
    }
}

fn guarded(predicate: impl FnOnce() -> bool) -> Option<bool> {
    catch_unwind(AssertUnwindSafe(predicate)).ok()
}
