//! # typed-resilience
//!
//! Resilience adapters for operations that return `Result` instead of
//! panicking or throwing.
//!
//! ## Quick Start
//!
//! ```ignore
//! use typed_resilience::prelude::*;
//! use std::time::Duration;
//!
//! let config = RetryConfig::builder()
//!     .max_attempts(3)
//!     .exponential(Duration::from_millis(100), Duration::from_secs(5))
//!     .ignore_errors(|e: &GuardError<ApiError>| e.is_rejected())
//!     .build()?;
//! let retry = Retry::of("orders", config);
//!
//! let order = retry
//!     .execute_async(|| circuit_breaker::execute_async(&breaker, || client.order(id)))
//!     .await;
//! ```
//!
//! ## Architecture
//!
//! - [`typed_resilience_retry`] - Attempt loop, wait strategies, metrics
//! - [`typed_resilience_gates`] - Circuit breaker, bulkhead and rate limiter adapters
//!
//! Gates never retry and the retry never looks at gates: composing them is a
//! matter of nesting closures.

#![warn(missing_docs)]
#![deny(unsafe_code)]

/// Retry executor and configuration.
pub use typed_resilience_retry as retry;

/// Permission gate adapters.
pub use typed_resilience_gates as gates;

pub use typed_resilience_gates::{
    bulkhead, circuit_breaker, rate_limiter, Bulkhead, CircuitBreaker, GuardError, GuardResult,
    RateLimiter, Rejection,
};
pub use typed_resilience_retry::{
    Cancelled, CancelSignal, CancellationToken, ConfigError, Retry, RetryConfig, RetryConfigBuilder,
    RetryCounters, RetryMetrics, RetrySettings, WaitStrategy,
};

/// Prelude for common imports.
pub mod prelude {
    pub use crate::gates::prelude::*;
    pub use crate::retry::prelude::*;
    pub use crate::{bulkhead, circuit_breaker, rate_limiter};
}

/// Get the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::prelude::*;
    use std::error::Error;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
    use std::sync::Arc;
    use std::time::Duration;
    use typed_resilience_retry::RecordingSleeper;

    #[derive(Debug, Clone, PartialEq, thiserror::Error)]
    #[error("backend unavailable")]
    struct Unavailable;

    #[derive(Default)]
    struct Breaker {
        open: AtomicBool,
        errors: AtomicU32,
    }

    impl CircuitBreaker for Breaker {
        fn name(&self) -> &str {
            "backend"
        }

        fn try_acquire_permission(&self) -> bool {
            !self.open.load(Ordering::SeqCst)
        }

        fn on_success(&self, _elapsed: Duration) {}

        fn on_error(&self, _elapsed: Duration, _error: &(dyn Error + 'static)) {
            // Opens after two failures.
            if self.errors.fetch_add(1, Ordering::SeqCst) + 1 >= 2 {
                self.open.store(true, Ordering::SeqCst);
            }
        }
    }

    fn retry(ignore_rejections: bool) -> Retry<&'static str, GuardError<Unavailable>> {
        let mut builder = RetryConfig::builder().max_attempts(5).fixed(Duration::from_millis(10));
        if ignore_rejections {
            builder = builder.ignore_errors(|e: &GuardError<Unavailable>| e.is_rejected());
        }
        Retry::builder("composed")
            .config(builder.build().unwrap())
            .blocking_sleeper(RecordingSleeper::new())
            .sleeper(RecordingSleeper::new())
            .build()
    }

    #[test]
    fn test_version() {
        assert!(!crate::version().is_empty());
    }

    #[test]
    fn test_retry_stops_on_open_breaker() {
        let breaker = Breaker::default();
        let retry = retry(true);
        let calls = AtomicU32::new(0);

        let result = retry.execute(|| {
            circuit_breaker::execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Unavailable)
            })
        });

        assert_eq!(
            result,
            Err(GuardError::Rejected(Rejection::call_not_permitted("backend")))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(retry.metrics().failed_calls_without_retry(), 1);
    }

    #[test]
    fn test_retry_through_rejections_until_exhausted() {
        let breaker = Breaker::default();
        let retry = retry(false);
        let calls = AtomicU32::new(0);

        let result = retry.execute(|| {
            circuit_breaker::execute(&breaker, || {
                calls.fetch_add(1, Ordering::SeqCst);
                Err(Unavailable)
            })
        });

        assert!(result.unwrap_err().is_rejected());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(retry.metrics().failed_calls_with_retry(), 1);
    }

    #[tokio::test]
    async fn test_async_composition_recovers() {
        let breaker = Arc::new(Breaker::default());
        let retry = retry(true);
        let calls = Arc::new(AtomicU32::new(0));

        let result = retry
            .execute_async(|| {
                let breaker = breaker.clone();
                let calls = calls.clone();
                async move {
                    circuit_breaker::execute_async(&breaker, || async {
                        if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                            Err(Unavailable)
                        } else {
                            Ok("recovered")
                        }
                    })
                    .await
                }
            })
            .await;

        assert_eq!(result, Ok("recovered"));
        assert_eq!(retry.metrics().successful_calls_with_retry(), 1);
        assert!(!breaker.open.load(Ordering::SeqCst));
    }
}
