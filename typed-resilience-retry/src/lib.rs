//! # typed-resilience-retry
//!
//! Retry for operations that return `Result`.
//!
//! The operation's error is never wrapped: callers get back exactly the
//! `Ok` or `Err` of the last attempt.
//!
//! ## Core Concepts
//!
//! - **[`RetryConfig`]**: Attempt ceiling, wait strategy, and the predicates
//!   that classify outcomes
//! - **[`WaitStrategy`]**: How long to wait between attempts
//! - **[`Retry`]**: A named retry with shared metrics, running operations on
//!   the calling thread or as async tasks
//! - **[`RetryMetrics`]**: Sink for terminal outcomes, [`RetryCounters`] by default
//!
//! ## Example
//!
//! ```ignore
//! use typed_resilience_retry::{Retry, RetryConfig};
//! use std::time::Duration;
//!
//! let config = RetryConfig::builder()
//!     .max_attempts(5)
//!     .exponential(Duration::from_millis(100), Duration::from_secs(10))
//!     .ignore_errors(|e: &ApiError| e.is_client_error())
//!     .build()?;
//!
//! let retry = Retry::of("inventory", config);
//!
//! let stock = retry.execute_async(|| client.fetch_stock(sku)).await;
//! ```
//!
//! ## Polling
//!
//! ```ignore
//! let config = RetryConfigBuilder::for_polling(Duration::from_secs(1), 30)
//!     .retry_on_result(|job: &Job| !job.is_finished())
//!     .build()?;
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod backoff;
pub mod config;
pub mod error;
pub mod executor;
pub mod metrics;
pub mod policy;
pub mod sleep;

// Re-exports
pub use backoff::WaitStrategy;
pub use config::{ErrorPredicate, ResultBackoff, ResultPredicate, RetryConfig, RetryConfigBuilder, RetrySettings};
pub use error::{Cancelled, ConfigError};
pub use executor::{AttemptInfo, Retry, RetryBuilder, RetryState};
pub use metrics::{RetryCounters, RetryMetrics, RetryMetricsSnapshot};
pub use policy::{Completion, Decision};
pub use sleep::{BlockingSleeper, CancelSignal, RecordingSleeper, Sleeper, ThreadSleeper, TokioSleeper};
pub use tokio_util::sync::CancellationToken;

/// Prelude for common imports.
pub mod prelude {
    pub use crate::{
        CancelSignal, Cancelled, Retry, RetryConfig, RetryCounters, RetryMetrics, WaitStrategy,
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_prelude_imports() {
        use crate::prelude::*;

        let config = RetryConfig::<(), ()>::builder().max_attempts(5).build().unwrap();
        assert_eq!(config.max_attempts(), 5);
    }

    #[test]
    fn test_config_defaults() {
        let config = RetryConfig::<(), ()>::default();
        assert_eq!(config.max_attempts(), 3);
        assert_eq!(config.wait().calculate(1), Duration::from_millis(500));
    }

    #[test]
    fn test_retry_defaults() {
        let retry = Retry::<u8, String>::of_defaults("defaults");
        assert_eq!(retry.name(), "defaults");
        assert_eq!(retry.config().max_attempts(), 3);
        assert_eq!(retry.metrics().snapshot(), RetryMetricsSnapshot::default());
    }
}
