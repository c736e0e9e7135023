//! Retry configuration.

use crate::backoff::WaitStrategy;
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Predicate over operation errors.
pub type ErrorPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Predicate over successful values.
pub type ResultPredicate<T> = Arc<dyn Fn(&T) -> bool + Send + Sync>;

/// Delay applied when a successful value is rejected by the result predicate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultBackoff {
    /// Invoke again right away.
    #[default]
    Immediate,
    /// Wait as if the attempt had failed.
    UseWaitStrategy,
}

/// Data-only retry settings, loadable from configuration files.
///
/// ```ignore
/// let settings: RetrySettings = serde_json::from_str(r#"{
///     "max_attempts": 5,
///     "wait": { "type": "fixed", "delay_ms": 250 }
/// }"#)?;
/// let config = RetryConfig::<String, MyError>::from_settings(settings)?;
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Maximum number of attempts, including the first one.
    pub max_attempts: u32,
    /// Wait strategy between failed attempts.
    pub wait: WaitStrategy,
    /// Delay applied when a successful value needs another attempt.
    pub result_backoff: ResultBackoff,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            wait: WaitStrategy::default(),
            result_backoff: ResultBackoff::default(),
        }
    }
}

/// Immutable retry configuration, shared by every call of a [`Retry`](crate::Retry).
pub struct RetryConfig<T, E> {
    max_attempts: u32,
    wait: WaitStrategy,
    result_backoff: ResultBackoff,
    ignore_errors: Option<ErrorPredicate<E>>,
    retry_on_result: Option<ResultPredicate<T>>,
}

impl<T, E> RetryConfig<T, E> {
    /// Create a builder with default settings.
    pub fn builder() -> RetryConfigBuilder<T, E> {
        RetryConfigBuilder::new()
    }

    /// Build a config from data-only settings, without predicates.
    pub fn from_settings(settings: RetrySettings) -> Result<Self, ConfigError> {
        RetryConfigBuilder::from_settings(settings).build()
    }

    /// Create config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            wait: WaitStrategy::None,
            ..Self::default()
        }
    }

    /// Maximum number of attempts, including the first one.
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Wait strategy between failed attempts.
    pub fn wait(&self) -> &WaitStrategy {
        &self.wait
    }

    /// Delay policy for rejected successful values.
    pub fn result_backoff(&self) -> ResultBackoff {
        self.result_backoff
    }

    /// Whether a successful value is checked at all.
    pub fn has_result_predicate(&self) -> bool {
        self.retry_on_result.is_some()
    }

    /// Check whether an error is excluded from retries.
    ///
    /// Runs the user predicate, which may panic.
    pub fn is_ignored(&self, error: &E) -> bool {
        self.ignore_errors.as_ref().is_some_and(|p| p(error))
    }

    /// Check whether a successful value still needs another attempt.
    ///
    /// Runs the user predicate, which may panic.
    pub fn needs_retry(&self, value: &T) -> bool {
        self.retry_on_result.as_ref().is_some_and(|p| p(value))
    }

    /// Data-only view of this config.
    pub fn settings(&self) -> RetrySettings {
        RetrySettings {
            max_attempts: self.max_attempts,
            wait: self.wait.clone(),
            result_backoff: self.result_backoff,
        }
    }
}

impl<T, E> Default for RetryConfig<T, E> {
    fn default() -> Self {
        let settings = RetrySettings::default();
        Self {
            max_attempts: settings.max_attempts,
            wait: settings.wait,
            result_backoff: settings.result_backoff,
            ignore_errors: None,
            retry_on_result: None,
        }
    }
}

impl<T, E> Clone for RetryConfig<T, E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            wait: self.wait.clone(),
            result_backoff: self.result_backoff,
            ignore_errors: self.ignore_errors.clone(),
            retry_on_result: self.retry_on_result.clone(),
        }
    }
}

impl<T, E> fmt::Debug for RetryConfig<T, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryConfig")
            .field("max_attempts", &self.max_attempts)
            .field("wait", &self.wait)
            .field("result_backoff", &self.result_backoff)
            .field("ignore_errors", &self.ignore_errors.is_some())
            .field("retry_on_result", &self.retry_on_result.is_some())
            .finish()
    }
}

/// Builder for [`RetryConfig`].
pub struct RetryConfigBuilder<T, E> {
    settings: RetrySettings,
    ignore_errors: Option<ErrorPredicate<E>>,
    retry_on_result: Option<ResultPredicate<T>>,
}

impl<T, E> RetryConfigBuilder<T, E> {
    /// Create a builder with default settings.
    pub fn new() -> Self {
        Self::from_settings(RetrySettings::default())
    }

    /// Start from data-only settings.
    pub fn from_settings(settings: RetrySettings) -> Self {
        Self {
            settings,
            ignore_errors: None,
            retry_on_result: None,
        }
    }

    /// Preset for polling until a value is ready.
    ///
    /// Rejected values wait `interval` before the next attempt. Pair with
    /// [`retry_on_result`](Self::retry_on_result).
    pub fn for_polling(interval: Duration, max_attempts: u32) -> Self {
        Self::new()
            .max_attempts(max_attempts)
            .fixed(interval)
            .result_backoff(ResultBackoff::UseWaitStrategy)
    }

    /// Set max attempts, including the first one.
    pub fn max_attempts(mut self, n: u32) -> Self {
        self.settings.max_attempts = n;
        self
    }

    /// Set the wait strategy.
    pub fn wait(mut self, strategy: WaitStrategy) -> Self {
        self.settings.wait = strategy;
        self
    }

    /// Do not wait between attempts.
    pub fn no_wait(self) -> Self {
        self.wait(WaitStrategy::None)
    }

    /// Use fixed delay.
    pub fn fixed(self, delay: Duration) -> Self {
        self.wait(WaitStrategy::fixed(delay))
    }

    /// Use exponential backoff.
    pub fn exponential(self, initial: Duration, max: Duration) -> Self {
        self.wait(WaitStrategy::exponential(initial, max))
    }

    /// Use exponential backoff with jitter.
    pub fn exponential_jitter(self, initial: Duration, max: Duration, jitter: f64) -> Self {
        self.wait(WaitStrategy::ExponentialJitter {
            initial,
            max,
            multiplier: 2.0,
            jitter,
        })
    }

    /// Use linear backoff.
    pub fn linear(self, initial: Duration, increment: Duration, max: Duration) -> Self {
        self.wait(WaitStrategy::Linear {
            initial,
            increment,
            max,
        })
    }

    /// Errors matching `predicate` are returned immediately and never retried.
    pub fn ignore_errors<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        self.ignore_errors = Some(Arc::new(predicate));
        self
    }

    /// Successful values matching `predicate` trigger another attempt.
    pub fn retry_on_result<F>(mut self, predicate: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        self.retry_on_result = Some(Arc::new(predicate));
        self
    }

    /// Set the delay policy for rejected values.
    pub fn result_backoff(mut self, backoff: ResultBackoff) -> Self {
        self.settings.result_backoff = backoff;
        self
    }

    /// Validate and build the config.
    pub fn build(self) -> Result<RetryConfig<T, E>, ConfigError> {
        if self.settings.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(0));
        }
        self.settings.wait.validate()?;

        Ok(RetryConfig {
            max_attempts: self.settings.max_attempts,
            wait: self.settings.wait,
            result_backoff: self.settings.result_backoff,
            ignore_errors: self.ignore_errors,
            retry_on_result: self.retry_on_result,
        })
    }
}

impl<T, E> Default for RetryConfigBuilder<T, E> {
    fn default() -> Self {
        Self::new()
    }
}
