//! Retry executor for running operations with retries.
//!
//! The blocking and async drivers share [`RetryConfig::decide`]; they only
//! differ in how they wait between attempts.

use crate::config::RetryConfig;
use crate::error::Cancelled;
use crate::metrics::{RetryCounters, RetryMetrics};
use crate::policy::{Completion, Decision};
use crate::sleep::{BlockingSleeper, CancelSignal, Sleeper, ThreadSleeper, TokioSleeper};
use futures::future::BoxFuture;
use std::convert::Infallible;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// State of one execute call.
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    /// Attempts made so far (1-indexed once started).
    pub attempts: u32,
    /// Total time spent waiting between attempts.
    pub total_wait_time: Duration,
    /// History of attempts.
    pub history: Vec<AttemptInfo>,
    /// How the call ended, once it has.
    pub completion: Option<Completion>,
}

/// Information about a single attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptInfo {
    /// Attempt number.
    pub attempt: u32,
    /// Whether the operation returned `Ok`.
    pub succeeded: bool,
    /// Time spent inside the operation.
    pub elapsed: Duration,
    /// Time waited after this attempt.
    pub wait_time: Duration,
}

/// A named retry with shared configuration and metrics.
///
/// Cloning is cheap and every clone feeds the same metrics. Each execute
/// call keeps its own [`RetryState`].
///
/// # Example
///
/// ```ignore
/// use typed_resilience_retry::{Retry, RetryConfig};
/// use std::time::Duration;
///
/// let config = RetryConfig::builder()
///     .max_attempts(3)
///     .fixed(Duration::from_millis(100))
///     .build()?;
/// let retry = Retry::of("backend", config);
///
/// let body = retry.execute(|| fetch_body());
/// assert_eq!(retry.metrics().successful_calls_without_retry(), 1);
/// ```
pub struct Retry<T, E, M = RetryCounters> {
    name: Arc<str>,
    config: Arc<RetryConfig<T, E>>,
    metrics: Arc<M>,
    blocking_sleeper: Arc<dyn BlockingSleeper>,
    sleeper: Arc<dyn Sleeper>,
}

impl<T, E> Retry<T, E, RetryCounters> {
    /// Create a retry with its own counters.
    pub fn of(name: impl Into<String>, config: RetryConfig<T, E>) -> Self {
        Self::builder(name).config(config).build()
    }

    /// Create a retry with the default config.
    pub fn of_defaults(name: impl Into<String>) -> Self {
        Self::builder(name).build()
    }

    /// Create a builder.
    pub fn builder(name: impl Into<String>) -> RetryBuilder<T, E> {
        RetryBuilder::new(name)
    }
}

impl<T, E, M: RetryMetrics> Retry<T, E, M> {
    /// Name used in log fields.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shared configuration.
    pub fn config(&self) -> &RetryConfig<T, E> {
        &self.config
    }

    /// Shared metrics sink.
    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// Run the operation on the calling thread, blocking between attempts.
    pub fn execute<F>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.execute_with_state(operation).0
    }

    /// Run on the calling thread and return the attempt history.
    pub fn execute_with_state<F>(&self, operation: F) -> (Result<T, E>, RetryState)
    where
        F: FnMut() -> Result<T, E>,
    {
        let sleeper = &self.blocking_sleeper;
        let driven = self.drive(operation, move |delay| {
            if !delay.is_zero() {
                sleeper.sleep(delay);
            }
            Ok::<_, Infallible>(())
        });
        match driven {
            Ok(done) => done,
            Err(never) => match never {},
        }
    }

    /// Run on the calling thread until `signal` is cancelled.
    ///
    /// Waits on the signal instead of the configured blocking sleeper.
    /// Cancellation stops the loop before the next attempt and records no
    /// metric.
    pub fn execute_until_cancelled<F>(
        &self,
        signal: &CancelSignal,
        operation: F,
    ) -> Result<Result<T, E>, Cancelled>
    where
        F: FnMut() -> Result<T, E>,
    {
        self.drive(operation, move |delay| {
            if delay.is_zero() {
                if signal.is_cancelled() {
                    return Err(Cancelled);
                }
                return Ok(());
            }
            signal.wait_timeout(delay)
        })
        .map(|(outcome, _)| outcome)
    }

    /// Run the async operation, suspending between attempts.
    ///
    /// Dropping the returned future cancels the loop.
    pub async fn execute_async<F, Fut>(&self, operation: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.execute_async_with_state(operation).await.0
    }

    /// Run the async operation and return the attempt history.
    pub async fn execute_async_with_state<F, Fut>(&self, operation: F) -> (Result<T, E>, RetryState)
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let sleeper = &self.sleeper;
        let driven = self
            .drive_async(operation, move |delay| async move {
                if !delay.is_zero() {
                    sleeper.sleep(delay).await;
                }
                Ok::<_, Infallible>(())
            })
            .await;
        match driven {
            Ok(done) => done,
            Err(never) => match never {},
        }
    }

    /// Run the async operation until `token` is cancelled.
    pub async fn execute_async_until_cancelled<F, Fut>(
        &self,
        token: &CancellationToken,
        operation: F,
    ) -> Result<Result<T, E>, Cancelled>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let sleeper = &self.sleeper;
        self.drive_async(operation, move |delay| async move {
            if token.is_cancelled() {
                return Err(Cancelled);
            }
            if delay.is_zero() {
                return Ok(());
            }
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(Cancelled),
                _ = sleeper.sleep(delay) => Ok(()),
            }
        })
        .await
        .map(|(outcome, _)| outcome)
    }

    fn drive<F, P, C>(&self, mut operation: F, mut pause: P) -> Result<(Result<T, E>, RetryState), C>
    where
        F: FnMut() -> Result<T, E>,
        P: FnMut(Duration) -> Result<(), C>,
    {
        let mut state = RetryState::default();

        loop {
            state.attempts += 1;
            self.log_attempt(&state);

            let started = Instant::now();
            let outcome = operation();
            match self.conclude(&mut state, started.elapsed(), &outcome) {
                Decision::Complete(_) => return Ok((outcome, state)),
                Decision::Retry(delay) => pause(delay)?,
            }
        }
    }

    async fn drive_async<F, Fut, P, PFut, C>(
        &self,
        mut operation: F,
        mut pause: P,
    ) -> Result<(Result<T, E>, RetryState), C>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: FnMut(Duration) -> PFut,
        PFut: Future<Output = Result<(), C>>,
    {
        let mut state = RetryState::default();

        loop {
            state.attempts += 1;
            self.log_attempt(&state);

            let delay = {
                let started = Instant::now();
                let outcome = operation().await;
                match self.conclude(&mut state, started.elapsed(), &outcome) {
                    Decision::Complete(_) => return Ok((outcome, state)),
                    Decision::Retry(delay) => delay,
                }
            };
            pause(delay).await?;
        }
    }

    fn log_attempt(&self, state: &RetryState) {
        debug!(
            retry = %self.name,
            attempt = state.attempts,
            max_attempts = self.config.max_attempts(),
            "Executing retry attempt"
        );
    }

    fn conclude(&self, state: &mut RetryState, elapsed: Duration, outcome: &Result<T, E>) -> Decision {
        let decision = self.config.decide(state.attempts, outcome);
        let wait_time = match decision {
            Decision::Retry(delay) => delay,
            Decision::Complete(_) => Duration::ZERO,
        };

        state.history.push(AttemptInfo {
            attempt: state.attempts,
            succeeded: outcome.is_ok(),
            elapsed,
            wait_time,
        });

        match decision {
            Decision::Retry(delay) => {
                state.total_wait_time = state.total_wait_time.saturating_add(delay);
                debug!(
                    retry = %self.name,
                    attempt = state.attempts,
                    succeeded = outcome.is_ok(),
                    wait_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Waiting before retry"
                );
                self.metrics.record_retry(state.attempts, delay);
            }
            Decision::Complete(completion) => {
                state.completion = Some(completion);
                match completion {
                    Completion::FailedAfterRetry => warn!(
                        retry = %self.name,
                        attempts = state.attempts,
                        "Retry exhausted"
                    ),
                    Completion::Aborted => warn!(
                        retry = %self.name,
                        attempt = state.attempts,
                        "Retry predicate panicked, returning outcome as is"
                    ),
                    _ => debug!(
                        retry = %self.name,
                        attempts = state.attempts,
                        completion = completion.as_str(),
                        "Retry completed"
                    ),
                }
                self.metrics.record(completion);
            }
        }

        decision
    }
}

impl<T, E, M> Retry<T, E, M>
where
    T: 'static,
    E: 'static,
    M: RetryMetrics + 'static,
{
    /// Wrap an operation so that every call runs it with retries.
    pub fn decorate<F>(&self, mut operation: F) -> impl FnMut() -> Result<T, E>
    where
        F: FnMut() -> Result<T, E>,
    {
        let retry = self.clone();
        move || retry.execute(&mut operation)
    }

    /// Wrap an async operation so that every call runs it with retries.
    pub fn decorate_async<F, Fut>(&self, operation: F) -> impl Fn() -> BoxFuture<'static, Result<T, E>>
    where
        F: Fn() -> Fut + Clone + Send + Sync + 'static,
        Fut: Future<Output = Result<T, E>> + Send + 'static,
        T: Send,
        E: Send,
    {
        let retry = self.clone();
        move || {
            let retry = retry.clone();
            let operation = operation.clone();
            Box::pin(async move { retry.execute_async(operation).await })
        }
    }
}

impl<T, E, M> Clone for Retry<T, E, M> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            config: self.config.clone(),
            metrics: self.metrics.clone(),
            blocking_sleeper: self.blocking_sleeper.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

impl<T, E, M> fmt::Debug for Retry<T, E, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Retry")
            .field("name", &self.name)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`Retry`].
pub struct RetryBuilder<T, E, M = RetryCounters> {
    name: String,
    config: RetryConfig<T, E>,
    metrics: Arc<M>,
    blocking_sleeper: Arc<dyn BlockingSleeper>,
    sleeper: Arc<dyn Sleeper>,
}

impl<T, E> RetryBuilder<T, E, RetryCounters> {
    /// Create a builder with the default config and fresh counters.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config: RetryConfig::default(),
            metrics: Arc::new(RetryCounters::new()),
            blocking_sleeper: Arc::new(ThreadSleeper),
            sleeper: Arc::new(TokioSleeper),
        }
    }
}

impl<T, E, M> RetryBuilder<T, E, M> {
    /// Set the config.
    pub fn config(mut self, config: RetryConfig<T, E>) -> Self {
        self.config = config;
        self
    }

    /// Use a shared metrics sink.
    pub fn metrics<N: RetryMetrics>(self, metrics: Arc<N>) -> RetryBuilder<T, E, N> {
        RetryBuilder {
            name: self.name,
            config: self.config,
            metrics,
            blocking_sleeper: self.blocking_sleeper,
            sleeper: self.sleeper,
        }
    }

    /// Set the sleeper used by the blocking executor.
    pub fn blocking_sleeper(mut self, sleeper: impl BlockingSleeper + 'static) -> Self {
        self.blocking_sleeper = Arc::new(sleeper);
        self
    }

    /// Set the sleeper used by the async executor.
    pub fn sleeper(mut self, sleeper: impl Sleeper + 'static) -> Self {
        self.sleeper = Arc::new(sleeper);
        self
    }

    /// Build the retry.
    pub fn build(self) -> Retry<T, E, M> {
        Retry {
            name: self.name.into(),
            config: Arc::new(self.config),
            metrics: self.metrics,
            blocking_sleeper: self.blocking_sleeper,
            sleeper: self.sleeper,
        }
    }
}
