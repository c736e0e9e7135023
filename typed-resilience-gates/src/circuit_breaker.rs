//! Circuit breaker adapter.
//!
//! The breaker itself (state machine, sliding window) lives behind the
//! [`CircuitBreaker`] trait. This module only runs one call through it.

use crate::error::{GuardError, GuardResult, Rejection};
use std::error::Error;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Permission and outcome protocol of a circuit breaker.
///
/// After a successful [`try_acquire_permission`](Self::try_acquire_permission)
/// exactly one of [`on_success`](Self::on_success), [`on_error`](Self::on_error)
/// or [`release_permission`](Self::release_permission) follows.
pub trait CircuitBreaker: Send + Sync {
    /// Breaker name, used in rejections.
    fn name(&self) -> &str;

    /// Try to obtain a permission for one call.
    fn try_acquire_permission(&self) -> bool;

    /// The permitted call succeeded.
    fn on_success(&self, elapsed: Duration);

    /// The permitted call failed.
    fn on_error(&self, elapsed: Duration, error: &(dyn Error + 'static));

    /// The permitted call ended without an outcome, by panic or cancellation.
    fn release_permission(&self) {}
}

impl<G: CircuitBreaker + ?Sized> CircuitBreaker for &G {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn try_acquire_permission(&self) -> bool {
        (**self).try_acquire_permission()
    }

    fn on_success(&self, elapsed: Duration) {
        (**self).on_success(elapsed)
    }

    fn on_error(&self, elapsed: Duration, error: &(dyn Error + 'static)) {
        (**self).on_error(elapsed, error)
    }

    fn release_permission(&self) {
        (**self).release_permission()
    }
}

impl<G: CircuitBreaker + ?Sized> CircuitBreaker for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn try_acquire_permission(&self) -> bool {
        (**self).try_acquire_permission()
    }

    fn on_success(&self, elapsed: Duration) {
        (**self).on_success(elapsed)
    }

    fn on_error(&self, elapsed: Duration, error: &(dyn Error + 'static)) {
        (**self).on_error(elapsed, error)
    }

    fn release_permission(&self) {
        (**self).release_permission()
    }
}

/// Releases the permission unless an outcome was reported.
struct Permit<'a, G: CircuitBreaker + ?Sized> {
    breaker: &'a G,
    started: Instant,
    reported: bool,
}

impl<'a, G: CircuitBreaker + ?Sized> Permit<'a, G> {
    fn acquire(breaker: &'a G) -> Result<Self, Rejection> {
        if !breaker.try_acquire_permission() {
            debug!(circuit_breaker = breaker.name(), "Call not permitted");
            return Err(Rejection::call_not_permitted(breaker.name()));
        }
        Ok(Self {
            breaker,
            started: Instant::now(),
            reported: false,
        })
    }

    fn report<T, E>(mut self, outcome: &Result<T, E>)
    where
        E: Error + 'static,
    {
        let elapsed = self.started.elapsed();
        match outcome {
            Ok(_) => self.breaker.on_success(elapsed),
            Err(error) => self.breaker.on_error(elapsed, error),
        }
        trace!(
            circuit_breaker = self.breaker.name(),
            succeeded = outcome.is_ok(),
            elapsed_us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX),
            "Reported call outcome"
        );
        self.reported = true;
    }
}

impl<G: CircuitBreaker + ?Sized> Drop for Permit<'_, G> {
    fn drop(&mut self) {
        if !self.reported {
            self.breaker.release_permission();
        }
    }
}

/// Run the operation if the breaker permits it.
///
/// On rejection the operation is never invoked and
/// [`Rejection::CallNotPermitted`] is returned.
pub fn execute<G, T, E, F>(breaker: &G, operation: F) -> GuardResult<T, E>
where
    G: CircuitBreaker + ?Sized,
    E: Error + 'static,
    F: FnOnce() -> Result<T, E>,
{
    let permit = Permit::acquire(breaker)?;
    let outcome = operation();
    permit.report(&outcome);
    outcome.map_err(GuardError::Operation)
}

/// Run the async operation if the breaker permits it.
///
/// Dropping the future before it completes releases the permission.
pub async fn execute_async<G, T, E, F, Fut>(breaker: &G, operation: F) -> GuardResult<T, E>
where
    G: CircuitBreaker + ?Sized,
    E: Error + 'static,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let permit = Permit::acquire(breaker)?;
    let outcome = operation().await;
    permit.report(&outcome);
    outcome.map_err(GuardError::Operation)
}

/// Wrap an operation so that every call goes through the breaker.
pub fn decorate<G, T, E, F>(breaker: G, mut operation: F) -> impl FnMut() -> GuardResult<T, E>
where
    G: CircuitBreaker,
    E: Error + 'static,
    F: FnMut() -> Result<T, E>,
{
    move || execute(&breaker, &mut operation)
}
