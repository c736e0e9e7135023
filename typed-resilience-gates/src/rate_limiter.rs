//! Rate limiter adapter.

use crate::error::{GuardError, GuardResult, Rejection};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Permit protocol of a rate limiter.
///
/// Permits are consumed, never handed back, so there is no completion
/// callback.
#[async_trait]
pub trait RateLimiter: Send + Sync {
    /// Limiter name, used in rejections.
    fn name(&self) -> &str;

    /// Obtain `permits`, possibly blocking up to the limiter's own timeout.
    fn acquire_permission(&self, permits: u32) -> bool;

    /// Obtain `permits` without blocking the executor thread.
    ///
    /// Defaults to [`acquire_permission`](Self::acquire_permission), which is
    /// only appropriate for limiters that never block.
    async fn acquire_permission_async(&self, permits: u32) -> bool {
        self.acquire_permission(permits)
    }
}

#[async_trait]
impl<'a, G: RateLimiter + ?Sized> RateLimiter for &'a G {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn acquire_permission(&self, permits: u32) -> bool {
        (**self).acquire_permission(permits)
    }

    async fn acquire_permission_async(&self, permits: u32) -> bool {
        (**self).acquire_permission_async(permits).await
    }
}

#[async_trait]
impl<G: RateLimiter + ?Sized> RateLimiter for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn acquire_permission(&self, permits: u32) -> bool {
        (**self).acquire_permission(permits)
    }

    async fn acquire_permission_async(&self, permits: u32) -> bool {
        (**self).acquire_permission_async(permits).await
    }
}

fn rejected<G: RateLimiter + ?Sized>(limiter: &G, permits: u32) -> Rejection {
    debug!(rate_limiter = limiter.name(), permits, "Request not permitted");
    Rejection::request_not_permitted(limiter.name())
}

/// Run the operation if one permit is available.
pub fn execute<G, T, E, F>(limiter: &G, operation: F) -> GuardResult<T, E>
where
    G: RateLimiter + ?Sized,
    F: FnOnce() -> Result<T, E>,
{
    execute_with_permits(limiter, 1, operation)
}

/// Run the operation if `permits` are available.
pub fn execute_with_permits<G, T, E, F>(limiter: &G, permits: u32, operation: F) -> GuardResult<T, E>
where
    G: RateLimiter + ?Sized,
    F: FnOnce() -> Result<T, E>,
{
    if !limiter.acquire_permission(permits) {
        return Err(rejected(limiter, permits).into());
    }
    operation().map_err(GuardError::Operation)
}

/// Run the async operation if one permit is available.
pub async fn execute_async<G, T, E, F, Fut>(limiter: &G, operation: F) -> GuardResult<T, E>
where
    G: RateLimiter + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    execute_async_with_permits(limiter, 1, operation).await
}

/// Run the async operation if `permits` are available.
pub async fn execute_async_with_permits<G, T, E, F, Fut>(
    limiter: &G,
    permits: u32,
    operation: F,
) -> GuardResult<T, E>
where
    G: RateLimiter + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    if !limiter.acquire_permission_async(permits).await {
        return Err(rejected(limiter, permits).into());
    }
    operation().await.map_err(GuardError::Operation)
}

/// Wrap an operation so that every call takes `permits` from the limiter.
pub fn decorate<G, T, E, F>(
    limiter: G,
    permits: u32,
    mut operation: F,
) -> impl FnMut() -> GuardResult<T, E>
where
    G: RateLimiter,
    F: FnMut() -> Result<T, E>,
{
    move || execute_with_permits(&limiter, permits, &mut operation)
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct FakeLimiter {
        available: Mutex<u32>,
    }

    impl FakeLimiter {
        fn new(available: u32) -> Self {
            Self {
                available: Mutex::new(available),
            }
        }

        fn available(&self) -> u32 {
            *self.available.lock()
        }
    }

    impl RateLimiter for FakeLimiter {
        fn name(&self) -> &str {
            "test"
        }

        fn acquire_permission(&self, permits: u32) -> bool {
            let mut available = self.available.lock();
            if *available >= permits {
                *available -= permits;
                true
            } else {
                false
            }
        }
    }

    struct AsyncOnlyLimiter;

    #[async_trait]
    impl RateLimiter for AsyncOnlyLimiter {
        fn name(&self) -> &str {
            "async"
        }

        fn acquire_permission(&self, _permits: u32) -> bool {
            false
        }

        async fn acquire_permission_async(&self, _permits: u32) -> bool {
            tokio::task::yield_now().await;
            true
        }
    }

    #[test]
    fn test_permitted_call() {
        let limiter = FakeLimiter::new(1);

        let result = execute(&limiter, || Ok::<_, String>("Hello"));

        assert_eq!(result, Ok("Hello"));
        assert_eq!(limiter.available(), 0);
    }

    #[test]
    fn test_failed_call_passes_error_through() {
        let limiter = FakeLimiter::new(1);

        let result = execute(&limiter, || Err::<(), _>("boom".to_string()));

        assert_eq!(result, Err(GuardError::Operation("boom".to_string())));
    }

    #[test]
    fn test_rejected_call() {
        let limiter = FakeLimiter::new(0);
        let calls = AtomicU32::new(0);

        let result = execute(&limiter, || {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok::<_, String>("Hello")
        });

        assert_eq!(
            result,
            Err(GuardError::Rejected(Rejection::request_not_permitted("test")))
        );
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_multiple_permits() {
        let limiter = FakeLimiter::new(3);

        assert!(execute_with_permits(&limiter, 2, || Ok::<_, String>(())).is_ok());
        assert!(execute_with_permits(&limiter, 2, || Ok::<_, String>(()))
            .unwrap_err()
            .is_rejected());
        assert_eq!(limiter.available(), 1);
    }

    #[test]
    fn test_decorate() {
        let limiter = Arc::new(FakeLimiter::new(2));
        let mut decorated = decorate(limiter.clone(), 1, || Ok::<_, String>(1));

        assert_eq!(decorated(), Ok(1));
        assert_eq!(decorated(), Ok(1));
        assert!(decorated().unwrap_err().is_rejected());
    }

    #[tokio::test]
    async fn test_async_default_delegates() {
        let limiter = FakeLimiter::new(1);

        let first = execute_async(&limiter, || async { Ok::<_, String>("first") }).await;
        let second = execute_async(&limiter, || async { Ok::<_, String>("second") }).await;

        assert_eq!(first, Ok("first"));
        assert!(second.unwrap_err().is_rejected());
    }

    #[tokio::test]
    async fn test_async_uses_async_acquisition() {
        let limiter = AsyncOnlyLimiter;

        let result = execute_async_with_permits(&limiter, 5, || async { Ok::<_, String>(42) }).await;

        assert_eq!(result, Ok(42));
        assert!(execute(&limiter, || Ok::<_, String>(42)).is_err());
    }
}
