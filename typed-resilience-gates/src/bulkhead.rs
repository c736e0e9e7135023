//! Bulkhead adapter.

use crate::error::{GuardError, GuardResult, Rejection};
use std::future::Future;
use std::sync::Arc;
use tracing::debug;

/// Permission protocol of a bulkhead.
///
/// Every successful [`try_acquire_permission`](Self::try_acquire_permission) is
/// matched by exactly one [`on_complete`](Self::on_complete).
pub trait Bulkhead: Send + Sync {
    /// Bulkhead name, used in rejections.
    fn name(&self) -> &str;

    /// Try to take a slot for one call.
    fn try_acquire_permission(&self) -> bool;

    /// Give the slot back.
    fn on_complete(&self);
}

impl<G: Bulkhead + ?Sized> Bulkhead for &G {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn try_acquire_permission(&self) -> bool {
        (**self).try_acquire_permission()
    }

    fn on_complete(&self) {
        (**self).on_complete()
    }
}

impl<G: Bulkhead + ?Sized> Bulkhead for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn try_acquire_permission(&self) -> bool {
        (**self).try_acquire_permission()
    }

    fn on_complete(&self) {
        (**self).on_complete()
    }
}

/// Holds a slot and gives it back on drop, including on panic.
struct Slot<'a, G: Bulkhead + ?Sized> {
    bulkhead: &'a G,
}

impl<'a, G: Bulkhead + ?Sized> Slot<'a, G> {
    fn acquire(bulkhead: &'a G) -> Result<Self, Rejection> {
        if bulkhead.try_acquire_permission() {
            Ok(Self { bulkhead })
        } else {
            debug!(bulkhead = bulkhead.name(), "Bulkhead full");
            Err(Rejection::bulkhead_full(bulkhead.name()))
        }
    }
}

impl<G: Bulkhead + ?Sized> Drop for Slot<'_, G> {
    fn drop(&mut self) {
        self.bulkhead.on_complete();
    }
}

/// Run the operation if the bulkhead has a free slot.
pub fn execute<G, T, E, F>(bulkhead: &G, operation: F) -> GuardResult<T, E>
where
    G: Bulkhead + ?Sized,
    F: FnOnce() -> Result<T, E>,
{
    let _slot = Slot::acquire(bulkhead)?;
    operation().map_err(GuardError::Operation)
}

/// Run the async operation if the bulkhead has a free slot.
///
/// The slot is held until the future completes or is dropped.
pub async fn execute_async<G, T, E, F, Fut>(bulkhead: &G, operation: F) -> GuardResult<T, E>
where
    G: Bulkhead + ?Sized,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let _slot = Slot::acquire(bulkhead)?;
    operation().await.map_err(GuardError::Operation)
}

/// Wrap an operation so that every call goes through the bulkhead.
pub fn decorate<G, T, E, F>(bulkhead: G, mut operation: F) -> impl FnMut() -> GuardResult<T, E>
where
    G: Bulkhead,
    F: FnMut() -> Result<T, E>,
{
    move || execute(&bulkhead, &mut operation)
}
