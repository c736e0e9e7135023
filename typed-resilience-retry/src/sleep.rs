//! Sleepers used to wait between attempts.

use crate::error::Cancelled;
use async_trait::async_trait;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Blocks the calling thread between attempts.
pub trait BlockingSleeper: Send + Sync {
    /// Block for `delay`.
    fn sleep(&self, delay: Duration);
}

/// Suspends the calling task between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    /// Suspend for `delay`.
    async fn sleep(&self, delay: Duration);
}

/// [`BlockingSleeper`] backed by [`std::thread::sleep`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleeper;

impl BlockingSleeper for ThreadSleeper {
    fn sleep(&self, delay: Duration) {
        std::thread::sleep(delay);
    }
}

/// [`Sleeper`] backed by the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, delay: Duration) {
        tokio::time::sleep(delay).await;
    }
}

/// Records requested delays and returns immediately.
///
/// Clones share the same record, so a clone handed to a retry can be
/// inspected afterwards.
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    delays: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Delays requested so far, in order.
    pub fn delays(&self) -> Vec<Duration> {
        self.delays.lock().clone()
    }

    /// Sum of every requested delay.
    pub fn total(&self) -> Duration {
        self.delays
            .lock()
            .iter()
            .fold(Duration::ZERO, |total, delay| total.saturating_add(*delay))
    }

    fn record(&self, delay: Duration) {
        self.delays.lock().push(delay);
    }
}

impl BlockingSleeper for RecordingSleeper {
    fn sleep(&self, delay: Duration) {
        self.record(delay);
    }
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, delay: Duration) {
        self.record(delay);
    }
}

/// Cancellation flag for blocking retries.
///
/// A thread waiting between attempts wakes up as soon as [`cancel`](Self::cancel)
/// is called from anywhere else.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    cancelled: Mutex<bool>,
    condvar: Condvar,
}

impl CancelSignal {
    /// Create a signal that is not cancelled.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel and wake every waiter.
    pub fn cancel(&self) {
        *self.inner.cancelled.lock() = true;
        self.inner.condvar.notify_all();
    }

    /// Whether [`cancel`](Self::cancel) was called.
    pub fn is_cancelled(&self) -> bool {
        *self.inner.cancelled.lock()
    }

    /// Wait for `delay` unless cancelled first.
    pub fn wait_timeout(&self, delay: Duration) -> Result<(), Cancelled> {
        let mut cancelled = self.inner.cancelled.lock();

        match Instant::now().checked_add(delay) {
            Some(deadline) => {
                while !*cancelled {
                    if self.inner.condvar.wait_until(&mut cancelled, deadline).timed_out() {
                        break;
                    }
                }
            }
            None => {
                while !*cancelled {
                    self.inner.condvar.wait(&mut cancelled);
                }
            }
        }

        if *cancelled {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recording_sleeper_shares_record() {
        let sleeper = RecordingSleeper::new();
        let clone = sleeper.clone();

        BlockingSleeper::sleep(&clone, Duration::from_millis(5));
        BlockingSleeper::sleep(&clone, Duration::from_millis(10));

        assert_eq!(
            sleeper.delays(),
            vec![Duration::from_millis(5), Duration::from_millis(10)]
        );
        assert_eq!(sleeper.total(), Duration::from_millis(15));
    }

    #[tokio::test]
    async fn test_recording_sleeper_async() {
        let sleeper = RecordingSleeper::new();
        Sleeper::sleep(&sleeper, Duration::from_secs(60)).await;
        assert_eq!(sleeper.delays(), vec![Duration::from_secs(60)]);
    }

    #[test]
    fn test_cancel_signal_elapses() {
        let signal = CancelSignal::new();
        assert!(signal.wait_timeout(Duration::from_millis(1)).is_ok());
        assert!(!signal.is_cancelled());
    }

    #[test]
    fn test_cancel_signal_already_cancelled() {
        let signal = CancelSignal::new();
        signal.cancel();
        assert_eq!(signal.wait_timeout(Duration::from_secs(60)), Err(Cancelled));
    }

    #[test]
    fn test_cancel_signal_wakes_waiter() {
        let signal = CancelSignal::new();
        let remote = signal.clone();

        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });

        let started = Instant::now();
        assert_eq!(signal.wait_timeout(Duration::from_secs(60)), Err(Cancelled));
        assert!(started.elapsed() < Duration::from_secs(30));
        handle.join().unwrap();
    }
}
