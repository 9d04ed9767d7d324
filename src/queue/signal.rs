//! # Completion signal bridging the queue worker back to callers.
//!
//! A [`Completion`] is a one-shot latch attached to a mutating task. The
//! worker satisfies it after the task ran — success, failure and panic
//! alike — so a blocked caller observes "the mutation is applied (or dead)"
//! before its next read.
//!
//! ## Rules
//! - **Satisfy exactly once is not required**: `satisfy` is idempotent,
//!   later calls are no-ops.
//! - **Never wait on the worker**: both wait flavors failfast with
//!   [`RuntimeError::CalledFromWorker`] when invoked from the queue worker
//!   itself, because the worker is the only party that could satisfy the
//!   signal — waiting there deadlocks.

use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::sync::Notify;

use crate::error::RuntimeError;
use crate::queue::worker::on_worker;

struct Inner {
    done: Mutex<bool>,
    cv: Condvar,
    notify: Notify,
}

/// One-shot completion latch with blocking and async wait flavors.
#[derive(Clone)]
pub struct Completion {
    inner: Arc<Inner>,
}

impl Completion {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                done: Mutex::new(false),
                cv: Condvar::new(),
                notify: Notify::new(),
            }),
        }
    }

    /// Marks the latch satisfied and wakes all waiters. Idempotent.
    pub fn satisfy(&self) {
        let mut done = self
            .inner
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *done {
            return;
        }
        *done = true;
        drop(done);
        self.inner.cv.notify_all();
        self.inner.notify.notify_waiters();
    }

    /// Returns whether the latch has been satisfied.
    pub fn is_satisfied(&self) -> bool {
        *self
            .inner
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks the calling thread until satisfied.
    ///
    /// `timeout` of `None` waits indefinitely. Called from the queue
    /// worker this fails immediately instead of deadlocking.
    pub fn wait(&self, timeout: Option<Duration>) -> Result<(), RuntimeError> {
        if on_worker() {
            return Err(RuntimeError::CalledFromWorker);
        }
        let started = Instant::now();
        let guard = self
            .inner
            .done
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match timeout {
            None => {
                let mut guard = guard;
                while !*guard {
                    guard = self
                        .inner
                        .cv
                        .wait(guard)
                        .unwrap_or_else(PoisonError::into_inner);
                }
                Ok(())
            }
            Some(limit) => {
                let (guard, result) = self
                    .inner
                    .cv
                    .wait_timeout_while(guard, limit, |done| !*done)
                    .unwrap_or_else(PoisonError::into_inner);
                if *guard {
                    Ok(())
                } else {
                    debug_assert!(result.timed_out());
                    Err(RuntimeError::WaitTimeout {
                        waited: started.elapsed(),
                    })
                }
            }
        }
    }

    /// Awaits satisfaction without blocking the runtime.
    ///
    /// Same worker failfast as [`wait`](Self::wait); the timeout is the
    /// caller's business (`tokio::time::timeout` composes fine).
    pub async fn wait_async(&self) -> Result<(), RuntimeError> {
        if on_worker() {
            return Err(RuntimeError::CalledFromWorker);
        }
        loop {
            let notified = self.inner.notify.notified();
            tokio::pin!(notified);
            // Register interest before checking, so a satisfy between the
            // check and the await cannot be lost.
            notified.as_mut().enable();
            if self.is_satisfied() {
                return Ok(());
            }
            notified.await;
        }
    }
}

impl Default for Completion {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Completion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Completion")
            .field("satisfied", &self.is_satisfied())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_satisfy_is_idempotent() {
        let c = Completion::new();
        assert!(!c.is_satisfied());
        c.satisfy();
        c.satisfy();
        assert!(c.is_satisfied());
        assert!(c.wait(Some(Duration::from_millis(1))).is_ok());
    }

    #[test]
    fn test_wait_times_out() {
        let c = Completion::new();
        let err = c.wait(Some(Duration::from_millis(10))).unwrap_err();
        assert!(matches!(err, RuntimeError::WaitTimeout { .. }));
    }

    #[test]
    fn test_wait_unblocks_across_threads() {
        let c = Completion::new();
        let other = c.clone();
        let handle = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            other.satisfy();
        });
        assert!(c.wait(Some(Duration::from_secs(5))).is_ok());
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn test_wait_async_sees_prior_satisfy() {
        let c = Completion::new();
        c.satisfy();
        assert!(c.wait_async().await.is_ok());
    }

    #[tokio::test]
    async fn test_wait_async_unblocks_on_satisfy() {
        let c = Completion::new();
        let other = c.clone();
        let waiter = tokio::spawn(async move { other.wait_async().await });
        tokio::time::sleep(Duration::from_millis(10)).await;
        c.satisfy();
        assert!(waiter.await.unwrap().is_ok());
    }
}
