//! Error types used by the formwork runtime and task bodies.
//!
//! This module defines two main error enums:
//!
//! - [`RuntimeError`] — errors raised by the coordination runtime itself
//!   (synchronous waits, shutdown).
//! - [`TaskError`] — errors raised inside a task body, a listener callback,
//!   a print function, or an external collaborator.
//!
//! Both types provide helper methods (`as_label`, `as_message`) for logging
//! and metrics. Nothing in this crate treats either enum as fatal to the
//! process: a failed task degrades to "this one operation did not happen".

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the formwork runtime.
///
/// These represent failures in the coordination layer, not in the work being
/// coordinated: a sync-bridge wait that timed out, a wait issued from the
/// queue worker itself, or a shutdown that exceeded its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// A synchronous wait was issued from the queue worker.
    ///
    /// The worker is the single consumer of the event queue; blocking it on
    /// a completion signal would deadlock it against itself. This is a
    /// programming error in the caller and fails fast instead of hanging.
    #[error("completion wait issued from the queue worker; this would deadlock")]
    CalledFromWorker,

    /// A synchronous wait exceeded the configured timeout.
    ///
    /// The associated task is still queued and will still run; only the
    /// caller's wait gave up.
    #[error("completion wait timed out after {waited:?}")]
    WaitTimeout {
        /// How long the caller waited before giving up.
        waited: Duration,
    },

    /// Shutdown grace period was exceeded; the worker did not drain in time.
    #[error("shutdown grace {grace:?} exceeded; queue worker still draining")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
    },
}

impl RuntimeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use formwork::RuntimeError;
    ///
    /// assert_eq!(RuntimeError::CalledFromWorker.as_label(), "wait_on_worker");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            RuntimeError::CalledFromWorker => "wait_on_worker",
            RuntimeError::WaitTimeout { .. } => "wait_timeout",
            RuntimeError::GraceExceeded { .. } => "runtime_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            RuntimeError::CalledFromWorker => {
                "wait issued from the queue worker (would deadlock)".to_string()
            }
            RuntimeError::WaitTimeout { waited } => format!("wait timed out after {waited:?}"),
            RuntimeError::GraceExceeded { grace } => format!("grace exceeded after {grace:?}"),
        }
    }
}

/// # Errors produced inside executed work.
///
/// Raised by task bodies, listener callbacks, print functions, and external
/// collaborators ([`DocumentHost`](crate::DocumentHost),
/// [`ValueCache`](crate::ValueCache)). The queue worker catches these,
/// reports them on the event bus, and moves on to the next task.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The work failed with the given message.
    #[error("execution failed: {error}")]
    Fail {
        /// The underlying error message.
        error: String,
    },

    /// The work observed cancellation and exited early.
    ///
    /// Treated as a graceful stop, not a failure.
    #[error("cancelled")]
    Canceled,
}

impl TaskError {
    /// Shorthand for [`TaskError::Fail`] from anything displayable.
    pub fn fail(error: impl std::fmt::Display) -> Self {
        TaskError::Fail {
            error: error.to_string(),
        }
    }

    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::Fail { .. } => "task_failed",
            TaskError::Canceled => "task_canceled",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            TaskError::Fail { error } => format!("error: {error}"),
            TaskError::Canceled => "cancelled".to_string(),
        }
    }

    /// True when the error represents a cooperative cancellation.
    pub fn is_canceled(&self) -> bool {
        matches!(self, TaskError::Canceled)
    }
}

/// Extracts a printable message from a caught panic payload.
pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_stable() {
        assert_eq!(
            RuntimeError::WaitTimeout {
                waited: Duration::from_secs(1)
            }
            .as_label(),
            "wait_timeout"
        );
        assert_eq!(TaskError::fail("boom").as_label(), "task_failed");
        assert_eq!(TaskError::Canceled.as_label(), "task_canceled");
    }

    #[test]
    fn test_canceled_predicate() {
        assert!(TaskError::Canceled.is_canceled());
        assert!(!TaskError::fail("x").is_canceled());
    }

    #[test]
    fn test_panic_message_downcasts() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("static str panic");
        assert_eq!(panic_message(boxed.as_ref()), "static str panic");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("owned panic"));
        assert_eq!(panic_message(boxed.as_ref()), "owned panic");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(42_u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}
