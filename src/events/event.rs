//! # Runtime events emitted by the queue worker and its collaborators.
//!
//! The [`EventKind`] enum classifies event types across the core's surfaces:
//! queue execution, dispatch routing, document lifecycle, print functions,
//! external listeners, and the subscriber fan-out itself.
//!
//! The [`Event`] struct carries additional metadata such as timestamps, the
//! affected document, command or function names, and failure reasons.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Because all document-mutating work runs on one worker, the
//! `seq` of events published from task bodies also reflects execution order.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::time::SystemTime;

use crate::registry::DocId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Queue events ===
    /// A task ran to completion on the worker.
    ///
    /// Sets: `task` (kind label), `doc` where applicable.
    TaskExecuted,

    /// A task body returned an error; the queue continues.
    ///
    /// Sets: `task`, `doc` where applicable, `reason`.
    TaskFailed,

    /// A task body panicked; the panic was caught and the queue continues.
    ///
    /// Sets: `task`, `reason` (panic message).
    TaskPanicked,

    /// A task was enqueued after the queue closed and will not run.
    ///
    /// Its completion signal (if any) was satisfied so the producer does
    /// not hang. Sets: `task`, `reason`.
    TaskRejected,

    /// A task referenced a document that is unknown or already closed.
    ///
    /// Lifecycle notifications race with queued work, so this is a no-op,
    /// not an error. Sets: `task`, `doc`.
    StaleDocument,

    /// Engine shutdown was requested; the queue stops accepting tasks.
    ShutdownRequested,

    /// The worker drained every remaining task and exited.
    QueueDrained,

    /// Shutdown grace period elapsed before the worker finished draining.
    GraceExceeded,

    // === Dispatch events ===
    /// A dispatch URL resolved to a handler and was executed.
    ///
    /// Sets: `command`.
    CommandDispatched,

    /// No handler is registered for the dispatched command.
    ///
    /// Expected dispatch-provider behavior, not an error. Sets: `command`.
    CommandUnhandled,

    /// A dispatch URL did not match `scheme:command#argument`.
    ///
    /// Sets: `reason` (the malformed input).
    DispatchParseFailed,

    /// A dispatch argument failed percent-decoding and was treated as empty.
    ///
    /// Sets: `command`, `reason`.
    ArgumentDecodeFailed,

    /// Registering a handler replaced a previous one for the same command.
    ///
    /// Sets: `command`.
    HandlerReplaced,

    /// A status observer failed during notification and was unregistered.
    ///
    /// Sets: `command`, `listener`, `reason`.
    ObserverFailed,

    // === Document lifecycle events ===
    /// A document was seen for the first time and is now tracked.
    ///
    /// Sets: `doc`.
    DocumentRegistered,

    /// A document finished processing; processing listeners were notified.
    ///
    /// Sets: `doc`.
    DocumentProcessed,

    /// A document was closed and its record removed.
    ///
    /// Published after removal; the record is never resurrected.
    /// Sets: `doc`.
    DocumentClosed,

    // === Print-function events ===
    /// A print-function name was attached to a document.
    ///
    /// Sets: `doc`, `function`.
    PrintFunctionAttached,

    /// A print-function name was detached from a document.
    ///
    /// Sets: `doc`, `function`.
    PrintFunctionDetached,

    /// A print function was admitted by the scheduler and started.
    ///
    /// Start events for one document are published in (priority, name)
    /// order. Sets: `doc`, `function`.
    PrintFunctionStarted,

    /// A print function finished without error.
    ///
    /// Sets: `doc`, `function`.
    PrintFunctionStopped,

    /// A print function failed or panicked; siblings are unaffected.
    ///
    /// Sets: `doc`, `function`, `reason`.
    PrintFunctionFailed,

    /// An attached print-function name has no registered definition.
    ///
    /// Sets: `doc`, `function`.
    PrintFunctionSkipped,

    // === Listener events ===
    /// An external listener failed during notification and was removed.
    ///
    /// Remaining listeners were still notified. Sets: `listener`, `reason`.
    ListenerFailed,

    /// The sender list (PAL) changed; listeners were notified.
    SenderListChanged,

    /// A sender-list listener registered with a configuration hash that
    /// does not match the running instance.
    ///
    /// The registration still proceeds. Sets: `listener`, `reason`.
    ConfigHashMismatch,

    /// The value-cache collaborator failed to persist; non-fatal.
    ///
    /// Sets: `reason`.
    CacheSaveFailed,

    // === Subscriber events ===
    /// A subscriber panicked during event processing.
    ///
    /// Sets: `listener` (subscriber name), `reason`.
    SubscriberPanicked,

    /// A subscriber dropped an event (queue full or worker closed).
    ///
    /// Sets: `listener` (subscriber name), `reason`.
    SubscriberOverflow,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other optional fields are set depending on the [`EventKind`]
#[derive(Debug, Clone)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Affected document, if applicable.
    pub doc: Option<DocId>,
    /// Task kind label (stable snake_case), if the event concerns a task.
    pub task: Option<Arc<str>>,
    /// Dispatch command identifier.
    pub command: Option<Arc<str>>,
    /// Print-function name.
    pub function: Option<Arc<str>>,
    /// Listener, observer, or subscriber name.
    pub listener: Option<Arc<str>>,
    /// Human-readable reason (errors, panic messages, raw input).
    pub reason: Option<Arc<str>>,
}

impl Event {
    /// Creates a new event of the given kind with the current timestamp and
    /// next sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            doc: None,
            task: None,
            command: None,
            function: None,
            listener: None,
            reason: None,
        }
    }

    /// Attaches the affected document.
    #[inline]
    pub fn with_doc(mut self, doc: DocId) -> Self {
        self.doc = Some(doc);
        self
    }

    /// Attaches a task kind label.
    #[inline]
    pub fn with_task(mut self, task: impl Into<Arc<str>>) -> Self {
        self.task = Some(task.into());
        self
    }

    /// Attaches a dispatch command identifier.
    #[inline]
    pub fn with_command(mut self, command: impl Into<Arc<str>>) -> Self {
        self.command = Some(command.into());
        self
    }

    /// Attaches a print-function name.
    #[inline]
    pub fn with_function(mut self, function: impl Into<Arc<str>>) -> Self {
        self.function = Some(function.into());
        self
    }

    /// Attaches a listener/observer/subscriber name.
    #[inline]
    pub fn with_listener(mut self, listener: impl Into<Arc<str>>) -> Self {
        self.listener = Some(listener.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Creates a subscriber overflow event.
    #[inline]
    pub(crate) fn subscriber_overflow(subscriber: &'static str, reason: &'static str) -> Self {
        Event::new(EventKind::SubscriberOverflow)
            .with_listener(subscriber)
            .with_reason(reason)
    }

    /// Creates a subscriber panic event.
    #[inline]
    pub(crate) fn subscriber_panicked(subscriber: &'static str, info: String) -> Self {
        Event::new(EventKind::SubscriberPanicked)
            .with_listener(subscriber)
            .with_reason(info)
    }

    #[inline]
    pub(crate) fn is_subscriber_overflow(&self) -> bool {
        matches!(self.kind, EventKind::SubscriberOverflow)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::TaskExecuted);
        let b = Event::new(EventKind::TaskExecuted);
        let c = Event::new(EventKind::QueueDrained);
        assert!(a.seq < b.seq);
        assert!(b.seq < c.seq);
    }

    #[test]
    fn test_builder_sets_fields() {
        let ev = Event::new(EventKind::PrintFunctionFailed)
            .with_doc(DocId::new(7))
            .with_function("letterhead")
            .with_reason("boom");
        assert_eq!(ev.kind, EventKind::PrintFunctionFailed);
        assert_eq!(ev.doc, Some(DocId::new(7)));
        assert_eq!(ev.function.as_deref(), Some("letterhead"));
        assert_eq!(ev.reason.as_deref(), Some("boom"));
        assert!(ev.task.is_none());
    }
}
