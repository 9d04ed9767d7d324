//! # The task queue.
//!
//! ```text
//!  producers (any thread)          single consumer
//!  ──────────────────────          ───────────────
//!  EventQueue::enqueue ──▶ mpsc ──▶ [Worker] ──▶ registry, listeners,
//!        │                             │         router, scheduler
//!        │ Completion                  │
//!        ◀─────────── satisfy ─────────┘
//! ```
//!
//! One unbounded channel, one worker. FIFO enqueue order is the total
//! order of all state mutations; the [`Completion`] latch is the sync
//! bridge for callers that need to observe their own write.

mod signal;
mod task;
pub(crate) mod worker;

pub use signal::Completion;
pub use task::{PrintAction, Task};
pub(crate) use worker::Worker;

use tokio::sync::mpsc::error::SendError;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use crate::events::{Bus, Event, EventKind};

/// Cheap cloneable producer handle onto the task queue.
#[derive(Clone)]
pub struct EventQueue {
    tx: UnboundedSender<Task>,
    bus: Bus,
}

impl EventQueue {
    pub(crate) fn new(bus: Bus) -> (Self, UnboundedReceiver<Task>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx, bus }, rx)
    }

    /// Enqueues `task` for the worker.
    ///
    /// Once the queue closed (shutdown) the task is rejected: any attached
    /// completion is satisfied so no caller blocks on a task that will
    /// never run, and `TaskRejected` is published.
    pub fn enqueue(&self, task: Task) {
        if let Err(SendError(mut task)) = self.tx.send(task) {
            let label = task.label();
            let doc = task.doc();
            if let Some(done) = task.take_completion() {
                done.satisfy();
            }
            let mut event = Event::new(EventKind::TaskRejected)
                .with_task(label)
                .with_reason("queue_closed");
            if let Some(doc) = doc {
                event = event.with_doc(doc);
            }
            self.bus.publish(event);
        }
    }

    /// Whether the worker stopped accepting tasks.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}
