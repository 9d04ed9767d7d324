//! # Engine: the public face of the crate.
//!
//! ```text
//!            ┌────────────────────────────────────────────┐
//!            │                  Engine                    │
//!            │                                            │
//!  caller ──▶ enqueue ──▶ [EventQueue] ──▶ [Worker]       │
//!            │                │               │           │
//!            │           Completion        registry       │
//!            │                             listeners      │
//!            │   [Router] ◀── dispatch ──── scheduler     │
//!            │                                            │
//!            │   [Bus] ──▶ forwarder ──▶ [SubscriberSet]  │
//!            └────────────────────────────────────────────┘
//! ```
//!
//! ## Rules
//! - **All mutation goes through the queue**; the async setters attach a
//!   [`Completion`](crate::queue::Completion) and return once the worker
//!   ran the task.
//! - **Shutdown drains**: already-enqueued tasks still run, bounded by the
//!   configured grace.

mod builder;

pub use builder::EngineBuilder;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::{DispatchHandler, Properties, Router, StatusObserver};
use crate::error::RuntimeError;
use crate::events::{Bus, Event, EventKind};
use crate::listeners::{ProcessingListener, SenderListListener};
use crate::queue::{Completion, EventQueue, PrintAction, Task};
use crate::registry::DocId;

/// Handle onto a running document-automation engine.
pub struct Engine {
    config: Config,
    bus: Bus,
    queue: EventQueue,
    router: Arc<Router>,
    token: CancellationToken,
    forward_token: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
}

impl Engine {
    /// Builder entry point.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Producer handle onto the task queue.
    pub fn queue(&self) -> &EventQueue {
        &self.queue
    }

    /// The command router, for handler and status-observer management.
    pub fn router(&self) -> &Arc<Router> {
        &self.router
    }

    /// Subscribes to the diagnostic event stream.
    pub fn events(&self) -> broadcast::Receiver<Event> {
        self.bus.subscribe()
    }

    // ---- document lifecycle ------------------------------------------

    /// Registers and processes `doc`; repeated calls are no-ops.
    pub fn process_document(&self, doc: DocId) {
        self.queue.enqueue(Task::ProcessDocument { doc });
    }

    /// Reports `doc` as gone; its record is dropped.
    pub fn document_closed(&self, doc: DocId) {
        self.queue.enqueue(Task::DocumentClosed { doc });
    }

    // ---- value mutation ----------------------------------------------

    /// Sets one form value, resolving once the worker applied it.
    pub async fn set_form_value(
        &self,
        doc: DocId,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        let done = Completion::new();
        self.queue.enqueue(Task::SetFormValue {
            doc,
            field: field.into(),
            value: value.into(),
            done: Some(done.clone()),
        });
        self.await_done(done).await
    }

    /// Blocking flavor of [`set_form_value`](Self::set_form_value) for
    /// non-async callers. Fails fast when called from the queue worker.
    pub fn set_form_value_blocking(
        &self,
        doc: DocId,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        let done = Completion::new();
        self.queue.enqueue(Task::SetFormValue {
            doc,
            field: field.into(),
            value: value.into(),
            done: Some(done.clone()),
        });
        done.wait(self.config.wait_timeout())
    }

    /// Applies a batch of insert values, resolving once the worker ran
    /// the task. Before processing the batch is parked, not applied.
    pub async fn set_insert_values(
        &self,
        doc: DocId,
        values: Vec<(String, String)>,
    ) -> Result<(), RuntimeError> {
        let done = Completion::new();
        self.queue.enqueue(Task::SetInsertValues {
            doc,
            values,
            done: Some(done.clone()),
        });
        self.await_done(done).await
    }

    /// Blocking flavor of [`set_insert_values`](Self::set_insert_values).
    pub fn set_insert_values_blocking(
        &self,
        doc: DocId,
        values: Vec<(String, String)>,
    ) -> Result<(), RuntimeError> {
        let done = Completion::new();
        self.queue.enqueue(Task::SetInsertValues {
            doc,
            values,
            done: Some(done.clone()),
        });
        done.wait(self.config.wait_timeout())
    }

    // ---- print functions ---------------------------------------------

    /// Attaches the named print function to `doc`.
    pub fn attach_print_function(&self, doc: DocId, name: impl Into<String>) {
        self.queue.enqueue(Task::ManagePrintFunction {
            doc,
            name: name.into(),
            action: PrintAction::Attach,
        });
    }

    /// Detaches the named print function from `doc`.
    pub fn detach_print_function(&self, doc: DocId, name: impl Into<String>) {
        self.queue.enqueue(Task::ManagePrintFunction {
            doc,
            name: name.into(),
            action: PrintAction::Detach,
        });
    }

    /// Runs every print function attached to `doc`.
    pub fn run_print_functions(&self, doc: DocId) {
        self.queue.enqueue(Task::RunPrintFunctions { doc });
    }

    // ---- dispatch ----------------------------------------------------

    /// Registers a command handler, replacing any previous one.
    pub fn register_command(&self, command: impl Into<String>, handler: Arc<dyn DispatchHandler>) {
        self.router.register(command, handler);
    }

    /// Enqueues a dispatch request; the handler runs on the worker.
    pub fn dispatch(&self, url: impl Into<String>, properties: Properties) {
        self.queue.enqueue(Task::DispatchCommand {
            url: url.into(),
            properties,
        });
    }

    /// Registers a status observer for the command in `url`.
    pub fn add_status_observer(&self, observer: Arc<dyn StatusObserver>, url: &str) -> bool {
        self.router.add_status_observer(observer, url)
    }

    /// Deregisters a status observer.
    pub fn remove_status_observer(&self, observer: &Arc<dyn StatusObserver>, url: &str) -> bool {
        self.router.remove_status_observer(observer, url)
    }

    // ---- listeners ---------------------------------------------------

    pub fn add_processing_listener(&self, listener: Arc<dyn ProcessingListener>) {
        self.queue.enqueue(Task::AddProcessingListener { listener });
    }

    pub fn remove_processing_listener(&self, listener: Arc<dyn ProcessingListener>) {
        self.queue
            .enqueue(Task::RemoveProcessingListener { listener });
    }

    /// Adds a sender-list listener. `expected_hash` is the configuration
    /// hash the caller was compiled against; a mismatch against the
    /// engine's hash is reported but does not reject the listener.
    pub fn add_sender_list_listener(
        &self,
        listener: Arc<dyn SenderListListener>,
        expected_hash: Option<u64>,
    ) {
        self.queue.enqueue(Task::AddSenderListListener {
            listener,
            expected_hash,
        });
    }

    pub fn remove_sender_list_listener(&self, listener: Arc<dyn SenderListListener>) {
        self.queue
            .enqueue(Task::RemoveSenderListListener { listener });
    }

    /// Announces a sender-list change to listeners and persists the
    /// values through the configured cache.
    pub fn notify_sender_list_changed(&self) {
        self.queue.enqueue(Task::NotifySenderListChanged);
    }

    // ---- shutdown ----------------------------------------------------

    /// Stops the engine: no new tasks are accepted, already-enqueued
    /// tasks drain, bounded by the configured grace. Idempotent.
    pub async fn shutdown(&self) -> Result<(), RuntimeError> {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        let Some(worker) = worker else {
            return Ok(());
        };

        self.bus.publish(Event::new(EventKind::ShutdownRequested));
        self.token.cancel();

        let result = match self.config.grace() {
            None => {
                let _ = worker.await;
                Ok(())
            }
            Some(grace) => match tokio::time::timeout(grace, worker).await {
                Ok(_) => Ok(()),
                Err(_) => {
                    self.bus.publish(
                        Event::new(EventKind::GraceExceeded)
                            .with_reason(format!("{}ms", grace.as_millis())),
                    );
                    Err(RuntimeError::GraceExceeded { grace })
                }
            },
        };

        // Stop the subscriber pipeline only after the worker's final
        // events hit the bus.
        self.forward_token.cancel();
        let forwarder = self
            .forwarder
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(forwarder) = forwarder {
            let _ = forwarder.await;
        }
        result
    }

    async fn await_done(&self, done: Completion) -> Result<(), RuntimeError> {
        match self.config.wait_timeout() {
            None => done.wait_async().await,
            Some(limit) => match tokio::time::timeout(limit, done.wait_async()).await {
                Ok(result) => result,
                Err(_) => Err(RuntimeError::WaitTimeout { waited: limit }),
            },
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("queue_closed", &self.queue.is_closed())
            .finish()
    }
}
