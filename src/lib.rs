//! # formwork
//!
//! **Formwork** is an event-serialization core for document automation.
//!
//! It funnels every document mutation through one single-consumer task
//! queue, so form values, insert values, print functions and dispatch
//! commands apply in a single global order without locking document
//! state. The crate is designed as the coordination layer under a host
//! application that owns the actual documents.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!   ┌──────────────┐  ┌──────────────┐  ┌──────────────┐
//!   │  host hooks  │  │  API callers │  │ print fns    │
//!   │ (lifecycle)  │  │ (sync/async) │  │ (concurrent) │
//!   └──────┬───────┘  └──────┬───────┘  └──────┬───────┘
//!          │ enqueue         │ enqueue         │ enqueue
//!          ▼                 ▼                 ▼
//! ┌───────────────────────────────────────────────────────────┐
//! │  EventQueue (unbounded mpsc, FIFO)                        │
//! └───────────────────────────┬───────────────────────────────┘
//!                             ▼ one task at a time
//! ┌───────────────────────────────────────────────────────────┐
//! │  Worker (single consumer)                                 │
//! │  - DocRegistry (Unseen → Registered → Processed → Closed) │
//! │  - ListenerSet (processing / sender-list listeners)       │
//! │  - Router (scheme:command#argument → handler)             │
//! │  - PrintScheduler (ordered start, bounded concurrency)    │
//! │  - DocumentHost / ValueCache (host collaborators)         │
//! └──────┬─────────────────────────────────────────────┬──────┘
//!        │ Completion::satisfy                         │
//!        ▼                                             ▼
//!   blocked callers                        Bus (broadcast events)
//!   (sync bridge)                                      │
//!                                                      ▼
//!                                          ┌────────────────────┐
//!                                          │  SubscriberSet     │
//!                                          │  (per-sub queues)  │
//!                                          └──┬───────┬──────┬──┘
//!                                             ▼       ▼      ▼
//!                                          sub1.on sub2.on subN.on
//!                                          _event() _event() _event()
//! ```
//!
//! ### Task lifecycle
//! ```text
//! producer ──► EventQueue::enqueue ──► Worker::run()
//!
//! loop {
//!   ├─► recv next task (FIFO; cancellation closes intake, drains rest)
//!   ├─► take Completion off the task
//!   ├─► execute (catch_unwind)
//!   │       ├─ Ok       ─► publish TaskExecuted
//!   │       ├─ Err      ─► publish TaskFailed (queue continues)
//!   │       └─ panic    ─► publish TaskPanicked (queue continues)
//!   └─► satisfy Completion (always, so waiters never hang)
//! }
//!
//! On drain: publish QueueDrained, exit.
//! ```
//!
//! ## Features
//! | Area               | Description                                                         | Key types / traits                          |
//! |--------------------|---------------------------------------------------------------------|---------------------------------------------|
//! | **Engine**         | Build and drive the queue, registry, router and scheduler.          | [`Engine`], [`EngineBuilder`]               |
//! | **Sync bridge**    | Enqueue a mutation and observe it applied before the next read.     | [`Completion`]                              |
//! | **Dispatch**       | Route `scheme:command#argument` URLs to registered handlers.        | [`Router`], [`DispatchHandler`]             |
//! | **Print functions**| Ordered, concurrency-bounded per-document print pipeline.           | [`PrintFunction`], [`PrintFn`]              |
//! | **Listeners**      | Processing and sender-list notifications with self-healing sets.    | [`ProcessingListener`], [`SenderListListener`] |
//! | **Subscriber API** | Hook into the diagnostic event stream (logging, metrics).           | [`Subscribe`]                               |
//! | **Errors**         | Typed, non-fatal errors for the queue and its tasks.                | [`TaskError`], [`RuntimeError`]             |
//! | **Configuration**  | Centralize timeouts, grace and concurrency limits.                  | [`Config`]                                  |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::Arc;
//! use formwork::{DocId, Engine, TaskError};
//!
//! struct Stdout;
//!
//! impl formwork::DocumentHost for Stdout {
//!     fn set_form_value(&self, doc: DocId, field: &str, value: &str) -> Result<(), TaskError> {
//!         println!("{doc}: {field} = {value}");
//!         Ok(())
//!     }
//!     fn set_insert_value(&self, doc: DocId, name: &str, value: &str) -> Result<(), TaskError> {
//!         println!("{doc}: insert {name} = {value}");
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Engine::builder().host(Arc::new(Stdout)).build();
//!
//!     let doc = DocId::new(1);
//!     engine.process_document(doc);
//!     engine.set_form_value(doc, "Anrede", "Frau").await?;
//!
//!     engine.shutdown().await?;
//!     Ok(())
//! }
//! ```
mod config;
mod dispatch;
mod engine;
mod error;
mod events;
mod host;
mod listeners;
mod print;
mod queue;
mod registry;
mod subscribers;

// ---- Public re-exports ----

pub use config::Config;
pub use dispatch::{
    CommandStatus, DispatchHandler, DispatchUrl, Properties, Router, StatusObserver, UrlError,
};
pub use engine::{Engine, EngineBuilder};
pub use error::{RuntimeError, TaskError};
pub use events::{Bus, Event, EventKind};
pub use host::{DocumentHost, ValueCache};
pub use listeners::{Listener, ProcessingListener, SenderListListener};
pub use print::{PrintContext, PrintFn, PrintFunction};
pub use queue::{Completion, EventQueue, PrintAction, Task};
pub use registry::{DocId, DocRecord, DocRegistry, DocState, Observed};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;
