//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the queue worker, the
//! dispatch router, the print-function scheduler, and subscriber workers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: the queue worker (task lifecycle, registry
//!   transitions), `Router` (dispatch outcomes), `PrintScheduler`
//!   (function lifecycle), `SubscriberSet` workers (overflow/panic).
//! - **Consumers**: the engine's forwarding listener (fans out to the
//!   `SubscriberSet`) and any test or host code holding a receiver.

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};
