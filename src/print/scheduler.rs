//! # Print scheduler.
//!
//! Runs a sorted batch of print functions for one document. Functions
//! execute concurrently up to the configured limit, but they *start* in
//! `(priority, name)` order: the driver acquires each pool permit before
//! spawning the next function, so a full pool delays later functions
//! instead of reordering them.
//!
//! ## Rules
//! - **Never on the worker**: the driver is its own task, so functions can
//!   enqueue mutations back into the queue without deadlocking it.
//! - **Failure is isolated**: a failing or panicking function is reported
//!   on the bus and the rest of the batch continues.

use std::sync::Arc;

use futures::FutureExt;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::panic_message;
use crate::events::{Bus, Event, EventKind};
use crate::print::function::{PrintContext, PrintFunction};
use crate::registry::DocId;

/// Spawns and supervises print-function batches.
#[derive(Clone)]
pub struct PrintScheduler {
    limit: Option<usize>,
    bus: Bus,
}

impl PrintScheduler {
    /// `limit` of `None` means an unbounded pool.
    pub(crate) fn new(limit: Option<usize>, bus: Bus) -> Self {
        Self { limit, bus }
    }

    /// Starts `functions` (pre-sorted) against `doc` and returns the
    /// driver handle. The handle resolves when every function finished.
    pub(crate) fn run(
        &self,
        doc: DocId,
        functions: Vec<PrintFunction>,
        ctx: impl Fn(DocId) -> PrintContext + Send + 'static,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        let semaphore = self.limit.map(|n| Arc::new(Semaphore::new(n.max(1))));
        let bus = self.bus.clone();

        tokio::spawn(async move {
            let mut running = Vec::with_capacity(functions.len());
            for function in functions {
                let permit = match &semaphore {
                    Some(semaphore) => tokio::select! {
                        permit = semaphore.clone().acquire_owned() => match permit {
                            Ok(permit) => Some(permit),
                            Err(_) => break,
                        },
                        _ = cancel.cancelled() => break,
                    },
                    None => {
                        if cancel.is_cancelled() {
                            break;
                        }
                        None
                    }
                };

                let name = function.name_arc();
                bus.publish(
                    Event::new(EventKind::PrintFunctionStarted)
                        .with_doc(doc)
                        .with_function(name.clone()),
                );

                let body = function.handler();
                let bus = bus.clone();
                let ctx = ctx(doc);
                running.push(tokio::spawn(async move {
                    let _permit = permit;
                    let outcome = std::panic::AssertUnwindSafe(body.run(ctx))
                        .catch_unwind()
                        .await;
                    let event = match outcome {
                        Ok(Ok(())) => Event::new(EventKind::PrintFunctionStopped)
                            .with_doc(doc)
                            .with_function(name),
                        Ok(Err(err)) if err.is_canceled() => {
                            Event::new(EventKind::PrintFunctionStopped)
                                .with_doc(doc)
                                .with_function(name)
                                .with_reason("canceled")
                        }
                        Ok(Err(err)) => Event::new(EventKind::PrintFunctionFailed)
                            .with_doc(doc)
                            .with_function(name)
                            .with_reason(err.to_string()),
                        Err(payload) => Event::new(EventKind::PrintFunctionFailed)
                            .with_doc(doc)
                            .with_function(name)
                            .with_reason(panic_message(payload.as_ref())),
                    };
                    bus.publish(event);
                }));
            }
            for handle in running {
                let _ = handle.await;
            }
        })
    }
}
