//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//!
//! ## Output format
//! ```text
//! [executed] task=set_form_value doc=#3
//! [doc-processed] doc=#3
//! [dispatch] command=openTemplate
//! [print-started] doc=#3 fn=letterhead
//! [listener-failed] listener=pal-probe reason="boom"
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions for debugging and demonstration purposes; implement a
/// custom [`Subscribe`] for structured logging or metrics collection.
pub struct LogWriter;

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::TaskExecuted => {
                println!("[executed] task={:?} doc={:?}", e.task, e.doc);
            }
            EventKind::TaskFailed => {
                println!(
                    "[task-failed] task={:?} doc={:?} reason={:?}",
                    e.task, e.doc, e.reason
                );
            }
            EventKind::TaskPanicked => {
                println!("[task-panicked] task={:?} reason={:?}", e.task, e.reason);
            }
            EventKind::TaskRejected => {
                println!("[rejected] task={:?} reason={:?}", e.task, e.reason);
            }
            EventKind::StaleDocument => {
                println!("[stale-doc] task={:?} doc={:?}", e.task, e.doc);
            }
            EventKind::ShutdownRequested => println!("[shutdown-requested]"),
            EventKind::QueueDrained => println!("[queue-drained]"),
            EventKind::GraceExceeded => println!("[grace-exceeded]"),
            EventKind::CommandDispatched => {
                println!("[dispatch] command={:?}", e.command);
            }
            EventKind::CommandUnhandled => {
                println!("[dispatch-unhandled] command={:?}", e.command);
            }
            EventKind::DispatchParseFailed => {
                println!("[dispatch-parse-failed] reason={:?}", e.reason);
            }
            EventKind::ArgumentDecodeFailed => {
                println!(
                    "[decode-failed] command={:?} reason={:?}",
                    e.command, e.reason
                );
            }
            EventKind::HandlerReplaced => {
                println!("[handler-replaced] command={:?}", e.command);
            }
            EventKind::ObserverFailed => {
                println!(
                    "[observer-failed] command={:?} listener={:?} reason={:?}",
                    e.command, e.listener, e.reason
                );
            }
            EventKind::DocumentRegistered => println!("[doc-registered] doc={:?}", e.doc),
            EventKind::DocumentProcessed => println!("[doc-processed] doc={:?}", e.doc),
            EventKind::DocumentClosed => println!("[doc-closed] doc={:?}", e.doc),
            EventKind::PrintFunctionAttached => {
                println!("[print-attached] doc={:?} fn={:?}", e.doc, e.function);
            }
            EventKind::PrintFunctionDetached => {
                println!("[print-detached] doc={:?} fn={:?}", e.doc, e.function);
            }
            EventKind::PrintFunctionStarted => {
                println!("[print-started] doc={:?} fn={:?}", e.doc, e.function);
            }
            EventKind::PrintFunctionStopped => {
                println!("[print-stopped] doc={:?} fn={:?}", e.doc, e.function);
            }
            EventKind::PrintFunctionFailed => {
                println!(
                    "[print-failed] doc={:?} fn={:?} reason={:?}",
                    e.doc, e.function, e.reason
                );
            }
            EventKind::PrintFunctionSkipped => {
                println!("[print-skipped] doc={:?} fn={:?}", e.doc, e.function);
            }
            EventKind::ListenerFailed => {
                println!(
                    "[listener-failed] listener={:?} reason={:?}",
                    e.listener, e.reason
                );
            }
            EventKind::SenderListChanged => println!("[sender-list-changed]"),
            EventKind::ConfigHashMismatch => {
                println!(
                    "[config-hash-mismatch] listener={:?} reason={:?}",
                    e.listener, e.reason
                );
            }
            EventKind::CacheSaveFailed => {
                println!("[cache-save-failed] reason={:?}", e.reason);
            }
            EventKind::SubscriberPanicked => {
                println!(
                    "[subscriber-panicked] listener={:?} reason={:?}",
                    e.listener, e.reason
                );
            }
            EventKind::SubscriberOverflow => {
                println!(
                    "[subscriber-overflow] listener={:?} reason={:?}",
                    e.listener, e.reason
                );
            }
        }
    }

    fn name(&self) -> &'static str {
        "log_writer"
    }
}
