//! # External listener API.
//!
//! Host and macro callers observe the core through two listener interfaces:
//!
//! - [`ProcessingListener`] — told once per document after the registry
//!   marks it `Processed`, and again when the document is closed.
//! - [`SenderListListener`] — told whenever the sender list (PAL) changes.
//!
//! Both listener sets live on the queue worker; external add/remove calls
//! are funneled through the event queue so the sets are only ever touched
//! from one thread. A listener whose callback fails is unregistered and the
//! remaining listeners are still notified (see [`ListenerSet`]).

mod set;

use crate::error::TaskError;
use crate::registry::DocId;

pub use set::ListenerSet;

/// Base trait for everything held in a [`ListenerSet`]: provides the name
/// used when reporting a dropped listener.
pub trait Listener: Send + Sync + 'static {
    /// Human-readable name (for events/logs).
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Observes document processing milestones.
///
/// Callbacks run on the queue worker; they must not block and must not wait
/// on the queue (that would deadlock the worker against itself). Returning
/// an error unregisters the listener.
pub trait ProcessingListener: Listener {
    /// The document finished processing. Delivered once per document.
    fn on_processed(&self, doc: DocId) -> Result<(), TaskError>;

    /// The document was closed and its record removed.
    fn on_closed(&self, _doc: DocId) -> Result<(), TaskError> {
        Ok(())
    }
}

/// Observes changes to the sender list (PAL).
pub trait SenderListListener: Listener {
    /// The sender list changed.
    fn on_sender_list_changed(&self) -> Result<(), TaskError>;
}
