//! # Host collaborators.
//!
//! The engine owns ordering and state, but the actual documents live in a
//! host application. These traits are the seam: the worker calls them to
//! apply mutations, and the sender-list path uses [`ValueCache`] to
//! persist its values.
//!
//! ### Notes
//! All methods run on the queue worker and therefore must not call back
//! into blocking engine waits.

use crate::error::TaskError;
use crate::registry::DocId;

/// Applies value mutations to documents owned by the host application.
pub trait DocumentHost: Send + Sync + 'static {
    /// Writes one named form value into the document.
    fn set_form_value(&self, doc: DocId, field: &str, value: &str) -> Result<(), TaskError>;

    /// Writes one named insert value into the document.
    fn set_insert_value(&self, doc: DocId, name: &str, value: &str) -> Result<(), TaskError>;
}

/// Persists sender-list values between sessions.
pub trait ValueCache: Send + Sync + 'static {
    /// Flushes the current values to the backing store.
    fn save(&self) -> Result<(), TaskError>;
}
