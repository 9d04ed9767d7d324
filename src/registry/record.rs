//! Per-document record: identity, lifecycle state, and accumulated values.

use std::collections::{BTreeSet, HashMap};
use std::fmt;

/// Opaque identifier the host assigns to one open document.
///
/// The core never interprets document content; a `DocId` is the only handle
/// that crosses the boundary between host callbacks and queued tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DocId(u64);

impl DocId {
    /// Wraps a raw host-assigned identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for DocId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle state of a tracked document.
///
/// ```text
/// Unseen ──observe──► Registered ──mark_processed──► Processed ──forget──► Closed
/// ```
///
/// `Unseen` is the absence of a record; `Closed` is the final state stamped
/// on the record returned by `forget`. A closed record is never resurrected:
/// if the host reports the same id again later, a fresh record starts over
/// at `Registered`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocState {
    /// Not tracked (no record exists).
    Unseen,
    /// The host reported the document; processing has not finished.
    Registered,
    /// Processing finished; external listeners were told.
    Processed,
    /// The host unloaded the document; the record was removed.
    Closed,
}

/// Authoritative record of one open document.
///
/// Owned exclusively by the [`DocRegistry`](crate::registry::DocRegistry);
/// every read and write happens on the queue-consumer worker.
#[derive(Debug, Clone)]
pub struct DocRecord {
    id: DocId,
    state: DocState,
    /// Names of print functions attached to this document.
    ///
    /// A `BTreeSet` so iteration order is already lexicographic; the
    /// scheduler only has to order by priority on top of it.
    pub print_functions: BTreeSet<String>,
    /// Insertion values received before the document finished processing.
    pub pending_inserts: HashMap<String, String>,
    /// Insertion values already handed to the host.
    pub insert_values: HashMap<String, String>,
    /// Last applied form-field values.
    pub form_values: HashMap<String, String>,
}

impl DocRecord {
    pub(crate) fn new(id: DocId) -> Self {
        Self {
            id,
            state: DocState::Registered,
            print_functions: BTreeSet::new(),
            pending_inserts: HashMap::new(),
            insert_values: HashMap::new(),
            form_values: HashMap::new(),
        }
    }

    /// The document this record tracks.
    pub fn id(&self) -> DocId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DocState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: DocState) {
        self.state = state;
    }
}
