//! # Document registry: the authoritative record of open documents.
//!
//! Tracks every document the host has reported and its per-document
//! processing state. The registry is owned by the queue worker and is only
//! read or written from task bodies — exclusivity comes from ownership, not
//! from locks. Producers on other threads reach it solely by enqueuing
//! tasks.
//!
//! ## Rules
//! - `observe` registers a document the **first** time only; the host may
//!   deliver several overlapping lifecycle notifications (load,
//!   view-created, create) for one document, and only the first triggers
//!   processing.
//! - `forget` removes the record **before** the closed notification goes
//!   out; reading the record after `forget` is a correctness bug.
//! - Tasks referencing an unknown or closed document are no-ops, not
//!   errors: lifecycle notifications race with queued work.

mod record;

use std::collections::HashMap;

pub use record::{DocId, DocRecord, DocState};

/// Outcome of [`DocRegistry::observe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observed {
    /// The document was unknown and is now `Registered`.
    First,
    /// The document is already tracked; nothing changed.
    AlreadySeen,
}

/// Registry of tracked documents, keyed by [`DocId`].
///
/// Owned exclusively by the queue worker.
#[derive(Debug, Default)]
pub struct DocRegistry {
    docs: HashMap<DocId, DocRecord>,
}

impl DocRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            docs: HashMap::new(),
        }
    }

    /// Begins tracking `doc` the first time the host reports it.
    ///
    /// Re-observing an already-tracked document is a no-op and returns
    /// [`Observed::AlreadySeen`] — first notification wins, regardless of
    /// which host callback delivered it.
    pub fn observe(&mut self, doc: DocId) -> Observed {
        if self.docs.contains_key(&doc) {
            return Observed::AlreadySeen;
        }
        self.docs.insert(doc, DocRecord::new(doc));
        Observed::First
    }

    /// Transitions `Registered → Processed`.
    ///
    /// Returns `true` on the transition; `false` if the document is not
    /// tracked or already processed (both no-ops).
    pub fn mark_processed(&mut self, doc: DocId) -> bool {
        match self.docs.get_mut(&doc) {
            Some(rec) if rec.state() == DocState::Registered => {
                rec.set_state(DocState::Processed);
                true
            }
            _ => false,
        }
    }

    /// Stops tracking `doc`, returning the final record stamped `Closed`.
    ///
    /// Removal happens before any "document gone" notification, and the
    /// returned record is the only remaining handle — the registry will
    /// treat the same id as brand new if the host ever reports it again.
    pub fn forget(&mut self, doc: DocId) -> Option<DocRecord> {
        self.docs.remove(&doc).map(|mut rec| {
            rec.set_state(DocState::Closed);
            rec
        })
    }

    /// Adds a print-function name to the document's active set.
    ///
    /// Idempotent; returns `true` only when the set changed. Unknown
    /// documents are no-ops (`false`).
    pub fn attach(&mut self, doc: DocId, name: &str) -> bool {
        match self.docs.get_mut(&doc) {
            Some(rec) => rec.print_functions.insert(name.to_string()),
            None => false,
        }
    }

    /// Removes a print-function name from the document's active set.
    ///
    /// Idempotent; detaching a non-member is a no-op (`false`).
    pub fn detach(&mut self, doc: DocId, name: &str) -> bool {
        match self.docs.get_mut(&doc) {
            Some(rec) => rec.print_functions.remove(name),
            None => false,
        }
    }

    /// Current lifecycle state of `doc` (`Unseen` when not tracked).
    pub fn state(&self, doc: DocId) -> DocState {
        self.docs
            .get(&doc)
            .map(|rec| rec.state())
            .unwrap_or(DocState::Unseen)
    }

    /// Shared access to a tracked record.
    pub fn get(&self, doc: DocId) -> Option<&DocRecord> {
        self.docs.get(&doc)
    }

    /// Exclusive access to a tracked record.
    pub fn get_mut(&mut self, doc: DocId) -> Option<&mut DocRecord> {
        self.docs.get_mut(&doc)
    }

    /// Returns sorted ids of all tracked documents.
    pub fn ids(&self) -> Vec<DocId> {
        let mut ids: Vec<DocId> = self.docs.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// True when no document is tracked.
    pub fn is_empty(&self) -> bool {
        self.docs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observe_is_idempotent() {
        let mut reg = DocRegistry::new();
        let doc = DocId::new(1);

        assert_eq!(reg.observe(doc), Observed::First);
        assert_eq!(reg.state(doc), DocState::Registered);

        // Overlapping host notifications: only the first wins.
        assert_eq!(reg.observe(doc), Observed::AlreadySeen);
        assert_eq!(reg.observe(doc), Observed::AlreadySeen);
        assert_eq!(reg.state(doc), DocState::Registered);
    }

    #[test]
    fn test_observe_after_processed_stays_seen() {
        let mut reg = DocRegistry::new();
        let doc = DocId::new(2);
        reg.observe(doc);
        assert!(reg.mark_processed(doc));

        assert_eq!(reg.observe(doc), Observed::AlreadySeen);
        assert_eq!(reg.state(doc), DocState::Processed);
    }

    #[test]
    fn test_mark_processed_requires_registered() {
        let mut reg = DocRegistry::new();
        let doc = DocId::new(3);

        assert!(!reg.mark_processed(doc)); // unseen
        reg.observe(doc);
        assert!(reg.mark_processed(doc));
        assert!(!reg.mark_processed(doc)); // already processed
    }

    #[test]
    fn test_forget_returns_closed_record_and_removes() {
        let mut reg = DocRegistry::new();
        let doc = DocId::new(4);
        reg.observe(doc);
        reg.attach(doc, "letterhead");

        let rec = reg.forget(doc).expect("record");
        assert_eq!(rec.state(), DocState::Closed);
        assert!(rec.print_functions.contains("letterhead"));

        assert_eq!(reg.state(doc), DocState::Unseen);
        assert!(reg.forget(doc).is_none());

        // Reported again later: treated as brand new, nothing resurrected.
        assert_eq!(reg.observe(doc), Observed::First);
        assert!(reg.get(doc).unwrap().print_functions.is_empty());
    }

    #[test]
    fn test_attach_detach_idempotent() {
        let mut reg = DocRegistry::new();
        let doc = DocId::new(5);
        reg.observe(doc);

        assert!(reg.attach(doc, "seal"));
        assert!(!reg.attach(doc, "seal"));
        assert!(reg.detach(doc, "seal"));
        assert!(!reg.detach(doc, "seal"));
        assert!(!reg.detach(doc, "never-attached"));
    }

    #[test]
    fn test_stale_document_is_noop() {
        let mut reg = DocRegistry::new();
        let doc = DocId::new(6);
        assert!(!reg.attach(doc, "seal"));
        assert!(!reg.detach(doc, "seal"));
        assert!(reg.get(doc).is_none());
    }

    #[test]
    fn test_ids_sorted() {
        let mut reg = DocRegistry::new();
        reg.observe(DocId::new(9));
        reg.observe(DocId::new(2));
        reg.observe(DocId::new(5));
        assert_eq!(
            reg.ids(),
            vec![DocId::new(2), DocId::new(5), DocId::new(9)]
        );
    }
}
