//! # Queue tasks: the serialized mutation vocabulary.
//!
//! Every mutation of engine state travels as one [`Task`] through the
//! single-consumer queue. Tasks carry their inputs by value; the two
//! value-mutation tasks may additionally carry a [`Completion`] the worker
//! satisfies once the task ran.

use std::sync::Arc;

use crate::dispatch::Properties;
use crate::listeners::{ProcessingListener, SenderListListener};
use crate::queue::signal::Completion;
use crate::registry::DocId;

/// Attach or detach for [`Task::ManagePrintFunction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintAction {
    Attach,
    Detach,
}

/// One unit of work for the queue worker.
pub enum Task {
    /// Set a single named form value on a document.
    SetFormValue {
        doc: DocId,
        field: String,
        value: String,
        done: Option<Completion>,
    },
    /// Apply a batch of insert values to a document. Arrives before the
    /// document is processed, the batch is parked and applied on
    /// processing.
    SetInsertValues {
        doc: DocId,
        values: Vec<(String, String)>,
        done: Option<Completion>,
    },
    /// First-sight registration and processing of a document.
    ProcessDocument { doc: DocId },
    /// The document went away; drop its record and tell listeners.
    DocumentClosed { doc: DocId },
    /// Attach or detach a named print function on a document.
    ManagePrintFunction {
        doc: DocId,
        name: String,
        action: PrintAction,
    },
    /// Run every print function attached to the document.
    RunPrintFunctions { doc: DocId },
    /// The sender list changed; fan out to listeners and persist.
    NotifySenderListChanged,
    /// Resolve and invoke a dispatch command on the worker.
    DispatchCommand { url: String, properties: Properties },
    AddProcessingListener {
        listener: Arc<dyn ProcessingListener>,
    },
    RemoveProcessingListener {
        listener: Arc<dyn ProcessingListener>,
    },
    AddSenderListListener {
        listener: Arc<dyn SenderListListener>,
        expected_hash: Option<u64>,
    },
    RemoveSenderListListener {
        listener: Arc<dyn SenderListListener>,
    },
}

impl Task {
    /// Stable label used in events and logs.
    pub fn label(&self) -> &'static str {
        match self {
            Task::SetFormValue { .. } => "set_form_value",
            Task::SetInsertValues { .. } => "set_insert_values",
            Task::ProcessDocument { .. } => "process_document",
            Task::DocumentClosed { .. } => "document_closed",
            Task::ManagePrintFunction { .. } => "manage_print_function",
            Task::RunPrintFunctions { .. } => "run_print_functions",
            Task::NotifySenderListChanged => "notify_sender_list_changed",
            Task::DispatchCommand { .. } => "dispatch_command",
            Task::AddProcessingListener { .. } => "add_processing_listener",
            Task::RemoveProcessingListener { .. } => "remove_processing_listener",
            Task::AddSenderListListener { .. } => "add_sender_list_listener",
            Task::RemoveSenderListListener { .. } => "remove_sender_list_listener",
        }
    }

    /// The document this task targets, when it targets one.
    pub fn doc(&self) -> Option<DocId> {
        match self {
            Task::SetFormValue { doc, .. }
            | Task::SetInsertValues { doc, .. }
            | Task::ProcessDocument { doc }
            | Task::DocumentClosed { doc }
            | Task::ManagePrintFunction { doc, .. }
            | Task::RunPrintFunctions { doc } => Some(*doc),
            _ => None,
        }
    }

    /// Takes the attached completion, if any, leaving `None` behind.
    ///
    /// The worker takes it before executing the task so the latch is
    /// satisfied even when execution panics.
    pub fn take_completion(&mut self) -> Option<Completion> {
        match self {
            Task::SetFormValue { done, .. } | Task::SetInsertValues { done, .. } => done.take(),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut s = f.debug_struct("Task");
        s.field("label", &self.label());
        if let Some(doc) = self.doc() {
            s.field("doc", &doc);
        }
        s.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_take_completion_only_once() {
        let mut task = Task::SetFormValue {
            doc: DocId::new(1),
            field: "Anrede".into(),
            value: "Frau".into(),
            done: Some(Completion::new()),
        };
        assert!(task.take_completion().is_some());
        assert!(task.take_completion().is_none());
    }

    #[test]
    fn test_doc_targets() {
        assert_eq!(
            Task::ProcessDocument { doc: DocId::new(7) }.doc(),
            Some(DocId::new(7))
        );
        assert_eq!(Task::NotifySenderListChanged.doc(), None);
    }
}
