//! # Queue worker: the single consumer.
//!
//! One worker task owns the registry, the listener sets and the host
//! handle. Every mutation runs here, one task at a time, in enqueue
//! order. That single-consumer discipline is what makes the rest of the
//! crate lock-free about document state.
//!
//! ## Rules
//! - **Nothing is fatal**: a task that fails or panics is reported on the
//!   bus and the loop moves on.
//! - **Completions always fire**: the latch is taken off the task before
//!   execution and satisfied afterwards, panic or not.
//! - **Drain on shutdown**: cancellation closes the channel; tasks already
//!   enqueued still run, then `QueueDrained` is published.

use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc::UnboundedReceiver;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::Router;
use crate::error::{panic_message, TaskError};
use crate::events::{Bus, Event, EventKind};
use crate::host::{DocumentHost, ValueCache};
use crate::listeners::{ListenerSet, ProcessingListener, SenderListListener};
use crate::print::{PrintContext, PrintFunction, PrintScheduler};
use crate::queue::task::{PrintAction, Task};
use crate::queue::EventQueue;
use crate::registry::{DocId, DocRegistry, DocState, Observed};

tokio::task_local! {
    static ON_WORKER: bool;
}

/// Whether the current task is the queue worker.
pub(crate) fn on_worker() -> bool {
    ON_WORKER.try_with(|v| *v).unwrap_or(false)
}

pub(crate) struct Worker {
    rx: UnboundedReceiver<Task>,
    token: CancellationToken,
    bus: Bus,
    queue: EventQueue,
    config: Config,
    registry: DocRegistry,
    // Insert values that arrived before their document was first observed.
    // Drained into the record on observation, dropped on close.
    parked_inserts: HashMap<DocId, Vec<(String, String)>>,
    router: Arc<Router>,
    scheduler: PrintScheduler,
    print_functions: HashMap<String, PrintFunction>,
    processing: ListenerSet<dyn ProcessingListener>,
    senders: ListenerSet<dyn SenderListListener>,
    host: Option<Arc<dyn DocumentHost>>,
    cache: Option<Arc<dyn ValueCache>>,
}

impl Worker {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        rx: UnboundedReceiver<Task>,
        token: CancellationToken,
        bus: Bus,
        queue: EventQueue,
        config: Config,
        router: Arc<Router>,
        print_functions: HashMap<String, PrintFunction>,
        host: Option<Arc<dyn DocumentHost>>,
        cache: Option<Arc<dyn ValueCache>>,
    ) -> Self {
        let scheduler = PrintScheduler::new(config.print_concurrency_limit(), bus.clone());
        Self {
            rx,
            token,
            bus,
            queue,
            config,
            registry: DocRegistry::new(),
            parked_inserts: HashMap::new(),
            router,
            scheduler,
            print_functions,
            processing: ListenerSet::new(),
            senders: ListenerSet::new(),
            host,
            cache,
        }
    }

    /// Runs the consume loop until cancellation drained the queue.
    pub(crate) async fn run(mut self) {
        ON_WORKER
            .scope(true, async move {
                self.consume().await;
            })
            .await;
    }

    async fn consume(&mut self) {
        let mut closing = false;
        loop {
            tokio::select! {
                _ = self.token.cancelled(), if !closing => {
                    // Stop accepting; whatever is already queued still runs.
                    self.rx.close();
                    closing = true;
                }
                task = self.rx.recv() => match task {
                    Some(task) => self.run_task(task),
                    None => break,
                },
            }
        }
        self.bus.publish(Event::new(EventKind::QueueDrained));
    }

    fn run_task(&mut self, mut task: Task) {
        let label = task.label();
        let doc = task.doc();
        let done = task.take_completion();

        let outcome = catch_unwind(AssertUnwindSafe(|| self.execute(task)));
        if let Some(done) = &done {
            done.satisfy();
        }

        let mut event = match outcome {
            Ok(Ok(())) => Event::new(EventKind::TaskExecuted),
            Ok(Err(err)) => Event::new(EventKind::TaskFailed).with_reason(err.to_string()),
            Err(payload) => {
                Event::new(EventKind::TaskPanicked).with_reason(panic_message(payload.as_ref()))
            }
        }
        .with_task(label);
        if let Some(doc) = doc {
            event = event.with_doc(doc);
        }
        self.bus.publish(event);
    }

    fn execute(&mut self, task: Task) -> Result<(), TaskError> {
        match task {
            Task::SetFormValue {
                doc, field, value, ..
            } => self.set_form_value(doc, field, value),
            Task::SetInsertValues { doc, values, .. } => self.set_insert_values(doc, values),
            Task::ProcessDocument { doc } => self.process_document(doc),
            Task::DocumentClosed { doc } => self.document_closed(doc),
            Task::ManagePrintFunction { doc, name, action } => {
                self.manage_print_function(doc, name, action)
            }
            Task::RunPrintFunctions { doc } => self.run_print_functions(doc),
            Task::NotifySenderListChanged => self.notify_sender_list_changed(),
            Task::DispatchCommand { url, properties } => {
                self.router.dispatch(&url, &properties);
                Ok(())
            }
            Task::AddProcessingListener { listener } => {
                self.processing.add(listener);
                Ok(())
            }
            Task::RemoveProcessingListener { listener } => {
                self.processing.remove(&listener);
                Ok(())
            }
            Task::AddSenderListListener {
                listener,
                expected_hash,
            } => self.add_sender_list_listener(listener, expected_hash),
            Task::RemoveSenderListListener { listener } => {
                self.senders.remove(&listener);
                Ok(())
            }
        }
    }

    fn set_form_value(&mut self, doc: DocId, field: String, value: String) -> Result<(), TaskError> {
        match self.registry.get_mut(doc) {
            Some(record) => {
                record.form_values.insert(field.clone(), value.clone());
            }
            None => {
                self.stale(doc);
                return Ok(());
            }
        }
        if let Some(host) = &self.host {
            host.set_form_value(doc, &field, &value)?;
        }
        Ok(())
    }

    fn set_insert_values(
        &mut self,
        doc: DocId,
        values: Vec<(String, String)>,
    ) -> Result<(), TaskError> {
        let state = match self.registry.get(doc) {
            Some(record) => record.state(),
            None => {
                // The host has not reported this document yet; hold the
                // values until it is first observed.
                self.parked_inserts.entry(doc).or_default().extend(values);
                return Ok(());
            }
        };
        match state {
            DocState::Processed => self.apply_insert_values(doc, values),
            // Not processed yet: park the batch on the record, it is
            // applied on processing.
            _ => {
                if let Some(record) = self.registry.get_mut(doc) {
                    record.pending_inserts.extend(values);
                }
                Ok(())
            }
        }
    }

    fn apply_insert_values(
        &mut self,
        doc: DocId,
        values: Vec<(String, String)>,
    ) -> Result<(), TaskError> {
        if let Some(record) = self.registry.get_mut(doc) {
            for (name, value) in &values {
                record.insert_values.insert(name.clone(), value.clone());
            }
        }
        let mut first_err = None;
        if let Some(host) = &self.host {
            for (name, value) in &values {
                if let Err(err) = host.set_insert_value(doc, name, value) {
                    first_err.get_or_insert(err);
                }
            }
        }
        match first_err {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn process_document(&mut self, doc: DocId) -> Result<(), TaskError> {
        match self.registry.observe(doc) {
            Observed::AlreadySeen => Ok(()),
            Observed::First => {
                self.bus
                    .publish(Event::new(EventKind::DocumentRegistered).with_doc(doc));

                if let Some(parked) = self.parked_inserts.remove(&doc) {
                    if let Some(record) = self.registry.get_mut(doc) {
                        record.pending_inserts.extend(parked);
                    }
                }
                let pending: Vec<(String, String)> = self
                    .registry
                    .get_mut(doc)
                    .map(|record| record.pending_inserts.drain().collect())
                    .unwrap_or_default();
                let result = self.apply_insert_values(doc, pending);

                self.registry.mark_processed(doc);
                self.bus
                    .publish(Event::new(EventKind::DocumentProcessed).with_doc(doc));

                let dropped = self.processing.notify(|l| l.on_processed(doc));
                self.report_dropped_listeners(dropped);
                result
            }
        }
    }

    fn document_closed(&mut self, doc: DocId) -> Result<(), TaskError> {
        self.parked_inserts.remove(&doc);
        if self.registry.forget(doc).is_none() {
            self.stale(doc);
            return Ok(());
        }
        self.bus
            .publish(Event::new(EventKind::DocumentClosed).with_doc(doc));
        let dropped = self.processing.notify(|l| l.on_closed(doc));
        self.report_dropped_listeners(dropped);
        Ok(())
    }

    fn manage_print_function(
        &mut self,
        doc: DocId,
        name: String,
        action: PrintAction,
    ) -> Result<(), TaskError> {
        if self.registry.get(doc).is_none() {
            self.stale(doc);
            return Ok(());
        }
        let (changed, kind) = match action {
            PrintAction::Attach => (
                self.registry.attach(doc, &name),
                EventKind::PrintFunctionAttached,
            ),
            PrintAction::Detach => (
                self.registry.detach(doc, &name),
                EventKind::PrintFunctionDetached,
            ),
        };
        // Idempotent re-attach/detach of a non-member changes nothing and
        // reports nothing.
        if changed {
            self.bus
                .publish(Event::new(kind).with_doc(doc).with_function(name));
        }
        Ok(())
    }

    fn run_print_functions(&mut self, doc: DocId) -> Result<(), TaskError> {
        let Some(record) = self.registry.get(doc) else {
            self.stale(doc);
            return Ok(());
        };

        let mut batch = Vec::new();
        let mut skipped = Vec::new();
        for name in &record.print_functions {
            match self.print_functions.get(name) {
                Some(function) => batch.push(function.clone()),
                None => skipped.push(name.clone()),
            }
        }
        for name in skipped {
            self.bus.publish(
                Event::new(EventKind::PrintFunctionSkipped)
                    .with_doc(doc)
                    .with_function(name),
            );
        }
        if batch.is_empty() {
            return Ok(());
        }
        batch.sort();

        // The driver runs off-worker so functions can enqueue mutations
        // back into this queue.
        let queue = self.queue.clone();
        let wait_timeout = self.config.wait_timeout();
        let invocation = self.token.child_token();
        let factory = move |doc| {
            PrintContext::new(doc, queue.clone(), wait_timeout, invocation.child_token())
        };
        let _driver = self
            .scheduler
            .run(doc, batch, factory, self.token.child_token());
        Ok(())
    }

    fn notify_sender_list_changed(&mut self) -> Result<(), TaskError> {
        let dropped = self.senders.notify(|l| l.on_sender_list_changed());
        self.report_dropped_listeners(dropped);
        self.bus.publish(Event::new(EventKind::SenderListChanged));
        if let Some(cache) = &self.cache {
            if let Err(err) = cache.save() {
                self.bus.publish(
                    Event::new(EventKind::CacheSaveFailed).with_reason(err.to_string()),
                );
            }
        }
        Ok(())
    }

    fn add_sender_list_listener(
        &mut self,
        listener: Arc<dyn SenderListListener>,
        expected_hash: Option<u64>,
    ) -> Result<(), TaskError> {
        if let (Some(expected), Some(actual)) = (expected_hash, self.config.config_hash) {
            if expected != actual {
                self.bus.publish(
                    Event::new(EventKind::ConfigHashMismatch)
                        .with_listener(listener.name())
                        .with_reason(format!("expected {expected}, have {actual}")),
                );
            }
        }
        self.senders.add(listener);
        Ok(())
    }

    fn report_dropped_listeners(&self, dropped: Vec<(&'static str, TaskError)>) {
        for (name, err) in dropped {
            self.bus.publish(
                Event::new(EventKind::ListenerFailed)
                    .with_listener(name)
                    .with_reason(err.to_string()),
            );
        }
    }

    fn stale(&self, doc: DocId) {
        self.bus
            .publish(Event::new(EventKind::StaleDocument).with_doc(doc));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::listeners::Listener;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::broadcast::Receiver;

    fn spawn_worker() -> (EventQueue, CancellationToken, Receiver<Event>, Bus) {
        let bus = Bus::new(256);
        let (queue, rx) = EventQueue::new(bus.clone());
        let token = CancellationToken::new();
        let router = Arc::new(Router::new(bus.clone()));
        let worker = Worker::new(
            rx,
            token.clone(),
            bus.clone(),
            queue.clone(),
            Config::default(),
            router,
            HashMap::new(),
            None,
            None,
        );
        let events = bus.subscribe();
        tokio::spawn(worker.run());
        (queue, token, events, bus)
    }

    fn spawn_worker_with_host(
        host: Arc<dyn DocumentHost>,
    ) -> (EventQueue, CancellationToken, Receiver<Event>) {
        let bus = Bus::new(256);
        let (queue, rx) = EventQueue::new(bus.clone());
        let token = CancellationToken::new();
        let worker = Worker::new(
            rx,
            token.clone(),
            bus.clone(),
            queue.clone(),
            Config::default(),
            Arc::new(Router::new(bus.clone())),
            HashMap::new(),
            Some(host),
            None,
        );
        let events = bus.subscribe();
        tokio::spawn(worker.run());
        (queue, token, events)
    }

    async fn drain(token: CancellationToken, events: &mut Receiver<Event>) -> Vec<Event> {
        token.cancel();
        let mut seen = Vec::new();
        loop {
            let event = tokio::time::timeout(Duration::from_secs(5), events.recv())
                .await
                .unwrap()
                .unwrap();
            let last = event.kind == EventKind::QueueDrained;
            seen.push(event);
            if last {
                return seen;
            }
        }
    }

    struct RecordingHost {
        inserts: std::sync::Mutex<Vec<(String, String)>>,
    }

    impl RecordingHost {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inserts: std::sync::Mutex::new(Vec::new()),
            })
        }
    }

    impl DocumentHost for RecordingHost {
        fn set_form_value(&self, _doc: DocId, _field: &str, _value: &str) -> Result<(), TaskError> {
            Ok(())
        }
        fn set_insert_value(&self, _doc: DocId, name: &str, value: &str) -> Result<(), TaskError> {
            self.inserts
                .lock()
                .unwrap()
                .push((name.to_string(), value.to_string()));
            Ok(())
        }
    }

    struct PanickingListener;

    impl Listener for PanickingListener {
        fn name(&self) -> &'static str {
            "panicking"
        }
    }

    impl ProcessingListener for PanickingListener {
        fn on_processed(&self, _doc: DocId) -> Result<(), TaskError> {
            panic!("listener exploded");
        }
    }

    struct CountingListener {
        processed: AtomicUsize,
        closed: AtomicUsize,
    }

    impl CountingListener {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                processed: AtomicUsize::new(0),
                closed: AtomicUsize::new(0),
            })
        }
    }

    impl Listener for CountingListener {
        fn name(&self) -> &'static str {
            "counting"
        }
    }

    impl ProcessingListener for CountingListener {
        fn on_processed(&self, _doc: DocId) -> Result<(), TaskError> {
            self.processed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn on_closed(&self, _doc: DocId) -> Result<(), TaskError> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_process_document_registers_then_processes_once() {
        let (queue, token, mut events, _bus) = spawn_worker();
        let doc = DocId::new(1);
        queue.enqueue(Task::ProcessDocument { doc });
        queue.enqueue(Task::ProcessDocument { doc });

        let seen = drain(token, &mut events).await;
        let registered = seen
            .iter()
            .filter(|e| e.kind == EventKind::DocumentRegistered)
            .count();
        let processed = seen
            .iter()
            .filter(|e| e.kind == EventKind::DocumentProcessed)
            .count();
        assert_eq!(registered, 1);
        assert_eq!(processed, 1);
    }

    #[tokio::test]
    async fn test_mutation_on_unknown_document_is_stale_noop() {
        let (queue, token, mut events, _bus) = spawn_worker();
        queue.enqueue(Task::SetFormValue {
            doc: DocId::new(9),
            field: "Betreff".into(),
            value: "Mahnung".into(),
            done: None,
        });

        let seen = drain(token, &mut events).await;
        assert!(seen.iter().any(|e| e.kind == EventKind::StaleDocument));
        // The task itself still counts as executed.
        assert!(seen.iter().any(|e| e.kind == EventKind::TaskExecuted));
    }

    #[tokio::test]
    async fn test_panicking_listener_does_not_kill_the_worker() {
        let (queue, token, mut events, _bus) = spawn_worker();
        queue.enqueue(Task::AddProcessingListener {
            listener: Arc::new(PanickingListener),
        });
        queue.enqueue(Task::ProcessDocument { doc: DocId::new(1) });
        // Worker survives and keeps serving tasks.
        queue.enqueue(Task::ProcessDocument { doc: DocId::new(2) });

        let seen = drain(token, &mut events).await;
        assert!(seen.iter().any(|e| e.kind == EventKind::TaskPanicked));
        let processed = seen
            .iter()
            .filter(|e| e.kind == EventKind::DocumentProcessed)
            .count();
        assert_eq!(processed, 2);
    }

    #[tokio::test]
    async fn test_closed_document_notifies_and_forgets() {
        let (queue, token, mut events, _bus) = spawn_worker();
        let listener = CountingListener::new();
        let doc = DocId::new(4);
        queue.enqueue(Task::AddProcessingListener {
            listener: listener.clone(),
        });
        queue.enqueue(Task::ProcessDocument { doc });
        queue.enqueue(Task::DocumentClosed { doc });
        // A mutation after close is stale.
        queue.enqueue(Task::SetFormValue {
            doc,
            field: "Anrede".into(),
            value: "Herr".into(),
            done: None,
        });

        let seen = drain(token, &mut events).await;
        assert_eq!(listener.processed.load(Ordering::SeqCst), 1);
        assert_eq!(listener.closed.load(Ordering::SeqCst), 1);
        assert!(seen.iter().any(|e| e.kind == EventKind::DocumentClosed));
        assert!(seen.iter().any(|e| e.kind == EventKind::StaleDocument));
    }

    #[tokio::test]
    async fn test_insert_values_park_until_processed() {
        let host = RecordingHost::new();
        let (queue, token, mut events) = spawn_worker_with_host(host.clone());
        let doc = DocId::new(5);
        // The batch arrives before the host has reported the document.
        queue.enqueue(Task::SetInsertValues {
            doc,
            values: vec![("Absender".into(), "Beispiel GmbH".into())],
            done: None,
        });
        queue.enqueue(Task::ProcessDocument { doc });

        let seen = drain(token, &mut events).await;
        assert!(seen.iter().all(|e| e.kind != EventKind::StaleDocument));
        assert_eq!(
            *host.inserts.lock().unwrap(),
            vec![("Absender".to_string(), "Beispiel GmbH".to_string())]
        );
    }

    #[tokio::test]
    async fn test_parked_insert_values_dropped_on_close() {
        let host = RecordingHost::new();
        let (queue, token, mut events) = spawn_worker_with_host(host.clone());
        let doc = DocId::new(6);
        queue.enqueue(Task::SetInsertValues {
            doc,
            values: vec![("Absender".into(), "Beispiel GmbH".into())],
            done: None,
        });
        queue.enqueue(Task::DocumentClosed { doc });
        // A later registration starts clean, the parked batch is gone.
        queue.enqueue(Task::ProcessDocument { doc });

        drain(token, &mut events).await;
        assert!(host.inserts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_completion_satisfied_even_for_stale_document() {
        let (queue, token, mut events, _bus) = spawn_worker();
        let done = crate::queue::Completion::new();
        queue.enqueue(Task::SetFormValue {
            doc: DocId::new(11),
            field: "x".into(),
            value: "y".into(),
            done: Some(done.clone()),
        });

        drain(token, &mut events).await;
        assert!(done.is_satisfied());
    }

    #[tokio::test]
    async fn test_sender_list_hash_mismatch_is_reported_but_added() {
        struct SenderCounter(AtomicUsize);
        impl Listener for SenderCounter {
            fn name(&self) -> &'static str {
                "sender-counter"
            }
        }
        impl SenderListListener for SenderCounter {
            fn on_sender_list_changed(&self) -> Result<(), TaskError> {
                self.0.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }

        let bus = Bus::new(256);
        let (queue, rx) = EventQueue::new(bus.clone());
        let token = CancellationToken::new();
        let config = Config {
            config_hash: Some(42),
            ..Config::default()
        };
        let worker = Worker::new(
            rx,
            token.clone(),
            bus.clone(),
            queue.clone(),
            config,
            Arc::new(Router::new(bus.clone())),
            HashMap::new(),
            None,
            None,
        );
        let mut events = bus.subscribe();
        tokio::spawn(worker.run());

        let counter = Arc::new(SenderCounter(AtomicUsize::new(0)));
        queue.enqueue(Task::AddSenderListListener {
            listener: counter.clone(),
            expected_hash: Some(7),
        });
        queue.enqueue(Task::NotifySenderListChanged);

        let seen = drain(token, &mut events).await;
        assert!(seen.iter().any(|e| e.kind == EventKind::ConfigHashMismatch));
        assert_eq!(counter.0.load(Ordering::SeqCst), 1);
    }
}
