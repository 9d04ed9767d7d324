//! # Print functions.
//!
//! A [`PrintFunction`] is a named, prioritized async callable the engine
//! can attach to documents. Functions are totally ordered by
//! `(priority, name)` so the order they start in is deterministic no
//! matter how they were registered.

use std::cmp::Ordering;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::{RuntimeError, TaskError};
use crate::queue::{Completion, EventQueue, Task};
use crate::registry::DocId;

/// The async body of a print function.
#[async_trait]
pub trait PrintFn: Send + Sync + 'static {
    async fn run(&self, ctx: PrintContext) -> Result<(), TaskError>;
}

/// Per-invocation context handed to a print function.
///
/// Mutations go back through the queue; the context's setters attach a
/// [`Completion`] and await it, so by the time they return the value is
/// applied (or the document reported stale).
#[derive(Clone)]
pub struct PrintContext {
    doc: DocId,
    queue: EventQueue,
    wait_timeout: Option<Duration>,
    cancel: CancellationToken,
}

impl PrintContext {
    pub(crate) fn new(
        doc: DocId,
        queue: EventQueue,
        wait_timeout: Option<Duration>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            doc,
            queue,
            wait_timeout,
            cancel,
        }
    }

    /// The document this invocation runs against.
    pub fn doc(&self) -> DocId {
        self.doc
    }

    /// Cancellation scope of this invocation; cancelled on shutdown.
    pub fn cancel_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Enqueues an arbitrary task without waiting on it.
    pub fn enqueue(&self, task: Task) {
        self.queue.enqueue(task);
    }

    /// Sets one form value and waits until the worker applied it.
    pub async fn set_form_value(
        &self,
        field: impl Into<String>,
        value: impl Into<String>,
    ) -> Result<(), RuntimeError> {
        let done = Completion::new();
        self.queue.enqueue(Task::SetFormValue {
            doc: self.doc,
            field: field.into(),
            value: value.into(),
            done: Some(done.clone()),
        });
        self.await_done(done).await
    }

    /// Sets a batch of insert values and waits until the worker ran the
    /// task. Before the document is processed the batch is parked, not
    /// applied, but the wait still completes.
    pub async fn set_insert_values(
        &self,
        values: Vec<(String, String)>,
    ) -> Result<(), RuntimeError> {
        let done = Completion::new();
        self.queue.enqueue(Task::SetInsertValues {
            doc: self.doc,
            values,
            done: Some(done.clone()),
        });
        self.await_done(done).await
    }

    async fn await_done(&self, done: Completion) -> Result<(), RuntimeError> {
        match self.wait_timeout {
            None => done.wait_async().await,
            Some(limit) => match tokio::time::timeout(limit, done.wait_async()).await {
                Ok(result) => result,
                Err(_) => Err(RuntimeError::WaitTimeout { waited: limit }),
            },
        }
    }
}

/// A named, prioritized print function.
///
/// Lower `priority` starts first; ties break on the name, so the order is
/// total. Equality follows the same `(priority, name)` key.
#[derive(Clone)]
pub struct PrintFunction {
    name: Arc<str>,
    priority: i32,
    call: Arc<dyn PrintFn>,
}

impl PrintFunction {
    pub fn new(name: impl Into<Arc<str>>, priority: i32, call: Arc<dyn PrintFn>) -> Self {
        Self {
            name: name.into(),
            priority,
            call,
        }
    }

    /// Wraps an async closure as a print function.
    pub fn from_fn<F, Fut>(name: impl Into<Arc<str>>, priority: i32, f: F) -> Self
    where
        F: Fn(PrintContext) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
    {
        struct Adapter<F>(F);

        #[async_trait]
        impl<F, Fut> PrintFn for Adapter<F>
        where
            F: Fn(PrintContext) -> Fut + Send + Sync + 'static,
            Fut: Future<Output = Result<(), TaskError>> + Send + 'static,
        {
            async fn run(&self, ctx: PrintContext) -> Result<(), TaskError> {
                (self.0)(ctx).await
            }
        }

        Self::new(name, priority, Arc::new(Adapter(f)))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub(crate) fn name_arc(&self) -> Arc<str> {
        self.name.clone()
    }

    pub(crate) fn handler(&self) -> Arc<dyn PrintFn> {
        self.call.clone()
    }
}

impl PartialEq for PrintFunction {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.name == other.name
    }
}

impl Eq for PrintFunction {}

impl PartialOrd for PrintFunction {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for PrintFunction {
    fn cmp(&self, other: &Self) -> Ordering {
        self.priority
            .cmp(&other.priority)
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl std::fmt::Debug for PrintFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrintFunction")
            .field("name", &self.name)
            .field("priority", &self.priority)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(name: &str, priority: i32) -> PrintFunction {
        PrintFunction::from_fn(name.to_string(), priority, |_ctx| async { Ok(()) })
    }

    #[test]
    fn test_order_is_priority_then_name() {
        let mut fns = vec![noop("b", 1), noop("a", 2), noop("a", 1)];
        fns.sort();
        let order: Vec<_> = fns.iter().map(|f| (f.priority(), f.name().to_string())).collect();
        assert_eq!(
            order,
            vec![(1, "a".into()), (1, "b".into()), (2, "a".into())]
        );
    }

    #[test]
    fn test_eq_on_priority_and_name() {
        assert_eq!(noop("a", 1), noop("a", 1));
        assert_ne!(noop("a", 1), noop("a", 2));
        assert_ne!(noop("a", 1), noop("b", 1));
    }
}
