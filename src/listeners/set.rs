//! # Self-healing listener collection.
//!
//! [`ListenerSet`] stores external callback objects and notifies them while
//! tolerating failures: a listener whose callback returns an error is
//! unregistered and the remaining listeners are still notified.
//!
//! ## Rules
//! - **Identity semantics**: listeners are deduplicated and removed by
//!   `Arc` pointer identity, not by value.
//! - **Snapshot iteration**: notification walks a snapshot of the set;
//!   removals are collected during the walk and applied after it, so a
//!   callback can never invalidate the iteration.
//! - **Single-threaded**: the set has no interior locking; it is owned by
//!   the queue worker (or wrapped in a mutex by the router).

use std::sync::Arc;

use crate::error::TaskError;
use crate::listeners::Listener;

/// Ordered collection of listeners with identity dedup and self-healing
/// notification.
pub struct ListenerSet<L: Listener + ?Sized> {
    entries: Vec<Arc<L>>,
}

impl<L: Listener + ?Sized> ListenerSet<L> {
    /// Creates an empty set.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Adds a listener; registering the same object twice is a no-op.
    ///
    /// Returns `true` when the listener was actually added.
    pub fn add(&mut self, listener: Arc<L>) -> bool {
        if self.contains(&listener) {
            return false;
        }
        self.entries.push(listener);
        true
    }

    /// Removes a listener by identity; absent listeners are a no-op.
    ///
    /// Returns `true` when something was removed.
    pub fn remove(&mut self, listener: &Arc<L>) -> bool {
        let before = self.entries.len();
        self.entries.retain(|l| !Arc::ptr_eq(l, listener));
        self.entries.len() != before
    }

    /// True when `listener` (by identity) is registered.
    pub fn contains(&self, listener: &Arc<L>) -> bool {
        self.entries.iter().any(|l| Arc::ptr_eq(l, listener))
    }

    /// Returns a snapshot of the current entries.
    pub fn snapshot(&self) -> Vec<Arc<L>> {
        self.entries.clone()
    }

    /// Notifies every listener via `call`, unregistering the ones that fail.
    ///
    /// Iterates a snapshot; failed listeners are removed after the loop.
    /// Returns `(name, error)` for each listener that was dropped so the
    /// caller can report them.
    pub fn notify<C>(&mut self, mut call: C) -> Vec<(&'static str, TaskError)>
    where
        C: FnMut(&L) -> Result<(), TaskError>,
    {
        let snapshot = self.snapshot();
        let mut failed = Vec::new();

        for listener in &snapshot {
            if let Err(err) = call(listener.as_ref()) {
                failed.push((listener.clone(), err));
            }
        }
        for (listener, _) in &failed {
            self.remove(listener);
        }
        failed
            .into_iter()
            .map(|(listener, err)| (listener.name(), err))
            .collect()
    }

    /// Number of registered listeners.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when no listener is registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<L: Listener + ?Sized> Default for ListenerSet<L> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Probe {
        calls: AtomicUsize,
        fail_on: Option<usize>,
    }

    impl Probe {
        fn new(fail_on: Option<usize>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                fail_on,
            })
        }

        fn poke(&self) -> Result<(), TaskError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.fail_on {
                Some(bad) if bad == n => Err(TaskError::fail("listener broke")),
                _ => Ok(()),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Listener for Probe {
        fn name(&self) -> &'static str {
            "probe"
        }
    }

    #[test]
    fn test_add_dedups_by_identity() {
        let mut set: ListenerSet<Probe> = ListenerSet::new();
        let a = Probe::new(None);

        assert!(set.add(a.clone()));
        assert!(!set.add(a.clone()));
        assert_eq!(set.len(), 1);

        // A distinct instance with equal contents is a different identity.
        assert!(set.add(Probe::new(None)));
        assert_eq!(set.len(), 2);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut set: ListenerSet<Probe> = ListenerSet::new();
        let a = Probe::new(None);
        assert!(!set.remove(&a));
        set.add(a.clone());
        assert!(set.remove(&a));
        assert!(!set.remove(&a));
    }

    #[test]
    fn test_failing_listener_removed_others_survive() {
        let mut set: ListenerSet<Probe> = ListenerSet::new();
        let healthy = Probe::new(None);
        let broken = Probe::new(Some(1));
        set.add(healthy.clone());
        set.add(broken.clone());

        let dropped = set.notify(|l| l.poke());
        assert_eq!(dropped.len(), 1);
        assert_eq!(dropped[0].0, "probe");
        assert_eq!(set.len(), 1);
        assert!(set.contains(&healthy));
        assert!(!set.contains(&broken));

        // Subsequent notifications reach the survivor only.
        let dropped = set.notify(|l| l.poke());
        assert!(dropped.is_empty());
        assert_eq!(healthy.calls(), 2);
        assert_eq!(broken.calls(), 1);
    }
}
