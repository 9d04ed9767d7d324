//! # Dispatch router: command identifiers → handler objects.
//!
//! The [`Router`] maps the command of a parsed [`DispatchUrl`] to exactly
//! one registered [`DispatchHandler`] and keeps a per-command set of
//! [`StatusObserver`]s that mirror host dispatch-provider semantics.
//!
//! ## Rules
//! - **One handler per command**: registering again replaces the previous
//!   handler (reported as `HandlerReplaced`).
//! - **Unknown command** is "not handled" (`false`), never an error.
//! - **Handlers enqueue, never mutate**: a handler's `execute` is expected
//!   to construct and enqueue one task; dispatch itself touches no
//!   document state.
//! - **Observer identity**: status observers are deduplicated by `Arc`
//!   identity; registration immediately delivers one synthetic status so
//!   callers can initialize UI state.
//! - **No callbacks under the lock**: notification snapshots the observer
//!   set, releases the lock, invokes, then re-locks to drop failures.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::dispatch::url::{DispatchUrl, UrlError};
use crate::error::TaskError;
use crate::events::{Bus, Event, EventKind};
use crate::listeners::{Listener, ListenerSet};

/// Opaque key/value arguments handed along with a dispatch request.
///
/// The core never interprets them; they pass straight through to the
/// handler.
pub type Properties = Vec<(String, String)>;

/// Handles one dispatch command.
///
/// `execute` runs on whichever thread called [`Router::dispatch`] — for
/// queued dispatch requests that is the queue worker. It must not mutate
/// documents directly; it constructs and enqueues one task instead.
pub trait DispatchHandler: Send + Sync + 'static {
    /// Executes the command with its decoded argument and properties.
    fn execute(&self, argument: &str, properties: &Properties);
}

/// Status snapshot delivered to [`StatusObserver`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandStatus {
    /// The command the observer registered for.
    pub command: String,
    /// Whether a handler is currently registered for the command.
    pub enabled: bool,
}

/// Observes the availability of one dispatch command.
///
/// Returning an error unregisters the observer on the spot (it carries no
/// ownership of its caller, which may have become unreachable).
pub trait StatusObserver: Listener {
    /// Called with the current status: once synthetically on registration,
    /// then on every dispatch of the command.
    fn status_changed(&self, status: &CommandStatus) -> Result<(), TaskError>;
}

struct Inner {
    handlers: HashMap<String, Arc<dyn DispatchHandler>>,
    observers: HashMap<String, ListenerSet<dyn StatusObserver>>,
}

/// URL-style command router with per-command status observers.
pub struct Router {
    inner: Mutex<Inner>,
    bus: Bus,
}

impl Router {
    /// Creates an empty router publishing its diagnostics to `bus`.
    pub fn new(bus: Bus) -> Self {
        Self {
            inner: Mutex::new(Inner {
                handlers: HashMap::new(),
                observers: HashMap::new(),
            }),
            bus,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Associates `handler` with `command`, replacing any previous one.
    pub fn register(&self, command: impl Into<String>, handler: Arc<dyn DispatchHandler>) {
        let command = command.into();
        let replaced = self.lock().handlers.insert(command.clone(), handler);
        if replaced.is_some() {
            self.bus
                .publish(Event::new(EventKind::HandlerReplaced).with_command(command));
        }
    }

    /// Removes the handler for `command`; absent commands are a no-op.
    pub fn unregister(&self, command: &str) -> bool {
        self.lock().handlers.remove(command).is_some()
    }

    /// Parses `raw` into a [`DispatchUrl`] (resolution step of dispatch).
    pub fn resolve(&self, raw: &str) -> Result<DispatchUrl, UrlError> {
        DispatchUrl::parse(raw)
    }

    /// Returns the handler currently registered for `command`.
    pub fn handler(&self, command: &str) -> Option<Arc<dyn DispatchHandler>> {
        self.lock().handlers.get(command).cloned()
    }

    /// Resolves `raw` and invokes the registered handler.
    ///
    /// Returns `true` when a handler ran. Unknown commands and malformed
    /// URLs return `false` after publishing a diagnostic event — expected
    /// dispatch-provider behavior, not an error. Status observers for the
    /// command are notified either way.
    pub fn dispatch(&self, raw: &str, properties: &Properties) -> bool {
        let url = match self.resolve(raw) {
            Ok(url) => url,
            Err(err) => {
                self.bus.publish(
                    Event::new(EventKind::DispatchParseFailed).with_reason(err.to_string()),
                );
                return false;
            }
        };
        if url.decode_failed() {
            self.bus.publish(
                Event::new(EventKind::ArgumentDecodeFailed)
                    .with_command(url.command.clone())
                    .with_reason(raw.to_string()),
            );
        }

        let handler = self.handler(&url.command);
        self.notify_observers(&url.command, handler.is_some());

        match handler {
            Some(handler) => {
                handler.execute(&url.argument, properties);
                self.bus
                    .publish(Event::new(EventKind::CommandDispatched).with_command(url.command));
                true
            }
            None => {
                self.bus
                    .publish(Event::new(EventKind::CommandUnhandled).with_command(url.command));
                false
            }
        }
    }

    /// Registers a status observer for the command in `raw`.
    ///
    /// Deduplicated by identity (a second registration of the same object
    /// is a no-op). The observer is immediately sent one synthetic status
    /// reflecting whether a handler is currently registered. Returns `true`
    /// when the observer was newly added.
    pub fn add_status_observer(&self, observer: Arc<dyn StatusObserver>, raw: &str) -> bool {
        let url = match self.resolve(raw) {
            Ok(url) => url,
            Err(err) => {
                self.bus.publish(
                    Event::new(EventKind::DispatchParseFailed).with_reason(err.to_string()),
                );
                return false;
            }
        };

        let (added, enabled) = {
            let mut inner = self.lock();
            let enabled = inner.handlers.contains_key(&url.command);
            let added = inner
                .observers
                .entry(url.command.clone())
                .or_default()
                .add(observer.clone());
            (added, enabled)
        };
        if !added {
            return false;
        }

        // Synthetic initial notification, outside the lock.
        let status = CommandStatus {
            command: url.command.clone(),
            enabled,
        };
        if let Err(err) = observer.status_changed(&status) {
            let mut inner = self.lock();
            if let Some(set) = inner.observers.get_mut(&url.command) {
                set.remove(&observer);
            }
            drop(inner);
            self.bus.publish(
                Event::new(EventKind::ObserverFailed)
                    .with_command(url.command)
                    .with_listener(observer.name())
                    .with_reason(err.to_string()),
            );
            return false;
        }
        true
    }

    /// Deregisters a status observer by identity; a no-op if absent.
    pub fn remove_status_observer(&self, observer: &Arc<dyn StatusObserver>, raw: &str) -> bool {
        let url = match self.resolve(raw) {
            Ok(url) => url,
            Err(_) => return false,
        };
        let mut inner = self.lock();
        match inner.observers.get_mut(&url.command) {
            Some(set) => set.remove(observer),
            None => false,
        }
    }

    /// Notifies the observers of `command`, dropping the ones that fail.
    fn notify_observers(&self, command: &str, enabled: bool) {
        let snapshot = {
            let mut inner = self.lock();
            match inner.observers.get_mut(command) {
                Some(set) => set.snapshot(),
                None => return,
            }
        };
        let status = CommandStatus {
            command: command.to_string(),
            enabled,
        };

        let mut failed = Vec::new();
        for observer in &snapshot {
            if let Err(err) = observer.status_changed(&status) {
                failed.push((observer.clone(), err));
            }
        }
        if failed.is_empty() {
            return;
        }

        {
            let mut inner = self.lock();
            if let Some(set) = inner.observers.get_mut(command) {
                for (observer, _) in &failed {
                    set.remove(observer);
                }
            }
        }
        for (observer, err) in failed {
            self.bus.publish(
                Event::new(EventKind::ObserverFailed)
                    .with_command(command.to_string())
                    .with_listener(observer.name())
                    .with_reason(err.to_string()),
            );
        }
    }
}
