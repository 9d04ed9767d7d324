use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::dispatch::Router;
use crate::engine::Engine;
use crate::events::Bus;
use crate::host::{DocumentHost, ValueCache};
use crate::print::PrintFunction;
use crate::queue::{EventQueue, Worker};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Assembles an [`Engine`].
///
/// Print functions and event subscribers are fixed at build time; command
/// handlers and listeners stay dynamic through the running engine.
pub struct EngineBuilder {
    config: Config,
    print_functions: Vec<PrintFunction>,
    subscribers: Vec<Arc<dyn Subscribe>>,
    host: Option<Arc<dyn DocumentHost>>,
    cache: Option<Arc<dyn ValueCache>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
            print_functions: Vec::new(),
            subscribers: Vec::new(),
            host: None,
            cache: None,
        }
    }

    pub fn with_config(mut self, config: Config) -> Self {
        self.config = config;
        self
    }

    /// Registers a print function. A later registration with the same
    /// name replaces the earlier one.
    pub fn print_function(mut self, function: PrintFunction) -> Self {
        self.print_functions.push(function);
        self
    }

    pub fn subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    pub fn host(mut self, host: Arc<dyn DocumentHost>) -> Self {
        self.host = Some(host);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn ValueCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Builds the engine and spawns its worker. Must be called from
    /// within a Tokio runtime.
    pub fn build(self) -> Engine {
        let bus = Bus::new(self.config.bus_capacity_clamped());
        let (queue, rx) = EventQueue::new(bus.clone());
        let router = Arc::new(Router::new(bus.clone()));
        let token = CancellationToken::new();

        let mut functions = HashMap::new();
        for function in self.print_functions {
            functions.insert(function.name().to_string(), function);
        }

        let worker = Worker::new(
            rx,
            token.clone(),
            bus.clone(),
            queue.clone(),
            self.config.clone(),
            router.clone(),
            functions,
            self.host,
            self.cache,
        );
        let worker = tokio::spawn(worker.run());

        let forward_token = CancellationToken::new();
        let forwarder = if self.subscribers.is_empty() {
            None
        } else {
            let set = SubscriberSet::new(self.subscribers, bus.clone());
            let mut events = bus.subscribe();
            let stop = forward_token.clone();
            Some(tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = stop.cancelled() => break,
                        recv = events.recv() => match recv {
                            Ok(event) => set.emit(&event),
                            Err(RecvError::Lagged(_)) => continue,
                            Err(RecvError::Closed) => break,
                        },
                    }
                }
                // Flush what the bus already buffered before stopping.
                while let Ok(event) = events.try_recv() {
                    set.emit(&event);
                }
                set.shutdown().await;
            }))
        };

        Engine {
            config: self.config,
            bus,
            queue,
            router,
            token,
            forward_token,
            worker: Mutex::new(Some(worker)),
            forwarder: Mutex::new(forwarder),
        }
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}
