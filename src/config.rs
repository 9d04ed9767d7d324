//! # Global runtime configuration.
//!
//! Provides [`Config`], the centralized settings for an [`Engine`](crate::Engine).
//!
//! ## Sentinel values
//! - `wait_timeout = 0s` → synchronous waits block forever (no safety valve)
//! - `grace = 0s` → shutdown waits forever for the worker to drain
//! - `max_print_concurrent = 0` → unlimited (no semaphore created)
//!
//! Prefer the helper accessors over raw field reads to avoid sprinkling
//! sentinel checks across the codebase.

use std::time::Duration;

/// Global configuration for the formwork engine.
///
/// ## Field semantics
/// - `wait_timeout`: upper bound on sync-bridge waits (`0s` = unbounded)
/// - `grace`: maximum wait for the queue to drain on shutdown (`0s` = unbounded)
/// - `max_print_concurrent`: print-function concurrency cap (`0` = unlimited)
/// - `bus_capacity`: event bus ring buffer size (min 1; clamped)
/// - `config_hash`: identity hash of the running configuration, compared
///   against the hash a sender-list listener expects (`None` = no checking)
#[derive(Clone, Debug)]
pub struct Config {
    /// Maximum time a synchronous caller waits for its task to be applied.
    ///
    /// A buggy task body must not hang every synchronous caller forever;
    /// this bound makes such a hang observable instead. `Duration::ZERO`
    /// disables the bound.
    pub wait_timeout: Duration,

    /// Maximum time [`Engine::shutdown`](crate::Engine::shutdown) waits for
    /// the worker to finish draining already-enqueued tasks.
    pub grace: Duration,

    /// Maximum number of print functions computing concurrently.
    ///
    /// - `0` = unlimited (no semaphore)
    /// - `n > 0` = at most `n` functions run simultaneously
    ///
    /// Their document-mutating calls are serialized through the event queue
    /// regardless of this setting.
    pub max_print_concurrent: usize,

    /// Capacity of the event bus broadcast ring buffer.
    ///
    /// Subscribers that lag behind more than `bus_capacity` events skip the
    /// oldest items. Minimum value is 1 (enforced by the bus).
    pub bus_capacity: usize,

    /// Hash of the configuration this engine instance was built from.
    ///
    /// Macro callers may pass an expected hash when registering a
    /// sender-list listener; a mismatch surfaces a warning event instead of
    /// silently proceeding against a foreign configuration.
    pub config_hash: Option<u64>,
}

impl Config {
    /// Returns the sync-bridge wait bound as an `Option`.
    ///
    /// - `None` → wait forever
    /// - `Some(d)` → give up after `d`
    #[inline]
    pub fn wait_timeout(&self) -> Option<Duration> {
        if self.wait_timeout == Duration::ZERO {
            None
        } else {
            Some(self.wait_timeout)
        }
    }

    /// Returns the shutdown grace bound as an `Option`.
    #[inline]
    pub fn grace(&self) -> Option<Duration> {
        if self.grace == Duration::ZERO {
            None
        } else {
            Some(self.grace)
        }
    }

    /// Returns the print-function concurrency limit as an `Option`.
    ///
    /// - `None` → unlimited (no semaphore)
    /// - `Some(n)` → at most `n` concurrent functions
    #[inline]
    pub fn print_concurrency_limit(&self) -> Option<usize> {
        if self.max_print_concurrent == 0 {
            None
        } else {
            Some(self.max_print_concurrent)
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `wait_timeout = 30s` (bounded sync waits)
    /// - `grace = 30s` (bounded shutdown drain)
    /// - `max_print_concurrent = 0` (unlimited)
    /// - `bus_capacity = 1024`
    /// - `config_hash = None` (no identity checking)
    fn default() -> Self {
        Self {
            wait_timeout: Duration::from_secs(30),
            grace: Duration::from_secs(30),
            max_print_concurrent: 0,
            bus_capacity: 1024,
            config_hash: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels_map_to_none() {
        let cfg = Config {
            wait_timeout: Duration::ZERO,
            grace: Duration::ZERO,
            max_print_concurrent: 0,
            ..Config::default()
        };
        assert_eq!(cfg.wait_timeout(), None);
        assert_eq!(cfg.grace(), None);
        assert_eq!(cfg.print_concurrency_limit(), None);
    }

    #[test]
    fn test_non_sentinels_pass_through() {
        let cfg = Config {
            wait_timeout: Duration::from_secs(5),
            grace: Duration::from_secs(7),
            max_print_concurrent: 3,
            ..Config::default()
        };
        assert_eq!(cfg.wait_timeout(), Some(Duration::from_secs(5)));
        assert_eq!(cfg.grace(), Some(Duration::from_secs(7)));
        assert_eq!(cfg.print_concurrency_limit(), Some(3));
    }

    #[test]
    fn test_bus_capacity_clamped() {
        let cfg = Config {
            bus_capacity: 0,
            ..Config::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
    }
}
