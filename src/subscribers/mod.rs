//! # Event subscribers for the formwork engine.
//!
//! The engine forwards every bus event into a [`SubscriberSet`], which fans
//! out to user-provided [`Subscribe`] implementations through per-subscriber
//! bounded queues and workers. This is the crate's observability surface:
//! logging, metrics, auditing, and test probes all hang off it.
//!
//! ```text
//! worker/router/scheduler ── publish ──► Bus ──► engine forwarder
//!                                                     │
//!                                              SubscriberSet::emit
//!                                         ┌──────────┼──────────┐
//!                                         ▼          ▼          ▼
//!                                       sub1       sub2       subN
//! ```

mod set;
mod subscribe;

#[cfg(feature = "logging")]
mod log;

pub use set::SubscriberSet;
pub use subscribe::Subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
