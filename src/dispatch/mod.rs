//! # URL-style command dispatch.
//!
//! ```text
//!          raw URL                         command
//!  caller ─────────▶ [DispatchUrl::parse] ─────────▶ [Router] ──▶ handler
//!                      scheme:command#arg              │
//!                                                      ▼
//!                                               StatusObserver
//! ```
//!
//! Commands are addressed as `scheme:command#argument` with a
//! percent-encoded argument. The [`Router`] resolves the command to one
//! [`DispatchHandler`] and mirrors handler availability to registered
//! [`StatusObserver`]s.

mod router;
mod url;

pub use router::{CommandStatus, DispatchHandler, Properties, Router, StatusObserver};
pub use url::{DispatchUrl, UrlError};
