//! # Print functions and their scheduler.
//!
//! ```text
//!  worker ──▶ [PrintScheduler] ──▶ driver task
//!                                    │ permits in (priority, name) order
//!                                    ▼
//!                              fn ── fn ── fn   (≤ limit concurrent)
//!                                    │
//!                                    ▼ mutations via PrintContext
//!                                  queue
//! ```

mod function;
mod scheduler;

pub use function::{PrintContext, PrintFn, PrintFunction};
pub use scheduler::PrintScheduler;
