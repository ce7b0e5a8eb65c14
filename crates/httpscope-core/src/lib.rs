//! httpscope core: the in-process metric registry and the shared error type.
//!
//! This crate carries no transport or runtime dependencies. The server crate
//! drives it from HTTP middleware; anything else (background tasks, business
//! handlers) records through the same handles.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here. Metric wiring
//! mistakes (duplicate names, label arity) surface as `HttpScopeError`
//! so callers decide whether to abort startup or drop the observation.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod metrics;

/// Shared result type.
pub use error::{ErrorClass, HttpScopeError, Result};
pub use metrics::Registry;
