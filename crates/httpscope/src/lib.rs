//! Top-level facade crate for httpscope.
//!
//! Re-exports the metric registry and the server library so users can depend
//! on a single crate.

pub mod core {
    pub use httpscope_core::*;
}

pub mod server {
    pub use httpscope_server::*;
}
