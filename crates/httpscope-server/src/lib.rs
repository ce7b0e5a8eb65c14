//! httpscope server library entry.
//!
//! Wires config, application state, request instrumentation and the demo
//! endpoints into an axum router. Used by the binary (`main.rs`) and by
//! integration tests.

pub mod app_state;
pub mod config;
pub mod obs;
pub mod router;
pub mod services;
