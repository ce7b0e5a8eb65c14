//! Demo business endpoints. They only produce metrics through the hooks in
//! `obs::business`; request telemetry comes from the middleware.

pub mod hello;
pub mod random;
pub mod slow;

pub use hello::hello;
pub use random::{random_number, NumberSource, ThreadRngSource};
pub use slow::slow;
