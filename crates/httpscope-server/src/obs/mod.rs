//! Request telemetry: HTTP instruments, response capture, the instrumentation
//! middleware, uptime reporting, business hooks and the scrape endpoint.

pub mod business;
pub mod capture;
pub mod http;
pub mod middleware;
pub mod scrape;
pub mod uptime;

pub use business::BusinessMetrics;
pub use capture::{CaptureBody, ResponseCapture};
pub use http::{HttpMetrics, RequestObservation, UNMATCHED_ROUTE};
pub use middleware::{instrument, track_requests, Instrumentation};
pub use uptime::{spawn_uptime_reporter, UptimeMetrics};
