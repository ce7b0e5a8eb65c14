//! Request-level HTTP metrics and the per-request observation they consume.

use std::time::Duration;

use axum::http::Method;
use httpscope_core::error::Result;
use httpscope_core::metrics::{CounterVec, Gauge, HistogramVec, SummaryOpts, SummaryVec};
use httpscope_core::Registry;

/// Route label for requests that matched no route template.
pub const UNMATCHED_ROUTE: &str = "unmatched";

/// Method label for anything outside the standard method set.
pub const OTHER_METHOD: &str = "OTHER";

/// Latency buckets in seconds.
pub const DURATION_BUCKETS: [f64; 12] = [
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Payload size buckets in bytes.
pub const SIZE_BUCKETS: [f64; 11] = [
    100.0, 500.0, 1_000.0, 2_500.0, 5_000.0, 10_000.0, 25_000.0, 50_000.0, 100_000.0,
    500_000.0, 1_000_000.0,
];

/// Everything measured about one finished request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestObservation {
    pub method: &'static str,
    /// Route template, or [`UNMATCHED_ROUTE`]. Never a raw path.
    pub route: String,
    pub status: u16,
    pub elapsed: Duration,
    pub request_bytes: u64,
    pub response_bytes: u64,
}

/// Bounded method label.
pub fn method_label(method: &Method) -> &'static str {
    match method.as_str() {
        "GET" => "GET",
        "POST" => "POST",
        "PUT" => "PUT",
        "DELETE" => "DELETE",
        "PATCH" => "PATCH",
        "HEAD" => "HEAD",
        "OPTIONS" => "OPTIONS",
        "CONNECT" => "CONNECT",
        "TRACE" => "TRACE",
        _ => OTHER_METHOD,
    }
}

/// The HTTP instruments, registered once at startup.
pub struct HttpMetrics {
    requests: CounterVec,
    duration_summary: SummaryVec,
    duration: HistogramVec,
    request_size: HistogramVec,
    response_size: HistogramVec,
    in_flight: Gauge,
    errors: CounterVec,
    success: CounterVec,
    slow: CounterVec,
    slow_threshold: Duration,
}

impl HttpMetrics {
    pub fn register(
        registry: &Registry,
        slow_threshold: Duration,
        summary_window: usize,
    ) -> Result<Self> {
        let mrs = ["method", "path", "status"];
        let mr = ["method", "path"];
        Ok(Self {
            requests: registry.register_counter(
                "http_requests_total",
                "Total number of HTTP requests",
                &mrs,
            )?,
            duration_summary: registry.register_summary(
                "http_duration_seconds",
                "HTTP request duration in seconds",
                &mr,
                SummaryOpts {
                    window: summary_window,
                    ..SummaryOpts::default()
                },
            )?,
            duration: registry.register_histogram(
                "http_request_duration_seconds",
                "HTTP request duration in seconds",
                &mrs,
                &DURATION_BUCKETS,
            )?,
            request_size: registry.register_histogram(
                "http_request_size_bytes",
                "HTTP request size in bytes",
                &mr,
                &SIZE_BUCKETS,
            )?,
            response_size: registry.register_histogram(
                "http_response_size_bytes",
                "HTTP response size in bytes",
                &mrs,
                &SIZE_BUCKETS,
            )?,
            in_flight: registry
                .register_gauge(
                    "http_requests_in_flight",
                    "Current number of HTTP requests being processed",
                    &[],
                )?
                .with_label_values(&[])?,
            errors: registry.register_counter(
                "http_errors_total",
                "Total number of HTTP error requests",
                &mrs,
            )?,
            success: registry.register_counter(
                "http_success_total",
                "Total number of successful HTTP requests",
                &mr,
            )?,
            slow: registry.register_counter(
                "http_slow_requests_total",
                "Total number of slow HTTP requests (duration above threshold)",
                &mr,
            )?,
            slow_threshold,
        })
    }

    pub fn in_flight(&self) -> &Gauge {
        &self.in_flight
    }

    pub fn slow_threshold(&self) -> Duration {
        self.slow_threshold
    }

    /// Record one finished request. Failures are logged and dropped so
    /// instrumentation never affects the response.
    pub fn record(&self, obs: &RequestObservation) {
        if let Err(e) = self.try_record(obs) {
            tracing::warn!(
                error = %e,
                method = obs.method,
                route = %obs.route,
                status = obs.status,
                "dropping request observation"
            );
        }
    }

    fn try_record(&self, obs: &RequestObservation) -> Result<()> {
        let status = obs.status.to_string();
        let mr = [obs.method, obs.route.as_str()];
        let mrs = [obs.method, obs.route.as_str(), status.as_str()];
        let secs = obs.elapsed.as_secs_f64();

        // Resolve every series first so the batch is applied all or nothing.
        let requests = self.requests.with_label_values(&mrs)?;
        let summary = self.duration_summary.with_label_values(&mr)?;
        let duration = self.duration.with_label_values(&mrs)?;
        let request_size = self.request_size.with_label_values(&mr)?;
        let response_size = self.response_size.with_label_values(&mrs)?;
        let errors = if obs.status >= 400 {
            Some(self.errors.with_label_values(&mrs)?)
        } else {
            None
        };
        let success = if (200..300).contains(&obs.status) {
            Some(self.success.with_label_values(&mr)?)
        } else {
            None
        };
        let slow = if obs.elapsed > self.slow_threshold {
            Some(self.slow.with_label_values(&mr)?)
        } else {
            None
        };

        requests.inc();
        summary.observe(secs);
        duration.observe(secs);
        request_size.observe(obs.request_bytes as f64);
        response_size.observe(obs.response_bytes as f64);
        if let Some(c) = errors {
            c.inc();
        }
        if let Some(c) = success {
            c.inc();
        }
        if let Some(c) = slow {
            c.inc();
        }
        Ok(())
    }
}
