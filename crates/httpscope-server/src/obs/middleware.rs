//! Request instrumentation middleware.
//!
//! Per request: start (skip the scrape route, take the start time, bump the
//! in-flight gauge), hand the request to the inner stack, wrap the response
//! body in a [`CaptureBody`], and once the body is finished or dropped release
//! the in-flight slot and record the observation.
//!
//! The in-flight slot is an RAII guard, so it is released on every exit path:
//! normal completion, a handler panic unwinding through this future, or the
//! connection going away and the future being dropped.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{MatchedPath, Request, State},
    http::header::CONTENT_LENGTH,
    middleware::{self, Next},
    response::Response,
    Router,
};
use http_body::Body as HttpBody;
use httpscope_core::metrics::InFlightGuard;
use tower_http::catch_panic::CatchPanicLayer;

use super::capture::{CaptureBody, ResponseCapture};
use super::http::{method_label, HttpMetrics, RequestObservation, UNMATCHED_ROUTE};

/// Middleware state: the metrics sink plus the routing decisions it needs.
#[derive(Clone)]
pub struct Instrumentation {
    metrics: Arc<HttpMetrics>,
    scrape_path: Arc<str>,
    record_unmatched: bool,
}

impl Instrumentation {
    pub fn new(metrics: Arc<HttpMetrics>, scrape_path: &str, record_unmatched: bool) -> Self {
        Self {
            metrics,
            scrape_path: Arc::from(scrape_path),
            record_unmatched,
        }
    }

    pub fn metrics(&self) -> &Arc<HttpMetrics> {
        &self.metrics
    }

    /// Route label for this request, or `None` if it must not be instrumented.
    fn route_label(&self, matched: Option<&str>) -> Option<String> {
        match matched {
            Some(path) if path == &*self.scrape_path => None,
            Some(path) => Some(path.to_owned()),
            None if self.record_unmatched => Some(UNMATCHED_ROUTE.to_owned()),
            None => None,
        }
    }
}

/// Install the instrumentation around every route (and the fallback) of
/// `router`. Panics in handlers become 500 responses inside the
/// instrumented region so they are counted like any other error.
pub fn instrument<S>(router: Router<S>, instrumentation: Instrumentation) -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    router
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn_with_state(instrumentation, track_requests))
}

/// Middleware entry point (`axum::middleware::from_fn_with_state`).
pub async fn track_requests(
    State(instr): State<Instrumentation>,
    request: Request,
    next: Next,
) -> Response {
    let matched = request.extensions().get::<MatchedPath>().map(MatchedPath::as_str);
    let Some(route) = instr.route_label(matched) else {
        return next.run(request).await;
    };

    let pending = InFlight::start(
        Arc::clone(&instr.metrics),
        method_label(request.method()),
        route,
        request_size(&request),
    );

    let response = next.run(request).await;

    let (parts, body) = response.into_parts();
    let mut capture = ResponseCapture::new();
    capture.set_status(parts.status);
    let body = CaptureBody::new(body, capture, move |capture: &ResponseCapture| {
        pending.finish(capture)
    });
    Response::from_parts(parts, Body::new(body))
}

/// Declared request size. A negative or unparsable `Content-Length` counts
/// as 0; without the header an exact body size hint is used, else 0.
pub fn request_size<B: HttpBody>(request: &axum::http::Request<B>) -> u64 {
    match request.headers().get(CONTENT_LENGTH) {
        Some(value) => value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<i64>().ok())
            .and_then(|n| u64::try_from(n).ok())
            .unwrap_or(0),
        None => request.body().size_hint().exact().unwrap_or(0),
    }
}

/// A request between start and completion.
struct InFlight {
    metrics: Arc<HttpMetrics>,
    method: &'static str,
    route: String,
    request_bytes: u64,
    started: Instant,
    slot: InFlightGuard,
}

impl InFlight {
    fn start(
        metrics: Arc<HttpMetrics>,
        method: &'static str,
        route: String,
        request_bytes: u64,
    ) -> Self {
        let slot = metrics.in_flight().track_in_flight();
        Self {
            metrics,
            method,
            route,
            request_bytes,
            started: Instant::now(),
            slot,
        }
    }

    fn finish(self, capture: &ResponseCapture) {
        let elapsed = self.started.elapsed();
        let InFlight {
            metrics,
            method,
            route,
            request_bytes,
            slot,
            ..
        } = self;
        drop(slot);

        metrics.record(&RequestObservation {
            method,
            route,
            status: capture.status().as_u16(),
            elapsed,
            request_bytes,
            response_bytes: capture.bytes_written(),
        });
    }
}
