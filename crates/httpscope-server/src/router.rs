//! Axum router wiring.

use axum::{
    http::StatusCode,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::{app_state::AppState, obs, services};

/// Paths served by the demo handlers; the scrape path may not reuse them.
pub const DEMO_ROUTES: [&str; 3] = ["/get", "/post", "/slow"];

pub fn build_router(state: AppState) -> Router {
    let metrics_path = state.cfg().metrics.path.clone();
    let instrumentation = state.instrumentation();

    let routes = Router::new()
        .route(&metrics_path, get(obs::scrape::render_metrics))
        .route("/get", get(services::hello))
        .route("/post", post(services::random_number))
        .route("/slow", get(services::slow))
        .fallback(not_found);

    obs::instrument(routes, instrumentation)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found() -> StatusCode {
    StatusCode::NOT_FOUND
}
