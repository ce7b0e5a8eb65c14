//! Scrape endpoint.

use axum::{extract::State, http::header, response::IntoResponse};

use crate::app_state::AppState;

/// Content type of the text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

pub async fn render_metrics(State(app): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        app.registry().render(),
    )
}
