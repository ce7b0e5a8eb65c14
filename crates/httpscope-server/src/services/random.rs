use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rand::Rng;
use serde_json::json;

use crate::app_state::AppState;

/// Values at or above this succeed.
const FAILURE_BELOW: u32 = 50;

/// Source of values in `0..100` for the random endpoint.
pub trait NumberSource: Send + Sync {
    fn next_value(&self) -> u32;
}

/// Thread-local RNG.
#[derive(Debug, Default)]
pub struct ThreadRngSource;

impl NumberSource for ThreadRngSource {
    fn next_value(&self) -> u32 {
        rand::thread_rng().gen_range(0..100)
    }
}

pub async fn random_number(State(app): State<AppState>) -> Response {
    let value = app.numbers().next_value();
    app.business().record_generated(value);

    if value < FAILURE_BELOW {
        app.business().record_failed();
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "Error" })),
        )
            .into_response()
    } else {
        Json(json!({ "message": "Success", "random": value })).into_response()
    }
}
