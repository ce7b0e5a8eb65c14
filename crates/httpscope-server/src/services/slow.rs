use std::time::Duration;

use axum::Json;
use rand::Rng;
use serde_json::{json, Value};

const MIN_DELAY_MS: u64 = 100;
const MAX_DELAY_MS: u64 = 500;

/// Responds after a random 100-500 ms delay without blocking the worker.
pub async fn slow() -> Json<Value> {
    let delay = Duration::from_millis(rand::thread_rng().gen_range(MIN_DELAY_MS..MAX_DELAY_MS));
    tokio::time::sleep(delay).await;
    Json(json!({
        "message": "Slow response",
        "delay_ms": delay.as_millis() as u64,
    }))
}
