use axum::Json;
use chrono::Utc;
use serde_json::{json, Value};

use crate::store::timestamp;

/// GET /api/health
pub async fn health_handler() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "timestamp": timestamp(Utc::now())
    }))
}
