use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

pub async fn ready(State(state): State<AppState>) -> Result<Json<Value>, StatusCode> {
    match sqlx::query("select 1").execute(state.db.pool()).await {
        Ok(_) => Ok(Json(json!({ "status": "ok" }))),
        Err(err) => {
            tracing::error!(error = %err, "readiness probe failed");
            Err(StatusCode::SERVICE_UNAVAILABLE)
        }
    }
}
