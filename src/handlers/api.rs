use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json},
};
use serde_json::{Value, json};
use std::sync::Arc;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::state::AppState;

/// Health check with cache and admission statistics
pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<Value> {
    let stats = state.pipeline.stats();
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();
    let status = if stats.admission.closed {
        "shutting_down"
    } else {
        "healthy"
    };

    Json(json!({
        "status": status,
        "timestamp": timestamp,
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "model": state.pipeline.gateway().model_description(),
        "cache_enabled": stats.cache.enabled,
        "cache_size": stats.cache.len,
        "cache": stats.cache,
        "admission": stats.admission,
        "storage_configured": state.audio_store.is_some(),
    }))
}

/// Fallback for unmatched routes
pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"success": false, "error": "Endpoint not found"})),
    )
}
