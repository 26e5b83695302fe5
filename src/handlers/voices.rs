use axum::{
    extract::{Path, State},
    response::Json,
};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::core::registry::{ProfileRegistry, VoiceProfile};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

fn voice_summary(voice: &VoiceProfile) -> Value {
    json!({
        "id": voice.id,
        "name": voice.name,
        "language": voice.language,
        "description": voice.description,
        "quality": voice.quality,
        "tags": voice.tags,
    })
}

/// List all voices
pub async fn list_voices(State(state): State<Arc<AppState>>) -> Json<Value> {
    let voices: Vec<Value> = state
        .registry
        .list_voices()
        .iter()
        .map(voice_summary)
        .collect();

    Json(json!({
        "total": voices.len(),
        "voices": voices,
    }))
}

/// Voice details plus the characters currently bound to it
pub async fn get_voice(
    State(state): State<Arc<AppState>>,
    Path(voice_id): Path<String>,
) -> AppResult<Json<Value>> {
    let voice = state
        .registry
        .voice(&voice_id)
        .ok_or_else(|| AppError::NotFound(format!("Voice '{voice_id}' not found")))?;

    let mut body = voice_summary(&voice);
    body["used_by_characters"] = json!(state.registry.characters_using_voice(&voice_id));
    Ok(Json(body))
}
