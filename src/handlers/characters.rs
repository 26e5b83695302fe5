use axum::{
    extract::{Path, State, rejection::JsonRejection},
    response::Json,
};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;

use crate::core::registry::{CharacterProfile, ProfileRegistry, RegistryError};
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

/// Body of `POST /characters/{id}/voice`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AssignVoiceRequest {
    pub voice_id: Option<String>,
}

fn character_summary(character: &CharacterProfile) -> Value {
    json!({
        "id": character.id,
        "name": character.name,
        "language": character.language,
        "description": character.description,
        "voice_id": character.voice_id,
    })
}

/// List all characters
pub async fn list_characters(State(state): State<Arc<AppState>>) -> Json<Value> {
    let characters: Vec<Value> = state
        .registry
        .list_characters()
        .iter()
        .map(character_summary)
        .collect();

    Json(json!({
        "total": characters.len(),
        "characters": characters,
    }))
}

/// Character details including synthesis controls
pub async fn get_character(
    State(state): State<Arc<AppState>>,
    Path(character_id): Path<String>,
) -> AppResult<Json<Value>> {
    let character = state
        .registry
        .character(&character_id)
        .ok_or_else(|| AppError::NotFound(format!("Character '{character_id}' not found")))?;

    let mut body = character_summary(&character);
    body["parameters"] = json!({
        "exaggeration": character.exaggeration,
        "temperature": character.temperature,
        "cfg_weight": character.cfg_weight,
    });
    Ok(Json(body))
}

/// Rebind a character to another voice.
///
/// Audio cached under the previous voice stays cached; new requests for the
/// character resolve the new voice.
pub async fn set_character_voice(
    State(state): State<Arc<AppState>>,
    Path(character_id): Path<String>,
    payload: Result<Json<AssignVoiceRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    if state.registry.character(&character_id).is_none() {
        return Err(AppError::NotFound(format!(
            "Character '{character_id}' not found"
        )));
    }

    let Json(body) = payload?;
    let voice_id = body
        .voice_id
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing 'voice_id' field".to_string()))?;

    let character = match state.registry.assign_voice(&character_id, &voice_id) {
        Ok(character) => character,
        Err(RegistryError::VoiceNotFound(id)) => {
            return Err(AppError::UnknownId {
                message: format!("Voice '{id}' not found"),
                field: "available_voices",
                available: state.registry.voice_ids(),
            });
        }
        Err(other) => return Err(other.into()),
    };

    let voice_name = state
        .registry
        .voice(&character.voice_id)
        .map(|v| v.name)
        .unwrap_or_default();

    Ok(Json(json!({
        "success": true,
        "character": character.id,
        "voice_id": character.voice_id,
        "voice_name": voice_name,
    })))
}
