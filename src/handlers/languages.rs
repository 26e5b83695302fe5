use axum::{extract::State, response::Json};
use serde_json::{Value, json};
use std::sync::Arc;

use crate::core::languages::{SUPPORTED_LANGUAGES, language_name};
use crate::state::AppState;

/// Languages the gateway accepts as overrides.
///
/// An empty configured list means any language is passed through; the known
/// model languages are listed in that case.
pub async fn list_languages(State(state): State<Arc<AppState>>) -> Json<Value> {
    let configured = &state.config.supported_languages;
    let languages: Vec<Value> = if configured.is_empty() {
        SUPPORTED_LANGUAGES
            .iter()
            .map(|(code, name)| json!({"code": code, "name": name}))
            .collect()
    } else {
        configured
            .iter()
            .map(|code| json!({"code": code, "name": language_name(code).unwrap_or(code.as_str())}))
            .collect()
    };

    Json(json!({
        "total": languages.len(),
        "languages": languages,
    }))
}
