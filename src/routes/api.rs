use axum::{
    Router,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers::{api, characters, languages, tts, voices};
use crate::state::AppState;
use std::sync::Arc;

/// Create the API router
///
/// CORS is applied in main.rs once configuration is known
pub fn create_api_router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(api::health_check))
        // Generation
        .route("/generate-audio", post(tts::generate_audio))
        .route("/tts", post(tts::tts_file))
        .route("/tts-json", post(tts::tts_json))
        .route("/tts-batch", post(tts::tts_batch))
        .route("/tts-stream", post(tts::tts_stream))
        .route("/tts-stream/plan", post(tts::tts_stream_plan))
        // Registry
        .route("/characters", get(characters::list_characters))
        .route("/characters/{character_id}", get(characters::get_character))
        .route(
            "/characters/{character_id}/voice",
            post(characters::set_character_voice),
        )
        .route("/voices", get(voices::list_voices))
        .route("/voices/{voice_id}", get(voices::get_voice))
        .route("/languages", get(languages::list_languages))
        .fallback(api::not_found)
        .layer(TraceLayer::new_for_http())
}
