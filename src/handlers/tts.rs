//! Text-to-speech endpoints.
//!
//! All generation goes through [`crate::core::pipeline::Pipeline`]; these
//! handlers only translate JSON bodies into [`GenerationRequest`]s and shape the
//! results.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    Json,
    body::Body,
    extract::{State, rejection::JsonRejection},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use futures::StreamExt;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::core::cache::Fingerprint;
use crate::core::pipeline::BatchItem;
use crate::core::stream::Chunk;
use crate::core::types::{GenerationRequest, GenerationResult, ResponseShape};
use crate::errors::app_error::pipeline_message;
use crate::errors::{AppError, AppResult};
use crate::state::AppState;

const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// How generated audio is returned to the caller
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReturnFormat {
    #[default]
    Base64,
    Url,
}

impl ReturnFormat {
    /// Parse a client-supplied format; unrecognized values fall back to base64
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_lowercase()).as_deref() {
            Some("url") => ReturnFormat::Url,
            _ => ReturnFormat::Base64,
        }
    }
}

/// Body of `POST /generate-audio`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateAudioRequest {
    pub text: Option<String>,
    #[serde(alias = "character_id")]
    pub character: Option<String>,
    pub voice_id: Option<String>,
    pub language: Option<String>,
    pub max_tokens: Option<i64>,
    pub return_format: Option<String>,
}

/// Body of the `/tts*` endpoints
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TtsRequest {
    pub text: Option<String>,
    #[serde(alias = "character")]
    pub character_id: Option<String>,
    pub voice_id: Option<String>,
    pub language: Option<String>,
    pub max_tokens: Option<i64>,
}

/// Body of `POST /tts-batch`
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BatchRequest {
    pub requests: Option<Vec<BatchItem>>,
    pub format: Option<String>,
}

impl TtsRequest {
    fn into_generation(
        self,
        default_character: &str,
        shape: ResponseShape,
    ) -> AppResult<GenerationRequest> {
        build_request(
            self.text,
            self.character_id,
            self.voice_id,
            self.language,
            self.max_tokens,
            default_character,
            shape,
        )
    }
}

fn build_request(
    text: Option<String>,
    character: Option<String>,
    voice_id: Option<String>,
    language: Option<String>,
    max_tokens: Option<i64>,
    default_character: &str,
    shape: ResponseShape,
) -> AppResult<GenerationRequest> {
    let text = text.ok_or_else(|| AppError::BadRequest("Missing 'text' field".to_string()))?;
    let character = character
        .filter(|c| !c.trim().is_empty())
        .unwrap_or_else(|| default_character.to_string());

    let mut request = GenerationRequest::new(text, character);
    request.shape = shape;
    if let Some(voice) = voice_id.filter(|v| !v.trim().is_empty()) {
        request = request.with_voice(voice);
    }
    if let Some(language) = language.filter(|l| !l.trim().is_empty()) {
        request = request.with_language(language);
    }
    if let Some(tokens) = max_tokens {
        request = request.with_max_tokens(tokens.clamp(0, i64::from(u32::MAX)) as u32);
    }
    Ok(request)
}

/// Seconds rounded to two decimals
fn round_secs(secs: f64) -> f64 {
    (secs * 100.0).round() / 100.0
}

fn short_hex() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn pipeline_error(state: &AppState, err: crate::core::error::PipelineError) -> AppError {
    AppError::from_pipeline(err, &state.registry)
}

/// Generate audio for a character reply, as base64 or a storage URL
pub async fn generate_audio(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<GenerateAudioRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let started = Instant::now();
    let Json(body) = payload?;
    let format = ReturnFormat::parse(body.return_format.as_deref());

    let store = match format {
        ReturnFormat::Url => Some(state.audio_store.clone().ok_or_else(|| {
            AppError::Unavailable("Audio storage not configured".to_string())
        })?),
        ReturnFormat::Base64 => None,
    };

    let request = build_request(
        body.text,
        body.character,
        body.voice_id,
        body.language,
        body.max_tokens,
        &state.config.default_character,
        ResponseShape::Inline,
    )?;
    let text = request.text.trim().to_string();

    let result = state
        .pipeline
        .generate(request)
        .await
        .map_err(|e| pipeline_error(&state, e))?;

    let generation_time_ms = started.elapsed().as_millis() as u64;
    let mut response = json!({
        "success": true,
        "sample_rate": result.sample_rate,
        "duration": round_secs(result.duration_secs),
        "character": result.character_id,
        "voice_id": result.voice_id,
        "language": result.language,
        "text_length": text.chars().count(),
        "generation_time_ms": generation_time_ms,
        "cached": result.cached,
    });

    match store {
        Some(store) => {
            let fingerprint = Fingerprint::compute(&text, &result.character_id, &result.voice_id);
            let url = store.publish(&fingerprint, result.audio.clone()).await?;
            response["audio_url"] = json!(url);
        }
        None => {
            response["audio"] = json!(BASE64.encode(&result.audio));
        }
    }

    info!(
        character = %result.character_id,
        voice = %result.voice_id,
        duration = result.duration_secs,
        generation_time_ms,
        cached = result.cached,
        "Audio ready"
    );

    Ok(Json(response))
}

/// Generate audio and return it as a WAV attachment
pub async fn tts_file(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(body) = payload?;
    let request = body.into_generation(&state.config.default_character, ResponseShape::Inline)?;

    let result = state
        .pipeline
        .generate(request)
        .await
        .map_err(|e| pipeline_error(&state, e))?;

    Ok(wav_response(&result))
}

fn wav_response(result: &GenerationResult) -> Response {
    let disposition = format!("attachment; filename=\"tts_{}.wav\"", short_hex());
    let mut response = (StatusCode::OK, result.audio.clone()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("audio/wav"));
    if let Ok(value) = HeaderValue::from_str(&disposition) {
        headers.insert(header::CONTENT_DISPOSITION, value);
    }
    if let Ok(value) = HeaderValue::from_str(&format!("{:.2}", result.duration_secs)) {
        headers.insert("x-duration-seconds", value);
    }
    headers.insert("x-sample-rate", HeaderValue::from(result.sample_rate));
    headers.insert(
        "x-cache",
        HeaderValue::from_static(if result.cached { "HIT" } else { "MISS" }),
    );
    response
}

/// Generate audio and return it base64-encoded in JSON
pub async fn tts_json(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let request = body.into_generation(&state.config.default_character, ResponseShape::Inline)?;
    let text_length = request.text.trim().chars().count();

    let result = state
        .pipeline
        .generate(request)
        .await
        .map_err(|e| pipeline_error(&state, e))?;

    Ok(Json(json!({
        "success": true,
        "audio": BASE64.encode(&result.audio),
        "sample_rate": result.sample_rate,
        "duration": round_secs(result.duration_secs),
        "character_id": result.character_id,
        "voice_id": result.voice_id,
        "text_length": text_length,
        "cached": result.cached,
    })))
}

/// Generate several independent texts; one failure never fails the batch
pub async fn tts_batch(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<BatchRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let items = body
        .requests
        .ok_or_else(|| AppError::BadRequest("Missing 'requests' field".to_string()))?;
    let format = ReturnFormat::parse(body.format.as_deref());

    let outcomes = state
        .pipeline
        .batch(items, &state.config.default_character)
        .await;

    let results: Vec<Value> = outcomes
        .iter()
        .map(|item| match &item.outcome {
            Ok(result) => {
                let mut entry = json!({
                    "id": item.id,
                    "success": true,
                    "duration_seconds": round_secs(result.duration_secs),
                    "sample_rate": result.sample_rate,
                    "cached": result.cached,
                });
                match format {
                    ReturnFormat::Base64 => entry["audio"] = json!(BASE64.encode(&result.audio)),
                    ReturnFormat::Url => entry["audio_size_bytes"] = json!(result.audio.len()),
                }
                entry
            }
            Err(err) => json!({
                "id": item.id,
                "success": false,
                "error": pipeline_message(err),
            }),
        })
        .collect();

    let succeeded = outcomes.iter().filter(|o| o.outcome.is_ok()).count();
    Ok(Json(json!({
        "success": true,
        "results": results,
        "total": results.len(),
        "succeeded": succeeded,
    })))
}

/// JSON line describing one streamed chunk
pub fn chunk_json(chunk: &Chunk) -> Value {
    let mut line = json!({
        "chunk_index": chunk.index,
        "total_chunks": chunk.total,
        "text": chunk.text,
        "is_final": chunk.is_final,
        "success": chunk.is_ok(),
    });
    match &chunk.outcome {
        Ok(result) => {
            line["audio"] = json!(BASE64.encode(&result.audio));
            line["sample_rate"] = json!(result.sample_rate);
            line["duration"] = json!(round_secs(result.duration_secs));
            line["cached"] = json!(result.cached);
        }
        Err(err) => {
            line["error"] = json!(pipeline_message(err));
        }
    }
    line
}

/// Stream audio chunk by chunk as newline-delimited JSON.
///
/// Dropping the response body (client disconnect) cancels dispatch of the
/// remaining chunks.
pub async fn tts_stream(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> AppResult<Response> {
    let Json(body) = payload?;
    let request = body.into_generation(&state.config.default_character, ResponseShape::Streamed)?;

    let cancel = CancellationToken::new();
    let mut chunks = state
        .pipeline
        .stream(request, cancel.clone())
        .map_err(|e| pipeline_error(&state, e))?;
    let guard = cancel.drop_guard();

    let lines = async_stream::stream! {
        let _guard = guard;
        while let Some(chunk) = chunks.next().await {
            debug!(index = chunk.index, total = chunk.total, ok = chunk.is_ok(), "Sending chunk");
            let mut line = chunk_json(&chunk).to_string();
            line.push('\n');
            yield Ok::<_, Infallible>(line);
        }
    };

    Ok(Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)
        .header(header::CACHE_CONTROL, "no-cache")
        .body(Body::from_stream(lines))
        .unwrap_or_else(|_| Response::new(Body::empty())))
}

/// Chunk plan for a text without synthesizing it
pub async fn tts_stream_plan(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<TtsRequest>, JsonRejection>,
) -> AppResult<Json<Value>> {
    let Json(body) = payload?;
    let text = body
        .text
        .ok_or_else(|| AppError::BadRequest("Missing 'text' field".to_string()))?;

    let plan = state
        .pipeline
        .plan(&text)
        .map_err(|e| pipeline_error(&state, e))?;

    Ok(Json(json!({
        "success": true,
        "total_chunks": plan.total_chunks,
        "chunks": plan.chunks,
        "estimated_total_time": plan.estimated_total_time,
    })))
}
