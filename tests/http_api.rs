//! HTTP API Tests
//!
//! Drives the router with `tower::ServiceExt::oneshot` against a mock model.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::util::ServiceExt;

use chatterbox_gateway::core::admission::OverflowPolicy;
use chatterbox_gateway::core::registry::InMemoryRegistry;
use chatterbox_gateway::core::storage::AudioStore;
use chatterbox_gateway::{routes, state::AppState};

use common::{MockModel, test_config, test_state};

fn app_with(state: Arc<AppState>) -> Router {
    routes::api::create_api_router().with_state(state)
}

fn app() -> (Router, Arc<MockModel>) {
    let model = MockModel::new(Duration::ZERO);
    (app_with(test_state(test_config(), model.clone())), model)
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: Response) -> bytes::Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

async fn body_json(response: Response) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

#[tokio::test]
async fn test_health_reports_pipeline_state() {
    let (app, _) = app();
    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["model"], "mock-model");
    assert_eq!(body["cache"]["capacity"], 100);
    assert_eq!(body["admission"]["pool_size"], 2);
    assert_eq!(body["storage_configured"], false);
}

#[tokio::test]
async fn test_generate_audio_base64_then_cached() {
    let (app, model) = app();
    let request = json!({"text": "Welcome back, friend.", "character": "assistant"});

    let response = app
        .clone()
        .oneshot(post_json("/generate-audio", request.clone()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let first = body_json(response).await;
    assert_eq!(first["success"], true);
    assert_eq!(first["character"], "assistant");
    assert_eq!(first["voice_id"], "friendly");
    assert_eq!(first["sample_rate"], 24000);
    assert_eq!(first["text_length"], 21);
    assert_eq!(first["cached"], false);
    assert!(first["audio"].as_str().unwrap().len() > 100);
    assert!(first.get("audio_url").is_none());

    let response = app
        .oneshot(post_json("/generate-audio", request))
        .await
        .unwrap();
    let second = body_json(response).await;
    assert_eq!(second["cached"], true);
    assert_eq!(second["audio"], first["audio"]);
    assert_eq!(model.calls(), 1);
}

#[tokio::test]
async fn test_generate_audio_validation_errors() {
    let (app, model) = app();

    let response = app
        .clone()
        .oneshot(post_json("/generate-audio", json!({"character": "narrator"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"], "Missing 'text' field");

    let response = app
        .clone()
        .oneshot(post_json("/generate-audio", json!({"text": "   "})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Text cannot be empty");

    let response = app
        .clone()
        .oneshot(post_json("/generate-audio", json!({"text": "x".repeat(101)})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .clone()
        .oneshot(post_json(
            "/generate-audio",
            json!({"text": "Hello.", "character": "ghost"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unknown character: ghost");
    assert!(
        body["available_characters"]
            .as_array()
            .unwrap()
            .iter()
            .any(|id| id == "luna")
    );

    let response = app
        .oneshot(post_json(
            "/generate-audio",
            json!({"text": "Hello.", "voice_id": "robot"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body = body_json(response).await;
    assert_eq!(body["error"], "Unknown voice: robot");
    assert!(body["available_voices"].is_array());

    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_malformed_json_is_bad_request() {
    let (app, _) = app();
    let request = Request::builder()
        .method("POST")
        .uri("/tts-json")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();

    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["success"], false);
}

#[tokio::test]
async fn test_url_format_requires_storage() {
    let (app, model) = app();
    let response = app
        .oneshot(post_json(
            "/generate-audio",
            json!({"text": "Hello.", "return_format": "url"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_url_format_publishes_to_storage() {
    let model = MockModel::new(Duration::ZERO);
    let store = AudioStore::in_memory("chatterbox/audio/", "https://cdn.example.com");
    let state = AppState::with_parts(
        test_config(),
        model,
        Arc::new(InMemoryRegistry::with_builtin_profiles()),
        Some(store),
    );

    let response = app_with(state)
        .oneshot(post_json(
            "/generate-audio",
            json!({"text": "Store me.", "return_format": "url"}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    let url = body["audio_url"].as_str().unwrap();
    assert!(url.starts_with("https://cdn.example.com/chatterbox/audio/"));
    assert!(url.ends_with(".wav"));
    assert!(body.get("audio").is_none());
}

#[tokio::test]
async fn test_tts_returns_wav_attachment() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json("/tts", json!({"text": "Hello there.", "character_id": "expert"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/wav");
    let disposition = response.headers()[header::CONTENT_DISPOSITION]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.contains("filename=\"tts_"));

    let bytes = body_bytes(response).await;
    assert_eq!(&bytes[..4], b"RIFF");
    assert_eq!(&bytes[8..12], b"WAVE");
}

#[tokio::test]
async fn test_tts_json() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json("/tts-json", json!({"text": "Hello there."})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["character_id"], "narrator");
    assert_eq!(body["text_length"], 12);
    assert!(body["duration"].as_f64().unwrap() > 0.0);
}

#[tokio::test]
async fn test_batch_reports_each_item() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json(
            "/tts-batch",
            json!({
                "requests": [
                    {"id": "msg_1", "text": "Hello world.", "character_id": "narrator"},
                    {"id": "msg_2", "text": "Please explode now."},
                    {"id": "msg_3", "text": ""},
                    {"text": "No id here.", "character_id": "sage"}
                ]
            }),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total"], 4);
    assert_eq!(body["succeeded"], 2);

    let results = body["results"].as_array().unwrap();
    assert_eq!(results[0]["id"], "msg_1");
    assert_eq!(results[0]["success"], true);
    assert!(results[0]["audio"].is_string());
    assert_eq!(results[1]["success"], false);
    assert_eq!(results[2]["error"], "Text cannot be empty");
    assert_eq!(results[3]["id"].as_str().unwrap().len(), 8);
    assert_eq!(results[3]["success"], true);
}

#[tokio::test]
async fn test_batch_requires_requests_field() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json("/tts-batch", json!({"format": "base64"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "Missing 'requests' field");
}

#[tokio::test]
async fn test_stream_emits_ndjson_chunks() {
    let (app, _) = app();
    let response = app
        .oneshot(post_json(
            "/tts-stream",
            json!({"text": "Hello there. How are you today? I am fine."}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::CONTENT_TYPE],
        "application/x-ndjson"
    );

    let bytes = body_bytes(response).await;
    let lines: Vec<Value> = std::str::from_utf8(&bytes)
        .unwrap()
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect();

    assert_eq!(lines.len(), 3);
    assert_eq!(lines[0]["text"], "Hello there.");
    assert_eq!(lines[1]["text"], "How are you today?");
    assert_eq!(lines[2]["text"], "I am fine.");
    for (i, line) in lines.iter().enumerate() {
        assert_eq!(line["chunk_index"], i);
        assert_eq!(line["total_chunks"], 3);
        assert!(line["audio"].is_string());
    }
    assert_eq!(lines[2]["is_final"], true);
    assert_eq!(lines[0]["is_final"], false);
}

#[tokio::test]
async fn test_stream_rejects_unknown_character_up_front() {
    let (app, model) = app();
    let response = app
        .oneshot(post_json(
            "/tts-stream",
            json!({"text": "Hello there.", "character_id": "ghost"}),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_stream_plan() {
    let (app, model) = app();
    let response = app
        .oneshot(post_json(
            "/tts-stream/plan",
            json!({"text": "Hello there. How are you today? I am fine."}),
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["total_chunks"], 3);
    assert_eq!(body["chunks"][1]["text_preview"], "How are you today?");
    assert_eq!(body["chunks"][1]["char_count"], 18);
    assert_eq!(body["estimated_total_time"], 2.0);
    assert_eq!(model.calls(), 0);
}

#[tokio::test]
async fn test_character_endpoints() {
    let (app, _) = app();

    let body = body_json(app.clone().oneshot(get("/characters")).await.unwrap()).await;
    assert_eq!(body["total"], 6);

    let response = app.clone().oneshot(get("/characters/luna")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["voice_id"], "mysterious");
    assert!(body["parameters"]["temperature"].is_number());

    let response = app.oneshot(get("/characters/ghost")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Character 'ghost' not found");
}

#[tokio::test]
async fn test_reassign_voice_changes_resolution() {
    let (app, model) = app();

    let response = app
        .clone()
        .oneshot(post_json("/tts-json", json!({"text": "Same words.", "character_id": "luna"})))
        .await
        .unwrap();
    assert_eq!(body_json(response).await["voice_id"], "mysterious");

    let response = app
        .clone()
        .oneshot(post_json("/characters/luna/voice", json!({"voice_id": "calm"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["voice_id"], "calm");

    let body = body_json(app.clone().oneshot(get("/voices/calm")).await.unwrap()).await;
    let users = body["used_by_characters"].as_array().unwrap();
    assert!(users.iter().any(|id| id == "luna"));

    // New binding means a new fingerprint, so the model runs again
    let response = app
        .clone()
        .oneshot(post_json("/tts-json", json!({"text": "Same words.", "character_id": "luna"})))
        .await
        .unwrap();
    let body = body_json(response).await;
    assert_eq!(body["voice_id"], "calm");
    assert_eq!(body["cached"], false);
    assert_eq!(model.calls(), 2);

    let response = app
        .clone()
        .oneshot(post_json("/characters/luna/voice", json!({"voice_id": "robot"})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(body_json(response).await["available_voices"].is_array());

    let response = app
        .oneshot(post_json("/characters/luna/voice", json!({})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_voice_endpoints() {
    let (app, _) = app();

    let body = body_json(app.clone().oneshot(get("/voices")).await.unwrap()).await;
    assert_eq!(body["total"], body["voices"].as_array().unwrap().len());

    let response = app.oneshot(get("/voices/robot")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_languages_follow_configuration() {
    let (app, _) = app();
    let body = body_json(app.oneshot(get("/languages")).await.unwrap()).await;

    assert_eq!(body["total"], 2);
    assert_eq!(body["languages"][1]["code"], "fr");
    assert_eq!(body["languages"][1]["name"], "French");
}

#[tokio::test]
async fn test_unknown_route() {
    let (app, _) = app();
    let response = app.oneshot(get("/nope")).await.unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(body_json(response).await["error"], "Endpoint not found");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reject_policy_returns_429() {
    let mut config = test_config();
    config.admission_pool_size = 1;
    config.admission_policy = OverflowPolicy::Reject;
    let model = MockModel::new(Duration::from_millis(300));
    let app = app_with(test_state(config, model));

    let slow = tokio::spawn(
        app.clone()
            .oneshot(post_json("/tts-json", json!({"text": "First caller."}))),
    );
    tokio::time::sleep(Duration::from_millis(100)).await;

    let response = app
        .oneshot(post_json("/tts-json", json!({"text": "Second caller."})))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers()[header::RETRY_AFTER], "1");

    let first = slow.await.unwrap().unwrap();
    assert_eq!(first.status(), StatusCode::OK);
}
