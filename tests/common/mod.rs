//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chatterbox_gateway::config::ServerConfig;
use chatterbox_gateway::core::admission::OverflowPolicy;
use chatterbox_gateway::core::model::{ModelError, ModelOutput, ModelRequest, SynthesisModel};
use chatterbox_gateway::core::registry::InMemoryRegistry;
use chatterbox_gateway::state::AppState;

/// Model double that counts calls and tracks peak concurrency.
///
/// Any text containing "explode" fails with a 500 from the "model".
pub struct MockModel {
    pub calls: AtomicUsize,
    pub reclaims: AtomicUsize,
    active: AtomicUsize,
    pub peak: AtomicUsize,
    delay: Duration,
}

impl MockModel {
    pub fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            reclaims: AtomicUsize::new(0),
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            delay,
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SynthesisModel for MockModel {
    async fn generate(&self, request: ModelRequest) -> Result<ModelOutput, ModelError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        tokio::time::sleep(self.delay).await;
        self.active.fetch_sub(1, Ordering::SeqCst);

        if request.text.contains("explode") {
            return Err(ModelError::Status {
                status: 500,
                body: "boom".to_string(),
            });
        }
        // Length varies with the text so distinct requests yield distinct audio
        let len = 2400 + request.text.chars().count() * 10;
        Ok(ModelOutput {
            samples: vec![0.1; len],
            sample_rate: 24_000,
        })
    }

    async fn reclaim(&self) {
        self.reclaims.fetch_add(1, Ordering::SeqCst);
    }

    fn describe(&self) -> String {
        "mock-model".to_string()
    }
}

/// Configuration with no external services
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        model_url: "http://127.0.0.1:9/generate".to_string(),
        model_reclaim_url: None,
        model_timeout_seconds: 5,
        supported_languages: vec!["en".to_string(), "fr".to_string()],
        max_text_length: 100,
        default_max_tokens: 400,
        min_max_tokens: 100,
        max_max_tokens: 1000,
        peak_limit: 0.95,
        default_character: "narrator".to_string(),
        cache_enabled: true,
        cache_capacity: 100,
        stream_max_chars: 20,
        stream_max_sentences: 1,
        admission_pool_size: 2,
        admission_policy: OverflowPolicy::Queue,
        admission_queue_depth: 16,
        registry_path: None,
        s3_bucket: None,
        s3_region: "us-east-1".to_string(),
        s3_endpoint: None,
        s3_access_key: None,
        s3_secret_key: None,
        s3_prefix: "chatterbox/audio/".to_string(),
        s3_public_base_url: None,
        s3_presign_ttl_seconds: None,
        cors_allowed_origins: None,
    }
}

/// Application state around a mock model and the built-in registry
pub fn test_state(config: ServerConfig, model: Arc<MockModel>) -> Arc<AppState> {
    AppState::with_parts(
        config,
        model,
        Arc::new(InMemoryRegistry::with_builtin_profiles()),
        None,
    )
}
