//! Audio generation pipeline.
//!
//! The facade callers use for single, streamed and batch generation. Every
//! request is validated and resolved before it can consume a cache slot or an
//! admission permit:
//!
//! ```text
//! validate -> resolve -> fingerprint -> cache / single flight -> admission -> gateway
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::admission::{AdmissionController, AdmissionStats};
use super::cache::{AudioCache, CacheStats, LookupSource};
use super::error::{PipelineError, PipelineResult};
use super::segmenter::{self, StreamPlan};
use super::stream::{self, ChunkStream, ChunkSynthesizer};
use super::synthesis::{ResolvedRequest, SynthesisGateway};
use super::types::{GenerationRequest, GenerationResult};

/// Streamed text may be this many times longer than a single request
pub const STREAM_TEXT_FACTOR: usize = 10;

/// Request-shape limits enforced by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineSettings {
    pub max_text_length: usize,
    pub stream_max_chars: usize,
    pub stream_max_sentences: usize,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            max_text_length: 500,
            stream_max_chars: segmenter::DEFAULT_MAX_CHUNK_CHARS,
            stream_max_sentences: segmenter::DEFAULT_MAX_CHUNK_SENTENCES,
        }
    }
}

/// Combined cache and admission snapshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PipelineStats {
    pub cache: CacheStats,
    pub admission: AdmissionStats,
}

/// One entry of a batch call
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct BatchItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default, alias = "character")]
    pub character_id: Option<String>,
}

/// Result of one batch entry
#[derive(Debug, Clone, PartialEq)]
pub struct BatchOutcome {
    pub id: String,
    pub text: String,
    pub outcome: PipelineResult<GenerationResult>,
}

/// Shared synthesis path: cache, single flight, admission and gateway
struct Engine {
    cache: Arc<AudioCache>,
    admission: Arc<AdmissionController>,
    gateway: Arc<SynthesisGateway>,
}

impl Engine {
    async fn produce(&self, resolved: ResolvedRequest) -> PipelineResult<GenerationResult> {
        let key = resolved.fingerprint();
        let admission = Arc::clone(&self.admission);
        let gateway = Arc::clone(&self.gateway);

        let work = async move {
            let _permit = admission.acquire().await?;
            gateway.render(&resolved).await
        };

        let (result, source) = self.cache.get_or_generate(key, work).await?;
        debug!(fingerprint = %key, source = ?source, "Resolved audio");
        Ok(match source {
            LookupSource::Hit => result.as_cached(),
            LookupSource::Joined | LookupSource::Generated => (*result).clone(),
        })
    }
}

#[async_trait]
impl ChunkSynthesizer for Engine {
    async fn synthesize_chunk(&self, request: ResolvedRequest) -> PipelineResult<GenerationResult> {
        self.produce(request).await
    }
}

pub struct Pipeline {
    engine: Arc<Engine>,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        gateway: SynthesisGateway,
        cache: AudioCache,
        admission: AdmissionController,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            engine: Arc::new(Engine {
                cache: Arc::new(cache),
                admission: Arc::new(admission),
                gateway: Arc::new(gateway),
            }),
            settings,
        }
    }

    pub fn settings(&self) -> PipelineSettings {
        self.settings
    }

    pub fn gateway(&self) -> &SynthesisGateway {
        &self.engine.gateway
    }

    /// Generate complete audio for one request
    pub async fn generate(&self, request: GenerationRequest) -> PipelineResult<GenerationResult> {
        let resolved = self.prepare(&request, self.settings.max_text_length)?;
        self.engine.produce(resolved).await
    }

    /// Generate audio chunk by chunk.
    ///
    /// Validation and id resolution happen before the stream is returned, so
    /// a rejected request never emits a chunk.
    pub fn stream(
        &self,
        request: GenerationRequest,
        cancel: CancellationToken,
    ) -> PipelineResult<ChunkStream> {
        let limit = self.settings.max_text_length.saturating_mul(STREAM_TEXT_FACTOR);
        let resolved = self.prepare(&request, limit)?;
        let chunks = self.segment(&resolved.text);
        if chunks.is_empty() {
            return Err(PipelineError::InvalidInput(
                "text contains nothing to speak".to_string(),
            ));
        }
        Ok(stream::orchestrate(
            Arc::clone(&self.engine),
            resolved,
            chunks,
            cancel,
        ))
    }

    /// Chunk plan for `text` without synthesizing anything
    pub fn plan(&self, text: &str) -> PipelineResult<StreamPlan> {
        let limit = self.settings.max_text_length.saturating_mul(STREAM_TEXT_FACTOR);
        let text = validate_text(text, limit)?;
        Ok(StreamPlan::from_chunks(&self.segment(text)))
    }

    /// Generate each item independently, in input order.
    ///
    /// Items without a character use `default_character`; items without an id
    /// get a short random one.
    pub async fn batch(&self, items: Vec<BatchItem>, default_character: &str) -> Vec<BatchOutcome> {
        let total = items.len();
        let mut outcomes = Vec::with_capacity(total);

        for item in items {
            let id = item.id.unwrap_or_else(short_id);
            let character = item
                .character_id
                .unwrap_or_else(|| default_character.to_string());
            let outcome = self
                .generate(GenerationRequest::new(item.text.clone(), character))
                .await;
            if let Err(e) = &outcome {
                warn!(id = %id, kind = e.kind(), error = %e, "Batch item failed");
            }
            outcomes.push(BatchOutcome {
                id,
                text: item.text,
                outcome,
            });
        }

        let succeeded = outcomes.iter().filter(|o| o.outcome.is_ok()).count();
        info!(total, succeeded, "Batch completed");
        outcomes
    }

    pub fn stats(&self) -> PipelineStats {
        PipelineStats {
            cache: self.engine.cache.stats(),
            admission: self.engine.admission.stats(),
        }
    }

    /// Stop admitting synthesis work and wait for in-flight calls to finish
    pub async fn shutdown(&self) {
        info!("Shutting down audio pipeline");
        self.engine.admission.shutdown().await;
    }

    fn prepare(
        &self,
        request: &GenerationRequest,
        max_chars: usize,
    ) -> PipelineResult<ResolvedRequest> {
        let text = validate_text(&request.text, max_chars)?;
        let mut resolved = self.engine.gateway.resolve(request)?;
        resolved.text = text.to_string();
        Ok(resolved)
    }

    fn segment(&self, text: &str) -> Vec<String> {
        segmenter::split(
            text,
            self.settings.stream_max_chars,
            self.settings.stream_max_sentences,
        )
    }
}

/// Trim `text` and check it is non-empty and at most `max_chars` characters
pub fn validate_text(text: &str, max_chars: usize) -> PipelineResult<&str> {
    let text = text.trim();
    if text.is_empty() {
        return Err(PipelineError::InvalidInput("Text cannot be empty".to_string()));
    }
    let chars = text.chars().count();
    if chars > max_chars {
        return Err(PipelineError::InvalidInput(format!(
            "Text too long ({chars} characters, max {max_chars})"
        )));
    }
    Ok(text)
}

fn short_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}
