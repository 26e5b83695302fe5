//! Request and result types shared across the pipeline.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

/// Preferred response shape for a generation request
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseShape {
    /// Complete audio payload in one response
    #[default]
    Inline,
    /// Ordered sequence of independently generated chunks
    Streamed,
}

/// A text-to-speech request as seen by the pipeline
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationRequest {
    pub text: String,
    pub character_id: String,
    pub voice_override: Option<String>,
    pub max_tokens: Option<u32>,
    pub language_override: Option<String>,
    pub shape: ResponseShape,
}

impl GenerationRequest {
    pub fn new(text: impl Into<String>, character_id: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            character_id: character_id.into(),
            ..Default::default()
        }
    }

    pub fn with_voice(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_override = Some(voice_id.into());
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language_override = Some(language.into());
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Synthesized audio plus the parameters actually used to produce it
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationResult {
    /// WAV container bytes
    pub audio: Bytes,
    pub sample_rate: u32,
    pub duration_secs: f64,
    /// Character used after resolution
    pub character_id: String,
    /// Voice used after override resolution
    pub voice_id: String,
    /// Language used after override resolution
    pub language: String,
    /// Wall time of the model call that produced this audio
    pub generation_ms: u64,
    /// Served from cache rather than synthesized for this caller
    pub cached: bool,
}

impl GenerationResult {
    /// Copy of this result flagged as a cache hit
    pub fn as_cached(&self) -> Self {
        Self {
            cached: true,
            ..self.clone()
        }
    }
}
