//! Synthesis gateway.
//!
//! The single choke point in front of the external model. [`SynthesisGateway::resolve`]
//! makes every id, language and token decision without touching the model, so
//! callers can reject bad requests before admission. [`SynthesisGateway::render`]
//! performs the model call, normalizes amplitude, encodes WAV and always asks
//! the model to reclaim accelerator memory afterwards.

pub mod audio;

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, error, info, warn};

use super::cache::Fingerprint;
use super::error::{PipelineError, PipelineResult};
use super::model::{ModelRequest, SynthesisModel};
use super::registry::{CharacterProfile, ProfileRegistry, VoiceProfile};
use super::types::{GenerationRequest, GenerationResult};

/// Administrative limits applied while resolving requests
#[derive(Debug, Clone, PartialEq)]
pub struct GatewaySettings {
    pub min_tokens: u32,
    pub default_tokens: u32,
    pub max_tokens: u32,
    /// Accepted language codes; empty accepts any
    pub supported_languages: Vec<String>,
    /// Target peak when loud output is scaled down
    pub peak_limit: f32,
}

impl Default for GatewaySettings {
    fn default() -> Self {
        Self {
            min_tokens: 100,
            default_tokens: 400,
            max_tokens: 1000,
            supported_languages: Vec::new(),
            peak_limit: 0.95,
        }
    }
}

impl GatewaySettings {
    pub fn clamp_tokens(&self, requested: Option<u32>) -> u32 {
        requested
            .unwrap_or(self.default_tokens)
            .clamp(self.min_tokens, self.max_tokens)
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages.is_empty()
            || self.supported_languages.iter().any(|l| l == language)
    }
}

/// A request with every id and limit resolved
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRequest {
    pub text: String,
    pub character: CharacterProfile,
    pub voice: VoiceProfile,
    pub language: String,
    pub max_tokens: u32,
}

impl ResolvedRequest {
    /// Cache key of this request
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::compute(&self.text, &self.character.id, &self.voice.id)
    }

    /// Same resolution applied to a different piece of text
    pub fn with_text(&self, text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..self.clone()
        }
    }

    fn model_request(&self) -> ModelRequest {
        ModelRequest {
            text: self.text.clone(),
            language: self.language.clone(),
            voice_reference: self.voice.audio_url.clone(),
            expressiveness: self.character.exaggeration,
            randomness: self.character.temperature,
            adherence: self.character.cfg_weight,
            max_tokens: self.max_tokens,
        }
    }
}

pub struct SynthesisGateway {
    model: Arc<dyn SynthesisModel>,
    registry: Arc<dyn ProfileRegistry>,
    settings: GatewaySettings,
}

impl SynthesisGateway {
    pub fn new(
        model: Arc<dyn SynthesisModel>,
        registry: Arc<dyn ProfileRegistry>,
        settings: GatewaySettings,
    ) -> Self {
        Self {
            model,
            registry,
            settings,
        }
    }

    pub fn settings(&self) -> &GatewaySettings {
        &self.settings
    }

    pub fn model_description(&self) -> String {
        self.model.describe()
    }

    /// Resolve character, voice, language and token budget for a request.
    ///
    /// The voice override takes precedence over the character's bound voice.
    /// An unsupported language override falls back to the character's
    /// language with a warning.
    pub fn resolve(&self, request: &GenerationRequest) -> PipelineResult<ResolvedRequest> {
        let character = self
            .registry
            .character(&request.character_id)
            .ok_or_else(|| PipelineError::UnknownCharacter(request.character_id.clone()))?;

        let voice_id = request
            .voice_override
            .as_deref()
            .unwrap_or(&character.voice_id);
        let voice = self
            .registry
            .voice(voice_id)
            .ok_or_else(|| PipelineError::UnknownVoice(voice_id.to_string()))?;

        let language = match request.language_override.as_deref() {
            Some(requested) => {
                let requested = requested.trim().to_lowercase();
                if self.settings.supports_language(&requested) {
                    requested
                } else {
                    warn!(
                        character = %character.id,
                        requested = %requested,
                        fallback = %character.language,
                        "Unsupported language, using character default"
                    );
                    character.language.clone()
                }
            }
            None => character.language.clone(),
        };

        let max_tokens = self.settings.clamp_tokens(request.max_tokens);
        if request.max_tokens.is_some_and(|t| t != max_tokens) {
            debug!(
                requested = request.max_tokens,
                clamped = max_tokens,
                "Clamped token budget"
            );
        }

        Ok(ResolvedRequest {
            text: request.text.clone(),
            character,
            voice,
            language,
            max_tokens,
        })
    }

    /// Run the model for a resolved request and encode its output
    pub async fn render(&self, resolved: &ResolvedRequest) -> PipelineResult<GenerationResult> {
        let start = Instant::now();
        debug!(
            character = %resolved.character.id,
            voice = %resolved.voice.id,
            language = %resolved.language,
            chars = resolved.text.chars().count(),
            "Calling synthesis model"
        );

        let outcome = self.model.generate(resolved.model_request()).await;
        self.model.reclaim().await;
        let generation_ms = start.elapsed().as_millis() as u64;

        let output = outcome.map_err(|e| {
            error!(character = %resolved.character.id, error = %e, "Synthesis model failed");
            PipelineError::from(e)
        })?;

        if output.samples.is_empty() {
            warn!(character = %resolved.character.id, "Synthesis model returned no samples");
            return Err(PipelineError::EmptyOutput);
        }
        if output.sample_rate == 0 {
            return Err(PipelineError::ModelFailure(
                "model reported a zero sample rate".to_string(),
            ));
        }

        let mut samples = output.samples;
        audio::ensure_finite(&samples)?;
        if let Some(gain) = audio::normalize_peak(&mut samples, self.settings.peak_limit) {
            debug!(gain, "Scaled down clipping output");
        }

        let audio = audio::encode_wav(&samples, output.sample_rate)?;
        let duration_secs = audio::duration_secs(samples.len(), output.sample_rate);

        info!(
            character = %resolved.character.id,
            voice = %resolved.voice.id,
            duration_secs,
            generation_ms,
            "Generated audio"
        );

        Ok(GenerationResult {
            audio,
            sample_rate: output.sample_rate,
            duration_secs,
            character_id: resolved.character.id.clone(),
            voice_id: resolved.voice.id.clone(),
            language: resolved.language.clone(),
            generation_ms,
            cached: false,
        })
    }

    /// Resolve and render in one step
    pub async fn synthesize(
        &self,
        text: &str,
        character_id: &str,
        voice_override: Option<&str>,
    ) -> PipelineResult<GenerationResult> {
        let mut request = GenerationRequest::new(text, character_id);
        request.voice_override = voice_override.map(str::to_string);
        let resolved = self.resolve(&request)?;
        self.render(&resolved).await
    }
}
