//! Pipeline error types
//!
//! Every failure path in the audio generation pipeline is a typed value. The
//! error is `Clone` because a single synthesis outcome is shared with every
//! caller that joined the same in-flight request.

use thiserror::Error;

use super::model::ModelError;

/// Result type for pipeline operations
pub type PipelineResult<T> = Result<T, PipelineError>;

/// Error taxonomy for the audio generation pipeline
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PipelineError {
    // ─────────────────────────────────────────────────────────────────────────────
    // Rejected before any resource is consumed
    // ─────────────────────────────────────────────────────────────────────────────
    /// Empty or oversized text, malformed parameters
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Character id is not registered
    #[error("Unknown character: {0}")]
    UnknownCharacter(String),

    /// Voice id (default binding or override) is not registered
    #[error("Unknown voice: {0}")]
    UnknownVoice(String),

    // ─────────────────────────────────────────────────────────────────────────────
    // Admission
    // ─────────────────────────────────────────────────────────────────────────────
    /// Admission queue is full
    #[error("Synthesis capacity exhausted, retry later")]
    Overloaded,

    /// Admission controller no longer accepts work
    #[error("Synthesis pipeline is shutting down")]
    ShuttingDown,

    // ─────────────────────────────────────────────────────────────────────────────
    // Synthesis
    // ─────────────────────────────────────────────────────────────────────────────
    /// The external synthesis model failed
    #[error("Model failure: {0}")]
    ModelFailure(String),

    /// The model returned zero-length audio
    #[error("Model returned empty audio")]
    EmptyOutput,

    /// Audio could not be encoded into the output container
    #[error("Audio encoding failed: {0}")]
    Encoding(String),

    /// Cache layer failed; callers treat this as a miss
    #[error("Cache unavailable: {0}")]
    CacheUnavailable(String),
}

impl PipelineError {
    /// Whether a caller may retry the same request later.
    ///
    /// The pipeline itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, PipelineError::Overloaded)
    }

    /// Short machine-readable error kind
    pub fn kind(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "invalid_input",
            PipelineError::UnknownCharacter(_) => "unknown_character",
            PipelineError::UnknownVoice(_) => "unknown_voice",
            PipelineError::Overloaded => "overloaded",
            PipelineError::ShuttingDown => "shutting_down",
            PipelineError::ModelFailure(_) => "model_failure",
            PipelineError::EmptyOutput => "empty_output",
            PipelineError::Encoding(_) => "encoding",
            PipelineError::CacheUnavailable(_) => "cache_unavailable",
        }
    }
}

impl From<ModelError> for PipelineError {
    fn from(err: ModelError) -> Self {
        PipelineError::ModelFailure(err.to_string())
    }
}

impl From<hound::Error> for PipelineError {
    fn from(err: hound::Error) -> Self {
        PipelineError::Encoding(err.to_string())
    }
}
