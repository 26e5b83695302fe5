//! Synthesis model contract.
//!
//! The neural model is an opaque, slow collaborator. The pipeline only sees
//! [`SynthesisModel::generate`], which turns text plus conditioning values into
//! raw samples at the model's native rate, and [`SynthesisModel::reclaim`],
//! which releases accelerator memory between calls.

mod http;

pub use http::HttpSynthesisModel;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

/// Errors raised by a synthesis model backend
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// Transport-level failure reaching the model
    #[error("Model request failed: {0}")]
    Request(String),

    /// Model answered with a non-success status
    #[error("Model returned status {status}: {body}")]
    Status { status: u16, body: String },

    /// Model output could not be decoded into samples
    #[error("Failed to decode model output: {0}")]
    Decode(String),

    /// Model produced samples that are not finite numbers
    #[error("Model produced invalid samples: {0}")]
    InvalidSamples(String),
}

/// Inputs for a single model invocation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelRequest {
    pub text: String,
    #[serde(rename = "language_id")]
    pub language: String,
    #[serde(rename = "audio_prompt_path")]
    pub voice_reference: String,
    #[serde(rename = "exaggeration")]
    pub expressiveness: f32,
    #[serde(rename = "temperature")]
    pub randomness: f32,
    #[serde(rename = "cfg_weight")]
    pub adherence: f32,
    #[serde(rename = "max_new_tokens")]
    pub max_tokens: u32,
}

/// Raw model output
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutput {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// External synthesis model.
///
/// Implementations must be reentrant: the admission controller may let several
/// calls run at once against the same instance.
#[async_trait]
pub trait SynthesisModel: Send + Sync {
    /// Synthesize speech for the request.
    async fn generate(&self, request: ModelRequest) -> Result<ModelOutput, ModelError>;

    /// Release accelerator memory held after a call.
    ///
    /// Must not change the output of subsequent calls.
    async fn reclaim(&self) {}

    /// Human-readable backend description for health output
    fn describe(&self) -> String {
        "synthesis-model".to_string()
    }
}
