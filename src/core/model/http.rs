//! HTTP client for a remotely served synthesis model.
//!
//! # API Contract
//!
//! - Endpoint: `POST {model_url}` with a JSON [`ModelRequest`] body
//! - Response: `audio/wav` body at the model's native sample rate
//! - Optional `POST {reclaim_url}` after every call to free accelerator memory

use std::io::Cursor;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{ModelError, ModelOutput, ModelRequest, SynthesisModel};

/// Synthesis model reached over HTTP
pub struct HttpSynthesisModel {
    client: reqwest::Client,
    url: String,
    reclaim_url: Option<String>,
}

impl HttpSynthesisModel {
    /// Create a client for the model served at `url`
    pub fn new(
        url: impl Into<String>,
        reclaim_url: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .build()
            .map_err(|e| ModelError::Request(e.to_string()))?;

        Ok(Self {
            client,
            url: url.into(),
            reclaim_url,
        })
    }

    /// Model endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Decode a WAV payload into mono f32 samples.
///
/// Multi-channel input is downmixed by averaging each frame.
pub(crate) fn decode_wav(bytes: &[u8]) -> Result<ModelOutput, ModelError> {
    let mut reader =
        hound::WavReader::new(Cursor::new(bytes)).map_err(|e| ModelError::Decode(e.to_string()))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| ModelError::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<_, _>>()
                .map_err(|e| ModelError::Decode(e.to_string()))?
        }
    };

    let channels = spec.channels.max(1) as usize;
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(ModelOutput {
        samples,
        sample_rate: spec.sample_rate,
    })
}

#[async_trait]
impl SynthesisModel for HttpSynthesisModel {
    async fn generate(&self, request: ModelRequest) -> Result<ModelOutput, ModelError> {
        debug!(
            url = %self.url,
            language = %request.language,
            max_tokens = request.max_tokens,
            "Dispatching synthesis request"
        );

        let response = self
            .client
            .post(&self.url)
            .header("Accept", "audio/wav")
            .json(&request)
            .send()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| ModelError::Request(e.to_string()))?;

        decode_wav(&bytes)
    }

    async fn reclaim(&self) {
        let Some(url) = &self.reclaim_url else {
            return;
        };

        match self.client.post(url).send().await {
            Ok(resp) if resp.status().is_success() => {}
            Ok(resp) => warn!(status = %resp.status(), "Model memory reclaim returned non-success"),
            Err(e) => warn!(error = %e, "Model memory reclaim request failed"),
        }
    }

    fn describe(&self) -> String {
        format!("http:{}", self.url)
    }
}
