use serde::Deserialize;
use std::path::Path;

use super::ConfigError;

/// Complete YAML configuration structure
///
/// All fields are optional to allow partial configuration. Values present in
/// the file override environment variables and defaults.
///
/// # Example YAML structure
/// ```yaml
/// server:
///   host: "0.0.0.0"
///   port: 5000
///
/// model:
///   url: "http://gpu-host:8000/generate"
///   reclaim_url: "http://gpu-host:8000/reclaim"
///   timeout_seconds: 120
///   supported_languages: ["en", "fr", "de"]
///
/// generation:
///   max_text_length: 500
///   default_max_tokens: 400
///   min_max_tokens: 100
///   max_max_tokens: 1000
///   peak_limit: 0.95
///   default_character: "narrator"
///
/// cache:
///   enabled: true
///   capacity: 100
///
/// streaming:
///   max_chars: 150
///   max_sentences: 3
///
/// admission:
///   pool_size: 4
///   policy: "queue"
///   queue_depth: 32
///
/// registry:
///   path: "/etc/chatterbox/voices.yaml"
///
/// storage:
///   bucket: "tts-audio"
///   region: "us-east-1"
///   endpoint: "http://minio:9000"
///   access_key: "access-key"
///   secret_key: "secret-key"
///   prefix: "chatterbox/audio/"
///   public_base_url: "https://cdn.example.com"
///   presign_ttl_seconds: 3600
///
/// security:
///   cors_allowed_origins: "https://app.example.com"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub server: Option<ServerYaml>,
    pub model: Option<ModelYaml>,
    pub generation: Option<GenerationYaml>,
    pub cache: Option<CacheYaml>,
    pub streaming: Option<StreamingYaml>,
    pub admission: Option<AdmissionYaml>,
    pub registry: Option<RegistryYaml>,
    pub storage: Option<StorageYaml>,
    pub security: Option<SecurityYaml>,
}

/// Server configuration from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerYaml {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Synthesis model endpoint from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ModelYaml {
    pub url: Option<String>,
    pub reclaim_url: Option<String>,
    pub timeout_seconds: Option<u64>,
    pub supported_languages: Option<Vec<String>>,
}

/// Request limits from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GenerationYaml {
    pub max_text_length: Option<usize>,
    pub default_max_tokens: Option<u32>,
    pub min_max_tokens: Option<u32>,
    pub max_max_tokens: Option<u32>,
    pub peak_limit: Option<f32>,
    pub default_character: Option<String>,
}

/// Audio cache from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct CacheYaml {
    pub enabled: Option<bool>,
    pub capacity: Option<usize>,
}

/// Chunked streaming from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StreamingYaml {
    pub max_chars: Option<usize>,
    pub max_sentences: Option<usize>,
}

/// Admission control from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AdmissionYaml {
    pub pool_size: Option<usize>,
    pub policy: Option<String>,
    pub queue_depth: Option<usize>,
}

/// Voice registry source from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RegistryYaml {
    pub path: Option<String>,
}

/// Audio object storage from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct StorageYaml {
    pub bucket: Option<String>,
    pub region: Option<String>,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
    pub prefix: Option<String>,
    pub public_base_url: Option<String>,
    pub presign_ttl_seconds: Option<u64>,
}

/// Security settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct SecurityYaml {
    /// CORS allowed origins (comma-separated list or "*" for all)
    pub cors_allowed_origins: Option<String>,
}

impl YamlConfig {
    /// Load YAML configuration from a file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: YamlConfig = serde_yaml::from_str(&contents)?;
        Ok(config)
    }
}
