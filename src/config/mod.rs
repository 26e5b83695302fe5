//! Configuration module for the Chatterbox gateway
//!
//! This module handles server configuration from various sources: .env files, YAML files,
//! and environment variables. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Merging YAML and environment configurations
//! - `validation`: Configuration validation logic
//!
//! # Example
//! ```rust,no_run
//! use chatterbox_gateway::config::ServerConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ServerConfig::from_env()?;
//!
//! // Load from YAML file with environment variable overrides
//! let config_path = PathBuf::from("config.yaml");
//! let config = ServerConfig::from_file(&config_path)?;
//!
//! println!("Server listening on {}", config.address());
//! # Ok(())
//! # }
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use thiserror::Error;

mod env;
mod merge;
mod validation;
mod yaml;

pub use yaml::YamlConfig;

use crate::core::admission::{AdmissionConfig, OverflowPolicy};
use crate::core::pipeline::PipelineSettings;
use crate::core::storage::StorageSettings;
use crate::core::synthesis::GatewaySettings;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse YAML: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid value for {var}='{value}': {reason}")]
    InvalidEnv {
        var: String,
        value: String,
        reason: String,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Server configuration
///
/// Contains all configuration needed to run the gateway, including:
/// - Server settings (host, port)
/// - Synthesis model endpoint
/// - Request limits and audio normalization
/// - Cache, streaming and admission settings
/// - Voice registry source
/// - Audio storage (S3)
/// - Security settings (CORS)
#[derive(Debug, Clone)]
pub struct ServerConfig {
    // Server settings
    pub host: String,
    pub port: u16,

    // Synthesis model
    pub model_url: String,
    /// Optional endpoint asked to release accelerator memory after each call
    pub model_reclaim_url: Option<String>,
    pub model_timeout_seconds: u64,
    /// Lowercase language codes accepted as overrides
    pub supported_languages: Vec<String>,

    // Request limits
    pub max_text_length: usize,
    pub default_max_tokens: u32,
    pub min_max_tokens: u32,
    pub max_max_tokens: u32,
    /// Target peak when loud model output is scaled down
    pub peak_limit: f32,
    pub default_character: String,

    // Cache
    pub cache_enabled: bool,
    pub cache_capacity: usize,

    // Streaming
    pub stream_max_chars: usize,
    pub stream_max_sentences: usize,

    // Admission control
    pub admission_pool_size: usize,
    pub admission_policy: OverflowPolicy,
    pub admission_queue_depth: usize,

    /// YAML file with voices and characters; built-in profiles when unset
    pub registry_path: Option<PathBuf>,

    // Audio storage
    pub s3_bucket: Option<String>,
    pub s3_region: String,
    pub s3_endpoint: Option<String>,
    pub s3_access_key: Option<String>,
    pub s3_secret_key: Option<String>,
    /// Key prefix for uploaded audio, e.g. `chatterbox/audio/`
    pub s3_prefix: String,
    pub s3_public_base_url: Option<String>,
    /// Hand out presigned URLs valid this long instead of public URLs
    pub s3_presign_ttl_seconds: Option<u64>,

    // Security configuration
    /// CORS allowed origins (comma-separated list or "*" for all)
    /// Default: None (CORS disabled, same-origin only)
    pub cors_allowed_origins: Option<String>,
}

/// Implement Drop to zeroize secret fields when ServerConfig is dropped.
impl Drop for ServerConfig {
    fn drop(&mut self) {
        use zeroize::Zeroize;

        if let Some(ref mut key) = self.s3_access_key {
            key.zeroize();
        }
        if let Some(ref mut secret) = self.s3_secret_key {
            secret.zeroize();
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables and defaults
    ///
    /// The .env file is loaded in main.rs before this is called.
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = merge::merge_config(None)?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// After loading and merging, performs validation on the final configuration.
    ///
    /// # Errors
    /// Returns an error if:
    /// - The YAML file cannot be read or is malformed
    /// - Environment variables have invalid formats
    /// - Configuration validation fails
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        validation::validate(&config)?;
        Ok(config)
    }

    /// Get the server address as a string
    ///
    /// Returns the address in the format "host:port"
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_seconds)
    }

    /// Effective cache capacity; zero when caching is disabled
    pub fn effective_cache_capacity(&self) -> usize {
        if self.cache_enabled {
            self.cache_capacity
        } else {
            0
        }
    }

    pub fn gateway_settings(&self) -> GatewaySettings {
        GatewaySettings {
            min_tokens: self.min_max_tokens,
            default_tokens: self.default_max_tokens,
            max_tokens: self.max_max_tokens,
            supported_languages: self.supported_languages.clone(),
            peak_limit: self.peak_limit,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            max_text_length: self.max_text_length,
            stream_max_chars: self.stream_max_chars,
            stream_max_sentences: self.stream_max_sentences,
        }
    }

    pub fn admission_config(&self) -> AdmissionConfig {
        AdmissionConfig {
            pool_size: self.admission_pool_size,
            policy: self.admission_policy,
            queue_depth: self.admission_queue_depth,
        }
    }

    /// Storage settings when a bucket is configured
    pub fn storage_settings(&self) -> Option<StorageSettings> {
        let bucket = self.s3_bucket.clone()?;
        Some(StorageSettings {
            bucket,
            region: self.s3_region.clone(),
            endpoint: self.s3_endpoint.clone(),
            access_key_id: self.s3_access_key.clone(),
            secret_access_key: self.s3_secret_key.clone(),
            prefix: self.s3_prefix.clone(),
            public_base_url: self.s3_public_base_url.clone(),
            presign_ttl: self.s3_presign_ttl_seconds.map(Duration::from_secs),
        })
    }

    /// Effective configuration with secrets masked
    pub fn redacted_summary(&self) -> Value {
        let mask = |secret: &Option<String>| secret.as_ref().map(|_| "<redacted>");
        json!({
            "server": { "host": self.host, "port": self.port },
            "model": {
                "url": self.model_url,
                "reclaim_url": self.model_reclaim_url,
                "timeout_seconds": self.model_timeout_seconds,
                "supported_languages": self.supported_languages,
            },
            "generation": {
                "max_text_length": self.max_text_length,
                "default_max_tokens": self.default_max_tokens,
                "min_max_tokens": self.min_max_tokens,
                "max_max_tokens": self.max_max_tokens,
                "peak_limit": self.peak_limit,
                "default_character": self.default_character,
            },
            "cache": { "enabled": self.cache_enabled, "capacity": self.cache_capacity },
            "streaming": {
                "max_chars": self.stream_max_chars,
                "max_sentences": self.stream_max_sentences,
            },
            "admission": {
                "pool_size": self.admission_pool_size,
                "policy": self.admission_policy,
                "queue_depth": self.admission_queue_depth,
            },
            "registry": { "path": self.registry_path.as_ref().map(|p| p.display().to_string()) },
            "storage": {
                "bucket": self.s3_bucket,
                "region": self.s3_region,
                "endpoint": self.s3_endpoint,
                "access_key": mask(&self.s3_access_key),
                "secret_key": mask(&self.s3_secret_key),
                "prefix": self.s3_prefix,
                "public_base_url": self.s3_public_base_url,
                "presign_ttl_seconds": self.s3_presign_ttl_seconds,
            },
            "security": { "cors_allowed_origins": self.cors_allowed_origins },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;
    use std::fs;
    use tempfile::TempDir;

    fn test_config() -> ServerConfig {
        ServerConfig {
            host: "localhost".to_string(),
            port: 5000,
            model_url: "http://127.0.0.1:8000/generate".to_string(),
            model_reclaim_url: None,
            model_timeout_seconds: 120,
            supported_languages: vec!["en".to_string()],
            max_text_length: 500,
            default_max_tokens: 400,
            min_max_tokens: 100,
            max_max_tokens: 1000,
            peak_limit: 0.95,
            default_character: "narrator".to_string(),
            cache_enabled: true,
            cache_capacity: 100,
            stream_max_chars: 150,
            stream_max_sentences: 3,
            admission_pool_size: 4,
            admission_policy: OverflowPolicy::Queue,
            admission_queue_depth: 32,
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

    #[test]
    fn test_address() {
        assert_eq!(test_config().address(), "localhost:5000");
    }

    #[test]
    fn test_effective_cache_capacity() {
        let mut config = test_config();
        assert_eq!(config.effective_cache_capacity(), 100);
        config.cache_enabled = false;
        assert_eq!(config.effective_cache_capacity(), 0);
    }

    #[test]
    fn test_storage_settings_require_bucket() {
        let mut config = test_config();
        assert!(config.storage_settings().is_none());

        config.s3_bucket = Some("tts-audio".to_string());
        config.s3_presign_ttl_seconds = Some(600);
        let storage = config.storage_settings().unwrap();
        assert_eq!(storage.bucket, "tts-audio");
        assert_eq!(storage.presign_ttl, Some(Duration::from_secs(600)));
    }

    #[test]
    fn test_redacted_summary_masks_secrets() {
        let mut config = test_config();
        config.s3_access_key = Some("AKIAEXAMPLE".to_string());
        config.s3_secret_key = Some("topsecret".to_string());

        let summary = config.redacted_summary().to_string();
        assert!(!summary.contains("topsecret"));
        assert!(!summary.contains("AKIAEXAMPLE"));
        assert!(summary.contains("<redacted>"));
    }

    // Helper to clean up environment variables
    fn cleanup_env_vars() {
        unsafe {
            for var in [
                "HOST",
                "PORT",
                "MODEL_URL",
                "CACHE_CAPACITY",
                "ADMISSION_POOL_SIZE",
                "AWS_ACCESS_KEY_ID",
                "AWS_SECRET_ACCESS_KEY",
            ] {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_from_file_yaml_overrides_env() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        fs::write(
            &config_path,
            r#"
server:
  host: "127.0.0.1"
  port: 8080
model:
  url: "http://yaml-model:8000/generate"
"#,
        )
        .unwrap();

        unsafe {
            env::set_var("HOST", "0.0.0.0");
            env::set_var("MODEL_URL", "http://env-model:8000/generate");
            env::set_var("CACHE_CAPACITY", "7");
        }

        let config = ServerConfig::from_file(&config_path).unwrap();

        // YAML overrides ENV
        assert_eq!(config.host, "127.0.0.1");
        assert_eq!(config.model_url, "http://yaml-model:8000/generate");
        // ENV value when YAML is silent
        assert_eq!(config.cache_capacity, 7);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_from_file_missing_file() {
        cleanup_env_vars();

        let result = ServerConfig::from_file(Path::new("/nonexistent/config.yaml"));
        assert!(
            result
                .unwrap_err()
                .to_string()
                .contains("Failed to read config file")
        );
    }

    #[test]
    #[serial]
    fn test_from_file_rejects_invalid_limits() {
        cleanup_env_vars();

        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        fs::write(
            &config_path,
            r#"
admission:
  pool_size: 0
"#,
        )
        .unwrap();

        let err = ServerConfig::from_file(&config_path).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    #[serial]
    fn test_from_env_rejects_unpaired_secret() {
        cleanup_env_vars();
        unsafe {
            env::set_var("AWS_ACCESS_KEY_ID", "AKIAEXAMPLE");
        }

        assert!(matches!(
            ServerConfig::from_env(),
            Err(ConfigError::Invalid(_))
        ));

        cleanup_env_vars();
    }
}
