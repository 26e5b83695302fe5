//! Environment variable loading.
//!
//! Every field has a default so the server starts with no environment at all.
//! Blank variables are treated as unset.

use std::path::PathBuf;
use std::str::FromStr;

use super::{ConfigError, ServerConfig};
use crate::core::admission::OverflowPolicy;
use crate::core::languages::default_language_codes;
use crate::core::storage::DEFAULT_AUDIO_PREFIX;

pub(super) const DEFAULT_HOST: &str = "0.0.0.0";
pub(super) const DEFAULT_PORT: u16 = 5000;
pub(super) const DEFAULT_MODEL_URL: &str = "http://127.0.0.1:8000/generate";
pub(super) const DEFAULT_MODEL_TIMEOUT_SECONDS: u64 = 120;
pub(super) const DEFAULT_REGION: &str = "us-east-1";

/// Read a variable, treating blank values as unset
pub(super) fn env_var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse a variable, falling back to `default` when unset
pub(super) fn parse_env<T>(name: &str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_var(name) {
        Some(raw) => raw.parse().map_err(|e: T::Err| ConfigError::InvalidEnv {
            var: name.to_string(),
            value: raw.clone(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

/// Parse a boolean accepting true/false, 1/0, yes/no, on/off
pub(super) fn parse_bool_env(name: &str, default: bool) -> Result<bool, ConfigError> {
    match env_var(name) {
        Some(raw) => match raw.to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Ok(true),
            "false" | "0" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidEnv {
                var: name.to_string(),
                value: raw,
                reason: "expected a boolean".to_string(),
            }),
        },
        None => Ok(default),
    }
}

/// Split a comma-separated list, dropping blanks and lowercasing
pub(super) fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect()
}

/// Build a configuration from environment variables and defaults
pub(super) fn load_from_env() -> Result<ServerConfig, ConfigError> {
    let admission_policy = match env_var("ADMISSION_POLICY") {
        Some(raw) => raw
            .parse::<OverflowPolicy>()
            .map_err(|reason| ConfigError::InvalidEnv {
                var: "ADMISSION_POLICY".to_string(),
                value: raw.clone(),
                reason,
            })?,
        None => OverflowPolicy::Queue,
    };

    let s3_presign_ttl_seconds = match env_var("S3_PRESIGN_TTL_SECONDS") {
        Some(_) => Some(parse_env("S3_PRESIGN_TTL_SECONDS", 0u64)?),
        None => None,
    };

    Ok(ServerConfig {
        host: env_var("HOST").unwrap_or_else(|| DEFAULT_HOST.to_string()),
        port: parse_env("PORT", DEFAULT_PORT)?,

        model_url: env_var("MODEL_URL").unwrap_or_else(|| DEFAULT_MODEL_URL.to_string()),
        model_reclaim_url: env_var("MODEL_RECLAIM_URL"),
        model_timeout_seconds: parse_env("MODEL_TIMEOUT_SECONDS", DEFAULT_MODEL_TIMEOUT_SECONDS)?,
        supported_languages: env_var("SUPPORTED_LANGUAGES")
            .map(|raw| parse_list(&raw))
            .unwrap_or_else(default_language_codes),

        max_text_length: parse_env("MAX_TEXT_LENGTH", 500)?,
        default_max_tokens: parse_env("DEFAULT_MAX_TOKENS", 400)?,
        min_max_tokens: parse_env("MIN_MAX_TOKENS", 100)?,
        max_max_tokens: parse_env("MAX_MAX_TOKENS", 1000)?,
        peak_limit: parse_env("PEAK_LIMIT", 0.95)?,
        default_character: env_var("DEFAULT_CHARACTER").unwrap_or_else(|| "narrator".to_string()),

        cache_enabled: parse_bool_env("CACHE_ENABLED", true)?,
        cache_capacity: parse_env("CACHE_CAPACITY", crate::core::cache::DEFAULT_CACHE_CAPACITY)?,

        stream_max_chars: parse_env(
            "STREAM_MAX_CHARS",
            crate::core::segmenter::DEFAULT_MAX_CHUNK_CHARS,
        )?,
        stream_max_sentences: parse_env(
            "STREAM_MAX_SENTENCES",
            crate::core::segmenter::DEFAULT_MAX_CHUNK_SENTENCES,
        )?,

        admission_pool_size: parse_env("ADMISSION_POOL_SIZE", 4)?,
        admission_policy,
        admission_queue_depth: parse_env("ADMISSION_QUEUE_DEPTH", 32)?,

        registry_path: env_var("REGISTRY_PATH").map(PathBuf::from),

        s3_bucket: env_var("S3_BUCKET_NAME"),
        s3_region: env_var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
        s3_endpoint: env_var("S3_ENDPOINT"),
        s3_access_key: env_var("AWS_ACCESS_KEY_ID"),
        s3_secret_key: env_var("AWS_SECRET_ACCESS_KEY"),
        s3_prefix: env_var("S3_AUDIO_PREFIX").unwrap_or_else(|| DEFAULT_AUDIO_PREFIX.to_string()),
        s3_public_base_url: env_var("S3_PUBLIC_BASE_URL"),
        s3_presign_ttl_seconds,

        cors_allowed_origins: env_var("CORS_ALLOWED_ORIGINS"),
    })
}
