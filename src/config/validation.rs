//! Configuration validation.

use super::{ConfigError, ServerConfig};
use crate::core::admission::OverflowPolicy;

/// Run every check against the merged configuration
pub(super) fn validate(config: &ServerConfig) -> Result<(), ConfigError> {
    validate_token_range(
        config.min_max_tokens,
        config.default_max_tokens,
        config.max_max_tokens,
    )?;
    validate_peak_limit(config.peak_limit)?;
    validate_text_limits(config)?;
    validate_admission(
        config.admission_pool_size,
        config.admission_policy,
        config.admission_queue_depth,
    )?;
    validate_storage_credentials(&config.s3_access_key, &config.s3_secret_key)?;
    Ok(())
}

pub(super) fn validate_token_range(min: u32, default: u32, max: u32) -> Result<(), ConfigError> {
    if min > default || default > max {
        return Err(ConfigError::Invalid(format!(
            "token limits must satisfy min <= default <= max (got {min} / {default} / {max})"
        )));
    }
    Ok(())
}

pub(super) fn validate_peak_limit(peak_limit: f32) -> Result<(), ConfigError> {
    if !(peak_limit > 0.0 && peak_limit <= 1.0) {
        return Err(ConfigError::Invalid(format!(
            "peak_limit must be in (0, 1], got {peak_limit}"
        )));
    }
    Ok(())
}

fn validate_text_limits(config: &ServerConfig) -> Result<(), ConfigError> {
    if config.max_text_length == 0 {
        return Err(ConfigError::Invalid("max_text_length must be at least 1".to_string()));
    }
    if config.stream_max_chars == 0 || config.stream_max_sentences == 0 {
        return Err(ConfigError::Invalid(
            "streaming chunk limits must be at least 1".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn validate_admission(
    pool_size: usize,
    policy: OverflowPolicy,
    queue_depth: usize,
) -> Result<(), ConfigError> {
    if pool_size == 0 {
        return Err(ConfigError::Invalid(
            "admission pool_size must be at least 1".to_string(),
        ));
    }
    if policy == OverflowPolicy::Queue && queue_depth == 0 {
        return Err(ConfigError::Invalid(
            "admission queue_depth must be at least 1 with the queue policy".to_string(),
        ));
    }
    Ok(())
}

pub(super) fn validate_storage_credentials(
    access_key: &Option<String>,
    secret_key: &Option<String>,
) -> Result<(), ConfigError> {
    if access_key.is_some() != secret_key.is_some() {
        return Err(ConfigError::Invalid(
            "storage access key and secret key must be set together".to_string(),
        ));
    }
    Ok(())
}
