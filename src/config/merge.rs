//! Merging YAML overrides onto the environment-derived base configuration.

use std::path::PathBuf;

use super::yaml::YamlConfig;
use super::{ConfigError, ServerConfig, env};
use crate::core::admission::OverflowPolicy;

/// Build the effective configuration.
///
/// Environment variables (with defaults) form the base; any value present in
/// the YAML file replaces it.
pub(super) fn merge_config(yaml: Option<YamlConfig>) -> Result<ServerConfig, ConfigError> {
    let mut config = env::load_from_env()?;
    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(server) = yaml.server {
        override_with(&mut config.host, server.host);
        override_with(&mut config.port, server.port);
    }

    if let Some(model) = yaml.model {
        override_with(&mut config.model_url, model.url);
        if model.reclaim_url.is_some() {
            config.model_reclaim_url = model.reclaim_url;
        }
        override_with(&mut config.model_timeout_seconds, model.timeout_seconds);
        if let Some(languages) = model.supported_languages {
            config.supported_languages = languages
                .into_iter()
                .map(|l| l.trim().to_lowercase())
                .filter(|l| !l.is_empty())
                .collect();
        }
    }

    if let Some(generation) = yaml.generation {
        override_with(&mut config.max_text_length, generation.max_text_length);
        override_with(&mut config.default_max_tokens, generation.default_max_tokens);
        override_with(&mut config.min_max_tokens, generation.min_max_tokens);
        override_with(&mut config.max_max_tokens, generation.max_max_tokens);
        override_with(&mut config.peak_limit, generation.peak_limit);
        override_with(&mut config.default_character, generation.default_character);
    }

    if let Some(cache) = yaml.cache {
        override_with(&mut config.cache_enabled, cache.enabled);
        override_with(&mut config.cache_capacity, cache.capacity);
    }

    if let Some(streaming) = yaml.streaming {
        override_with(&mut config.stream_max_chars, streaming.max_chars);
        override_with(&mut config.stream_max_sentences, streaming.max_sentences);
    }

    if let Some(admission) = yaml.admission {
        override_with(&mut config.admission_pool_size, admission.pool_size);
        override_with(&mut config.admission_queue_depth, admission.queue_depth);
        if let Some(policy) = admission.policy {
            config.admission_policy = policy
                .parse::<OverflowPolicy>()
                .map_err(ConfigError::Invalid)?;
        }
    }

    if let Some(registry) = yaml.registry {
        if let Some(path) = registry.path {
            config.registry_path = Some(PathBuf::from(path));
        }
    }

    if let Some(storage) = yaml.storage {
        if storage.bucket.is_some() {
            config.s3_bucket = storage.bucket;
        }
        override_with(&mut config.s3_region, storage.region);
        if storage.endpoint.is_some() {
            config.s3_endpoint = storage.endpoint;
        }
        if storage.access_key.is_some() {
            config.s3_access_key = storage.access_key;
        }
        if storage.secret_key.is_some() {
            config.s3_secret_key = storage.secret_key;
        }
        override_with(&mut config.s3_prefix, storage.prefix);
        if storage.public_base_url.is_some() {
            config.s3_public_base_url = storage.public_base_url;
        }
        if storage.presign_ttl_seconds.is_some() {
            config.s3_presign_ttl_seconds = storage.presign_ttl_seconds;
        }
    }

    if let Some(security) = yaml.security {
        if security.cors_allowed_origins.is_some() {
            config.cors_allowed_origins = security.cors_allowed_origins;
        }
    }

    Ok(config)
}

fn override_with<T>(target: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *target = value;
    }
}
