//! Shared application state.

use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tracing::info;

use crate::config::ServerConfig;
use crate::core::admission::AdmissionController;
use crate::core::cache::AudioCache;
use crate::core::model::{HttpSynthesisModel, ModelError, SynthesisModel};
use crate::core::pipeline::Pipeline;
use crate::core::registry::{InMemoryRegistry, ProfileRegistry, RegistryError};
use crate::core::storage::{AudioStore, StorageError};
use crate::core::synthesis::SynthesisGateway;

/// Failures while assembling the application state
#[derive(Error, Debug)]
pub enum InitError {
    #[error("Failed to create synthesis model client: {0}")]
    Model(#[from] ModelError),

    #[error("Failed to load voice registry: {0}")]
    Registry(#[from] RegistryError),

    #[error("Failed to configure audio storage: {0}")]
    Storage(#[from] StorageError),
}

/// State shared by every handler
pub struct AppState {
    pub config: ServerConfig,
    pub registry: Arc<InMemoryRegistry>,
    pub pipeline: Pipeline,
    pub audio_store: Option<AudioStore>,
    pub started_at: Instant,
}

impl AppState {
    /// Build state from configuration: HTTP model client, registry file or
    /// built-in profiles, and storage when a bucket is configured.
    pub fn new(config: ServerConfig) -> Result<Arc<Self>, InitError> {
        let model = HttpSynthesisModel::new(
            config.model_url.clone(),
            config.model_reclaim_url.clone(),
            config.model_timeout(),
        )?;

        let registry = match &config.registry_path {
            Some(path) => InMemoryRegistry::from_file(path)?,
            None => {
                info!("No registry file configured, using built-in voices and characters");
                InMemoryRegistry::with_builtin_profiles()
            }
        };

        let audio_store = config
            .storage_settings()
            .map(|settings| AudioStore::from_settings(&settings))
            .transpose()?;

        Ok(Self::with_parts(
            config,
            Arc::new(model),
            Arc::new(registry),
            audio_store,
        ))
    }

    /// Build state around an explicit model, registry and store
    pub fn with_parts(
        config: ServerConfig,
        model: Arc<dyn SynthesisModel>,
        registry: Arc<InMemoryRegistry>,
        audio_store: Option<AudioStore>,
    ) -> Arc<Self> {
        let gateway = SynthesisGateway::new(
            model,
            Arc::clone(&registry) as Arc<dyn ProfileRegistry>,
            config.gateway_settings(),
        );
        let pipeline = Pipeline::new(
            gateway,
            AudioCache::new(config.effective_cache_capacity()),
            AdmissionController::new(config.admission_config()),
            config.pipeline_settings(),
        );

        info!(
            model = %pipeline.gateway().model_description(),
            cache_capacity = config.effective_cache_capacity(),
            pool_size = config.admission_pool_size,
            policy = %config.admission_policy,
            storage = audio_store.is_some(),
            "Application state ready"
        );

        Arc::new(Self {
            config,
            registry,
            pipeline,
            audio_store,
            started_at: Instant::now(),
        })
    }
}
