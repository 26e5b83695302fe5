//! Object storage for generated audio.
//!
//! Uploads are fire-and-forget: [`AudioStore::publish`] returns the URL the
//! object will be served from and uploads in the background. A failed upload is
//! logged and never fails the request that produced the audio.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use object_store::aws::AmazonS3Builder;
use object_store::memory::InMemory;
use object_store::path::Path as ObjectPath;
use object_store::signer::Signer;
use object_store::{ObjectStore, PutPayload};
use thiserror::Error;
use tracing::{debug, info, warn};

use super::cache::Fingerprint;

/// Default key prefix for uploaded audio
pub const DEFAULT_AUDIO_PREFIX: &str = "chatterbox/audio/";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage not configured: {0}")]
    Config(String),

    #[error("Object store error: {0}")]
    ObjectStore(#[from] object_store::Error),

    #[error("Invalid object path: {0}")]
    Path(#[from] object_store::path::Error),
}

/// Connection settings for the audio bucket
#[derive(Clone, Default, PartialEq)]
pub struct StorageSettings {
    pub bucket: String,
    pub region: String,
    pub endpoint: Option<String>,
    pub access_key_id: Option<String>,
    pub secret_access_key: Option<String>,
    pub prefix: String,
    pub public_base_url: Option<String>,
    pub presign_ttl: Option<Duration>,
}

impl fmt::Debug for StorageSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StorageSettings")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key_id", &self.access_key_id.as_ref().map(|_| "<redacted>"))
            .field("secret_access_key", &self.secret_access_key.as_ref().map(|_| "<redacted>"))
            .field("prefix", &self.prefix)
            .field("public_base_url", &self.public_base_url)
            .field("presign_ttl", &self.presign_ttl)
            .finish()
    }
}

impl StorageSettings {
    /// Base URL objects are reachable under when no signer is used
    fn base_url(&self) -> String {
        if let Some(url) = &self.public_base_url {
            return url.trim_end_matches('/').to_string();
        }
        match &self.endpoint {
            Some(endpoint) => format!("{}/{}", endpoint.trim_end_matches('/'), self.bucket),
            None => format!("https://{}.s3.{}.amazonaws.com", self.bucket, self.region),
        }
    }
}

/// Uploads audio and hands out retrievable URLs
#[derive(Clone)]
pub struct AudioStore {
    store: Arc<dyn ObjectStore>,
    signer: Option<Arc<dyn Signer>>,
    prefix: String,
    base_url: String,
    presign_ttl: Option<Duration>,
}

impl fmt::Debug for AudioStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioStore")
            .field("store", &self.store.to_string())
            .field("prefix", &self.prefix)
            .field("base_url", &self.base_url)
            .field("presigned", &self.signer.is_some())
            .finish()
    }
}

impl AudioStore {
    /// Connect to an S3-compatible bucket
    pub fn from_settings(settings: &StorageSettings) -> Result<Self, StorageError> {
        if settings.bucket.trim().is_empty() {
            return Err(StorageError::Config("bucket name is empty".to_string()));
        }

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&settings.bucket)
            .with_region(&settings.region);
        if let Some(endpoint) = &settings.endpoint {
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }
        if let (Some(key), Some(secret)) = (&settings.access_key_id, &settings.secret_access_key) {
            builder = builder
                .with_access_key_id(key)
                .with_secret_access_key(secret);
        }

        let s3 = Arc::new(builder.build()?);
        let signer: Option<Arc<dyn Signer>> = settings
            .presign_ttl
            .map(|_| Arc::clone(&s3) as Arc<dyn Signer>);

        info!(
            bucket = %settings.bucket,
            region = %settings.region,
            prefix = %settings.prefix,
            presigned = signer.is_some(),
            "Audio storage configured"
        );

        Ok(Self {
            store: s3,
            signer,
            prefix: settings.prefix.clone(),
            base_url: settings.base_url(),
            presign_ttl: settings.presign_ttl,
        })
    }

    /// Store backed by process memory; URLs use `base_url`
    pub fn in_memory(prefix: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            store: Arc::new(InMemory::new()),
            signer: None,
            prefix: prefix.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            presign_ttl: None,
        }
    }

    /// Object key for the audio of a fingerprint
    pub fn object_key(&self, fingerprint: &Fingerprint) -> String {
        format!("{}{}.wav", self.prefix, fingerprint.to_hex())
    }

    /// URL an object is served from: presigned when configured, else public
    pub async fn url_for(&self, key: &str) -> Result<String, StorageError> {
        let path = ObjectPath::parse(key)?;
        if let (Some(signer), Some(ttl)) = (&self.signer, self.presign_ttl) {
            let url = signer.signed_url(http::Method::GET, &path, ttl).await?;
            return Ok(url.to_string());
        }
        Ok(format!("{}/{}", self.base_url, path))
    }

    /// Upload and wait for completion
    pub async fn upload(&self, key: &str, audio: Bytes) -> Result<(), StorageError> {
        let path = ObjectPath::parse(key)?;
        let size = audio.len();
        self.store.put(&path, PutPayload::from(audio)).await?;
        debug!(key = %path, size, "Uploaded audio");
        Ok(())
    }

    /// Start a background upload and return the object's URL
    pub async fn publish(&self, fingerprint: &Fingerprint, audio: Bytes) -> Result<String, StorageError> {
        let key = self.object_key(fingerprint);
        let url = self.url_for(&key).await?;

        let store = self.clone();
        tokio::spawn(async move {
            if let Err(e) = store.upload(&key, audio).await {
                warn!(key = %key, error = %e, "Audio upload failed");
            }
        });

        Ok(url)
    }

    /// Read an object back
    pub async fn fetch(&self, key: &str) -> Result<Bytes, StorageError> {
        let path = ObjectPath::parse(key)?;
        Ok(self.store.get(&path).await?.bytes().await?)
    }
}
