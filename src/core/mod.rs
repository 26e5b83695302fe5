pub mod admission;
pub mod cache;
pub mod error;
pub mod languages;
pub mod model;
pub mod pipeline;
pub mod registry;
pub mod segmenter;
pub mod storage;
pub mod stream;
pub mod synthesis;
pub mod types;

// Re-export commonly used types for convenience
pub use admission::{
    AdmissionConfig, AdmissionController, AdmissionPermit, AdmissionStats, OverflowPolicy,
};
pub use cache::{AudioCache, CacheStats, Fingerprint, LookupSource};
pub use error::{PipelineError, PipelineResult};
pub use model::{HttpSynthesisModel, ModelError, ModelOutput, ModelRequest, SynthesisModel};
pub use pipeline::{BatchItem, BatchOutcome, Pipeline, PipelineSettings, PipelineStats};
pub use registry::{
    CharacterProfile, InMemoryRegistry, ProfileRegistry, RegistryError, VoiceProfile,
};
pub use segmenter::{ChunkPlan, StreamPlan};
pub use storage::{AudioStore, StorageError, StorageSettings};
pub use stream::{Chunk, ChunkStream, ChunkSynthesizer};
pub use synthesis::{GatewaySettings, ResolvedRequest, SynthesisGateway};
pub use types::{GenerationRequest, GenerationResult, ResponseShape};
