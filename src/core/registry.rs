//! Voice and character registry.
//!
//! The pipeline depends only on the point lookups of [`ProfileRegistry`]. The
//! in-memory implementation also exposes the administrative surface (listing,
//! voice reassignment, reload from YAML) used by the HTTP layer.
//!
//! A character's voice binding is mutable. Cache entries produced under an old
//! binding stay servable under their old fingerprint; new requests resolve the
//! new voice and therefore a new fingerprint.

use std::path::Path;

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

/// Registry errors
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("Character '{0}' not found")]
    CharacterNotFound(String),

    #[error("Voice '{0}' not found")]
    VoiceNotFound(String),

    #[error("Failed to read registry file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse registry file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("Invalid registry: {0}")]
    Invalid(String),
}

/// Reference audio sample defining vocal timbre
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceProfile {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub language: String,
    /// Locator of the reference audio sample (URL or path)
    pub audio_url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_quality")]
    pub quality: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

fn default_quality() -> String {
    "high".to_string()
}

/// Named synthesis persona
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharacterProfile {
    #[serde(default)]
    pub id: String,
    pub name: String,
    pub language: String,
    /// Bound voice id
    pub voice_id: String,
    /// Expressiveness control in [0, 1]
    pub exaggeration: f32,
    /// Randomness control in [0, 1]
    pub temperature: f32,
    /// Adherence-to-voice control in [0, 1]
    pub cfg_weight: f32,
    #[serde(default)]
    pub description: String,
}

impl CharacterProfile {
    /// Clamp synthesis controls into [0, 1] and normalize the language code.
    pub fn normalized(mut self) -> Self {
        for (name, value) in [
            ("exaggeration", &mut self.exaggeration),
            ("temperature", &mut self.temperature),
            ("cfg_weight", &mut self.cfg_weight),
        ] {
            let current = *value;
            let clamped = if current.is_finite() { current.clamp(0.0, 1.0) } else { 0.5 };
            if clamped != current {
                warn!(
                    character = %self.id,
                    control = name,
                    value = current,
                    clamped,
                    "Character control out of range, clamping"
                );
                *value = clamped;
            }
        }
        self.language = self.language.to_lowercase();
        self
    }
}

/// Read-only lookups used by the pipeline
pub trait ProfileRegistry: Send + Sync {
    fn voice(&self, id: &str) -> Option<VoiceProfile>;
    fn character(&self, id: &str) -> Option<CharacterProfile>;
}

/// Registry file layout
///
/// ```yaml
/// voices:
///   narrator:
///     name: "Professional Narrator"
///     language: "en"
///     audio_url: "https://example.com/en_f1.flac"
/// characters:
///   narrator:
///     name: "Narrator"
///     language: "en"
///     voice_id: "narrator"
///     exaggeration: 0.5
///     temperature: 0.7
///     cfg_weight: 0.6
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RegistryFile {
    pub voices: std::collections::BTreeMap<String, VoiceProfile>,
    pub characters: std::collections::BTreeMap<String, CharacterProfile>,
}

/// Thread-safe in-memory registry
#[derive(Default)]
pub struct InMemoryRegistry {
    voices: DashMap<String, VoiceProfile>,
    characters: DashMap<String, CharacterProfile>,
}

impl InMemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry populated with the stock voices and characters
    pub fn with_builtin_profiles() -> Self {
        let registry = Self::new();
        for voice in builtin_voices() {
            registry.upsert_voice(voice);
        }
        for character in builtin_characters() {
            // Built-in bindings always reference built-in voices
            let _ = registry.upsert_character(character);
        }
        registry
    }

    /// Load a registry from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, RegistryError> {
        let registry = Self::new();
        registry.reload_from_file(path)?;
        Ok(registry)
    }

    /// Replace the registry contents with the profiles in `path`.
    ///
    /// The file is fully parsed and validated before anything is replaced.
    pub fn reload_from_file(&self, path: &Path) -> Result<(), RegistryError> {
        let contents = std::fs::read_to_string(path)?;
        self.load_yaml(&contents)?;
        info!(
            path = %path.display(),
            voices = self.voices.len(),
            characters = self.characters.len(),
            "Loaded voice registry"
        );
        Ok(())
    }

    /// Replace the registry contents with profiles parsed from YAML
    pub fn load_yaml(&self, contents: &str) -> Result<(), RegistryError> {
        let file: RegistryFile = serde_yaml::from_str(contents)?;

        for (id, character) in &file.characters {
            if !file.voices.contains_key(&character.voice_id) {
                return Err(RegistryError::Invalid(format!(
                    "character '{id}' references unknown voice '{}'",
                    character.voice_id
                )));
            }
        }

        self.voices.clear();
        for (id, mut voice) in file.voices {
            voice.id = id;
            self.voices.insert(voice.id.clone(), voice);
        }

        self.characters.clear();
        for (id, mut character) in file.characters {
            character.id = id;
            let character = character.normalized();
            self.characters.insert(character.id.clone(), character);
        }

        Ok(())
    }

    /// Insert or replace a voice
    pub fn upsert_voice(&self, voice: VoiceProfile) {
        self.voices.insert(voice.id.clone(), voice);
    }

    /// Insert or replace a character; its voice must already exist
    pub fn upsert_character(&self, character: CharacterProfile) -> Result<(), RegistryError> {
        if !self.voices.contains_key(&character.voice_id) {
            return Err(RegistryError::VoiceNotFound(character.voice_id));
        }
        let character = character.normalized();
        self.characters.insert(character.id.clone(), character);
        Ok(())
    }

    /// Rebind a character to another voice
    pub fn assign_voice(
        &self,
        character_id: &str,
        voice_id: &str,
    ) -> Result<CharacterProfile, RegistryError> {
        if !self.voices.contains_key(voice_id) {
            return Err(RegistryError::VoiceNotFound(voice_id.to_string()));
        }

        let mut entry = self
            .characters
            .get_mut(character_id)
            .ok_or_else(|| RegistryError::CharacterNotFound(character_id.to_string()))?;
        entry.voice_id = voice_id.to_string();

        info!(character = %character_id, voice = %voice_id, "Reassigned character voice");
        Ok(entry.clone())
    }

    /// All voices sorted by id
    pub fn list_voices(&self) -> Vec<VoiceProfile> {
        let mut voices: Vec<_> = self.voices.iter().map(|e| e.value().clone()).collect();
        voices.sort_by(|a, b| a.id.cmp(&b.id));
        voices
    }

    /// All characters sorted by id
    pub fn list_characters(&self) -> Vec<CharacterProfile> {
        let mut characters: Vec<_> = self.characters.iter().map(|e| e.value().clone()).collect();
        characters.sort_by(|a, b| a.id.cmp(&b.id));
        characters
    }

    /// Ids of characters currently bound to `voice_id`, sorted
    pub fn characters_using_voice(&self, voice_id: &str) -> Vec<String> {
        let mut ids: Vec<_> = self
            .characters
            .iter()
            .filter(|e| e.value().voice_id == voice_id)
            .map(|e| e.key().clone())
            .collect();
        ids.sort();
        ids
    }

    pub fn voice_ids(&self) -> Vec<String> {
        self.list_voices().into_iter().map(|v| v.id).collect()
    }

    pub fn character_ids(&self) -> Vec<String> {
        self.list_characters().into_iter().map(|c| c.id).collect()
    }
}

impl ProfileRegistry for InMemoryRegistry {
    fn voice(&self, id: &str) -> Option<VoiceProfile> {
        self.voices.get(id).map(|v| v.value().clone())
    }

    fn character(&self, id: &str) -> Option<CharacterProfile> {
        self.characters.get(id).map(|c| c.value().clone())
    }
}

const DEMO_PROMPT_URL: &str =
    "https://storage.googleapis.com/chatterbox-demo-samples/mtl_prompts/en_f1.flac";

fn builtin_voices() -> Vec<VoiceProfile> {
    [
        ("narrator", "Professional Narrator", "Clear, professional voice for narration", &["professional", "formal", "narrative"]),
        ("friendly", "Friendly Voice", "Warm and approachable voice", &["friendly", "warm", "casual"]),
        ("expert", "Expert Voice", "Authoritative voice for knowledge sharing", &["expert", "authoritative", "formal"]),
        ("child", "Child Voice", "Youthful, energetic voice", &["child", "energetic", "playful"]),
        ("mysterious", "Mysterious Voice", "Enigmatic and intriguing voice", &["mysterious", "dramatic", "theatrical"]),
        ("calm", "Calm Voice", "Soothing and meditative voice", &["calm", "soothing", "meditative"]),
    ]
    .into_iter()
    .map(|(id, name, description, tags)| VoiceProfile {
        id: id.to_string(),
        name: name.to_string(),
        language: "en".to_string(),
        audio_url: DEMO_PROMPT_URL.to_string(),
        description: description.to_string(),
        quality: default_quality(),
        tags: tags.iter().map(|t| t.to_string()).collect(),
    })
    .collect()
}

fn builtin_characters() -> Vec<CharacterProfile> {
    [
        ("narrator", "Narrator", "narrator", 0.5, 0.7, 0.6, "Professional narrator voice"),
        ("assistant", "AI Assistant", "friendly", 0.6, 0.8, 0.5, "Friendly AI assistant"),
        ("expert", "Expert", "expert", 0.4, 0.6, 0.7, "Knowledgeable expert"),
        ("luna", "Luna", "mysterious", 0.5, 0.8, 0.6, "Mysterious character voice"),
        ("sage", "Sage", "calm", 0.3, 0.6, 0.8, "Wise and calm character"),
        ("elara", "Elara", "friendly", 0.7, 0.9, 0.5, "Cheerful and warm character"),
    ]
    .into_iter()
    .map(
        |(id, name, voice_id, exaggeration, temperature, cfg_weight, description)| CharacterProfile {
            id: id.to_string(),
            name: name.to_string(),
            language: "en".to_string(),
            voice_id: voice_id.to_string(),
            exaggeration,
            temperature,
            cfg_weight,
            description: description.to_string(),
        },
    )
    .collect()
}
