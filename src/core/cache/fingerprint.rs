//! Request fingerprints.
//!
//! A fingerprint is the SHA-256 digest of the normalized text, the resolved
//! character id and the resolved voice id, joined with a unit separator so that
//! component boundaries cannot be forged by the text itself.

use std::fmt;

use sha2::{Digest, Sha256};

const SEPARATOR: u8 = 0x1f;

/// Stable cache key for a generation request
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    /// Compute the fingerprint of a resolved request
    pub fn compute(text: &str, character_id: &str, voice_id: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(normalize_text(text).as_bytes());
        hasher.update([SEPARATOR]);
        hasher.update(character_id.as_bytes());
        hasher.update([SEPARATOR]);
        hasher.update(voice_id.as_bytes());
        Self(hasher.finalize().into())
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Lowercase hex form
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Fingerprint({})", &self.to_hex()[..12])
    }
}

/// Trim and collapse whitespace runs to a single space
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_stable() {
        let a = Fingerprint::compute("Hello there.", "narrator", "narrator");
        let b = Fingerprint::compute("Hello there.", "narrator", "narrator");
        assert_eq!(a, b);
        assert_eq!(a.to_hex().len(), 64);
    }

    #[test]
    fn test_whitespace_differences_share_a_fingerprint() {
        let a = Fingerprint::compute("  Hello   there.\n", "narrator", "narrator");
        let b = Fingerprint::compute("Hello there.", "narrator", "narrator");
        assert_eq!(a, b);
    }

    #[test]
    fn test_voice_override_changes_fingerprint() {
        let default_voice = Fingerprint::compute("Hello", "narrator", "narrator");
        let overridden = Fingerprint::compute("Hello", "narrator", "calm");
        assert_ne!(default_voice, overridden);
    }

    #[test]
    fn test_component_boundaries_are_not_ambiguous() {
        let a = Fingerprint::compute("ab", "c", "d");
        let b = Fingerprint::compute("a", "bc", "d");
        assert_ne!(a, b);
    }
}
