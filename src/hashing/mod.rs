//! Content fingerprints used as embedding cache keys.

use blake3::Hasher;
use serde::{Serialize, Serializer};

/// BLAKE3 digest of (model name, model version, normalized text).
///
/// Two units with the same normalized text embedded by the same model identity share a
/// fingerprint and therefore a cache slot. Changing the model name or version always
/// yields a different fingerprint, so vectors of different models never alias.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[inline]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// First 8 bytes as lowercase hex, for log fields.
    pub fn short(&self) -> String {
        let hex = blake3::Hash::from(self.0).to_hex();
        hex.as_str()[..16].to_string()
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(blake3::Hash::from(self.0).to_hex().as_str())
    }
}

impl std::fmt::Debug for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Fingerprint({})", self.short())
    }
}

impl Serialize for Fingerprint {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

/// Computes the fingerprint of `text` under the given model identity.
///
/// Each component is length-prefixed so `("ab", "c")` and `("a", "bc")` cannot collide.
#[inline]
pub fn fingerprint(model_name: &str, model_version: &str, text: &str) -> Fingerprint {
    let mut hasher = Hasher::new();
    for part in [model_name, model_version, text] {
        hasher.update(&(part.len() as u64).to_le_bytes());
        hasher.update(part.as_bytes());
    }
    Fingerprint(*hasher.finalize().as_bytes())
}
