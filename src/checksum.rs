//! Checksums over model definitions
//!
//! Used to detect no-op reloads: a load request whose definition hashes to the
//! registered model's checksum is skipped without running a lifecycle cycle.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::definition::ModelDefinition;

/// SHA256 checksum of a canonical definition rendering
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Checksum(String);

impl Checksum {
    pub fn from_bytes(data: &[u8]) -> Self {
        let hash = Sha256::digest(data);
        Self(format!("{hash:x}"))
    }

    pub fn from_content(content: &str) -> Self {
        Self::from_bytes(content.as_bytes())
    }

    /// Checksum of a model definition's canonical JSON form
    pub fn from_definition(definition: &ModelDefinition) -> Self {
        let canonical = serde_json::to_string(definition).unwrap_or_default();
        Self::from_content(&canonical)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Checksum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::DataType;

    #[test]
    fn test_checksum_is_stable() {
        let mut model = ModelDefinition::new("test1:model1");
        model.add_namespace("urn:test:model1", "test1");
        model.create_type("test1:type1");

        assert_eq!(
            Checksum::from_definition(&model),
            Checksum::from_definition(&model.clone())
        );
    }

    #[test]
    fn test_checksum_tracks_content() {
        let mut a = ModelDefinition::new("test1:model1");
        a.add_namespace("urn:test:model1", "test1");
        let mut b = a.clone();
        b.create_type("test1:type1")
            .create_property("test1:prop1", DataType::Text);

        assert_ne!(Checksum::from_definition(&a), Checksum::from_definition(&b));
    }
}
