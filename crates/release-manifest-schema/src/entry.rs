//! Per-artifact manifest entry.

use serde::{Deserialize, Serialize};

/// Download metadata for one artifact file.
///
/// Rebuilt from scratch on every publish; never patched in place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    /// Public download URL (`<base_url>/<release_id>/<file_name>`)
    pub url: String,

    /// Hex SHA-256 of the artifact bytes
    pub sha256: String,

    /// Hex Ed25519 detached signature over the artifact bytes.
    ///
    /// Absent (not empty) when the release was published unsigned.
    #[serde(rename = "sig", default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

impl ArtifactEntry {
    pub fn is_signed(&self) -> bool {
        self.signature.is_some()
    }
}
