//! Release manifest publisher
//!
//! Discovers the build artifacts of a release, computes their SHA-256
//! checksums, optionally signs them with Ed25519, and merges the resulting
//! record into a JSON manifest keyed by release identifier. Update clients
//! and CDNs read that manifest to locate and authenticate downloads.

pub mod checksum;
pub mod config;
pub mod discover;
pub mod entry;
pub mod manifest;
pub mod publish;
pub mod signing;

pub use config::{ConfigError, PublishConfig};
pub use manifest::{Manifest, ManifestError, ManifestStore};
pub use publish::{PublishError, PublishReport, Publisher};
pub use release_manifest_schema::{ArtifactEntry, FailureStage, RecordedFailure, ReleaseRecord};
pub use signing::{ArtifactSigner, SignedContents, SigningError, SigningMode};
