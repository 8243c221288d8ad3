//! Release manifest data model
//!
//! Defines the JSON shape of `manifest.json` as read by update clients:
//! a top-level object keyed by release identifier, each value a
//! [`ReleaseRecord`] holding per-group maps of [`ArtifactEntry`] keyed by
//! platform label.

pub mod entry;
pub mod record;

pub use entry::ArtifactEntry;
pub use record::{FailureStage, RecordedFailure, ReleaseRecord, RESERVED_RECORD_KEYS};

/// Length of a hex-encoded SHA-256 digest.
pub const SHA256_HEX_LEN: usize = 64;

/// Length of a hex-encoded Ed25519 signature.
pub const SIGNATURE_HEX_LEN: usize = 128;
