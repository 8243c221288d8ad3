//! Release-level record stored under each release identifier.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::entry::ArtifactEntry;

/// Keys with fixed meaning inside a release record.
///
/// Artifact group names share the record's key space and must avoid these.
pub const RESERVED_RECORD_KEYS: &[&str] = &["time", "insecure", "failures"];

/// Stage at which an artifact failed to produce an entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Hashing the artifact bytes
    Checksum,
    /// Signing the artifact bytes
    Signature,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Checksum => write!(f, "checksum"),
            Self::Signature => write!(f, "signature"),
        }
    }
}

/// An artifact that matched a group but could not be published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordedFailure {
    /// Base filename of the artifact
    pub file: String,

    /// Group the artifact was classified into
    pub group: String,

    /// Platform label extracted from the filename
    pub label: String,

    /// Stage that failed
    pub stage: FailureStage,

    /// Single-line error description
    pub error: String,
}

/// Metadata for one published release.
///
/// Serialized shape:
///
/// ```json
/// {
///   "time": "2024-01-01T00:00:00Z",
///   "insecure": false,
///   "platforms": { "linux64": { "url": "...", "sha256": "...", "sig": "..." } }
/// }
/// ```
///
/// Each configured group (e.g. `platforms`, or `client` and `server`)
/// appears as its own top-level key. `failures` is present only when at
/// least one artifact could not be published.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseRecord {
    /// When the record was built
    pub time: DateTime<Utc>,

    /// True when the release was published without signatures
    pub insecure: bool,

    /// Artifact failures for this publish
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<RecordedFailure>,

    /// Group name -> platform label -> entry
    #[serde(flatten)]
    pub groups: BTreeMap<String, BTreeMap<String, ArtifactEntry>>,
}

impl ReleaseRecord {
    /// Create an empty record
    pub fn new(time: DateTime<Utc>, insecure: bool) -> Self {
        Self {
            time,
            insecure,
            failures: Vec::new(),
            groups: BTreeMap::new(),
        }
    }

    /// Entries of a group, if the group exists
    pub fn group(&self, name: &str) -> Option<&BTreeMap<String, ArtifactEntry>> {
        self.groups.get(name)
    }

    /// Total entries across all groups
    pub fn entry_count(&self) -> usize {
        self.groups.values().map(BTreeMap::len).sum()
    }

    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}
