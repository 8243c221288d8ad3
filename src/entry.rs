//! Entry and release record assembly
//!
//! [`EntryBuilder`] turns one discovered artifact into an [`ArtifactEntry`]
//! (URL, checksum, optional signature). [`ReleaseBuilder`] collects entries
//! and per-artifact failures into a [`ReleaseRecord`].

use chrono::{DateTime, Utc};
use release_manifest_schema::{ArtifactEntry, FailureStage, RecordedFailure, ReleaseRecord};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use thiserror::Error;
use tracing::warn;

use crate::checksum::sha256_file;
use crate::discover::DiscoveredArtifact;
use crate::signing::ArtifactSigner;

/// Failure to build the entry for one artifact
#[derive(Debug, Error)]
#[error("artifact {} failed at {stage}: {source}", .path.display())]
pub struct ArtifactError {
    pub path: PathBuf,
    pub stage: FailureStage,
    #[source]
    pub source: io::Error,
}

/// Two artifacts in one group produced the same platform label
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("label '{label}' in group '{group}' claimed by both {first} and {second}")]
pub struct LabelCollision {
    pub group: String,
    pub label: String,
    pub first: String,
    pub second: String,
}

/// What to do when two artifacts share a label within a group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollisionPolicy {
    /// The artifact discovered later replaces the earlier one
    #[default]
    LastWins,
    /// Abort the publish
    Reject,
}

/// Public download URL for an artifact.
///
/// Mirrors the upload layout on the serving side:
/// `<base_url>/<release_id>/<file_name>`.
pub fn artifact_url(base_url: &str, release_id: &str, file_name: &str) -> String {
    format!("{}/{}/{}", base_url.trim_end_matches('/'), release_id, file_name)
}

/// Builds entries for a single release
#[derive(Debug)]
pub struct EntryBuilder<'a> {
    base_url: &'a str,
    release_id: &'a str,
    signer: Option<&'a ArtifactSigner>,
}

impl<'a> EntryBuilder<'a> {
    pub fn new(base_url: &'a str, release_id: &'a str, signer: Option<&'a ArtifactSigner>) -> Self {
        Self {
            base_url,
            release_id,
            signer,
        }
    }

    pub fn is_signing(&self) -> bool {
        self.signer.is_some()
    }

    /// Checksum (and sign, when enabled) one artifact.
    ///
    /// Unsigned builds stream the file through the hasher. Signed builds
    /// read it once and derive both values from those bytes; a failed read
    /// is then reported at the signature stage.
    pub fn build(&self, artifact: &DiscoveredArtifact) -> Result<ArtifactEntry, ArtifactError> {
        let (sha256, signature) = match self.signer {
            Some(signer) => {
                let signed = signer.sign_file(&artifact.path).map_err(|source| ArtifactError {
                    path: artifact.path.clone(),
                    stage: FailureStage::Signature,
                    source,
                })?;
                (signed.sha256, Some(signed.signature))
            }
            None => {
                let sha256 = sha256_file(&artifact.path).map_err(|source| ArtifactError {
                    path: artifact.path.clone(),
                    stage: FailureStage::Checksum,
                    source,
                })?;
                (sha256, None)
            }
        };

        Ok(ArtifactEntry {
            url: artifact_url(self.base_url, self.release_id, &artifact.file_name),
            sha256,
            signature,
        })
    }
}

/// Accumulates a release record from per-artifact outcomes
#[derive(Debug)]
pub struct ReleaseBuilder {
    record: ReleaseRecord,
    policy: CollisionPolicy,
    /// (group, label) -> file that currently owns the label
    owners: BTreeMap<(String, String), String>,
}

impl ReleaseBuilder {
    /// Start a record with every configured group present
    pub fn new<I, S>(time: DateTime<Utc>, signed: bool, groups: I, policy: CollisionPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut record = ReleaseRecord::new(time, !signed);
        for group in groups {
            record.groups.insert(group.into(), BTreeMap::new());
        }

        Self {
            record,
            policy,
            owners: BTreeMap::new(),
        }
    }

    /// Record the outcome of building one artifact's entry
    pub fn add(
        &mut self,
        artifact: &DiscoveredArtifact,
        outcome: Result<ArtifactEntry, ArtifactError>,
    ) -> Result<(), LabelCollision> {
        self.claim(artifact)?;

        match outcome {
            Ok(entry) => {
                self.record
                    .groups
                    .entry(artifact.group.clone())
                    .or_default()
                    .insert(artifact.label.clone(), entry);
            }
            Err(e) => {
                self.record.failures.push(RecordedFailure {
                    file: artifact.file_name.clone(),
                    group: artifact.group.clone(),
                    label: artifact.label.clone(),
                    stage: e.stage,
                    error: e.source.to_string(),
                });
            }
        }

        Ok(())
    }

    /// Take ownership of the artifact's label, applying the collision policy
    fn claim(&mut self, artifact: &DiscoveredArtifact) -> Result<(), LabelCollision> {
        let key = (artifact.group.clone(), artifact.label.clone());
        let Some(first) = self.owners.get(&key).cloned() else {
            self.owners.insert(key, artifact.file_name.clone());
            return Ok(());
        };

        let collision = LabelCollision {
            group: artifact.group.clone(),
            label: artifact.label.clone(),
            first,
            second: artifact.file_name.clone(),
        };

        match self.policy {
            CollisionPolicy::Reject => Err(collision),
            CollisionPolicy::LastWins => {
                warn!(
                    group = %collision.group,
                    label = %collision.label,
                    replaced = %collision.first,
                    by = %collision.second,
                    "duplicate platform label; later artifact wins"
                );
                if let Some(entries) = self.record.groups.get_mut(&artifact.group) {
                    entries.remove(&artifact.label);
                }
                self.record
                    .failures
                    .retain(|f| !(f.group == artifact.group && f.label == artifact.label));
                self.owners.insert(key, artifact.file_name.clone());
                Ok(())
            }
        }
    }

    pub fn finish(self) -> ReleaseRecord {
        self.record
    }
}
