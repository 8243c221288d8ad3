//! Publish orchestration
//!
//! One publish handles one release identifier, strictly sequentially:
//! - Resolve the signer for the configured signing mode
//! - Load the manifest (fails fast on a missing/corrupt manifest)
//! - Discover artifacts in `<builds_root>/<release_id>/`
//! - Checksum and sign each artifact, recording per-artifact failures
//! - Replace the release's record and atomically persist the manifest
//!
//! Any error returned from [`Publisher::publish`] means the manifest on disk
//! was not modified. Concurrent publishes against the same manifest file are
//! not coordinated; callers must serialize them.

use chrono::{DateTime, Utc};
use release_manifest_schema::ReleaseRecord;
use serde::Serialize;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{ConfigError, PublishConfig};
use crate::discover::{discover, ArtifactGroup, DiscoverError};
use crate::entry::{EntryBuilder, LabelCollision, ReleaseBuilder};
use crate::manifest::{ManifestError, ManifestStore};
use crate::signing::{ArtifactSigner, SigningError, SIGNATURE_ALGORITHM};

/// Exit code: release published with every artifact
pub const EXIT_SUCCESS: i32 = 0;

/// Exit code: run aborted, manifest untouched
pub const EXIT_FAILURE: i32 = 1;

/// Exit code: invalid invocation
pub const EXIT_USAGE: i32 = 2;

/// Exit code: release published but some artifacts failed
pub const EXIT_PARTIAL: i32 = 3;

/// Errors that abort a publish without touching the manifest
#[derive(Debug, Error)]
pub enum PublishError {
    #[error("invalid release identifier '{0}': expected a single non-empty path component")]
    InvalidReleaseId(String),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("release {release_id}: signing key error: {source}")]
    Signing {
        release_id: String,
        #[source]
        source: SigningError,
    },

    #[error("release {release_id}: {source}")]
    Manifest {
        release_id: String,
        #[source]
        source: ManifestError,
    },

    #[error("release {release_id}: build directory not found: {}", .path.display())]
    BuildDirectoryNotFound { release_id: String, path: PathBuf },

    #[error("release {release_id}: {source}")]
    Discover {
        release_id: String,
        #[source]
        source: DiscoverError,
    },

    #[error("release {release_id}: {source}")]
    LabelCollision {
        release_id: String,
        #[source]
        source: LabelCollision,
    },
}

impl PublishError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            PublishError::InvalidReleaseId(_) => EXIT_USAGE,
            _ => EXIT_FAILURE,
        }
    }
}

/// True when `release_id` names exactly one entry directly under the builds
/// root: non-empty, relative, no separators, not `.` or `..`.
pub fn is_valid_release_id(release_id: &str) -> bool {
    let mut components = Path::new(release_id).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(name)), None) => name.to_str() == Some(release_id),
        _ => false,
    }
}

/// Result type for publish operations
pub type PublishResult<T> = Result<T, PublishError>;

/// Outcome of a publish
#[derive(Debug, Clone, Serialize)]
pub struct PublishReport {
    pub release_id: String,

    /// Manifest file targeted
    pub manifest_path: PathBuf,

    /// The record inserted under `release_id`
    pub record: ReleaseRecord,

    /// A previous record for this release was replaced
    pub replaced: bool,

    /// The manifest file was rewritten (false on dry runs)
    pub written: bool,
}

impl PublishReport {
    pub fn has_failures(&self) -> bool {
        self.record.has_failures()
    }

    pub fn exit_code(&self) -> i32 {
        if self.has_failures() {
            EXIT_PARTIAL
        } else {
            EXIT_SUCCESS
        }
    }
}

/// Publishes releases into the configured manifest
#[derive(Debug)]
pub struct Publisher {
    config: PublishConfig,
    groups: Vec<ArtifactGroup>,
}

impl Publisher {
    pub fn new(config: PublishConfig) -> PublishResult<Self> {
        config.validate()?;
        let groups = config.artifact_groups()?;
        Ok(Self { config, groups })
    }

    pub fn config(&self) -> &PublishConfig {
        &self.config
    }

    /// Publish a release stamped with the current time
    pub fn publish(&self, release_id: &str) -> PublishResult<PublishReport> {
        self.publish_at(release_id, Utc::now())
    }

    /// Publish a release stamped with `now`
    pub fn publish_at(&self, release_id: &str, now: DateTime<Utc>) -> PublishResult<PublishReport> {
        if !is_valid_release_id(release_id) {
            return Err(PublishError::InvalidReleaseId(release_id.to_string()));
        }

        let signer = ArtifactSigner::for_mode(
            self.config.signing.mode,
            self.config.signing.key_path.as_deref(),
        )
        .map_err(|source| PublishError::Signing {
            release_id: release_id.to_string(),
            source,
        })?;
        if let Some(signer) = &signer {
            info!(
                algorithm = SIGNATURE_ALGORITHM,
                fingerprint = %signer.key_fingerprint(),
                "signing artifacts"
            );
        }

        let store = ManifestStore::new(&self.config.manifest_path, self.config.allow_new_manifest);
        let manifest_err = |source| PublishError::Manifest {
            release_id: release_id.to_string(),
            source,
        };
        let mut manifest = store.load().map_err(manifest_err)?;

        let build_dir = self.config.build_dir(release_id);
        let artifacts = discover(&build_dir, &self.groups).map_err(|e| match e {
            DiscoverError::BuildDirectoryNotFound(path) => PublishError::BuildDirectoryNotFound {
                release_id: release_id.to_string(),
                path,
            },
            source => PublishError::Discover {
                release_id: release_id.to_string(),
                source,
            },
        })?;
        info!(
            release = release_id,
            build_dir = %build_dir.display(),
            artifacts = artifacts.len(),
            "discovered artifacts"
        );
        if artifacts.is_empty() {
            warn!(release = release_id, "no files matched any artifact group");
        }

        let entries = EntryBuilder::new(&self.config.base_url, release_id, signer.as_ref());
        let mut release = ReleaseBuilder::new(
            now,
            entries.is_signing(),
            self.groups.iter().map(|g| g.name.clone()),
            self.config.on_label_collision,
        );

        for artifact in &artifacts {
            let outcome = entries.build(artifact);
            if let Err(e) = &outcome {
                warn!(
                    release = release_id,
                    file = %artifact.file_name,
                    stage = %e.stage,
                    error = %e.source,
                    "artifact failed; continuing without it"
                );
            }
            release
                .add(artifact, outcome)
                .map_err(|source| PublishError::LabelCollision {
                    release_id: release_id.to_string(),
                    source,
                })?;
        }

        let record = release.finish();
        let replaced = manifest
            .insert_release(release_id, &record)
            .map_err(|e| manifest_err(ManifestError::Serialize(e)))?;

        let written = if self.config.dry_run {
            info!(release = release_id, "dry run; manifest not written");
            false
        } else {
            store.save(&manifest).map_err(manifest_err)?;
            true
        };

        info!(
            release = release_id,
            entries = record.entry_count(),
            failures = record.failures.len(),
            replaced,
            "published release"
        );

        Ok(PublishReport {
            release_id: release_id.to_string(),
            manifest_path: self.config.manifest_path.clone(),
            record,
            replaced,
            written,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{GroupConfig, SigningConfig};
    use crate::entry::CollisionPolicy;
    use std::fs;
    use tempfile::TempDir;

    fn config(dir: &TempDir) -> PublishConfig {
        PublishConfig {
            manifest_path: dir.path().join("manifest.json"),
            builds_root: dir.path().join("releases"),
            base_url: "https://cdn.example.com/builds".to_string(),
            allow_new_manifest: true,
            on_label_collision: CollisionPolicy::LastWins,
            dry_run: false,
            signing: SigningConfig::default(),
            groups: vec![GroupConfig {
                name: "platforms".to_string(),
                pattern: r"^App_(.+)\.zip$".to_string(),
            }],
        }
    }

    #[test]
    fn test_empty_release_id_rejected() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(config(&dir)).unwrap();

        let err = publisher.publish("").unwrap_err();
        assert!(matches!(err, PublishError::InvalidReleaseId(_)));
        assert_eq!(err.exit_code(), EXIT_USAGE);
    }

    #[test]
    fn test_release_id_must_be_single_component() {
        for id in ["abc123", "v1.2.0", "release-2024_06", " "] {
            assert!(is_valid_release_id(id), "{:?} should be accepted", id);
        }
        for id in ["", ".", "..", "/tmp/x", "../abc", "a/b", "abc/", "./abc"] {
            assert!(!is_valid_release_id(id), "{:?} should be rejected", id);
        }
    }

    #[test]
    fn test_release_id_outside_builds_root_rejected() {
        let dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        fs::write(outside.path().join("App_linux64.zip"), "X").unwrap();
        let publisher = Publisher::new(config(&dir)).unwrap();

        let id = outside.path().to_str().unwrap();
        let err = publisher.publish(id).unwrap_err();
        assert!(matches!(&err, PublishError::InvalidReleaseId(got) if got == id));
        assert_eq!(err.exit_code(), EXIT_USAGE);
        assert!(!dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_whitespace_release_id_is_not_rejected_as_invalid() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(config(&dir)).unwrap();

        let err = publisher.publish(" ").unwrap_err();
        assert!(matches!(err, PublishError::BuildDirectoryNotFound { .. }));
    }

    #[test]
    fn test_missing_build_dir_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let publisher = Publisher::new(config(&dir)).unwrap();

        let err = publisher.publish("abc123").unwrap_err();
        assert!(matches!(err, PublishError::BuildDirectoryNotFound { .. }));
        assert_eq!(err.exit_code(), EXIT_FAILURE);
        assert!(!dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_dry_run_does_not_write() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("releases/abc123")).unwrap();
        fs::write(dir.path().join("releases/abc123/App_linux64.zip"), "X").unwrap();

        let mut cfg = config(&dir);
        cfg.dry_run = true;
        let report = Publisher::new(cfg).unwrap().publish("abc123").unwrap();

        assert!(!report.written);
        assert_eq!(report.record.entry_count(), 1);
        assert!(!dir.path().join("manifest.json").exists());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let dir = TempDir::new().unwrap();
        let mut cfg = config(&dir);
        cfg.base_url = String::new();

        assert!(matches!(Publisher::new(cfg), Err(PublishError::Config(_))));
    }
}
