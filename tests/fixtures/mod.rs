//! Test fixtures for publish integration tests
//!
//! Provides a scratch workspace with a builds root, a manifest path and a
//! config pointing at both.

#![allow(dead_code)]

use release_manifest::config::{GroupConfig, PublishConfig, SigningConfig};
use release_manifest::entry::CollisionPolicy;
use release_manifest::signing::{generate_keypair, write_keypair, KeypairFiles};
use release_manifest::SigningMode;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Base URL used by every fixture config
pub const BASE_URL: &str = "https://cdn.example.com/builds";

/// Scratch directory holding `releases/` and `manifest.json`
pub struct Workspace {
    pub dir: TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("releases")).unwrap();
        Self { dir }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root().join("manifest.json")
    }

    pub fn release_dir(&self, release_id: &str) -> PathBuf {
        self.root().join("releases").join(release_id)
    }

    /// Write an artifact into a release's build directory
    pub fn write_artifact(&self, release_id: &str, file_name: &str, content: &[u8]) -> PathBuf {
        let dir = self.release_dir(release_id);
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(file_name);
        fs::write(&path, content).unwrap();
        path
    }

    pub fn write_manifest(&self, content: &str) {
        fs::write(self.manifest_path(), content).unwrap();
    }

    pub fn manifest_bytes(&self) -> Option<Vec<u8>> {
        fs::read(self.manifest_path()).ok()
    }

    pub fn manifest_json(&self) -> serde_json::Value {
        let text = fs::read_to_string(self.manifest_path()).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    /// Generate a signing keypair inside the workspace
    pub fn keypair(&self) -> KeypairFiles {
        write_keypair(&generate_keypair(), self.root(), "release").unwrap()
    }

    /// Unsigned single-group config (`App_<label>.zip`)
    pub fn config(&self) -> PublishConfig {
        PublishConfig {
            manifest_path: self.manifest_path(),
            builds_root: self.root().join("releases"),
            base_url: BASE_URL.to_string(),
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

    pub fn signed_config(&self, mode: SigningMode, key_path: Option<PathBuf>) -> PublishConfig {
        let mut config = self.config();
        config.signing = SigningConfig { mode, key_path };
        config
    }
}
