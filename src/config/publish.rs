//! Resolved publish configuration
//!
//! Built from the merged layers and validated once, before any manifest or
//! artifact I/O.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use release_manifest_schema::RESERVED_RECORD_KEYS;

use super::defaults::BuiltinDefaults;
use super::merge::merge_layers;
use crate::discover::{ArtifactGroup, DiscoverError};
use crate::entry::CollisionPolicy;
use crate::signing::SigningMode;

/// Default config file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "relman.toml";

/// Configuration errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("TOML parse error in {}: {source}", .path.display())]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error(transparent)]
    Pattern(#[from] DiscoverError),
}

/// Signing settings
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SigningConfig {
    #[serde(default)]
    pub mode: SigningMode,

    /// PKCS#8 PEM private key file
    #[serde(default)]
    pub key_path: Option<PathBuf>,
}

/// One artifact group: record key plus filename pattern
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupConfig {
    pub name: String,
    pub pattern: String,
}

/// Everything a publish needs besides the release identifier
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishConfig {
    /// Manifest file read and rewritten by each publish
    pub manifest_path: PathBuf,

    /// Directory holding `<release_id>/` build directories
    pub builds_root: PathBuf,

    /// Public base URL artifacts are served from
    pub base_url: String,

    /// Start an empty manifest when the file is missing
    #[serde(default)]
    pub allow_new_manifest: bool,

    #[serde(default)]
    pub on_label_collision: CollisionPolicy,

    /// Build the record but do not write the manifest
    #[serde(default)]
    pub dry_run: bool,

    #[serde(default)]
    pub signing: SigningConfig,

    pub groups: Vec<GroupConfig>,
}

impl PublishConfig {
    /// Resolve configuration from defaults, an optional TOML file and CLI
    /// overrides (highest precedence).
    pub fn load(config_file: Option<&Path>, cli_overrides: Option<Value>) -> Result<Self, ConfigError> {
        let mut layers = vec![BuiltinDefaults::default().to_value()];

        if let Some(path) = config_file {
            layers.push(load_toml_file(path)?);
        }
        if let Some(cli) = cli_overrides {
            layers.push(cli);
        }

        Self::from_value(merge_layers(layers))
    }

    /// Parse config from a TOML string layered over the defaults
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let value: toml::Value = toml::from_str(s).map_err(|source| ConfigError::Toml {
            path: PathBuf::from("<string>"),
            source,
        })?;
        Self::from_value(merge_layers(vec![
            BuiltinDefaults::default().to_value(),
            toml_to_json(value),
        ]))
    }

    fn from_value(value: Value) -> Result<Self, ConfigError> {
        let config: PublishConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_url.trim().is_empty() {
            return Err(ConfigError::Invalid("base_url must be set".to_string()));
        }

        if self.groups.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one artifact group is required".to_string(),
            ));
        }

        let mut seen = BTreeSet::new();
        for group in &self.groups {
            if group.name.is_empty() {
                return Err(ConfigError::Invalid("group name must not be empty".to_string()));
            }
            if RESERVED_RECORD_KEYS.contains(&group.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "group name '{}' is reserved",
                    group.name
                )));
            }
            if !seen.insert(group.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate group name '{}'",
                    group.name
                )));
            }
        }

        if self.signing.mode == SigningMode::Required && self.signing.key_path.is_none() {
            return Err(ConfigError::Invalid(
                "signing.key_path is required when signing.mode = \"required\"".to_string(),
            ));
        }

        self.artifact_groups()?;
        Ok(())
    }

    /// Compile the configured groups
    pub fn artifact_groups(&self) -> Result<Vec<ArtifactGroup>, ConfigError> {
        self.groups
            .iter()
            .map(|g| ArtifactGroup::new(g.name.clone(), &g.pattern).map_err(ConfigError::from))
            .collect()
    }

    /// Build directory for a release
    pub fn build_dir(&self, release_id: &str) -> PathBuf {
        self.builds_root.join(release_id)
    }
}

fn load_toml_file(path: &Path) -> Result<Value, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let value: toml::Value = toml::from_str(&contents).map_err(|source| ConfigError::Toml {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(toml_to_json(value))
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => {
            Value::Object(table.into_iter().map(|(k, v)| (k, toml_to_json(v))).collect())
        }
    }
}
