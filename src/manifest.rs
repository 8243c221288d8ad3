//! Persistent release manifest (manifest.json)
//!
//! The manifest is a JSON object keyed by release identifier. A publish reads
//! the whole file, replaces one key and writes the whole file back through a
//! temporary file that is atomically renamed over the original, so a failed
//! or interrupted run leaves the previous manifest byte-identical.

use release_manifest_schema::ReleaseRecord;
use serde_json::{Map, Value};
use std::fs::{self, Permissions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, info};

/// Errors for manifest load and persist
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest {} does not exist and creating a new manifest is not allowed", .0.display())]
    MissingManifest(PathBuf),

    #[error("cannot read manifest {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("manifest {} is corrupt: {reason}", .path.display())]
    Corrupt { path: PathBuf, reason: String },

    #[error("cannot serialize release record: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("failed to write manifest {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Mode given to a manifest created by the first publish
#[cfg(unix)]
pub const NEW_MANIFEST_MODE: u32 = 0o644;

/// In-memory manifest state.
///
/// Records are held as raw JSON so fields written by other tools or older
/// versions survive a merge untouched. Keys serialize in sorted order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Manifest {
    releases: Map<String, Value>,
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse manifest JSON. The top level must be an object.
    pub fn from_json(json: &str) -> Result<Self, String> {
        let value: Value = serde_json::from_str(json).map_err(|e| e.to_string())?;
        match value {
            Value::Object(releases) => Ok(Self { releases }),
            other => Err(format!(
                "expected a JSON object at the top level, found {}",
                json_kind(&other)
            )),
        }
    }

    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        let mut json = serde_json::to_string_pretty(&self.releases)?;
        json.push('\n');
        Ok(json)
    }

    /// Insert a release record, replacing any previous record for the id.
    ///
    /// Returns true when a previous record was replaced.
    pub fn insert_release(
        &mut self,
        release_id: &str,
        record: &ReleaseRecord,
    ) -> Result<bool, serde_json::Error> {
        let value = serde_json::to_value(record)?;
        Ok(self.releases.insert(release_id.to_string(), value).is_some())
    }

    pub fn get(&self, release_id: &str) -> Option<&Value> {
        self.releases.get(release_id)
    }

    pub fn contains(&self, release_id: &str) -> bool {
        self.releases.contains_key(release_id)
    }

    pub fn release_ids(&self) -> impl Iterator<Item = &str> {
        self.releases.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.releases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.releases.is_empty()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Loads and persists the manifest file
#[derive(Debug, Clone)]
pub struct ManifestStore {
    path: PathBuf,
    allow_new: bool,
}

impl ManifestStore {
    pub fn new(path: impl Into<PathBuf>, allow_new: bool) -> Self {
        Self {
            path: path.into(),
            allow_new,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the current manifest.
    ///
    /// A missing file yields an empty manifest only when creating a new
    /// manifest is allowed.
    pub fn load(&self) -> Result<Manifest, ManifestError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                if self.allow_new {
                    info!(path = %self.path.display(), "no existing manifest; starting a new one");
                    return Ok(Manifest::new());
                }
                return Err(ManifestError::MissingManifest(self.path.clone()));
            }
            Err(source) => {
                return Err(ManifestError::Read {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        let manifest = Manifest::from_json(&json).map_err(|reason| ManifestError::Corrupt {
            path: self.path.clone(),
            reason,
        })?;
        debug!(
            path = %self.path.display(),
            releases = manifest.len(),
            "loaded manifest"
        );
        Ok(manifest)
    }

    /// Atomically replace the manifest file
    pub fn save(&self, manifest: &Manifest) -> Result<(), ManifestError> {
        self.save_with(manifest, |out, bytes| out.write_all(bytes))
    }

    /// Atomically replace the manifest file, writing the serialized bytes
    /// through `write`.
    ///
    /// The bytes go to a temporary file beside the manifest which is
    /// fsynced and renamed into place only if `write` succeeds. On error
    /// the temporary file is removed and the existing manifest is left as
    /// it was. Tests use this to inject write failures.
    ///
    /// The replacement keeps the existing manifest's permissions; a new
    /// manifest gets [`NEW_MANIFEST_MODE`] on unix.
    pub fn save_with<F>(&self, manifest: &Manifest, write: F) -> Result<(), ManifestError>
    where
        F: FnOnce(&mut dyn Write, &[u8]) -> io::Result<()>,
    {
        let json = manifest.to_json()?;
        let persist_err = |source| ManifestError::Persist {
            path: self.path.clone(),
            source,
        };

        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        let mut tmp = NamedTempFile::new_in(dir).map_err(persist_err)?;
        let out: &mut dyn Write = tmp.as_file_mut();
        write(out, json.as_bytes()).map_err(persist_err)?;
        tmp.as_file_mut().flush().map_err(persist_err)?;
        if let Some(permissions) = self.target_permissions().map_err(persist_err)? {
            tmp.as_file().set_permissions(permissions).map_err(persist_err)?;
        }
        tmp.as_file().sync_all().map_err(persist_err)?;
        tmp.persist(&self.path).map_err(|e| persist_err(e.error))?;

        info!(
            path = %self.path.display(),
            releases = manifest.len(),
            "wrote manifest"
        );
        Ok(())
    }

    /// Permissions the rewritten manifest should carry
    fn target_permissions(&self) -> io::Result<Option<Permissions>> {
        match fs::metadata(&self.path) {
            Ok(meta) => Ok(Some(meta.permissions())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(new_manifest_permissions()),
            Err(e) => Err(e),
        }
    }
}

#[cfg(unix)]
fn new_manifest_permissions() -> Option<Permissions> {
    use std::os::unix::fs::PermissionsExt;
    Some(Permissions::from_mode(NEW_MANIFEST_MODE))
}

#[cfg(not(unix))]
fn new_manifest_permissions() -> Option<Permissions> {
    None
}
