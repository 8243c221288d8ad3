//! Artifact discovery in a release build directory
//!
//! Lists regular files directly under `<builds_root>/<release_id>/` and
//! classifies each by filename pattern. The pattern's single capture group
//! is the platform label. Files no group matches are skipped.

use regex_lite::Regex;
use std::ffi::OsString;
use std::fs::{self, DirEntry};
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from artifact discovery
#[derive(Debug, Error)]
pub enum DiscoverError {
    #[error("build directory not found: {}", .0.display())]
    BuildDirectoryNotFound(PathBuf),

    #[error("cannot read build directory {}: {source}", .path.display())]
    ReadDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid artifact pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },
}

/// Filename pattern with exactly one capture group
#[derive(Debug, Clone)]
pub struct ArtifactPattern {
    regex: Regex,
}

impl ArtifactPattern {
    pub fn new(pattern: &str) -> Result<Self, DiscoverError> {
        let regex = Regex::new(pattern).map_err(|e| DiscoverError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;

        // captures_len counts the implicit whole-match group
        let groups = regex.captures_len() - 1;
        if groups != 1 {
            return Err(DiscoverError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: format!("expected exactly one capture group, found {}", groups),
            });
        }

        Ok(Self { regex })
    }

    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }

    /// Extract the platform label from a base filename
    pub fn label(&self, file_name: &str) -> Option<String> {
        let caps = self.regex.captures(file_name)?;
        let label = caps.get(1)?.as_str();
        if label.is_empty() {
            return None;
        }
        Some(label.to_string())
    }
}

/// A named artifact group (e.g. `platforms`, `client`, `server`)
#[derive(Debug, Clone)]
pub struct ArtifactGroup {
    pub name: String,
    pub pattern: ArtifactPattern,
}

impl ArtifactGroup {
    pub fn new(name: impl Into<String>, pattern: &str) -> Result<Self, DiscoverError> {
        Ok(Self {
            name: name.into(),
            pattern: ArtifactPattern::new(pattern)?,
        })
    }
}

/// A classified artifact file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredArtifact {
    /// Full path to the file
    pub path: PathBuf,

    /// Base filename
    pub file_name: String,

    /// Name of the group that matched
    pub group: String,

    /// Platform label extracted by the group's pattern
    pub label: String,
}

/// Regular files among `entries`. An entry that cannot be read or typed is
/// skipped with a warning; it never aborts the scan.
fn regular_files<I>(build_dir: &Path, entries: I) -> Vec<(OsString, PathBuf)>
where
    I: IntoIterator<Item = io::Result<DirEntry>>,
{
    let mut files = Vec::new();
    for entry in entries {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(dir = %build_dir.display(), error = %e, "skipping unreadable directory entry");
                continue;
            }
        };
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "skipping entry with unknown file type");
                continue;
            }
        };
        if file_type.is_file() {
            files.push((entry.file_name(), entry.path()));
        }
    }
    files
}

/// Discover artifacts directly under `build_dir`.
///
/// Files are visited in byte-wise filename order; each is claimed by the
/// first group (in declaration order) whose pattern matches. Directories,
/// symlinks and non-UTF-8 names are skipped.
pub fn discover(
    build_dir: &Path,
    groups: &[ArtifactGroup],
) -> Result<Vec<DiscoveredArtifact>, DiscoverError> {
    let reader = match fs::read_dir(build_dir) {
        Ok(reader) => reader,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(DiscoverError::BuildDirectoryNotFound(build_dir.to_path_buf()));
        }
        Err(source) => {
            return Err(DiscoverError::ReadDir {
                path: build_dir.to_path_buf(),
                source,
            })
        }
    };

    let mut files = regular_files(build_dir, reader);
    files.sort_by(|a, b| a.0.cmp(&b.0));

    let mut artifacts = Vec::new();
    for (os_name, path) in files {
        let Some(file_name) = os_name.to_str() else {
            warn!(path = %path.display(), "skipping artifact with non-UTF-8 filename");
            continue;
        };

        let matched = groups
            .iter()
            .find_map(|group| group.pattern.label(file_name).map(|label| (group, label)));

        match matched {
            Some((group, label)) => artifacts.push(DiscoveredArtifact {
                path: path.clone(),
                file_name: file_name.to_string(),
                group: group.name.clone(),
                label,
            }),
            None => debug!(file = file_name, "no artifact group matches; skipping"),
        }
    }

    Ok(artifacts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn platforms() -> Vec<ArtifactGroup> {
        vec![ArtifactGroup::new("platforms", r"^App_(.+)\.zip$").unwrap()]
    }

    #[test]
    fn test_pattern_requires_one_group() {
        assert!(ArtifactPattern::new(r"^App_(.+)\.zip$").is_ok());
        assert!(matches!(
            ArtifactPattern::new(r"^App_.+\.zip$"),
            Err(DiscoverError::InvalidPattern { .. })
        ));
        assert!(matches!(
            ArtifactPattern::new(r"^(App)_(.+)\.zip$"),
            Err(DiscoverError::InvalidPattern { .. })
        ));
        assert!(matches!(
            ArtifactPattern::new(r"^App_(.+\.zip$"),
            Err(DiscoverError::InvalidPattern { .. })
        ));
    }

    #[test]
    fn test_non_capturing_groups_allowed() {
        let pattern = ArtifactPattern::new(r"^(?:Robust\.)?Client_(.+)\.zip$").unwrap();
        assert_eq!(pattern.label("Robust.Client_win-x64.zip").as_deref(), Some("win-x64"));
        assert_eq!(pattern.label("Client_osx-arm64.zip").as_deref(), Some("osx-arm64"));
        assert_eq!(pattern.label("Server_linux.zip"), None);
    }

    #[test]
    fn test_discover_matches_and_skips() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("App_linux64.zip"), "X").unwrap();
        fs::write(dir.path().join("App_win64.zip"), "Y").unwrap();
        fs::write(dir.path().join("build.log"), "log").unwrap();
        fs::write(dir.path().join("App_win64.zip.sha256"), "sum").unwrap();

        let artifacts = discover(dir.path(), &platforms()).unwrap();
        let labels: Vec<_> = artifacts.iter().map(|a| a.label.as_str()).collect();
        assert_eq!(labels, vec!["linux64", "win64"]);
        assert_eq!(artifacts[0].file_name, "App_linux64.zip");
        assert_eq!(artifacts[0].path, dir.path().join("App_linux64.zip"));
        assert_eq!(artifacts[0].group, "platforms");
    }

    #[test]
    fn test_discover_is_not_recursive() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/App_linux64.zip"), "X").unwrap();
        fs::create_dir(dir.path().join("App_dir.zip")).unwrap();

        let artifacts = discover(dir.path(), &platforms()).unwrap();
        assert!(artifacts.is_empty());
    }

    #[test]
    fn test_first_matching_group_claims_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Robust.Client_win64.zip"), "c").unwrap();
        fs::write(dir.path().join("Robust.Server_linux64.zip"), "s").unwrap();

        let groups = vec![
            ArtifactGroup::new("client", r"^Robust\.Client_(.+)\.zip$").unwrap(),
            ArtifactGroup::new("server", r"^Robust\.Server_(.+)\.zip$").unwrap(),
            ArtifactGroup::new("everything", r"^(.+)\.zip$").unwrap(),
        ];

        let artifacts = discover(dir.path(), &groups).unwrap();
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].group, "client");
        assert_eq!(artifacts[0].label, "win64");
        assert_eq!(artifacts[1].group, "server");
        assert_eq!(artifacts[1].label, "linux64");
    }

    #[test]
    fn test_missing_build_directory() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("never-built");

        let err = discover(&missing, &platforms()).unwrap_err();
        assert!(matches!(err, DiscoverError::BuildDirectoryNotFound(p) if p == missing));
    }

    #[test]
    fn test_unreadable_entry_is_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("App_linux64.zip"), "X").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();

        let entries = fs::read_dir(dir.path()).unwrap().chain(std::iter::once(Err(
            io::Error::new(io::ErrorKind::Other, "stale NFS handle"),
        )));
        let files = regular_files(dir.path(), entries);

        assert_eq!(files.len(), 1);
        assert_eq!(files[0].0, OsString::from("App_linux64.zip"));
    }
}
