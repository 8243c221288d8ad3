//! Built-in defaults (layer 1)

use serde::{Deserialize, Serialize};

/// Default manifest location
pub const DEFAULT_MANIFEST_PATH: &str = "manifest.json";

/// Default root holding one build directory per release
pub const DEFAULT_BUILDS_ROOT: &str = "release";

/// Default artifact group name
pub const DEFAULT_GROUP_NAME: &str = "platforms";

/// Default artifact pattern: `<prefix>_<label>.zip`
pub const DEFAULT_GROUP_PATTERN: &str = r"^.+_([^_]+)\.zip$";

/// Built-in default configuration values
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuiltinDefaults {
    /// Manifest file (default: "manifest.json")
    pub manifest_path: String,

    /// Builds root (default: "release")
    pub builds_root: String,

    /// Create the manifest when missing (default: false)
    pub allow_new_manifest: bool,

    /// Label collision policy (default: "last_wins")
    pub on_label_collision: String,

    /// Print instead of writing (default: false)
    pub dry_run: bool,

    /// Signing mode (default: "off")
    pub signing_mode: String,

    /// Single artifact group (default: "platforms")
    pub group_name: String,

    /// Pattern for the default group
    pub group_pattern: String,
}

impl Default for BuiltinDefaults {
    fn default() -> Self {
        Self {
            manifest_path: DEFAULT_MANIFEST_PATH.to_string(),
            builds_root: DEFAULT_BUILDS_ROOT.to_string(),
            allow_new_manifest: false,
            on_label_collision: "last_wins".to_string(),
            dry_run: false,
            signing_mode: "off".to_string(),
            group_name: DEFAULT_GROUP_NAME.to_string(),
            group_pattern: DEFAULT_GROUP_PATTERN.to_string(),
        }
    }
}

impl BuiltinDefaults {
    /// Convert to JSON Value for merging
    pub fn to_value(&self) -> serde_json::Value {
        serde_json::json!({
            "manifest_path": self.manifest_path,
            "builds_root": self.builds_root,
            "base_url": "",
            "allow_new_manifest": self.allow_new_manifest,
            "on_label_collision": self.on_label_collision,
            "dry_run": self.dry_run,
            "signing": {
                "mode": self.signing_mode
            },
            "groups": [
                { "name": self.group_name, "pattern": self.group_pattern }
            ]
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let defaults = BuiltinDefaults::default();
        assert_eq!(defaults.manifest_path, "manifest.json");
        assert_eq!(defaults.builds_root, "release");
        assert_eq!(defaults.on_label_collision, "last_wins");
        assert!(!defaults.allow_new_manifest);
        assert!(!defaults.dry_run);
    }

    #[test]
    fn test_to_value() {
        let value = BuiltinDefaults::default().to_value();

        assert_eq!(value["signing"]["mode"], "off");
        assert_eq!(value["groups"][0]["name"], "platforms");
        assert_eq!(value["base_url"], "");
        assert!(value["signing"].get("key_path").is_none());
    }
}
