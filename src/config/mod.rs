//! Publish configuration
//!
//! Three layers, later wins:
//! 1. Built-in defaults
//! 2. Config file (`relman.toml`)
//! 3. CLI flags

mod defaults;
mod merge;
mod publish;

pub use defaults::{
    BuiltinDefaults, DEFAULT_BUILDS_ROOT, DEFAULT_GROUP_NAME, DEFAULT_GROUP_PATTERN,
    DEFAULT_MANIFEST_PATH,
};
pub use merge::{deep_merge, merge_layers};
pub use publish::{ConfigError, GroupConfig, PublishConfig, SigningConfig, DEFAULT_CONFIG_FILE};
