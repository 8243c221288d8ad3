//! Configuration layer merge
//!
//! Layers (defaults, config file, CLI flags) merge with:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)

use serde_json::Value;

/// Deep merge two JSON values.
///
/// Merge semantics:
/// - Objects: deep-merge by key (recursive)
/// - Arrays: REPLACE (second wins entirely)
/// - Scalars: override (second wins)
/// - Null: override (null can override any value)
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        // Both objects: deep merge
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = if let Some(base_value) = base_map.remove(&key) {
                    deep_merge(base_value, overlay_value)
                } else {
                    overlay_value
                };
                base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }

        // Arrays: REPLACE (no concatenation)
        (Value::Array(_), overlay @ Value::Array(_)) => overlay,

        // Scalars and any other case: overlay wins
        (_, overlay) => overlay,
    }
}

/// Merge multiple config layers in order (first is base, last has highest precedence)
pub fn merge_layers(layers: Vec<Value>) -> Value {
    layers.into_iter().fold(Value::Null, deep_merge)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_scalar_override() {
        let base = json!({"base_url": "https://a.example.com"});
        let overlay = json!({"base_url": "https://b.example.com"});
        let result = deep_merge(base, overlay);
        assert_eq!(result["base_url"], "https://b.example.com");
    }

    #[test]
    fn test_object_deep_merge() {
        let base = json!({"signing": {"mode": "off"}});
        let overlay = json!({"signing": {"key_path": "engine.key"}});
        let result = deep_merge(base, overlay);

        assert_eq!(result["signing"]["mode"], "off");
        assert_eq!(result["signing"]["key_path"], "engine.key");
    }

    #[test]
    fn test_groups_array_replaced() {
        let base = json!({
            "groups": [{"name": "platforms", "pattern": "^.+_(.+)\\.zip$"}]
        });
        let overlay = json!({
            "groups": [
                {"name": "client", "pattern": "^Client_(.+)\\.zip$"},
                {"name": "server", "pattern": "^Server_(.+)\\.zip$"}
            ]
        });
        let result = deep_merge(base, overlay);

        let groups = result["groups"].as_array().unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0]["name"], "client");
        assert_eq!(groups[1]["name"], "server");
    }

    #[test]
    fn test_null_override() {
        let base = json!({"signing": {"key_path": "engine.key"}});
        let overlay = json!({"signing": {"key_path": null}});
        let result = deep_merge(base, overlay);

        assert!(result["signing"]["key_path"].is_null());
    }

    #[test]
    fn test_merge_layers() {
        let builtin = json!({"manifest_path": "manifest.json", "dry_run": false});
        let file = json!({"manifest_path": "/srv/cdn/manifest.json"});
        let cli = json!({"dry_run": true});

        let result = merge_layers(vec![builtin, file, cli]);

        assert_eq!(result["manifest_path"], "/srv/cdn/manifest.json");
        assert_eq!(result["dry_run"], true);
    }
}
