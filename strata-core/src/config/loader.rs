use std::collections::HashMap;
use std::path::Path;

use super::value::ConfigValue;
use super::ConfigError;

/// Load and parse a YAML file if it exists, flattening it into the values map.
pub(crate) fn load_yaml_file(
    path: &Path,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<bool, ConfigError> {
    if !path.exists() {
        return Ok(false);
    }
    let content = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    load_yaml_str(&content, values)
        .map_err(|e| ConfigError::Load(format!("{}: {e}", path.display())))?;
    Ok(true)
}

/// Parse a YAML string and flatten it into the values map.
pub(crate) fn load_yaml_str(
    content: &str,
    values: &mut HashMap<String, ConfigValue>,
) -> Result<(), ConfigError> {
    let yaml: serde_yaml::Value =
        serde_yaml::from_str(content).map_err(|e| ConfigError::Load(e.to_string()))?;
    flatten_yaml("", &yaml, values);
    Ok(())
}

/// Flatten a YAML tree into dot-separated keys.
///
/// Sequences are stored whole under their key and element by element under
/// `key.0`, `key.1`, ...
pub(crate) fn flatten_yaml(
    prefix: &str,
    value: &serde_yaml::Value,
    out: &mut HashMap<String, ConfigValue>,
) {
    match value {
        serde_yaml::Value::Mapping(map) => {
            for (k, v) in map {
                let key = match k {
                    serde_yaml::Value::String(s) => s.clone(),
                    other => ConfigValue::from_yaml(other).to_string(),
                };
                let full_key = if prefix.is_empty() {
                    key
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_yaml(&full_key, v, out);
            }
        }
        serde_yaml::Value::Sequence(seq) if !prefix.is_empty() => {
            out.insert(
                prefix.to_string(),
                ConfigValue::List(seq.iter().map(ConfigValue::from_yaml).collect()),
            );
            for (i, item) in seq.iter().enumerate() {
                flatten_yaml(&format!("{prefix}.{i}"), item, out);
            }
        }
        serde_yaml::Value::Sequence(_) => {}
        leaf => {
            if !prefix.is_empty() {
                out.insert(prefix.to_string(), ConfigValue::from_yaml(leaf));
            }
        }
    }
}

/// Map an environment variable name onto a config key.
///
/// `STRATA_PAGE_SIZE` becomes `strata.page.size`. Variables outside the
/// `STRATA_` namespace are ignored.
pub(crate) fn env_key(name: &str) -> Option<String> {
    name.starts_with("STRATA_")
        .then(|| name.to_lowercase().replace('_', "."))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flatten_nested_mappings_and_sequences() {
        let mut values = HashMap::new();
        load_yaml_str(
            "strata:\n  page:\n    size: 5\n  tags: [a, b]\n",
            &mut values,
        )
        .unwrap();
        assert!(matches!(values.get("strata.page.size"), Some(ConfigValue::Integer(5))));
        assert!(matches!(values.get("strata.tags"), Some(ConfigValue::List(items)) if items.len() == 2));
        assert!(matches!(values.get("strata.tags.1"), Some(ConfigValue::String(s)) if s == "b"));
    }

    #[test]
    fn test_env_key_mapping() {
        assert_eq!(env_key("STRATA_PAGE_MAX").as_deref(), Some("strata.page.max"));
        assert_eq!(env_key("HOME"), None);
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let mut values = HashMap::new();
        let loaded = load_yaml_file(Path::new("does-not-exist.yaml"), &mut values).unwrap();
        assert!(!loaded);
        assert!(values.is_empty());
    }
}
