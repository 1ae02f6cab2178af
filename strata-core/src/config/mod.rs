//! Layered configuration.
//!
//! Values are flattened to dot-separated keys. Resolution order, lowest to
//! highest priority:
//! 1. `strata.yaml`
//! 2. `strata-{profile}.yaml`
//! 3. `.env` then `.env.{profile}` (loaded into the process environment,
//!    never overwriting variables already set)
//! 4. `STRATA_*` environment variables (`STRATA_PAGE_SIZE` overrides
//!    `strata.page.size`)
//!
//! The profile comes from `STRATA_PROFILE`, then the argument to
//! [`StrataConfig::load`].

mod loader;
pub mod settings;
pub mod value;

use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub use settings::{ConfigSection, PaginationSettings, ProviderSettings};
pub use value::{ConfigValue, FromConfigValue};

/// A single validation error detail from a typed section.
#[derive(Debug, Clone)]
pub struct ConfigValidationDetail {
    pub key: String,
    pub message: String,
}

/// Error type for configuration operations.
#[derive(Debug)]
pub enum ConfigError {
    /// The requested key was not found in the configuration.
    NotFound(String),
    /// The value could not be converted to the requested type.
    TypeMismatch { key: String, expected: &'static str },
    /// An I/O or YAML parsing error occurred while loading config files.
    Load(String),
    /// A typed section rejected its values.
    Validation(Vec<ConfigValidationDetail>),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::NotFound(key) => write!(f, "Config key not found: {key}"),
            ConfigError::TypeMismatch { key, expected } => {
                write!(f, "Config type mismatch for '{key}': expected {expected}")
            }
            ConfigError::Load(msg) => write!(f, "Config load error: {msg}"),
            ConfigError::Validation(details) => {
                write!(f, "Config validation errors:")?;
                for detail in details {
                    write!(f, "\n  - {}: {}", detail.key, detail.message)?;
                }
                Ok(())
            }
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration for repositories and providers.
#[derive(Debug, Clone)]
pub struct StrataConfig {
    values: HashMap<String, ConfigValue>,
    profile: String,
}

impl StrataConfig {
    /// Load configuration for `profile` from the current working directory.
    pub fn load(profile: &str) -> Result<Self, ConfigError> {
        Self::load_from(".", profile)
    }

    /// Load configuration for `profile`, looking for files in `dir`.
    pub fn load_from(dir: impl AsRef<Path>, profile: &str) -> Result<Self, ConfigError> {
        let dir = dir.as_ref();
        let active_profile =
            std::env::var("STRATA_PROFILE").unwrap_or_else(|_| profile.to_string());

        let mut values = HashMap::new();
        let files: [PathBuf; 2] = [
            dir.join("strata.yaml"),
            dir.join(format!("strata-{active_profile}.yaml")),
        ];
        for path in &files {
            if loader::load_yaml_file(path, &mut values)? {
                tracing::debug!(path = %path.display(), "Loaded config file");
            }
        }

        // .env files never overwrite variables that are already set
        let _ = dotenvy::from_path(dir.join(".env"));
        let _ = dotenvy::from_path(dir.join(format!(".env.{active_profile}")));

        for (name, val) in std::env::vars() {
            if let Some(key) = loader::env_key(&name) {
                values.insert(key, ConfigValue::String(val));
            }
        }

        tracing::info!(profile = %active_profile, keys = values.len(), "Configuration loaded");
        Ok(StrataConfig {
            values,
            profile: active_profile,
        })
    }

    /// Create a config from a YAML string (useful for testing).
    pub fn from_yaml_str(yaml: &str, profile: &str) -> Result<Self, ConfigError> {
        let mut values = HashMap::new();
        loader::load_yaml_str(yaml, &mut values)?;
        Ok(StrataConfig {
            values,
            profile: profile.to_string(),
        })
    }

    /// Create an empty config: every section falls back to its defaults.
    pub fn empty() -> Self {
        StrataConfig {
            values: HashMap::new(),
            profile: "test".to_string(),
        }
    }

    /// Set a value programmatically.
    pub fn set(&mut self, key: &str, value: ConfigValue) {
        self.values.insert(key.to_string(), value);
    }

    /// Get a typed value for the given dot-separated key.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if the key does not exist, or
    /// `ConfigError::TypeMismatch` if the value cannot be converted.
    pub fn get<V: FromConfigValue>(&self, key: &str) -> Result<V, ConfigError> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| ConfigError::NotFound(key.to_string()))?;
        V::from_config_value(value, key)
    }

    /// Get a typed value, returning `default` only when the key is missing.
    ///
    /// A present value of the wrong type is still an error.
    pub fn get_or<V: FromConfigValue>(&self, key: &str, default: V) -> Result<V, ConfigError> {
        match self.get(key) {
            Err(ConfigError::NotFound(_)) => Ok(default),
            other => other,
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The active profile name.
    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Build a typed section from this config.
    pub fn section<S: ConfigSection>(&self) -> Result<S, ConfigError> {
        S::from_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_typed_values() {
        let config = StrataConfig::from_yaml_str(
            "strata:\n  page:\n    size: 15\n  provider:\n    consistency: base\n",
            "test",
        )
        .unwrap();
        assert_eq!(config.get::<u64>("strata.page.size").unwrap(), 15);
        assert_eq!(config.get::<String>("strata.provider.consistency").unwrap(), "base");
        assert!(matches!(
            config.get::<String>("strata.sqlite.url"),
            Err(ConfigError::NotFound(_))
        ));
    }

    #[test]
    fn test_get_or_only_defaults_missing_keys() {
        let config = StrataConfig::from_yaml_str("strata:\n  page:\n    size: many\n", "test").unwrap();
        assert_eq!(config.get_or::<u64>("strata.page.max", 7).unwrap(), 7);
        assert!(config.get_or::<u64>("strata.page.size", 7).is_err());
    }

    #[test]
    fn test_invalid_yaml_is_load_error() {
        let err = StrataConfig::from_yaml_str("strata: [unclosed", "test").unwrap_err();
        assert!(matches!(err, ConfigError::Load(_)));
    }
}
