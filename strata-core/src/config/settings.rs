use crate::page::DEFAULT_PAGE_SIZE;
use crate::provider::Consistency;

use super::{ConfigError, ConfigValidationDetail, StrataConfig};

/// A strongly-typed group of settings under a common key prefix.
pub trait ConfigSection: Sized {
    /// The key prefix, e.g. `"strata.page"`.
    fn prefix() -> &'static str;

    fn from_config(config: &StrataConfig) -> Result<Self, ConfigError>;
}

fn key(prefix: &str, name: &str) -> String {
    format!("{prefix}.{name}")
}

/// Page size defaults and limits (`strata.page.*`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationSettings {
    /// Size used when a request does not choose one.
    pub default_size: u64,
    /// Upper bound applied to every requested page size.
    pub max_size: u64,
}

pub const DEFAULT_MAX_PAGE_SIZE: u64 = 1000;

impl Default for PaginationSettings {
    fn default() -> Self {
        Self {
            default_size: DEFAULT_PAGE_SIZE,
            max_size: DEFAULT_MAX_PAGE_SIZE,
        }
    }
}

impl ConfigSection for PaginationSettings {
    fn prefix() -> &'static str {
        "strata.page"
    }

    fn from_config(config: &StrataConfig) -> Result<Self, ConfigError> {
        let p = Self::prefix();
        let settings = Self {
            default_size: config.get_or(&key(p, "size"), DEFAULT_PAGE_SIZE)?,
            max_size: config.get_or(&key(p, "max"), DEFAULT_MAX_PAGE_SIZE)?,
        };

        let mut details = Vec::new();
        if settings.default_size == 0 {
            details.push(ConfigValidationDetail {
                key: key(p, "size"),
                message: "must be at least 1".into(),
            });
        }
        if settings.max_size < settings.default_size {
            details.push(ConfigValidationDetail {
                key: key(p, "max"),
                message: format!("must not be below the default size {}", settings.default_size),
            });
        }
        if details.is_empty() {
            Ok(settings)
        } else {
            Err(ConfigError::Validation(details))
        }
    }
}

/// Provider selection and connection settings (`strata.provider.*`,
/// `strata.sqlite.*`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderSettings {
    pub consistency: Consistency,
    pub sqlite_url: String,
    pub sqlite_connections: u32,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            consistency: Consistency::Acid,
            sqlite_url: "sqlite::memory:".to_string(),
            sqlite_connections: 1,
        }
    }
}

impl ConfigSection for ProviderSettings {
    fn prefix() -> &'static str {
        "strata.provider"
    }

    fn from_config(config: &StrataConfig) -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let consistency_key = key(Self::prefix(), "consistency");
        let consistency = match config.get::<String>(&consistency_key) {
            Ok(raw) => raw.parse().map_err(|_| ConfigError::TypeMismatch {
                key: consistency_key,
                expected: "'acid' or 'base'",
            })?,
            Err(ConfigError::NotFound(_)) => defaults.consistency,
            Err(e) => return Err(e),
        };
        let sqlite_connections: u32 =
            config.get_or("strata.sqlite.connections", defaults.sqlite_connections)?;
        if sqlite_connections == 0 {
            return Err(ConfigError::Validation(vec![ConfigValidationDetail {
                key: "strata.sqlite.connections".into(),
                message: "must be at least 1".into(),
            }]));
        }
        Ok(Self {
            consistency,
            sqlite_url: config.get_or("strata.sqlite.url", defaults.sqlite_url)?,
            sqlite_connections,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_config() {
        let config = StrataConfig::empty();
        assert_eq!(config.section::<PaginationSettings>().unwrap(), PaginationSettings::default());
        let provider = config.section::<ProviderSettings>().unwrap();
        assert_eq!(provider.consistency, Consistency::Acid);
        assert_eq!(provider.sqlite_url, "sqlite::memory:");
        assert_eq!(provider.sqlite_connections, 1);
    }

    #[test]
    fn test_max_below_default_is_rejected() {
        let config =
            StrataConfig::from_yaml_str("strata:\n  page:\n    size: 50\n    max: 10\n", "test").unwrap();
        let err = config.section::<PaginationSettings>().unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref d) if d[0].key == "strata.page.max"));
    }

    #[test]
    fn test_unknown_consistency_is_mismatch() {
        let config =
            StrataConfig::from_yaml_str("strata:\n  provider:\n    consistency: eventual\n", "test")
                .unwrap();
        assert!(matches!(
            config.section::<ProviderSettings>(),
            Err(ConfigError::TypeMismatch { .. })
        ));
    }
}
