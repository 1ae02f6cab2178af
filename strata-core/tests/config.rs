use serial_test::serial;
use strata_core::config::{ConfigError, PaginationSettings, ProviderSettings, StrataConfig};
use strata_core::Consistency;

fn write(dir: &std::path::Path, name: &str, content: &str) {
    std::fs::write(dir.join(name), content).unwrap();
}

#[test]
#[serial]
fn test_profile_file_overrides_base() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "strata.yaml", "strata:\n  page:\n    size: 10\n    max: 100\n");
    write(dir.path(), "strata-prod.yaml", "strata:\n  page:\n    max: 500\n");

    let config = StrataConfig::load_from(dir.path(), "prod").unwrap();
    assert_eq!(config.profile(), "prod");
    let pages: PaginationSettings = config.section().unwrap();
    assert_eq!(pages.default_size, 10);
    assert_eq!(pages.max_size, 500);
}

#[test]
#[serial]
fn test_env_overrides_files() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "strata.yaml", "strata:\n  provider:\n    consistency: acid\n");

    std::env::set_var("STRATA_PROVIDER_CONSISTENCY", "base");
    let config = StrataConfig::load_from(dir.path(), "dev");
    std::env::remove_var("STRATA_PROVIDER_CONSISTENCY");

    let settings: ProviderSettings = config.unwrap().section().unwrap();
    assert_eq!(settings.consistency, Consistency::Base);
}

#[test]
#[serial]
fn test_profile_env_var_wins_over_argument() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "strata-ci.yaml", "strata:\n  sqlite:\n    connections: 4\n");

    std::env::set_var("STRATA_PROFILE", "ci");
    let config = StrataConfig::load_from(dir.path(), "dev");
    std::env::remove_var("STRATA_PROFILE");

    let config = config.unwrap();
    assert_eq!(config.profile(), "ci");
    assert_eq!(config.get::<u32>("strata.sqlite.connections").unwrap(), 4);
}

#[test]
#[serial]
fn test_dotenv_file_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), ".env", "STRATA_SQLITE_URL=sqlite://dotenv.db\n");

    let config = StrataConfig::load_from(dir.path(), "dev");
    std::env::remove_var("STRATA_SQLITE_URL");

    let settings: ProviderSettings = config.unwrap().section().unwrap();
    assert_eq!(settings.sqlite_url, "sqlite://dotenv.db");
}

#[test]
#[serial]
fn test_malformed_file_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    write(dir.path(), "strata.yaml", "strata: [oops\n");
    assert!(matches!(
        StrataConfig::load_from(dir.path(), "dev"),
        Err(ConfigError::Load(_))
    ));
}
