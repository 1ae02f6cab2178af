//! The SQLite driver stays behind the `sqlite` feature for every member
//! that inherits `strata-sqlx` from the workspace.

fn manifest(relative: &str) -> String {
    let path = std::path::Path::new(env!("CARGO_MANIFEST_DIR")).join(relative);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()))
}

fn dependency_line<'a>(manifest: &'a str, name: &str) -> &'a str {
    manifest
        .lines()
        .find(|line| line.trim_start().starts_with(&format!("{name} =")))
        .unwrap_or_else(|| panic!("no `{name}` dependency"))
}

#[test]
fn test_workspace_sqlx_entry_disables_default_features() {
    let root = manifest("../Cargo.toml");
    let line = dependency_line(&root, "strata-sqlx");
    assert!(line.contains("default-features = false"), "{line}");
}

#[test]
fn test_sqlite_feature_enables_the_driver() {
    let facade = manifest("Cargo.toml");
    let line = dependency_line(&facade, "sqlite");
    assert!(line.contains("strata-sqlx/sqlite"), "{line}");
}
