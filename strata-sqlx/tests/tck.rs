#![cfg(feature = "sqlite")]

use strata_sqlx::SqliteProvider;

strata_tck::conformance_tests!(async {
    SqliteProvider::connect("sqlite::memory:")
        .await
        .expect("in-memory SQLite database")
});
