//! # strata-sqlx - SQLx backend for Strata repositories
//!
//! This crate provides the [SQLx](https://github.com/launchbadge/sqlx)-specific
//! pieces of Strata's data layer. It depends on [`strata-core`] for the
//! [`Provider`] seam and the filter model, and adds SQL rendering, error
//! bridging and a SQLite provider.
//!
//! # What's in this crate
//!
//! | Type | Description |
//! |------|-------------|
//! | [`SqliteProvider`] | [`Provider`] over an `sqlx::SqlitePool`, one table per entity |
//! | [`QueryBuilder`] | Renders filters, sorts and windows into SQLite statements |
//! | [`SqlxErrorExt`] | Extension trait to convert `sqlx::Error` into `DataError` (`.into_data_error()`) |
//! | [`SqlxResult<T>`] | Type alias for `Result<T, DataError>` |
//!
//! # Feature flags
//!
//! | Feature  | Default | Driver |
//! |----------|---------|--------|
//! | `sqlite` | yes     | SQLite via `sqlx/sqlite` |
//!
//! # Quick start
//!
//! ```ignore
//! use strata_sqlx::SqliteProvider;
//!
//! let provider = SqliteProvider::connect("sqlite::memory:").await?;
//! let catalog = CatalogRepository::new(provider)?;
//! catalog.add(product).await?;
//! ```
//!
//! # Error bridging
//!
//! Due to Rust's orphan rules, `From<sqlx::Error> for DataError` can't be
//! implemented here. Use the [`SqlxErrorExt`] trait instead:
//!
//! ```ignore
//! use strata_sqlx::SqlxErrorExt;
//!
//! let row = sqlx::query("SELECT ...")
//!     .fetch_one(&pool)
//!     .await
//!     .map_err(|e| e.into_data_error())?;
//! ```
//!
//! [`Provider`]: strata_core::Provider

pub mod builder;
pub mod error;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use builder::{quote_identifier, QueryBuilder};
pub use error::{SqlxErrorExt, SqlxResult};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteProvider;

/// Re-exports of the most commonly used types from both `strata-core` and this crate.
pub mod prelude {
    pub use crate::SqlxErrorExt;
    #[cfg(feature = "sqlite")]
    pub use crate::SqliteProvider;
    pub use strata_core::prelude::*;
}
