//! Strata - declarative repositories over pluggable providers.
//!
//! This facade crate re-exports the Strata sub-crates through a single
//! dependency with feature flags. Import everything you need with:
//!
//! ```ignore
//! use strata::prelude::*;
//! ```
//!
//! # Feature flags
//!
//! | Feature  | Default | Crate                  |
//! |----------|---------|------------------------|
//! | `memory` | **yes** | `strata-memory`        |
//! | `sqlite` | no      | `strata-sqlx/sqlite`   |
//! | `full`   | no      | All of the above       |
//!
//! # Example
//!
//! ```ignore
//! use strata::prelude::*;
//!
//! #[derive(Entity, Clone, Debug)]
//! struct Product {
//!     #[id]
//!     product_num: String,
//!     name: String,
//!     price: Option<f64>,
//! }
//!
//! #[repository(entity = Product)]
//! trait Products {
//!     #[insert]
//!     async fn add(&self, product: Product) -> Result<Product, DataError>;
//!
//!     async fn find_by_name_like(
//!         &self,
//!         pattern: &str,
//!         pageable: &Pageable,
//!     ) -> Result<KeysetAwareSlice<Product>, DataError>;
//! }
//!
//! let products = ProductsRepository::new(MemoryProvider::new())?;
//! ```

// Re-export sub-crates as public modules so they're accessible as
// `strata::strata_core`, `strata::strata_memory`, etc.
//
// The proc macros use `proc-macro-crate` to detect whether the user depends
// on `strata` (facade) or `strata-core`, and generate the correct paths.
pub extern crate strata_core;
pub extern crate strata_macros;

// Re-export everything from strata-core at the top level for convenience.
pub use strata_core::*;
pub use strata_macros::{repository, Entity};

#[cfg(feature = "memory")]
pub use strata_memory;

#[cfg(feature = "memory")]
pub use strata_memory::MemoryProvider;

#[cfg(feature = "sqlite")]
pub use strata_sqlx;

#[cfg(feature = "sqlite")]
pub use strata_sqlx::SqliteProvider;

/// Unified prelude - import everything with `use strata::prelude::*`.
pub mod prelude {
    pub use strata_core::prelude::*;
    pub use strata_macros::{repository, Entity};

    #[cfg(feature = "memory")]
    pub use strata_memory::MemoryProvider;

    #[cfg(feature = "sqlite")]
    pub use strata_sqlx::prelude::*;
}
