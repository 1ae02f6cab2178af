//! Conformance suite for Strata providers.
//!
//! The scenarios are plain async functions generic over [`Provider`], so
//! any provider crate can run them. The [`conformance_tests!`] macro expands
//! to one `#[tokio::test]` per scenario:
//!
//! ```ignore
//! strata_tck::conformance_tests!(async { MemoryProvider::new() });
//! ```
//!
//! The expression is evaluated once per test and must be a future that
//! resolves to a fresh provider.
//!
//! [`Provider`]: strata_core::Provider

mod catalog;
mod model;
pub mod scenarios;

pub use catalog::{Catalog, CatalogRepository};
pub use model::{Department, Product};

/// Generate one `#[tokio::test]` per conformance scenario.
///
/// The calling crate needs `tokio` with the `macros` and `rt` features.
#[macro_export]
macro_rules! conformance_tests {
    ($provider:expr) => {
        $crate::conformance_tests!(@scenarios $provider;
            test_contains_in_collection => contains_in_collection,
            test_empty_collection => empty_collection,
            test_id_attribute_with_different_name => id_attribute_with_different_name,
            test_like => like,
            test_ignore_case => ignore_case,
            test_count_and_mapping_error => count_and_mapping_error,
            test_null_and_not_null => null_and_not_null,
            test_query_with_named_parameters => query_with_named_parameters,
            test_query_with_positional_parameters => query_with_positional_parameters,
            test_member_of_query => member_of_query,
            test_single_results => single_results,
            test_insert_preserves_input_order => insert_preserves_input_order,
            test_duplicate_insert => duplicate_insert,
            test_batch_insert_is_atomic => batch_insert_is_atomic,
            test_update_and_delete => update_and_delete,
            test_delete_query => delete_query,
            test_keyset_traversal => keyset_traversal,
            test_keyset_cursor_rules => keyset_cursor_rules,
            test_offset_pagination => offset_pagination,
            test_conflicting_markers_rejected => conflicting_markers_rejected,
        );
    };
    (@scenarios $provider:expr; $($test:ident => $scenario:ident),+ $(,)?) => {
        $(
            #[::tokio::test]
            async fn $test() {
                let provider = $provider.await;
                $crate::scenarios::$scenario(provider).await.unwrap();
            }
        )+
    };
}
