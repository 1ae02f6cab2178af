use std::collections::VecDeque;

use strata_core::{DataError, KeysetAwarePage, KeysetAwareSlice, Page, Pageable, Slice, Sort};
use strata_macros::repository;

use crate::model::{Department, Product};

/// The repository exercised by the conformance scenarios.
#[repository(entity = Product)]
pub trait Catalog {
    #[insert]
    async fn add(&self, product: Product) -> Result<Product, DataError>;

    #[insert]
    async fn add_all(&self, products: Vec<Product>) -> Result<Vec<Product>, DataError>;

    #[insert]
    async fn add_array(&self, products: [Product; 3]) -> Result<Box<[Product]>, DataError>;

    #[save]
    async fn save(&self, product: Product) -> Result<Product, DataError>;

    #[update]
    async fn modify(&self, product: Product) -> Result<bool, DataError>;

    #[update]
    async fn replace(&self, product: Product) -> Result<Product, DataError>;

    #[update]
    async fn modify_all(&self, products: Vec<Product>) -> Result<u64, DataError>;

    #[delete]
    async fn remove(&self, product: Product) -> Result<bool, DataError>;

    #[delete]
    async fn clear(&self) -> Result<u64, DataError>;

    async fn delete_by_product_num_like(&self, pattern: &str) -> Result<u64, DataError>;

    #[order_by("name")]
    async fn find_by_departments_contains(
        &self,
        department: Department,
    ) -> Result<Box<[Product]>, DataError>;

    async fn find_by_departments_empty(&self) -> Result<VecDeque<Product>, DataError>;

    async fn find_by_id_between(
        &self,
        first: &str,
        last: &str,
        sort: Sort,
    ) -> Result<Vec<Product>, DataError>;

    async fn find_by_name_like(&self, pattern: &str) -> Result<Vec<Product>, DataError>;

    async fn find_first_by_name_like_order_by_price_desc(
        &self,
        pattern: &str,
    ) -> Result<Option<Product>, DataError>;

    async fn find_by_name(&self, name: &str) -> Result<Product, DataError>;

    async fn find_by_name_ignore_case(&self, name: &str) -> Result<Vec<Product>, DataError>;

    async fn exists_by_name(&self, name: &str) -> Result<bool, DataError>;

    async fn count_by_price_greater_than_equal(&self, min: f64) -> Result<i32, DataError>;

    /// `surge_price` is not an attribute of `Product`: invoking this fails.
    async fn count_by_surge_price_greater_than_equal(&self, min: f64) -> Result<i32, DataError>;

    async fn find_by_price_null(&self) -> Result<Vec<Product>, DataError>;

    #[order_by("price,desc")]
    async fn find_by_price_not_null_and_price_less_than_equal(
        &self,
        max: f64,
    ) -> Result<Vec<Product>, DataError>;

    #[query("SELECT o FROM Product o WHERE (o.price * :rate) BETWEEN :min AND :max ORDER BY o.name")]
    async fn with_tax_between(&self, min: f64, max: f64, rate: f64) -> Result<Vec<Product>, DataError>;

    #[query("SELECT o FROM Product o WHERE (SIZE(o.departments) = ?1 AND o.price < ?2) ORDER BY o.name")]
    async fn find_by_department_count_and_price_below(
        &self,
        count: i32,
        max: f64,
    ) -> Result<Vec<Product>, DataError>;

    #[query("WHERE :department MEMBER OF departments AND LOWER(name) LIKE :pattern ORDER BY name")]
    async fn in_department_named_like(
        &self,
        department: Department,
        pattern: &str,
    ) -> Result<Vec<Product>, DataError>;

    #[query("DELETE FROM Product WHERE price IS NULL")]
    async fn delete_unpriced(&self) -> Result<u64, DataError>;

    async fn find_by_product_num_like(
        &self,
        pattern: &str,
        pageable: &Pageable,
    ) -> Result<KeysetAwareSlice<Product>, DataError>;

    async fn find_by_product_num_starts_with(
        &self,
        prefix: &str,
        pageable: &Pageable,
    ) -> Result<KeysetAwarePage<Product>, DataError>;

    #[order_by("product_num")]
    async fn find_by_price_greater_than(
        &self,
        min: f64,
        pageable: &Pageable,
    ) -> Result<Page<Product>, DataError>;

    #[order_by("product_num")]
    async fn find_by_price_less_than(
        &self,
        max: f64,
        pageable: &Pageable,
    ) -> Result<Slice<Product>, DataError>;
}
