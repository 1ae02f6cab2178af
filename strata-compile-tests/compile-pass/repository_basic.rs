use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
#[entity(name = "Product")]
pub struct Product {
    #[id]
    pub product_num: String,
    pub name: String,
    pub price: Option<f64>,
    pub tags: Vec<String>,
}

#[repository(entity = Product)]
pub trait Catalog {
    #[insert]
    async fn add(&self, product: Product) -> Result<Product, DataError>;

    #[save]
    async fn save_all(&self, products: Vec<Product>) -> Result<Vec<Product>, DataError>;

    #[delete]
    async fn remove(&self, product: Product) -> Result<bool, DataError>;

    async fn find_by_name_like(
        &self,
        pattern: &str,
        pageable: &Pageable,
    ) -> Result<KeysetAwareSlice<Product>, DataError>;

    async fn count_by_price_less_than(&self, max: f64) -> Result<u64, DataError>;

    #[order_by("price,desc")]
    async fn find_by_price_not_null(&self) -> Result<Vec<Product>, DataError>;

    #[query("WHERE :tag MEMBER OF tags ORDER BY name")]
    async fn tagged(&self, tag: &str) -> Result<Vec<Product>, DataError>;
}

fn main() {
    let _catalog: Result<CatalogRepository<MemoryProvider>, DataError> =
        CatalogRepository::new(MemoryProvider::new());
}
