use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
pub struct Product {
    #[id]
    pub product_num: String,
    pub name: String,
}

#[repository(entity = Product)]
pub trait Catalog {
    #[insert]
    #[update]
    async fn store(&self, product: Product) -> Result<Product, DataError>;
}

fn main() {}
