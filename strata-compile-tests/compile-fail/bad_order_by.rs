use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
pub struct Product {
    #[id]
    pub product_num: String,
    pub price: Option<f64>,
}

#[repository(entity = Product)]
pub trait Catalog {
    #[order_by("price,sideways")]
    async fn find_by_price_not_null(&self) -> Result<Vec<Product>, DataError>;
}

fn main() {}
