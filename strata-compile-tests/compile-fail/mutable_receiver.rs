use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
pub struct Product {
    #[id]
    pub product_num: String,
    pub name: String,
}

#[repository(entity = Product)]
pub trait Catalog {
    async fn count_by_name(&mut self, name: &str) -> Result<u64, DataError>;
}

fn main() {}
