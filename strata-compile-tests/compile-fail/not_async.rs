use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
pub struct Product {
    #[id]
    pub product_num: String,
    pub name: String,
}

#[repository(entity = Product)]
pub trait Catalog {
    fn find_by_name(&self, name: &str) -> Result<Vec<Product>, DataError>;
}

fn main() {}
