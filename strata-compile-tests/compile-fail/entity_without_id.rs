use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
pub struct Note {
    pub title: String,
    pub body: String,
}

fn main() {}
