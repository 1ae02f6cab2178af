use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
pub struct Account {
    #[id]
    pub code: String,
    pub balance: f64,
}

#[repository(entity = Account)]
pub trait Accounts {
    async fn find_by_balance_greater_than(
        &self,
        min: f64,
        pageable: &Pageable,
    ) -> Result<Page<Account>, DataError>;
}

async fn open() -> Result<AccountsRepository<SqliteProvider>, DataError> {
    let provider = SqliteProvider::connect("sqlite::memory:").await?;
    AccountsRepository::new(provider)
}

fn main() {
    let _ = open();
}
