use strata::prelude::*;

#[derive(Entity, Clone, Debug)]
pub struct Note {
    pub id: i64,
    pub title: String,
    #[entity(scalar)]
    pub body: Vec<u8>,
}

#[repository(entity = Note, name = Notes)]
pub trait NoteStore {
    async fn find_by_title(&self, title: &str, sort: Sort) -> Result<Option<Note>, DataError>;

    async fn exists_by_title(&self, title: &str) -> Result<bool, DataError>;

    #[query("DELETE FROM Note WHERE title LIKE :pattern")]
    async fn purge(&self, pattern: &str) -> Result<u64, DataError>;
}

fn main() {
    let _notes: Result<Notes<MemoryProvider>, DataError> = Notes::new(MemoryProvider::new());
}
