extern crate proc_macro;
use proc_macro::TokenStream;

pub(crate) mod crate_path;
pub(crate) mod entity_derive;
pub(crate) mod repository_codegen;
pub(crate) mod repository_parsing;
pub(crate) mod types;

/// Derive `strata_core::Entity` for a struct with named fields.
///
/// # Attributes
///
/// | Attribute | Scope | Description |
/// |-----------|-------|-------------|
/// | `#[entity(name = "...")]` | struct | Entity name used in `FROM` clauses. Defaults to the struct name. |
/// | `#[id]` | field | The identifier attribute. A field named `id` is used when no field is marked. |
/// | `#[entity(collection)]` | field | Treat the field as a collection attribute. `Vec`, `VecDeque` and sets are detected automatically. |
/// | `#[entity(scalar)]` | field | Treat a detected collection as a single value. |
///
/// Every field type must implement `IntoValue` and `FromValue`.
///
/// ```ignore
/// #[derive(Entity, Clone, Debug)]
/// #[entity(name = "Product")]
/// pub struct Product {
///     #[id]
///     pub product_num: String,
///     pub name: String,
///     pub price: Option<f64>,
///     pub departments: Vec<Department>,
/// }
/// ```
#[proc_macro_derive(Entity, attributes(entity, id))]
pub fn derive_entity(input: TokenStream) -> TokenStream {
    entity_derive::expand(input)
}

/// Turn a trait into a repository contract and generate its implementation.
///
/// `#[repository(entity = Type)]` on a trait of `async fn` methods emits:
///
/// - The trait, with each `async fn` rewritten to return
///   `impl Future<Output = ...> + Send`.
/// - A `<Trait>Repository<P>` struct (or `name = ...`) generic over the
///   provider, with `new(provider)`, `with_config(provider, &config)` and
///   `descriptors()`, dereferencing to `strata_core::Repo`.
/// - `impl Trait for <Trait>Repository<P>`.
///
/// Each method is either a lifecycle operation (`#[insert]`, `#[update]`,
/// `#[delete]`, `#[save]`), an annotated query (`#[query("...")]`), or a
/// query derived from its name (`find_by_name_like`). Two markers on one
/// method are rejected at compile time.
///
/// ```ignore
/// #[repository(entity = Product)]
/// pub trait Catalog {
///     #[insert]
///     async fn add(&self, product: Product) -> Result<Product, DataError>;
///
///     #[order_by("price,desc")]
///     async fn find_by_price_less_than(&self, max: f64) -> Result<Vec<Product>, DataError>;
///
///     #[query("WHERE price * :rate BETWEEN :min AND :max ORDER BY name")]
///     async fn with_tax_between(&self, min: f64, max: f64, rate: f64) -> Result<Vec<Product>, DataError>;
/// }
///
/// let catalog = CatalogRepository::new(MemoryProvider::new())?;
/// ```
#[proc_macro_attribute]
pub fn repository(args: TokenStream, input: TokenStream) -> TokenStream {
    let args = syn::parse_macro_input!(args as repository_parsing::RepositoryArgs);
    let item = syn::parse_macro_input!(input as syn::ItemTrait);
    match repository_parsing::parse(args, item) {
        Ok(def) => repository_codegen::generate(def).into(),
        Err(err) => err.to_compile_error().into(),
    }
}

// ---------------------------------------------------------------------------
// No-op attributes, consumed by #[repository] from the token stream.
// Declared here for IDE support (rust-analyzer), cargo doc, and to prevent
// "cannot find attribute" errors when used outside #[repository].
// ---------------------------------------------------------------------------

/// Mark a method that inserts the entities it receives.
///
/// Accepts one entity, a `Vec`, a slice or an array. Returns `()`, the
/// inserted entity, or the inserted entities in input order.
///
/// This attribute is consumed by [`repository`], it is a no-op on its own.
#[proc_macro_attribute]
pub fn insert(_args: TokenStream, input: TokenStream) -> TokenStream {
    input
}

/// Mark a method that replaces existing entities.
///
/// A single-entity update may return `bool` (whether it existed) or the
/// entity (`NotFound` when it did not); a batch update may return a count.
///
/// This attribute is consumed by [`repository`], it is a no-op on its own.
#[proc_macro_attribute]
pub fn update(_args: TokenStream, input: TokenStream) -> TokenStream {
    input
}

/// Mark a method that deletes the entities it receives, or every entity
/// when it takes no parameters.
///
/// This attribute is consumed by [`repository`], it is a no-op on its own.
#[proc_macro_attribute]
pub fn delete(_args: TokenStream, input: TokenStream) -> TokenStream {
    input
}

/// Mark a method that inserts or replaces entities.
///
/// This attribute is consumed by [`repository`], it is a no-op on its own.
#[proc_macro_attribute]
pub fn save(_args: TokenStream, input: TokenStream) -> TokenStream {
    input
}

/// Run a query written in the portable query language.
///
/// ```ignore
/// #[query("WHERE SIZE(departments) = ?1 AND price < ?2 ORDER BY name")]
/// async fn find_by_department_count_and_price_below(&self, count: u32, max: f64) -> Result<Vec<Product>, DataError>;
///
/// #[query("DELETE FROM Product WHERE product_num LIKE :pattern")]
/// async fn delete_matching(&self, pattern: &str) -> Result<u64, DataError>;
/// ```
///
/// This attribute is consumed by [`repository`], it is a no-op on its own.
#[proc_macro_attribute]
pub fn query(_args: TokenStream, input: TokenStream) -> TokenStream {
    input
}

/// Static ordering for a query method, `"attribute[,asc|desc][,ignorecase]"`.
/// May be repeated; applied before the name's or query's own ordering.
///
/// This attribute is consumed by [`repository`], it is a no-op on its own.
#[proc_macro_attribute]
pub fn order_by(_args: TokenStream, input: TokenStream) -> TokenStream {
    input
}
