//! Conformance scenarios.
//!
//! Every scenario takes a fresh provider, clears its own test data, seeds a
//! known set of products, exercises one repository behavior and asserts
//! exact membership and ordering. Assertion failures panic; errors raised
//! by the provider are returned.

use strata_core::{
    Annotation, Consistency, Cursor, DataError, EntityShape, MethodDescriptor, Pageable,
    ParamRole, Provider, Repo, Repository, ReturnShape, Sort,
};

use crate::catalog::{Catalog, CatalogRepository};
use crate::model::{Department, Product};

const TEST_DATA: &str = "TEST-PROD-%";

async fn open<P: Provider>(scenario: &str, provider: P) -> Result<CatalogRepository<P>, DataError> {
    strata_core::init_tracing();
    tracing::info!(scenario, consistency = ?provider.consistency(), "Running conformance scenario");
    let catalog = CatalogRepository::new(provider)?;
    catalog.delete_by_product_num_like(TEST_DATA).await?;
    Ok(catalog)
}

async fn seed<P: Provider>(catalog: &CatalogRepository<P>, products: Vec<Product>) -> Result<(), DataError> {
    for product in products {
        catalog.save(product).await?;
    }
    Ok(())
}

fn names<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<&'a str> {
    products.into_iter().map(|p| p.name.as_str()).collect()
}

fn ids<'a>(products: impl IntoIterator<Item = &'a Product>) -> Vec<String> {
    products.into_iter().map(|p| p.product_num.clone()).collect()
}

fn missing(what: &str) -> DataError {
    DataError::Other(format!("expected {what}"))
}

async fn finish<P: Provider>(catalog: &CatalogRepository<P>, seeded: u64) -> Result<(), DataError> {
    assert_eq!(catalog.delete_by_product_num_like(TEST_DATA).await?, seeded);
    Ok(())
}

/// `contains` on a collection attribute tests membership.
pub async fn contains_in_collection<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("contains_in_collection", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("spade", 9.99, "TEST-PROD-21", &[Tools, Garden]),
            Product::of("shelves", 109.88, "TEST-PROD-22", &[Furniture, Office]),
            Product::of("desk", 315.98, "TEST-PROD-23", &[Furniture, Office]),
            Product::of("stapler", 6.79, "TEST-PROD-24", &[Office]),
        ],
    )
    .await?;

    let found = catalog.find_by_departments_contains(Furniture).await?;
    assert_eq!(names(found.iter()), ["desk", "shelves"]);

    let found = catalog.find_by_departments_contains(Office).await?;
    assert_eq!(names(found.iter()), ["desk", "shelves", "stapler"]);

    finish(&catalog, 4).await
}

/// `empty` on a collection attribute.
pub async fn empty_collection<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("empty_collection", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("refrigerator", 889.30, "TEST-PROD-41", &[Appliances]),
            Product::of("book", 15.98, "TEST-PROD-42", &[]),
            Product::of("baseball cap", 10.99, "TEST-PROD-43", &[SportingGoods, Clothing]),
        ],
    )
    .await?;

    let found = catalog.find_by_departments_empty().await?;
    assert_eq!(found.len(), 1);
    assert_eq!(found.front().map(|p| p.name.as_str()), Some("book"));

    finish(&catalog, 3).await
}

/// `id` in a method name resolves to `product_num`; the dynamic sort
/// orders the result.
pub async fn id_attribute_with_different_name<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("id_attribute_with_different_name", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("apple", 1.19, "TEST-PROD-12", &[Grocery]),
            Product::of("pear", 0.99, "TEST-PROD-14", &[Grocery]),
            Product::of("orange", 1.09, "TEST-PROD-16", &[Grocery]),
            Product::of("banana", 0.49, "TEST-PROD-17", &[Grocery]),
            Product::of("plum", 0.89, "TEST-PROD-18", &[Grocery]),
        ],
    )
    .await?;

    let found = catalog
        .find_by_id_between("TEST-PROD-13", "TEST-PROD-17", Sort::asc("name"))
        .await?;
    assert_eq!(names(&found), ["banana", "orange", "pear"]);

    finish(&catalog, 5).await
}

/// `like` with `%` and `_` wildcards.
pub async fn like<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("like", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("celery", 1.57, "TEST-PROD-31", &[Grocery]),
            Product::of("mushrooms", 1.89, "TEST-PROD-32", &[Grocery]),
            Product::of("carrots", 1.39, "TEST-PROD-33", &[Grocery]),
        ],
    )
    .await?;

    let found = catalog.find_by_name_like("%r_o%").await?;
    let mut found = names(&found);
    found.sort_unstable();
    assert_eq!(found, ["carrots", "mushrooms"]);

    // case-sensitive everywhere
    assert!(catalog.find_by_name_like("CEL%").await?.is_empty());

    finish(&catalog, 3).await
}

/// `ignore case` conditions and ignore-case sorts fold ASCII letters only,
/// so accented capitals never match their lowercase forms.
pub async fn ignore_case<P: Provider>(provider: P) -> Result<(), DataError> {
    let catalog = open("ignore_case", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("apple pie", 4.25, "TEST-PROD-51", &[]),
            Product::of("Éclair", 3.10, "TEST-PROD-52", &[]),
            Product::of("éclair", 3.20, "TEST-PROD-53", &[]),
            Product::of("Eclair", 3.30, "TEST-PROD-54", &[]),
            Product::of("BAKLAVA", 5.40, "TEST-PROD-55", &[]),
        ],
    )
    .await?;

    assert_eq!(names(&catalog.find_by_name_ignore_case("ÉCLAIR").await?), ["Éclair"]);
    assert_eq!(names(&catalog.find_by_name_ignore_case("éCLAIR").await?), ["éclair"]);
    assert_eq!(names(&catalog.find_by_name_ignore_case("eclair").await?), ["Eclair"]);
    assert_eq!(names(&catalog.find_by_name_ignore_case("baklava").await?), ["BAKLAVA"]);

    let sorted = catalog
        .find_by_id_between("TEST-PROD-51", "TEST-PROD-55", Sort::asc_ignore_case("name"))
        .await?;
    assert_eq!(names(&sorted), ["apple pie", "BAKLAVA", "Eclair", "Éclair", "éclair"]);

    finish(&catalog, 5).await
}

/// Counting with `greater than equal`, and an unknown attribute surfacing
/// as a mapping error when the method is invoked.
pub async fn count_and_mapping_error<P: Provider>(provider: P) -> Result<(), DataError> {
    let catalog = open("count_and_mapping_error", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("pen", 2.50, "TEST-PROD-01", &[]),
            Product::of("pencil", 1.25, "TEST-PROD-02", &[]),
            Product::of("marker", 3.00, "TEST-PROD-03", &[]),
            Product::of("calculator", 15.00, "TEST-PROD-04", &[]),
            Product::of("ruler", 2.00, "TEST-PROD-05", &[]),
        ],
    )
    .await?;

    assert_eq!(catalog.count_by_price_greater_than_equal(2.99).await?, 2);

    match catalog.count_by_surge_price_greater_than_equal(2.99).await {
        Err(DataError::Mapping(_)) => {}
        other => panic!("expected a mapping error, got {other:?}"),
    }

    finish(&catalog, 5).await
}

/// `null` and `not null`, combined with `less than equal` and a static
/// descending order.
pub async fn null_and_not_null<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("null_and_not_null", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("spinach", 2.28, "TEST-PROD-51", &[Grocery]),
            Product::of("broccoli", 2.49, "TEST-PROD-52", &[Grocery]),
            Product::of("rhubarb", None, "TEST-PROD-53", &[Grocery]),
            Product::of("potato", 0.79, "TEST-PROD-54", &[Grocery]),
        ],
    )
    .await?;

    let found = catalog.find_by_price_null().await?;
    assert_eq!(names(&found), ["rhubarb"]);

    let found = catalog.find_by_price_not_null_and_price_less_than_equal(2.30).await?;
    assert_eq!(names(&found), ["spinach", "potato"]);

    finish(&catalog, 4).await
}

/// Query text with named parameters and arithmetic.
pub async fn query_with_named_parameters<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("query_with_named_parameters", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("tape measure", 7.29, "TEST-PROD-61", &[Tools]),
            Product::of("pry bar", 4.39, "TEST-PROD-62", &[Tools]),
            Product::of("hammer", 8.59, "TEST-PROD-63", &[Tools]),
            Product::of("adjustable wrench", 4.99, "TEST-PROD-64", &[Tools]),
            Product::of("framing square", 9.88, "TEST-PROD-65", &[Tools]),
            Product::of("rasp", 6.79, "TEST-PROD-66", &[Tools]),
        ],
    )
    .await?;

    let found = catalog.with_tax_between(0.4, 0.6, 0.08125).await?;
    assert_eq!(names(&found), ["adjustable wrench", "rasp", "tape measure"]);

    finish(&catalog, 6).await
}

/// Query text with positional parameters and `SIZE`.
pub async fn query_with_positional_parameters<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("query_with_positional_parameters", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("sweater", 23.88, "TEST-PROD-71", &[Clothing]),
            Product::of("toothpaste", 2.39, "TEST-PROD-72", &[Pharmacy, Grocery]),
            Product::of("chisel", 5.99, "TEST-PROD-73", &[Tools]),
            Product::of("computer", 1299.50, "TEST-PROD-74", &[Electronics, Office]),
            Product::of("sunblock", 5.98, "TEST-PROD-75", &[Pharmacy, SportingGoods, Garden]),
            Product::of("basketball", 14.88, "TEST-PROD-76", &[SportingGoods]),
            Product::of("baseball cap", 12.99, "TEST-PROD-77", &[SportingGoods, Clothing]),
        ],
    )
    .await?;

    let found = catalog.find_by_department_count_and_price_below(2, 100.0).await?;
    assert_eq!(names(&found), ["baseball cap", "toothpaste"]);

    let found = catalog.find_by_department_count_and_price_below(3, 10000.0).await?;
    assert_eq!(names(&found), ["sunblock"]);

    finish(&catalog, 7).await
}

/// `MEMBER OF` with a parameter on the left, and `LOWER` inside a query.
pub async fn member_of_query<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("member_of_query", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("Garden Hose", 24.99, "TEST-PROD-35", &[Garden]),
            Product::of("hedge shears", 31.50, "TEST-PROD-36", &[Garden, Tools]),
            Product::of("hose reel", 45.00, "TEST-PROD-37", &[Automotive]),
        ],
    )
    .await?;

    let found = catalog.in_department_named_like(Garden, "%hose%").await?;
    assert_eq!(names(&found), ["Garden Hose"]);

    let found = catalog.in_department_named_like(Garden, "%").await?;
    assert_eq!(names(&found), ["Garden Hose", "hedge shears"]);

    finish(&catalog, 3).await
}

/// Single-result methods: exactly one, optional, first, and existence.
pub async fn single_results<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("single_results", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("lamp", 39.99, "TEST-PROD-26", &[Furniture]),
            Product::of("lamp", 19.99, "TEST-PROD-27", &[Office]),
            Product::of("lantern", 24.00, "TEST-PROD-28", &[Garden]),
        ],
    )
    .await?;

    assert_eq!(catalog.find_by_name("lantern").await?.product_num, "TEST-PROD-28");
    match catalog.find_by_name("lamp").await {
        Err(DataError::NonUniqueResult(_)) => {}
        other => panic!("expected a non-unique result, got {other:?}"),
    }
    match catalog.find_by_name("sofa").await {
        Err(DataError::EmptyResult(_)) => {}
        other => panic!("expected an empty result, got {other:?}"),
    }

    let priciest = catalog.find_first_by_name_like_order_by_price_desc("la%").await?;
    assert_eq!(priciest.map(|p| p.product_num), Some("TEST-PROD-26".to_string()));
    assert_eq!(catalog.find_first_by_name_like_order_by_price_desc("x%").await?, None);

    assert!(catalog.exists_by_name("lantern").await?);
    assert!(!catalog.exists_by_name("sofa").await?);

    finish(&catalog, 3).await
}

/// Batch inserts return entities in input order, whatever order the store
/// keeps them in.
pub async fn insert_preserves_input_order<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("insert_preserves_input_order", provider).await?;

    let batch = vec![
        Product::of("wrench", 11.00, "TEST-PROD-93", &[Tools]),
        Product::of("clamp", 7.50, "TEST-PROD-91", &[Tools]),
        Product::of("level", 13.25, "TEST-PROD-92", &[Tools]),
    ];
    let stored = catalog.add_all(batch.clone()).await?;
    assert_eq!(stored, batch);

    let array = [
        Product::of("glue", 3.10, "TEST-PROD-96", &[Office]),
        Product::of("tape", 2.20, "TEST-PROD-94", &[Office]),
        Product::of("scissors", 5.40, "TEST-PROD-95", &[Office]),
    ];
    let stored = catalog.add_array(array.clone()).await?;
    assert_eq!(ids(stored.iter()), ids(&array));

    let single = catalog.add(Product::of("ruler", 1.99, "TEST-PROD-97", &[Office])).await?;
    assert_eq!(single.name, "ruler");

    finish(&catalog, 7).await
}

/// ACID providers reject a duplicate identifier; BASE providers keep the
/// latest write.
pub async fn duplicate_insert<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("duplicate_insert", provider).await?;
    let id = "TEST-PROD-81".to_string();

    catalog.add(Product::of("kettle", 19.99, &id, &[Appliances])).await?;
    let again = catalog.add(Product::of("teapot", 24.50, &id, &[Appliances])).await;

    let stored = catalog.find_by_id(&id).await?.ok_or_else(|| missing("the inserted product"))?;
    match catalog.provider().consistency() {
        Consistency::Acid => {
            assert!(matches!(again, Err(DataError::EntityExists(_))), "got {again:?}");
            assert_eq!(stored.name, "kettle");
        }
        Consistency::Base => {
            assert_eq!(again?.name, "teapot");
            assert_eq!(stored.name, "teapot");
        }
    }

    finish(&catalog, 1).await
}

/// A batch with one duplicate stores nothing on ACID providers.
pub async fn batch_insert_is_atomic<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("batch_insert_is_atomic", provider).await?;
    catalog.add(Product::of("drill", 89.00, "TEST-PROD-82", &[Tools])).await?;

    let result = catalog
        .add_all(vec![
            Product::of("saw", 29.00, "TEST-PROD-83", &[Tools]),
            Product::of("drill", 95.00, "TEST-PROD-82", &[Tools]),
        ])
        .await;

    let saw_stored = catalog.exists_by_id(&"TEST-PROD-83".to_string()).await?;
    match catalog.provider().consistency() {
        Consistency::Acid => {
            assert!(matches!(result, Err(DataError::EntityExists(_))), "got {result:?}");
            assert!(!saw_stored);
            finish(&catalog, 1).await
        }
        Consistency::Base => {
            assert_eq!(result?.len(), 2);
            assert!(saw_stored);
            finish(&catalog, 2).await
        }
    }
}

/// Update and delete, single and batch.
pub async fn update_and_delete<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("update_and_delete", provider).await?;
    let ghost = Product::of("ghost", 1.00, "TEST-PROD-80", &[]);

    assert!(!catalog.modify(ghost.clone()).await?);
    match catalog.replace(ghost.clone()).await {
        Err(DataError::NotFound(_)) => {}
        other => panic!("expected not found, got {other:?}"),
    }
    assert!(!catalog.exists_by_id(&ghost.product_num).await?);

    let mut rake = Product::of("rake", 17.00, "TEST-PROD-84", &[Garden]);
    let hoe = Product::of("hoe", 14.00, "TEST-PROD-85", &[Garden]);
    seed(&catalog, vec![rake.clone(), hoe.clone()]).await?;

    rake.price = Some(15.00);
    assert!(catalog.modify(rake.clone()).await?);
    rake.departments.push(Tools);
    assert_eq!(catalog.replace(rake.clone()).await?, rake);
    assert_eq!(catalog.find_by_id(&rake.product_num).await?, Some(rake.clone()));

    assert_eq!(catalog.modify_all(vec![hoe.clone(), ghost.clone()]).await?, 1);

    assert!(catalog.remove(hoe.clone()).await?);
    assert!(!catalog.remove(hoe).await?);
    assert_eq!(catalog.count().await?, 1);

    assert_eq!(catalog.clear().await?, 1);
    assert_eq!(catalog.count().await?, 0);
    finish(&catalog, 0).await
}

/// `DELETE` query text returning the number of removed entities.
pub async fn delete_query<P: Provider>(provider: P) -> Result<(), DataError> {
    use Department::*;
    let catalog = open("delete_query", provider).await?;
    seed(
        &catalog,
        vec![
            Product::of("mystery box", None, "TEST-PROD-44", &[]),
            Product::of("gift card", None, "TEST-PROD-45", &[]),
            Product::of("umbrella", 12.00, "TEST-PROD-46", &[Clothing]),
        ],
    )
    .await?;

    assert_eq!(catalog.delete_unpriced().await?, 2);
    assert_eq!(catalog.delete_unpriced().await?, 0);

    finish(&catalog, 1).await
}

fn keyset_products() -> Vec<Product> {
    [
        ("TEST-PROD-81", 5.0),
        ("TEST-PROD-82", 3.0),
        ("TEST-PROD-83", 5.0),
        ("TEST-PROD-84", 1.0),
        ("TEST-PROD-85", 8.0),
        ("TEST-PROD-86", 3.0),
        ("TEST-PROD-87", 2.0),
        ("TEST-PROD-88", 5.0),
        ("TEST-PROD-89", 9.0),
        ("TEST-PROD-90", 4.0),
    ]
    .into_iter()
    .map(|(id, price)| Product::of(&format!("item {id}"), price, id, &[Department::Office]))
    .collect()
}

/// Price order, ties broken by identifier.
const KEYSET_ORDER: [&str; 10] = [
    "TEST-PROD-84",
    "TEST-PROD-87",
    "TEST-PROD-82",
    "TEST-PROD-86",
    "TEST-PROD-90",
    "TEST-PROD-81",
    "TEST-PROD-83",
    "TEST-PROD-88",
    "TEST-PROD-85",
    "TEST-PROD-89",
];

/// Keyset traversal forward then backward visits every entity exactly
/// once, and an entity inserted behind the cursor does not shift later
/// windows.
pub async fn keyset_traversal<P: Provider>(provider: P) -> Result<(), DataError> {
    let catalog = open("keyset_traversal", provider).await?;
    seed(&catalog, keyset_products()).await?;

    let first = Pageable::of_size(3)?.sort_by([Sort::asc("price")]);
    let mut slice = catalog.find_by_product_num_like(TEST_DATA, &first).await?;
    assert!(!slice.has_previous);
    let mut forward = ids(&slice.content);
    let mut windows = 1;

    catalog.save(Product::of("late arrival", 0.5, "TEST-PROD-91", &[])).await?;

    while let Some(next) = slice.next_pageable() {
        slice = catalog.find_by_product_num_like(TEST_DATA, &next).await?;
        forward.extend(ids(&slice.content));
        windows += 1;
    }
    assert_eq!(forward, KEYSET_ORDER);
    assert_eq!(windows, 4);
    assert!(!slice.has_next);

    let mut backward: Vec<String> = ids(&slice.content).into_iter().rev().collect();
    while let Some(previous) = slice.previous_pageable() {
        slice = catalog.find_by_product_num_like(TEST_DATA, &previous).await?;
        backward.extend(ids(&slice.content).into_iter().rev());
    }
    backward.reverse();
    let mut expected = vec!["TEST-PROD-91"];
    expected.extend(KEYSET_ORDER);
    assert_eq!(backward, expected);

    finish(&catalog, 11).await
}

/// Cursors survive a round trip through their token, and are rejected when
/// the request sorts differently or asks for an offset result.
pub async fn keyset_cursor_rules<P: Provider>(provider: P) -> Result<(), DataError> {
    let catalog = open("keyset_cursor_rules", provider).await?;
    seed(&catalog, keyset_products()).await?;

    let first = Pageable::of_size(4)?.sort_by([Sort::asc("price")]);
    let slice = catalog.find_by_product_num_like(TEST_DATA, &first).await?;
    let last = slice.key_cursor(3).ok_or_else(|| missing("a cursor for the fourth element"))?;
    let restored = Cursor::from_token(&last.to_token())?;
    assert_eq!(&restored, last);

    let next = first.clone().after_cursor(restored);
    let following = catalog.find_by_product_num_like(TEST_DATA, &next).await?;
    assert_eq!(ids(&following.content), KEYSET_ORDER[4..8]);
    assert!(following.has_previous);

    let resorted = next.clone().sort_by([Sort::desc("name")]);
    match catalog.find_by_product_num_like(TEST_DATA, &resorted).await {
        Err(DataError::InvalidCursor(_)) => {}
        other => panic!("expected an invalid cursor, got {other:?}"),
    }

    match catalog.find_by_price_greater_than(0.0, &next).await {
        Err(DataError::InvalidCursor(_)) => {}
        other => panic!("expected an invalid cursor, got {other:?}"),
    }

    let raw = Pageable::of_size(2)?
        .sort_by([Sort::asc("price")])
        .after_keyset([5.0.into(), "TEST-PROD-81".into()]);
    let after_raw = catalog.find_by_product_num_like(TEST_DATA, &raw).await?;
    assert_eq!(ids(&after_raw.content), ["TEST-PROD-83", "TEST-PROD-88"]);

    let page = catalog
        .find_by_product_num_starts_with("TEST-PROD-8", &first)
        .await?;
    assert_eq!(page.total_elements, 9);
    assert_eq!(ids(page.content()), KEYSET_ORDER[..4]);
    assert!(page.has_next());

    finish(&catalog, 10).await
}

/// Offset pagination with `Page` and `Slice` results.
pub async fn offset_pagination<P: Provider>(provider: P) -> Result<(), DataError> {
    let catalog = open("offset_pagination", provider).await?;
    seed(&catalog, keyset_products()).await?;

    let second = Pageable::new(2, 3)?;
    let page = catalog.find_by_price_greater_than(2.5, &second).await?;
    assert_eq!(ids(&page.content), ["TEST-PROD-85", "TEST-PROD-86", "TEST-PROD-88"]);
    assert_eq!(page.total_elements, 8);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next());
    assert_eq!(page.next_pageable().map(|p| p.page()), Some(3));

    let slice = catalog
        .find_by_price_less_than(5.0, &Pageable::of_size(3)?)
        .await?;
    assert_eq!(ids(&slice.content), ["TEST-PROD-82", "TEST-PROD-84", "TEST-PROD-86"]);
    assert!(slice.has_next);
    let rest = catalog
        .find_by_price_less_than(5.0, &slice.next_pageable().ok_or_else(|| missing("a next page"))?)
        .await?;
    assert_eq!(ids(&rest.content), ["TEST-PROD-87", "TEST-PROD-90"]);
    assert!(!rest.has_next);

    let paged = catalog.find_all_paged(&Pageable::of_size(4)?.sort_by([Sort::desc("price")])).await?;
    assert_eq!(ids(&paged.content), ["TEST-PROD-89", "TEST-PROD-85", "TEST-PROD-81", "TEST-PROD-83"]);
    assert_eq!(paged.total_pages, 3);

    finish(&catalog, 10).await
}

/// Two operation markers on one method are rejected when the repository is
/// built, before anything is invoked.
pub async fn conflicting_markers_rejected<P: Provider>(provider: P) -> Result<(), DataError> {
    let descriptor = MethodDescriptor::new("store")
        .annotate(Annotation::Insert)
        .annotate(Annotation::Update)
        .param("product", ParamRole::Entity(EntityShape::Single))
        .returns(ReturnShape::Unit);
    match Repo::<Product, P>::new(provider, [descriptor]) {
        Err(DataError::UnsupportedOperation(msg)) => {
            assert!(msg.contains("store"), "message should name the method: {msg}");
            Ok(())
        }
        Err(other) => panic!("expected an unsupported operation, got {other:?}"),
        Ok(_) => panic!("conflicting markers were accepted"),
    }
}
