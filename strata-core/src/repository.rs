use std::borrow::Borrow;
use std::collections::BTreeSet;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use crate::config::PaginationSettings;
use crate::cursor::{effective_sorts, keyset_predicate, Cursor};
use crate::entity::Entity;
use crate::error::DataError;
use crate::expr::{CompareOp, Expr};
use crate::operation::{MethodDescriptor, OperationKind, ReturnShape};
use crate::page::{KeysetAwarePage, KeysetAwareSlice, PageMode, Page, Pageable, Slice};
use crate::provider::{Provider, Select};
use crate::registry::{resolve_sorts, MethodRegistry, Plan, QueryPlan, SelectAction};
use crate::sort::Sort;
use crate::value::{IntoValue, Value};

/// Generic async repository trait for CRUD operations.
///
/// Uses RPITIT (return-position `impl Trait` in traits), no `async-trait` needed.
pub trait Repository<T, ID>: Send + Sync
where
    T: Send + Sync + 'static,
    ID: Send + Sync + 'static,
{
    fn find_by_id(&self, id: &ID) -> impl Future<Output = Result<Option<T>, DataError>> + Send;
    fn exists_by_id(&self, id: &ID) -> impl Future<Output = Result<bool, DataError>> + Send;
    fn find_all(&self) -> impl Future<Output = Result<Vec<T>, DataError>> + Send;
    fn find_all_paged(&self, pageable: &Pageable) -> impl Future<Output = Result<Page<T>, DataError>> + Send;
    fn save(&self, entity: &T) -> impl Future<Output = Result<T, DataError>> + Send;
    fn delete_by_id(&self, id: &ID) -> impl Future<Output = Result<bool, DataError>> + Send;
    fn count(&self) -> impl Future<Output = Result<u64, DataError>> + Send;
}

/// Arguments of one repository method call, gathered by role.
///
/// Built by `#[repository]`-generated code:
///
/// ```ignore
/// let outcome = repo
///     .invoke("with_tax_between", Invocation::new().arg(&min).arg(&max).arg(&rate))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct Invocation<E> {
    entities: Vec<E>,
    args: Vec<Value>,
    sorts: Vec<Sort>,
    pageable: Option<Pageable>,
}

impl<E> Default for Invocation<E> {
    fn default() -> Self {
        Self {
            entities: Vec::new(),
            args: Vec::new(),
            sorts: Vec::new(),
            pageable: None,
        }
    }
}

impl<E: Clone> Invocation<E> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entity<B: Borrow<E>>(mut self, entity: B) -> Self {
        self.entities.push(entity.borrow().clone());
        self
    }

    pub fn entities<B: Borrow<E>>(mut self, entities: impl IntoIterator<Item = B>) -> Self {
        self.entities
            .extend(entities.into_iter().map(|e| e.borrow().clone()));
        self
    }

    /// Add the next operand, in declaration order.
    pub fn arg<V: IntoValue + ?Sized>(mut self, value: &V) -> Self {
        self.args.push(value.to_value());
        self
    }

    pub fn sort(mut self, sort: Sort) -> Self {
        self.sorts.push(sort);
        self
    }

    pub fn sorts(mut self, sorts: impl IntoIterator<Item = Sort>) -> Self {
        self.sorts.extend(sorts);
        self
    }

    pub fn pageable(mut self, pageable: Pageable) -> Self {
        self.pageable = Some(pageable);
        self
    }
}

/// Result of a repository method, before conversion to its declared type.
#[derive(Debug, Clone)]
pub enum Outcome<E> {
    Done,
    Entities(Vec<E>),
    Count(u64),
    Flag(bool),
    Slice(Slice<E>),
    Page(Page<E>),
    KeysetSlice(KeysetAwareSlice<E>),
    KeysetPage(KeysetAwarePage<E>),
}

impl<E> Outcome<E> {
    fn kind(&self) -> &'static str {
        match self {
            Outcome::Done => "nothing",
            Outcome::Entities(_) => "entities",
            Outcome::Count(_) => "a count",
            Outcome::Flag(_) => "a flag",
            Outcome::Slice(_) => "a slice",
            Outcome::Page(_) => "a page",
            Outcome::KeysetSlice(_) => "a keyset slice",
            Outcome::KeysetPage(_) => "a keyset page",
        }
    }

    fn mismatch(&self, expected: &str) -> DataError {
        DataError::Other(format!("expected {expected} but the method produced {}", self.kind()))
    }

    pub fn into_unit(self) -> Result<(), DataError> {
        match self {
            Outcome::Done | Outcome::Count(_) | Outcome::Flag(_) | Outcome::Entities(_) => Ok(()),
            other => Err(other.mismatch("nothing")),
        }
    }

    /// Exactly one entity.
    ///
    /// # Errors
    ///
    /// `DataError::EmptyResult` when nothing matched and
    /// `DataError::NonUniqueResult` when several entities did.
    pub fn into_entity(self) -> Result<E, DataError> {
        match self {
            Outcome::Entities(mut found) => match found.len() {
                0 => Err(DataError::EmptyResult("no entity matched".into())),
                1 => found
                    .pop()
                    .ok_or_else(|| DataError::EmptyResult("no entity matched".into())),
                n => Err(DataError::NonUniqueResult(format!("{n} entities matched"))),
            },
            other => Err(other.mismatch("an entity")),
        }
    }

    /// At most one entity.
    pub fn into_optional(self) -> Result<Option<E>, DataError> {
        match self {
            Outcome::Entities(mut found) => match found.len() {
                0 | 1 => Ok(found.pop()),
                n => Err(DataError::NonUniqueResult(format!("{n} entities matched"))),
            },
            other => Err(other.mismatch("an optional entity")),
        }
    }

    pub fn into_entities<C: FromIterator<E>>(self) -> Result<C, DataError> {
        match self {
            Outcome::Entities(found) => Ok(found.into_iter().collect()),
            other => Err(other.mismatch("entities")),
        }
    }

    pub fn into_count<N: TryFrom<u64>>(self) -> Result<N, DataError> {
        match self {
            Outcome::Count(n) => N::try_from(n)
                .map_err(|_| DataError::Other(format!("count {n} does not fit the declared type"))),
            other => Err(other.mismatch("a count")),
        }
    }

    pub fn into_flag(self) -> Result<bool, DataError> {
        match self {
            Outcome::Flag(b) => Ok(b),
            other => Err(other.mismatch("a flag")),
        }
    }

    pub fn into_slice(self) -> Result<Slice<E>, DataError> {
        match self {
            Outcome::Slice(s) => Ok(s),
            other => Err(other.mismatch("a slice")),
        }
    }

    pub fn into_page(self) -> Result<Page<E>, DataError> {
        match self {
            Outcome::Page(p) => Ok(p),
            other => Err(other.mismatch("a page")),
        }
    }

    pub fn into_keyset_slice(self) -> Result<KeysetAwareSlice<E>, DataError> {
        match self {
            Outcome::KeysetSlice(s) => Ok(s),
            other => Err(other.mismatch("a keyset slice")),
        }
    }

    pub fn into_keyset_page(self) -> Result<KeysetAwarePage<E>, DataError> {
        match self {
            Outcome::KeysetPage(p) => Ok(p),
            other => Err(other.mismatch("a keyset page")),
        }
    }
}

/// Repository runtime for entity `E` over provider `P`.
///
/// Holds the compiled methods of one repository declaration and executes
/// them against the provider. Cheap to clone.
pub struct Repo<E, P> {
    provider: Arc<P>,
    registry: Arc<MethodRegistry>,
    pagination: PaginationSettings,
    _entity: PhantomData<fn() -> E>,
}

impl<E, P> Clone for Repo<E, P> {
    fn clone(&self) -> Self {
        Self {
            provider: self.provider.clone(),
            registry: self.registry.clone(),
            pagination: self.pagination,
            _entity: PhantomData,
        }
    }
}

impl<E: Entity, P: Provider> Repo<E, P> {
    /// Compile `descriptors` and bind them to `provider`.
    ///
    /// # Errors
    ///
    /// The first contract violation among the descriptors.
    pub fn new(
        provider: impl Into<Arc<P>>,
        descriptors: impl IntoIterator<Item = MethodDescriptor>,
    ) -> Result<Self, DataError> {
        Ok(Self {
            provider: provider.into(),
            registry: Arc::new(MethodRegistry::compile::<E>(descriptors)?),
            pagination: PaginationSettings::default(),
            _entity: PhantomData,
        })
    }

    pub fn with_pagination(mut self, pagination: PaginationSettings) -> Self {
        self.pagination = pagination;
        self
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    /// First page with the configured default size.
    pub fn first_page(&self) -> Result<Pageable, DataError> {
        Pageable::of_size(self.pagination.default_size)
    }

    /// Execute a registered method.
    pub async fn invoke(&self, method: &str, invocation: Invocation<E>) -> Result<Outcome<E>, DataError> {
        let compiled = self.registry.get(method)?;
        let descriptor = compiled.descriptor();
        tracing::debug!(entity = E::entity_name(), method, "Invoking repository method");
        match compiled.plan()? {
            Plan::Lifecycle(kind) => self.run_lifecycle(*kind, descriptor, invocation).await,
            Plan::Query(plan) => self.run_query(plan, descriptor, invocation).await,
        }
    }

    // ── Lifecycle operations ─────────────────────────────────────────────

    pub async fn insert(&self, entity: &E) -> Result<E, DataError> {
        Outcome::Entities(self.insert_all(vec![entity.clone()]).await?).into_entity()
    }

    /// Insert a batch. The result follows the input order.
    ///
    /// # Errors
    ///
    /// `DataError::EntityExists` on ACID providers when an identifier is
    /// already stored; nothing from the batch is inserted then.
    pub async fn insert_all(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let stored = self.provider.insert(entities.clone()).await?;
        Ok(align(entities, stored))
    }

    pub async fn save_one(&self, entity: &E) -> Result<E, DataError> {
        Outcome::Entities(self.save_all(vec![entity.clone()]).await?).into_entity()
    }

    pub async fn save_all(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let stored = self.provider.save(entities.clone()).await?;
        Ok(align(entities, stored))
    }

    /// Replace an existing entity.
    ///
    /// # Errors
    ///
    /// `DataError::NotFound` when no entity has its identifier.
    pub async fn update(&self, entity: &E) -> Result<E, DataError> {
        let id = entity.id_value();
        let mut updated = self.update_all(vec![entity.clone()]).await?;
        updated.pop().ok_or_else(|| {
            DataError::NotFound(format!("{} with id {id} does not exist", E::entity_name()))
        })
    }

    /// Replace the entities that exist and return them in input order.
    pub async fn update_all(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        if entities.is_empty() {
            return Ok(entities);
        }
        let updated = self.provider.update(entities.clone()).await?;
        Ok(align(entities, updated))
    }

    /// Delete one entity by its identifier. Returns whether it existed.
    pub async fn delete_entity(&self, entity: &E) -> Result<bool, DataError> {
        Ok(self.provider.delete_by_ids::<E>(vec![entity.id_value()]).await? > 0)
    }

    pub async fn delete_all_entities(&self, entities: Vec<E>) -> Result<u64, DataError> {
        if entities.is_empty() {
            return Ok(0);
        }
        let ids = entities.iter().map(E::id_value).collect();
        self.provider.delete_by_ids::<E>(ids).await
    }

    /// Delete every entity of this type.
    pub async fn delete_everything(&self) -> Result<u64, DataError> {
        let removed = self.provider.delete_where::<E>(None).await?;
        tracing::info!(entity = E::entity_name(), removed, "Deleted all entities");
        Ok(removed)
    }

    async fn run_lifecycle(
        &self,
        kind: OperationKind,
        descriptor: &MethodDescriptor,
        invocation: Invocation<E>,
    ) -> Result<Outcome<E>, DataError> {
        let entities = invocation.entities;
        let returns = descriptor.returns;
        let outcome = match kind {
            OperationKind::Insert | OperationKind::Save => {
                let stored = if kind == OperationKind::Insert {
                    self.insert_all(entities).await?
                } else {
                    self.save_all(entities).await?
                };
                match returns {
                    ReturnShape::Unit => Outcome::Done,
                    _ => Outcome::Entities(stored),
                }
            }
            OperationKind::Update => {
                let id = entities.first().map(E::id_value);
                let updated = self.update_all(entities).await?;
                match returns {
                    ReturnShape::Unit => Outcome::Done,
                    ReturnShape::Flag => Outcome::Flag(!updated.is_empty()),
                    ReturnShape::Count => Outcome::Count(updated.len() as u64),
                    ReturnShape::Entity if updated.is_empty() => {
                        return Err(DataError::NotFound(format!(
                            "{} with id {} does not exist",
                            E::entity_name(),
                            id.unwrap_or(Value::Null)
                        )))
                    }
                    _ => Outcome::Entities(updated),
                }
            }
            OperationKind::Delete => {
                let removed = if descriptor.entity_shape().is_some() {
                    self.delete_all_entities(entities).await?
                } else {
                    self.delete_everything().await?
                };
                match returns {
                    ReturnShape::Flag => Outcome::Flag(removed > 0),
                    ReturnShape::Count => Outcome::Count(removed),
                    _ => Outcome::Done,
                }
            }
            OperationKind::Query => {
                return Err(descriptor.unsupported("has no lifecycle plan"));
            }
        };
        Ok(outcome)
    }

    // ── Queries ──────────────────────────────────────────────────────────

    async fn run_query(
        &self,
        plan: &QueryPlan,
        descriptor: &MethodDescriptor,
        invocation: Invocation<E>,
    ) -> Result<Outcome<E>, DataError> {
        let filter = plan
            .filter
            .clone()
            .map(|f| f.bind(&invocation.args))
            .transpose()?;

        match plan.action {
            SelectAction::Count => Ok(Outcome::Count(self.provider.count::<E>(filter.as_ref()).await?)),
            SelectAction::Exists => Ok(Outcome::Flag(self.exists(filter.as_ref()).await?)),
            SelectAction::Delete => {
                let removed = self.provider.delete_where::<E>(filter.as_ref()).await?;
                tracing::debug!(entity = E::entity_name(), removed, "Deleted matching entities");
                Ok(match descriptor.returns {
                    ReturnShape::Count => Outcome::Count(removed),
                    _ => Outcome::Done,
                })
            }
            SelectAction::Find => {
                let mut sorts = plan.sorts.clone();
                sorts.extend(resolve_sorts::<E>(&invocation.sorts)?);
                self.find(plan, descriptor.returns, filter, sorts, invocation.pageable)
                    .await
            }
        }
    }

    async fn find(
        &self,
        plan: &QueryPlan,
        returns: ReturnShape,
        filter: Option<Expr>,
        mut sorts: Vec<Sort>,
        pageable: Option<Pageable>,
    ) -> Result<Outcome<E>, DataError> {
        let pageable = pageable.map(|p| p.clamp_size(self.pagination.max_size));
        if let Some(p) = &pageable {
            sorts.extend(resolve_sorts::<E>(p.sorts())?);
        }

        if !returns.is_window() {
            let single = matches!(returns, ReturnShape::Entity | ReturnShape::Optional);
            let mut limit = plan.limit;
            if single {
                limit = Some(limit.map_or(2, |l| l.min(2)));
            }
            let mut offset = 0;
            if let Some(p) = &pageable {
                if p.cursor().is_some() {
                    return Err(cursor_needs_keyset());
                }
                offset = p.offset();
                limit = Some(limit.map_or(p.size(), |l| l.min(p.size())));
            }
            let select = Select::new(filter).sorted(sorts).window(offset, limit);
            return Ok(Outcome::Entities(self.provider.select::<E>(&select).await?));
        }

        let pageable = pageable.ok_or_else(|| {
            DataError::InvalidArgument("a windowed result requires a Pageable".into())
        })?;
        match returns {
            ReturnShape::Slice => {
                if pageable.cursor().is_some() {
                    return Err(cursor_needs_keyset());
                }
                let size = pageable.size();
                let select = Select::new(filter)
                    .sorted(sorts)
                    .window(pageable.offset(), Some(size + 1));
                let mut content = self.provider.select::<E>(&select).await?;
                let has_next = content.len() as u64 > size;
                content.truncate(size as usize);
                Ok(Outcome::Slice(Slice::new(content, pageable, has_next)))
            }
            ReturnShape::Page => {
                if pageable.cursor().is_some() {
                    return Err(cursor_needs_keyset());
                }
                let total = self.provider.count::<E>(filter.as_ref()).await?;
                let select = Select::new(filter)
                    .sorted(sorts)
                    .window(pageable.offset(), Some(pageable.size()));
                let content = self.provider.select::<E>(&select).await?;
                Ok(Outcome::Page(Page::new(content, pageable, total)))
            }
            ReturnShape::KeysetPage => {
                let total = self.provider.count::<E>(filter.as_ref()).await?;
                let slice = self.keyset(filter, sorts, pageable).await?;
                Ok(Outcome::KeysetPage(KeysetAwarePage::new(slice, total)))
            }
            _ => Ok(Outcome::KeysetSlice(self.keyset(filter, sorts, pageable).await?)),
        }
    }

    async fn keyset(
        &self,
        filter: Option<Expr>,
        declared: Vec<Sort>,
        pageable: Pageable,
    ) -> Result<KeysetAwareSlice<E>, DataError> {
        let effective = effective_sorts::<E>(&declared)?;
        let size = pageable.size();

        let (content, has_next, has_previous) = match pageable.mode() {
            PageMode::Offset => {
                let select = Select::new(filter)
                    .sorted(effective.clone())
                    .window(pageable.offset(), Some(size + 1));
                let mut content = self.provider.select::<E>(&select).await?;
                let has_next = content.len() as u64 > size;
                content.truncate(size as usize);
                (content, has_next, pageable.page() > 1)
            }
            PageMode::CursorNext(cursor) => {
                let keyed = cursor.applicable_sorts(&declared, &effective)?;
                let after = keyset_predicate(keyed, cursor.keys(), false);
                tracing::debug!(predicate = %after, "Reading keyset window after cursor");
                let before_exists = self
                    .exists(Some(&conjoin(filter.as_ref(), after.clone().negate())))
                    .await?;
                let select = Select::new(Some(conjoin(filter.as_ref(), after)))
                    .sorted(effective.clone())
                    .window(0, Some(size + 1));
                let mut content = self.provider.select::<E>(&select).await?;
                let has_next = content.len() as u64 > size;
                content.truncate(size as usize);
                (content, has_next, before_exists)
            }
            PageMode::CursorPrevious(cursor) => {
                let keyed = cursor.applicable_sorts(&declared, &effective)?;
                let before = keyset_predicate(keyed, cursor.keys(), true);
                tracing::debug!(predicate = %before, "Reading keyset window before cursor");
                let after_exists = self
                    .exists(Some(&conjoin(filter.as_ref(), before.clone().negate())))
                    .await?;
                let reversed = effective.iter().map(Sort::reversed).collect();
                let select = Select::new(Some(conjoin(filter.as_ref(), before)))
                    .sorted(reversed)
                    .window(0, Some(size + 1));
                let mut content = self.provider.select::<E>(&select).await?;
                let has_previous = content.len() as u64 > size;
                content.truncate(size as usize);
                content.reverse();
                (content, after_exists, has_previous)
            }
        };

        let cursors = content
            .iter()
            .map(|e| Cursor::capture(e, &effective))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KeysetAwareSlice::new(
            content,
            pageable,
            cursors,
            has_next,
            has_previous,
        ))
    }

    async fn exists(&self, filter: Option<&Expr>) -> Result<bool, DataError> {
        let select = Select::new(filter.cloned()).window(0, Some(1));
        Ok(!self.provider.select::<E>(&select).await?.is_empty())
    }

    fn id_filter(id: &E::Id) -> Expr {
        Expr::compare(
            CompareOp::Eq,
            Expr::attr(E::id_attribute()),
            Expr::Literal(id.to_value()),
        )
    }
}

impl<E: Entity, P: Provider> Repository<E, E::Id> for Repo<E, P> {
    async fn find_by_id(&self, id: &E::Id) -> Result<Option<E>, DataError> {
        let select = Select::new(Some(Self::id_filter(id))).window(0, Some(1));
        Ok(self.provider.select::<E>(&select).await?.pop())
    }

    async fn exists_by_id(&self, id: &E::Id) -> Result<bool, DataError> {
        self.exists(Some(&Self::id_filter(id))).await
    }

    async fn find_all(&self) -> Result<Vec<E>, DataError> {
        self.provider.select::<E>(&Select::default()).await
    }

    async fn find_all_paged(&self, pageable: &Pageable) -> Result<Page<E>, DataError> {
        if pageable.cursor().is_some() {
            return Err(cursor_needs_keyset());
        }
        let pageable = pageable.clone().clamp_size(self.pagination.max_size);
        let sorts = effective_sorts::<E>(pageable.sorts())?;
        let total = self.provider.count::<E>(None).await?;
        let select = Select::new(None)
            .sorted(sorts)
            .window(pageable.offset(), Some(pageable.size()));
        let content = self.provider.select::<E>(&select).await?;
        Ok(Page::new(content, pageable, total))
    }

    async fn save(&self, entity: &E) -> Result<E, DataError> {
        self.save_one(entity).await
    }

    async fn delete_by_id(&self, id: &E::Id) -> Result<bool, DataError> {
        Ok(self.provider.delete_by_ids::<E>(vec![id.to_value()]).await? > 0)
    }

    async fn count(&self) -> Result<u64, DataError> {
        self.provider.count::<E>(None).await
    }
}

fn cursor_needs_keyset() -> DataError {
    DataError::InvalidCursor("cursor requires a keyset-aware result".into())
}

fn conjoin(filter: Option<&Expr>, extra: Expr) -> Expr {
    match filter {
        Some(f) => Expr::and(vec![f.clone(), extra]),
        None => extra,
    }
}

/// The caller's entities that the provider reports as written, in input
/// order. A repeated identifier keeps every position with the entity passed
/// there.
fn align<E: Entity>(entities: Vec<E>, written: Vec<E>) -> Vec<E> {
    let ids: BTreeSet<Value> = written.iter().map(E::id_value).collect();
    entities.into_iter().filter(|e| ids.contains(&e.id_value())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::fixtures::Item;
    use crate::provider::Consistency;

    /// Accepts every write and reports it back in reverse order.
    #[derive(Default)]
    struct Reversing {
        consistency: Consistency,
        absent: Vec<Value>,
    }

    impl Provider for Reversing {
        fn consistency(&self) -> Consistency {
            self.consistency
        }

        async fn insert<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
            Ok(entities.into_iter().rev().collect())
        }

        async fn save<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
            Ok(entities.into_iter().rev().collect())
        }

        async fn update<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
            Ok(entities
                .into_iter()
                .rev()
                .filter(|e| !self.absent.contains(&e.id_value()))
                .collect())
        }

        async fn delete_by_ids<E: Entity>(&self, ids: Vec<Value>) -> Result<u64, DataError> {
            Ok(ids.len() as u64)
        }

        async fn select<E: Entity>(&self, _select: &Select) -> Result<Vec<E>, DataError> {
            Ok(Vec::new())
        }

        async fn count<E: Entity>(&self, _filter: Option<&Expr>) -> Result<u64, DataError> {
            Ok(0)
        }

        async fn delete_where<E: Entity>(&self, _filter: Option<&Expr>) -> Result<u64, DataError> {
            Ok(0)
        }
    }

    fn repo(provider: Reversing) -> Repo<Item, Reversing> {
        Repo::new(provider, []).unwrap()
    }

    fn batch() -> Vec<Item> {
        vec![
            Item::new("a", "Apple", Some(1.0), &[]),
            Item::new("b", "Banana", None, &["fruit"]),
            Item::new("c", "Cherry", Some(3.0), &[]),
        ]
    }

    #[tokio::test]
    async fn test_batches_follow_input_order() {
        let repo = repo(Reversing::default());
        assert_eq!(repo.insert_all(batch()).await.unwrap(), batch());
        assert_eq!(repo.save_all(batch()).await.unwrap(), batch());
        assert_eq!(repo.update_all(batch()).await.unwrap(), batch());
        assert_eq!(repo.insert_all(Vec::new()).await.unwrap(), Vec::<Item>::new());
    }

    #[tokio::test]
    async fn test_update_keeps_only_written_entities() {
        let repo = repo(Reversing {
            absent: vec![Value::from("b")],
            ..Reversing::default()
        });
        let updated = repo.update_all(batch()).await.unwrap();
        let codes: Vec<&str> = updated.iter().map(|i| i.code.as_str()).collect();
        assert_eq!(codes, vec!["a", "c"]);

        let err = repo.update(&batch()[1]).await.unwrap_err();
        assert!(matches!(err, DataError::NotFound(ref msg) if msg.contains("id 'b'")), "{err:?}");
    }

    #[tokio::test]
    async fn test_repeated_identifier_keeps_each_position() {
        let repo = repo(Reversing {
            consistency: Consistency::Base,
            ..Reversing::default()
        });
        let first = Item::new("a", "first", Some(1.0), &[]);
        let other = Item::new("b", "other", None, &[]);
        let second = Item::new("a", "second", Some(2.0), &[]);
        let input = vec![first, other, second];

        assert_eq!(repo.insert_all(input.clone()).await.unwrap(), input);
        assert_eq!(repo.save_all(input.clone()).await.unwrap(), input);
    }

    #[tokio::test]
    async fn test_single_entity_lifecycle() {
        let repo = repo(Reversing::default());
        let item = Item::new("a", "Apple", None, &[]);
        assert_eq!(repo.insert(&item).await.unwrap(), item);
        assert_eq!(Repository::save(&repo, &item).await.unwrap(), item);
        assert_eq!(repo.update(&item).await.unwrap(), item);
        assert!(repo.delete_entity(&item).await.unwrap());
    }
}
