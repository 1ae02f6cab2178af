use std::future::Future;

use crate::entity::Entity;
use crate::error::DataError;
use crate::expr::Expr;
use crate::sort::Sort;
use crate::value::Value;

/// Consistency model declared by a provider.
///
/// Only `Acid` providers reject an insert whose identifier already exists;
/// `Base` providers append and the latest write wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Consistency {
    #[default]
    Acid,
    Base,
}

impl std::str::FromStr for Consistency {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "acid" => Ok(Consistency::Acid),
            "base" => Ok(Consistency::Base),
            other => Err(DataError::InvalidArgument(format!(
                "unknown consistency '{other}', expected 'acid' or 'base'"
            ))),
        }
    }
}

/// A provider-facing read: filter, ordering and window bounds.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Select {
    pub filter: Option<Expr>,
    pub sorts: Vec<Sort>,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl Select {
    pub fn new(filter: Option<Expr>) -> Self {
        Self {
            filter,
            ..Self::default()
        }
    }

    pub fn sorted(mut self, sorts: Vec<Sort>) -> Self {
        self.sorts = sorts;
        self
    }

    pub fn window(mut self, offset: u64, limit: Option<u64>) -> Self {
        self.offset = offset;
        self.limit = limit;
        self
    }
}

/// Seam between the repository runtime and a store.
///
/// Filters are fully bound: they contain no parameters and only attribute
/// names declared by `E`. Uses RPITIT, no `async-trait` needed.
pub trait Provider: Send + Sync + 'static {
    fn consistency(&self) -> Consistency;

    /// Store new entities and return the ones written, in any order. The
    /// runtime correlates them with its input by identifier.
    ///
    /// On `Acid` providers the batch is all-or-nothing and an existing
    /// identifier fails with `DataError::EntityExists`.
    fn insert<E: Entity>(
        &self,
        entities: Vec<E>,
    ) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    /// Insert or replace entities and return the ones written, in any order.
    fn save<E: Entity>(
        &self,
        entities: Vec<E>,
    ) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    /// Replace entities that already exist and return those that did.
    fn update<E: Entity>(
        &self,
        entities: Vec<E>,
    ) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    /// Remove entities by identifier and return how many existed.
    fn delete_by_ids<E: Entity>(
        &self,
        ids: Vec<Value>,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    fn select<E: Entity>(
        &self,
        select: &Select,
    ) -> impl Future<Output = Result<Vec<E>, DataError>> + Send;

    fn count<E: Entity>(
        &self,
        filter: Option<&Expr>,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;

    /// Remove every entity matching `filter` (all of them when `None`).
    fn delete_where<E: Entity>(
        &self,
        filter: Option<&Expr>,
    ) -> impl Future<Output = Result<u64, DataError>> + Send;
}
