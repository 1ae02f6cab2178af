//! In-memory [`Provider`] for Strata repositories.
//!
//! Entities are stored as attribute records in one table per entity type,
//! keyed by identifier. Filters are evaluated with [`Expr::matches`], so the
//! in-memory provider defines the reference semantics that other providers
//! are checked against by the conformance suite.

use std::collections::BTreeMap;
use std::sync::Arc;

use dashmap::DashMap;
use strata_core::{
    Consistency, DataError, Entity, Expr, Provider, ProviderSettings, Record, Select, Value,
};

type Table = BTreeMap<Value, Record>;

/// A thread-safe in-memory store backed by `DashMap`.
///
/// Each table is one map entry; a batch operation holds that entry for its
/// whole duration, so batches are atomic with respect to each other.
#[derive(Clone, Default)]
pub struct MemoryProvider {
    tables: Arc<DashMap<&'static str, Table>>,
    consistency: Consistency,
}

impl MemoryProvider {
    /// Create an ACID provider.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_consistency(consistency: Consistency) -> Self {
        Self {
            consistency,
            ..Self::default()
        }
    }

    pub fn from_settings(settings: &ProviderSettings) -> Self {
        Self::with_consistency(settings.consistency)
    }

    /// Number of stored entities of type `E`.
    pub fn len<E: Entity>(&self) -> usize {
        self.tables.get(E::entity_name()).map_or(0, |t| t.len())
    }

    pub fn is_empty<E: Entity>(&self) -> bool {
        self.len::<E>() == 0
    }

    fn matching<'t>(
        table: &'t Table,
        filter: Option<&Expr>,
    ) -> Result<Vec<(&'t Value, &'t Record)>, DataError> {
        let mut out = Vec::new();
        for (id, record) in table {
            if filter.map_or(Ok(true), |f| f.matches(record))? {
                out.push((id, record));
            }
        }
        Ok(out)
    }
}

impl Provider for MemoryProvider {
    fn consistency(&self) -> Consistency {
        self.consistency
    }

    async fn insert<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        let records = records_of(&entities)?;
        let mut table = self.tables.entry(E::entity_name()).or_default();
        if self.consistency == Consistency::Acid {
            let mut seen = std::collections::BTreeSet::new();
            for entity in &entities {
                let id = entity.id_value();
                if table.contains_key(&id) || !seen.insert(id.clone()) {
                    tracing::debug!(entity = E::entity_name(), %id, "Rejected duplicate insert");
                    return Err(DataError::EntityExists(format!(
                        "{} with id {id} already exists",
                        E::entity_name()
                    )));
                }
            }
        }
        for (entity, record) in entities.iter().zip(records) {
            table.insert(entity.id_value(), record);
        }
        tracing::debug!(entity = E::entity_name(), count = entities.len(), "Inserted");
        Ok(entities)
    }

    async fn save<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        let records = records_of(&entities)?;
        let mut table = self.tables.entry(E::entity_name()).or_default();
        for (entity, record) in entities.iter().zip(records) {
            table.insert(entity.id_value(), record);
        }
        Ok(entities)
    }

    async fn update<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        let records = records_of(&entities)?;
        let Some(mut table) = self.tables.get_mut(E::entity_name()) else {
            return Ok(Vec::new());
        };
        let mut updated = Vec::with_capacity(entities.len());
        for (entity, record) in entities.into_iter().zip(records) {
            if let Some(stored) = table.get_mut(&entity.id_value()) {
                *stored = record;
                updated.push(entity);
            }
        }
        Ok(updated)
    }

    async fn delete_by_ids<E: Entity>(&self, ids: Vec<Value>) -> Result<u64, DataError> {
        let Some(mut table) = self.tables.get_mut(E::entity_name()) else {
            return Ok(0);
        };
        Ok(ids.iter().filter(|id| table.remove(*id).is_some()).count() as u64)
    }

    async fn select<E: Entity>(&self, select: &Select) -> Result<Vec<E>, DataError> {
        let records: Vec<Record> = {
            let Some(table) = self.tables.get(E::entity_name()) else {
                return Ok(Vec::new());
            };
            let mut rows = Self::matching(&table, select.filter.as_ref())?;
            // stable: ties keep identifier order
            rows.sort_by(|(_, a), (_, b)| {
                select
                    .sorts
                    .iter()
                    .map(|s| {
                        s.compare(
                            a.get(s.property()).unwrap_or(&Value::Null),
                            b.get(s.property()).unwrap_or(&Value::Null),
                        )
                    })
                    .find(|o| o.is_ne())
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            let limit = select.limit.map_or(usize::MAX, |l| l as usize);
            rows.into_iter()
                .skip(select.offset as usize)
                .take(limit)
                .map(|(_, record)| record.clone())
                .collect()
        };
        records.into_iter().map(E::from_record).collect()
    }

    async fn count<E: Entity>(&self, filter: Option<&Expr>) -> Result<u64, DataError> {
        let Some(table) = self.tables.get(E::entity_name()) else {
            return Ok(0);
        };
        Ok(Self::matching(&table, filter)?.len() as u64)
    }

    async fn delete_where<E: Entity>(&self, filter: Option<&Expr>) -> Result<u64, DataError> {
        let Some(mut table) = self.tables.get_mut(E::entity_name()) else {
            return Ok(0);
        };
        let doomed: Vec<Value> = Self::matching(&table, filter)?
            .into_iter()
            .map(|(id, _)| id.clone())
            .collect();
        for id in &doomed {
            table.remove(id);
        }
        Ok(doomed.len() as u64)
    }
}

/// Convert a whole batch before touching any table.
fn records_of<E: Entity>(entities: &[E]) -> Result<Vec<Record>, DataError> {
    entities.iter().map(Entity::try_to_record).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::expr::CompareOp;
    use strata_core::{Repo, Repository, Sort};
    use strata_macros::Entity;

    #[derive(Entity, Debug, Clone, PartialEq)]
    struct Note {
        #[id]
        id: i64,
        title: String,
        rank: Option<i64>,
    }

    fn note(id: i64, title: &str, rank: Option<i64>) -> Note {
        Note {
            id,
            title: title.to_string(),
            rank,
        }
    }

    #[tokio::test]
    async fn test_acid_rejects_duplicates_atomically() {
        let provider = MemoryProvider::new();
        provider.insert(vec![note(1, "a", None)]).await.unwrap();
        let err = provider
            .insert(vec![note(2, "b", None), note(1, "again", None)])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::EntityExists(_)));
        assert_eq!(provider.len::<Note>(), 1);
    }

    #[tokio::test]
    async fn test_base_keeps_latest_write() {
        let provider = MemoryProvider::with_consistency(Consistency::Base);
        provider.insert(vec![note(1, "a", None)]).await.unwrap();
        provider.insert(vec![note(1, "b", None)]).await.unwrap();
        let all: Vec<Note> = provider.select(&Select::default()).await.unwrap();
        assert_eq!(all, vec![note(1, "b", None)]);
    }

    #[tokio::test]
    async fn test_select_sorts_nulls_first_and_windows() {
        let provider = MemoryProvider::new();
        provider
            .insert(vec![note(1, "a", Some(3)), note(2, "b", None), note(3, "c", Some(1))])
            .await
            .unwrap();
        let select = Select::new(None).sorted(vec![Sort::asc("rank")]);
        let sorted: Vec<Note> = provider.select(&select).await.unwrap();
        let ids: Vec<i64> = sorted.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        let window: Vec<Note> = provider.select(&select.window(1, Some(1))).await.unwrap();
        assert_eq!(window, vec![note(3, "c", Some(1))]);
    }

    #[tokio::test]
    async fn test_filtered_count_and_delete() {
        let provider = MemoryProvider::new();
        provider
            .insert(vec![note(1, "a", Some(3)), note(2, "b", Some(5)), note(3, "c", None)])
            .await
            .unwrap();
        let filter = Expr::compare(CompareOp::Gt, Expr::attr("rank"), Expr::lit(2i64));
        assert_eq!(provider.count::<Note>(Some(&filter)).await.unwrap(), 2);
        assert_eq!(provider.delete_where::<Note>(Some(&filter)).await.unwrap(), 2);
        assert_eq!(provider.len::<Note>(), 1);
    }

    #[tokio::test]
    async fn test_generic_repository_operations() {
        let repo: Repo<Note, MemoryProvider> = Repo::new(MemoryProvider::new(), []).unwrap();
        repo.save(&note(7, "seven", None)).await.unwrap();
        assert!(repo.exists_by_id(&7).await.unwrap());
        assert_eq!(repo.find_by_id(&7).await.unwrap(), Some(note(7, "seven", None)));
        assert_eq!(repo.count().await.unwrap(), 1);
        assert!(repo.delete_by_id(&7).await.unwrap());
        assert!(!repo.delete_by_id(&7).await.unwrap());
        assert_eq!(repo.find_all().await.unwrap(), Vec::<Note>::new());
    }

    #[derive(Entity, Debug, Clone, PartialEq)]
    struct Counter {
        #[id]
        id: u64,
        hits: u64,
        samples: Vec<usize>,
    }

    #[tokio::test]
    async fn test_unsigned_attributes_round_trip_within_range() {
        let provider = MemoryProvider::new();
        let counter = Counter {
            id: 1,
            hits: i64::MAX as u64,
            samples: vec![0, 42],
        };
        provider.save(vec![counter.clone()]).await.unwrap();
        let all: Vec<Counter> = provider.select(&Select::default()).await.unwrap();
        assert_eq!(all, vec![counter]);
    }

    #[tokio::test]
    async fn test_out_of_range_unsigned_is_rejected_on_write() {
        let provider = MemoryProvider::new();
        let fits = Counter {
            id: 1,
            hits: 5,
            samples: vec![],
        };
        let too_big = Counter {
            id: 2,
            hits: u64::MAX,
            samples: vec![],
        };
        let err = provider
            .insert(vec![fits.clone(), too_big.clone()])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Mapping(ref msg) if msg.contains("hits")), "{err:?}");
        assert_eq!(provider.len::<Counter>(), 0);

        let err = provider.save(vec![too_big]).await.unwrap_err();
        assert!(matches!(err, DataError::Mapping(_)));

        provider.insert(vec![fits.clone()]).await.unwrap();
        let in_list = Counter {
            samples: vec![1, usize::MAX],
            ..fits.clone()
        };
        let err = provider.update(vec![in_list]).await.unwrap_err();
        assert!(matches!(err, DataError::Mapping(ref msg) if msg.contains("samples")));
        let all: Vec<Counter> = provider.select(&Select::default()).await.unwrap();
        assert_eq!(all, vec![fits]);

        let huge_id = Counter {
            id: u64::MAX,
            hits: 0,
            samples: vec![],
        };
        assert!(matches!(
            provider.save(vec![huge_id]).await,
            Err(DataError::Mapping(_))
        ));
        assert_eq!(provider.len::<Counter>(), 1);
    }

    #[test]
    fn test_from_settings_uses_configured_consistency() {
        let settings = ProviderSettings {
            consistency: Consistency::Base,
            ..ProviderSettings::default()
        };
        assert_eq!(MemoryProvider::from_settings(&settings).consistency(), Consistency::Base);
        assert_eq!(MemoryProvider::new().consistency(), Consistency::Acid);
    }
}
