use std::str::FromStr;
use std::sync::Arc;

use dashmap::DashSet;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Executor, Row, Sqlite, TypeInfo, ValueRef};
use strata_core::{
    Consistency, DataError, Entity, Expr, Provider, ProviderSettings, Record, Select, Sort, Value,
};

use crate::builder::{quote_identifier, QueryBuilder};
use crate::error::{SqlxErrorExt, SqlxResult};

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

/// A [`Provider`] over a SQLite pool.
///
/// Each entity type maps to one table named after the entity, created on
/// first use. Columns are declared without a type so integers, reals and
/// text keep their storage class; collection attributes are stored as JSON
/// arrays. Every write batch runs in one transaction, so the provider is
/// always [`Consistency::Acid`].
#[derive(Clone)]
pub struct SqliteProvider {
    pool: SqlitePool,
    tables: Arc<DashSet<&'static str>>,
}

impl SqliteProvider {
    /// Connect with a single pooled connection, which keeps a
    /// `sqlite::memory:` database alive for the provider's lifetime.
    pub async fn connect(url: &str) -> SqlxResult<Self> {
        Self::connect_with(url, 1).await
    }

    pub async fn connect_with(url: &str, max_connections: u32) -> SqlxResult<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(SqlxErrorExt::into_data_error)?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .idle_timeout(None)
            .max_lifetime(None)
            .after_connect(|conn, _meta| {
                Box::pin(async move {
                    conn.execute("PRAGMA case_sensitive_like = ON").await?;
                    Ok(())
                })
            })
            .connect_with(options)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        tracing::info!(url, max_connections, "Connected SQLite provider");
        Ok(Self::from_pool(pool))
    }

    pub async fn from_settings(settings: &ProviderSettings) -> SqlxResult<Self> {
        if settings.consistency == Consistency::Base {
            tracing::warn!("SQLite provider is always ACID, ignoring consistency = base");
        }
        Self::connect_with(&settings.sqlite_url, settings.sqlite_connections).await
    }

    /// Wrap an existing pool. `LIKE` follows the connection's
    /// `case_sensitive_like` pragma, which should be on.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            tables: Arc::new(DashSet::new()),
        }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn ensure_table<E: Entity>(&self) -> SqlxResult<()> {
        if self.tables.contains(E::entity_name()) {
            return Ok(());
        }
        let sql = create_table_sql::<E>()?;
        self.pool
            .execute(sql.as_str())
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        self.tables.insert(E::entity_name());
        tracing::debug!(table = E::entity_name(), "Created table");
        Ok(())
    }

    /// Run one statement per entity inside one transaction and keep the
    /// entities whose statement touched a row.
    async fn write_each<E: Entity>(&self, write: Write, entities: Vec<E>) -> SqlxResult<Vec<E>> {
        self.ensure_table::<E>().await?;
        let sql = write.sql::<E>()?;
        let batch = entities
            .iter()
            .map(|entity| entity_params(entity, write == Write::Update))
            .collect::<SqlxResult<Vec<_>>>()?;
        let mut tx = self.pool.begin().await.map_err(SqlxErrorExt::into_data_error)?;
        let mut written = Vec::with_capacity(entities.len());
        for (entity, params) in entities.into_iter().zip(batch) {
            let result = bind_all(&sql, &params)?
                .execute(&mut *tx)
                .await
                .map_err(|e| match e.into_data_error() {
                    DataError::EntityExists(_) if write == Write::Insert => DataError::EntityExists(format!(
                        "{} with id {} already exists",
                        E::entity_name(),
                        entity.id_value()
                    )),
                    other => other,
                })?;
            if result.rows_affected() > 0 {
                written.push(entity);
            }
        }
        tx.commit().await.map_err(SqlxErrorExt::into_data_error)?;
        tracing::debug!(entity = E::entity_name(), count = written.len(), "Wrote batch");
        Ok(written)
    }
}

impl Provider for SqliteProvider {
    fn consistency(&self) -> Consistency {
        Consistency::Acid
    }

    async fn insert<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        self.write_each(Write::Insert, entities).await
    }

    async fn save<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        self.write_each(Write::Save, entities).await
    }

    async fn update<E: Entity>(&self, entities: Vec<E>) -> Result<Vec<E>, DataError> {
        self.write_each(Write::Update, entities).await
    }

    async fn delete_by_ids<E: Entity>(&self, ids: Vec<Value>) -> Result<u64, DataError> {
        if ids.is_empty() {
            return Ok(0);
        }
        let filter = Expr::In {
            expr: Box::new(Expr::attr(E::id_attribute())),
            list: ids.into_iter().map(Expr::lit).collect(),
            negated: false,
        };
        self.delete_where::<E>(Some(&filter)).await
    }

    async fn select<E: Entity>(&self, select: &Select) -> Result<Vec<E>, DataError> {
        self.ensure_table::<E>().await?;
        let mut sorts = select.sorts.clone();
        if !sorts.iter().any(|s| s.property() == E::id_attribute()) {
            sorts.push(Sort::asc(E::id_attribute()));
        }
        let mut builder = QueryBuilder::for_entity::<E>()
            .filter(select.filter.clone())
            .order_by(&sorts)
            .offset(select.offset);
        if let Some(limit) = select.limit {
            builder = builder.limit(limit);
        }
        let (sql, params) = builder.build_select()?;
        tracing::debug!(%sql, "Selecting");
        let rows = bind_all(&sql, &params)?
            .fetch_all(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        rows.iter()
            .map(|row| decode_row::<E>(row).and_then(E::from_record))
            .collect()
    }

    async fn count<E: Entity>(&self, filter: Option<&Expr>) -> Result<u64, DataError> {
        self.ensure_table::<E>().await?;
        let (sql, params) = QueryBuilder::for_entity::<E>()
            .filter(filter.cloned())
            .build_count()?;
        let row = bind_all(&sql, &params)?
            .fetch_one(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        let count: i64 = row.try_get(0).map_err(SqlxErrorExt::into_data_error)?;
        Ok(count as u64)
    }

    async fn delete_where<E: Entity>(&self, filter: Option<&Expr>) -> Result<u64, DataError> {
        self.ensure_table::<E>().await?;
        let (sql, params) = QueryBuilder::for_entity::<E>()
            .filter(filter.cloned())
            .build_delete()?;
        tracing::debug!(%sql, "Deleting");
        let result = bind_all(&sql, &params)?
            .execute(&self.pool)
            .await
            .map_err(SqlxErrorExt::into_data_error)?;
        Ok(result.rows_affected())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Write {
    Insert,
    Save,
    Update,
}

impl Write {
    fn sql<E: Entity>(self) -> SqlxResult<String> {
        match self {
            Write::Insert => insert_sql::<E>("INSERT"),
            Write::Save => insert_sql::<E>("INSERT OR REPLACE"),
            Write::Update => update_sql::<E>(),
        }
    }
}

fn create_table_sql<E: Entity>() -> SqlxResult<String> {
    let mut columns = Vec::with_capacity(E::attributes().len());
    for attr in E::attributes() {
        let column = quote_identifier(attr.name)?;
        if attr.name == E::id_attribute() {
            columns.push(format!("{column} NOT NULL PRIMARY KEY"));
        } else {
            columns.push(column);
        }
    }
    Ok(format!(
        "CREATE TABLE IF NOT EXISTS {} ({})",
        quote_identifier(E::entity_name())?,
        columns.join(", ")
    ))
}

fn insert_sql<E: Entity>(verb: &str) -> SqlxResult<String> {
    let columns = E::attributes()
        .iter()
        .map(|a| quote_identifier(a.name))
        .collect::<SqlxResult<Vec<_>>>()?;
    let placeholders = vec!["?"; columns.len()].join(", ");
    Ok(format!(
        "{verb} INTO {} ({}) VALUES ({placeholders})",
        quote_identifier(E::entity_name())?,
        columns.join(", ")
    ))
}

/// Assigns every attribute in declaration order, then matches the
/// identifier bound last.
fn update_sql<E: Entity>() -> SqlxResult<String> {
    let assignments = E::attributes()
        .iter()
        .map(|a| quote_identifier(a.name).map(|c| format!("{c} = ?")))
        .collect::<SqlxResult<Vec<_>>>()?;
    Ok(format!(
        "UPDATE {} SET {} WHERE {} = ?",
        quote_identifier(E::entity_name())?,
        assignments.join(", "),
        quote_identifier(E::id_attribute())?
    ))
}

fn entity_params<E: Entity>(entity: &E, trailing_id: bool) -> SqlxResult<Vec<Value>> {
    let mut record = entity.try_to_record()?;
    let mut params: Vec<Value> = E::attributes()
        .iter()
        .map(|a| record.remove(a.name).unwrap_or(Value::Null))
        .collect();
    if trailing_id {
        params.push(entity.id_value());
    }
    Ok(params)
}

fn bind_all<'q>(sql: &'q str, params: &[Value]) -> SqlxResult<SqliteQuery<'q>> {
    params.iter().try_fold(sqlx::query(sql), bind_value)
}

fn bind_value<'q>(query: SqliteQuery<'q>, value: &Value) -> SqlxResult<SqliteQuery<'q>> {
    Ok(match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(i) => query.bind(*i),
        Value::Float(f) => query.bind(*f),
        Value::Text(s) => query.bind(s.clone()),
        Value::List(_) => query.bind(serde_json::to_string(value).map_err(DataError::database)?),
    })
}

fn decode_row<E: Entity>(row: &SqliteRow) -> SqlxResult<Record> {
    let mut record = Record::new();
    for attr in E::attributes() {
        let value = decode_column(row, attr.name)?;
        let value = match value {
            Value::Text(json) if attr.is_collection() => {
                serde_json::from_str(&json).map_err(|e| {
                    DataError::Mapping(format!("column '{}' holds invalid JSON: {e}", attr.name))
                })?
            }
            other => other,
        };
        record.insert(attr.name.to_string(), value);
    }
    Ok(record)
}

fn decode_column(row: &SqliteRow, column: &str) -> SqlxResult<Value> {
    let raw = row.try_get_raw(column).map_err(SqlxErrorExt::into_data_error)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let kind = raw.type_info().name().to_string();
    let value = match kind.as_str() {
        "INTEGER" | "BOOLEAN" => Value::Int(row.try_get::<i64, _>(column).map_err(SqlxErrorExt::into_data_error)?),
        "REAL" | "NUMERIC" => Value::Float(row.try_get::<f64, _>(column).map_err(SqlxErrorExt::into_data_error)?),
        "TEXT" => Value::Text(row.try_get::<String, _>(column).map_err(SqlxErrorExt::into_data_error)?),
        other => {
            return Err(DataError::Mapping(format!(
                "column '{column}' has unsupported storage class {other}"
            )))
        }
    };
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use strata_core::expr::CompareOp;
    use strata_core::{Repo, Repository};
    use strata_macros::Entity;

    #[derive(Entity, Debug, Clone, PartialEq)]
    struct Note {
        #[id]
        id: i64,
        title: String,
        rank: Option<f64>,
        tags: Vec<String>,
        pinned: bool,
    }

    fn note(id: i64, title: &str, rank: Option<f64>, tags: &[&str]) -> Note {
        Note {
            id,
            title: title.to_string(),
            rank,
            tags: tags.iter().map(|t| t.to_string()).collect(),
            pinned: id % 2 == 0,
        }
    }

    async fn provider() -> SqliteProvider {
        SqliteProvider::connect("sqlite::memory:").await.unwrap()
    }

    #[test]
    fn test_create_table_sql() {
        assert_eq!(
            create_table_sql::<Note>().unwrap(),
            r#"CREATE TABLE IF NOT EXISTS "Note" ("id" NOT NULL PRIMARY KEY, "title", "rank", "tags", "pinned")"#
        );
    }

    #[test]
    fn test_update_sql_binds_id_last() {
        assert_eq!(
            update_sql::<Note>().unwrap(),
            r#"UPDATE "Note" SET "id" = ?, "title" = ?, "rank" = ?, "tags" = ?, "pinned" = ? WHERE "id" = ?"#
        );
        assert_eq!(entity_params(&note(7, "a", None, &[]), false).unwrap().len(), 5);
        let params = entity_params(&note(7, "a", None, &[]), true).unwrap();
        assert_eq!(params.len(), 6);
        assert_eq!(params[5], Value::Int(7));
    }

    #[tokio::test]
    async fn test_round_trip_preserves_types() {
        let provider = provider().await;
        let stored = note(2, "groceries", Some(1.5), &["home", "weekly"]);
        provider.insert(vec![stored.clone()]).await.unwrap();
        let found: Vec<Note> = provider.select(&Select::default()).await.unwrap();
        assert_eq!(found, vec![stored]);
    }

    #[derive(Entity, Debug, Clone, PartialEq)]
    struct Counter {
        #[id]
        id: u64,
        hits: u64,
    }

    #[tokio::test]
    async fn test_unsigned_attributes_round_trip_or_fail_mapping() {
        let provider = provider().await;
        let largest = Counter {
            id: 1,
            hits: i64::MAX as u64,
        };
        provider.insert(vec![largest.clone()]).await.unwrap();

        let err = provider
            .save(vec![
                Counter { id: 2, hits: 3 },
                Counter {
                    id: 3,
                    hits: u64::MAX,
                },
            ])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::Mapping(ref msg) if msg.contains("hits")), "{err:?}");

        let found: Vec<Counter> = provider.select(&Select::default()).await.unwrap();
        assert_eq!(found, vec![largest]);
    }

    #[tokio::test]
    async fn test_insert_rejects_duplicates_atomically() {
        let provider = provider().await;
        provider.insert(vec![note(1, "a", None, &[])]).await.unwrap();
        let err = provider
            .insert(vec![note(2, "b", None, &[]), note(1, "again", None, &[])])
            .await
            .unwrap_err();
        assert!(matches!(err, DataError::EntityExists(msg) if msg.contains("Note with id 1")));
        assert_eq!(provider.count::<Note>(None).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_update_skips_missing_rows() {
        let provider = provider().await;
        provider.insert(vec![note(1, "a", None, &[])]).await.unwrap();
        let updated = provider
            .update(vec![note(1, "renamed", Some(2.0), &[]), note(9, "ghost", None, &[])])
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0].title, "renamed");
    }

    #[tokio::test]
    async fn test_select_orders_nulls_first_then_by_id() {
        let provider = provider().await;
        provider
            .save(vec![
                note(3, "c", Some(1.0), &[]),
                note(1, "a", None, &[]),
                note(2, "b", Some(1.0), &[]),
            ])
            .await
            .unwrap();
        let select = Select::default()
            .sorted(vec![Sort::asc("rank")])
            .window(0, Some(2));
        let found: Vec<Note> = provider.select(&select).await.unwrap();
        assert_eq!(found.iter().map(|n| n.id).collect::<Vec<_>>(), vec![1, 2]);
    }

    #[tokio::test]
    async fn test_filtered_count_and_delete() {
        let provider = provider().await;
        provider
            .insert(vec![
                note(1, "a", Some(1.0), &[]),
                note(2, "b", Some(5.0), &[]),
                note(3, "c", Some(9.0), &[]),
            ])
            .await
            .unwrap();
        let filter = Expr::compare(CompareOp::Gt, Expr::attr("rank"), Expr::lit(2.0));
        assert_eq!(provider.count::<Note>(Some(&filter)).await.unwrap(), 2);
        assert_eq!(provider.delete_where::<Note>(Some(&filter)).await.unwrap(), 2);
        assert_eq!(provider.delete_by_ids::<Note>(vec![Value::Int(1), Value::Int(4)]).await.unwrap(), 1);
        assert_eq!(provider.count::<Note>(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_from_settings_is_always_acid() {
        let settings = ProviderSettings {
            consistency: Consistency::Base,
            ..ProviderSettings::default()
        };
        let provider = SqliteProvider::from_settings(&settings).await.unwrap();
        assert_eq!(provider.consistency(), Consistency::Acid);
        assert_eq!(provider.count::<Note>(None).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_file_database_survives_reconnect() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("notes.db").display());

        let first = SqliteProvider::connect(&url).await.unwrap();
        first.insert(vec![note(1, "kept", Some(3.0), &["a"])]).await.unwrap();
        first.pool().close().await;

        let second = SqliteProvider::connect(&url).await.unwrap();
        let found: Vec<Note> = second.select(&Select::default()).await.unwrap();
        assert_eq!(found, vec![note(1, "kept", Some(3.0), &["a"])]);
    }

    #[tokio::test]
    async fn test_generic_repository_operations() {
        let repo: Repo<Note, SqliteProvider> = Repo::new(provider().await, Vec::new()).unwrap();
        repo.save(&note(1, "a", None, &["x"])).await.unwrap();
        assert!(repo.exists_by_id(&1).await.unwrap());
        assert_eq!(repo.find_by_id(&1).await.unwrap().unwrap().tags, vec!["x"]);
        assert!(repo.delete_by_id(&1).await.unwrap());
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
