//! SQLite entity manager.
//!
//! Keeps a minimal persistence context: a queue of pending writes and the
//! set of managed identities. Writes are buffered until the next flush;
//! reads and bulk mutations flush first, so callers observe their own
//! pending writes. Anything heavier (dirty tracking, caching, transaction
//! demarcation) stays with the wrapped runtime.

use crate::DatabasePool;
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use sqlx::sqlite::{SqliteArguments, SqliteRow};
use sqlx::{Column, Row, Sqlite, TypeInfo, ValueRef};
use std::collections::HashSet;
use stele_core::{Record, SteleError, SteleResult, Value};
use stele_dao::{EntityManager, QueryDescriptor};
use tracing::debug;

type SqliteQuery<'q> = sqlx::query::Query<'q, Sqlite, SqliteArguments<'q>>;

enum Op {
    Insert { record: Record },
    Update { id: Value, record: Record },
    Delete { id: Value },
}

struct PendingOp {
    entity: String,
    id_column: String,
    op: Op,
}

#[derive(Default)]
struct Context {
    pending: Vec<PendingOp>,
    managed: HashSet<(String, String)>,
}

/// Entity manager over a SQLite pool.
pub struct SqliteEntityManager {
    pool: DatabasePool,
    context: Mutex<Context>,
}

impl SqliteEntityManager {
    /// Creates a manager over the given pool.
    #[must_use]
    pub fn new(pool: DatabasePool) -> Self {
        Self {
            pool,
            context: Mutex::new(Context::default()),
        }
    }

    async fn apply(&self, op: PendingOp) -> SteleResult<()> {
        match op.op {
            Op::Insert { record } => {
                let columns: Vec<String> = record.columns().map(ToString::to_string).collect();
                let placeholders = vec!["?"; columns.len()].join(", ");
                let sql = format!(
                    "INSERT INTO {} ({}) VALUES ({placeholders})",
                    op.entity,
                    columns.join(", ")
                );
                let mut query = sqlx::query(&sql);
                for (_, value) in record {
                    query = bind_value(query, value)?;
                }
                query.execute(self.pool.inner()).await?;
            }
            Op::Update { id, record } => {
                let assignments: Vec<String> = record
                    .columns()
                    .filter(|column| *column != op.id_column)
                    .map(|column| format!("{column} = ?"))
                    .collect();
                if assignments.is_empty() {
                    return Ok(());
                }
                let sql = format!(
                    "UPDATE {} SET {} WHERE {} = ?",
                    op.entity,
                    assignments.join(", "),
                    op.id_column
                );
                let mut query = sqlx::query(&sql);
                for (column, value) in record {
                    if column != op.id_column {
                        query = bind_value(query, value)?;
                    }
                }
                query = bind_value(query, id)?;
                query.execute(self.pool.inner()).await?;
            }
            Op::Delete { id } => {
                let sql = format!("DELETE FROM {} WHERE {} = ?", op.entity, op.id_column);
                let query = bind_value(sqlx::query(&sql), id)?;
                query.execute(self.pool.inner()).await?;
            }
        }
        Ok(())
    }

    fn is_managed(&self, entity: &str, id: &Value) -> bool {
        self.context
            .lock()
            .managed
            .contains(&(entity.to_string(), identity_key(id)))
    }

    fn manage(&self, entity: &str, id: &Value) {
        self.context
            .lock()
            .managed
            .insert((entity.to_string(), identity_key(id)));
    }
}

#[async_trait]
impl EntityManager for SqliteEntityManager {
    async fn find(
        &self,
        entity: &str,
        id_column: &str,
        id: Value,
    ) -> SteleResult<Option<Record>> {
        self.flush().await?;
        let sql = format!("SELECT * FROM {entity} WHERE {id_column} = ? LIMIT 1");
        let query = bind_value(sqlx::query(&sql), id.clone())?;
        let row = query.fetch_optional(self.pool.inner()).await?;
        match row {
            Some(row) => {
                let record = record_from_row(&row)?;
                self.manage(entity, &id);
                Ok(Some(record))
            }
            None => Ok(None),
        }
    }

    async fn contains(&self, entity: &str, id: &Value) -> SteleResult<bool> {
        Ok(self.is_managed(entity, id))
    }

    async fn persist(&self, entity: &str, id_column: &str, record: Record) -> SteleResult<()> {
        debug!("Persisting {} row", entity);
        let id = record.get(id_column).cloned().unwrap_or(Value::Null);
        let mut ctx = self.context.lock();
        if !id.is_null() {
            ctx.managed.insert((entity.to_string(), identity_key(&id)));
        }
        ctx.pending.push(PendingOp {
            entity: entity.to_string(),
            id_column: id_column.to_string(),
            op: Op::Insert { record },
        });
        Ok(())
    }

    async fn merge(&self, entity: &str, id_column: &str, record: Record) -> SteleResult<()> {
        debug!("Merging {} row", entity);
        let id = record
            .get(id_column)
            .cloned()
            .filter(|id| !id.is_null())
            .ok_or_else(|| {
                SteleError::mapping(format!("merge requires a value in column {id_column}"))
            })?;
        let mut ctx = self.context.lock();
        ctx.managed.insert((entity.to_string(), identity_key(&id)));
        ctx.pending.push(PendingOp {
            entity: entity.to_string(),
            id_column: id_column.to_string(),
            op: Op::Update { id, record },
        });
        Ok(())
    }

    async fn remove(&self, entity: &str, id_column: &str, id: Value) -> SteleResult<()> {
        debug!("Removing {} row", entity);
        let mut ctx = self.context.lock();
        ctx.managed.remove(&(entity.to_string(), identity_key(&id)));
        ctx.pending.push(PendingOp {
            entity: entity.to_string(),
            id_column: id_column.to_string(),
            op: Op::Delete { id },
        });
        Ok(())
    }

    async fn refresh(&self, entity: &str, id_column: &str, id: Value) -> SteleResult<Record> {
        self.flush().await?;
        if !self.is_managed(entity, &id) {
            return Err(SteleError::detached(format!(
                "{entity} row is not managed by this context"
            )));
        }
        let sql = format!("SELECT * FROM {entity} WHERE {id_column} = ? LIMIT 1");
        let query = bind_value(sqlx::query(&sql), id)?;
        let row = query.fetch_optional(self.pool.inner()).await?;
        row.ok_or_else(|| {
            SteleError::database(format!("refresh target row no longer exists in {entity}"))
        })
        .and_then(|row| record_from_row(&row))
    }

    async fn flush(&self) -> SteleResult<()> {
        let ops = {
            let mut ctx = self.context.lock();
            std::mem::take(&mut ctx.pending)
        };
        if ops.is_empty() {
            return Ok(());
        }
        debug!("Flushing {} pending operations", ops.len());
        let mut ops = ops.into_iter();
        while let Some(op) = ops.next() {
            if let Err(err) = self.apply(op).await {
                // the failed op is gone, but keep the unapplied tail so a
                // later flush still gets to apply it, ahead of anything
                // queued in the meantime
                let mut ctx = self.context.lock();
                let mut rest: Vec<PendingOp> = ops.collect();
                rest.append(&mut ctx.pending);
                ctx.pending = rest;
                return Err(err);
            }
        }
        Ok(())
    }

    async fn clear(&self) -> SteleResult<()> {
        debug!("Clearing persistence context");
        let mut ctx = self.context.lock();
        ctx.pending.clear();
        ctx.managed.clear();
        Ok(())
    }

    async fn fetch(&self, query: &QueryDescriptor) -> SteleResult<Vec<Record>> {
        self.flush().await?;
        let (sql, params) = query.to_sql()?;
        debug!("Executing query: {}", sql);
        let mut q = sqlx::query(&sql);
        for value in params {
            q = bind_value(q, value)?;
        }
        let rows = q.fetch_all(self.pool.inner()).await?;
        rows.iter().map(record_from_row).collect()
    }

    async fn count(&self, query: &QueryDescriptor) -> SteleResult<i64> {
        self.flush().await?;
        let (sql, params) = query.to_sql()?;
        let mut q = sqlx::query(&sql);
        for value in params {
            q = bind_value(q, value)?;
        }
        let row = q.fetch_one(self.pool.inner()).await?;
        Ok(row.try_get::<i64, _>(0)?)
    }

    async fn execute_update(&self, query: &QueryDescriptor) -> SteleResult<u64> {
        self.flush().await?;
        let (sql, params) = query.to_sql()?;
        debug!("Executing bulk mutation: {}", sql);
        let mut q = sqlx::query(&sql);
        for value in params {
            q = bind_value(q, value)?;
        }
        let result = q.execute(self.pool.inner()).await?;
        Ok(result.rows_affected())
    }
}

impl std::fmt::Debug for SqliteEntityManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ctx = self.context.lock();
        f.debug_struct("SqliteEntityManager")
            .field("pending", &ctx.pending.len())
            .field("managed", &ctx.managed.len())
            .finish()
    }
}

/// Canonical text form of a timestamp.
///
/// Timestamps are stored as text and ordered lexicographically, so the
/// subsecond precision must be fixed: with a variable precision a
/// whole-second value (`...00Z`) sorts after a subsecond value in the
/// same second (`...00.5Z`), because `'Z' > '.'`.
fn canonical_timestamp(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

/// Canonical identity-map key of a primary-key value.
fn identity_key(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => i64::from(*b).to_string(),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Text(s) => DateTime::parse_from_rfc3339(s).map_or_else(
            |_| s.clone(),
            |dt| canonical_timestamp(&dt.with_timezone(&Utc)),
        ),
        Value::Bytes(b) => format!("{b:?}"),
        Value::Uuid(u) => u.to_string(),
        Value::DateTime(dt) => canonical_timestamp(dt),
        Value::List(items) => items
            .iter()
            .map(identity_key)
            .collect::<Vec<_>>()
            .join(","),
    }
}

fn bind_value(query: SqliteQuery<'_>, value: Value) -> SteleResult<SqliteQuery<'_>> {
    Ok(match value {
        Value::Null => query.bind(Option::<String>::None),
        Value::Bool(b) => query.bind(b),
        Value::Int(i) => query.bind(i),
        Value::Float(f) => query.bind(f),
        // entity fields arrive serde-serialized, so timestamps come in as
        // text with whatever precision serde emitted; normalize them
        Value::Text(s) => match DateTime::parse_from_rfc3339(&s) {
            Ok(dt) => query.bind(canonical_timestamp(&dt.with_timezone(&Utc))),
            Err(_) => query.bind(s),
        },
        Value::Bytes(b) => query.bind(b),
        Value::Uuid(u) => query.bind(u.to_string()),
        Value::DateTime(dt) => query.bind(canonical_timestamp(&dt)),
        Value::List(_) => {
            return Err(SteleError::internal(
                "list parameter must be expanded before binding",
            ))
        }
    })
}

fn record_from_row(row: &SqliteRow) -> SteleResult<Record> {
    let mut record = Record::new();
    for (i, column) in row.columns().iter().enumerate() {
        let raw = row.try_get_raw(i)?;
        let value = if raw.is_null() {
            Value::Null
        } else {
            match raw.type_info().name() {
                "BOOLEAN" => Value::Bool(row.try_get::<bool, _>(i)?),
                "INTEGER" => Value::Int(row.try_get::<i64, _>(i)?),
                "REAL" => Value::Float(row.try_get::<f64, _>(i)?),
                "BLOB" => Value::Bytes(row.try_get::<Vec<u8>, _>(i)?),
                _ => Value::Text(row.try_get::<String, _>(i)?),
            }
        };
        record.set(column.name(), value);
    }
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_identity_key_canonicalizes_uuid_and_text() {
        let id = Uuid::new_v4();
        assert_eq!(
            identity_key(&Value::Uuid(id)),
            identity_key(&Value::Text(id.to_string()))
        );
    }

    #[test]
    fn test_identity_key_distinguishes_values() {
        assert_ne!(identity_key(&Value::Int(1)), identity_key(&Value::Int(2)));
        assert_eq!(identity_key(&Value::Bool(true)), identity_key(&Value::Int(1)));
    }

    #[test]
    fn test_canonical_timestamp_sorts_chronologically_as_text() {
        let whole: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
        let subsecond = whole + chrono::Duration::milliseconds(500);
        assert!(canonical_timestamp(&whole) < canonical_timestamp(&subsecond));
    }

    #[test]
    fn test_identity_key_canonicalizes_timestamp_text() {
        let dt: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
        assert_eq!(
            identity_key(&Value::DateTime(dt)),
            identity_key(&Value::Text("2024-06-01T12:00:00+00:00".to_string()))
        );
    }
}
