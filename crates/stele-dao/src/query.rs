//! Query descriptors and the execution facade.
//!
//! A [`QueryDescriptor`] is the immutable (kind, expression, positional
//! parameters) tuple assembled by the Dao's `q()` family; [`Query`] pairs
//! one with an entity-manager handle and exposes execution. Callers build
//! a fresh descriptor per logical query.

use crate::expr;
use crate::manager::EntityManager;
use std::marker::PhantomData;
use std::sync::Arc;
use stele_core::{Entity, Record, SteleError, SteleResult, Value};

/// Shape of a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryKind {
    Find,
    Count,
    Update,
    Delete,
}

/// One ordering key. Ascending unless marked descending.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderBy {
    pub column: String,
    pub descending: bool,
}

/// A parameterized query descriptor.
///
/// For [`QueryKind::Update`], `columns` holds the ordered target field
/// names and the leading parameters are their new values; the remaining
/// parameters belong to the filter expression. For [`QueryKind::Find`],
/// a non-empty `columns` selects an explicit column subset.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    pub kind: QueryKind,
    pub entity: String,
    pub expression: String,
    pub columns: Vec<String>,
    pub params: Vec<Value>,
    pub order: Vec<OrderBy>,
    pub limit: Option<u64>,
}

impl QueryDescriptor {
    /// Creates a descriptor with no explicit column list.
    #[must_use]
    pub fn new(kind: QueryKind, entity: impl Into<String>, expression: impl Into<String>) -> Self {
        Self::with_columns(kind, entity, expression, Vec::new())
    }

    /// Creates a descriptor with an explicit column list.
    #[must_use]
    pub fn with_columns(
        kind: QueryKind,
        entity: impl Into<String>,
        expression: impl Into<String>,
        columns: Vec<String>,
    ) -> Self {
        Self {
            kind,
            entity: entity.into(),
            expression: expression.into(),
            columns,
            params: Vec::new(),
            order: Vec::new(),
            limit: None,
        }
    }

    /// Binds a parameter at a 1-based position.
    pub fn set_parameter(&mut self, position: usize, value: Value) {
        if position == 0 {
            return;
        }
        if self.params.len() < position {
            self.params.resize(position, Value::Null);
        }
        self.params[position - 1] = value;
    }

    /// Adds an ordering key; a leading `-` marks it descending.
    #[must_use]
    pub fn order_by(mut self, column: &str) -> Self {
        let (column, descending) = match column.strip_prefix('-') {
            Some(rest) => (rest, true),
            None => (column, false),
        };
        self.order.push(OrderBy {
            column: column.to_string(),
            descending,
        });
        self
    }

    /// Caps the number of rows returned.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// The same descriptor with kind switched to DELETE.
    #[must_use]
    pub fn as_delete(mut self) -> Self {
        self.kind = QueryKind::Delete;
        self
    }

    /// Renders the descriptor into SQL plus flattened bind parameters.
    pub fn to_sql(&self) -> SteleResult<(String, Vec<Value>)> {
        let terms = expr::parse(&self.expression)?;
        match self.kind {
            QueryKind::Find => {
                let condition = expr::render_where(&terms, &self.params)?;
                let columns = if self.columns.is_empty() {
                    "*".to_string()
                } else {
                    self.columns.join(", ")
                };
                let mut sql = format!("SELECT {columns} FROM {}", self.entity);
                if !condition.sql.is_empty() {
                    sql.push_str(&format!(" WHERE {}", condition.sql));
                }
                if !self.order.is_empty() {
                    let keys: Vec<String> = self
                        .order
                        .iter()
                        .map(|key| {
                            let direction = if key.descending { "DESC" } else { "ASC" };
                            format!("{} {direction}", key.column)
                        })
                        .collect();
                    sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
                }
                if let Some(limit) = self.limit {
                    sql.push_str(&format!(" LIMIT {limit}"));
                }
                Ok((sql, condition.params))
            }
            QueryKind::Count => {
                let condition = expr::render_where(&terms, &self.params)?;
                let mut sql = format!("SELECT COUNT(*) FROM {}", self.entity);
                if !condition.sql.is_empty() {
                    sql.push_str(&format!(" WHERE {}", condition.sql));
                }
                Ok((sql, condition.params))
            }
            QueryKind::Delete => {
                let condition = expr::render_where(&terms, &self.params)?;
                let mut sql = format!("DELETE FROM {}", self.entity);
                if !condition.sql.is_empty() {
                    sql.push_str(&format!(" WHERE {}", condition.sql));
                }
                Ok((sql, condition.params))
            }
            QueryKind::Update => {
                if self.columns.is_empty() {
                    return Err(SteleError::unsupported(
                        "UPDATE query requires a field list",
                    ));
                }
                if self.params.len() < self.columns.len() {
                    return Err(SteleError::invalid_expression(format!(
                        "UPDATE of {} fields given {} parameters",
                        self.columns.len(),
                        self.params.len()
                    )));
                }
                let (set_params, where_params) = self.params.split_at(self.columns.len());
                let condition = expr::render_where(&terms, where_params)?;
                let assignments: Vec<String> = self
                    .columns
                    .iter()
                    .map(|column| format!("{column} = ?"))
                    .collect();
                let mut sql = format!(
                    "UPDATE {} SET {}",
                    self.entity,
                    assignments.join(", ")
                );
                if !condition.sql.is_empty() {
                    sql.push_str(&format!(" WHERE {}", condition.sql));
                }
                let mut params = set_params.to_vec();
                params.extend(condition.params);
                Ok((sql, params))
            }
        }
    }
}

/// A descriptor bound to an entity-manager handle, typed by the mapped
/// entity it produces.
pub struct Query<M: Entity> {
    em: Arc<dyn EntityManager>,
    descriptor: QueryDescriptor,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Entity> Query<M> {
    /// Binds a descriptor to a manager handle.
    #[must_use]
    pub fn new(em: Arc<dyn EntityManager>, descriptor: QueryDescriptor) -> Self {
        Self {
            em,
            descriptor,
            _marker: PhantomData,
        }
    }

    /// The underlying descriptor.
    #[must_use]
    pub fn descriptor(&self) -> &QueryDescriptor {
        &self.descriptor
    }

    /// Adds an ordering key; a leading `-` marks it descending.
    #[must_use]
    pub fn order_by(mut self, column: &str) -> Self {
        self.descriptor = self.descriptor.order_by(column);
        self
    }

    /// Caps the number of rows returned.
    #[must_use]
    pub fn limit(mut self, limit: u64) -> Self {
        self.descriptor = self.descriptor.limit(limit);
        self
    }

    /// The same query with kind switched to DELETE.
    #[must_use]
    pub fn as_delete(mut self) -> Self {
        self.descriptor = self.descriptor.as_delete();
        self
    }

    /// Executes and returns the first result, if any.
    pub async fn first(mut self) -> SteleResult<Option<M>> {
        self.descriptor = self.descriptor.limit(1);
        let mut rows = self.em.fetch(&self.descriptor).await?;
        if rows.is_empty() {
            Ok(None)
        } else {
            rows.swap_remove(0).into_entity().map(Some)
        }
    }

    /// Executes and returns all matches.
    pub async fn fetch(&self) -> SteleResult<Vec<M>> {
        let rows = self.em.fetch(&self.descriptor).await?;
        rows.into_iter().map(Record::into_entity).collect()
    }

    /// Executes and returns raw records; the surface for explicit
    /// column-subset queries, which may not deserialize into `M`.
    pub async fn fetch_records(&self) -> SteleResult<Vec<Record>> {
        self.em.fetch(&self.descriptor).await
    }

    /// Executes as a counting query.
    pub async fn count(&self) -> SteleResult<i64> {
        let mut descriptor = self.descriptor.clone();
        descriptor.kind = QueryKind::Count;
        self.em.count(&descriptor).await
    }

    /// Executes an UPDATE- or DELETE-shaped query as a bulk mutation,
    /// returning the affected row count.
    pub async fn execute_update(&self) -> SteleResult<u64> {
        SteleError::unsupported_if(
            !matches!(self.descriptor.kind, QueryKind::Update | QueryKind::Delete),
            "executeUpdate requires an UPDATE or DELETE query",
        )?;
        self.em.execute_update(&self.descriptor).await
    }
}

impl<M: Entity> std::fmt::Debug for Query<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Query")
            .field("descriptor", &self.descriptor)
            .finish_non_exhaustive()
    }
}
