//! The Dao facade: identifier-typed CRUD plus expression queries for one
//! mapped entity type.

use crate::expr;
use crate::manager::EntityManager;
use crate::query::{Query, QueryDescriptor, QueryKind};
use crate::service::{PersistenceService, ServiceLocator, DEFAULT_DATABASE};
use std::marker::PhantomData;
use std::sync::Arc;
use stele_core::{Entity, EntityMeta, Record, SteleError, SteleResult, Value};
use tokio::sync::OnceCell;
use tracing::debug;

/// Bulk saves flush and clear the persistence context every this many
/// entities to bound memory growth.
pub const BATCH_SIZE: usize = 20;

/// Data-access object for one mapped entity type.
///
/// The persistence-service binding is resolved lazily from the locator on
/// first use (by the type's logical database id, defaulting to
/// [`DEFAULT_DATABASE`]) and cached for the Dao's lifetime; concurrent
/// first calls resolve exactly once. Everything else is stateless.
pub struct Dao<M: Entity> {
    locator: Option<Arc<dyn ServiceLocator>>,
    service: OnceCell<Arc<dyn PersistenceService>>,
    meta: EntityMeta,
    _marker: PhantomData<fn() -> M>,
}

impl<M: Entity> Dao<M> {
    /// Creates a Dao that resolves its service binding lazily.
    #[must_use]
    pub fn new(locator: Arc<dyn ServiceLocator>) -> Self {
        Self {
            locator: Some(locator),
            service: OnceCell::new(),
            meta: EntityMeta::of::<M>(),
            _marker: PhantomData,
        }
    }

    /// Creates a Dao bound to a service up front.
    #[must_use]
    pub fn with_service(service: Arc<dyn PersistenceService>) -> Self {
        Self {
            locator: None,
            service: OnceCell::new_with(Some(service)),
            meta: EntityMeta::of::<M>(),
            _marker: PhantomData,
        }
    }

    /// The resolved metadata of the mapped type.
    #[must_use]
    pub fn meta(&self) -> &EntityMeta {
        &self.meta
    }

    async fn service(&self) -> SteleResult<&Arc<dyn PersistenceService>> {
        self.service
            .get_or_try_init(|| async {
                let locator = self.locator.as_ref().ok_or_else(|| {
                    SteleError::internal("dao has neither a locator nor a bound service")
                })?;
                let db_id = self.meta.database.unwrap_or(DEFAULT_DATABASE);
                debug!("Resolving persistence service for {}: {}", self.meta.entity_name, db_id);
                locator.service(db_id)
            })
            .await
    }

    async fn em(&self) -> SteleResult<Arc<dyn EntityManager>> {
        Ok(self.service().await?.entity_manager())
    }

    fn require_id(&self, entity: &M) -> SteleResult<M::Id> {
        entity.id().ok_or_else(|| {
            SteleError::detached(format!("{} entity has no identifier", self.meta.entity_name))
        })
    }

    // ---- lookups -------------------------------------------------------

    /// Looks the entity up by primary key.
    pub async fn find_by_id(&self, id: M::Id) -> SteleResult<Option<M>> {
        debug!("Finding {} by id", self.meta.entity_name);
        let em = self.em().await?;
        let record = em
            .find(self.meta.entity_name, self.meta.id_column, id.into())
            .await?;
        record.map(Record::into_entity).transpose()
    }

    /// The entity with the greatest creation timestamp.
    ///
    /// Ties are broken by descending id so the result is deterministic.
    /// Fails with an unsupported-operation error when the type configures
    /// no creation column.
    pub async fn find_latest(&self) -> SteleResult<Option<M>> {
        let column = self
            .meta
            .created_column
            .ok_or_else(|| SteleError::unsupported("no created column defined"))?;
        self.newest_by(column).await
    }

    /// The entity with the greatest last-modification timestamp; same
    /// contract as [`find_latest`](Self::find_latest).
    pub async fn find_last_modified(&self) -> SteleResult<Option<M>> {
        let column = self
            .meta
            .last_modified_column
            .ok_or_else(|| SteleError::unsupported("no last-modified column defined"))?;
        self.newest_by(column).await
    }

    async fn newest_by(&self, column: &str) -> SteleResult<Option<M>> {
        self.q()
            .await?
            .order_by(&format!("-{column}"))
            .order_by(&format!("-{}", self.meta.id_column))
            .first()
            .await
    }

    /// All entities matching a filter expression.
    pub async fn find_by(&self, expression: &str, params: Vec<Value>) -> SteleResult<Vec<M>> {
        self.q_expr(expression, params).await?.fetch().await
    }

    /// The first entity matching a filter expression, if any.
    pub async fn find_one_by(
        &self,
        expression: &str,
        params: Vec<Value>,
    ) -> SteleResult<Option<M>> {
        self.q_expr(expression, params).await?.first().await
    }

    /// All entities whose id is in the given list. An empty list yields an
    /// empty result without a provider round trip.
    pub async fn find_by_id_list(&self, ids: &[M::Id]) -> SteleResult<Vec<M>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let list = Value::List(ids.iter().cloned().map(Into::into).collect());
        let expression = self.meta.id_list_expr.clone();
        self.q_expr(&expression, vec![list]).await?.fetch().await
    }

    /// Re-reads a managed entity's state from the store.
    pub async fn reload(&self, entity: &M) -> SteleResult<M> {
        let id = self.require_id(entity)?;
        let em = self.em().await?;
        let record = em
            .refresh(self.meta.entity_name, self.meta.id_column, id.into())
            .await?;
        record.into_entity()
    }

    /// The entity's identifier, when assigned.
    #[must_use]
    pub fn id_of(&self, entity: &M) -> Option<M::Id> {
        entity.id()
    }

    /// Number of entities matching a filter expression.
    pub async fn count_by(&self, expression: &str, params: Vec<Value>) -> SteleResult<i64> {
        self.q_expr(expression, params).await?.count().await
    }

    // ---- writes --------------------------------------------------------

    /// Upsert: merges when the context already manages the entity's id,
    /// persists as new otherwise.
    pub async fn save(&self, entity: M) -> SteleResult<M> {
        debug!("Saving {}", self.meta.entity_name);
        let em = self.em().await?;
        let record = Record::from_entity(&entity)?;
        let managed = match entity.id() {
            Some(id) => em.contains(self.meta.entity_name, &id.into()).await?,
            None => false,
        };
        if managed {
            em.merge(self.meta.entity_name, self.meta.id_column, record)
                .await?;
        } else {
            em.persist(self.meta.entity_name, self.meta.id_column, record)
                .await?;
        }
        Ok(entity)
    }

    /// Partial update: sets only the named fields to the given values for
    /// the entity's id row, then flushes.
    pub async fn save_fields(
        &self,
        entity: &M,
        field_list: &str,
        mut params: Vec<Value>,
    ) -> SteleResult<()> {
        let id = self.require_id(entity)?;
        params.push(id.into());
        let query = self
            .create_update_query(field_list, self.meta.id_column, params)
            .await?;
        query.execute_update().await?;
        self.em().await?.flush().await
    }

    /// Bulk insert. Flushes and clears the persistence context every
    /// [`BATCH_SIZE`] entities; returns the entities in input order.
    pub async fn save_all<I>(&self, entities: I) -> SteleResult<Vec<M>>
    where
        I: IntoIterator<Item = M>,
    {
        let em = self.em().await?;
        let mut saved = Vec::new();
        let mut count = 0usize;
        for entity in entities {
            let record = Record::from_entity(&entity)?;
            em.persist(self.meta.entity_name, self.meta.id_column, record)
                .await?;
            count += 1;
            if count % BATCH_SIZE == 0 {
                em.flush().await?;
                em.clear().await?;
            }
            saved.push(entity);
        }
        debug!("Saved {} {} entities", saved.len(), self.meta.entity_name);
        Ok(saved)
    }

    /// Removes the entity and flushes immediately.
    pub async fn delete(&self, entity: &M) -> SteleResult<()> {
        let id = self.require_id(entity)?;
        let em = self.em().await?;
        em.remove(self.meta.entity_name, self.meta.id_column, id.into())
            .await?;
        em.flush().await
    }

    /// Executes a query as a bulk delete, then flushes.
    pub async fn delete_query(&self, query: Query<M>) -> SteleResult<()> {
        let query = query.as_delete();
        query.execute_update().await?;
        self.em().await?.flush().await
    }

    /// Deletes the row with the given id.
    pub async fn delete_by_id(&self, id: M::Id) -> SteleResult<()> {
        let query = self
            .q_of(QueryKind::Delete, self.meta.id_column, vec![id.into()])
            .await?;
        self.delete_query(query).await
    }

    /// Deletes all rows matching a filter expression.
    pub async fn delete_by(&self, expression: &str, params: Vec<Value>) -> SteleResult<()> {
        let query = self.q_of(QueryKind::Delete, expression, params).await?;
        self.delete_query(query).await
    }

    /// Deletes every row of the mapped type.
    pub async fn delete_all(&self) -> SteleResult<()> {
        let query = self.q_of(QueryKind::Delete, "", Vec::new()).await?;
        self.delete_query(query).await
    }

    /// Alias for [`delete_all`](Self::delete_all).
    pub async fn drop_all(&self) -> SteleResult<()> {
        self.delete_all().await
    }

    // ---- query constructors -------------------------------------------

    /// An unfiltered FIND query.
    pub async fn q(&self) -> SteleResult<Query<M>> {
        self.q_of(QueryKind::Find, "", Vec::new()).await
    }

    /// A FIND query with a filter expression and positional parameters.
    pub async fn q_expr(&self, expression: &str, params: Vec<Value>) -> SteleResult<Query<M>> {
        self.q_of(QueryKind::Find, expression, params).await
    }

    /// A query of the given kind. UPDATE is rejected here; it must go
    /// through [`create_update_query`](Self::create_update_query).
    pub async fn q_of(
        &self,
        kind: QueryKind,
        expression: &str,
        params: Vec<Value>,
    ) -> SteleResult<Query<M>> {
        SteleError::unsupported_if(
            kind == QueryKind::Update,
            "UPDATE not supported in q() API",
        )?;
        self.build_query(kind, expression, Vec::new(), params).await
    }

    /// Alias for [`q`](Self::q).
    pub async fn create_query(&self) -> SteleResult<Query<M>> {
        self.q().await
    }

    /// Alias for [`q_expr`](Self::q_expr).
    pub async fn create_find_query(
        &self,
        expression: &str,
        params: Vec<Value>,
    ) -> SteleResult<Query<M>> {
        self.q_expr(expression, params).await
    }

    /// A FIND query selecting an explicit column subset; execute it with
    /// [`Query::fetch_records`].
    pub async fn create_find_query_with_fields(
        &self,
        field_list: &str,
        expression: &str,
        params: Vec<Value>,
    ) -> SteleResult<Query<M>> {
        self.build_query(
            QueryKind::Find,
            expression,
            expr::split_field_list(field_list),
            params,
        )
        .await
    }

    /// A DELETE query with a filter expression.
    pub async fn create_delete_query(
        &self,
        expression: &str,
        params: Vec<Value>,
    ) -> SteleResult<Query<M>> {
        self.q_of(QueryKind::Delete, expression, params).await
    }

    /// A COUNT query with a filter expression.
    pub async fn create_count_query(
        &self,
        expression: &str,
        params: Vec<Value>,
    ) -> SteleResult<Query<M>> {
        self.q_of(QueryKind::Count, expression, params).await
    }

    /// The dedicated UPDATE constructor: ordered target fields, a filter
    /// expression, and parameters (new field values first, filter values
    /// after).
    pub async fn create_update_query(
        &self,
        field_list: &str,
        expression: &str,
        params: Vec<Value>,
    ) -> SteleResult<Query<M>> {
        self.build_query(
            QueryKind::Update,
            expression,
            expr::split_field_list(field_list),
            params,
        )
        .await
    }

    async fn build_query(
        &self,
        kind: QueryKind,
        expression: &str,
        columns: Vec<String>,
        params: Vec<Value>,
    ) -> SteleResult<Query<M>> {
        let em = self.em().await?;
        let mut descriptor =
            QueryDescriptor::with_columns(kind, self.meta.entity_name, expression, columns);
        for (i, value) in params.into_iter().enumerate() {
            descriptor.set_parameter(i + 1, value);
        }
        Ok(Query::new(em, descriptor))
    }
}

impl<M: Entity> std::fmt::Debug for Dao<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dao")
            .field("entity", &self.meta.entity_name)
            .finish_non_exhaustive()
    }
}
