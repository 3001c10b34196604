//! The entity-manager seam.
//!
//! Providers implement [`EntityManager`] over whatever runtime they wrap;
//! the Dao facade only ever sees `Arc<dyn EntityManager>`. The seam is
//! phrased in terms of [`Record`]s and [`QueryDescriptor`]s so it stays
//! object-safe while `Dao<M>` stays generic.

use crate::query::QueryDescriptor;
use async_trait::async_trait;
use stele_core::{Interface, Record, SteleResult, Value};

/// The persistence provider's per-context handle.
///
/// Write operations (`persist`, `merge`, `remove`) may be buffered until
/// the next `flush`; read operations observe pending writes (providers
/// flush before executing a query). `clear` detaches everything the
/// context tracks and discards unflushed work.
#[async_trait]
pub trait EntityManager: Interface + Send + Sync {
    /// Looks a row up by primary key.
    async fn find(
        &self,
        entity: &str,
        id_column: &str,
        id: Value,
    ) -> SteleResult<Option<Record>>;

    /// Whether the context currently manages the given identity.
    async fn contains(&self, entity: &str, id: &Value) -> SteleResult<bool>;

    /// Schedules an insert of a new row.
    async fn persist(&self, entity: &str, id_column: &str, record: Record) -> SteleResult<()>;

    /// Schedules a full-row update of a managed row.
    async fn merge(&self, entity: &str, id_column: &str, record: Record) -> SteleResult<()>;

    /// Schedules removal of a row and detaches its identity.
    async fn remove(&self, entity: &str, id_column: &str, id: Value) -> SteleResult<()>;

    /// Re-reads a managed row's state from the store.
    ///
    /// Fails with [`stele_core::SteleError::Detached`] when the identity
    /// is not managed by the context.
    async fn refresh(&self, entity: &str, id_column: &str, id: Value) -> SteleResult<Record>;

    /// Forces pending writes out to the backing store.
    async fn flush(&self) -> SteleResult<()>;

    /// Detaches all tracked identities and discards unflushed work.
    async fn clear(&self) -> SteleResult<()>;

    /// Executes a FIND-shaped descriptor.
    async fn fetch(&self, query: &QueryDescriptor) -> SteleResult<Vec<Record>>;

    /// Executes a COUNT-shaped descriptor.
    async fn count(&self, query: &QueryDescriptor) -> SteleResult<i64>;

    /// Executes an UPDATE- or DELETE-shaped descriptor, returning the
    /// affected row count.
    async fn execute_update(&self, query: &QueryDescriptor) -> SteleResult<u64>;
}
