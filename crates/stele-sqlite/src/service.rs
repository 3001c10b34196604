//! SQLite persistence service.

use crate::{DatabaseConfig, DatabasePool, SqliteEntityManager};
use std::sync::Arc;
use stele_core::SteleResult;
use stele_dao::{EntityManager, PersistenceService};
use tracing::info;

/// A [`PersistenceService`] over a SQLite database.
///
/// Owns the connection pool and a single shared entity-manager handle.
pub struct SqlitePersistenceService {
    name: String,
    pool: DatabasePool,
    em: Arc<SqliteEntityManager>,
}

impl SqlitePersistenceService {
    /// Connects to the configured database and builds the service.
    pub async fn connect(
        name: impl Into<String>,
        config: &DatabaseConfig,
    ) -> SteleResult<Arc<Self>> {
        let name = name.into();
        let pool = DatabasePool::new(config).await?;
        info!("Persistence service ready: {}", name);
        let em = Arc::new(SqliteEntityManager::new(pool.clone()));
        Ok(Arc::new(Self { name, pool, em }))
    }

    /// The underlying pool, for schema setup and host plumbing.
    #[must_use]
    pub fn pool(&self) -> &DatabasePool {
        &self.pool
    }
}

impl PersistenceService for SqlitePersistenceService {
    fn name(&self) -> &str {
        &self.name
    }

    fn entity_manager(&self) -> Arc<dyn EntityManager> {
        self.em.clone()
    }
}

impl std::fmt::Debug for SqlitePersistenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqlitePersistenceService")
            .field("name", &self.name)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
