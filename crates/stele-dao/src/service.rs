//! Persistence services and the service locator.
//!
//! A [`PersistenceService`] owns one logical database and hands out its
//! entity-manager handle. A [`ServiceLocator`] resolves a service by
//! logical database id; [`ServiceRegistry`] is the in-process
//! implementation a host application populates at bootstrap.

use crate::manager::EntityManager;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use stele_core::{Interface, SteleError, SteleResult};
use tracing::debug;

/// Logical database id used when a mapped type names none.
pub const DEFAULT_DATABASE: &str = "default";

/// One configured persistence provider instance.
pub trait PersistenceService: Interface + Send + Sync {
    /// The logical database id this service serves.
    fn name(&self) -> &str;

    /// The service's entity-manager handle.
    fn entity_manager(&self) -> Arc<dyn EntityManager>;
}

impl std::fmt::Debug for dyn PersistenceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceService")
            .field("name", &self.name())
            .finish()
    }
}

/// Resolves persistence services by logical database id.
pub trait ServiceLocator: Interface + Send + Sync {
    /// Returns the service registered under `db_id`.
    fn service(&self, db_id: &str) -> SteleResult<Arc<dyn PersistenceService>>;
}

/// In-process service-locator implementation.
#[derive(Default)]
pub struct ServiceRegistry {
    services: RwLock<HashMap<String, Arc<dyn PersistenceService>>>,
}

impl ServiceRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a service under a logical database id, replacing any
    /// previous registration.
    pub fn register(&self, db_id: impl Into<String>, service: Arc<dyn PersistenceService>) {
        let db_id = db_id.into();
        debug!("Registering persistence service: {}", db_id);
        self.services.write().insert(db_id, service);
    }

    /// Registers a service under [`DEFAULT_DATABASE`].
    pub fn register_default(&self, service: Arc<dyn PersistenceService>) {
        self.register(DEFAULT_DATABASE, service);
    }
}

impl ServiceLocator for ServiceRegistry {
    fn service(&self, db_id: &str) -> SteleResult<Arc<dyn PersistenceService>> {
        self.services
            .read()
            .get(db_id)
            .cloned()
            .ok_or_else(|| SteleError::unknown_database(db_id))
    }
}

impl std::fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let ids: Vec<String> = self.services.read().keys().cloned().collect();
        f.debug_struct("ServiceRegistry").field("services", &ids).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::QueryDescriptor;
    use async_trait::async_trait;
    use stele_core::{Record, Value};

    struct NullManager;

    #[async_trait]
    impl EntityManager for NullManager {
        async fn find(&self, _: &str, _: &str, _: Value) -> SteleResult<Option<Record>> {
            Ok(None)
        }
        async fn contains(&self, _: &str, _: &Value) -> SteleResult<bool> {
            Ok(false)
        }
        async fn persist(&self, _: &str, _: &str, _: Record) -> SteleResult<()> {
            Ok(())
        }
        async fn merge(&self, _: &str, _: &str, _: Record) -> SteleResult<()> {
            Ok(())
        }
        async fn remove(&self, _: &str, _: &str, _: Value) -> SteleResult<()> {
            Ok(())
        }
        async fn refresh(&self, _: &str, _: &str, _: Value) -> SteleResult<Record> {
            Err(SteleError::detached("null manager"))
        }
        async fn flush(&self) -> SteleResult<()> {
            Ok(())
        }
        async fn clear(&self) -> SteleResult<()> {
            Ok(())
        }
        async fn fetch(&self, _: &QueryDescriptor) -> SteleResult<Vec<Record>> {
            Ok(Vec::new())
        }
        async fn count(&self, _: &QueryDescriptor) -> SteleResult<i64> {
            Ok(0)
        }
        async fn execute_update(&self, _: &QueryDescriptor) -> SteleResult<u64> {
            Ok(0)
        }
    }

    struct NullService;

    impl PersistenceService for NullService {
        fn name(&self) -> &str {
            DEFAULT_DATABASE
        }
        fn entity_manager(&self) -> Arc<dyn EntityManager> {
            Arc::new(NullManager)
        }
    }

    #[test]
    fn test_register_and_resolve() {
        let registry = ServiceRegistry::new();
        registry.register_default(Arc::new(NullService));
        let service = registry.service(DEFAULT_DATABASE).unwrap();
        assert_eq!(service.name(), DEFAULT_DATABASE);
    }

    #[test]
    fn test_unknown_database() {
        let registry = ServiceRegistry::new();
        let err = registry.service("analytics").unwrap_err();
        assert!(matches!(err, SteleError::UnknownDatabase(_)));
        assert!(err.to_string().contains("analytics"));
    }
}
