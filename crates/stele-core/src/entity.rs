//! Mapped-type metadata registration.
//!
//! The original adapter resolved entity name and id/created/modified
//! columns from provider annotations at runtime. Here the mapped type
//! registers the same metadata statically through the [`Entity`] trait,
//! and the Dao snapshots it once into an immutable [`EntityMeta`] at
//! construction. The identifier accessor is part of the registration,
//! which replaces both reflective field access and the self-identifying
//! capability fallback of the original.

use crate::Value;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Metadata registration for a mapped entity type.
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Primary-key type.
    type Id: Clone + Into<Value> + Send + Sync + 'static;

    /// Table (entity) name.
    fn entity_name() -> &'static str;

    /// Primary-key column name.
    fn id_column() -> &'static str;

    /// Creation-timestamp column, when the type tracks one.
    fn created_column() -> Option<&'static str> {
        None
    }

    /// Last-modification-timestamp column, when the type tracks one.
    fn last_modified_column() -> Option<&'static str> {
        None
    }

    /// Logical database id; `None` selects the registry default.
    fn database() -> Option<&'static str> {
        None
    }

    /// The entity's identifier, when assigned.
    fn id(&self) -> Option<Self::Id>;
}

/// Immutable per-type metadata snapshot, resolved once per Dao.
#[derive(Debug, Clone)]
pub struct EntityMeta {
    pub entity_name: &'static str,
    pub id_column: &'static str,
    pub created_column: Option<&'static str>,
    pub last_modified_column: Option<&'static str>,
    pub database: Option<&'static str>,
    /// Prebuilt id-membership filter fragment (`"<id_column> in"`).
    pub id_list_expr: String,
}

impl EntityMeta {
    /// Resolves the metadata of a mapped type.
    #[must_use]
    pub fn of<M: Entity>() -> Self {
        Self {
            entity_name: M::entity_name(),
            id_column: M::id_column(),
            created_column: M::created_column(),
            last_modified_column: M::last_modified_column(),
            database: M::database(),
            id_list_expr: format!("{} in", M::id_column()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Serialize, Deserialize)]
    struct Note {
        id: i64,
        body: String,
    }

    impl Entity for Note {
        type Id = i64;

        fn entity_name() -> &'static str {
            "notes"
        }

        fn id_column() -> &'static str {
            "id"
        }

        fn created_column() -> Option<&'static str> {
            Some("created_at")
        }

        fn id(&self) -> Option<Self::Id> {
            Some(self.id)
        }
    }

    #[test]
    fn test_meta_snapshot() {
        let meta = EntityMeta::of::<Note>();
        assert_eq!(meta.entity_name, "notes");
        assert_eq!(meta.id_column, "id");
        assert_eq!(meta.created_column, Some("created_at"));
        assert_eq!(meta.last_modified_column, None);
        assert_eq!(meta.database, None);
        assert_eq!(meta.id_list_expr, "id in");
    }
}
