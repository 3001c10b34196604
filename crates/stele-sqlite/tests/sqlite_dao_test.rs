//! End-to-end Dao behavior against an in-memory SQLite database.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use stele_core::{params, Entity, SteleError, Value};
use stele_dao::{Dao, QueryKind, ServiceLocator, ServiceRegistry};
use stele_sqlite::{DatabaseConfig, SqlitePersistenceService};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Track {
    id: Uuid,
    title: String,
    plays: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Entity for Track {
    type Id = Uuid;

    fn entity_name() -> &'static str {
        "tracks"
    }

    fn id_column() -> &'static str {
        "id"
    }

    fn created_column() -> Option<&'static str> {
        Some("created_at")
    }

    fn last_modified_column() -> Option<&'static str> {
        Some("updated_at")
    }

    fn id(&self) -> Option<Uuid> {
        Some(self.id)
    }
}

/// No created/modified columns configured.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct Plain {
    id: i64,
}

impl Entity for Plain {
    type Id = i64;

    fn entity_name() -> &'static str {
        "plain"
    }

    fn id_column() -> &'static str {
        "id"
    }

    fn id(&self) -> Option<i64> {
        Some(self.id)
    }
}

async fn setup() -> (Arc<SqlitePersistenceService>, Dao<Track>) {
    let _ = tracing_subscriber::fmt().with_env_filter("warn").try_init();

    let config = DatabaseConfig::in_memory();
    let service = SqlitePersistenceService::connect("default", &config)
        .await
        .unwrap();
    sqlx::query(
        "CREATE TABLE tracks (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            plays INTEGER NOT NULL CHECK (plays >= 0),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
    )
    .execute(service.pool().inner())
    .await
    .unwrap();

    let registry = ServiceRegistry::new();
    registry.register_default(service.clone());
    let dao = Dao::new(Arc::new(registry) as Arc<dyn ServiceLocator>);
    (service, dao)
}

fn track(title: &str, plays: i64, minutes_ago: i64) -> Track {
    let at = Utc::now() - Duration::minutes(minutes_ago);
    Track {
        id: Uuid::new_v4(),
        title: title.to_string(),
        plays,
        created_at: at,
        updated_at: at,
    }
}

#[tokio::test]
async fn test_save_then_find_by_id() {
    let (service, dao) = setup().await;
    service.pool().health_check().await.unwrap();

    let entity = track("first", 3, 10);
    let saved = dao.save(entity.clone()).await.unwrap();
    assert_eq!(dao.id_of(&saved), Some(entity.id));

    let found = dao.find_by_id(entity.id).await.unwrap().unwrap();
    assert_eq!(found, entity);
}

#[tokio::test]
async fn test_find_by_id_absent() {
    let (_service, dao) = setup().await;
    assert!(dao.find_by_id(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_by_id_then_absent() {
    let (_service, dao) = setup().await;
    let entity = track("gone soon", 1, 5);
    let id = entity.id;
    dao.save(entity).await.unwrap();

    dao.delete_by_id(id).await.unwrap();
    assert!(dao.find_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_entity_then_absent() {
    let (_service, dao) = setup().await;
    let entity = track("doomed", 1, 5);
    let id = entity.id;
    let entity = dao.save(entity).await.unwrap();

    dao.delete(&entity).await.unwrap();
    assert!(dao.find_by_id(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_count_by_matches_find_by() {
    let (_service, dao) = setup().await;
    dao.save_all(vec![
        track("a", 5, 40),
        track("b", 10, 30),
        track("c", 20, 20),
        track("d", 30, 10),
    ])
    .await
    .unwrap();

    let matches = dao.find_by("plays >", params![9]).await.unwrap();
    let count = dao.count_by("plays >", params![9]).await.unwrap();
    assert_eq!(count, matches.len() as i64);
    assert_eq!(count, 3);
}

#[tokio::test]
async fn test_find_one_by() {
    let (_service, dao) = setup().await;
    dao.save(track("only", 7, 1)).await.unwrap();

    let hit = dao.find_one_by("title", params!["only"]).await.unwrap();
    assert_eq!(hit.unwrap().plays, 7);
    let miss = dao.find_one_by("title", params!["nope"]).await.unwrap();
    assert!(miss.is_none());
}

#[tokio::test]
async fn test_find_latest_and_last_modified() {
    let (_service, dao) = setup().await;
    let oldest = track("oldest", 1, 30);
    let middle = track("middle", 2, 20);
    let newest = track("newest", 3, 10);
    dao.save_all(vec![oldest, newest.clone(), middle]).await.unwrap();

    let latest = dao.find_latest().await.unwrap().unwrap();
    assert_eq!(latest.id, newest.id);

    let last_modified = dao.find_last_modified().await.unwrap().unwrap();
    assert_eq!(last_modified.id, newest.id);
}

#[tokio::test]
async fn test_find_latest_breaks_ties_by_id() {
    let (_service, dao) = setup().await;
    let mut a = track("tie-a", 1, 10);
    let b = track("tie-b", 2, 10);
    a.created_at = b.created_at;
    let winner = if a.id > b.id { a.id } else { b.id };
    dao.save_all(vec![a, b]).await.unwrap();

    let latest = dao.find_latest().await.unwrap().unwrap();
    assert_eq!(latest.id, winner);
}

#[tokio::test]
async fn test_find_latest_with_mixed_precision_timestamps() {
    let (_service, dao) = setup().await;
    // a whole-second timestamp serializes without subsecond digits; it
    // must still sort before a subsecond timestamp in the same second
    let whole: DateTime<Utc> = "2024-06-01T12:00:00Z".parse().unwrap();
    let mut earlier = track("earlier", 1, 0);
    earlier.created_at = whole;
    earlier.updated_at = whole;
    let mut later = track("later", 2, 0);
    later.created_at = whole + Duration::milliseconds(500);
    later.updated_at = later.created_at;
    let later_id = later.id;
    dao.save_all(vec![earlier, later]).await.unwrap();

    let latest = dao.find_latest().await.unwrap().unwrap();
    assert_eq!(latest.id, later_id);
    let last_modified = dao.find_last_modified().await.unwrap().unwrap();
    assert_eq!(last_modified.id, later_id);
}

#[tokio::test]
async fn test_find_latest_unsupported_without_created_column() {
    let (service, _dao) = setup().await;
    let dao = Dao::<Plain>::with_service(service);
    let err = dao.find_latest().await.unwrap_err();
    assert!(err.is_unsupported());
}

#[tokio::test]
async fn test_save_all_45_in_order() {
    let (_service, dao) = setup().await;
    let entities: Vec<Track> = (0..45)
        .map(|i| track(&format!("bulk-{i:02}"), i, 45 - i))
        .collect();
    let expected: Vec<Uuid> = entities.iter().map(|e| e.id).collect();

    let saved = dao.save_all(entities).await.unwrap();
    assert_eq!(saved.len(), 45);
    let actual: Vec<Uuid> = saved.iter().map(|e| e.id).collect();
    assert_eq!(actual, expected);

    assert_eq!(dao.count_by("", params![]).await.unwrap(), 45);
}

#[tokio::test]
async fn test_save_upserts_managed_entity() {
    let (_service, dao) = setup().await;
    let entity = track("original", 1, 5);
    let id = entity.id;
    let mut entity = dao.save(entity).await.unwrap();

    entity.title = "revised".to_string();
    dao.save(entity).await.unwrap();

    let found = dao.find_by_id(id).await.unwrap().unwrap();
    assert_eq!(found.title, "revised");
    assert_eq!(dao.count_by("", params![]).await.unwrap(), 1);
}

#[tokio::test]
async fn test_save_fields_partial_update() {
    let (_service, dao) = setup().await;
    let entity = track("partial", 1, 5);
    let entity = dao.save(entity).await.unwrap();

    dao.save_fields(&entity, "title, plays", params!["renamed", 99])
        .await
        .unwrap();

    let found = dao.find_by_id(entity.id).await.unwrap().unwrap();
    assert_eq!(found.title, "renamed");
    assert_eq!(found.plays, 99);
    assert_eq!(found.created_at, entity.created_at);
}

#[tokio::test]
async fn test_find_by_id_list() {
    let (_service, dao) = setup().await;
    let a = track("a", 1, 3);
    let b = track("b", 2, 2);
    let c = track("c", 3, 1);
    dao.save_all(vec![a.clone(), b.clone(), c]).await.unwrap();

    let found = dao.find_by_id_list(&[a.id, b.id]).await.unwrap();
    assert_eq!(found.len(), 2);

    let none = dao.find_by_id_list(&[]).await.unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn test_reload_sees_out_of_band_change() {
    let (service, dao) = setup().await;
    let entity = track("stale", 1, 5);
    let entity = dao.save(entity).await.unwrap();
    // force the pending insert out
    dao.find_by_id(entity.id).await.unwrap();

    sqlx::query("UPDATE tracks SET plays = 777 WHERE id = ?")
        .bind(entity.id.to_string())
        .execute(service.pool().inner())
        .await
        .unwrap();

    let reloaded = dao.reload(&entity).await.unwrap();
    assert_eq!(reloaded.plays, 777);
}

#[tokio::test]
async fn test_reload_detached_entity_fails() {
    let (_service, dao) = setup().await;
    let never_saved = track("ghost", 0, 1);
    let err = dao.reload(&never_saved).await.unwrap_err();
    assert!(matches!(err, SteleError::Detached(_)));
}

#[tokio::test]
async fn test_failed_flush_keeps_unapplied_tail() {
    let (_service, dao) = setup().await;
    let bad = track("bad", -1, 2);
    let good = track("good", 1, 1);
    dao.save(bad).await.unwrap();
    let good = dao.save(good).await.unwrap();

    // the first insert violates the check constraint and fails the flush
    let err = dao.count_by("", params![]).await.unwrap_err();
    assert!(matches!(err, SteleError::Database(_)));

    // the insert queued behind it survives and applies on the next flush
    assert_eq!(dao.count_by("", params![]).await.unwrap(), 1);
    assert!(dao.find_by_id(good.id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_delete_by_expression() {
    let (_service, dao) = setup().await;
    dao.save_all(vec![track("low", 5, 2), track("high", 50, 1)])
        .await
        .unwrap();

    dao.delete_by("plays <", params![10]).await.unwrap();
    let remaining = dao.find_by("", params![]).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "high");
}

#[tokio::test]
async fn test_delete_all_and_drop_all() {
    let (_service, dao) = setup().await;
    dao.save_all(vec![track("x", 1, 2), track("y", 2, 1)])
        .await
        .unwrap();
    dao.delete_all().await.unwrap();
    assert_eq!(dao.count_by("", params![]).await.unwrap(), 0);

    dao.save(track("z", 3, 1)).await.unwrap();
    dao.drop_all().await.unwrap();
    assert_eq!(dao.count_by("", params![]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_update_rejected_from_q_but_not_from_constructor() {
    let (_service, dao) = setup().await;
    dao.save_all(vec![track("a", 1, 2), track("b", 2, 1)])
        .await
        .unwrap();

    let err = dao
        .q_of(QueryKind::Update, "", params![0])
        .await
        .unwrap_err();
    assert!(err.is_unsupported());

    let update = dao
        .create_update_query("plays", "", params![0])
        .await
        .unwrap();
    assert_eq!(update.execute_update().await.unwrap(), 2);
    assert_eq!(dao.count_by("plays", params![0]).await.unwrap(), 2);
}

#[tokio::test]
async fn test_delete_shaped_query_from_find() {
    let (_service, dao) = setup().await;
    dao.save_all(vec![track("keep", 100, 2), track("drop", 1, 1)])
        .await
        .unwrap();

    let query = dao.q_expr("plays <=", params![1]).await.unwrap();
    dao.delete_query(query).await.unwrap();

    let remaining = dao.find_by("", params![]).await.unwrap();
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].title, "keep");
}

#[tokio::test]
async fn test_column_subset_query_returns_records() {
    let (_service, dao) = setup().await;
    dao.save(track("thin", 4, 1)).await.unwrap();

    let query = dao
        .create_find_query_with_fields("id, title", "", params![])
        .await
        .unwrap();
    let records = query.fetch_records().await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].len(), 2);
    assert_eq!(
        records[0].get("title"),
        Some(&Value::Text("thin".to_string()))
    );
    assert!(records[0].get("plays").is_none());
}

#[tokio::test]
async fn test_order_and_limit() {
    let (_service, dao) = setup().await;
    dao.save_all(vec![
        track("three", 3, 3),
        track("one", 1, 2),
        track("two", 2, 1),
    ])
    .await
    .unwrap();

    let ordered = dao.q().await.unwrap().order_by("plays").limit(2);
    let rows = ordered.fetch().await.unwrap();
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].plays, 1);
    assert_eq!(rows[1].plays, 2);
}

#[tokio::test]
async fn test_membership_expression_in_find_by() {
    let (_service, dao) = setup().await;
    dao.save_all(vec![track("a", 1, 3), track("b", 2, 2), track("c", 3, 1)])
        .await
        .unwrap();

    let found = dao
        .find_by("plays in", vec![Value::list([1i64, 3])])
        .await
        .unwrap();
    assert_eq!(found.len(), 2);
}
