//! Integration tests for migrations and pool helpers.

use sqlx::Row;

use fitplan_db::config::DbConfig;
use fitplan_db::pool;
use fitplan_test_utils::{create_test_db, drop_test_db};

#[tokio::test]
async fn migrations_create_saved_plans_table() {
    let db = create_test_db().await;

    let columns: Vec<String> = sqlx::query(
        "SELECT column_name::text FROM information_schema.columns \
         WHERE table_name = 'saved_plans' ORDER BY ordinal_position",
    )
    .fetch_all(&db.pool)
    .await
    .unwrap()
    .iter()
    .map(|r| r.get::<String, _>(0))
    .collect();

    assert_eq!(
        columns,
        vec!["id", "app_id", "user_id", "name", "goal", "level", "plan", "created_at"]
    );

    db.teardown().await;
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let db = create_test_db().await;

    pool::run_migrations(&db.pool)
        .await
        .expect("re-running migrations should be a no-op");

    db.teardown().await;
}

#[tokio::test]
async fn schema_status_reports_version_and_plan_count() {
    let db = create_test_db().await;

    let status = pool::schema_status(&db.pool).await.unwrap();
    assert!(status.is_current(), "{status:?}");
    let (version, description) = status.applied.expect("a migration is applied");
    assert_eq!(version, 20250601000000);
    assert_eq!(description, "saved plans");
    assert_eq!(status.saved_plans, 0);

    sqlx::query(
        "INSERT INTO saved_plans (app_id, user_id, name, goal, level, plan) \
         VALUES ('app', 'ana', 'n', 'g', 'l', '{}')",
    )
    .execute(&db.pool)
    .await
    .unwrap();
    assert_eq!(pool::schema_status(&db.pool).await.unwrap().saved_plans, 1);

    db.teardown().await;
}

#[tokio::test]
async fn ensure_database_creates_once() {
    let db = create_test_db().await;
    let fresh = format!("{}_extra", db.name);
    let url = format!("{}_extra", db.url);
    let config = DbConfig::new(url);

    assert!(pool::ensure_database(&config).await.unwrap());
    assert!(!pool::ensure_database(&config).await.unwrap());

    drop_test_db(&fresh).await;
    db.teardown().await;
}
