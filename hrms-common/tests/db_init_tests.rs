//! Database initialization
//!
//! Covers:
//! - creating a new database file and reopening it
//! - default settings, including NULL repair
//! - uniqueness and cascade constraints the handlers rely on

use hrms_common::db::{get_setting, init_database, init_memory_database};
use hrms_common::time::now_rfc3339;
use sqlx::SqlitePool;

async fn insert_user(pool: &SqlitePool, id: &str, email: &str) {
    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO users (id, name, email, password_hash, role, created_at, updated_at)
         VALUES (?, ?, ?, 'x', 'employee', ?, ?)",
    )
    .bind(id)
    .bind("Test User")
    .bind(email)
    .bind(&now)
    .bind(&now)
    .execute(pool)
    .await
    .unwrap();
}

#[tokio::test]
async fn test_database_created_when_missing() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("data").join("hrms.db");
    assert!(!db_path.exists());

    let pool = init_database(&db_path).await.unwrap();
    assert!(db_path.exists());

    let tables: Vec<String> =
        sqlx::query_scalar("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
            .fetch_all(&pool)
            .await
            .unwrap();
    for expected in [
        "applications",
        "attendance",
        "audit_log",
        "departments",
        "documents",
        "email_outbox",
        "email_verifications",
        "events",
        "jobs",
        "leaves",
        "notifications",
        "password_resets",
        "payroll",
        "payroll_history",
        "performance_reviews",
        "salary_structures",
        "settings",
        "users",
    ] {
        assert!(tables.iter().any(|t| t == expected), "missing table {}", expected);
    }
}

#[tokio::test]
async fn test_reopen_existing_database_keeps_data() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("hrms.db");

    let pool = init_database(&db_path).await.unwrap();
    insert_user(&pool, "u-1", "a@example.com").await;
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_null_setting_reset_on_startup() {
    let temp = tempfile::tempdir().unwrap();
    let db_path = temp.path().join("hrms.db");

    let pool = init_database(&db_path).await.unwrap();
    sqlx::query("UPDATE settings SET value = NULL WHERE key = 'lockout_minutes'")
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let pool = init_database(&db_path).await.unwrap();
    let minutes: Option<i64> = get_setting(&pool, "lockout_minutes").await.unwrap();
    assert_eq!(minutes, Some(30));
}

#[tokio::test]
async fn test_attendance_unique_per_day() {
    let pool = init_memory_database().await.unwrap();
    insert_user(&pool, "u-1", "a@example.com").await;

    let now = now_rfc3339();
    let insert = |id: &'static str| {
        sqlx::query(
            "INSERT INTO attendance (id, user_id, date, status, created_at, updated_at)
             VALUES (?, 'u-1', '2024-03-04', 'present', ?, ?)",
        )
        .bind(id)
        .bind(now.clone())
        .bind(now.clone())
    };

    insert("a-1").execute(&pool).await.unwrap();
    let err = insert("a-2").execute(&pool).await.unwrap_err();
    assert!(hrms_common::Error::from(err).is_unique_violation());
}

#[tokio::test]
async fn test_user_delete_cascades() {
    let pool = init_memory_database().await.unwrap();
    insert_user(&pool, "u-1", "a@example.com").await;

    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO notifications (id, user_id, title, message, created_at)
         VALUES ('n-1', 'u-1', 'Hello', 'World', ?)",
    )
    .bind(&now)
    .execute(&pool)
    .await
    .unwrap();

    sqlx::query("DELETE FROM users WHERE id = 'u-1'")
        .execute(&pool)
        .await
        .unwrap();

    let remaining: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM notifications")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(remaining, 0);
}
