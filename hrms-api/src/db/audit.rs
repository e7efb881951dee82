//! Security audit trail

use hrms_common::time::now_rfc3339;
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::warn;
use uuid::Uuid;

/// Audit actions
pub mod action {
    pub const USER_REGISTERED: &str = "USER_REGISTERED";
    pub const LOGIN_SUCCESS: &str = "LOGIN_SUCCESS";
    pub const LOGIN_FAILED: &str = "LOGIN_FAILED";
    pub const ACCOUNT_LOCKED: &str = "ACCOUNT_LOCKED";
    pub const EMAIL_VERIFIED: &str = "EMAIL_VERIFIED";
    pub const PASSWORD_RESET: &str = "PASSWORD_RESET";
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: String,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub action: String,
    #[sqlx(json)]
    pub details: Value,
    pub created_at: String,
}

pub async fn record(
    db: &SqlitePool,
    user_id: Option<&str>,
    action: &str,
    details: Value,
) -> sqlx::Result<()> {
    sqlx::query(
        "INSERT INTO audit_log (id, user_id, action, details, created_at) VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(action)
    .bind(details.to_string())
    .bind(now_rfc3339())
    .execute(db)
    .await?;

    Ok(())
}

/// Record an audit entry; a failure is logged and otherwise ignored
pub async fn record_quietly(db: &SqlitePool, user_id: Option<&str>, action: &str, details: Value) {
    if let Err(e) = record(db, user_id, action, details).await {
        warn!("Failed to write audit entry {}: {}", action, e);
    }
}

/// Most recent entries first
pub async fn recent(db: &SqlitePool, limit: i64) -> sqlx::Result<Vec<AuditEntry>> {
    sqlx::query_as::<_, AuditEntry>(
        r#"
        SELECT a.id, a.user_id, u.name AS user_name, a.action,
               COALESCE(a.details, 'null') AS details, a.created_at
        FROM audit_log a
        LEFT JOIN users u ON u.id = a.user_id
        ORDER BY a.created_at DESC
        LIMIT ?
        "#,
    )
    .bind(limit)
    .fetch_all(db)
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrms_common::db::init_memory_database;
    use serde_json::json;

    #[tokio::test]
    async fn test_record_without_user() {
        let db = init_memory_database().await.unwrap();
        record(&db, None, action::LOGIN_FAILED, json!({"email": "x@example.com"}))
            .await
            .unwrap();

        let entries = recent(&db, 10).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].action, "LOGIN_FAILED");
        assert_eq!(entries[0].details["email"], "x@example.com");
        assert!(entries[0].user_name.is_none());
    }
}
