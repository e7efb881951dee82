//! In-app notifications, badge counts and the live notification stream

use crate::api::{clamp_limit, ApiQuery, CurrentUser};
use crate::error::{success, success_with};
use crate::services::notifier::NOTIFICATION_CATEGORIES;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    response::sse::{Event, KeepAlive, Sse},
    routing::{delete, get, put},
    Json, Router,
};
use chrono::Duration as ChronoDuration;
use futures::stream::Stream;
use hrms_common::events::{HrmsEvent, Notification};
use hrms_common::roles::Role;
use hrms_common::time::{format_date, format_timestamp, is_weekend, now, today};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::convert::Infallible;
use std::time::Duration;
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, info, warn};

const DEFAULT_NOTIFICATION_LIMIT: i64 = 50;
const RETAIN_READ_DAYS: i64 = 30;

pub fn notification_routes() -> Router<AppState> {
    Router::new()
        .route("/api/notifications", get(list_notifications))
        .route("/api/notifications/unread-count", get(unread_count))
        .route("/api/notifications/counts-by-category", get(counts_by_category))
        .route("/api/notifications/stream", get(notification_stream))
        .route("/api/notifications/read-all", put(mark_all_read))
        .route("/api/notifications/old", delete(delete_old))
        .route("/api/notifications/:id/read", put(mark_read))
        .route("/api/notifications/:id", delete(delete_notification))
        .route("/api/notification-counts", get(section_counts))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct NotificationQuery {
    pub limit: Option<i64>,
    #[serde(alias = "unreadOnly")]
    pub unread_only: bool,
}

/// GET /api/notifications
pub async fn list_notifications(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<NotificationQuery>,
) -> ApiResult<Json<Value>> {
    let sql = if query.unread_only {
        "SELECT * FROM notifications WHERE user_id = ? AND is_read = 0 ORDER BY created_at DESC LIMIT ?"
    } else {
        "SELECT * FROM notifications WHERE user_id = ? ORDER BY created_at DESC LIMIT ?"
    };
    let notifications = sqlx::query_as::<_, Notification>(sql)
        .bind(&current.id)
        .bind(clamp_limit(query.limit, DEFAULT_NOTIFICATION_LIMIT))
        .fetch_all(&state.db)
        .await?;
    Ok(success(notifications))
}

async fn count_unread(db: &SqlitePool, user_id: &str) -> sqlx::Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0")
        .bind(user_id)
        .fetch_one(db)
        .await
}

/// GET /api/notifications/unread-count
pub async fn unread_count(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let count = count_unread(&state.db, &current.id).await?;
    Ok(success(json!({ "count": count })))
}

/// GET /api/notifications/counts-by-category
///
/// Every category is present, zero when it has nothing unread.
pub async fn counts_by_category(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Value>> {
    let rows: Vec<(String, i64)> = sqlx::query_as(
        "SELECT category, COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0 GROUP BY category",
    )
    .bind(&current.id)
    .fetch_all(&state.db)
    .await?;

    let mut counts: BTreeMap<String, i64> = NOTIFICATION_CATEGORIES.iter().map(|c| (c.to_string(), 0)).collect();
    counts.extend(rows);
    Ok(success(counts))
}

/// PUT /api/notifications/:id/read
pub async fn mark_read(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&current.id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }

    state.event_bus.emit_lossy(HrmsEvent::NotificationsRead {
        user_id: current.id.clone(),
        count: 1,
        timestamp: now(),
    });
    Ok(success_with("Notification marked as read", Value::Null))
}

/// PUT /api/notifications/read-all
pub async fn mark_all_read(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let result = sqlx::query("UPDATE notifications SET is_read = 1 WHERE user_id = ? AND is_read = 0")
        .bind(&current.id)
        .execute(&state.db)
        .await?;
    let count = result.rows_affected();

    if count > 0 {
        state.event_bus.emit_lossy(HrmsEvent::NotificationsRead {
            user_id: current.id.clone(),
            count,
            timestamp: now(),
        });
    }
    Ok(success_with(
        "All notifications marked as read",
        json!({ "updated": count }),
    ))
}

/// DELETE /api/notifications/:id
pub async fn delete_notification(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let result = sqlx::query("DELETE FROM notifications WHERE id = ? AND user_id = ?")
        .bind(&id)
        .bind(&current.id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Notification not found"));
    }
    Ok(success_with("Notification deleted", Value::Null))
}

/// DELETE /api/notifications/old
///
/// Removes the caller's read notifications older than 30 days.
pub async fn delete_old(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let cutoff = format_timestamp(now() - ChronoDuration::days(RETAIN_READ_DAYS));
    let result = sqlx::query("DELETE FROM notifications WHERE user_id = ? AND is_read = 1 AND created_at < ?")
        .bind(&current.id)
        .bind(&cutoff)
        .execute(&state.db)
        .await?;

    info!(
        "Deleted {} old notifications for {}",
        result.rows_affected(),
        current.id
    );
    Ok(success_with(
        "Old notifications deleted",
        json!({ "deleted": result.rows_affected() }),
    ))
}

/// GET /api/notifications/stream
///
/// Server-sent events carrying the caller's new notifications and read
/// receipts. Browsers cannot set headers on `EventSource`, so the session
/// token may also arrive as `?token=`.
pub async fn notification_stream(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    info!("Notification stream opened for {}", current.id);

    let mut rx = state.event_bus.subscribe();
    let user_id = current.id;

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("ConnectionStatus").data("connected"));

        loop {
            match rx.recv().await {
                Ok(event) if event.user_id() == Some(user_id.as_str()) => {
                    match serde_json::to_string(&event) {
                        Ok(json) => {
                            debug!("SSE {} -> {}", event.event_type(), user_id);
                            yield Ok(Event::default().event(event.event_type()).data(json));
                        }
                        Err(e) => warn!("Failed to serialize event: {}", e),
                    }
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Notification stream for {} skipped {} events", user_id, skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("keep-alive"),
    )
}

/// Badge counts for the navigation sections
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SectionCounts {
    pub payroll: i64,
    pub performance: i64,
    pub leaves: i64,
    pub attendance: i64,
    pub applications: i64,
    pub interviews: i64,
    pub users: i64,
}

async fn scalar(db: &SqlitePool, sql: &str, binds: &[&str]) -> sqlx::Result<i64> {
    let mut query = sqlx::query_scalar::<_, i64>(sql);
    for value in binds {
        query = query.bind(*value);
    }
    query.fetch_one(db).await
}

/// Compute the section badges for `current` on `date`
pub async fn compute_section_counts(
    db: &SqlitePool,
    current: &CurrentUser,
    date: chrono::NaiveDate,
) -> sqlx::Result<SectionCounts> {
    let day = format_date(date);
    let management = current.is_management();
    let mut counts = SectionCounts::default();

    if current.is_admin_or_hr() {
        counts.payroll = scalar(db, "SELECT COUNT(*) FROM payroll WHERE status = 'draft'", &[]).await?;
        counts.applications =
            scalar(db, "SELECT COUNT(*) FROM applications WHERE status = 'pending'", &[]).await?;
    }

    if management {
        counts.performance = scalar(
            db,
            "SELECT COUNT(*) FROM performance_reviews WHERE status IN ('draft', 'submitted')",
            &[],
        )
        .await?;
        counts.leaves = scalar(db, "SELECT COUNT(*) FROM leaves WHERE status = 'pending'", &[]).await?;
        counts.interviews = scalar(
            db,
            "SELECT COUNT(*) FROM applications WHERE interview_status = 'scheduled' AND interview_date >= ?",
            &[day.as_str()],
        )
        .await?;
    } else {
        counts.leaves = scalar(
            db,
            "SELECT COUNT(*) FROM leaves WHERE status = 'pending' AND user_id = ?",
            &[current.id.as_str()],
        )
        .await?;
    }

    if !is_weekend(date) {
        counts.attendance = if management {
            scalar(
                db,
                "SELECT COUNT(*) FROM users u
                 WHERE u.is_active = 1 AND u.role != 'candidate'
                   AND NOT EXISTS (SELECT 1 FROM attendance a WHERE a.user_id = u.id AND a.date = ?)",
                &[day.as_str()],
            )
            .await?
        } else {
            let marked = scalar(
                db,
                "SELECT COUNT(*) FROM attendance WHERE user_id = ? AND date = ?",
                &[current.id.as_str(), day.as_str()],
            )
            .await?;
            i64::from(marked == 0)
        };
    }

    if current.role == Role::Admin {
        counts.users = scalar(db, "SELECT COUNT(*) FROM users WHERE is_active = 0", &[]).await?;
    }

    Ok(counts)
}

/// GET /api/notification-counts
pub async fn section_counts(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let counts = compute_section_counts(&state.db, &current, today()).await?;
    Ok(success(counts))
}
