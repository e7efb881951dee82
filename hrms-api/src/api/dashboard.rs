//! Role-scoped dashboard summary

use crate::api::CurrentUser;
use crate::db::{attendance as records, users};
use crate::error::success;
use crate::{ApiResult, AppState};
use axum::{extract::State, routing::get, Json, Router};
use chrono::{Datelike, NaiveDate};
use hrms_common::attendance::user_stats;
use hrms_common::roles::Role;
use hrms_common::time::{format_date, month_bounds, parse_date, today, working_days};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use std::collections::BTreeMap;

pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/api/dashboard/stats", get(dashboard_stats))
}

/// GET /api/dashboard/stats
pub async fn dashboard_stats(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let date = today();
    let summary = match current.role {
        Role::Admin | Role::Hr => organisation_summary(&state.db, date).await?,
        Role::Manager => team_summary(&state.db, &current, date).await?,
        _ => personal_summary(&state.db, &current, date).await?,
    };
    Ok(success(summary))
}

async fn organisation_summary(db: &SqlitePool, date: NaiveDate) -> ApiResult<Value> {
    let (total_users, active_users): (i64, i64) =
        sqlx::query_as("SELECT COUNT(*), COALESCE(SUM(is_active), 0) FROM users")
            .fetch_one(db)
            .await?;
    let by_role: BTreeMap<String, i64> = users::count_by_role(db).await?.into_iter().collect();

    let open_jobs: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM jobs WHERE status = 'open' AND is_deleted = 0")
            .fetch_one(db)
            .await?;
    let pending_leaves: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM leaves WHERE status = 'pending'")
        .fetch_one(db)
        .await?;
    let pending_applications: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM applications WHERE status = 'pending'")
            .fetch_one(db)
            .await?;
    let present_today: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance WHERE date = ? AND status IN ('present', 'late')",
    )
    .bind(format_date(date))
    .fetch_one(db)
    .await?;

    Ok(json!({
        "totalUsers": total_users,
        "activeUsers": active_users,
        "usersByRole": by_role,
        "openJobs": open_jobs,
        "pendingLeaves": pending_leaves,
        "pendingApplications": pending_applications,
        "presentToday": present_today,
    }))
}

/// Active staff sharing the manager's department
async fn team_summary(db: &SqlitePool, current: &CurrentUser, date: NaiveDate) -> ApiResult<Value> {
    let team_size: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM users
         WHERE department IS ? AND is_active = 1 AND role != 'candidate' AND id != ?",
    )
    .bind(&current.department)
    .bind(&current.id)
    .fetch_one(db)
    .await?;

    let team_present_today: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM attendance a JOIN users u ON u.id = a.user_id
         WHERE u.department IS ? AND u.id != ? AND a.date = ? AND a.status IN ('present', 'late')",
    )
    .bind(&current.department)
    .bind(&current.id)
    .bind(format_date(date))
    .fetch_one(db)
    .await?;

    let pending_team_leaves: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM leaves l JOIN users u ON u.id = l.user_id
         WHERE u.department IS ? AND u.id != ? AND l.status = 'pending'",
    )
    .bind(&current.department)
    .bind(&current.id)
    .fetch_one(db)
    .await?;

    Ok(json!({
        "department": current.department,
        "teamSize": team_size,
        "teamPresentToday": team_present_today,
        "pendingTeamLeaves": pending_team_leaves,
    }))
}

async fn personal_summary(db: &SqlitePool, current: &CurrentUser, date: NaiveDate) -> ApiResult<Value> {
    let (month_start, month_end) = month_bounds(date.year(), date.month())?;
    let joined = users::find_by_id(db, &current.id)
        .await?
        .and_then(|u| u.start_date)
        .and_then(|s| parse_date(&s).ok());
    let days = working_days(month_start, month_end, joined, date);
    let found = records::day_records(db, Some(&current.id), month_start, month_end).await?;
    let stats = user_stats(&found, &days);

    let pending_leaves: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM leaves WHERE user_id = ? AND status = 'pending'")
            .bind(&current.id)
            .fetch_one(db)
            .await?;
    let unread_notifications: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM notifications WHERE user_id = ? AND is_read = 0")
            .bind(&current.id)
            .fetch_one(db)
            .await?;

    Ok(json!({
        "attendancePercentage": stats.attendance_percentage,
        "presentDays": stats.present_days,
        "workingDays": stats.working_days_count,
        "pendingLeaves": pending_leaves,
        "unreadNotifications": unread_notifications,
    }))
}
