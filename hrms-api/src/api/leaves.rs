//! Leave requests and approvals

use crate::api::{clamp_limit, ApiJson, ApiQuery, CurrentUser, DEFAULT_LIMIT};
use crate::db::users;
use crate::error::{created, success, success_with};
use crate::services::notifier::NewNotification;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hrms_common::leave::{check_approval, ApprovalDenied, LeaveStats, LeaveSummaryRow, LEAVE_TYPES};
use hrms_common::roles::Role;
use hrms_common::time::{format_date, now_rfc3339, parse_date};
use hrms_common::validation::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

pub fn leave_routes() -> Router<AppState> {
    Router::new()
        .route("/api/leaves", get(list_leaves).post(create_leave))
        .route("/api/leaves/pending", get(pending_leaves))
        .route("/api/leaves/stats", get(leave_stats))
        .route("/api/leaves/user/:user_id", get(user_leaves))
        .route(
            "/api/leaves/:id",
            get(get_leave).put(decide_leave).delete(delete_leave),
        )
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct LeaveRequest {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_role: Option<String>,
    pub department: Option<String>,
    pub leave_type: String,
    pub start_date: String,
    pub end_date: String,
    pub days: i64,
    pub reason: Option<String>,
    pub status: String,
    pub approved_by: Option<String>,
    pub approver_name: Option<String>,
    pub approved_at: Option<String>,
    pub rejection_reason: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateLeaveRequest {
    #[serde(alias = "leaveType")]
    pub leave_type: String,
    #[serde(alias = "startDate")]
    pub start_date: String,
    #[serde(alias = "endDate")]
    pub end_date: String,
    pub reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DecideLeaveRequest {
    pub status: String,
    #[serde(alias = "rejectionReason")]
    pub rejection_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LeaveListQuery {
    pub status: Option<String>,
    pub limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LeaveStatsQuery {
    pub year: Option<i32>,
    #[serde(alias = "user_id")]
    pub user_id: Option<String>,
}

const SELECT_LEAVE: &str = r#"
    SELECT l.id, l.user_id, u.name AS user_name, u.role AS user_role, u.department,
           l.leave_type, l.start_date, l.end_date,
           CAST(julianday(l.end_date) - julianday(l.start_date) + 1 AS INTEGER) AS days,
           l.reason, l.status, l.approved_by, a.name AS approver_name, l.approved_at,
           l.rejection_reason, l.created_at, l.updated_at
    FROM leaves l
    JOIN users u ON u.id = l.user_id
    LEFT JOIN users a ON a.id = l.approved_by
"#;

#[derive(Debug, Default)]
struct LeaveFilter {
    user_id: Option<String>,
    status: Option<String>,
    /// Only requests filed by employees and managers
    manager_view: bool,
}

async fn query_leaves(db: &SqlitePool, filter: &LeaveFilter, limit: i64) -> sqlx::Result<Vec<LeaveRequest>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_LEAVE);
    qb.push(" WHERE 1 = 1");
    if let Some(user_id) = &filter.user_id {
        qb.push(" AND l.user_id = ").push_bind(user_id.clone());
    }
    if let Some(status) = &filter.status {
        qb.push(" AND l.status = ").push_bind(status.clone());
    }
    if filter.manager_view {
        qb.push(" AND u.role IN ('employee', 'manager')");
    }
    qb.push(" ORDER BY l.created_at DESC LIMIT ").push_bind(limit);
    qb.build_query_as::<LeaveRequest>().fetch_all(db).await
}

async fn find_leave(db: &SqlitePool, id: &str) -> ApiResult<LeaveRequest> {
    sqlx::query_as::<_, LeaveRequest>(&format!("{} WHERE l.id = ?", SELECT_LEAVE))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Leave request not found"))
}

fn management_only(current: &CurrentUser) -> ApiResult<()> {
    crate::api::require_role(current, &[Role::Admin, Role::Hr, Role::Manager])
}

/// POST /api/leaves
pub async fn create_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateLeaveRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut v = Validator::new();
    v.one_of("leave_type", &req.leave_type, &LEAVE_TYPES);
    let start = v.date("start_date", &req.start_date);
    let end = v.date("end_date", &req.end_date);
    if let (Some(start), Some(end)) = (start, end) {
        v.check(
            end >= start,
            "end_date",
            "\"end_date\" must be on or after \"start_date\"",
        );
    }
    v.finish()?;
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ApiError::bad_request("Invalid leave dates"));
    };

    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO leaves (id, user_id, leave_type, start_date, end_date, reason, status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&id)
    .bind(&current.id)
    .bind(&req.leave_type)
    .bind(format_date(start))
    .bind(format_date(end))
    .bind(&req.reason)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    let content = NewNotification::new(
        "leave",
        "New Leave Request",
        format!(
            "{} requested {} leave from {} to {}",
            current.name,
            req.leave_type,
            format_date(start),
            format_date(end)
        ),
    )
    .link("/leaves");
    state
        .notifier()
        .notify_roles(&[Role::Admin, Role::Hr, Role::Manager], Some(&current.id), &content)
        .await;

    Ok(created(
        "Leave request submitted successfully",
        find_leave(&state.db, &id).await?,
    ))
}

/// GET /api/leaves
pub async fn list_leaves(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<LeaveListQuery>,
) -> ApiResult<Json<Value>> {
    management_only(&current)?;
    let filter = LeaveFilter {
        status: query.status,
        manager_view: current.role == Role::Manager,
        ..Default::default()
    };
    let found = query_leaves(&state.db, &filter, clamp_limit(query.limit, DEFAULT_LIMIT)).await?;
    Ok(success(found))
}

/// GET /api/leaves/pending
pub async fn pending_leaves(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<LeaveListQuery>,
) -> ApiResult<Json<Value>> {
    management_only(&current)?;
    let filter = LeaveFilter {
        status: Some("pending".to_string()),
        manager_view: current.role == Role::Manager,
        ..Default::default()
    };
    let found = query_leaves(&state.db, &filter, clamp_limit(query.limit, DEFAULT_LIMIT)).await?;
    Ok(success(found))
}

/// GET /api/leaves/user/:user_id
pub async fn user_leaves(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<LeaveListQuery>,
) -> ApiResult<Json<Value>> {
    if current.id != user_id && !current.is_management() {
        return Err(ApiError::forbidden("Not authorized to view these leave requests"));
    }
    let filter = LeaveFilter {
        user_id: Some(user_id),
        status: query.status,
        ..Default::default()
    };
    let found = query_leaves(&state.db, &filter, clamp_limit(query.limit, DEFAULT_LIMIT)).await?;
    Ok(success(found))
}

/// GET /api/leaves/:id
pub async fn get_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let leave = find_leave(&state.db, &id).await?;
    if leave.user_id != current.id && !current.is_management() {
        return Err(ApiError::forbidden("Not authorized to view this leave request"));
    }
    Ok(success(leave))
}

/// PUT /api/leaves/:id
///
/// Approve or reject a pending request.
pub async fn decide_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DecideLeaveRequest>,
) -> ApiResult<Json<Value>> {
    management_only(&current)?;

    let mut v = Validator::new();
    v.one_of("status", &req.status, &["approved", "rejected"]);
    v.finish()?;

    let leave = find_leave(&state.db, &id).await?;
    if leave.status != "pending" {
        return Err(ApiError::bad_request(format!(
            "Leave request has already been {}",
            leave.status
        )));
    }

    let requester = users::find_by_id(&state.db, &leave.user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    check_approval(&current.id, current.role, &requester.id, requester.role).map_err(|denied| {
        ApiError::forbidden(match denied {
            ApprovalDenied::SelfApproval => "You cannot approve or reject your own leave request",
            ApprovalDenied::AboveManager => "Managers cannot approve or reject HR or admin leave requests",
            ApprovalDenied::NotManagement => "Not authorized to approve leave requests",
        })
    })?;

    let rejection_reason = if req.status == "rejected" {
        req.rejection_reason
    } else {
        None
    };
    let now = now_rfc3339();
    let decided = sqlx::query(
        "UPDATE leaves SET status = ?, approved_by = ?, approved_at = ?, rejection_reason = ?, updated_at = ?
         WHERE id = ? AND status = 'pending'",
    )
    .bind(&req.status)
    .bind(&current.id)
    .bind(&now)
    .bind(&rejection_reason)
    .bind(&now)
    .bind(&id)
    .execute(&state.db)
    .await?
    .rows_affected();
    // Another reviewer decided it in the meantime
    if decided == 0 {
        let current_status = find_leave(&state.db, &id).await?.status;
        return Err(ApiError::bad_request(format!(
            "Leave request has already been {}",
            current_status
        )));
    }

    let (kind, message) = if req.status == "approved" {
        (
            "success",
            format!(
                "Your {} leave from {} to {} has been approved",
                leave.leave_type, leave.start_date, leave.end_date
            ),
        )
    } else {
        let mut message = format!(
            "Your {} leave from {} to {} has been rejected",
            leave.leave_type, leave.start_date, leave.end_date
        );
        if let Some(reason) = &rejection_reason {
            message.push_str(&format!(": {}", reason));
        }
        ("warning", message)
    };
    let title = if req.status == "approved" {
        "Leave Approved"
    } else {
        "Leave Rejected"
    };
    state
        .notifier()
        .notify_quietly(
            &leave.user_id,
            &NewNotification::new("leave", title, message).kind(kind).link("/leaves"),
        )
        .await;

    Ok(success_with(
        &format!("Leave request {}", req.status),
        find_leave(&state.db, &id).await?,
    ))
}

/// DELETE /api/leaves/:id
pub async fn delete_leave(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let leave = find_leave(&state.db, &id).await?;

    if current.role != Role::Admin {
        if leave.user_id != current.id {
            return Err(ApiError::forbidden("Not authorized to delete this leave request"));
        }
        if leave.status != "pending" {
            return Err(ApiError::bad_request(
                "Only pending leave requests can be deleted",
            ));
        }
    }

    sqlx::query("DELETE FROM leaves WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    Ok(success_with("Leave request deleted successfully", Value::Null))
}

/// GET /api/leaves/stats
pub async fn leave_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<LeaveStatsQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = if current.is_management() {
        query.user_id
    } else {
        Some(current.id.clone())
    };

    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT leave_type, status, start_date, end_date FROM leaves WHERE 1 = 1");
    if let Some(user_id) = user_id {
        qb.push(" AND user_id = ").push_bind(user_id);
    }
    if let Some(year) = query.year {
        qb.push(" AND strftime('%Y', start_date) = ")
            .push_bind(format!("{:04}", year));
    }

    let rows: Vec<(String, String, String, String)> = qb.build_query_as().fetch_all(&state.db).await?;
    let rows: Vec<LeaveSummaryRow> = rows
        .into_iter()
        .filter_map(|(leave_type, status, start, end)| {
            Some(LeaveSummaryRow {
                leave_type,
                status,
                start_date: parse_date(&start).ok()?,
                end_date: parse_date(&end).ok()?,
            })
        })
        .collect();

    Ok(success(LeaveStats::from_rows(&rows)))
}
