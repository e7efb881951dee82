//! Attendance marking, check-in/out and statistics

use crate::api::{clamp_limit, clamp_offset, require_role, ApiJson, ApiQuery, CurrentUser, DEFAULT_LIMIT};
use crate::db::attendance::{self as records, AttendanceFields, AttendanceFilter};
use crate::db::users;
use crate::error::{created, success, success_with};
use crate::services::scheduler;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use chrono::{Datelike, NaiveDate, NaiveTime};
use hrms_common::attendance::{
    organisation_stats, user_stats, work_minutes, AttendanceStatus, ShiftPolicy,
};
use hrms_common::db::settings;
use hrms_common::roles::Role;
use hrms_common::time::{
    format_time, is_weekend, local_time, month_bounds, parse_date, parse_time, today, working_days,
};
use hrms_common::validation::Validator;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

pub fn attendance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/attendance", get(list_attendance).post(mark_attendance))
        .route("/api/attendance/check-in", post(check_in))
        .route("/api/attendance/check-out", post(check_out))
        .route("/api/attendance/today-status", get(today_status))
        .route("/api/attendance/stats", get(attendance_stats))
        .route("/api/attendance/auto-mark-absent", post(auto_mark_absent))
        .route("/api/attendance/user/:user_id", get(user_attendance))
        .route(
            "/api/attendance/:id",
            get(get_attendance)
                .put(update_attendance)
                .delete(delete_attendance),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct MarkAttendanceRequest {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    pub date: Option<String>,
    pub status: String,
    #[serde(alias = "checkInTime")]
    pub check_in_time: Option<String>,
    #[serde(alias = "checkOutTime")]
    pub check_out_time: Option<String>,
    #[serde(alias = "leaveType")]
    pub leave_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateAttendanceRequest {
    pub status: Option<String>,
    #[serde(alias = "checkInTime")]
    pub check_in_time: Option<String>,
    #[serde(alias = "checkOutTime")]
    pub check_out_time: Option<String>,
    #[serde(alias = "leaveType")]
    pub leave_type: Option<String>,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CheckRequest {
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AttendanceListQuery {
    #[serde(alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(alias = "end_date")]
    pub end_date: Option<String>,
    #[serde(alias = "user_id")]
    pub user_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StatsQuery {
    #[serde(alias = "user_id")]
    pub user_id: Option<String>,
    #[serde(alias = "start_date")]
    pub start_date: Option<String>,
    #[serde(alias = "end_date")]
    pub end_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AutoMarkQuery {
    pub date: Option<String>,
}

fn parse_optional_date(field: &str, value: Option<&str>) -> ApiResult<Option<NaiveDate>> {
    match value {
        Some(value) => {
            let mut v = Validator::new();
            let date = v.date(field, value);
            v.finish()?;
            Ok(date)
        }
        None => Ok(None),
    }
}

fn parse_optional_time(field: &str, value: Option<&str>) -> ApiResult<Option<NaiveTime>> {
    value
        .map(|t| {
            parse_time(t).map_err(|_| {
                ApiError::bad_request(format!("\"{}\" must be a valid time (HH:MM[:SS])", field))
            })
        })
        .transpose()
}

/// Lateness, work and overtime derived from the clock times
fn derive_times(
    policy: &ShiftPolicy,
    fields: &mut AttendanceFields,
    check_in: Option<NaiveTime>,
    check_out: Option<NaiveTime>,
) {
    fields.check_in_time = check_in.map(format_time);
    fields.check_out_time = check_out.map(format_time);

    fields.late_by_minutes = 0;
    fields.is_late = false;
    if let Some(check_in) = check_in {
        if let Some(late_by) = policy.late_by_minutes(check_in) {
            fields.is_late = true;
            fields.late_by_minutes = late_by;
        }
    }

    match (check_in, check_out) {
        (Some(check_in), Some(check_out)) => {
            fields.work_minutes = Some(work_minutes(check_in, check_out));
            fields.overtime_minutes = policy.overtime_minutes(check_in, check_out);
        }
        _ => {
            fields.work_minutes = None;
            fields.overtime_minutes = 0;
        }
    }
}

/// POST /api/attendance
///
/// Checks run in a fixed order: joining date, weekend, the today-only rule
/// for non admin/hr callers, then duplicates.
pub async fn mark_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<MarkAttendanceRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut v = Validator::new();
    v.one_of("status", &req.status, &AttendanceStatus::NAMES);
    v.finish()?;

    let user_id = match (current.role, req.user_id) {
        (Role::Admin, Some(user_id)) => user_id,
        _ => current.id.clone(),
    };
    let user = users::find_by_id(&state.db, &user_id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    let today = today();
    let date = parse_optional_date("date", req.date.as_deref())?.unwrap_or(today);

    if let Some(start) = user.start_date.as_deref().and_then(|s| parse_date(s).ok()) {
        if date < start {
            return Err(ApiError::forbidden("Not Yet Joined"));
        }
    }
    if is_weekend(date) {
        return Err(ApiError::bad_request("Weekend - Holiday"));
    }
    if !current.is_admin_or_hr() && date != today {
        return Err(ApiError::forbidden("Invalid date"));
    }
    if records::find_for_day(&state.db, &user_id, date).await?.is_some() {
        return Err(ApiError::bad_request("Attendance already marked"));
    }

    let check_in = parse_optional_time("check_in_time", req.check_in_time.as_deref())?;
    let check_out = parse_optional_time("check_out_time", req.check_out_time.as_deref())?;
    let policy = settings::shift_policy(&state.db).await?;

    let mut fields = AttendanceFields {
        status: req.status,
        leave_type: req.leave_type,
        notes: req.notes,
        ..Default::default()
    };
    derive_times(&policy, &mut fields, check_in, check_out);

    let id = records::insert(&state.db, &user_id, date, &fields)
        .await
        .map_err(crate::error::conflict_on_duplicate("Attendance already marked"))?;
    let record = records::find(&state.db, &id).await?;
    Ok(created("Attendance marked successfully", record))
}

/// POST /api/attendance/check-in
pub async fn check_in(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Option<ApiJson<CheckRequest>>,
) -> ApiResult<Json<Value>> {
    let date = today();
    if is_weekend(date) {
        return Err(ApiError::bad_request("Weekend - Holiday"));
    }

    let user = users::find_by_id(&state.db, &current.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    if let Some(start) = user.start_date.as_deref().and_then(|s| parse_date(s).ok()) {
        if date < start {
            return Err(ApiError::forbidden("Not Yet Joined"));
        }
    }

    let policy = settings::shift_policy(&state.db).await?;
    let now = local_time();
    let notes = body.and_then(|ApiJson(b)| b.notes);

    let existing = records::find_for_day(&state.db, &current.id, date).await?;
    if existing.as_ref().is_some_and(|r| r.check_in_time.is_some()) {
        return Err(ApiError::bad_request("Already checked in"));
    }

    let mut fields = existing.as_ref().map(|r| r.fields()).unwrap_or_default();
    fields.status = policy.check_in_status(now).as_str().to_string();
    if notes.is_some() {
        fields.notes = notes;
    }
    derive_times(&policy, &mut fields, Some(now), None);

    let id = match existing {
        Some(record) => {
            records::update(&state.db, &record.id, &fields).await?;
            record.id
        }
        None => records::insert(&state.db, &current.id, date, &fields)
            .await
            .map_err(crate::error::conflict_on_duplicate("Already checked in"))?,
    };

    if fields.is_late {
        info!("{} checked in {} minutes late", current.email, fields.late_by_minutes);
    }
    let record = records::find(&state.db, &id).await?;
    let message = if fields.is_late {
        format!("Checked in late by {} minutes", fields.late_by_minutes)
    } else {
        "Checked in successfully".to_string()
    };
    Ok(success_with(&message, record))
}

/// POST /api/attendance/check-out
pub async fn check_out(
    State(state): State<AppState>,
    current: CurrentUser,
    body: Option<ApiJson<CheckRequest>>,
) -> ApiResult<Json<Value>> {
    let record = records::find_for_day(&state.db, &current.id, today())
        .await?
        .filter(|r| r.check_in_time.is_some())
        .ok_or_else(|| ApiError::bad_request("No check-in found"))?;
    if record.check_out_time.is_some() {
        return Err(ApiError::bad_request("Already checked out"));
    }

    let check_in = parse_optional_time("check_in_time", record.check_in_time.as_deref())?;
    let policy = settings::shift_policy(&state.db).await?;

    let mut fields = record.fields();
    if let Some(ApiJson(CheckRequest { notes: Some(notes) })) = body {
        fields.notes = Some(notes);
    }
    derive_times(&policy, &mut fields, check_in, Some(local_time()));
    records::update(&state.db, &record.id, &fields).await?;

    let record = records::find(&state.db, &record.id).await?;
    Ok(success_with("Checked out successfully", record))
}

/// GET /api/attendance/today-status
pub async fn today_status(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Value>> {
    let record = records::find_for_day(&state.db, &current.id, today()).await?;
    Ok(success(json!({
        "hasCheckedIn": record.as_ref().is_some_and(|r| r.check_in_time.is_some()),
        "hasCheckedOut": record.as_ref().is_some_and(|r| r.check_out_time.is_some()),
        "attendance": record,
    })))
}

/// GET /api/attendance
pub async fn list_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<AttendanceListQuery>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr, Role::Manager])?;

    let filter = AttendanceFilter {
        user_id: query.user_id,
        department: (current.role == Role::Manager).then(|| current.department.clone()),
        start: parse_optional_date("startDate", query.start_date.as_deref())?,
        end: parse_optional_date("endDate", query.end_date.as_deref())?,
        status: query.status,
    };
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT);
    let found = records::list(&state.db, &filter, limit, clamp_offset(query.offset)).await?;
    Ok(success(found))
}

/// GET /api/attendance/user/:user_id
pub async fn user_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
    ApiQuery(query): ApiQuery<AttendanceListQuery>,
) -> ApiResult<Json<Value>> {
    if current.id != user_id && !current.is_management() {
        return Err(ApiError::forbidden("Not authorized to view this attendance"));
    }

    let filter = AttendanceFilter {
        user_id: Some(user_id),
        start: parse_optional_date("startDate", query.start_date.as_deref())?,
        end: parse_optional_date("endDate", query.end_date.as_deref())?,
        status: query.status,
        ..Default::default()
    };
    let limit = clamp_limit(query.limit, DEFAULT_LIMIT);
    let found = records::list(&state.db, &filter, limit, clamp_offset(query.offset)).await?;
    Ok(success(found))
}

/// GET /api/attendance/:id
pub async fn get_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let record = records::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;
    if record.user_id != current.id && current.role != Role::Admin {
        return Err(ApiError::forbidden("Not authorized to view this attendance"));
    }
    Ok(success(record))
}

/// PUT /api/attendance/:id
pub async fn update_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateAttendanceRequest>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr])?;

    let mut v = Validator::new();
    if let Some(status) = &req.status {
        v.one_of("status", status, &AttendanceStatus::NAMES);
    }
    v.finish()?;

    let record = records::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Attendance record not found"))?;

    let mut fields = record.fields();
    if let Some(status) = req.status {
        fields.status = status;
    }
    if req.leave_type.is_some() {
        fields.leave_type = req.leave_type;
    }
    if req.notes.is_some() {
        fields.notes = req.notes;
    }

    let check_in = parse_optional_time(
        "check_in_time",
        req.check_in_time.as_deref().or(record.check_in_time.as_deref()),
    )?;
    let check_out = parse_optional_time(
        "check_out_time",
        req.check_out_time.as_deref().or(record.check_out_time.as_deref()),
    )?;
    let policy = settings::shift_policy(&state.db).await?;
    derive_times(&policy, &mut fields, check_in, check_out);

    records::update(&state.db, &id, &fields).await?;
    let record = records::find(&state.db, &id).await?;
    Ok(success_with("Attendance updated successfully", record))
}

/// DELETE /api/attendance/:id
pub async fn delete_attendance(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin])?;
    if !records::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Attendance record not found"));
    }
    Ok(success_with("Attendance deleted successfully", Value::Null))
}

/// GET /api/attendance/stats
///
/// One user's figures when a user is named (or the caller is not
/// management), otherwise organisation-wide figures.
pub async fn attendance_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> ApiResult<Json<Value>> {
    let target = if current.is_management() {
        query.user_id
    } else {
        match query.user_id {
            Some(user_id) if user_id != current.id => {
                return Err(ApiError::forbidden("Not authorized to view these statistics"));
            }
            _ => Some(current.id.clone()),
        }
    };

    let today = today();
    let (month_start, month_end) = month_bounds(today.year(), today.month())?;
    let start = parse_optional_date("startDate", query.start_date.as_deref())?.unwrap_or(month_start);
    let end = parse_optional_date("endDate", query.end_date.as_deref())?.unwrap_or(month_end);
    if end < start {
        return Err(ApiError::bad_request("endDate must be on or after startDate"));
    }

    let stats = match target {
        Some(user_id) => {
            let user = users::find_by_id(&state.db, &user_id)
                .await?
                .ok_or_else(|| ApiError::not_found("User not found"))?;
            let joined = user.start_date.as_deref().and_then(|s| parse_date(s).ok());
            let days = working_days(start, end, joined, today);
            let found = records::day_records(&state.db, Some(&user_id), start, end).await?;
            user_stats(&found, &days)
        }
        None => {
            let days = working_days(start, end, None, today);
            let found = records::day_records(&state.db, None, start, end).await?;
            organisation_stats(&found, &days)
        }
    };

    Ok(success(stats))
}

/// POST /api/attendance/auto-mark-absent
///
/// Runs the nightly absence job on demand.
pub async fn auto_mark_absent(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<AutoMarkQuery>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin])?;
    let date = parse_optional_date("date", query.date.as_deref())?.unwrap_or_else(today);

    let summary = scheduler::run_once(&state, date).await?;
    let message = if summary.skipped_weekend {
        "Weekend - no attendance marked".to_string()
    } else {
        format!(
            "Marked {} absent and {} on leave",
            summary.absent, summary.on_leave
        )
    };
    Ok(success_with(&message, summary))
}
