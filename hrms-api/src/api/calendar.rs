//! Company calendar events

use crate::api::{clamp_limit, require_role, ApiJson, ApiQuery, CurrentUser};
use crate::error::{created, success, success_with};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hrms_common::roles::Role;
use hrms_common::time::{format_date, now_rfc3339, today};
use hrms_common::validation::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

const EVENT_EDITORS: [Role; 3] = [Role::Admin, Role::Hr, Role::Manager];

pub fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/api/events", get(list_events).post(create_event))
        .route("/api/events/upcoming", get(upcoming_events))
        .route("/api/events/range", get(events_in_range))
        .route(
            "/api/events/:id",
            get(get_event).put(update_event).delete(delete_event),
        )
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub start_date: String,
    pub end_date: String,
    pub event_type: String,
    pub location: Option<String>,
    pub department: Option<String>,
    pub all_day: bool,
    pub created_by: Option<String>,
    pub created_by_name: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

const SELECT_EVENT: &str = r#"
    SELECT e.*, u.name AS created_by_name
    FROM events e
    LEFT JOIN users u ON u.id = e.created_by
"#;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "endDate")]
    pub end_date: Option<String>,
    #[serde(alias = "eventType", alias = "type")]
    pub event_type: Option<String>,
    pub location: Option<String>,
    pub department: Option<String>,
    #[serde(alias = "allDay")]
    pub all_day: Option<bool>,
}

impl EventRequest {
    fn apply(self, event: &mut Event) {
        if let Some(title) = self.title {
            event.title = title.trim().to_string();
        }
        if let Some(start) = self.start_date {
            event.start_date = start;
        }
        if let Some(end) = self.end_date {
            event.end_date = end;
        }
        if let Some(kind) = self.event_type {
            event.event_type = kind;
        }
        if let Some(all_day) = self.all_day {
            event.all_day = all_day;
        }
        if self.description.is_some() {
            event.description = self.description;
        }
        if self.location.is_some() {
            event.location = self.location;
        }
        if self.department.is_some() {
            event.department = self.department;
        }
    }
}

fn validate_event(event: &mut Event) -> ApiResult<()> {
    let mut v = Validator::new();
    v.min_len("title", &event.title, 1);
    let start = v.date("start_date", &event.start_date);
    let end = v.date("end_date", &event.end_date);
    if let (Some(start), Some(end)) = (start, end) {
        v.check(end >= start, "end_date", "\"end_date\" must be on or after \"start_date\"");
        event.start_date = format_date(start);
        event.end_date = format_date(end);
    }
    v.finish()?;
    Ok(())
}

async fn find_event(db: &SqlitePool, id: &str) -> ApiResult<Event> {
    sqlx::query_as::<_, Event>(&format!("{} WHERE e.id = ?", SELECT_EVENT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Event not found"))
}

/// GET /api/events
pub async fn list_events(State(state): State<AppState>, _current: CurrentUser) -> ApiResult<Json<Value>> {
    let events = sqlx::query_as::<_, Event>(&format!("{} ORDER BY e.start_date ASC", SELECT_EVENT))
        .fetch_all(&state.db)
        .await?;
    Ok(success(events))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpcomingQuery {
    pub limit: Option<i64>,
}

/// GET /api/events/upcoming
///
/// Events starting today or later, soonest first.
pub async fn upcoming_events(
    State(state): State<AppState>,
    _current: CurrentUser,
    ApiQuery(query): ApiQuery<UpcomingQuery>,
) -> ApiResult<Json<Value>> {
    let limit = clamp_limit(query.limit, 10);
    let events = sqlx::query_as::<_, Event>(&format!(
        "{} WHERE e.start_date >= ? ORDER BY e.start_date ASC LIMIT ?",
        SELECT_EVENT
    ))
    .bind(format_date(today()))
    .bind(limit)
    .fetch_all(&state.db)
    .await?;
    Ok(success(events))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RangeQuery {
    #[serde(alias = "startDate")]
    pub start_date: String,
    #[serde(alias = "endDate")]
    pub end_date: String,
}

/// GET /api/events/range
///
/// Events overlapping the inclusive range.
pub async fn events_in_range(
    State(state): State<AppState>,
    _current: CurrentUser,
    ApiQuery(query): ApiQuery<RangeQuery>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    let start = v.date("startDate", &query.start_date);
    let end = v.date("endDate", &query.end_date);
    v.finish()?;
    let (Some(start), Some(end)) = (start, end) else {
        return Err(ApiError::bad_request("startDate and endDate are required"));
    };

    let events = sqlx::query_as::<_, Event>(&format!(
        "{} WHERE e.start_date <= ? AND e.end_date >= ? ORDER BY e.start_date ASC",
        SELECT_EVENT
    ))
    .bind(format_date(end))
    .bind(format_date(start))
    .fetch_all(&state.db)
    .await?;
    Ok(success(events))
}

/// GET /api/events/:id
pub async fn get_event(
    State(state): State<AppState>,
    _current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(success(find_event(&state.db, &id).await?))
}

/// POST /api/events
pub async fn create_event(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<EventRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, &EVENT_EDITORS)?;

    let mut event = Event {
        id: Uuid::new_v4().to_string(),
        event_type: "event".into(),
        created_by: Some(current.id.clone()),
        ..Default::default()
    };
    req.apply(&mut event);
    validate_event(&mut event)?;

    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO events (id, title, description, start_date, end_date, event_type, location,
                             department, all_day, created_by, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&event.id)
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.start_date)
    .bind(&event.end_date)
    .bind(&event.event_type)
    .bind(&event.location)
    .bind(&event.department)
    .bind(event.all_day)
    .bind(&event.created_by)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await?;

    Ok(created("Event created successfully", find_event(&state.db, &event.id).await?))
}

/// PUT /api/events/:id
pub async fn update_event(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<EventRequest>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &EVENT_EDITORS)?;

    let mut event = find_event(&state.db, &id).await?;
    req.apply(&mut event);
    validate_event(&mut event)?;

    sqlx::query(
        "UPDATE events SET title = ?, description = ?, start_date = ?, end_date = ?, event_type = ?,
                           location = ?, department = ?, all_day = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&event.title)
    .bind(&event.description)
    .bind(&event.start_date)
    .bind(&event.end_date)
    .bind(&event.event_type)
    .bind(&event.location)
    .bind(&event.department)
    .bind(event.all_day)
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await?;

    Ok(success_with("Event updated successfully", find_event(&state.db, &id).await?))
}

/// DELETE /api/events/:id
pub async fn delete_event(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &EVENT_EDITORS)?;
    let result = sqlx::query("DELETE FROM events WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Event not found"));
    }
    Ok(success_with("Event deleted successfully", Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_dates_validated() {
        let mut event = Event {
            title: "Offsite".into(),
            start_date: "2024-09-10".into(),
            end_date: "2024-09-09".into(),
            ..Default::default()
        };
        assert!(validate_event(&mut event).is_err());

        event.end_date = "2024-09-10".into();
        assert!(validate_event(&mut event).is_ok());
    }

    #[test]
    fn test_apply_accepts_partial_update() {
        let mut event = Event {
            title: "Town hall".into(),
            location: Some("Atrium".into()),
            ..Default::default()
        };
        EventRequest {
            title: Some("  All hands ".into()),
            all_day: Some(true),
            ..Default::default()
        }
        .apply(&mut event);
        assert_eq!(event.title, "All hands");
        assert!(event.all_day);
        assert_eq!(event.location.as_deref(), Some("Atrium"));
    }
}
