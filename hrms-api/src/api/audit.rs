//! Audit log viewer

use crate::api::{clamp_limit, require_role, ApiQuery, CurrentUser, DEFAULT_LIMIT};
use crate::db::audit;
use crate::error::success;
use crate::{ApiResult, AppState};
use axum::{extract::State, routing::get, Json, Router};
use hrms_common::roles::Role;
use serde::Deserialize;
use serde_json::Value;

pub fn audit_routes() -> Router<AppState> {
    Router::new().route("/api/audit-log", get(audit_log))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct AuditQuery {
    pub limit: Option<i64>,
}

/// GET /api/audit-log
pub async fn audit_log(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<AuditQuery>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin])?;
    let entries = audit::recent(&state.db, clamp_limit(query.limit, DEFAULT_LIMIT)).await?;
    Ok(success(entries))
}
