//! Departments

use crate::api::{require_role, ApiJson, CurrentUser};
use crate::error::{conflict_on_duplicate, created, success, success_with};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hrms_common::roles::Role;
use hrms_common::time::now_rfc3339;
use hrms_common::validation::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use uuid::Uuid;

pub fn department_routes() -> Router<AppState> {
    Router::new()
        .route("/api/departments", get(list_departments).post(create_department))
        .route("/api/departments/stats", get(department_stats))
        .route(
            "/api/departments/:id",
            get(get_department)
                .put(update_department)
                .delete(delete_department),
        )
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Department {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub manager_id: Option<String>,
    pub manager_name: Option<String>,
    pub budget: Option<f64>,
    pub employee_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DepartmentRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(alias = "managerId")]
    pub manager_id: Option<String>,
    pub budget: Option<f64>,
}

#[derive(Debug, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentHeadcount {
    pub department: String,
    pub employee_count: i64,
    pub active_count: i64,
}

const SELECT_DEPARTMENT: &str = r#"
    SELECT d.id, d.name, d.description, d.manager_id, m.name AS manager_name, d.budget,
           (SELECT COUNT(*) FROM users u WHERE u.department = d.name AND u.role != 'candidate')
               AS employee_count,
           d.created_at, d.updated_at
    FROM departments d
    LEFT JOIN users m ON m.id = d.manager_id
"#;

async fn find_department(db: &SqlitePool, id: &str) -> ApiResult<Department> {
    sqlx::query_as::<_, Department>(&format!("{} WHERE d.id = ?", SELECT_DEPARTMENT))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Department not found"))
}

fn validate(req: &DepartmentRequest, creating: bool) -> ApiResult<()> {
    let mut v = Validator::new();
    match &req.name {
        Some(name) => {
            v.min_len("name", name, 2);
        }
        None if creating => {
            v.required::<String>("name", None);
        }
        None => {}
    }
    if let Some(budget) = req.budget {
        v.non_negative("budget", budget);
    }
    v.finish()?;
    Ok(())
}

/// GET /api/departments
pub async fn list_departments(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let departments = sqlx::query_as::<_, Department>(&format!("{} ORDER BY d.name", SELECT_DEPARTMENT))
        .fetch_all(&state.db)
        .await?;
    Ok(success(departments))
}

/// GET /api/departments/:id
pub async fn get_department(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    Ok(success(find_department(&state.db, &id).await?))
}

/// POST /api/departments
pub async fn create_department(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<DepartmentRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, &[Role::Admin])?;
    validate(&req, true)?;

    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO departments (id, name, description, manager_id, budget, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&id)
    .bind(req.name.as_deref().map(str::trim))
    .bind(&req.description)
    .bind(&req.manager_id)
    .bind(req.budget)
    .bind(&now)
    .bind(&now)
    .execute(&state.db)
    .await
    .map_err(conflict_on_duplicate("Department already exists"))?;

    Ok(created("Department created successfully", find_department(&state.db, &id).await?))
}

/// PUT /api/departments/:id
pub async fn update_department(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<DepartmentRequest>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin])?;
    validate(&req, false)?;

    let existing = find_department(&state.db, &id).await?;
    let name = req.name.map(|n| n.trim().to_string()).unwrap_or(existing.name);

    sqlx::query(
        "UPDATE departments SET name = ?, description = ?, manager_id = ?, budget = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&name)
    .bind(req.description.or(existing.description))
    .bind(req.manager_id.or(existing.manager_id))
    .bind(req.budget.or(existing.budget))
    .bind(now_rfc3339())
    .bind(&id)
    .execute(&state.db)
    .await
    .map_err(conflict_on_duplicate("Department already exists"))?;

    Ok(success_with(
        "Department updated successfully",
        find_department(&state.db, &id).await?,
    ))
}

/// DELETE /api/departments/:id
pub async fn delete_department(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin])?;

    let result = sqlx::query("DELETE FROM departments WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Department not found"));
    }
    Ok(success_with("Department deleted successfully", Value::Null))
}

/// GET /api/departments/stats
///
/// Headcount per department name as recorded on user profiles.
pub async fn department_stats(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let rows = sqlx::query_as::<_, DepartmentHeadcount>(
        r#"
        SELECT department,
               COUNT(*) AS employee_count,
               COALESCE(SUM(is_active), 0) AS active_count
        FROM users
        WHERE department IS NOT NULL AND role != 'candidate'
        GROUP BY department
        ORDER BY department
        "#,
    )
    .fetch_all(&state.db)
    .await?;
    Ok(success(rows))
}
