//! User management

use crate::api::{clamp_limit, clamp_offset, require_role, ApiJson, ApiQuery, CurrentUser, DEFAULT_LIMIT};
use crate::db::users::{self, NewUser, UserFilter, UserScope};
use crate::error::{conflict_on_duplicate, created, success, success_with};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hrms_common::auth::hash_password;
use hrms_common::roles::Role;
use hrms_common::validation::Validator;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list_users).post(create_user))
        .route(
            "/api/users/:id",
            get(get_user).put(update_user).delete(delete_user),
        )
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateUserRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub role: Option<String>,
    #[serde(alias = "employeeId")]
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "dateOfBirth")]
    pub date_of_birth: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub role: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "dateOfBirth")]
    pub date_of_birth: Option<String>,
    #[serde(alias = "profilePicture")]
    pub profile_picture: Option<String>,
    #[serde(alias = "startDate")]
    pub start_date: Option<String>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UserListQuery {
    pub role: Option<String>,
    pub department: Option<String>,
    #[serde(alias = "isActive")]
    pub is_active: Option<bool>,
    pub search: Option<String>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

fn parse_role(value: &str) -> ApiResult<Role> {
    value
        .parse()
        .map_err(|_| ApiError::bad_request(format!("Invalid role: {}", value)))
}

/// POST /api/users
///
/// Accounts created by admin or hr skip email verification. Everyone but
/// candidates needs a start date and receives the next employee id.
pub async fn create_user(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateUserRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, &[Role::Admin, Role::Hr])?;

    let role = match req.role.as_deref() {
        Some(role) => parse_role(role)?,
        None => Role::Employee,
    };

    let mut v = Validator::new();
    v.min_len("name", &req.name, 2)
        .email("email", &req.email)
        .min_len("password", &req.password, super::auth::MIN_PASSWORD_LEN);
    if let Some(salary) = req.salary {
        v.non_negative("salary", salary);
    }
    if let Some(dob) = &req.date_of_birth {
        v.date("date_of_birth", dob);
    }
    match &req.start_date {
        Some(start) => {
            v.date("start_date", start);
        }
        None => {
            v.check(
                role == Role::Candidate,
                "start_date",
                "\"start_date\" is required for employees",
            );
        }
    }
    v.finish()?;

    if role == Role::Admin && current.role != Role::Admin {
        return Err(ApiError::forbidden("Only admins can create admin accounts"));
    }

    if users::email_exists(&state.db, &req.email).await? {
        return Err(ApiError::bad_request("User already exists"));
    }

    let mut new = NewUser::new(&req.name, &req.email, hash_password(&req.password), role);
    new.employee_id = match req.employee_id {
        Some(id) => Some(id),
        None if role != Role::Candidate => Some(users::next_employee_id(&state.db).await?),
        None => None,
    };
    new.department = req.department;
    new.position = req.position;
    new.salary = req.salary;
    new.phone = req.phone;
    new.address = req.address;
    new.date_of_birth = req.date_of_birth;
    new.start_date = req.start_date;
    new.is_email_verified = true;

    let user = users::insert(&state.db, &new)
        .await
        .map_err(conflict_on_duplicate("User or employee id already exists"))?;

    info!("{} created {} account {}", current.email, user.role, user.email);
    Ok(created("User created successfully", user))
}

/// GET /api/users
///
/// admin and hr see everyone; a manager sees their department's employees
/// and themselves; anyone else sees only their own record.
pub async fn list_users(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<Value>> {
    let scope = match current.role {
        Role::Admin | Role::Hr => UserScope::All,
        Role::Manager => UserScope::Team {
            department: current.department.clone(),
            manager_id: current.id.clone(),
        },
        Role::Employee | Role::Candidate => UserScope::Only(current.id.clone()),
    };
    let filter = UserFilter {
        role: query.role,
        department: query.department,
        is_active: query.is_active,
        search: query.search.filter(|s| !s.trim().is_empty()),
    };

    let limit = clamp_limit(query.limit, DEFAULT_LIMIT);
    let offset = clamp_offset(query.offset);
    let found = users::list(&state.db, &scope, &filter, limit, offset).await?;

    Ok(success(json!({
        "users": found,
        "count": found.len(),
        "limit": limit,
        "offset": offset,
    })))
}

/// GET /api/users/:id
pub async fn get_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    if current.id != id && !current.is_management() {
        return Err(ApiError::forbidden("Not authorized to view this user"));
    }

    let user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(success(user))
}

/// PUT /api/users/:id
///
/// Role changes from non-admins are dropped without error. Employment
/// fields are only writable by admin and hr.
pub async fn update_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateUserRequest>,
) -> ApiResult<Json<Value>> {
    if !current.is_self_or_admin_hr(&id) {
        return Err(ApiError::forbidden("Not authorized to update this user"));
    }

    let mut v = Validator::new();
    if let Some(name) = &req.name {
        v.min_len("name", name, 2);
    }
    if let Some(salary) = req.salary {
        v.non_negative("salary", salary);
    }
    if let Some(dob) = &req.date_of_birth {
        v.date("date_of_birth", dob);
    }
    if let Some(start) = &req.start_date {
        v.date("start_date", start);
    }
    v.finish()?;

    let mut user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(name) = req.name {
        user.name = name.trim().to_string();
    }
    if req.phone.is_some() {
        user.phone = req.phone;
    }
    if req.address.is_some() {
        user.address = req.address;
    }
    if req.date_of_birth.is_some() {
        user.date_of_birth = req.date_of_birth;
    }
    if req.profile_picture.is_some() {
        user.profile_picture = req.profile_picture;
    }

    if current.role == Role::Admin {
        if let Some(role) = req.role.as_deref() {
            user.role = parse_role(role)?;
        }
    }

    if current.is_admin_or_hr() {
        if req.department.is_some() {
            user.department = req.department;
        }
        if req.position.is_some() {
            user.position = req.position;
        }
        if req.salary.is_some() {
            user.salary = req.salary;
        }
        if req.start_date.is_some() {
            user.start_date = req.start_date;
        }
        if let Some(active) = req.is_active {
            user.is_active = active;
        }
    }

    users::save(&state.db, &user).await?;
    let user = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(success_with("User updated successfully", user))
}

/// DELETE /api/users/:id
///
/// Attendance, leaves, payroll and other owned rows go with the user.
pub async fn delete_user(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr])?;

    if current.id == id {
        return Err(ApiError::bad_request("You cannot delete your own account"));
    }

    let target = users::find_by_id(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if current.role == Role::Hr && target.role == Role::Admin {
        return Err(ApiError::forbidden("HR cannot delete admin accounts"));
    }

    users::delete(&state.db, &id).await?;
    info!("{} deleted user {}", current.email, target.email);
    Ok(success_with("User deleted successfully", Value::Null))
}
