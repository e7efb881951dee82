//! Job postings

use crate::api::{require_role, ApiJson, ApiQuery, CurrentUser};
use crate::db::jobs::{self as jobs_db, Job, EDITABLE_STATUSES, EMPLOYMENT_TYPES, EXPERIENCE_LEVELS, SELECT_JOB};
use crate::error::{created, success, success_with};
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hrms_common::roles::Role;
use hrms_common::time::{format_date, today};
use hrms_common::validation::Validator;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::{QueryBuilder, Sqlite};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Public job board
pub fn public_job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs", get(list_jobs))
        .route("/api/jobs/:id", get(get_job))
}

/// Job management
pub fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/api/jobs", axum::routing::post(create_job))
        .route("/api/jobs/stats", get(job_stats))
        .route("/api/jobs/:id", axum::routing::put(update_job).delete(delete_job))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JobRequest {
    pub title: Option<String>,
    pub department: Option<String>,
    pub location: Option<String>,
    #[serde(alias = "employmentType")]
    pub employment_type: Option<String>,
    #[serde(alias = "experienceLevel")]
    pub experience_level: Option<String>,
    #[serde(alias = "salaryRange")]
    pub salary_range: Option<String>,
    pub description: Option<String>,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub status: Option<String>,
    #[serde(alias = "postedDate")]
    pub posted_date: Option<String>,
    #[serde(alias = "lastDateToApply")]
    pub last_date_to_apply: Option<String>,
    pub vacancies: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct JobListQuery {
    pub status: Option<String>,
    pub department: Option<String>,
    #[serde(alias = "employmentType")]
    pub employment_type: Option<String>,
}

impl JobRequest {
    /// Overlay the given fields onto `job`
    fn apply(self, job: &mut Job) {
        if let Some(title) = self.title {
            job.title = title.trim().to_string();
        }
        if let Some(description) = self.description {
            job.description = description;
        }
        if self.department.is_some() {
            job.department = self.department;
        }
        if self.location.is_some() {
            job.location = self.location;
        }
        if self.employment_type.is_some() {
            job.employment_type = self.employment_type;
        }
        if self.experience_level.is_some() {
            job.experience_level = self.experience_level;
        }
        if self.salary_range.is_some() {
            job.salary_range = self.salary_range;
        }
        if self.requirements.is_some() {
            job.requirements = self.requirements;
        }
        if self.responsibilities.is_some() {
            job.responsibilities = self.responsibilities;
        }
        if self.benefits.is_some() {
            job.benefits = self.benefits;
        }
        if let Some(status) = self.status {
            job.status = status;
        }
        if let Some(posted) = self.posted_date {
            job.posted_date = posted;
        }
        if self.last_date_to_apply.is_some() {
            job.last_date_to_apply = self.last_date_to_apply;
        }
        if let Some(vacancies) = self.vacancies {
            job.vacancies = vacancies;
        }
    }
}

/// Check a merged posting before it is stored
fn validate_job(job: &Job) -> ApiResult<()> {
    let mut v = Validator::new();
    v.min_len("title", &job.title, 3)
        .min_len("description", &job.description, 10)
        .one_of("status", &job.status, &EDITABLE_STATUSES)
        .check(job.vacancies >= 1, "vacancies", "\"vacancies\" must be at least 1")
        .check(
            job.filled_positions <= job.vacancies,
            "vacancies",
            "\"vacancies\" cannot be less than filled positions",
        );
    if let Some(kind) = &job.employment_type {
        v.one_of("employment_type", kind, &EMPLOYMENT_TYPES);
    }
    if let Some(level) = &job.experience_level {
        v.one_of("experience_level", level, &EXPERIENCE_LEVELS);
    }
    let posted = v.date("posted_date", &job.posted_date);
    if let Some(last) = &job.last_date_to_apply {
        if let (Some(posted), Some(last)) = (posted, v.date("last_date_to_apply", last)) {
            v.check(
                last >= posted,
                "last_date_to_apply",
                "\"last_date_to_apply\" cannot be before \"posted_date\"",
            );
        }
    }
    v.finish()?;
    Ok(())
}

/// GET /api/jobs
pub async fn list_jobs(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<JobListQuery>,
) -> ApiResult<Json<Value>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_JOB);
    qb.push(" WHERE j.is_deleted = 0");
    if let Some(status) = query.status {
        qb.push(" AND j.status = ").push_bind(status);
    }
    if let Some(department) = query.department {
        qb.push(" AND j.department = ").push_bind(department);
    }
    if let Some(kind) = query.employment_type {
        qb.push(" AND j.employment_type = ").push_bind(kind);
    }
    qb.push(" ORDER BY j.posted_date DESC, j.created_at DESC");

    let found = qb.build_query_as::<Job>().fetch_all(&state.db).await?;
    Ok(success(found))
}

/// GET /api/jobs/:id
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let job = jobs_db::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(success(job))
}

/// POST /api/jobs
pub async fn create_job(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<JobRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, &[Role::Admin, Role::Hr, Role::Manager])?;

    let mut job = Job {
        id: Uuid::new_v4().to_string(),
        status: "open".to_string(),
        posted_by: Some(current.id.clone()),
        posted_date: format_date(today()),
        vacancies: 1,
        ..Default::default()
    };
    req.apply(&mut job);
    validate_job(&job)?;

    jobs_db::insert(&state.db, &job).await?;
    let job = jobs_db::find(&state.db, &job.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(created("Job created successfully", job))
}

/// PUT /api/jobs/:id
pub async fn update_job(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<JobRequest>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr, Role::Manager])?;

    let mut job = jobs_db::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    req.apply(&mut job);
    validate_job(&job)?;

    jobs_db::save(&state.db, &job).await?;
    let job = jobs_db::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    Ok(success_with("Job updated successfully", job))
}

/// DELETE /api/jobs/:id
///
/// Soft delete; only closed postings qualify.
pub async fn delete_job(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr])?;

    let job = jobs_db::find(&state.db, &id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    if job.status != "closed" {
        return Err(ApiError::bad_request(
            "Only closed jobs can be deleted. Close the job first.",
        ));
    }

    jobs_db::soft_delete(&state.db, &id).await?;
    Ok(success_with("Job deleted successfully", Value::Null))
}

/// GET /api/jobs/stats
pub async fn job_stats(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr, Role::Manager])?;

    let rows: Vec<(String, Option<String>)> =
        sqlx::query_as("SELECT status, department FROM jobs WHERE is_deleted = 0")
            .fetch_all(&state.db)
            .await?;

    let mut by_department: BTreeMap<String, usize> = BTreeMap::new();
    for (_, department) in &rows {
        let key = department.clone().unwrap_or_else(|| "Unknown".to_string());
        *by_department.entry(key).or_insert(0) += 1;
    }

    Ok(success(json!({
        "totalJobs": rows.len(),
        "openJobs": rows.iter().filter(|(status, _)| status == "open").count(),
        "closedJobs": rows.iter().filter(|(status, _)| status == "closed").count(),
        "jobsByDepartment": by_department,
    })))
}
