//! Applications, resume screening, interviews and onboarding

use crate::api::{require_role, ApiJson, ApiQuery, CurrentUser};
use crate::db::applications::{
    self as applications_db, Application, ApplicationFilter, InterviewSchedule, NewApplication, STATUSES,
};
use crate::db::jobs::{self, HireOutcome};
use crate::db::users;
use crate::error::{conflict_on_duplicate, created, success, success_with};
use crate::services::mailer::{send_quietly, templates};
use crate::services::notifier::NewNotification;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Duration;
use hrms_common::ats::screen_resume;
use hrms_common::auth::generate_url_token;
use hrms_common::payroll::round2;
use hrms_common::roles::Role;
use hrms_common::time::{format_date, now, today};
use hrms_common::validation::Validator;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use tracing::info;

const ONBOARDING_TTL_DAYS: i64 = 7;
const RECRUITERS: [Role; 3] = [Role::Admin, Role::Hr, Role::Manager];

pub fn application_routes() -> Router<AppState> {
    Router::new()
        .route("/api/applications", get(list_applications).post(create_application))
        .route("/api/applications/stats", get(application_stats))
        .route("/api/applications/job/:job_id", get(job_applications))
        .route(
            "/api/applications/:id",
            get(get_application).delete(delete_application),
        )
        .route("/api/applications/:id/status", put(update_status))
        .route("/api/applications/:id/screen", post(screen_application))
        .route("/api/applications/:id/interview", post(schedule_interview))
}

/// Onboarding links mailed with job offers; the token is the credential
pub fn onboarding_routes() -> Router<AppState> {
    Router::new()
        .route("/api/applications/onboarding/:token", get(check_onboarding))
        .route("/api/applications/onboarding/:token/convert", post(convert_candidate))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct CreateApplicationRequest {
    #[serde(alias = "jobId")]
    pub job_id: String,
    #[serde(alias = "candidateId")]
    pub candidate_id: Option<String>,
    #[serde(alias = "resumeUrl")]
    pub resume_url: Option<String>,
    #[serde(alias = "resumeText")]
    pub resume_text: Option<String>,
    #[serde(alias = "coverLetter")]
    pub cover_letter: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ApplicationListQuery {
    pub status: Option<String>,
    #[serde(alias = "jobId")]
    pub job_id: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatusRequest {
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct InterviewRequest {
    #[serde(alias = "interviewDate")]
    pub interview_date: String,
    #[serde(alias = "interviewTime")]
    pub interview_time: Option<String>,
    #[serde(alias = "interviewLocation")]
    pub interview_location: Option<String>,
    #[serde(alias = "interviewType")]
    pub interview_type: Option<String>,
    #[serde(alias = "interviewNotes")]
    pub interview_notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ConvertRequest {
    #[serde(alias = "startDate")]
    pub start_date: String,
    pub department: Option<String>,
}

async fn find_application(state: &AppState, id: &str) -> ApiResult<Application> {
    applications_db::find(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Application not found"))
}

fn job_title(application: &Application) -> &str {
    application.job_title.as_deref().unwrap_or("the position")
}

/// POST /api/applications
pub async fn create_application(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<CreateApplicationRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, &[Role::Candidate, Role::Admin, Role::Hr])?;

    let candidate_id = match (current.role, req.candidate_id) {
        (Role::Candidate, _) | (_, None) => current.id.clone(),
        (_, Some(candidate_id)) => candidate_id,
    };

    let mut v = Validator::new();
    v.check(!req.job_id.trim().is_empty(), "job_id", "\"job_id\" is required");
    v.finish()?;

    let job = jobs::find(&state.db, &req.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;
    if !job.is_accepting_applications(today()) {
        return Err(ApiError::bad_request("This job is no longer accepting applications"));
    }
    if users::find_by_id(&state.db, &candidate_id).await?.is_none() {
        return Err(ApiError::not_found("Candidate not found"));
    }

    let id = applications_db::insert(
        &state.db,
        &NewApplication {
            job_id: &job.id,
            candidate_id: &candidate_id,
            resume_url: req.resume_url.as_deref(),
            resume_text: req.resume_text.as_deref(),
            cover_letter: req.cover_letter.as_deref(),
        },
    )
    .await
    .map_err(conflict_on_duplicate("You have already applied for this job"))?;

    let content = NewNotification::new(
        "application",
        "New Job Application",
        format!("{} applied for {}", current.name, job.title),
    )
    .link("/applications");
    state
        .notifier()
        .notify_roles(&[Role::Admin, Role::Hr], Some(&current.id), &content)
        .await;

    Ok(created(
        "Application submitted successfully",
        find_application(&state, &id).await?,
    ))
}

/// GET /api/applications
///
/// Recruiters see everything; anyone else sees only their own applications.
pub async fn list_applications(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<ApplicationListQuery>,
) -> ApiResult<Json<Value>> {
    let filter = ApplicationFilter {
        candidate_id: (!current.is_management()).then(|| current.id.clone()),
        job_id: query.job_id,
        status: query.status,
    };
    Ok(success(applications_db::list(&state.db, &filter).await?))
}

/// GET /api/applications/job/:job_id
pub async fn job_applications(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &RECRUITERS)?;
    let filter = ApplicationFilter {
        job_id: Some(job_id),
        ..Default::default()
    };
    Ok(success(applications_db::list(&state.db, &filter).await?))
}

/// GET /api/applications/:id
pub async fn get_application(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let application = find_application(&state, &id).await?;
    if !current.is_management() && application.candidate_id != current.id {
        return Err(ApiError::forbidden("Not authorized to view this application"));
    }
    Ok(success(application))
}

/// PUT /api/applications/:id/status
///
/// Hiring counts against the job's vacancies and mails an onboarding link.
pub async fn update_status(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<StatusRequest>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &RECRUITERS)?;

    let mut v = Validator::new();
    v.one_of("status", &req.status, &STATUSES);
    v.finish()?;

    let application = find_application(&state, &id).await?;
    let newly_hired = req.status == "hired" && application.status != "hired";
    let title = job_title(&application).to_string();

    if newly_hired {
        match jobs::hire_applicant(&state.db, &application.job_id, &id).await? {
            HireOutcome::Hired(outcome) => {
                if outcome.closed {
                    info!(
                        "Job {} closed after filling {}/{} positions",
                        application.job_id, outcome.filled_positions, outcome.vacancies
                    );
                }
            }
            HireOutcome::JobFull => {
                return Err(ApiError::bad_request("All positions for this job have been filled"));
            }
            HireOutcome::AlreadyHired => {
                return Err(ApiError::bad_request("Application has already been hired"));
            }
        }

        let token = generate_url_token();
        applications_db::set_onboarding_token(
            &state.db,
            &id,
            &token,
            now() + Duration::days(ONBOARDING_TTL_DAYS),
        )
        .await?;

        if let (Some(email), Some(name)) = (&application.candidate_email, &application.candidate_name) {
            send_quietly(state.mailer.as_ref(), templates::job_offer(email, name, &title, &token)).await;
        }
    } else {
        applications_db::set_status(&state.db, &id, &req.status).await?;
        if let (Some(email), Some(name)) =
            (&application.candidate_email, &application.candidate_name)
        {
            send_quietly(
                state.mailer.as_ref(),
                templates::application_update(email, name, &title, &req.status),
            )
            .await;
        }
    }

    let kind = match req.status.as_str() {
        "hired" | "shortlisted" => "success",
        "rejected" => "warning",
        _ => "info",
    };
    let content = NewNotification::new(
        "application",
        "Application Status Updated",
        format!("Your application for {} is now {}", title, req.status),
    )
    .kind(kind)
    .link("/applications");
    state
        .notifier()
        .notify_quietly(&application.candidate_id, &content)
        .await;

    Ok(success_with(
        "Application status updated successfully",
        find_application(&state, &id).await?,
    ))
}

/// POST /api/applications/:id/screen
pub async fn screen_application(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &RECRUITERS)?;

    let application = find_application(&state, &id).await?;
    let resume_text = application
        .resume_text
        .as_deref()
        .filter(|text| !text.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request("Application has no resume text to screen"))?;
    let job = jobs::find(&state.db, &application.job_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Job not found"))?;

    let result = screen_resume(resume_text, &job.screening_text(), &job.title);
    let analysis = serde_json::to_value(&result).map_err(hrms_common::Error::from)?;
    applications_db::record_screening(
        &state.db,
        &id,
        result.ats_score,
        result.recommendation,
        &analysis,
        &current.id,
    )
    .await?;

    info!(
        "Screened application {}: score {} ({})",
        id, result.ats_score, result.recommendation
    );
    Ok(success_with(
        "Resume screened successfully",
        json!({
            "application": find_application(&state, &id).await?,
            "screening": analysis,
        }),
    ))
}

/// POST /api/applications/:id/interview
pub async fn schedule_interview(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<InterviewRequest>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &RECRUITERS)?;

    let mut v = Validator::new();
    let date = v.date("interview_date", &req.interview_date);
    v.finish()?;
    let date = date.map(format_date).unwrap_or(req.interview_date);

    let application = find_application(&state, &id).await?;
    let schedule = InterviewSchedule {
        date,
        time: req.interview_time,
        location: req.interview_location,
        interview_type: req.interview_type,
        notes: req.interview_notes,
    };
    applications_db::schedule_interview(&state.db, &id, &schedule, &generate_url_token()).await?;

    let title = job_title(&application).to_string();
    if let (Some(email), Some(name)) = (&application.candidate_email, &application.candidate_name) {
        let details = templates::InterviewDetails {
            date: &schedule.date,
            time: schedule.time.as_deref(),
            location: schedule.location.as_deref(),
            notes: schedule.notes.as_deref(),
        };
        send_quietly(
            state.mailer.as_ref(),
            templates::interview_invitation(email, name, &title, &details),
        )
        .await;
    }

    let content = NewNotification::new(
        "interview",
        "Interview Scheduled",
        format!("Your interview for {} is scheduled on {}", title, schedule.date),
    )
    .kind("success")
    .link("/applications");
    state
        .notifier()
        .notify_quietly(&application.candidate_id, &content)
        .await;

    Ok(success_with(
        "Interview scheduled successfully",
        find_application(&state, &id).await?,
    ))
}

/// DELETE /api/applications/:id
pub async fn delete_application(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr])?;
    if !applications_db::delete(&state.db, &id).await? {
        return Err(ApiError::not_found("Application not found"));
    }
    Ok(success_with("Application deleted successfully", Value::Null))
}

/// GET /api/applications/stats
pub async fn application_stats(
    State(state): State<AppState>,
    current: CurrentUser,
) -> ApiResult<Json<Value>> {
    require_role(&current, &RECRUITERS)?;

    let rows: Vec<(String, Option<i64>)> = sqlx::query_as("SELECT status, ats_score FROM applications")
        .fetch_all(&state.db)
        .await?;

    let mut by_status: BTreeMap<&str, usize> = STATUSES.iter().map(|s| (*s, 0)).collect();
    for (status, _) in &rows {
        if let Some(count) = by_status.get_mut(status.as_str()) {
            *count += 1;
        }
    }

    let scores: Vec<i64> = rows.iter().filter_map(|(_, score)| *score).collect();
    let average = if scores.is_empty() {
        0.0
    } else {
        round2(scores.iter().sum::<i64>() as f64 / scores.len() as f64)
    };

    Ok(success(json!({
        "total": rows.len(),
        "byStatus": by_status,
        "averageAtsScore": average,
        "screened": scores.len(),
    })))
}

/// Resolve an onboarding token to its hired application
fn usable_onboarding(application: Option<Application>) -> ApiResult<Application> {
    let application = application
        .filter(|a| a.status == "hired")
        .ok_or_else(|| ApiError::not_found("Invalid or expired onboarding link"))?;
    if application.onboarding_expired(now()) {
        return Err(ApiError::bad_request("Onboarding link has expired. Please contact HR."));
    }
    Ok(application)
}

/// GET /api/applications/onboarding/:token
pub async fn check_onboarding(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> ApiResult<Json<Value>> {
    let application =
        usable_onboarding(applications_db::find_by_onboarding_token(&state.db, &token).await?)?;

    Ok(success(json!({
        "candidateName": application.candidate_name,
        "candidateEmail": application.candidate_email,
        "jobTitle": application.job_title,
        "department": application.job_department,
    })))
}

/// POST /api/applications/onboarding/:token/convert
///
/// Turns the hired candidate into an employee and consumes the token.
pub async fn convert_candidate(
    State(state): State<AppState>,
    Path(token): Path<String>,
    ApiJson(req): ApiJson<ConvertRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    let start_date = v.date("start_date", &req.start_date);
    v.finish()?;
    let start_date = start_date.ok_or_else(|| ApiError::bad_request("Invalid start date"))?;

    let application =
        usable_onboarding(applications_db::find_by_onboarding_token(&state.db, &token).await?)?;
    let mut user = users::find_by_id(&state.db, &application.candidate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;

    if user.employee_id.is_none() {
        user.employee_id = Some(users::next_employee_id(&state.db).await?);
    }
    user.role = Role::Employee;
    user.department = req.department.or(application.job_department.clone());
    user.position = application.job_title.clone();
    user.start_date = Some(format_date(start_date));
    users::save(&state.db, &user).await?;
    applications_db::complete_onboarding(&state.db, &application.id).await?;

    info!(
        "Converted candidate {} to employee {}",
        user.email,
        user.employee_id.as_deref().unwrap_or("-")
    );

    let content = NewNotification::new(
        "user",
        "Welcome aboard",
        format!("Your employee account is ready. Employee ID: {}", user.employee_id.as_deref().unwrap_or("-")),
    )
    .kind("success");
    state.notifier().notify_quietly(&user.id, &content).await;

    let user = users::find_by_id(&state.db, &user.id)
        .await?
        .ok_or_else(|| ApiError::not_found("Candidate not found"))?;
    Ok(success_with("Onboarding completed successfully", user))
}
