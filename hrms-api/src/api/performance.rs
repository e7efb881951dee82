//! Performance reviews

use crate::api::{require_role, ApiJson, ApiQuery, CurrentUser};
use crate::error::{created, success, success_with};
use crate::services::notifier::NewNotification;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use hrms_common::payroll::round2;
use hrms_common::roles::Role;
use hrms_common::time::{format_date, now_rfc3339};
use hrms_common::validation::Validator;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use std::collections::BTreeMap;
use uuid::Uuid;

pub const RECOMMENDATIONS: [&str; 5] = ["none", "promotion", "bonus", "training", "pip"];
pub const STATUSES: [&str; 3] = ["draft", "submitted", "completed"];

pub fn performance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/performance", get(list_reviews).post(create_review))
        .route("/api/performance/stats", get(review_stats))
        .route("/api/performance/user/:user_id", get(user_reviews))
        .route(
            "/api/performance/:id",
            get(get_review).put(update_review).delete(delete_review),
        )
}

#[derive(Debug, Clone, Default, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReview {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub department: Option<String>,
    pub reviewer_id: Option<String>,
    pub reviewer_name: Option<String>,
    pub review_period_start: String,
    pub review_period_end: String,
    pub quality_of_work: Option<i64>,
    pub productivity: Option<i64>,
    pub communication: Option<i64>,
    pub teamwork: Option<i64>,
    pub problem_solving: Option<i64>,
    pub initiative: Option<i64>,
    pub attendance_punctuality: Option<i64>,
    pub overall_rating: Option<i64>,
    pub previous_goals_completion: Option<String>,
    pub goals: Option<String>,
    pub achievements: Option<String>,
    pub areas_of_improvement: Option<String>,
    pub manager_comments: Option<String>,
    pub employee_self_assessment: Option<String>,
    pub recommendation: String,
    pub status: String,
    pub created_at: String,
    pub updated_at: String,
}

impl PerformanceReview {
    fn ratings(&self) -> [(&'static str, Option<i64>); 8] {
        [
            ("quality_of_work", self.quality_of_work),
            ("productivity", self.productivity),
            ("communication", self.communication),
            ("teamwork", self.teamwork),
            ("problem_solving", self.problem_solving),
            ("initiative", self.initiative),
            ("attendance_punctuality", self.attendance_punctuality),
            ("overall_rating", self.overall_rating),
        ]
    }
}

const SELECT_REVIEW: &str = r#"
    SELECT p.*, u.name AS user_name, u.department AS department, r.name AS reviewer_name
    FROM performance_reviews p
    LEFT JOIN users u ON u.id = p.user_id
    LEFT JOIN users r ON r.id = p.reviewer_id
"#;

/// Body for create and update; absent fields are left alone on update
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewRequest {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    #[serde(alias = "reviewPeriodStart")]
    pub review_period_start: Option<String>,
    #[serde(alias = "reviewPeriodEnd")]
    pub review_period_end: Option<String>,
    #[serde(alias = "qualityOfWork")]
    pub quality_of_work: Option<i64>,
    pub productivity: Option<i64>,
    pub communication: Option<i64>,
    pub teamwork: Option<i64>,
    #[serde(alias = "problemSolving")]
    pub problem_solving: Option<i64>,
    pub initiative: Option<i64>,
    #[serde(alias = "attendancePunctuality")]
    pub attendance_punctuality: Option<i64>,
    #[serde(alias = "overallRating")]
    pub overall_rating: Option<i64>,
    #[serde(alias = "previousGoalsCompletion")]
    pub previous_goals_completion: Option<String>,
    pub goals: Option<String>,
    pub achievements: Option<String>,
    #[serde(alias = "areasOfImprovement")]
    pub areas_of_improvement: Option<String>,
    #[serde(alias = "managerComments")]
    pub manager_comments: Option<String>,
    #[serde(alias = "employeeSelfAssessment")]
    pub employee_self_assessment: Option<String>,
    pub recommendation: Option<String>,
    pub status: Option<String>,
}

impl ReviewRequest {
    fn apply(self, review: &mut PerformanceReview) {
        macro_rules! merge {
            ($($field:ident),*) => {
                $(if self.$field.is_some() { review.$field = self.$field; })*
            };
        }
        merge!(
            quality_of_work,
            productivity,
            communication,
            teamwork,
            problem_solving,
            initiative,
            attendance_punctuality,
            overall_rating,
            previous_goals_completion,
            goals,
            achievements,
            areas_of_improvement,
            manager_comments,
            employee_self_assessment
        );
        if let Some(start) = self.review_period_start {
            review.review_period_start = start;
        }
        if let Some(end) = self.review_period_end {
            review.review_period_end = end;
        }
        if let Some(recommendation) = self.recommendation {
            review.recommendation = recommendation;
        }
        if let Some(status) = self.status {
            review.status = status;
        }
    }
}

/// Validate a merged review, normalising its period dates
fn validate_review(review: &mut PerformanceReview) -> ApiResult<()> {
    let mut v = Validator::new();
    let start = v.date("review_period_start", &review.review_period_start);
    let end = v.date("review_period_end", &review.review_period_end);
    if let (Some(start), Some(end)) = (start, end) {
        v.check(
            end >= start,
            "review_period_end",
            "\"review_period_end\" must be on or after \"review_period_start\"",
        );
    }
    for (field, rating) in review.ratings() {
        if let Some(rating) = rating {
            v.int_range(field, rating, 1, 5);
        }
    }
    v.one_of("recommendation", &review.recommendation, &RECOMMENDATIONS)
        .one_of("status", &review.status, &STATUSES);
    v.finish()?;

    if let (Some(start), Some(end)) = (start, end) {
        review.review_period_start = format_date(start);
        review.review_period_end = format_date(end);
    }
    Ok(())
}

async fn find_review(db: &SqlitePool, id: &str) -> ApiResult<PerformanceReview> {
    sqlx::query_as::<_, PerformanceReview>(&format!("{} WHERE p.id = ?", SELECT_REVIEW))
        .bind(id)
        .fetch_optional(db)
        .await?
        .ok_or_else(|| ApiError::not_found("Performance review not found"))
}

async fn save_review(db: &SqlitePool, review: &PerformanceReview, insert: bool) -> sqlx::Result<()> {
    let sql = if insert {
        r#"
        INSERT INTO performance_reviews (
            user_id, reviewer_id, review_period_start, review_period_end,
            quality_of_work, productivity, communication, teamwork, problem_solving, initiative,
            attendance_punctuality, overall_rating, previous_goals_completion, goals, achievements,
            areas_of_improvement, manager_comments, employee_self_assessment, recommendation, status,
            updated_at, created_at, id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#
    } else {
        r#"
        UPDATE performance_reviews SET
            user_id = ?, reviewer_id = ?, review_period_start = ?, review_period_end = ?,
            quality_of_work = ?, productivity = ?, communication = ?, teamwork = ?,
            problem_solving = ?, initiative = ?, attendance_punctuality = ?, overall_rating = ?,
            previous_goals_completion = ?, goals = ?, achievements = ?, areas_of_improvement = ?,
            manager_comments = ?, employee_self_assessment = ?, recommendation = ?, status = ?,
            updated_at = ?, created_at = ?
        WHERE id = ?
        "#
    };

    sqlx::query(sql)
        .bind(&review.user_id)
        .bind(&review.reviewer_id)
        .bind(&review.review_period_start)
        .bind(&review.review_period_end)
        .bind(review.quality_of_work)
        .bind(review.productivity)
        .bind(review.communication)
        .bind(review.teamwork)
        .bind(review.problem_solving)
        .bind(review.initiative)
        .bind(review.attendance_punctuality)
        .bind(review.overall_rating)
        .bind(&review.previous_goals_completion)
        .bind(&review.goals)
        .bind(&review.achievements)
        .bind(&review.areas_of_improvement)
        .bind(&review.manager_comments)
        .bind(&review.employee_self_assessment)
        .bind(&review.recommendation)
        .bind(&review.status)
        .bind(now_rfc3339())
        .bind(&review.created_at)
        .bind(&review.id)
        .execute(db)
        .await?;
    Ok(())
}

fn can_view(current: &CurrentUser, user_id: &str) -> bool {
    current.is_management() || current.id == user_id
}

/// POST /api/performance
pub async fn create_review(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<ReviewRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    require_role(&current, &[Role::Admin, Role::Hr, Role::Manager])?;

    let user_id = req.user_id.clone().unwrap_or_default();
    let mut v = Validator::new();
    v.check(!user_id.is_empty(), "user_id", "\"user_id\" is required");
    v.check(
        req.review_period_start.is_some(),
        "review_period_start",
        "\"review_period_start\" is required",
    )
    .check(
        req.review_period_end.is_some(),
        "review_period_end",
        "\"review_period_end\" is required",
    );
    v.finish()?;

    if crate::db::users::find_by_id(&state.db, &user_id).await?.is_none() {
        return Err(ApiError::not_found("User not found"));
    }

    let mut review = PerformanceReview {
        id: Uuid::new_v4().to_string(),
        user_id,
        reviewer_id: Some(current.id.clone()),
        recommendation: "none".into(),
        status: "draft".into(),
        created_at: now_rfc3339(),
        ..Default::default()
    };
    req.apply(&mut review);
    validate_review(&mut review)?;
    save_review(&state.db, &review, true).await?;

    let content = NewNotification::new(
        "performance",
        "New Performance Review",
        format!(
            "{} added a performance review for {} to {}",
            current.name, review.review_period_start, review.review_period_end
        ),
    )
    .link("/performance");
    state.notifier().notify_quietly(&review.user_id, &content).await;

    Ok(created(
        "Performance review created successfully",
        find_review(&state.db, &review.id).await?,
    ))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ReviewListQuery {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
    pub status: Option<String>,
}

/// GET /api/performance
///
/// Managers only see reviews of their own department.
pub async fn list_reviews(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<ReviewListQuery>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin, Role::Hr, Role::Manager])?;

    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_REVIEW);
    qb.push(" WHERE 1 = 1");
    if current.role == Role::Manager {
        qb.push(" AND u.department IS ").push_bind(current.department.clone());
    }
    if let Some(user_id) = query.user_id {
        qb.push(" AND p.user_id = ").push_bind(user_id);
    }
    if let Some(status) = query.status {
        qb.push(" AND p.status = ").push_bind(status);
    }
    qb.push(" ORDER BY p.review_period_end DESC, p.created_at DESC");

    let reviews = qb.build_query_as::<PerformanceReview>().fetch_all(&state.db).await?;
    Ok(success(reviews))
}

/// GET /api/performance/user/:user_id
pub async fn user_reviews(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(user_id): Path<String>,
) -> ApiResult<Json<Value>> {
    if !can_view(&current, &user_id) {
        return Err(ApiError::forbidden("Not authorized to view these reviews"));
    }
    let reviews = sqlx::query_as::<_, PerformanceReview>(&format!(
        "{} WHERE p.user_id = ? ORDER BY p.review_period_end DESC",
        SELECT_REVIEW
    ))
    .bind(&user_id)
    .fetch_all(&state.db)
    .await?;
    Ok(success(reviews))
}

/// GET /api/performance/:id
pub async fn get_review(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    let review = find_review(&state.db, &id).await?;
    if !can_view(&current, &review.user_id) {
        return Err(ApiError::forbidden("Not authorized to view this review"));
    }
    Ok(success(review))
}

/// PUT /api/performance/:id
///
/// Admin, hr, or the manager who wrote the review.
pub async fn update_review(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
    ApiJson(mut req): ApiJson<ReviewRequest>,
) -> ApiResult<Json<Value>> {
    let mut review = find_review(&state.db, &id).await?;
    let is_reviewer =
        current.role == Role::Manager && review.reviewer_id.as_deref() == Some(current.id.as_str());
    if !current.is_admin_or_hr() && !is_reviewer {
        return Err(ApiError::forbidden("Not authorized to update this review"));
    }

    // The reviewed employee is fixed once the review exists
    req.user_id = None;
    req.apply(&mut review);
    validate_review(&mut review)?;
    save_review(&state.db, &review, false).await?;

    Ok(success_with(
        "Performance review updated successfully",
        find_review(&state.db, &id).await?,
    ))
}

/// DELETE /api/performance/:id
pub async fn delete_review(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(id): Path<String>,
) -> ApiResult<Json<Value>> {
    require_role(&current, &[Role::Admin])?;
    let result = sqlx::query("DELETE FROM performance_reviews WHERE id = ?")
        .bind(&id)
        .execute(&state.db)
        .await?;
    if result.rows_affected() == 0 {
        return Err(ApiError::not_found("Performance review not found"));
    }
    Ok(success_with("Performance review deleted successfully", Value::Null))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct StatsQuery {
    #[serde(alias = "userId")]
    pub user_id: Option<String>,
}

/// Totals over a set of overall ratings; unrated reviews only count toward the total
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    pub total_reviews: usize,
    pub average_rating: f64,
    pub rating_distribution: BTreeMap<u8, usize>,
}

impl ReviewStats {
    pub fn from_ratings(ratings: &[Option<i64>]) -> Self {
        let mut rating_distribution: BTreeMap<u8, usize> = (1..=5).map(|r| (r, 0)).collect();
        let rated: Vec<i64> = ratings.iter().flatten().copied().filter(|r| *r > 0).collect();
        for rating in &rated {
            if let Some(count) = u8::try_from(*rating).ok().and_then(|r| rating_distribution.get_mut(&r)) {
                *count += 1;
            }
        }
        let average_rating = if rated.is_empty() {
            0.0
        } else {
            round2(rated.iter().sum::<i64>() as f64 / rated.len() as f64)
        };
        Self {
            total_reviews: ratings.len(),
            average_rating,
            rating_distribution,
        }
    }
}

/// GET /api/performance/stats
pub async fn review_stats(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiQuery(query): ApiQuery<StatsQuery>,
) -> ApiResult<Json<Value>> {
    let user_id = match query.user_id {
        Some(user_id) => user_id,
        None if current.is_management() => String::new(),
        None => current.id.clone(),
    };
    if !user_id.is_empty() && !can_view(&current, &user_id) {
        return Err(ApiError::forbidden("Not authorized to view these reviews"));
    }

    let ratings: Vec<Option<i64>> = if user_id.is_empty() {
        sqlx::query_scalar("SELECT overall_rating FROM performance_reviews")
            .fetch_all(&state.db)
            .await?
    } else {
        sqlx::query_scalar("SELECT overall_rating FROM performance_reviews WHERE user_id = ?")
            .bind(&user_id)
            .fetch_all(&state.db)
            .await?
    };

    Ok(success(ReviewStats::from_ratings(&ratings)))
}
