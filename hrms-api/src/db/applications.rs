//! Job applications and onboarding tokens

use chrono::{DateTime, Utc};
use hrms_common::time::{format_timestamp, now_rfc3339, parse_timestamp};
use serde::Serialize;
use serde_json::Value;
use sqlx::types::Json;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

pub const STATUSES: [&str; 5] = ["pending", "reviewed", "shortlisted", "rejected", "hired"];

/// Application joined with its job and candidate
///
/// Interview and onboarding tokens stay server-side.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    pub id: String,
    pub job_id: String,
    pub job_title: Option<String>,
    pub job_department: Option<String>,
    pub candidate_id: String,
    pub candidate_name: Option<String>,
    pub candidate_email: Option<String>,
    pub resume_url: Option<String>,
    pub resume_text: Option<String>,
    pub cover_letter: Option<String>,
    pub status: String,
    pub ats_score: Option<i64>,
    pub ats_recommendation: Option<String>,
    pub ats_analysis: Option<Json<Value>>,
    pub ats_screened_at: Option<String>,
    pub ats_screened_by: Option<String>,
    pub interview_date: Option<String>,
    pub interview_time: Option<String>,
    pub interview_location: Option<String>,
    pub interview_type: Option<String>,
    pub interview_notes: Option<String>,
    #[serde(skip_serializing)]
    pub interview_token: Option<String>,
    pub interview_status: Option<String>,
    #[serde(skip_serializing)]
    pub onboarding_token: Option<String>,
    #[serde(skip_serializing)]
    pub onboarding_token_expires: Option<String>,
    pub onboarding_completed_at: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Application {
    /// Whether the onboarding token has run out at `now`
    ///
    /// An unparseable expiry counts as expired.
    pub fn onboarding_expired(&self, now: DateTime<Utc>) -> bool {
        match self.onboarding_token_expires.as_deref().and_then(parse_timestamp) {
            Some(expires) => now > expires,
            None => true,
        }
    }
}

const SELECT_APPLICATION: &str = r#"
    SELECT a.*, j.title AS job_title, j.department AS job_department,
           c.name AS candidate_name, c.email AS candidate_email
    FROM applications a
    LEFT JOIN jobs j ON j.id = a.job_id
    LEFT JOIN users c ON c.id = a.candidate_id
"#;

pub struct NewApplication<'a> {
    pub job_id: &'a str,
    pub candidate_id: &'a str,
    pub resume_url: Option<&'a str>,
    pub resume_text: Option<&'a str>,
    pub cover_letter: Option<&'a str>,
}

#[derive(Debug, Clone, Default)]
pub struct ApplicationFilter {
    pub candidate_id: Option<String>,
    pub job_id: Option<String>,
    pub status: Option<String>,
}

pub async fn find(db: &SqlitePool, id: &str) -> sqlx::Result<Option<Application>> {
    sqlx::query_as::<_, Application>(&format!("{} WHERE a.id = ?", SELECT_APPLICATION))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_onboarding_token(db: &SqlitePool, token: &str) -> sqlx::Result<Option<Application>> {
    sqlx::query_as::<_, Application>(&format!("{} WHERE a.onboarding_token = ?", SELECT_APPLICATION))
        .bind(token)
        .fetch_optional(db)
        .await
}

/// Insert a pending application, returning its id
///
/// A second application for the same job and candidate fails with a unique
/// violation.
pub async fn insert(db: &SqlitePool, new: &NewApplication<'_>) -> sqlx::Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();
    sqlx::query(
        "INSERT INTO applications (id, job_id, candidate_id, resume_url, resume_text, cover_letter,
                                   status, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?, ?, 'pending', ?, ?)",
    )
    .bind(&id)
    .bind(new.job_id)
    .bind(new.candidate_id)
    .bind(new.resume_url)
    .bind(new.resume_text)
    .bind(new.cover_letter)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;
    Ok(id)
}

pub async fn list(db: &SqlitePool, filter: &ApplicationFilter) -> sqlx::Result<Vec<Application>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_APPLICATION);
    qb.push(" WHERE 1 = 1");
    if let Some(candidate_id) = &filter.candidate_id {
        qb.push(" AND a.candidate_id = ").push_bind(candidate_id.clone());
    }
    if let Some(job_id) = &filter.job_id {
        qb.push(" AND a.job_id = ").push_bind(job_id.clone());
    }
    if let Some(status) = &filter.status {
        qb.push(" AND a.status = ").push_bind(status.clone());
    }
    qb.push(" ORDER BY a.created_at DESC");
    qb.build_query_as::<Application>().fetch_all(db).await
}

pub async fn set_status(db: &SqlitePool, id: &str, status: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE applications SET status = ?, updated_at = ? WHERE id = ?")
        .bind(status)
        .bind(now_rfc3339())
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

/// Attach an onboarding token valid until `expires`
pub async fn set_onboarding_token(
    db: &SqlitePool,
    id: &str,
    token: &str,
    expires: DateTime<Utc>,
) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE applications SET onboarding_token = ?, onboarding_token_expires = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(token)
    .bind(format_timestamp(expires))
    .bind(now_rfc3339())
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn record_screening(
    db: &SqlitePool,
    id: &str,
    score: u32,
    recommendation: &str,
    analysis: &Value,
    screened_by: &str,
) -> sqlx::Result<()> {
    let now = now_rfc3339();
    sqlx::query(
        "UPDATE applications SET ats_score = ?, ats_recommendation = ?, ats_analysis = ?,
                                 ats_screened_at = ?, ats_screened_by = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(score as i64)
    .bind(recommendation)
    .bind(analysis.to_string())
    .bind(&now)
    .bind(screened_by)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct InterviewSchedule {
    pub date: String,
    pub time: Option<String>,
    pub location: Option<String>,
    pub interview_type: Option<String>,
    pub notes: Option<String>,
}

/// Book an interview; pending and reviewed applications move to shortlisted
pub async fn schedule_interview(
    db: &SqlitePool,
    id: &str,
    schedule: &InterviewSchedule,
    token: &str,
) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE applications SET
            interview_date = ?, interview_time = ?, interview_location = ?, interview_type = ?,
            interview_notes = ?, interview_token = ?, interview_status = 'scheduled',
            status = CASE WHEN status IN ('pending', 'reviewed') THEN 'shortlisted' ELSE status END,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&schedule.date)
    .bind(&schedule.time)
    .bind(&schedule.location)
    .bind(&schedule.interview_type)
    .bind(&schedule.notes)
    .bind(token)
    .bind(now_rfc3339())
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

/// Consume the onboarding token
pub async fn complete_onboarding(db: &SqlitePool, id: &str) -> sqlx::Result<()> {
    let now = now_rfc3339();
    sqlx::query(
        "UPDATE applications SET onboarding_token = NULL, onboarding_token_expires = NULL,
                                 onboarding_completed_at = ?, updated_at = ?
         WHERE id = ?",
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;
    Ok(())
}

pub async fn delete(db: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM applications WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::jobs::{self, Job};
    use crate::db::users::{self, NewUser};
    use chrono::Duration;
    use hrms_common::db::init_memory_database;
    use hrms_common::roles::Role;

    async fn seed(db: &SqlitePool) -> (String, String) {
        let candidate = users::insert(db, &NewUser::new("Cara", "cara@example.com", "h".into(), Role::Candidate))
            .await
            .unwrap();
        let job = Job {
            id: "job-1".into(),
            title: "Platform Engineer".into(),
            description: "Run the platform".into(),
            status: "open".into(),
            posted_date: "2024-01-01".into(),
            vacancies: 1,
            ..Default::default()
        };
        jobs::insert(db, &job).await.unwrap();
        (job.id, candidate.id)
    }

    #[tokio::test]
    async fn test_duplicate_application_rejected() {
        let db = init_memory_database().await.unwrap();
        let (job_id, candidate_id) = seed(&db).await;
        let new = NewApplication {
            job_id: &job_id,
            candidate_id: &candidate_id,
            resume_url: None,
            resume_text: Some("rust"),
            cover_letter: None,
        };

        let id = insert(&db, &new).await.unwrap();
        let err = insert(&db, &new).await.unwrap_err();
        assert!(hrms_common::Error::from(err).is_unique_violation());

        let found = find(&db, &id).await.unwrap().unwrap();
        assert_eq!(found.status, "pending");
        assert_eq!(found.job_title.as_deref(), Some("Platform Engineer"));
        assert_eq!(found.candidate_email.as_deref(), Some("cara@example.com"));
    }

    #[tokio::test]
    async fn test_interview_shortlists_pending_only() {
        let db = init_memory_database().await.unwrap();
        let (job_id, candidate_id) = seed(&db).await;
        let id = insert(
            &db,
            &NewApplication {
                job_id: &job_id,
                candidate_id: &candidate_id,
                resume_url: None,
                resume_text: None,
                cover_letter: None,
            },
        )
        .await
        .unwrap();

        let schedule = InterviewSchedule {
            date: "2024-06-01".into(),
            ..Default::default()
        };
        schedule_interview(&db, &id, &schedule, "tok").await.unwrap();
        let found = find(&db, &id).await.unwrap().unwrap();
        assert_eq!(found.status, "shortlisted");
        assert_eq!(found.interview_status.as_deref(), Some("scheduled"));

        set_status(&db, &id, "rejected").await.unwrap();
        schedule_interview(&db, &id, &schedule, "tok2").await.unwrap();
        assert_eq!(find(&db, &id).await.unwrap().unwrap().status, "rejected");
    }

    #[tokio::test]
    async fn test_onboarding_token_lifecycle() {
        let db = init_memory_database().await.unwrap();
        let (job_id, candidate_id) = seed(&db).await;
        let id = insert(
            &db,
            &NewApplication {
                job_id: &job_id,
                candidate_id: &candidate_id,
                resume_url: None,
                resume_text: None,
                cover_letter: None,
            },
        )
        .await
        .unwrap();

        let now = Utc::now();
        set_onboarding_token(&db, &id, "onboard-me", now + Duration::days(7))
            .await
            .unwrap();
        let found = find_by_onboarding_token(&db, "onboard-me").await.unwrap().unwrap();
        assert!(!found.onboarding_expired(now));
        assert!(found.onboarding_expired(now + Duration::days(8)));

        let json = serde_json::to_value(&found).unwrap();
        assert!(json.get("onboardingToken").is_none());

        complete_onboarding(&db, &id).await.unwrap();
        assert!(find_by_onboarding_token(&db, "onboard-me").await.unwrap().is_none());
        assert!(find(&db, &id).await.unwrap().unwrap().onboarding_completed_at.is_some());
    }
}
