//! Job postings

use chrono::NaiveDate;
use hrms_common::time::{now_rfc3339, parse_date};
use serde::Serialize;
use sqlx::SqlitePool;

pub const EMPLOYMENT_TYPES: [&str; 4] = ["full_time", "part_time", "contract", "internship"];
pub const EXPERIENCE_LEVELS: [&str; 4] = ["entry", "mid", "senior", "lead"];
/// Statuses a posting may be set to directly; `deleted` only comes from deletion
pub const EDITABLE_STATUSES: [&str; 3] = ["open", "closed", "on_hold"];

#[derive(Debug, Clone, Default, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub department: Option<String>,
    pub location: Option<String>,
    pub employment_type: Option<String>,
    pub experience_level: Option<String>,
    pub salary_range: Option<String>,
    pub description: String,
    pub requirements: Option<String>,
    pub responsibilities: Option<String>,
    pub benefits: Option<String>,
    pub status: String,
    pub posted_by: Option<String>,
    pub posted_by_name: Option<String>,
    pub posted_date: String,
    pub last_date_to_apply: Option<String>,
    pub vacancies: i64,
    pub filled_positions: i64,
    #[serde(skip_serializing)]
    pub is_deleted: bool,
    #[serde(skip_serializing)]
    pub deleted_at: Option<String>,
    pub application_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Job {
    /// Open, before its deadline and with an unfilled position
    pub fn is_accepting_applications(&self, today: NaiveDate) -> bool {
        let before_deadline = match self.last_date_to_apply.as_deref().map(parse_date) {
            Some(Ok(deadline)) => today <= deadline,
            _ => true,
        };
        self.status == "open"
            && !self.is_deleted
            && before_deadline
            && self.filled_positions < self.vacancies
    }

    /// Text the resume is screened against
    pub fn screening_text(&self) -> String {
        match &self.requirements {
            Some(requirements) if !requirements.trim().is_empty() => {
                format!("{}\n{}", self.description, requirements)
            }
            _ => self.description.clone(),
        }
    }
}

pub const SELECT_JOB: &str = r#"
    SELECT j.*, p.name AS posted_by_name,
           (SELECT COUNT(*) FROM applications a WHERE a.job_id = j.id) AS application_count
    FROM jobs j
    LEFT JOIN users p ON p.id = j.posted_by
"#;

/// Find a posting that has not been deleted
pub async fn find(db: &SqlitePool, id: &str) -> sqlx::Result<Option<Job>> {
    sqlx::query_as::<_, Job>(&format!("{} WHERE j.id = ? AND j.is_deleted = 0", SELECT_JOB))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn insert(db: &SqlitePool, job: &Job) -> sqlx::Result<()> {
    let now = now_rfc3339();
    sqlx::query(
        r#"
        INSERT INTO jobs (
            id, title, department, location, employment_type, experience_level, salary_range,
            description, requirements, responsibilities, benefits, status, posted_by,
            posted_date, last_date_to_apply, vacancies, filled_positions, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&job.id)
    .bind(&job.title)
    .bind(&job.department)
    .bind(&job.location)
    .bind(&job.employment_type)
    .bind(&job.experience_level)
    .bind(&job.salary_range)
    .bind(&job.description)
    .bind(&job.requirements)
    .bind(&job.responsibilities)
    .bind(&job.benefits)
    .bind(&job.status)
    .bind(&job.posted_by)
    .bind(&job.posted_date)
    .bind(&job.last_date_to_apply)
    .bind(job.vacancies)
    .bind(job.filled_positions)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn save(db: &SqlitePool, job: &Job) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE jobs SET
            title = ?, department = ?, location = ?, employment_type = ?, experience_level = ?,
            salary_range = ?, description = ?, requirements = ?, responsibilities = ?,
            benefits = ?, status = ?, posted_date = ?, last_date_to_apply = ?, vacancies = ?,
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&job.title)
    .bind(&job.department)
    .bind(&job.location)
    .bind(&job.employment_type)
    .bind(&job.experience_level)
    .bind(&job.salary_range)
    .bind(&job.description)
    .bind(&job.requirements)
    .bind(&job.responsibilities)
    .bind(&job.benefits)
    .bind(&job.status)
    .bind(&job.posted_date)
    .bind(&job.last_date_to_apply)
    .bind(job.vacancies)
    .bind(now_rfc3339())
    .bind(&job.id)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn soft_delete(db: &SqlitePool, id: &str) -> sqlx::Result<()> {
    let now = now_rfc3339();
    sqlx::query(
        "UPDATE jobs SET status = 'deleted', is_deleted = 1, deleted_at = ?, updated_at = ? WHERE id = ?",
    )
    .bind(&now)
    .bind(&now)
    .bind(id)
    .execute(db)
    .await?;

    Ok(())
}

/// Outcome of filling one position
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    pub filled_positions: i64,
    pub vacancies: i64,
    pub closed: bool,
}

/// Result of hiring an applicant into a posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HireOutcome {
    Hired(FillOutcome),
    /// Every vacancy was already taken; nothing changed
    JobFull,
    /// The application was hired by an earlier request; nothing changed
    AlreadyHired,
}

/// Count a hire against the posting and mark the application hired
///
/// Both writes share one transaction. The increment only applies while a
/// vacancy remains, and the posting closes once the last one is taken.
pub async fn hire_applicant(
    db: &SqlitePool,
    job_id: &str,
    application_id: &str,
) -> sqlx::Result<HireOutcome> {
    let mut tx = db.begin().await?;
    let now = now_rfc3339();

    let incremented = sqlx::query(
        "UPDATE jobs SET filled_positions = filled_positions + 1, updated_at = ?
         WHERE id = ? AND filled_positions < vacancies",
    )
    .bind(&now)
    .bind(job_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if incremented == 0 {
        tx.rollback().await?;
        return Ok(HireOutcome::JobFull);
    }

    let marked = sqlx::query(
        "UPDATE applications SET status = 'hired', updated_at = ? WHERE id = ? AND status != 'hired'",
    )
    .bind(&now)
    .bind(application_id)
    .execute(&mut *tx)
    .await?
    .rows_affected();
    if marked == 0 {
        tx.rollback().await?;
        return Ok(HireOutcome::AlreadyHired);
    }

    let closed = sqlx::query(
        "UPDATE jobs SET status = 'closed' WHERE id = ? AND status = 'open' AND filled_positions >= vacancies",
    )
    .bind(job_id)
    .execute(&mut *tx)
    .await?
    .rows_affected()
        > 0;

    let (filled_positions, vacancies): (i64, i64) =
        sqlx::query_as("SELECT filled_positions, vacancies FROM jobs WHERE id = ?")
            .bind(job_id)
            .fetch_one(&mut *tx)
            .await?;

    tx.commit().await?;
    Ok(HireOutcome::Hired(FillOutcome {
        filled_positions,
        vacancies,
        closed,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrms_common::db::init_memory_database;

    fn job(id: &str, vacancies: i64) -> Job {
        Job {
            id: id.to_string(),
            title: "Backend Engineer".into(),
            description: "Build and run services".into(),
            status: "open".into(),
            posted_date: "2024-01-01".into(),
            vacancies,
            ..Default::default()
        }
    }

    #[test]
    fn test_accepting_applications() {
        let today = parse_date("2024-03-10").unwrap();
        let mut posting = job("j1", 2);
        assert!(posting.is_accepting_applications(today));

        posting.last_date_to_apply = Some("2024-03-09".into());
        assert!(!posting.is_accepting_applications(today));

        posting.last_date_to_apply = Some("2024-03-10".into());
        assert!(posting.is_accepting_applications(today));

        posting.filled_positions = 2;
        assert!(!posting.is_accepting_applications(today));

        posting.filled_positions = 0;
        posting.status = "on_hold".into();
        assert!(!posting.is_accepting_applications(today));
    }

    async fn add_application(db: &SqlitePool, id: &str, job_id: &str, candidate_id: &str) {
        sqlx::query(
            "INSERT INTO applications (id, job_id, candidate_id, created_at, updated_at)
             VALUES (?, ?, ?, '2024-01-01', '2024-01-01')",
        )
        .bind(id)
        .bind(job_id)
        .bind(candidate_id)
        .execute(db)
        .await
        .unwrap();
    }

    async fn application_status(db: &SqlitePool, id: &str) -> String {
        sqlx::query_scalar("SELECT status FROM applications WHERE id = ?")
            .bind(id)
            .fetch_one(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_hire_applicant_closes_and_caps() {
        let db = init_memory_database().await.unwrap();
        sqlx::query("PRAGMA foreign_keys = OFF").execute(&db).await.unwrap();
        insert(&db, &job("j1", 2)).await.unwrap();
        for (app_id, candidate) in [("a1", "c1"), ("a2", "c2"), ("a3", "c3")] {
            add_application(&db, app_id, "j1", candidate).await;
        }

        let HireOutcome::Hired(first) = hire_applicant(&db, "j1", "a1").await.unwrap() else {
            panic!("first hire should succeed");
        };
        assert_eq!(first.filled_positions, 1);
        assert!(!first.closed);

        assert_eq!(
            hire_applicant(&db, "j1", "a1").await.unwrap(),
            HireOutcome::AlreadyHired
        );

        let HireOutcome::Hired(second) = hire_applicant(&db, "j1", "a2").await.unwrap() else {
            panic!("second hire should succeed");
        };
        assert_eq!(second.filled_positions, 2);
        assert!(second.closed);

        assert_eq!(hire_applicant(&db, "j1", "a3").await.unwrap(), HireOutcome::JobFull);
        assert_eq!(application_status(&db, "a3").await, "pending");

        let stored = find(&db, "j1").await.unwrap().unwrap();
        assert_eq!(stored.filled_positions, 2);
        assert_eq!(stored.status, "closed");
    }
}
