//! Daily auto-absent job
//!
//! After working hours every active, started, non-candidate user without an
//! attendance row for the day gets one: `on_leave` when an approved leave
//! covers the day, `absent` otherwise.

use crate::AppState;
use chrono::{Local, NaiveDate};
use hrms_common::db::auto_absent_time;
use hrms_common::events::HrmsEvent;
use hrms_common::time::{duration_until, format_date, is_weekend, now, now_rfc3339, today};
use serde::Serialize;
use sqlx::SqlitePool;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};
use uuid::Uuid;

/// Outcome of one auto-absent pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutoMarkSummary {
    pub date: NaiveDate,
    pub absent: u64,
    pub on_leave: u64,
    pub skipped_weekend: bool,
}

/// Record the day for everyone who has not marked attendance
pub async fn auto_mark_absent(db: &SqlitePool, date: NaiveDate) -> hrms_common::Result<AutoMarkSummary> {
    let mut summary = AutoMarkSummary {
        date,
        absent: 0,
        on_leave: 0,
        skipped_weekend: false,
    };
    if is_weekend(date) {
        summary.skipped_weekend = true;
        return Ok(summary);
    }

    let day = format_date(date);
    let unmarked: Vec<(String, bool)> = sqlx::query_as(
        r#"
        SELECT u.id,
               EXISTS(SELECT 1 FROM leaves l
                      WHERE l.user_id = u.id AND l.status = 'approved'
                        AND l.start_date <= ?1 AND l.end_date >= ?1)
        FROM users u
        WHERE u.is_active = 1
          AND u.role != 'candidate'
          AND (u.start_date IS NULL OR u.start_date <= ?1)
          AND NOT EXISTS(SELECT 1 FROM attendance a WHERE a.user_id = u.id AND a.date = ?1)
        "#,
    )
    .bind(&day)
    .fetch_all(db)
    .await?;

    let mut tx = db.begin().await?;
    for (user_id, on_leave) in unmarked {
        let status = if on_leave { "on_leave" } else { "absent" };
        let created = now_rfc3339();
        // A user may check in between the select and this insert
        let inserted = sqlx::query(
            "INSERT OR IGNORE INTO attendance (id, user_id, date, status, notes, created_at, updated_at)
             VALUES (?, ?, ?, ?, 'Auto-marked', ?, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user_id)
        .bind(&day)
        .bind(status)
        .bind(&created)
        .bind(&created)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        if inserted > 0 {
            if on_leave {
                summary.on_leave += 1;
            } else {
                summary.absent += 1;
            }
        }
    }
    tx.commit().await?;

    Ok(summary)
}

/// Run the pass for `date` and publish the result
pub async fn run_once(state: &AppState, date: NaiveDate) -> hrms_common::Result<AutoMarkSummary> {
    let summary = auto_mark_absent(&state.db, date).await?;
    if summary.skipped_weekend {
        debug!("Auto-absent skipped for weekend {}", date);
    } else {
        info!(
            "Auto-absent for {}: {} absent, {} on leave",
            date, summary.absent, summary.on_leave
        );
        state.event_bus.emit_lossy(HrmsEvent::AttendanceAutoMarked {
            date,
            absent: summary.absent,
            on_leave: summary.on_leave,
            timestamp: now(),
        });
    }
    Ok(summary)
}

/// Spawn the daily loop
///
/// The run time is re-read from settings before every sleep so a changed
/// `auto_absent_time` applies from the next day.
pub fn spawn_auto_absent(state: AppState) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Auto-absent job started");
        loop {
            let wait = match auto_absent_time(&state.db).await {
                Ok(at) => duration_until(Local::now().naive_local(), at),
                Err(e) => {
                    error!("Invalid auto_absent_time setting, retrying in an hour: {}", e);
                    Duration::from_secs(3600)
                }
            };
            debug!("Next auto-absent run in {}s", wait.as_secs());
            tokio::time::sleep(wait).await;

            if let Err(e) = run_once(&state, today()).await {
                error!("Auto-absent run failed: {}", e);
            }
            // Step past the trigger second so it does not fire twice
            tokio::time::sleep(Duration::from_secs(1)).await;
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrms_common::db::init_memory_database;

    async fn seed_user(db: &SqlitePool, id: &str, role: &str, start_date: Option<&str>, active: bool) {
        let created = now_rfc3339();
        sqlx::query(
            "INSERT INTO users (id, name, email, password_hash, role, start_date, is_active, created_at, updated_at)
             VALUES (?, ?, ?, 'x', ?, ?, ?, ?, ?)",
        )
        .bind(id)
        .bind(id)
        .bind(format!("{}@example.com", id))
        .bind(role)
        .bind(start_date)
        .bind(active)
        .bind(&created)
        .bind(&created)
        .execute(db)
        .await
        .unwrap();
    }

    async fn status_of(db: &SqlitePool, user_id: &str, date: &str) -> Option<String> {
        sqlx::query_scalar("SELECT status FROM attendance WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date)
            .fetch_optional(db)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_marks_absent_and_on_leave() {
        let db = init_memory_database().await.unwrap();
        // Wednesday
        let date = NaiveDate::from_ymd_opt(2024, 3, 6).unwrap();

        seed_user(&db, "worker", "employee", Some("2024-01-01"), true).await;
        seed_user(&db, "holiday", "employee", Some("2024-01-01"), true).await;
        seed_user(&db, "marked", "manager", Some("2024-01-01"), true).await;
        seed_user(&db, "future", "employee", Some("2024-04-01"), true).await;
        seed_user(&db, "applicant", "candidate", None, true).await;
        seed_user(&db, "gone", "employee", Some("2024-01-01"), false).await;

        let created = now_rfc3339();
        sqlx::query(
            "INSERT INTO leaves (id, user_id, leave_type, start_date, end_date, status, created_at, updated_at)
             VALUES ('l1', 'holiday', 'annual', '2024-03-05', '2024-03-07', 'approved', ?, ?)",
        )
        .bind(&created)
        .bind(&created)
        .execute(&db)
        .await
        .unwrap();
        sqlx::query(
            "INSERT INTO attendance (id, user_id, date, status, created_at, updated_at)
             VALUES ('a1', 'marked', '2024-03-06', 'present', ?, ?)",
        )
        .bind(&created)
        .bind(&created)
        .execute(&db)
        .await
        .unwrap();

        let summary = auto_mark_absent(&db, date).await.unwrap();
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.on_leave, 1);

        assert_eq!(status_of(&db, "worker", "2024-03-06").await.as_deref(), Some("absent"));
        assert_eq!(status_of(&db, "holiday", "2024-03-06").await.as_deref(), Some("on_leave"));
        assert_eq!(status_of(&db, "marked", "2024-03-06").await.as_deref(), Some("present"));
        assert_eq!(status_of(&db, "future", "2024-03-06").await, None);
        assert_eq!(status_of(&db, "applicant", "2024-03-06").await, None);
        assert_eq!(status_of(&db, "gone", "2024-03-06").await, None);

        // Second pass finds nothing left to mark
        let again = auto_mark_absent(&db, date).await.unwrap();
        assert_eq!((again.absent, again.on_leave), (0, 0));
    }

    #[tokio::test]
    async fn test_weekend_is_skipped() {
        let db = init_memory_database().await.unwrap();
        seed_user(&db, "worker", "employee", None, true).await;

        let saturday = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let summary = auto_mark_absent(&db, saturday).await.unwrap();
        assert!(summary.skipped_weekend);
        assert_eq!(status_of(&db, "worker", "2024-03-09").await, None);
    }
}
