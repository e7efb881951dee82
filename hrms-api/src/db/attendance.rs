//! Attendance rows

use chrono::NaiveDate;
use hrms_common::attendance::{AttendanceStatus, DayRecord, MonthTally};
use hrms_common::time::{format_date, month_bounds, now_rfc3339, parse_date};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceRecord {
    pub id: String,
    pub user_id: String,
    pub user_name: Option<String>,
    pub department: Option<String>,
    pub date: String,
    pub status: String,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub is_late: bool,
    pub late_by_minutes: i64,
    pub work_minutes: Option<i64>,
    pub overtime_minutes: i64,
    pub leave_type: Option<String>,
    pub notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Columns written when marking or correcting a day
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AttendanceFields {
    pub status: String,
    pub check_in_time: Option<String>,
    pub check_out_time: Option<String>,
    pub is_late: bool,
    pub late_by_minutes: i64,
    pub work_minutes: Option<i64>,
    pub overtime_minutes: i64,
    pub leave_type: Option<String>,
    pub notes: Option<String>,
}

impl AttendanceRecord {
    pub fn fields(&self) -> AttendanceFields {
        AttendanceFields {
            status: self.status.clone(),
            check_in_time: self.check_in_time.clone(),
            check_out_time: self.check_out_time.clone(),
            is_late: self.is_late,
            late_by_minutes: self.late_by_minutes,
            work_minutes: self.work_minutes,
            overtime_minutes: self.overtime_minutes,
            leave_type: self.leave_type.clone(),
            notes: self.notes.clone(),
        }
    }
}

const SELECT_RECORD: &str = r#"
    SELECT a.id, a.user_id, u.name AS user_name, u.department, a.date, a.status,
           a.check_in_time, a.check_out_time, a.is_late, a.late_by_minutes,
           a.work_minutes, a.overtime_minutes, a.leave_type, a.notes,
           a.created_at, a.updated_at
    FROM attendance a
    JOIN users u ON u.id = a.user_id
"#;

pub async fn find(db: &SqlitePool, id: &str) -> sqlx::Result<Option<AttendanceRecord>> {
    sqlx::query_as::<_, AttendanceRecord>(&format!("{} WHERE a.id = ?", SELECT_RECORD))
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_for_day(
    db: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
) -> sqlx::Result<Option<AttendanceRecord>> {
    sqlx::query_as::<_, AttendanceRecord>(&format!(
        "{} WHERE a.user_id = ? AND a.date = ?",
        SELECT_RECORD
    ))
    .bind(user_id)
    .bind(format_date(date))
    .fetch_optional(db)
    .await
}

/// Insert a day; the (user, date) unique index rejects duplicates
pub async fn insert(
    db: &SqlitePool,
    user_id: &str,
    date: NaiveDate,
    fields: &AttendanceFields,
) -> sqlx::Result<String> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO attendance (
            id, user_id, date, status, check_in_time, check_out_time, is_late, late_by_minutes,
            work_minutes, overtime_minutes, leave_type, notes, created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(user_id)
    .bind(format_date(date))
    .bind(&fields.status)
    .bind(&fields.check_in_time)
    .bind(&fields.check_out_time)
    .bind(fields.is_late)
    .bind(fields.late_by_minutes)
    .bind(fields.work_minutes)
    .bind(fields.overtime_minutes)
    .bind(&fields.leave_type)
    .bind(&fields.notes)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    Ok(id)
}

pub async fn update(db: &SqlitePool, id: &str, fields: &AttendanceFields) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE attendance SET
            status = ?, check_in_time = ?, check_out_time = ?, is_late = ?, late_by_minutes = ?,
            work_minutes = ?, overtime_minutes = ?, leave_type = ?, notes = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&fields.status)
    .bind(&fields.check_in_time)
    .bind(&fields.check_out_time)
    .bind(fields.is_late)
    .bind(fields.late_by_minutes)
    .bind(fields.work_minutes)
    .bind(fields.overtime_minutes)
    .bind(&fields.leave_type)
    .bind(&fields.notes)
    .bind(now_rfc3339())
    .bind(id)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn delete(db: &SqlitePool, id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM attendance WHERE id = ?")
        .bind(id)
        .execute(db)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Clone, Default)]
pub struct AttendanceFilter {
    pub user_id: Option<String>,
    /// Restrict to users of one department
    pub department: Option<Option<String>>,
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
    pub status: Option<String>,
}

pub async fn list(
    db: &SqlitePool,
    filter: &AttendanceFilter,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<AttendanceRecord>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new(SELECT_RECORD);
    qb.push(" WHERE 1 = 1");

    if let Some(user_id) = &filter.user_id {
        qb.push(" AND a.user_id = ").push_bind(user_id.clone());
    }
    if let Some(department) = &filter.department {
        qb.push(" AND u.department IS ").push_bind(department.clone());
    }
    if let Some(start) = filter.start {
        qb.push(" AND a.date >= ").push_bind(format_date(start));
    }
    if let Some(end) = filter.end {
        qb.push(" AND a.date <= ").push_bind(format_date(end));
    }
    if let Some(status) = &filter.status {
        qb.push(" AND a.status = ").push_bind(status.clone());
    }

    qb.push(" ORDER BY a.date DESC, u.name LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    qb.build_query_as::<AttendanceRecord>().fetch_all(db).await
}

/// Status per day within `[start, end]`, for one user or everyone
pub async fn day_records(
    db: &SqlitePool,
    user_id: Option<&str>,
    start: NaiveDate,
    end: NaiveDate,
) -> sqlx::Result<Vec<DayRecord>> {
    let mut qb: QueryBuilder<Sqlite> =
        QueryBuilder::new("SELECT user_id, date, status FROM attendance WHERE date >= ");
    qb.push_bind(format_date(start))
        .push(" AND date <= ")
        .push_bind(format_date(end));
    if let Some(user_id) = user_id {
        qb.push(" AND user_id = ").push_bind(user_id.to_string());
    }

    let rows: Vec<(String, String, String)> = qb.build_query_as().fetch_all(db).await?;
    Ok(rows
        .into_iter()
        .filter_map(|(user_id, date, status)| {
            match (parse_date(&date), status.parse::<AttendanceStatus>()) {
                (Ok(date), Ok(status)) => Some(DayRecord { user_id, date, status }),
                _ => {
                    warn!("Skipping unreadable attendance row {} {} {}", user_id, date, status);
                    None
                }
            }
        })
        .collect())
}

/// Late and absent counts for one user's month
pub async fn month_tally(
    db: &SqlitePool,
    user_id: &str,
    year: i32,
    month: u32,
) -> hrms_common::Result<MonthTally> {
    let (first, last) = month_bounds(year, month)?;
    let records = day_records(db, Some(user_id), first, last).await?;
    Ok(MonthTally::from_statuses(records.into_iter().map(|r| r.status)))
}

/// Days marked present or late in a month
pub async fn present_days(
    db: &SqlitePool,
    user_id: &str,
    year: i32,
    month: u32,
) -> hrms_common::Result<u32> {
    let (first, last) = month_bounds(year, month)?;
    let records = day_records(db, Some(user_id), first, last).await?;
    Ok(records.iter().filter(|r| r.status.is_attended()).count() as u32)
}
