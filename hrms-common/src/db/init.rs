//! Database initialization
//!
//! Creates the database file and every table on first run. Schema creation is
//! idempotent, so opening an existing database runs the same path.

use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const BUSY_TIMEOUT: Duration = Duration::from_millis(5000);

/// Open (creating if needed) the database file and bring the schema up to date
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    create_schema(&pool).await?;
    Ok(pool)
}

/// Private in-memory database with the full schema
///
/// Limited to a single connection that never expires, since every SQLite
/// memory connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await?;

    create_schema(&pool).await?;
    Ok(pool)
}

/// Create every table and seed default settings
pub async fn create_schema(pool: &SqlitePool) -> Result<()> {
    create_settings_table(pool).await?;
    create_users_table(pool).await?;
    create_departments_table(pool).await?;
    create_attendance_table(pool).await?;
    create_leaves_table(pool).await?;

    create_salary_structures_table(pool).await?;
    create_payroll_table(pool).await?;
    create_payroll_history_table(pool).await?;

    create_jobs_table(pool).await?;
    create_applications_table(pool).await?;

    create_performance_reviews_table(pool).await?;
    create_events_table(pool).await?;
    create_documents_table(pool).await?;
    create_notifications_table(pool).await?;

    create_password_resets_table(pool).await?;
    create_email_verifications_table(pool).await?;
    create_audit_log_table(pool).await?;
    create_email_outbox_table(pool).await?;

    init_default_settings(pool).await?;
    debug!("Schema ready");
    Ok(())
}

pub async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT,
            updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            password_hash TEXT NOT NULL,
            role TEXT NOT NULL DEFAULT 'employee'
                CHECK (role IN ('admin', 'hr', 'manager', 'employee', 'candidate')),
            employee_id TEXT UNIQUE,
            department TEXT,
            position TEXT,
            salary REAL,
            phone TEXT,
            address TEXT,
            date_of_birth TEXT,
            profile_picture TEXT,
            start_date TEXT,
            is_active INTEGER NOT NULL DEFAULT 1,
            is_email_verified INTEGER NOT NULL DEFAULT 0,
            failed_login_attempts INTEGER NOT NULL DEFAULT 0,
            locked_until TEXT,
            last_login TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_users_department ON users(department)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_departments_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS departments (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            description TEXT,
            manager_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            budget REAL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_attendance_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            date TEXT NOT NULL,
            status TEXT NOT NULL CHECK (status IN ('present', 'absent', 'late', 'on_leave')),
            check_in_time TEXT,
            check_out_time TEXT,
            is_late INTEGER NOT NULL DEFAULT 0,
            late_by_minutes INTEGER NOT NULL DEFAULT 0,
            work_minutes INTEGER,
            overtime_minutes INTEGER NOT NULL DEFAULT 0,
            leave_type TEXT,
            notes TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, date)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_attendance_date ON attendance(date)")
        .execute(pool)
        .await?;

    Ok(())
}

async fn create_leaves_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS leaves (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            leave_type TEXT NOT NULL
                CHECK (leave_type IN ('sick', 'casual', 'annual', 'maternity', 'paternity', 'unpaid')),
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            reason TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'approved', 'rejected', 'cancelled')),
            approved_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            approved_at TEXT,
            rejection_reason TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_salary_structures_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS salary_structures (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            basic_salary REAL NOT NULL,
            hra REAL NOT NULL DEFAULT 0,
            transport_allowance REAL NOT NULL DEFAULT 0,
            medical_allowance REAL NOT NULL DEFAULT 0,
            special_allowance REAL NOT NULL DEFAULT 0,
            provident_fund_percent REAL,
            professional_tax REAL NOT NULL DEFAULT 0,
            insurance REAL NOT NULL DEFAULT 0,
            effective_from TEXT NOT NULL,
            is_active INTEGER NOT NULL DEFAULT 1,
            created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_payroll_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payroll (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            month INTEGER NOT NULL CHECK (month BETWEEN 1 AND 12),
            year INTEGER NOT NULL,
            salary REAL NOT NULL,
            basic_salary REAL,
            hra REAL NOT NULL DEFAULT 0,
            transport_allowance REAL NOT NULL DEFAULT 0,
            medical_allowance REAL NOT NULL DEFAULT 0,
            special_allowance REAL NOT NULL DEFAULT 0,
            overtime_pay REAL NOT NULL DEFAULT 0,
            bonus REAL NOT NULL DEFAULT 0,
            working_days INTEGER,
            present_days INTEGER,
            absent_days INTEGER NOT NULL DEFAULT 0,
            late_days INTEGER NOT NULL DEFAULT 0,
            tax_deduction REAL NOT NULL DEFAULT 0,
            provident_fund REAL NOT NULL DEFAULT 0,
            professional_tax REAL NOT NULL DEFAULT 0,
            insurance REAL NOT NULL DEFAULT 0,
            loan_repayment REAL NOT NULL DEFAULT 0,
            advance_deduction REAL NOT NULL DEFAULT 0,
            other_deductions REAL NOT NULL DEFAULT 0,
            attendance_deductions REAL NOT NULL DEFAULT 0,
            gross_salary REAL NOT NULL,
            total_deductions REAL NOT NULL,
            net_salary REAL NOT NULL,
            generated INTEGER NOT NULL DEFAULT 0,
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'processed', 'paid', 'cancelled')),
            payment_date TEXT,
            payment_method TEXT,
            notes TEXT,
            processed_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            processed_at TEXT,
            created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (user_id, month, year)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_payroll_history_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS payroll_history (
            id TEXT PRIMARY KEY,
            payroll_id TEXT NOT NULL REFERENCES payroll(id) ON DELETE CASCADE,
            action TEXT NOT NULL,
            changed_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            changes TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_jobs_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            department TEXT,
            location TEXT,
            employment_type TEXT
                CHECK (employment_type IN ('full_time', 'part_time', 'contract', 'internship')),
            experience_level TEXT CHECK (experience_level IN ('entry', 'mid', 'senior', 'lead')),
            salary_range TEXT,
            description TEXT NOT NULL,
            requirements TEXT,
            responsibilities TEXT,
            benefits TEXT,
            status TEXT NOT NULL DEFAULT 'open'
                CHECK (status IN ('open', 'closed', 'on_hold', 'deleted')),
            posted_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            posted_date TEXT NOT NULL,
            last_date_to_apply TEXT,
            vacancies INTEGER NOT NULL DEFAULT 1,
            filled_positions INTEGER NOT NULL DEFAULT 0,
            is_deleted INTEGER NOT NULL DEFAULT 0,
            deleted_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_applications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS applications (
            id TEXT PRIMARY KEY,
            job_id TEXT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
            candidate_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            resume_url TEXT,
            resume_text TEXT,
            cover_letter TEXT,
            status TEXT NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'reviewed', 'shortlisted', 'rejected', 'hired')),
            ats_score INTEGER,
            ats_recommendation TEXT,
            ats_analysis TEXT,
            ats_screened_at TEXT,
            ats_screened_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            interview_date TEXT,
            interview_time TEXT,
            interview_location TEXT,
            interview_type TEXT,
            interview_notes TEXT,
            interview_token TEXT,
            interview_status TEXT,
            onboarding_token TEXT UNIQUE,
            onboarding_token_expires TEXT,
            onboarding_completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            UNIQUE (job_id, candidate_id)
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_performance_reviews_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS performance_reviews (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            reviewer_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            review_period_start TEXT NOT NULL,
            review_period_end TEXT NOT NULL,
            quality_of_work INTEGER,
            productivity INTEGER,
            communication INTEGER,
            teamwork INTEGER,
            problem_solving INTEGER,
            initiative INTEGER,
            attendance_punctuality INTEGER,
            overall_rating INTEGER,
            previous_goals_completion TEXT,
            goals TEXT,
            achievements TEXT,
            areas_of_improvement TEXT,
            manager_comments TEXT,
            employee_self_assessment TEXT,
            recommendation TEXT NOT NULL DEFAULT 'none'
                CHECK (recommendation IN ('none', 'promotion', 'bonus', 'training', 'pip')),
            status TEXT NOT NULL DEFAULT 'draft'
                CHECK (status IN ('draft', 'submitted', 'completed')),
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_events_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS events (
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            description TEXT,
            start_date TEXT NOT NULL,
            end_date TEXT NOT NULL,
            event_type TEXT NOT NULL DEFAULT 'event',
            location TEXT,
            department TEXT,
            all_day INTEGER NOT NULL DEFAULT 0,
            created_by TEXT REFERENCES users(id) ON DELETE SET NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_documents_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS documents (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            category TEXT NOT NULL DEFAULT 'other',
            description TEXT,
            file_url TEXT NOT NULL,
            file_size INTEGER,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_notifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS notifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            title TEXT NOT NULL,
            message TEXT NOT NULL,
            type TEXT NOT NULL DEFAULT 'info'
                CHECK (type IN ('info', 'success', 'warning', 'error')),
            category TEXT NOT NULL DEFAULT 'system',
            link TEXT,
            is_read INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_notifications_user ON notifications(user_id, is_read)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_password_resets_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS password_resets (
            id TEXT PRIMARY KEY,
            email TEXT NOT NULL,
            code TEXT NOT NULL,
            expires_at TEXT NOT NULL,
            used INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_email_verifications_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_verifications (
            id TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token TEXT NOT NULL UNIQUE,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_audit_log_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS audit_log (
            id TEXT PRIMARY KEY,
            user_id TEXT REFERENCES users(id) ON DELETE SET NULL,
            action TEXT NOT NULL,
            details TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

async fn create_email_outbox_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS email_outbox (
            id TEXT PRIMARY KEY,
            recipient TEXT NOT NULL,
            subject TEXT NOT NULL,
            html_body TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'queued',
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

/// Seed tunable business settings, leaving existing values alone
async fn init_default_settings(pool: &SqlitePool) -> Result<()> {
    // Attendance
    ensure_setting(pool, "shift_start_time", "09:30").await?;
    ensure_setting(pool, "late_grace_minutes", "0").await?;
    ensure_setting(pool, "standard_work_minutes", "480").await?;
    ensure_setting(pool, "auto_absent_time", "19:00").await?;

    // Payroll
    ensure_setting(pool, "payroll_working_days", "26").await?;

    // Authentication
    ensure_setting(pool, "max_failed_logins", "5").await?;
    ensure_setting(pool, "lockout_minutes", "30").await?;
    ensure_setting(pool, "session_ttl_days", "30").await?;

    Ok(())
}

/// Create a setting with its default, or reset it when stored as NULL
async fn ensure_setting(pool: &SqlitePool, key: &str, default_value: &str) -> Result<()> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM settings WHERE key = ?)")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if !exists {
        sqlx::query("INSERT OR IGNORE INTO settings (key, value) VALUES (?, ?)")
            .bind(key)
            .bind(default_value)
            .execute(pool)
            .await?;

        debug!("Initialized setting '{}' with default value: {}", key, default_value);
        return Ok(());
    }

    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_one(pool)
        .await?;

    if value.is_none() {
        sqlx::query("UPDATE settings SET value = ? WHERE key = ?")
            .bind(default_value)
            .bind(key)
            .execute(pool)
            .await?;

        warn!("Setting '{}' was NULL, reset to default: {}", key, default_value);
    }

    Ok(())
}
