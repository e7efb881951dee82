//! Key-value settings stored in the `settings` table

use crate::attendance::ShiftPolicy;
use crate::time::parse_time;
use crate::{Error, Result};
use chrono::NaiveTime;
use sqlx::SqlitePool;

/// Read and parse a setting; `None` when the key is missing or NULL
pub async fn get_setting<T>(db: &SqlitePool, key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value: Option<Option<String>> =
        sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
            .bind(key)
            .fetch_optional(db)
            .await?;

    match value.flatten() {
        Some(value) => value
            .parse::<T>()
            .map(Some)
            .map_err(|e| Error::Config(format!("Setting '{}' is invalid: {}", key, e))),
        None => Ok(None),
    }
}

/// Insert or replace a setting
pub async fn set_setting<T>(db: &SqlitePool, key: &str, value: T) -> Result<()>
where
    T: std::fmt::Display,
{
    sqlx::query(
        "INSERT INTO settings (key, value, updated_at) VALUES (?, ?, CURRENT_TIMESTAMP)
         ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    )
    .bind(key)
    .bind(value.to_string())
    .execute(db)
    .await?;

    Ok(())
}

async fn get_time_setting(db: &SqlitePool, key: &str, default: NaiveTime) -> Result<NaiveTime> {
    match get_setting::<String>(db, key).await? {
        Some(value) => parse_time(&value),
        None => Ok(default),
    }
}

/// Shift start, grace period and standard day length
pub async fn shift_policy(db: &SqlitePool) -> Result<ShiftPolicy> {
    let defaults = ShiftPolicy::default();
    Ok(ShiftPolicy {
        shift_start: get_time_setting(db, "shift_start_time", defaults.shift_start).await?,
        grace_minutes: get_setting(db, "late_grace_minutes")
            .await?
            .unwrap_or(defaults.grace_minutes),
        standard_work_minutes: get_setting(db, "standard_work_minutes")
            .await?
            .unwrap_or(defaults.standard_work_minutes),
    })
}

/// Working days per month used for the per-day salary rate
pub async fn payroll_working_days(db: &SqlitePool) -> Result<u32> {
    get_setting(db, "payroll_working_days")
        .await
        .map(|opt| opt.unwrap_or(crate::payroll::DEFAULT_WORKING_DAYS))
}

/// Local time at which unmarked users are recorded absent
pub async fn auto_absent_time(db: &SqlitePool) -> Result<NaiveTime> {
    let default = NaiveTime::from_hms_opt(19, 0, 0).unwrap_or(NaiveTime::MIN);
    get_time_setting(db, "auto_absent_time", default).await
}

/// Failed logins allowed before the account locks
pub async fn max_failed_logins(db: &SqlitePool) -> Result<i64> {
    get_setting(db, "max_failed_logins").await.map(|opt| opt.unwrap_or(5))
}

pub async fn lockout_minutes(db: &SqlitePool) -> Result<i64> {
    get_setting(db, "lockout_minutes").await.map(|opt| opt.unwrap_or(30))
}

pub async fn session_ttl_days(db: &SqlitePool) -> Result<i64> {
    get_setting(db, "session_ttl_days")
        .await
        .map(|opt| opt.unwrap_or(crate::auth::SESSION_TTL_DAYS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::init_memory_database;

    #[tokio::test]
    async fn test_defaults_seeded() {
        let pool = init_memory_database().await.unwrap();

        let policy = shift_policy(&pool).await.unwrap();
        assert_eq!(policy, ShiftPolicy::default());
        assert_eq!(payroll_working_days(&pool).await.unwrap(), 26);
        assert_eq!(max_failed_logins(&pool).await.unwrap(), 5);
        assert_eq!(lockout_minutes(&pool).await.unwrap(), 30);
        assert_eq!(session_ttl_days(&pool).await.unwrap(), 30);
        assert_eq!(
            auto_absent_time(&pool).await.unwrap(),
            NaiveTime::from_hms_opt(19, 0, 0).unwrap()
        );
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let pool = init_memory_database().await.unwrap();

        set_setting(&pool, "late_grace_minutes", 10).await.unwrap();
        set_setting(&pool, "shift_start_time", "08:45").await.unwrap();

        let policy = shift_policy(&pool).await.unwrap();
        assert_eq!(policy.grace_minutes, 10);
        assert_eq!(policy.shift_start, NaiveTime::from_hms_opt(8, 45, 0).unwrap());
    }

    #[tokio::test]
    async fn test_missing_and_invalid() {
        let pool = init_memory_database().await.unwrap();

        let missing: Option<i64> = get_setting(&pool, "no_such_key").await.unwrap();
        assert!(missing.is_none());

        set_setting(&pool, "max_failed_logins", "lots").await.unwrap();
        assert!(matches!(
            max_failed_logins(&pool).await,
            Err(Error::Config(_))
        ));
    }
}
