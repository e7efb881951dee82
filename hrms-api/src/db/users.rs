//! User accounts

use hrms_common::roles::Role;
use hrms_common::time::now_rfc3339;
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use uuid::Uuid;

/// A row of the `users` table
///
/// Credential and lockout columns are never serialized.
#[derive(Debug, Clone, PartialEq, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub profile_picture: Option<String>,
    pub start_date: Option<String>,
    pub is_active: bool,
    pub is_email_verified: bool,
    #[serde(skip_serializing)]
    pub failed_login_attempts: i64,
    #[serde(skip_serializing)]
    pub locked_until: Option<String>,
    pub last_login: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Fields for a new account
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub role: Role,
    pub employee_id: Option<String>,
    pub department: Option<String>,
    pub position: Option<String>,
    pub salary: Option<f64>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub date_of_birth: Option<String>,
    pub start_date: Option<String>,
    pub is_email_verified: bool,
}

impl NewUser {
    pub fn new(name: &str, email: &str, password_hash: String, role: Role) -> Self {
        Self {
            name: name.trim().to_string(),
            email: normalize_email(email),
            password_hash,
            role,
            employee_id: None,
            department: None,
            position: None,
            salary: None,
            phone: None,
            address: None,
            date_of_birth: None,
            start_date: None,
            is_email_verified: false,
        }
    }
}

/// Emails are stored trimmed and lowercased
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub async fn find_by_id(db: &SqlitePool, id: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
        .bind(id)
        .fetch_optional(db)
        .await
}

pub async fn find_by_email(db: &SqlitePool, email: &str) -> sqlx::Result<Option<User>> {
    sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
        .bind(normalize_email(email))
        .fetch_optional(db)
        .await
}

pub async fn email_exists(db: &SqlitePool, email: &str) -> sqlx::Result<bool> {
    sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(normalize_email(email))
        .fetch_one(db)
        .await
}

/// Insert a user and return the stored row
pub async fn insert(db: &SqlitePool, new: &NewUser) -> sqlx::Result<User> {
    let id = Uuid::new_v4().to_string();
    let now = now_rfc3339();

    sqlx::query(
        r#"
        INSERT INTO users (
            id, name, email, password_hash, role, employee_id, department, position,
            salary, phone, address, date_of_birth, start_date, is_email_verified,
            created_at, updated_at
        )
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&id)
    .bind(&new.name)
    .bind(&new.email)
    .bind(&new.password_hash)
    .bind(new.role.as_str())
    .bind(&new.employee_id)
    .bind(&new.department)
    .bind(&new.position)
    .bind(new.salary)
    .bind(&new.phone)
    .bind(&new.address)
    .bind(&new.date_of_birth)
    .bind(&new.start_date)
    .bind(new.is_email_verified)
    .bind(&now)
    .bind(&now)
    .execute(db)
    .await?;

    find_by_id(db, &id).await?.ok_or(sqlx::Error::RowNotFound)
}

/// Write back every editable profile column
pub async fn save(db: &SqlitePool, user: &User) -> sqlx::Result<()> {
    sqlx::query(
        r#"
        UPDATE users SET
            name = ?, role = ?, employee_id = ?, department = ?, position = ?, salary = ?,
            phone = ?, address = ?, date_of_birth = ?, profile_picture = ?, start_date = ?,
            is_active = ?, is_email_verified = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&user.name)
    .bind(user.role.as_str())
    .bind(&user.employee_id)
    .bind(&user.department)
    .bind(&user.position)
    .bind(user.salary)
    .bind(&user.phone)
    .bind(&user.address)
    .bind(&user.date_of_birth)
    .bind(&user.profile_picture)
    .bind(&user.start_date)
    .bind(user.is_active)
    .bind(user.is_email_verified)
    .bind(now_rfc3339())
    .bind(&user.id)
    .execute(db)
    .await?;

    Ok(())
}

/// Replace the password hash and clear any lockout
pub async fn set_password(db: &SqlitePool, user_id: &str, password_hash: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE users SET password_hash = ?, failed_login_attempts = 0, locked_until = NULL,
         updated_at = ? WHERE id = ?",
    )
    .bind(password_hash)
    .bind(now_rfc3339())
    .bind(user_id)
    .execute(db)
    .await?;

    Ok(())
}

/// Store the failure counter and optional lock expiry
pub async fn record_failed_login(
    db: &SqlitePool,
    user_id: &str,
    attempts: i64,
    locked_until: Option<&str>,
) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET failed_login_attempts = ?, locked_until = ? WHERE id = ?")
        .bind(attempts)
        .bind(locked_until)
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(())
}

pub async fn record_successful_login(db: &SqlitePool, user_id: &str) -> sqlx::Result<()> {
    sqlx::query(
        "UPDATE users SET failed_login_attempts = 0, locked_until = NULL, last_login = ? WHERE id = ?",
    )
    .bind(now_rfc3339())
    .bind(user_id)
    .execute(db)
    .await?;

    Ok(())
}

pub async fn mark_email_verified(db: &SqlitePool, user_id: &str) -> sqlx::Result<()> {
    sqlx::query("UPDATE users SET is_email_verified = 1, updated_at = ? WHERE id = ?")
        .bind(now_rfc3339())
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(())
}

pub async fn delete(db: &SqlitePool, user_id: &str) -> sqlx::Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(db)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Which users a listing may return
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserScope {
    All,
    /// Employees of a department plus the manager themselves
    Team { department: Option<String>, manager_id: String },
    Only(String),
}

#[derive(Debug, Clone, Default)]
pub struct UserFilter {
    pub role: Option<String>,
    pub department: Option<String>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

pub async fn list(
    db: &SqlitePool,
    scope: &UserScope,
    filter: &UserFilter,
    limit: i64,
    offset: i64,
) -> sqlx::Result<Vec<User>> {
    let mut qb: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT * FROM users WHERE 1 = 1");

    match scope {
        UserScope::All => {}
        UserScope::Team { department, manager_id } => {
            qb.push(" AND ((role = 'employee' AND department IS ")
                .push_bind(department.clone())
                .push(") OR id = ")
                .push_bind(manager_id.clone())
                .push(")");
        }
        UserScope::Only(id) => {
            qb.push(" AND id = ").push_bind(id.clone());
        }
    }

    if let Some(role) = &filter.role {
        qb.push(" AND role = ").push_bind(role.clone());
    }
    if let Some(department) = &filter.department {
        qb.push(" AND department = ").push_bind(department.clone());
    }
    if let Some(active) = filter.is_active {
        qb.push(" AND is_active = ").push_bind(active);
    }
    if let Some(search) = &filter.search {
        let pattern = format!("%{}%", search.trim());
        qb.push(" AND (name LIKE ")
            .push_bind(pattern.clone())
            .push(" OR email LIKE ")
            .push_bind(pattern)
            .push(")");
    }

    qb.push(" ORDER BY created_at DESC LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);

    qb.build_query_as::<User>().fetch_all(db).await
}

/// Next `EMP###` identifier, one past the highest numeric suffix in use
pub async fn next_employee_id(db: &SqlitePool) -> sqlx::Result<String> {
    let existing: Vec<String> =
        sqlx::query_scalar("SELECT employee_id FROM users WHERE employee_id LIKE 'EMP%'")
            .fetch_all(db)
            .await?;

    let highest = existing
        .iter()
        .filter_map(|id| id.strip_prefix("EMP")?.parse::<u32>().ok())
        .max()
        .unwrap_or(0);

    Ok(format!("EMP{:03}", highest + 1))
}

/// User counts per role
pub async fn count_by_role(db: &SqlitePool) -> sqlx::Result<Vec<(String, i64)>> {
    sqlx::query_as("SELECT role, COUNT(*) FROM users GROUP BY role ORDER BY role")
        .fetch_all(db)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use hrms_common::db::init_memory_database;

    #[tokio::test]
    async fn test_insert_and_find() {
        let db = init_memory_database().await.unwrap();
        let new = NewUser::new("Ada", "  Ada@Example.com ", "hash".into(), Role::Employee);
        let user = insert(&db, &new).await.unwrap();

        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.role, Role::Employee);
        assert!(user.is_active);

        let found = find_by_email(&db, "ADA@example.com").await.unwrap().unwrap();
        assert_eq!(found.id, user.id);

        let json = serde_json::to_value(&found).unwrap();
        assert!(json.get("passwordHash").is_none());
        assert!(json.get("password_hash").is_none());
        assert!(json.get("lockedUntil").is_none());
    }

    #[tokio::test]
    async fn test_next_employee_id() {
        let db = init_memory_database().await.unwrap();
        assert_eq!(next_employee_id(&db).await.unwrap(), "EMP001");

        let mut new = NewUser::new("A", "a@example.com", "h".into(), Role::Employee);
        new.employee_id = Some("EMP009".into());
        insert(&db, &new).await.unwrap();

        let mut new = NewUser::new("B", "b@example.com", "h".into(), Role::Employee);
        new.employee_id = Some("EMP-legacy".into());
        insert(&db, &new).await.unwrap();

        assert_eq!(next_employee_id(&db).await.unwrap(), "EMP010");
    }

    #[tokio::test]
    async fn test_team_scope() {
        let db = init_memory_database().await.unwrap();

        let mut manager = NewUser::new("M", "m@example.com", "h".into(), Role::Manager);
        manager.department = Some("Engineering".into());
        let manager = insert(&db, &manager).await.unwrap();

        let mut member = NewUser::new("E", "e@example.com", "h".into(), Role::Employee);
        member.department = Some("Engineering".into());
        insert(&db, &member).await.unwrap();

        let mut outsider = NewUser::new("O", "o@example.com", "h".into(), Role::Employee);
        outsider.department = Some("Sales".into());
        insert(&db, &outsider).await.unwrap();

        let scope = UserScope::Team {
            department: manager.department.clone(),
            manager_id: manager.id.clone(),
        };
        let team = list(&db, &scope, &UserFilter::default(), 100, 0).await.unwrap();
        let mut emails: Vec<_> = team.iter().map(|u| u.email.as_str()).collect();
        emails.sort();
        assert_eq!(emails, vec!["e@example.com", "m@example.com"]);
    }
}
