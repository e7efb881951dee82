//! Registration, login and credential recovery

use crate::api::{ApiJson, CurrentUser};
use crate::db::audit::{self, action};
use crate::db::users::{self, NewUser, User};
use crate::error::{created, success, success_with};
use crate::services::mailer::{send_quietly, templates};
use crate::services::notifier::NewNotification;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use chrono::Duration;
use hrms_common::auth::{generate_reset_code, generate_url_token, hash_password, verify_password};
use hrms_common::db::settings;
use hrms_common::roles::{role_permissions, Role};
use hrms_common::time::{format_timestamp, now, now_rfc3339, parse_timestamp};
use hrms_common::validation::Validator;
use serde::Deserialize;
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::{info, warn};
use uuid::Uuid;

/// Minimum password length
pub const MIN_PASSWORD_LEN: usize = 6;

const RESET_CODE_MINUTES: i64 = 10;
const VERIFICATION_HOURS: i64 = 24;

const FORGOT_PASSWORD_MESSAGE: &str = "If an account exists with that email, a reset code has been sent";
const RESEND_VERIFICATION_MESSAGE: &str =
    "If the account exists and is not yet verified, a verification email has been sent";

/// Unauthenticated auth routes
pub fn public_auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/forgot-password", post(forgot_password))
        .route("/api/auth/verify-reset-code", post(verify_reset_code))
        .route("/api/auth/reset-password", post(reset_password))
        .route("/api/auth/verify-email", post(verify_email))
        .route("/api/auth/resend-verification", post(resend_verification))
}

/// Auth routes for signed-in users
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/me", get(me))
        .route("/api/auth/profile", put(update_profile))
        .route("/api/auth/change-password", put(change_password))
        .route("/api/auth/permissions", get(permissions))
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
    pub phone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct EmailRequest {
    pub email: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ResetCodeRequest {
    pub email: String,
    pub code: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: String,
    pub code: String,
    #[serde(alias = "new_password")]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VerifyEmailRequest {
    pub token: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    #[serde(alias = "current_password")]
    pub current_password: String,
    #[serde(alias = "new_password")]
    pub new_password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    #[serde(alias = "dateOfBirth")]
    pub date_of_birth: Option<String>,
    #[serde(alias = "profilePicture")]
    pub profile_picture: Option<String>,
}

async fn issue_session(state: &AppState, user: &User) -> ApiResult<String> {
    let ttl_days = settings::session_ttl_days(&state.db).await?;
    Ok(state.signer.issue(&user.id, user.role, Duration::days(ttl_days))?)
}

fn session_body(token: String, user: &User) -> Value {
    json!({ "token": token, "user": user })
}

/// Store a fresh verification token for `user_id`, replacing older ones
async fn create_verification_token(db: &SqlitePool, user_id: &str) -> sqlx::Result<String> {
    sqlx::query("DELETE FROM email_verifications WHERE user_id = ?")
        .bind(user_id)
        .execute(db)
        .await?;

    let token = generate_url_token();
    sqlx::query(
        "INSERT INTO email_verifications (id, user_id, token, expires_at, created_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id)
    .bind(&token)
    .bind(format_timestamp(now() + Duration::hours(VERIFICATION_HOURS)))
    .bind(now_rfc3339())
    .execute(db)
    .await?;

    Ok(token)
}

/// POST /api/auth/register
///
/// Self-registration always creates a candidate account.
pub async fn register(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let mut v = Validator::new();
    v.min_len("name", &req.name, 2)
        .email("email", &req.email)
        .min_len("password", &req.password, MIN_PASSWORD_LEN);
    v.finish()?;

    if users::email_exists(&state.db, &req.email).await? {
        return Err(ApiError::bad_request("User already exists"));
    }

    let mut new = NewUser::new(&req.name, &req.email, hash_password(&req.password), Role::Candidate);
    new.phone = req.phone.filter(|p| !p.trim().is_empty());
    let user = users::insert(&state.db, &new)
        .await
        .map_err(crate::error::conflict_on_duplicate("User already exists"))?;

    let verification = create_verification_token(&state.db, &user.id).await?;
    send_quietly(
        state.mailer.as_ref(),
        templates::verification(&user.email, &user.name, &verification),
    )
    .await;

    state
        .notifier()
        .notify_roles(
            &[Role::Admin, Role::Hr],
            None,
            &NewNotification::new(
                "user",
                "New Candidate Registration",
                format!("{} ({}) has registered as a candidate", user.name, user.email),
            )
            .link(format!("/users/{}", user.id)),
        )
        .await;

    audit::record_quietly(
        &state.db,
        Some(&user.id),
        action::USER_REGISTERED,
        json!({ "email": user.email, "role": user.role }),
    )
    .await;
    info!("Registered candidate {}", user.email);

    let token = issue_session(&state, &user).await?;
    Ok(created("User registered successfully", session_body(token, &user)))
}

/// Whole minutes left on a lock, rounded up
fn minutes_remaining(locked_until: chrono::DateTime<chrono::Utc>) -> i64 {
    let seconds = (locked_until - now()).num_seconds().max(0);
    ((seconds + 59) / 60).max(1)
}

fn locked_error(minutes: i64) -> ApiError {
    ApiError::forbidden(format!(
        "Account is temporarily locked. Try again in {} minutes",
        minutes
    ))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    v.email("email", &req.email)
        .check(!req.password.is_empty(), "password", "\"password\" is required");
    v.finish()?;

    let invalid = || ApiError::Unauthorized("Invalid credentials".to_string());

    let Some(user) = users::find_by_email(&state.db, &req.email).await? else {
        audit::record_quietly(
            &state.db,
            None,
            action::LOGIN_FAILED,
            json!({ "email": users::normalize_email(&req.email), "reason": "unknown_email" }),
        )
        .await;
        return Err(invalid());
    };

    if let Some(locked_until) = user.locked_until.as_deref().and_then(parse_timestamp) {
        if locked_until > now() {
            return Err(locked_error(minutes_remaining(locked_until)));
        }
    }

    if !user.is_active {
        audit::record_quietly(
            &state.db,
            Some(&user.id),
            action::LOGIN_FAILED,
            json!({ "reason": "inactive" }),
        )
        .await;
        return Err(invalid());
    }

    if !verify_password(&req.password, &user.password_hash) {
        let attempts = user.failed_login_attempts + 1;
        let max_attempts = settings::max_failed_logins(&state.db).await?;

        if attempts >= max_attempts {
            let lockout = settings::lockout_minutes(&state.db).await?;
            let until = now() + Duration::minutes(lockout);
            users::record_failed_login(&state.db, &user.id, 0, Some(&format_timestamp(until)))
                .await?;
            audit::record_quietly(
                &state.db,
                Some(&user.id),
                action::ACCOUNT_LOCKED,
                json!({ "attempts": attempts, "lockedMinutes": lockout }),
            )
            .await;
            warn!("Locked account {} after {} failed logins", user.email, attempts);
            return Err(locked_error(lockout));
        }

        users::record_failed_login(&state.db, &user.id, attempts, None).await?;
        audit::record_quietly(
            &state.db,
            Some(&user.id),
            action::LOGIN_FAILED,
            json!({ "reason": "bad_password", "attempts": attempts }),
        )
        .await;
        return Err(invalid());
    }

    users::record_successful_login(&state.db, &user.id).await?;
    audit::record_quietly(&state.db, Some(&user.id), action::LOGIN_SUCCESS, json!({})).await;

    let user = users::find_by_id(&state.db, &user.id).await?.ok_or_else(invalid)?;
    let token = issue_session(&state, &user).await?;
    Ok(success_with("Login successful", session_body(token, &user)))
}

/// GET /api/auth/me
pub async fn me(State(state): State<AppState>, current: CurrentUser) -> ApiResult<Json<Value>> {
    let user = users::find_by_id(&state.db, &current.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(success(user))
}

/// PUT /api/auth/profile
pub async fn update_profile(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    if let Some(name) = &req.name {
        v.min_len("name", name, 2);
    }
    if let Some(dob) = &req.date_of_birth {
        v.date("date_of_birth", dob);
    }
    v.finish()?;

    let mut user = users::find_by_id(&state.db, &current.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if let Some(name) = req.name {
        user.name = name.trim().to_string();
    }
    if let Some(phone) = req.phone {
        user.phone = Some(phone);
    }
    if let Some(address) = req.address {
        user.address = Some(address);
    }
    if let Some(dob) = req.date_of_birth {
        user.date_of_birth = Some(dob);
    }
    if let Some(picture) = req.profile_picture {
        user.profile_picture = Some(picture);
    }
    users::save(&state.db, &user).await?;

    let user = users::find_by_id(&state.db, &current.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;
    Ok(success_with("Profile updated successfully", user))
}

/// PUT /api/auth/change-password
pub async fn change_password(
    State(state): State<AppState>,
    current: CurrentUser,
    ApiJson(req): ApiJson<ChangePasswordRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    v.check(
        !req.current_password.is_empty(),
        "current_password",
        "\"current_password\" is required",
    )
    .min_len("new_password", &req.new_password, MIN_PASSWORD_LEN);
    v.finish()?;

    let user = users::find_by_id(&state.db, &current.id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    if !verify_password(&req.current_password, &user.password_hash) {
        return Err(ApiError::bad_request("Current password is incorrect"));
    }

    users::set_password(&state.db, &user.id, &hash_password(&req.new_password)).await?;
    info!("Password changed for {}", user.email);
    Ok(success_with("Password changed successfully", Value::Null))
}

/// GET /api/auth/permissions
pub async fn permissions(current: CurrentUser) -> Json<Value> {
    success(json!({
        "role": current.role,
        "permissions": role_permissions(current.role),
    }))
}

/// POST /api/auth/forgot-password
///
/// Responds identically whether or not the email is registered.
pub async fn forgot_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    v.email("email", &req.email);
    v.finish()?;

    if let Some(user) = users::find_by_email(&state.db, &req.email).await? {
        sqlx::query("DELETE FROM password_resets WHERE email = ?")
            .bind(&user.email)
            .execute(&state.db)
            .await?;

        let code = generate_reset_code();
        sqlx::query(
            "INSERT INTO password_resets (id, email, code, expires_at, used, created_at)
             VALUES (?, ?, ?, ?, 0, ?)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(&user.email)
        .bind(&code)
        .bind(format_timestamp(now() + Duration::minutes(RESET_CODE_MINUTES)))
        .bind(now_rfc3339())
        .execute(&state.db)
        .await?;

        send_quietly(
            state.mailer.as_ref(),
            templates::reset_code(&user.email, &user.name, &code),
        )
        .await;
    }

    Ok(success_with(FORGOT_PASSWORD_MESSAGE, Value::Null))
}

/// Id of an unused, unexpired reset code for `email`
async fn find_valid_reset(db: &SqlitePool, email: &str, code: &str) -> ApiResult<String> {
    let row: Option<(String, String)> = sqlx::query_as(
        "SELECT id, expires_at FROM password_resets WHERE email = ? AND code = ? AND used = 0",
    )
    .bind(users::normalize_email(email))
    .bind(code.trim())
    .fetch_optional(db)
    .await?;

    match row {
        Some((id, expires_at)) if parse_timestamp(&expires_at).is_some_and(|at| at > now()) => {
            Ok(id)
        }
        _ => Err(ApiError::bad_request("Invalid or expired reset code")),
    }
}

/// POST /api/auth/verify-reset-code
pub async fn verify_reset_code(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetCodeRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    v.email("email", &req.email)
        .check(req.code.trim().len() == 6, "code", "\"code\" must be 6 digits");
    v.finish()?;

    find_valid_reset(&state.db, &req.email, &req.code).await?;
    Ok(success_with("Reset code verified", Value::Null))
}

/// POST /api/auth/reset-password
pub async fn reset_password(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ResetPasswordRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    v.email("email", &req.email)
        .check(req.code.trim().len() == 6, "code", "\"code\" must be 6 digits")
        .min_len("new_password", &req.new_password, MIN_PASSWORD_LEN);
    v.finish()?;

    let reset_id = find_valid_reset(&state.db, &req.email, &req.code).await?;
    let user = users::find_by_email(&state.db, &req.email)
        .await?
        .ok_or_else(|| ApiError::bad_request("Invalid or expired reset code"))?;

    sqlx::query("UPDATE password_resets SET used = 1 WHERE id = ?")
        .bind(&reset_id)
        .execute(&state.db)
        .await?;
    users::set_password(&state.db, &user.id, &hash_password(&req.new_password)).await?;

    audit::record_quietly(&state.db, Some(&user.id), action::PASSWORD_RESET, json!({})).await;
    send_quietly(
        state.mailer.as_ref(),
        templates::reset_confirmation(&user.email, &user.name),
    )
    .await;

    Ok(success_with("Password reset successfully", Value::Null))
}

/// POST /api/auth/verify-email
pub async fn verify_email(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<VerifyEmailRequest>,
) -> ApiResult<Json<Value>> {
    let invalid = || ApiError::bad_request("Invalid or expired verification token");
    if req.token.trim().is_empty() {
        return Err(invalid());
    }

    let row: Option<(String, String)> =
        sqlx::query_as("SELECT user_id, expires_at FROM email_verifications WHERE token = ?")
            .bind(req.token.trim())
            .fetch_optional(&state.db)
            .await?;

    let user_id = match row {
        Some((user_id, expires_at))
            if parse_timestamp(&expires_at).is_some_and(|at| at > now()) =>
        {
            user_id
        }
        _ => return Err(invalid()),
    };

    users::mark_email_verified(&state.db, &user_id).await?;
    sqlx::query("DELETE FROM email_verifications WHERE user_id = ?")
        .bind(&user_id)
        .execute(&state.db)
        .await?;
    audit::record_quietly(&state.db, Some(&user_id), action::EMAIL_VERIFIED, json!({})).await;

    Ok(success_with("Email verified successfully", Value::Null))
}

/// POST /api/auth/resend-verification
pub async fn resend_verification(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<EmailRequest>,
) -> ApiResult<Json<Value>> {
    let mut v = Validator::new();
    v.email("email", &req.email);
    v.finish()?;

    if let Some(user) = users::find_by_email(&state.db, &req.email).await? {
        if !user.is_email_verified {
            let token = create_verification_token(&state.db, &user.id).await?;
            send_quietly(
                state.mailer.as_ref(),
                templates::verification(&user.email, &user.name, &token),
            )
            .await;
        }
    }

    Ok(success_with(RESEND_VERIFICATION_MESSAGE, Value::Null))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minutes_remaining_rounds_up() {
        assert_eq!(minutes_remaining(now() + Duration::seconds(90)), 2);
        assert_eq!(minutes_remaining(now() + Duration::minutes(30)), 30);
        assert_eq!(minutes_remaining(now() - Duration::minutes(1)), 1);
    }

    #[test]
    fn test_locked_message() {
        assert_eq!(
            locked_error(12).to_string(),
            "Account is temporarily locked. Try again in 12 minutes"
        );
    }
}
