//! Integration tests for registration, login, lockout and password reset

mod helpers;

use axum::http::StatusCode;
use helpers::{setup_app, PASSWORD};
use hrms_common::roles::Role;
use serde_json::json;

// ============================================================================
// Registration and login
// ============================================================================

#[tokio::test]
async fn test_register_creates_candidate_and_queues_verification() {
    let app = setup_app().await;

    let (status, body) = app
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Nia Reyes", "email": "Nia@Example.com", "password": "hunter22" })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["user"]["role"], "candidate");
    assert_eq!(body["data"]["user"]["email"], "nia@example.com");
    assert!(body["data"]["user"].get("passwordHash").is_none());
    assert!(body["data"]["token"].as_str().is_some());

    let queued: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM email_outbox WHERE recipient = 'nia@example.com' AND subject = 'Verify your email address'",
    )
    .fetch_one(&app.db)
    .await
    .unwrap();
    assert_eq!(queued, 1);
}

#[tokio::test]
async fn test_register_duplicate_email_rejected() {
    let app = setup_app().await;
    app.seed_user(Role::Employee, "taken@example.com", None).await;

    let (status, body) = app
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "Other", "email": "taken@example.com", "password": "hunter22" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "User already exists");
}

#[tokio::test]
async fn test_register_validation_lists_fields() {
    let app = setup_app().await;

    let (status, body) = app
        .request(
            "POST",
            "/api/auth/register",
            None,
            Some(json!({ "name": "X", "email": "not-an-email", "password": "123" })),
        )
        .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Validation error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["name", "email", "password"]);
}

#[tokio::test]
async fn test_login_and_me() {
    let app = setup_app().await;
    app.seed_user(Role::Employee, "emma@example.com", Some("Engineering")).await;

    let (status, body) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "emma@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let (status, me) = app.get("/api/auth/me", &token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["data"]["email"], "emma@example.com");
    assert_eq!(me["data"]["department"], "Engineering");
    assert!(me["data"]["lastLogin"].as_str().is_some());
}

#[tokio::test]
async fn test_protected_route_requires_token() {
    let app = setup_app().await;

    let (status, body) = app.request("GET", "/api/auth/me", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, no token");

    let (status, body) = app.get("/api/auth/me", "garbage.token").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Not authorized, token failed");
}

#[tokio::test]
async fn test_deactivated_user_rejected_by_middleware() {
    let app = setup_app().await;
    let employee = app.seed_user(Role::Employee, "gone@example.com", None).await;

    sqlx::query("UPDATE users SET is_active = 0 WHERE id = ?")
        .bind(&employee.user.id)
        .execute(&app.db)
        .await
        .unwrap();

    let (status, body) = app.get("/api/auth/me", &employee.token).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Account is deactivated");
}

// ============================================================================
// Lockout
// ============================================================================

#[tokio::test]
async fn test_account_locks_after_repeated_failures() {
    let app = setup_app().await;
    app.seed_user(Role::Employee, "lock@example.com", None).await;
    let wrong = json!({ "email": "lock@example.com", "password": "wrong-password" });

    for _ in 0..4 {
        let (status, body) = app.request("POST", "/api/auth/login", None, Some(wrong.clone())).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["message"], "Invalid credentials");
    }

    let (status, body) = app.request("POST", "/api/auth/login", None, Some(wrong)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(
        body["message"],
        "Account is temporarily locked. Try again in 30 minutes"
    );

    // Correct password is still refused while locked
    let (status, _) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "lock@example.com", "password": PASSWORD })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let locked: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM audit_log WHERE action = 'ACCOUNT_LOCKED'")
        .fetch_one(&app.db)
        .await
        .unwrap();
    assert_eq!(locked, 1);
}

// ============================================================================
// Password reset
// ============================================================================

#[tokio::test]
async fn test_forgot_password_does_not_reveal_accounts() {
    let app = setup_app().await;
    app.seed_user(Role::Employee, "known@example.com", None).await;

    let (known_status, known) = app
        .request(
            "POST",
            "/api/auth/forgot-password",
            None,
            Some(json!({ "email": "known@example.com" })),
        )
        .await;
    let (unknown_status, unknown) = app
        .request(
            "POST",
            "/api/auth/forgot-password",
            None,
            Some(json!({ "email": "nobody@example.com" })),
        )
        .await;

    assert_eq!(known_status, StatusCode::OK);
    assert_eq!(unknown_status, StatusCode::OK);
    assert_eq!(known, unknown);
}

#[tokio::test]
async fn test_reset_password_flow() {
    let app = setup_app().await;
    app.seed_user(Role::Employee, "reset@example.com", None).await;

    app.request(
        "POST",
        "/api/auth/forgot-password",
        None,
        Some(json!({ "email": "reset@example.com" })),
    )
    .await;
    let code: String = sqlx::query_scalar("SELECT code FROM password_resets WHERE email = 'reset@example.com'")
        .fetch_one(&app.db)
        .await
        .unwrap();

    let (status, _) = app
        .request(
            "POST",
            "/api/auth/verify-reset-code",
            None,
            Some(json!({ "email": "reset@example.com", "code": code })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app
        .request(
            "POST",
            "/api/auth/reset-password",
            None,
            Some(json!({ "email": "reset@example.com", "code": code, "newPassword": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);

    // Codes are single use
    let (status, body) = app
        .request(
            "POST",
            "/api/auth/reset-password",
            None,
            Some(json!({ "email": "reset@example.com", "code": code, "newPassword": "another-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Invalid or expired reset code");

    let (status, _) = app
        .request(
            "POST",
            "/api/auth/login",
            None,
            Some(json!({ "email": "reset@example.com", "password": "brand-new-pass" })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_change_password_checks_current() {
    let app = setup_app().await;
    let employee = app.seed_user(Role::Employee, "change@example.com", None).await;

    let (status, body) = app
        .put(
            "/api/auth/change-password",
            &employee.token,
            json!({ "currentPassword": "nope", "newPassword": "whatever1" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Current password is incorrect");

    let (status, _) = app
        .put(
            "/api/auth/change-password",
            &employee.token,
            json!({ "currentPassword": PASSWORD, "newPassword": "whatever1" }),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_permissions_reflect_role() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;

    let (status, body) = app.get("/api/auth/permissions", &hr.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["role"], "hr");
}
