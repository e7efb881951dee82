//! Integration tests for attendance marking, check-in and statistics

mod helpers;

use axum::http::StatusCode;
use helpers::setup_app;
use hrms_common::roles::Role;
use hrms_common::time::{is_weekend, today};
use serde_json::json;

// 2024-06-03 is a Monday
const MONDAY: &str = "2024-06-03";
const TUESDAY: &str = "2024-06-04";
const WEDNESDAY: &str = "2024-06-05";
const SATURDAY: &str = "2024-06-08";

// ============================================================================
// Marking
// ============================================================================

#[tokio::test]
async fn test_hr_marks_past_day_with_lateness() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;

    let (status, body) = app
        .post(
            "/api/attendance",
            &hr.token,
            json!({ "date": MONDAY, "status": "late", "checkInTime": "10:00", "checkOutTime": "19:00" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["data"]["isLate"], true);
    assert_eq!(body["data"]["lateByMinutes"], 30);
    assert_eq!(body["data"]["workMinutes"], 540);
    assert_eq!(body["data"]["overtimeMinutes"], 60);
}

#[tokio::test]
async fn test_marking_rules_in_order() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", None).await;

    // Weekend
    let (status, body) = app
        .post("/api/attendance", &hr.token, json!({ "date": SATURDAY, "status": "present" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Weekend - Holiday");

    // Before joining
    let (status, body) = app
        .post("/api/attendance", &hr.token, json!({ "date": "2019-12-31", "status": "present" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Not Yet Joined");

    // Employees may only mark today
    let (status, body) = app
        .post("/api/attendance", &employee.token, json!({ "date": MONDAY, "status": "present" }))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Invalid date");

    // Duplicate
    let (status, _) = app
        .post("/api/attendance", &hr.token, json!({ "date": MONDAY, "status": "present" }))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let (status, body) = app
        .post("/api/attendance", &hr.token, json!({ "date": MONDAY, "status": "present" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Attendance already marked");
}

#[tokio::test]
async fn test_invalid_status_rejected() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;

    let (status, body) = app
        .post("/api/attendance", &hr.token, json!({ "date": MONDAY, "status": "sleeping" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "status");
}

#[tokio::test]
async fn test_only_admin_marks_for_others() {
    let app = setup_app().await;
    let admin = app.seed_user(Role::Admin, "admin@example.com", None).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", None).await;

    let (status, body) = app
        .post(
            "/api/attendance",
            &admin.token,
            json!({ "userId": employee.user.id, "date": MONDAY, "status": "present" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["userId"], employee.user.id.as_str());

    let uri = format!("/api/attendance/user/{}", employee.user.id);
    let (status, own) = app.get(&uri, &employee.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(own["data"].as_array().unwrap().len(), 1);

    let (status, _) = app.get(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::OK);
}

// ============================================================================
// Check-in / check-out
// ============================================================================

#[tokio::test]
async fn test_check_in_then_out() {
    let app = setup_app().await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", None).await;

    let (status, body) = app.post("/api/attendance/check-in", &employee.token, json!({})).await;
    if is_weekend(today()) {
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Weekend - Holiday");
        return;
    }
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert!(body["data"]["checkInTime"].as_str().is_some());

    let (status, body) = app.post("/api/attendance/check-in", &employee.token, json!({})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "Already checked in");

    let (status, body) = app.post("/api/attendance/check-out", &employee.token, json!({})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["checkOutTime"].as_str().is_some());

    let (_, today_status) = app.get("/api/attendance/today-status", &employee.token).await;
    assert_eq!(today_status["data"]["hasCheckedIn"], true);
    assert_eq!(today_status["data"]["hasCheckedOut"], true);
}

#[tokio::test]
async fn test_check_out_without_check_in() {
    let app = setup_app().await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", None).await;

    let (status, body) = app
        .request("POST", "/api/attendance/check-out", Some(&employee.token), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No check-in found");
}

// ============================================================================
// Statistics and auto-absent
// ============================================================================

#[tokio::test]
async fn test_user_stats_count_unmarked_days_as_absent() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;
    let admin = app.seed_user(Role::Admin, "admin@example.com", None).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", None).await;

    for (date, status) in [(MONDAY, "present"), (TUESDAY, "late"), (WEDNESDAY, "absent")] {
        let (code, _) = app
            .post(
                "/api/attendance",
                &admin.token,
                json!({ "userId": employee.user.id, "date": date, "status": status }),
            )
            .await;
        assert_eq!(code, StatusCode::CREATED);
    }

    let uri = format!(
        "/api/attendance/stats?userId={}&startDate=2024-06-03&endDate=2024-06-09",
        employee.user.id
    );
    let (status, body) = app.get(&uri, &hr.token).await;
    assert_eq!(status, StatusCode::OK);
    let stats = &body["data"];
    assert_eq!(stats["workingDaysCount"], 5);
    assert_eq!(stats["presentDays"], 1);
    assert_eq!(stats["lateDays"], 1);
    assert_eq!(stats["absentDays"], 3);
    assert_eq!(stats["attendancePercentage"], 40.0);

    // Employees cannot read someone else's statistics
    let (status, _) = app
        .get(&format!("/api/attendance/stats?userId={}", hr.user.id), &employee.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_auto_mark_absent_respects_approved_leave() {
    let app = setup_app().await;
    let admin = app.seed_user(Role::Admin, "admin@example.com", None).await;
    let resting = app.seed_user(Role::Employee, "rest@example.com", None).await;
    app.seed_user(Role::Candidate, "cand@example.com", None).await;

    sqlx::query(
        "INSERT INTO leaves (id, user_id, leave_type, start_date, end_date, status, created_at, updated_at)
         VALUES ('l1', ?, 'annual', ?, ?, 'approved', '', '')",
    )
    .bind(&resting.user.id)
    .bind(MONDAY)
    .bind(TUESDAY)
    .execute(&app.db)
    .await
    .unwrap();

    let (status, body) = app
        .request(
            "POST",
            &format!("/api/attendance/auto-mark-absent?date={}", MONDAY),
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["absent"], 1);
    assert_eq!(body["data"]["onLeave"], 1);

    // Second pass finds nobody left to mark
    let (_, body) = app
        .request(
            "POST",
            &format!("/api/attendance/auto-mark-absent?date={}", MONDAY),
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(body["data"]["absent"], 0);

    let (_, body) = app
        .request(
            "POST",
            &format!("/api/attendance/auto-mark-absent?date={}", SATURDAY),
            Some(&admin.token),
            None,
        )
        .await;
    assert_eq!(body["data"]["skippedWeekend"], true);
}

#[tokio::test]
async fn test_auto_mark_absent_is_admin_only() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;

    let (status, _) = app
        .request("POST", "/api/attendance/auto-mark-absent", Some(&hr.token), None)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
