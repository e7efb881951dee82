//! Integration tests for performance reviews, calendar events and documents

mod helpers;

use axum::http::StatusCode;
use helpers::{setup_app, TestApp, TestUser};
use hrms_common::roles::Role;
use serde_json::{json, Value};

fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["id"].as_str().map(String::from))
        .collect()
}

fn titles(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|item| item["title"].as_str().map(String::from))
        .collect()
}

// ============================================================================
// Performance reviews
// ============================================================================

async fn post_review(app: &TestApp, author: &TestUser, subject: &TestUser, rating: i64) -> Value {
    let (status, body) = app
        .post(
            "/api/performance",
            &author.token,
            json!({
                "userId": subject.user.id,
                "reviewPeriodStart": "2024-01-01",
                "reviewPeriodEnd": "2024-06-30",
                "qualityOfWork": 4,
                "teamwork": 5,
                "overallRating": rating,
                "goals": "Own the billing service"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"].clone()
}

#[tokio::test]
async fn test_review_creation_and_validation() {
    let app = setup_app().await;
    let manager = app.seed_user(Role::Manager, "mgr@example.com", Some("Engineering")).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", Some("Engineering")).await;

    let review = post_review(&app, &manager, &employee, 4).await;
    assert_eq!(review["reviewerId"], manager.user.id.as_str());
    assert_eq!(review["userName"], "emp");
    assert_eq!(review["status"], "draft");
    assert_eq!(review["recommendation"], "none");
    assert_eq!(review["overallRating"], 4);

    // The reviewed employee hears about it
    let (_, notes) = app.get("/api/notifications", &employee.token).await;
    assert_eq!(notes["data"][0]["title"], "New Performance Review");

    let (status, body) = app
        .post(
            "/api/performance",
            &manager.token,
            json!({
                "userId": employee.user.id,
                "reviewPeriodStart": "2024-06-30",
                "reviewPeriodEnd": "2024-01-01",
                "overallRating": 6
            }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|d| d["field"].as_str())
        .collect();
    assert!(fields.contains(&"overall_rating"));
    assert!(fields.contains(&"review_period_end"));

    let (status, _) = app
        .post(
            "/api/performance",
            &employee.token,
            json!({
                "userId": employee.user.id,
                "reviewPeriodStart": "2024-01-01",
                "reviewPeriodEnd": "2024-06-30"
            }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn test_review_listing_is_scoped() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;
    let manager = app.seed_user(Role::Manager, "mgr@example.com", Some("Engineering")).await;
    let engineer = app.seed_user(Role::Employee, "eng@example.com", Some("Engineering")).await;
    let seller = app.seed_user(Role::Employee, "sales@example.com", Some("Sales")).await;

    let engineer_review = post_review(&app, &manager, &engineer, 4).await;
    let seller_review = post_review(&app, &hr, &seller, 2).await;

    let (_, body) = app.get("/api/performance", &hr.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    // Managers only see their own department
    let (_, body) = app.get("/api/performance", &manager.token).await;
    assert_eq!(ids(&body), vec![engineer_review["id"].as_str().unwrap().to_string()]);

    let (status, _) = app.get("/api/performance", &engineer.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .get(&format!("/api/performance/user/{}", engineer.user.id), &engineer.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, _) = app
        .get(&format!("/api/performance/user/{}", seller.user.id), &engineer.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app
        .get(
            &format!("/api/performance/{}", seller_review["id"].as_str().unwrap()),
            &engineer.token,
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Employees get stats for themselves only
    let (_, body) = app.get("/api/performance/stats", &engineer.token).await;
    assert_eq!(body["data"]["totalReviews"], 1);
    assert_eq!(body["data"]["averageRating"], 4.0);
    assert_eq!(body["data"]["ratingDistribution"]["4"], 1);

    let (_, body) = app.get("/api/performance/stats", &hr.token).await;
    assert_eq!(body["data"]["totalReviews"], 2);
    assert_eq!(body["data"]["averageRating"], 3.0);
}

#[tokio::test]
async fn test_review_update_and_delete_rights() {
    let app = setup_app().await;
    let admin = app.seed_user(Role::Admin, "admin@example.com", None).await;
    let author = app.seed_user(Role::Manager, "mgr@example.com", Some("Engineering")).await;
    let other = app.seed_user(Role::Manager, "other@example.com", Some("Engineering")).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", Some("Engineering")).await;

    let review = post_review(&app, &author, &employee, 3).await;
    let uri = format!("/api/performance/{}", review["id"].as_str().unwrap());

    let (status, _) = app.put(&uri, &other.token, json!({ "status": "submitted" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(&uri, &author.token, json!({ "status": "submitted", "recommendation": "training" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["status"], "submitted");
    assert_eq!(body["data"]["recommendation"], "training");
    assert_eq!(body["data"]["goals"], "Own the billing service");

    let (status, _) = app.delete(&uri, &author.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&uri, &admin.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Performance review not found");
}

// ============================================================================
// Events
// ============================================================================

async fn post_event(app: &TestApp, author: &TestUser, title: &str, start: &str, end: &str) -> Value {
    let (status, body) = app
        .post(
            "/api/events",
            &author.token,
            json!({ "title": title, "startDate": start, "endDate": end, "type": "meeting" }),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    body["data"].clone()
}

#[tokio::test]
async fn test_event_editing_is_restricted() {
    let app = setup_app().await;
    let manager = app.seed_user(Role::Manager, "mgr@example.com", None).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", None).await;

    let (status, _) = app
        .post(
            "/api/events",
            &employee.token,
            json!({ "title": "Party", "startDate": "2024-09-10", "endDate": "2024-09-10" }),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .post(
            "/api/events",
            &manager.token,
            json!({ "title": "Backwards", "startDate": "2024-09-10", "endDate": "2024-09-09" }),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "end_date");

    let event = post_event(&app, &manager, "Offsite", "2024-09-10", "2024-09-12").await;
    assert_eq!(event["eventType"], "meeting");
    assert_eq!(event["createdByName"], "mgr");
    let uri = format!("/api/events/{}", event["id"].as_str().unwrap());

    // Everyone can read the calendar
    let (status, body) = app.get(&uri, &employee.token).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["title"], "Offsite");

    let (status, _) = app.put(&uri, &employee.token, json!({ "title": "Mine" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(&uri, &manager.token, json!({ "location": "Lake house", "allDay": true }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["location"], "Lake house");
    assert_eq!(body["data"]["allDay"], true);
    assert_eq!(body["data"]["title"], "Offsite");

    let (status, _) = app.delete(&uri, &employee.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.delete(&uri, &manager.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&uri, &employee.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Event not found");
}

#[tokio::test]
async fn test_event_range_returns_overlaps() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", None).await;

    post_event(&app, &hr, "Offsite", "2024-09-10", "2024-09-12").await;
    post_event(&app, &hr, "Quarter close", "2024-09-30", "2024-09-30").await;
    post_event(&app, &hr, "Summit", "2099-01-05", "2099-01-06").await;

    let (_, body) = app.get("/api/events", &employee.token).await;
    assert_eq!(titles(&body), vec!["Offsite", "Quarter close", "Summit"]);

    // Started before the range but still running
    let (status, body) = app
        .get("/api/events/range?startDate=2024-09-11&endDate=2024-09-20", &employee.token)
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(titles(&body), vec!["Offsite"]);

    // Both ends are inclusive
    let (_, body) = app
        .get("/api/events/range?startDate=2024-09-12&endDate=2024-09-30", &employee.token)
        .await;
    assert_eq!(titles(&body), vec!["Offsite", "Quarter close"]);

    let (_, body) = app
        .get("/api/events/range?startDate=2024-10-01&endDate=2024-10-31", &employee.token)
        .await;
    assert!(titles(&body).is_empty());

    let (status, _) = app.get("/api/events/range?startDate=2024-09-01", &employee.token).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, body) = app.get("/api/events/upcoming", &employee.token).await;
    assert_eq!(titles(&body), vec!["Summit"]);
}

// ============================================================================
// Documents
// ============================================================================

async fn post_document(app: &TestApp, author: &TestUser, body: Value) -> Value {
    let (status, response) = app.post("/api/documents", &author.token, body).await;
    assert_eq!(status, StatusCode::CREATED, "{}", response);
    response["data"].clone()
}

#[tokio::test]
async fn test_document_ownership() {
    let app = setup_app().await;
    let hr = app.seed_user(Role::Hr, "hr@example.com", None).await;
    let employee = app.seed_user(Role::Employee, "emp@example.com", Some("Engineering")).await;
    let colleague = app.seed_user(Role::Employee, "col@example.com", Some("Engineering")).await;

    // Employees cannot file for someone else
    let own = post_document(
        &app,
        &employee,
        json!({
            "userId": colleague.user.id,
            "title": "Passport",
            "category": "identity",
            "fileUrl": "https://files.example.com/passport.pdf"
        }),
    )
    .await;
    assert_eq!(own["userId"], employee.user.id.as_str());

    let filed = post_document(
        &app,
        &hr,
        json!({
            "userId": colleague.user.id,
            "title": "Contract",
            "category": "contract",
            "fileUrl": "https://files.example.com/contract.pdf",
            "fileSize": 2048
        }),
    )
    .await;
    assert_eq!(filed["userId"], colleague.user.id.as_str());
    assert_eq!(filed["userName"], "col");

    let (status, body) = app
        .post("/api/documents", &employee.token, json!({ "title": "No file" }))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["details"][0]["field"], "file_url");

    let filed_uri = format!("/api/documents/{}", filed["id"].as_str().unwrap());
    let (status, body) = app.get(&filed_uri, &employee.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["message"], "Access denied");

    let (status, _) = app
        .get(&format!("/api/documents/user/{}", colleague.user.id), &employee.token)
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .get(&format!("/api/documents/user/{}", colleague.user.id), &hr.token)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(titles(&body), vec!["Contract"]);

    let (status, _) = app.put(&filed_uri, &employee.token, json!({ "title": "Mine" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = app
        .put(&filed_uri, &colleague.token, json!({ "description": "Signed copy" }))
        .await;
    assert_eq!(status, StatusCode::OK, "{}", body);
    assert_eq!(body["data"]["description"], "Signed copy");
    assert_eq!(body["data"]["fileSize"], 2048);

    let (status, _) = app.delete(&filed_uri, &employee.token).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let own_uri = format!("/api/documents/{}", own["id"].as_str().unwrap());
    let (status, _) = app.delete(&own_uri, &employee.token).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&own_uri, &employee.token).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Document not found");
}

#[tokio::test]
async fn test_document_listing_is_scoped() {
    let app = setup_app().await;
    let admin = app.seed_user(Role::Admin, "admin@example.com", None).await;
    let manager = app.seed_user(Role::Manager, "mgr@example.com", Some("Engineering")).await;
    let engineer = app.seed_user(Role::Employee, "eng@example.com", Some("Engineering")).await;
    let seller = app.seed_user(Role::Employee, "sales@example.com", Some("Sales")).await;

    for (owner, title, category) in [
        (&engineer, "Resume", "identity"),
        (&engineer, "Offer letter", "contract"),
        (&seller, "Visa", "identity"),
    ] {
        post_document(
            &app,
            owner,
            json!({ "title": title, "category": category, "fileUrl": "https://files.example.com/doc" }),
        )
        .await;
    }

    let (_, body) = app.get("/api/documents", &admin.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 3);

    let (_, body) = app.get("/api/documents?category=identity", &admin.token).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 2);

    let (_, body) = app.get("/api/documents", &manager.token).await;
    let mut seen = titles(&body);
    seen.sort();
    assert_eq!(seen, vec!["Offer letter", "Resume"]);

    let (_, body) = app.get("/api/documents", &seller.token).await;
    assert_eq!(titles(&body), vec!["Visa"]);

    let (_, body) = app.get("/api/documents/stats", &engineer.token).await;
    assert_eq!(body["data"]["total"], 2);
    assert_eq!(body["data"]["byCategory"]["contract"], 1);
    assert_eq!(body["data"]["byCategory"]["identity"], 1);

    let (_, body) = app.get("/api/documents/stats", &admin.token).await;
    assert_eq!(body["data"]["total"], 3);
    assert_eq!(body["data"]["byCategory"]["identity"], 2);
}
