//! Shared helpers for hrms-api integration tests
//!
//! Each test gets its own in-memory database and router.

#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use chrono::Duration;
use hrms_api::db::users::{self, NewUser, User};
use hrms_api::{build_router, AppState};
use hrms_common::auth::{hash_password, TokenSigner};
use hrms_common::db::init_memory_database;
use hrms_common::events::EventBus;
use hrms_common::roles::Role;
use http_body_util::BodyExt;
use serde_json::Value;
use sqlx::SqlitePool;
use tower::util::ServiceExt;

pub const PASSWORD: &str = "password123";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    pub db: SqlitePool,
}

pub async fn setup_app() -> TestApp {
    let db = init_memory_database()
        .await
        .expect("Failed to create in-memory database");
    let state = AppState::new(db.clone(), EventBus::new(100), TokenSigner::new("test-secret"));
    TestApp {
        router: build_router(state.clone()),
        state,
        db,
    }
}

/// A seeded account together with a valid session token
pub struct TestUser {
    pub user: User,
    pub token: String,
}

impl TestApp {
    pub async fn seed_user(&self, role: Role, email: &str, department: Option<&str>) -> TestUser {
        let mut new = NewUser::new(email.split('@').next().unwrap_or(email), email, hash_password(PASSWORD), role);
        new.department = department.map(str::to_string);
        new.is_email_verified = true;
        if role != Role::Candidate {
            new.start_date = Some("2020-01-01".to_string());
        }
        let user = users::insert(&self.db, &new).await.expect("Failed to seed user");
        let token = self
            .state
            .signer
            .issue(&user.id, role, Duration::days(1))
            .expect("Failed to issue token");
        TestUser { user, token }
    }

    /// Send a request and decode the JSON response
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        token: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header("authorization", format!("Bearer {}", token));
        }
        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(serde_json::to_vec(&json).unwrap())
            }
            None => Body::empty(),
        };

        let response = self
            .router
            .clone()
            .oneshot(builder.body(body).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("GET", uri, Some(token), None).await
    }

    pub async fn post(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("POST", uri, Some(token), Some(body)).await
    }

    pub async fn put(&self, uri: &str, token: &str, body: Value) -> (StatusCode, Value) {
        self.request("PUT", uri, Some(token), Some(body)).await
    }

    pub async fn delete(&self, uri: &str, token: &str) -> (StatusCode, Value) {
        self.request("DELETE", uri, Some(token), None).await
    }
}
