//! HTTP API handlers
//!
//! One module per resource; each exposes a `*_routes()` builder merged by
//! [`crate::build_router`].

pub mod applications;
pub mod attendance;
pub mod audit;
pub mod auth;
pub mod calendar;
pub mod dashboard;
pub mod departments;
pub mod documents;
pub mod health;
pub mod jobs;
pub mod leaves;
pub mod middleware;
pub mod notifications;
pub mod payroll;
pub mod performance;
pub mod users;

use crate::ApiError;
use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;

pub use middleware::{require_role, CurrentUser};

/// Rows returned when a list request gives no limit
pub const DEFAULT_LIMIT: i64 = 100;
/// Upper bound for any list request
pub const MAX_LIMIT: i64 = 500;

/// Clamp a requested page size to `1..=MAX_LIMIT`
pub fn clamp_limit(limit: Option<i64>, default: i64) -> i64 {
    limit.unwrap_or(default).clamp(1, MAX_LIMIT)
}

pub fn clamp_offset(offset: Option<i64>) -> i64 {
    offset.unwrap_or(0).max(0)
}

/// JSON body extractor whose rejections use the API error envelope
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// Query string extractor whose rejections use the API error envelope
pub struct ApiQuery<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiQuery<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Query::<T>::from_request_parts(parts, state).await {
            Ok(Query(value)) => Ok(ApiQuery(value)),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}
