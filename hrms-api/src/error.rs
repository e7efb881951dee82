//! API error type and response envelopes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use hrms_common::validation::ValidationErrors;
use serde::Serialize;
use serde_json::{json, Value};
use thiserror::Error;
use tracing::error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// 400
    #[error("{0}")]
    BadRequest(String),

    /// 400 with per-field details
    #[error("Validation error")]
    Validation(#[from] ValidationErrors),

    /// 401
    #[error("{0}")]
    Unauthorized(String),

    /// 403
    #[error("{0}")]
    Forbidden(String),

    /// 404
    #[error("{0}")]
    NotFound(String),

    /// 409
    #[error("{0}")]
    Conflict(String),

    /// 500
    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Common(#[from] hrms_common::Error),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiError::BadRequest(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    fn status_and_code(&self) -> (StatusCode, &'static str) {
        use hrms_common::Error as E;
        match self {
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            ApiError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            ApiError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            ApiError::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            ApiError::Internal(_) | ApiError::Database(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR")
            }
            ApiError::Common(err) => match err {
                E::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
                E::InvalidInput(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
                E::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
                E::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
                E::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
                err if err.is_unique_violation() => (StatusCode::CONFLICT, "CONFLICT"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            },
        }
    }

    /// Message shown to clients; internal details stay in the log
    fn public_message(&self, status: StatusCode) -> String {
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            return "Server error".to_string();
        }
        match self {
            ApiError::Common(hrms_common::Error::NotFound(msg))
            | ApiError::Common(hrms_common::Error::InvalidInput(msg))
            | ApiError::Common(hrms_common::Error::Conflict(msg))
            | ApiError::Common(hrms_common::Error::Unauthorized(msg))
            | ApiError::Common(hrms_common::Error::Forbidden(msg)) => msg.clone(),
            ApiError::Common(err) if err.is_unique_violation() => {
                "Record already exists".to_string()
            }
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
        }
        let message = self.public_message(status);

        let mut body = json!({
            "success": false,
            "message": message,
            "error": {
                "code": code,
                "message": message,
            }
        });
        if let ApiError::Validation(errors) = &self {
            body["details"] = json!(errors.0);
        }

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;

/// `{"success": true, "data": ...}`
pub fn success<T: Serialize>(data: T) -> Json<Value> {
    Json(json!({ "success": true, "data": data }))
}

/// `{"success": true, "message": ..., "data": ...}`
pub fn success_with<T: Serialize>(message: &str, data: T) -> Json<Value> {
    Json(json!({ "success": true, "message": message, "data": data }))
}

/// 201 with a message envelope
pub fn created<T: Serialize>(message: &str, data: T) -> (StatusCode, Json<Value>) {
    (StatusCode::CREATED, success_with(message, data))
}

/// Map a unique-constraint violation to 409 with `message`
pub fn conflict_on_duplicate(message: &'static str) -> impl Fn(sqlx::Error) -> ApiError {
    move |err| {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return ApiError::conflict(message);
            }
        }
        ApiError::Database(err)
    }
}
