//! Bearer-token authentication and role checks

use crate::db::users;
use crate::{ApiError, ApiResult, AppState};
use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Uri},
    middleware::Next,
    response::Response,
};
use hrms_common::roles::{describe_roles, Role};
use serde::Serialize;
use tracing::debug;

/// The authenticated caller, inserted by [`auth_middleware`]
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CurrentUser {
    pub id: String,
    pub name: String,
    pub email: String,
    pub role: Role,
    pub department: Option<String>,
}

impl CurrentUser {
    pub fn is_management(&self) -> bool {
        self.role.is_management()
    }

    pub fn is_admin_or_hr(&self) -> bool {
        self.role.is_admin_or_hr()
    }

    /// The caller is `user_id` or holds an admin/hr role
    pub fn is_self_or_admin_hr(&self, user_id: &str) -> bool {
        self.id == user_id || self.is_admin_or_hr()
    }
}

impl From<&users::User> for CurrentUser {
    fn from(user: &users::User) -> Self {
        Self {
            id: user.id.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            role: user.role,
            department: user.department.clone(),
        }
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".to_string()))
    }
}

/// 403 unless the caller holds one of `roles`
pub fn require_role(user: &CurrentUser, roles: &[Role]) -> ApiResult<()> {
    if roles.contains(&user.role) {
        Ok(())
    } else {
        Err(ApiError::Forbidden(format!(
            "Access denied. Required role: {}. Your role: {}",
            describe_roles(roles),
            user.role
        )))
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let token = value.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then(|| token.to_string())
}

/// `?token=` is accepted on SSE streams only, since EventSource cannot set headers
fn stream_query_token(uri: &Uri) -> Option<String> {
    if !uri.path().ends_with("/stream") {
        return None;
    }
    uri.query()?
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .find(|(key, _)| *key == "token")
        .map(|(_, value)| value.to_string())
        .filter(|value| !value.is_empty())
}

/// Authentication middleware
///
/// Verifies the session token, loads the user fresh from the database (so
/// role changes and deactivation apply immediately) and stores a
/// [`CurrentUser`] in the request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = bearer_token(request.headers())
        .or_else(|| stream_query_token(request.uri()))
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, no token".to_string()))?;

    let claims = state.signer.verify(&token).map_err(|e| {
        debug!("Rejected session token: {}", e);
        ApiError::Unauthorized("Not authorized, token failed".to_string())
    })?;

    let user = users::find_by_id(&state.db, &claims.sub)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Not authorized, user not found".to_string()))?;

    if !user.is_active {
        return Err(ApiError::Unauthorized("Account is deactivated".to_string()));
    }

    request.extensions_mut().insert(CurrentUser::from(&user));
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn user(role: Role) -> CurrentUser {
        CurrentUser {
            id: "u-1".to_string(),
            name: "Test".to_string(),
            email: "t@example.com".to_string(),
            role,
            department: None,
        }
    }

    #[test]
    fn test_require_role_message() {
        assert!(require_role(&user(Role::Hr), &[Role::Admin, Role::Hr]).is_ok());

        let err = require_role(&user(Role::Employee), &[Role::Admin, Role::Hr]).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Access denied. Required role: admin or hr. Your role: employee"
        );
    }

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(bearer_token(&headers), None);

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer abc.def"));
        assert_eq!(bearer_token(&headers).as_deref(), Some("abc.def"));
    }

    #[test]
    fn test_query_token_only_on_streams() {
        let stream: Uri = "/api/notifications/stream?token=abc".parse().unwrap();
        assert_eq!(stream_query_token(&stream).as_deref(), Some("abc"));

        let other: Uri = "/api/users?token=abc".parse().unwrap();
        assert_eq!(stream_query_token(&other), None);
    }
}
