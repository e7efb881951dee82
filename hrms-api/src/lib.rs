//! hrms-api library interface
//!
//! Exposes the router and state so integration tests can drive the service
//! without binding a socket.

pub mod api;
pub mod db;
pub mod error;
pub mod services;

pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use chrono::{DateTime, Utc};
use hrms_common::auth::TokenSigner;
use hrms_common::events::EventBus;
use services::mailer::{Mailer, OutboxMailer};
use services::notifier::Notifier;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub event_bus: EventBus,
    /// Issues and verifies session tokens
    pub signer: TokenSigner,
    pub mailer: Arc<dyn Mailer>,
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    /// State with the outbox mailer writing into the same database
    pub fn new(db: SqlitePool, event_bus: EventBus, signer: TokenSigner) -> Self {
        let mailer = Arc::new(OutboxMailer::new(db.clone()));
        Self {
            db,
            event_bus,
            signer,
            mailer,
            startup_time: Utc::now(),
        }
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn Mailer>) -> Self {
        self.mailer = mailer;
        self
    }

    pub fn notifier(&self) -> Notifier {
        Notifier::new(self.db.clone(), self.event_bus.clone())
    }
}

/// Build application router
///
/// Everything except health, the unauthenticated auth flows, public job
/// listings and onboarding links runs behind `auth_middleware`.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::auth::auth_routes())
        .merge(api::users::user_routes())
        .merge(api::departments::department_routes())
        .merge(api::attendance::attendance_routes())
        .merge(api::payroll::payroll_routes())
        .merge(api::leaves::leave_routes())
        .merge(api::jobs::job_routes())
        .merge(api::applications::application_routes())
        .merge(api::performance::performance_routes())
        .merge(api::calendar::event_routes())
        .merge(api::documents::document_routes())
        .merge(api::notifications::notification_routes())
        .merge(api::audit::audit_routes())
        .merge(api::dashboard::dashboard_routes())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            api::middleware::auth_middleware,
        ));

    let public = Router::new()
        .merge(api::health::health_routes())
        .merge(api::auth::public_auth_routes())
        .merge(api::jobs::public_job_routes())
        .merge(api::applications::onboarding_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
