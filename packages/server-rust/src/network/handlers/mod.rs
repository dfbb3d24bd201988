//! HTTP handler definitions for the admin API.
//!
//! Defines `AppState` (the shared state carried through axum extractors),
//! the JSON error type every API handler returns, and re-exports the
//! handler functions used when building the router.

pub mod auth;
pub mod health;
pub mod reports;
pub mod writes;

pub use auth::{login_handler, logout_handler};
pub use health::{health_handler, liveness_handler, readiness_handler};
pub use reports::report_handler;
pub use writes::{
    create_apartment_handler, delete_record_handler, post_notice_handler,
    update_apartment_handler, update_status_handler,
};

use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tenantdesk_core::status::UnknownVariant;

use super::{NetworkConfig, ShutdownController};
use crate::auth::{AuthError, SessionManager};
use crate::catalog::UnknownReport;
use crate::engine::ReportEngine;
use crate::store::StoreError;
use crate::writes::{WriteError, WriteService};

/// Shared application state passed to all axum handlers via `State` extraction.
///
/// Holds `Arc` references so cloning is cheap.
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Arc<ShutdownController>,
    pub config: Arc<NetworkConfig>,
    pub engine: Arc<ReportEngine>,
    pub writes: Arc<WriteService>,
    pub sessions: Arc<SessionManager>,
    /// Server process start time, used for uptime calculation.
    pub start_time: Instant,
}

/// Error body of every API handler: `{"error": "..."}` plus the failing
/// fields for validation errors.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Validation(crate::writes::ValidationError),
    Unauthorized(AuthError),
    NotFound(String),
    Unavailable(String),
}

impl ApiError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match self {
            ApiError::Validation(err) => json!({
                "error": err.to_string(),
                "fields": err.errors,
            }),
            ApiError::Unauthorized(err) => json!({ "error": err.to_string() }),
            ApiError::BadRequest(message)
            | ApiError::NotFound(message)
            | ApiError::Unavailable(message) => json!({ "error": message }),
        };
        (status, Json(body)).into_response()
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::BadRequest(err.to_string()),
            AuthError::InvalidCredentials | AuthError::InvalidSession => {
                ApiError::Unauthorized(err)
            }
        }
    }
}

impl From<UnknownReport> for ApiError {
    fn from(err: UnknownReport) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<UnknownVariant> for ApiError {
    fn from(err: UnknownVariant) -> Self {
        ApiError::NotFound(err.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            StoreError::Unavailable(_) => ApiError::Unavailable(err.to_string()),
        }
    }
}

impl From<WriteError> for ApiError {
    fn from(err: WriteError) -> Self {
        match err {
            WriteError::Validation(v) => ApiError::Validation(v),
            WriteError::Store(e) => e.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::time::Duration;

    use super::*;
    use crate::config::{AdminConfig, ReportConfig};
    use crate::store::MemoryDocumentStore;

    pub const EMAIL: &str = "admin@example.com";
    pub const PASSWORD: &str = "s3cret";

    /// State over a fresh in-memory store, already marked ready.
    pub fn state(store: Arc<MemoryDocumentStore>) -> AppState {
        let shutdown = Arc::new(ShutdownController::new());
        shutdown.set_ready();
        AppState {
            shutdown,
            config: Arc::new(NetworkConfig::default()),
            engine: Arc::new(ReportEngine::new(
                store.clone(),
                ReportConfig {
                    ready_timeout: Duration::from_secs(2),
                    ..ReportConfig::default()
                },
            )),
            writes: Arc::new(WriteService::new(store)),
            sessions: Arc::new(SessionManager::new(AdminConfig {
                email: EMAIL.to_string(),
                password: PASSWORD.to_string(),
                session_ttl: Duration::from_secs(60),
            })),
            start_time: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_statuses() {
        assert_eq!(
            ApiError::from(AuthError::MissingCredentials).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::from(AuthError::InvalidSession).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::from(StoreError::NotFound {
                collection: "apartments".to_string(),
                id: "a1".to_string(),
            })
            .status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(StoreError::Unavailable("down".to_string())).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ApiError::from(UnknownReport("nope".to_string())).status(),
            StatusCode::NOT_FOUND
        );
    }
}
