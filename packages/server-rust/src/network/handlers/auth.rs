//! Login and logout.

use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ApiError, AppState};
use crate::auth::AdminSession;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub email: String,
    pub expires_at: DateTime<Utc>,
}

/// `POST /api/login`
pub async fn login_handler(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let session = state.sessions.login(&request.email, &request.password)?;
    Ok(Json(LoginResponse {
        token: session.token,
        email: session.email,
        expires_at: session.expires_at,
    }))
}

/// `POST /api/logout`, behind the session guard.
pub async fn logout_handler(
    State(state): State<AppState>,
    Extension(session): Extension<AdminSession>,
) -> StatusCode {
    state.sessions.logout(&session.token);
    StatusCode::NO_CONTENT
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::response::IntoResponse;

    use super::*;
    use crate::auth::AuthError;
    use crate::network::handlers::test_support::{self, EMAIL, PASSWORD};
    use crate::store::MemoryDocumentStore;

    fn test_state() -> AppState {
        test_support::state(Arc::new(MemoryDocumentStore::new()))
    }

    #[tokio::test]
    async fn login_returns_token_then_logout_revokes_it() {
        let state = test_state();
        let response = login_handler(
            State(state.clone()),
            Json(LoginRequest {
                email: EMAIL.to_string(),
                password: PASSWORD.to_string(),
            }),
        )
        .await
        .unwrap()
        .0;
        assert_eq!(response.email, EMAIL);

        let session = state.sessions.validate(&response.token).unwrap();
        let status = logout_handler(State(state.clone()), Extension(session)).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(
            state.sessions.validate(&response.token),
            Err(AuthError::InvalidSession)
        );
    }

    #[tokio::test]
    async fn blank_login_is_bad_request() {
        let err = login_handler(State(test_state()), Json(LoginRequest::default()))
            .await
            .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn wrong_password_is_unauthorized() {
        let err = login_handler(
            State(test_state()),
            Json(LoginRequest {
                email: EMAIL.to_string(),
                password: "wrong".to_string(),
            }),
        )
        .await
        .unwrap_err();
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }
}
