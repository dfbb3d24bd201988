//! Administrator sessions.
//!
//! [`SessionManager`] is created once at startup and injected into the HTTP
//! state; nothing about authentication lives in globals. Sessions are opaque
//! UUID tokens held in memory and expire after the configured TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use subtle::ConstantTimeEq;
use thiserror::Error;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::AdminConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Please enter email and password")]
    MissingCredentials,
    #[error("Invalid email or password")]
    InvalidCredentials,
    #[error("Session expired or invalid")]
    InvalidSession,
}

/// An authenticated administrator session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSession {
    pub token: String,
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AdminSession {
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

pub struct SessionManager {
    admin: AdminConfig,
    sessions: DashMap<String, AdminSession>,
}

impl SessionManager {
    #[must_use]
    pub fn new(admin: AdminConfig) -> Self {
        Self {
            admin,
            sessions: DashMap::new(),
        }
    }

    /// Checks the credential pair and opens a session. Both inputs are
    /// trimmed; the comparison runs in constant time.
    ///
    /// # Errors
    ///
    /// [`AuthError::MissingCredentials`] when either input is blank,
    /// [`AuthError::InvalidCredentials`] when they do not match.
    pub fn login(&self, email: &str, password: &str) -> Result<AdminSession, AuthError> {
        self.login_at(email, password, Utc::now())
    }

    fn login_at(
        &self,
        email: &str,
        password: &str,
        now: DateTime<Utc>,
    ) -> Result<AdminSession, AuthError> {
        let email = email.trim();
        let password = password.trim();
        if email.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let email_ok = email.as_bytes().ct_eq(self.admin.email.as_bytes());
        let password_ok = password.as_bytes().ct_eq(self.admin.password.as_bytes());
        if !bool::from(email_ok & password_ok) {
            info!("admin login rejected");
            return Err(AuthError::InvalidCredentials);
        }

        // Oversized TTLs saturate instead of overflowing.
        let ttl = chrono::Duration::from_std(self.admin.session_ttl)
            .unwrap_or(chrono::Duration::MAX);
        let session = AdminSession {
            token: uuid::Uuid::new_v4().to_string(),
            email: email.to_string(),
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
        };
        let purged = self.purge_expired_at(now);
        if purged > 0 {
            debug!(purged, "expired sessions purged on login");
        }
        self.sessions.insert(session.token.clone(), session.clone());
        info!(email = %session.email, "admin logged in");
        Ok(session)
    }

    /// Ends a session. Returns whether it existed.
    pub fn logout(&self, token: &str) -> bool {
        let removed = self.sessions.remove(token).is_some();
        if removed {
            info!("admin logged out");
        }
        removed
    }

    /// Resolves a bearer token to its live session. Expired sessions are
    /// removed on sight.
    ///
    /// # Errors
    ///
    /// [`AuthError::InvalidSession`] for unknown or expired tokens.
    pub fn validate(&self, token: &str) -> Result<AdminSession, AuthError> {
        self.validate_at(token, Utc::now())
    }

    fn validate_at(&self, token: &str, now: DateTime<Utc>) -> Result<AdminSession, AuthError> {
        let session = self
            .sessions
            .get(token)
            .map(|s| s.clone())
            .ok_or(AuthError::InvalidSession)?;
        if session.is_expired_at(now) {
            self.sessions.remove(token);
            debug!("expired session rejected");
            return Err(AuthError::InvalidSession);
        }
        Ok(session)
    }

    /// Drops every expired session. Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        self.purge_expired_at(Utc::now())
    }

    fn purge_expired_at(&self, now: DateTime<Utc>) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, s| !s.is_expired_at(now));
        before - self.sessions.len()
    }

    #[must_use]
    pub fn active_count(&self) -> usize {
        self.sessions.len()
    }
}

/// Purges expired sessions every `every` until `cancel` fires.
///
/// Must be called from within a tokio runtime.
pub fn spawn_session_purger(
    sessions: Arc<SessionManager>,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = tokio::time::interval(every);
        // The first tick completes immediately.
        ticks.tick().await;
        loop {
            tokio::select! {
                () = cancel.cancelled() => break,
                _ = ticks.tick() => {
                    let purged = sessions.purge_expired();
                    if purged > 0 {
                        debug!(purged, "expired sessions purged");
                    }
                }
            }
        }
    })
}
