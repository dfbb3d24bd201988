//! Application-level configuration.

use std::time::Duration;

use crate::joiner::DEFAULT_LOOKUP_TIMEOUT;
use crate::network::NetworkConfig;

/// Top-level configuration assembled by the binary.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub network: NetworkConfig,
    pub admin: AdminConfig,
    pub reports: ReportConfig,
}

/// The single administrator credential pair and session policy.
#[derive(Clone)]
pub struct AdminConfig {
    pub email: String,
    pub password: String,
    /// Lifetime of a session from login.
    pub session_ttl: Duration,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            email: "admin@tenantdesk.local".to_string(),
            password: "admin123".to_string(),
            session_ttl: Duration::from_secs(8 * 60 * 60),
        }
    }
}

// Keeps the password out of logs.
impl std::fmt::Debug for AdminConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AdminConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("session_ttl", &self.session_ttl)
            .finish()
    }
}

/// Report pipeline tuning.
#[derive(Debug, Clone)]
pub struct ReportConfig {
    /// Upper bound for a single relation lookup during enrichment.
    pub lookup_timeout: Duration,
    /// How long an HTTP request waits for a freshly opened view to load
    /// before answering with its loading state.
    pub ready_timeout: Duration,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            lookup_timeout: DEFAULT_LOOKUP_TIMEOUT,
            ready_timeout: Duration::from_secs(2),
        }
    }
}
