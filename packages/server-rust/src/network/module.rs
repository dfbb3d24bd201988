//! Network module with deferred startup lifecycle.
//!
//! `new()` allocates the shutdown controller, `start()` binds the TCP
//! listener, and `serve()` accepts requests until the shutdown future
//! resolves. The report engine, write service, and session manager are
//! wired into [`AppState`] between `start()` and `serve()`.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use axum::middleware::from_fn_with_state;
use axum::routing::{delete, get, post, put};
use axum::Router;
use tokio::net::TcpListener;
use tracing::{info, warn};

use super::config::NetworkConfig;
use super::handlers::{
    create_apartment_handler, delete_record_handler, health_handler, liveness_handler,
    login_handler, logout_handler, post_notice_handler, readiness_handler, report_handler,
    update_apartment_handler, update_status_handler, AppState,
};
use super::middleware::{build_http_layers, require_admin, track_requests};
use super::shutdown::ShutdownController;
use crate::auth::SessionManager;
use crate::engine::ReportEngine;
use crate::writes::WriteService;

/// Assembles the router with all routes and middleware.
///
/// Routes:
/// - `GET /health`, `GET /health/live`, `GET /health/ready`
/// - `POST /api/login`
/// - behind the session guard: `POST /api/logout`,
///   `GET /api/reports/{kind}`, `POST /api/approvals/{kind}/{id}`,
///   `DELETE /api/collections/{collection}/{id}`, `POST /api/apartments`,
///   `PUT /api/apartments/{id}`, `POST /api/notices`
pub fn build_router(state: AppState) -> Router {
    let guarded = Router::new()
        .route("/api/logout", post(logout_handler))
        .route("/api/reports/{kind}", get(report_handler))
        .route("/api/approvals/{kind}/{id}", post(update_status_handler))
        .route("/api/collections/{collection}/{id}", delete(delete_record_handler))
        .route("/api/apartments", post(create_apartment_handler))
        .route("/api/apartments/{id}", put(update_apartment_handler))
        .route("/api/notices", post(post_notice_handler))
        .route_layer(from_fn_with_state(state.clone(), require_admin));

    let api = Router::new()
        .route("/api/login", post(login_handler))
        .merge(guarded)
        .route_layer(from_fn_with_state(state.clone(), track_requests));

    let layers = build_http_layers(&state.config);

    Router::new()
        .route("/health", get(health_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .merge(api)
        .layer(layers)
        .with_state(state)
}

pub struct NetworkModule {
    config: NetworkConfig,
    listener: Option<TcpListener>,
    shutdown: Arc<ShutdownController>,
}

impl NetworkModule {
    /// Creates the module without binding any port.
    #[must_use]
    pub fn new(config: NetworkConfig) -> Self {
        Self {
            config,
            listener: None,
            shutdown: Arc::new(ShutdownController::new()),
        }
    }

    #[must_use]
    pub fn shutdown_controller(&self) -> Arc<ShutdownController> {
        Arc::clone(&self.shutdown)
    }

    /// Handler state sharing this module's config and shutdown controller.
    #[must_use]
    pub fn app_state(
        &self,
        engine: Arc<ReportEngine>,
        writes: Arc<WriteService>,
        sessions: Arc<SessionManager>,
    ) -> AppState {
        AppState {
            shutdown: Arc::clone(&self.shutdown),
            config: Arc::new(self.config.clone()),
            engine,
            writes,
            sessions,
            start_time: Instant::now(),
        }
    }

    /// Binds the TCP listener to the configured host and port.
    ///
    /// Returns the bound port, which differs from the configured one when
    /// port 0 asks for an OS-assigned port.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn start(&mut self) -> anyhow::Result<u16> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;
        let port = listener.local_addr()?.port();

        info!("TCP listener bound to {}:{}", self.config.host, port);

        self.listener = Some(listener);
        Ok(port)
    }

    /// Serves requests until `shutdown` resolves, then drains.
    ///
    /// After the signal the health state moves to Draining, new API calls
    /// get 503, and in-flight requests get up to the configured drain
    /// timeout before the state moves to Stopped.
    ///
    /// # Errors
    ///
    /// Returns an error if `start()` was not called or the server hits a
    /// fatal I/O error.
    pub async fn serve(
        self,
        state: AppState,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let listener = self
            .listener
            .context("start() must be called before serve()")?;
        let shutdown_ctrl = self.shutdown;
        let drain_timeout = self.config.drain_timeout;
        let router = build_router(state);

        shutdown_ctrl.set_ready();
        info!("Serving HTTP connections");

        let signal_ctrl = Arc::clone(&shutdown_ctrl);
        axum::serve(listener, router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                signal_ctrl.trigger_shutdown();
            })
            .await?;

        if shutdown_ctrl.wait_for_drain(drain_timeout).await {
            info!("All requests drained");
        } else {
            warn!(
                in_flight = shutdown_ctrl.in_flight_count(),
                "Drain timeout expired with in-flight requests remaining"
            );
        }
        Ok(())
    }
}
