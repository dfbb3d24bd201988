//! `tenantdesk` admin API server.
//!
//! ```bash
//! tenantdesk                              # 0.0.0.0:8080 with demo data
//! tenantdesk --port 9000 --log-json       # JSON logs
//! tenantdesk --metrics-addr 0.0.0.0:9100  # Prometheus scrape endpoint
//! ```

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use tenantdesk_server::config::{AdminConfig, AppConfig, ReportConfig};
use tenantdesk_server::network::{NetworkConfig, NetworkModule};
use tenantdesk_server::store::{
    ChangeObserver, CompositeChangeObserver, MemoryDocumentStore, MetricsObserver,
    TracingObserver,
};
use tenantdesk_server::auth::spawn_session_purger;
use tenantdesk_server::{seed, ReportEngine, SessionManager, WriteService};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// How often abandoned admin sessions are swept.
const SESSION_PURGE_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Debug, Parser)]
#[command(name = "tenantdesk", version, about = "Apartment admin console backend")]
struct Args {
    #[arg(long, env = "TENANTDESK_HOST", default_value = "0.0.0.0")]
    host: String,

    #[arg(long, env = "TENANTDESK_PORT", default_value_t = 8080)]
    port: u16,

    #[arg(long, env = "TENANTDESK_ADMIN_EMAIL")]
    admin_email: Option<String>,

    #[arg(long, env = "TENANTDESK_ADMIN_PASSWORD", hide_env_values = true)]
    admin_password: Option<String>,

    /// Session lifetime in minutes.
    #[arg(long, env = "TENANTDESK_SESSION_TTL_MINUTES", default_value_t = 480)]
    session_ttl_minutes: u64,

    /// Allowed CORS origin; repeat for several. Defaults to any origin.
    #[arg(long = "cors-origin", env = "TENANTDESK_CORS_ORIGINS", value_delimiter = ',')]
    cors_origins: Vec<String>,

    /// Upper bound for one relation lookup while enriching a snapshot.
    #[arg(long, env = "TENANTDESK_LOOKUP_TIMEOUT_MS", default_value_t = 5000)]
    lookup_timeout_ms: u64,

    /// Serve Prometheus metrics on this address.
    #[arg(long, env = "TENANTDESK_METRICS_ADDR")]
    metrics_addr: Option<SocketAddr>,

    /// Emit logs as JSON lines.
    #[arg(long, env = "TENANTDESK_LOG_JSON")]
    log_json: bool,

    /// Start with an empty store.
    #[arg(long)]
    no_seed: bool,
}

impl Args {
    fn app_config(&self) -> AppConfig {
        let defaults = AppConfig::default();
        let admin_defaults = AdminConfig::default();
        AppConfig {
            network: NetworkConfig {
                host: self.host.clone(),
                port: self.port,
                cors_origins: if self.cors_origins.is_empty() {
                    defaults.network.cors_origins
                } else {
                    self.cors_origins.clone()
                },
                ..defaults.network
            },
            admin: AdminConfig {
                email: self.admin_email.clone().unwrap_or(admin_defaults.email),
                password: self.admin_password.clone().unwrap_or(admin_defaults.password),
                session_ttl: Duration::from_secs(self.session_ttl_minutes.saturating_mul(60)),
            },
            reports: ReportConfig {
                lookup_timeout: Duration::from_millis(self.lookup_timeout_ms),
                ..defaults.reports
            },
        }
    }
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "tenantdesk_server=info,tenantdesk=info,tower_http=info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| fmt::layer().json()))
        .with((!json).then(fmt::layer))
        .init();
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_tracing(args.log_json);

    if let Some(addr) = args.metrics_addr {
        PrometheusBuilder::new()
            .with_http_listener(addr)
            .install()
            .context("failed to install Prometheus exporter")?;
        info!(%addr, "metrics exporter listening");
    }

    let config = args.app_config();
    if args.admin_password.is_none() {
        warn!("TENANTDESK_ADMIN_PASSWORD not set; using the default admin password");
    }
    info!(?config, "starting tenantdesk");

    let observers: Vec<Arc<dyn ChangeObserver>> =
        vec![Arc::new(MetricsObserver), Arc::new(TracingObserver)];
    let observer = CompositeChangeObserver::new(observers);
    let store = Arc::new(MemoryDocumentStore::new().with_observer(Arc::new(observer)));
    if !args.no_seed {
        seed::load_demo(&store);
    }

    let engine = Arc::new(ReportEngine::new(store.clone(), config.reports.clone()));
    let writes = Arc::new(WriteService::new(store));
    let sessions = Arc::new(SessionManager::new(config.admin.clone()));
    let purge_cancel = CancellationToken::new();
    let purger = spawn_session_purger(
        Arc::clone(&sessions),
        SESSION_PURGE_INTERVAL,
        purge_cancel.clone(),
    );

    let mut network = NetworkModule::new(config.network.clone());
    let port = network.start().await?;
    info!(port, "tenantdesk listening");

    let state = network.app_state(Arc::clone(&engine), writes, sessions);
    network.serve(state, shutdown_signal()).await?;

    purge_cancel.cancel();
    if let Err(err) = purger.await {
        warn!(error = %err, "session purger ended abnormally");
    }
    engine.close_all();
    info!("tenantdesk stopped");
    Ok(())
}
