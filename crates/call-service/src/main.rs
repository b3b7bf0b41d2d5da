//! Interfone Call Service
//!
//! Entry point for the intercom call signaling server. Wires the Postgres
//! store, the provider clients, the orchestrator, and the HTTP API together.

use call_service::config::Config;
use call_service::orchestrator::CallOrchestrator;
use call_service::routes::{self, AppState};
use call_service::services::{HttpBridgeProvider, HttpPushGateway};
use call_service::store::PgCallStore;
use call_service::tasks::NotifierRegistry;
use anyhow::Context;
use call_service::{observability, store::CallStore};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "call_service=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interfone call service");

    // Load configuration
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;

    info!(
        bind_address = %config.bind_address,
        ring_retry_interval_seconds = config.ring_retry_interval.as_secs(),
        ring_timeout_seconds = config.ring_timeout.as_secs(),
        "Configuration loaded successfully"
    );

    // Install the metrics recorder before anything records
    let metrics_handle = observability::metrics::init_metrics_recorder().map_err(|e| {
        error!("Failed to initialize metrics: {}", e);
        anyhow::anyhow!(e)
    })?;

    // Initialize database connection pool
    info!("Connecting to database...");
    let db_pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(600))
        .connect(&config.database_url)
        .await
        .map_err(|e| {
            error!("Failed to connect to database: {}", e);
            e
        })?;

    info!("Database connection established");

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .context("Failed to run database migrations")?;

    let store: Arc<dyn CallStore> = Arc::new(PgCallStore::new(db_pool.clone()));
    let push = Arc::new(HttpPushGateway::new(config.push_gateway_url.clone())?);
    let bridge = Arc::new(HttpBridgeProvider::new(
        config.bridge_provider_url.clone(),
        config.bridge_provider_token.clone(),
    )?);
    let registry = Arc::new(NotifierRegistry::new());

    let orchestrator = Arc::new(CallOrchestrator::new(
        store.clone(),
        push,
        bridge,
        registry,
        config.ring_retry_interval,
        config.ring_timeout,
    ));

    let bind_address = config.bind_address.clone();
    let state = Arc::new(AppState {
        store,
        orchestrator,
        pool: Some(db_pool),
        metrics_handle: Some(metrics_handle),
    });

    let app = routes::build_routes(state);

    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("Invalid bind address: {bind_address}"))?;

    info!("Call service listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Call service shutdown complete");

    Ok(())
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
