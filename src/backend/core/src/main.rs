//! SaaS Server - Main entry point

use std::sync::Arc;

use axum::http::HeaderName;

use saas_core::{
    api::{self, AppState},
    config::Config,
    rbac::{IdentifyCallerLayer, PolicyEngine},
    store::InMemoryStore,
    telemetry::{init_logging, init_metrics},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: Could not load config: {}. Using defaults.", e);
        Config::default()
    });

    init_logging(&config.logging, &config.environment)?;
    let metrics = init_metrics(&config.metrics)?;

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        environment = %config.environment,
        "Starting SaaS Server"
    );

    // Authorization engine
    let engine = PolicyEngine::standard().with_settings(config.authorization.evaluation_settings());
    if config.authorization.validate_catalog_on_startup {
        engine
            .validate_catalog()
            .map_err(|e| anyhow::anyhow!("Role catalog is invalid: {}", e))?;
    }

    let store = Arc::new(InMemoryStore::new());
    let state = AppState::new(engine, store).with_metrics(metrics);

    let header = HeaderName::from_bytes(config.auth.user_id_header.as_bytes())
        .map_err(|e| anyhow::anyhow!("Invalid user id header '{}': {}", config.auth.user_id_header, e))?;
    let app = api::build_router(state, IdentifyCallerLayer::new(header));

    // Start server
    let addr = config.server.bind_address();
    tracing::info!(address = %addr, "Starting HTTP server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");

    Ok(())
}

/// Wait for shutdown signal.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
