// Meter Readings - Web Server

use anyhow::{Context, Result};
use meter_readings::api::{router, AppState};
use meter_readings::{build_engine, init_logging, Config};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_logging(config.log_format);

    let engine = build_engine(&config)?;
    let app = router(AppState::new(engine), &config.cors_origin);

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind_addr))?;

    tracing::info!(
        addr = %config.bind_addr,
        version = meter_readings::VERSION,
        "Meter reading server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}
