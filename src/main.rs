mod api;
mod config;
mod dispatch;
mod error;
mod gateway;
mod geo;
mod hub;
mod models;
mod observability;
mod state;
mod sync;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::geo::geocode::geocoder_from_config;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let geocoder = geocoder_from_config(&config)
        .map_err(|err| error::AppError::Internal(format!("geocoder setup failed: {err}")))?;

    let http_port = config.http_port;
    let shared_state = Arc::new(state::AppState::new(config, geocoder));

    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{http_port}");
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
