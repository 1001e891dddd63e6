mod api;
mod config;
mod engine;
mod error;
mod models;
mod observability;
mod state;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;
use crate::engine::notify::{Mailer, run_email_worker};

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false);
    match config.log_format {
        LogFormat::Json => subscriber.json().init(),
        LogFormat::Compact => subscriber.compact().init(),
    }

    let (app_state, email_rx) = state::AppState::new(
        config.event_buffer_size,
        config.email_queue_size,
        config.admin_pin.clone(),
    );
    let shared_state = Arc::new(app_state);
    engine::workflow::refresh_pump_gauges(&shared_state);

    let mailer = Mailer::new(config.email.clone());
    if !mailer.is_enabled() {
        tracing::warn!("EMAIL_API_KEY or EMAIL_FROM not set; emails will be skipped");
    }
    tokio::spawn(run_email_worker(shared_state.clone(), mailer, email_rx));

    let app = api::rest::router(shared_state.clone());

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

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
