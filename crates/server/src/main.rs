mod bootstrap;
mod chat;
mod health;

use std::net::SocketAddr;
use std::time::Duration;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use vitrine_core::config::{AppConfig, LoadOptions};

fn init_logging(config: &AppConfig) {
    use vitrine_core::config::LogFormat::*;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.logging.level.as_str()));

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_env_filter(filter).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.health_state(),
    )
    .await?;

    let sweeper = chat::spawn_sweeper(
        app.chat_state.limiters(),
        Duration::from_secs(app.config.chat.sweep_interval_secs.max(1)),
    );

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let router = chat::router(app.chat_state.clone()).merge(health::router(app.health_state()));

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        allowed_origins = app.config.chat.allowed_origins.len(),
        "vitrine-server listening"
    );

    axum::serve(listener, router.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    sweeper.abort();
    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        "vitrine-server stopping"
    );

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %error,
            "failed to listen for shutdown signal"
        );
    }
}
