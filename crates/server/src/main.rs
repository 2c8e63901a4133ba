mod bootstrap;
mod chat;
mod health;
mod sweeper;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::Router;
use slotbot_agent::ChatRuntime;
use slotbot_core::config::{AppConfig, LoadOptions};
use tokio::sync::Notify;
use tower_http::trace::TraceLayer;

fn init_logging(config: &AppConfig) {
    use slotbot_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

pub fn app_router(runtime: Arc<ChatRuntime>) -> Router {
    chat::router(Arc::clone(&runtime))
        .merge(health::router(runtime))
        .layer(TraceLayer::new_for_http())
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be up before bootstrap so its events are recorded.
    let config = bootstrap::load_config(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config)?;
    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;

    let sweeper = sweeper::spawn(
        Arc::clone(&app.runtime),
        Duration::from_secs(app.config.sessions.sweep_interval_secs),
    );

    let shutdown = Arc::new(Notify::new());
    let server = axum::serve(listener, app_router(Arc::clone(&app.runtime))).with_graceful_shutdown({
        let shutdown = Arc::clone(&shutdown);
        async move { shutdown.notified().await }
    });
    let mut server = tokio::spawn(async move { server.await });

    tracing::info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        "slotbot-server started"
    );

    tokio::select! {
        joined = &mut server => {
            sweeper.abort();
            joined??;
            return Ok(());
        }
        signal = wait_for_shutdown() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        correlation_id = "shutdown",
        active_sessions = app.runtime.active_sessions(),
        "slotbot-server stopping"
    );
    sweeper.abort();
    shutdown.notify_one();

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    match tokio::time::timeout(grace, &mut server).await {
        Ok(joined) => joined??,
        Err(_) => {
            tracing::warn!(
                event_name = "system.server.shutdown_timeout",
                correlation_id = "shutdown",
                grace_secs = grace.as_secs(),
                "in-flight requests did not drain in time; aborting"
            );
            server.abort();
        }
    }

    Ok(())
}

async fn wait_for_shutdown() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    Ok(())
}
