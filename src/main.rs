use anyhow::Context;
use tracing_subscriber::EnvFilter;

use querygate::app::{self, AppState};
use querygate::config::AppConfig;
use querygate::store;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, JWT_SECRET, etc.
    let _ = dotenvy::dotenv();

    let config = AppConfig::load().context("failed to load configuration")?;

    let default_filter = if config.api.enable_request_logging {
        "info,querygate=debug,tower_http=debug"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .init();

    tracing::info!(
        "Starting querygate in {:?} mode (policy mode {:?}, store {:?})",
        config.environment,
        config.policy.mode,
        config.store.backend
    );

    if config.security.jwt_secret.is_empty() {
        anyhow::bail!("JWT_SECRET must be set outside development");
    }

    let store = store::connect(&config.store)
        .await
        .context("failed to initialise document store")?;

    let bind_addr = format!("0.0.0.0:{}", config.api.port);
    let app = app::router(AppState::new(config, store));

    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("querygate listening on http://{}", bind_addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("querygate stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
