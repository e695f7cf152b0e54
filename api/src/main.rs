use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tether_api::{config::TetherApiConfig, context::ApiContext, server};
use tether_db::SqliteStorage;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_LOG_FILTER: &str = "tether_api=info,tether_db=info,tether_pce=info,tower_http=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = TetherApiConfig::parse();

    if config.dump_openapi {
        print!("{}", server::openapi().to_pretty_json()?);
        return Ok(());
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| DEFAULT_LOG_FILTER.into());
    if config.log_json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).pretty().init();
    }

    let db = if config.create_database_if_not_exists {
        SqliteStorage::open_or_create(&config.db_path, config.db_max_connections).await
    } else {
        SqliteStorage::open(&config.db_path, config.db_max_connections).await
    }
    .with_context(|| format!("failed to open database {}", config.db_path.display()))?;

    let controller = config
        .pce
        .client()
        .context("failed to configure the policy controller client")?;

    let context = ApiContext::new(Arc::new(db), Arc::new(controller));
    let router = server::make(context);

    let listener = TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("failed to bind to {}", config.bind_addr))?;

    info!("Listening on http://{}", config.bind_addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
}
