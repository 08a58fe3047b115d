mod app;
mod error;
mod routes;

use std::sync::Arc;

use anyhow::Context;
use offer_ingest::config::{load_config, Config};
use offer_ingest::logging::{init_logging, LogFormat};
use offer_ingest::store::open_store;
use offer_ingest::{JobOrchestrator, Pipeline};
use tracing::info;

use crate::app::{build_router, AppState};

/// Path of the JSON config file. Without it the defaults apply.
const CONFIG_ENV_VAR: &str = "OFFER_INGEST_CONFIG";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging(LogFormat::from_env());

    let mut config = match std::env::var(CONFIG_ENV_VAR) {
        Ok(path) => {
            load_config(&path).with_context(|| format!("Failed to load config from {}", path))?
        }
        Err(_) => {
            info!("{} not set, using default configuration", CONFIG_ENV_VAR);
            Config::default()
        }
    };
    config.apply_env_overrides();

    let store = open_store(&config.store).await;
    let pipeline = Pipeline::from_config(&config).context("Failed to build pipeline")?;
    info!(
        store = store.backend_name(),
        oracle = pipeline.oracle_name(),
        rates = pipeline.rate_oracle_name(),
        delivery = pipeline.transport_name(),
        "Pipeline ready"
    );

    let state = AppState {
        jobs: JobOrchestrator::new(store, Arc::new(pipeline)),
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind))?;
    info!("Listening on {}", config.server.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
