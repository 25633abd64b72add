//! ShardMaster coordinator: entry point.
//!
//! Loads `CoordinatorConfig`, starts `CoordinatorService` (which spawns its
//! own heartbeat sweeper), serves the HTTP/JSON RPC surface, and waits for
//! a shutdown signal before stopping the sweeper and returning.

mod rpc;

use std::sync::Arc;

use anyhow::{Context, Result};
use shardmaster_core::CoordinatorConfig;
use shardmaster_service::CoordinatorService;
use tokio::signal;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("shardmaster=info".parse()?),
        )
        .json()
        .init();

    info!("starting shardmaster coordinator");

    let config = CoordinatorConfig::load()
        .await
        .context("failed to load coordinator configuration")?;
    info!(
        heartbeat_check_interval = config.heartbeat_check_interval,
        virtual_nodes_per_server = config.virtual_nodes_per_server,
        default_replica_count = config.default_replica_count,
        "configuration loaded"
    );

    let service = Arc::new(CoordinatorService::start(&config));
    let app = rpc::router(service.clone());

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!(%addr, "coordinator RPC surface listening");

    let server = tokio::spawn(async move {
        axum::serve(listener, app).await.context("RPC server error")
    });

    match signal::ctrl_c().await {
        Ok(()) => info!("received shutdown signal, stopping"),
        Err(err) => tracing::error!(error = %err, "unable to listen for shutdown signal"),
    }

    service.stop_heartbeat_check();
    server.abort();

    info!("shardmaster coordinator stopped");
    Ok(())
}
