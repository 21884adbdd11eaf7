// Controller entry point. Grounded on the sidecar's main.rs: tracing init,
// env/CLI-backed config, then hand off to the long-running loop.

use std::sync::Arc;

use clap::Parser;
use stackset_controller::client::FakeClusterClient;
use stackset_controller::config::Config;
use stackset_controller::controller;
use stackset_controller::metrics::Metrics;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt().with_env_filter(tracing_subscriber::EnvFilter::from_default_env()).init();

    let config = Config::parse();
    info!(controller_id = %config.controller_id, resync_interval_seconds = config.resync_interval_seconds, workers = config.workers, "starting stackset-controller");

    // TODO: swap for a real Kubernetes ClusterClient once the API surface
    // stabilizes; until then the controller runs against an empty in-memory
    // cluster so the binary is exercisable without a live cluster.
    let client: Arc<dyn stackset_controller::client::ClusterClient> = Arc::new(FakeClusterClient::new());
    let metrics = Arc::new(Metrics::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    tokio::spawn(async move {
        let _ = tokio::signal::ctrl_c().await;
        info!("received interrupt, shutting down");
        let _ = shutdown_tx.send(true);
    });

    controller::run(client, config, metrics, shutdown_rx).await;
    Ok(())
}
