//! Operation Safety Engine - Main Entry Point

use anyhow::Context;
use api::{init_logging, run_server, AppState};
use metrics_exporter_prometheus::PrometheusBuilder;
use safety_config::SafetyConfig;
use std::sync::Arc;
use std::time::Duration;
use storage::{save_engine, restore_engine, FileSnapshotStore};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();

    info!("=== OpsGate v{} ===", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::var("OPSGATE_CONFIG").ok();
    let config = Arc::new(
        SafetyConfig::load(config_path.as_deref()).context("loading safety configuration")?,
    );

    let metrics_handle = PrometheusBuilder::new()
        .install_recorder()
        .context("installing metrics recorder")?;

    // NoopExecutor: dispatch to real infrastructure happens out-of-band;
    // the engine only authorizes and gates.
    let state = AppState::new(Arc::clone(&config))
        .with_executor(Arc::new(op_authorizer::NoopExecutor))
        .with_metrics(metrics_handle);

    // Optional durable snapshot; cooldowns intentionally start empty.
    let snapshot_store = std::env::var("OPSGATE_SNAPSHOT")
        .ok()
        .map(|path| Arc::new(FileSnapshotStore::new(path)));
    if let Some(store) = snapshot_store.as_ref() {
        match restore_engine(store.as_ref(), &state.authorizer, &state.correlator) {
            Ok(true) => info!("Resumed from snapshot"),
            Ok(false) => info!("No snapshot found; starting fresh"),
            Err(err) => warn!(error = %err, "Snapshot restore failed; starting fresh"),
        }
    }

    // Periodic sweep: evict expired alerts and persist state.
    {
        let state = state.clone();
        let snapshot_store = snapshot_store.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(60));
            loop {
                interval.tick().await;
                let evicted = state.correlator.evict_expired();
                if evicted > 0 {
                    info!(evicted, "Periodic alert eviction");
                }
                if let Some(store) = snapshot_store.as_ref() {
                    if let Err(err) =
                        save_engine(store.as_ref(), &state.authorizer, &state.correlator)
                    {
                        warn!(error = %err, "Periodic snapshot failed");
                    }
                }
            }
        });
    }

    let addr = std::env::var("OPSGATE_ADDR").unwrap_or_else(|_| "0.0.0.0:8080".to_string());
    run_server(&addr, state).await?;

    Ok(())
}
