//! # provider-matrix
//!
//! ## Startup
//!
//! 1. **Flags** - parse the command line and environment
//! 2. **Manifests** - load the manifest directory and build clients
//! 3. **Probes** - serve `/healthz` and `/readyz`
//! 4. **Loop** - reconcile until Ctrl+C
//!
//! A failed first load halts startup. Later failures are logged and retried
//! on the next interval.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::watch;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use provider_matrix::{Cli, LoopConfig, ManifestStore, ReconciliationLoop, health};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    info!(
        manifests = %cli.manifests.display(),
        poll = ?cli.poll,
        sync = ?cli.sync,
        "provider-matrix starting"
    );

    let config = LoopConfig {
        poll_interval: cli.poll,
        sync_interval: cli.sync,
        max_reconcile_rate: cli.max_reconcile_rate,
    };
    let store = match &cli.state_file {
        Some(path) => ManifestStore::new(&cli.manifests).with_state_file(path),
        None => ManifestStore::new(&cli.manifests),
    };
    info!(state_file = %store.state_path().display(), "Persisting state");

    let mut daemon = ReconciliationLoop::with_http_clients(store, config);
    daemon
        .sync()
        .with_context(|| format!("Failed to load manifests from {}", cli.manifests.display()))?;

    let (stop_tx, stop_rx) = watch::channel(false);
    let probes = tokio::spawn(health::serve(
        cli.probe_addr,
        daemon.readiness(),
        stopped(stop_rx),
    ));

    daemon
        .run(wait_for_shutdown())
        .await
        .context("Reconciliation loop failed")?;

    // Receivers may already be gone if the probe server failed to bind.
    let _ = stop_tx.send(true);
    match probes.await {
        Ok(Ok(())) => {}
        Ok(Err(err)) => error!("Health probes failed: {}", err),
        Err(err) => error!("Health probe task panicked: {}", err),
    }

    info!("provider-matrix stopped gracefully");
    Ok(())
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();
}

/// Resolves once the stop flag flips.
async fn stopped(mut rx: watch::Receiver<bool>) {
    // A dropped sender also ends the wait.
    let _ = rx.wait_for(|stop| *stop).await;
}

/// Wait for shutdown signal (Ctrl+C).
async fn wait_for_shutdown() {
    match signal::ctrl_c().await {
        Ok(()) => info!("Received Ctrl+C, initiating graceful shutdown"),
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
