//! Configuration daemon for a SIP proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!     admin API ──┐                         ┌──▶ worker 0 ─ cursor ─┐
//!  overrides file ┼─▶ Transaction ─ commit ─┤                       │
//!                 │       │                 ├──▶ worker 1 ─ cursor ─┼─▶ reads from the
//!                 │       ▼                 │                       │   pinned generation
//!                 │   writer lock           └──▶ worker N ─ cursor ─┘
//!                 │       │                          ▲
//!                 │       ▼                          │ catch_up
//!                 │   new Generation ── publish ──▶ Global Pointer
//!                 │       │
//!                 │       └── per-worker callbacks ──▶ Callback Log
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::net::TcpListener;

use sip_cfg::admin::{self, AdminState};
use sip_cfg::config::loader::load_config;
use sip_cfg::config::overrides::{apply_overrides, load_overrides};
use sip_cfg::config::watcher::OverridesWatcher;
use sip_cfg::config::DaemonConfig;
use sip_cfg::lifecycle::{signals::shutdown_signal, startup, Shutdown};
use sip_cfg::observability::{logging, metrics};
use sip_cfg::workers::spawn_workers;

#[derive(Parser)]
#[command(name = "sip-cfg")]
#[command(about = "Shared configuration daemon for a SIP proxy", long_about = None)]
struct Args {
    /// Path to the daemon configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => DaemonConfig::default(),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "sip-cfg starting");

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let store = startup::bring_up(&config)?;
    let shutdown = Shutdown::new();
    let pool = spawn_workers(store.clone(), &config.workers, &shutdown);

    // Keep the watcher alive until shutdown.
    let mut _watcher = None;
    if let Some(path) = config.overrides_file.as_deref().map(PathBuf::from) {
        match load_overrides(&path) {
            Ok(overrides) => match apply_overrides(&store, &overrides) {
                Ok(report) => tracing::info!(
                    generation = report.generation,
                    applied = report.applied,
                    "Initial overrides applied"
                ),
                Err(e) => tracing::error!(error = %e, "Initial overrides rejected"),
            },
            Err(e) => tracing::error!(path = ?path, error = %e, "Failed to load overrides"),
        }

        let (watcher, mut updates) = OverridesWatcher::new(&path);
        _watcher = Some(watcher.run()?);

        let store = store.clone();
        let mut stop = shutdown.subscribe();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    Some(overrides) = updates.recv() => {
                        let store = store.clone();
                        let result =
                            tokio::task::spawn_blocking(move || apply_overrides(&store, &overrides))
                                .await;
                        match result {
                            Ok(Ok(report)) => tracing::info!(
                                generation = report.generation,
                                applied = report.applied,
                                "Overrides reloaded"
                            ),
                            Ok(Err(e)) => tracing::error!(
                                error = %e,
                                "Overrides rejected, keeping current configuration"
                            ),
                            Err(e) => tracing::error!(error = %e, "Overrides task failed"),
                        }
                    }
                    _ = stop.recv() => break,
                    else => break,
                }
            }
        });
    }

    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(store.clone(), &config.admin.api_key);
        let stop = shutdown.subscribe();
        Some(tokio::spawn(admin::serve(listener, state, stop)))
    } else {
        None
    };

    shutdown_signal().await;
    shutdown.trigger();

    let summaries = pool.join().await;
    for s in &summaries {
        tracing::info!(
            worker = s.worker,
            units = s.units,
            callbacks_fired = s.callbacks_fired,
            last_generation = s.last_generation,
            "Worker detached"
        );
    }
    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin task failed"),
            Ok(Ok(())) => {}
        }
    }

    let stats = store.stats_snapshot();
    tracing::info!(
        generation = stats.current_generation,
        generations_live = stats.generations_live,
        log_nodes_live = stats.log_nodes_live,
        "Shutdown complete"
    );
    Ok(())
}
