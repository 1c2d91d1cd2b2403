//! Standalone mode: every subsystem in one process.

use std::net::SocketAddr;
use std::sync::Arc;

use simpledb_controller::{BoxFuture, ChangeCallback, Controller, RolloutSimulator};
use simpledb_reconciler::Reconciler;
use simpledb_state::StateStore;
use tokio::sync::watch;
use tracing::{error, info};

use crate::config::OperatorConfig;

pub async fn run(config: OperatorConfig) -> anyhow::Result<()> {
    info!("SimpleDB operator starting");

    let controller_config = config.controller_config()?;
    let rollout_interval = config.rollout_interval()?;

    // Ensure data directory exists.
    std::fs::create_dir_all(&config.store.data_dir)?;
    let db_path = config.store.data_dir.join("simpledb.redb");

    // ── Initialize subsystems ──────────────────────────────────

    let store = StateStore::open(&db_path)?;
    info!(path = ?db_path, "state store opened");

    let controller = Controller::new(Reconciler::new(store.clone()), controller_config);
    let handle = controller.handle();
    info!(workers = controller_config.workers, "controller initialized");

    // ── Shutdown signal ────────────────────────────────────────

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    // ── Start background tasks ─────────────────────────────────

    let controller_handle = tokio::spawn(controller.run(shutdown_rx.clone()));

    let rollout_handle = if config.rollout.enabled {
        let enqueue = handle.clone();
        let on_change: ChangeCallback = Arc::new(move |key| -> BoxFuture {
            let enqueue = enqueue.clone();
            Box::pin(async move { enqueue.enqueue(key).await })
        });
        let simulator = RolloutSimulator::new(store.clone(), config.rollout.step).with_callback(on_change);
        let rollout_shutdown = shutdown_rx.clone();
        Some(tokio::spawn(async move {
            simulator.run(rollout_interval, rollout_shutdown).await;
        }))
    } else {
        info!("rollout simulator disabled");
        None
    };

    // ── Start API server ───────────────────────────────────────

    let router = simpledb_api::build_router(store, Some(handle));
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));

    info!(%addr, "API server starting");

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Graceful shutdown on Ctrl-C.
    let server = axum::serve(listener, router).with_graceful_shutdown(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    server.await?;

    // Wait for background tasks.
    let _ = controller_handle.await;
    if let Some(handle) = rollout_handle {
        let _ = handle.await;
    }

    info!("SimpleDB operator stopped");
    Ok(())
}
