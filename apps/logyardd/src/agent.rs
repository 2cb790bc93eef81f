// SPDX-FileCopyrightText: © 2025 Logyard Contributors
//
// SPDX-License-Identifier: MPL-2.0

//! Wires the daemon's pieces together: resolve this node's identity, load
//! the config store's current snapshot, start the drains it already
//! describes, then hand the live change stream to the manager while the
//! control API serves the CLI.

use std::sync::Arc;

use logyard_core::registry::DrainRegistry;
use logyard_engine::{Broker, DrainManager};
use logyard_store::FileConfigStore;

use crate::config::Config;
use crate::{identity, server, telemetry};

/// # Errors
///
/// Returns an error if node identity can't be resolved, the config store
/// can't be opened, or the control API fails to bind its listening address.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let node_identity = identity::resolve(&config.node)?;
    tracing::info!(node_id = %node_identity.node_id, aggregator_id = %node_identity.aggregator_id, "resolved node identity");

    let store = Arc::new(FileConfigStore::new(&config.node.config_store_path));
    let snapshot = store.load().await?;
    let cluster_endpoint = config.node.cluster_endpoint.clone().or_else(|| snapshot.cluster_endpoint.clone());

    let mut registry = DrainRegistry::new();
    logyard_drains::register_builtin_drains(&mut registry, &node_identity.node_id, cluster_endpoint);

    let broker = Broker::new();
    let mut manager = DrainManager::new(broker, Arc::new(registry), config.retry.to_policy(), snapshot.retry_limits);

    for drain_config in snapshot.drains.into_values() {
        let name = drain_config.name.clone();
        if let Err(err) = manager.start_drain(drain_config).await {
            tracing::error!(drain = %name, error = %err, "failed to start drain from initial config snapshot");
        }
    }

    let states = manager.states_handle();
    let (changes, _watch_guard) = store.watch()?;

    tokio::spawn(async move {
        manager.run(changes).await;
    });

    if config.telemetry.enable {
        let gauges = telemetry::init_metrics(&config.telemetry).map(|_| telemetry::DrainGauges::new());
        match gauges {
            Ok(gauges) => {
                let states = states.clone();
                tokio::spawn(async move {
                    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(10));
                    loop {
                        ticker.tick().await;
                        let snapshot = states.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clone();
                        gauges.record(&snapshot);
                    }
                });
            },
            Err(err) => tracing::warn!(error = %err, "failed to initialize telemetry, continuing without it"),
        }
    }

    let app_state = server::AppState { store, states };
    let listener = tokio::net::TcpListener::bind(&config.server.address).await?;
    tracing::info!(address = %config.server.address, "control API listening");
    axum::serve(listener, server::router(app_state)).await?;

    Ok(())
}
