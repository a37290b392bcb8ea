// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `skus serve` and `skus dispatch-once`.
//!
//! Both open the SQLite outbox and drive the signing dispatcher against the
//! configured signing service. `serve` keeps ticking until SIGINT/SIGTERM.

use std::sync::Arc;

use tracing::info;

use skus_config::SkusConfig;
use skus_core::{PluginAdapter, SkusError, StorageAdapter};
use skus_dispatcher::{DispatchReport, SigningDispatcher};
use skus_signer::HttpSigner;
use skus_storage::SqliteStorage;

use crate::shutdown;

/// Runs the signing dispatcher until a shutdown signal arrives.
pub async fn run_serve(config: SkusConfig) -> Result<(), SkusError> {
    init_tracing(&config.service.log_level);
    info!(
        name = %config.service.name,
        database = %config.storage.database_path,
        signer = %config.signer.base_url,
        "starting skus"
    );

    #[cfg(feature = "prometheus")]
    let prometheus = if config.prometheus.enabled {
        Some(skus_prometheus::PrometheusAdapter::new()?)
    } else {
        None
    };

    let storage = Arc::new(SqliteStorage::open(config.storage.clone()).await?);
    let signer = Arc::new(HttpSigner::new(&config.signer)?);
    let dispatcher = Arc::new(SigningDispatcher::new(
        storage.clone(),
        signer.clone(),
        config.dispatcher.clone(),
    ));

    let cancel = shutdown::install_signal_handler();
    let worker = {
        let dispatcher = dispatcher.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move { dispatcher.run(cancel).await })
    };

    cancel.cancelled().await;
    worker
        .await
        .map_err(|e| SkusError::Internal(format!("dispatcher task failed: {e}")))?;

    signer.shutdown().await?;
    storage.close().await?;

    #[cfg(feature = "prometheus")]
    if let Some(prometheus) = prometheus {
        tracing::debug!(metrics = %prometheus.render(), "final metrics snapshot");
    }

    info!("skus stopped");
    Ok(())
}

/// Runs a single dispatcher tick.
pub async fn run_dispatch_once(config: SkusConfig) -> Result<DispatchReport, SkusError> {
    init_tracing(&config.service.log_level);

    let storage = Arc::new(SqliteStorage::open(config.storage.clone()).await?);
    let signer = Arc::new(HttpSigner::new(&config.signer)?);
    let dispatcher = SigningDispatcher::new(storage.clone(), signer, config.dispatcher.clone());

    let report = dispatcher.tick().await;
    storage.close().await?;
    report
}

/// `RUST_LOG` wins; otherwise targets starting with `skus` log at `log_level`
/// and everything else at warn.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("skus={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
