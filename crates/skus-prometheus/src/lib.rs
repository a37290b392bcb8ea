// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Prometheus metrics for the SKUs credential service.
//!
//! Uses the metrics-rs facade with the Prometheus exporter. Issuance and
//! dispatch code call the helpers in [`recording`]; the binary installs
//! the recorder once at startup and renders the text format on demand.

pub mod recording;

use async_trait::async_trait;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use skus_core::{AdapterType, HealthStatus, PluginAdapter, SkusError};

pub use recording::{
    record_claimed, record_completed, record_errored, record_idempotent, record_rejected,
    record_requested, record_retried, record_signing_latency,
};

/// Installed Prometheus recorder.
pub struct PrometheusAdapter {
    handle: PrometheusHandle,
}

impl PrometheusAdapter {
    /// Installs the Prometheus recorder globally.
    ///
    /// Only one recorder can be installed per process; a second call fails.
    pub fn new() -> Result<Self, SkusError> {
        let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
            SkusError::Internal(format!("failed to install Prometheus recorder: {e}"))
        })?;

        recording::register_metrics();
        tracing::info!("prometheus metrics recorder installed");

        Ok(Self { handle })
    }

    pub fn handle(&self) -> &PrometheusHandle {
        &self.handle
    }

    /// All collected metrics in Prometheus text format.
    pub fn render(&self) -> String {
        self.handle.render()
    }
}

#[async_trait]
impl PluginAdapter for PrometheusAdapter {
    fn name(&self) -> &str {
        "prometheus"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Observability
    }

    async fn health_check(&self) -> Result<HealthStatus, SkusError> {
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkusError> {
        Ok(())
    }
}
