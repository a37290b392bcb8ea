// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Base adapter traits for lifecycle and health reporting.

use async_trait::async_trait;

use crate::error::SkusError;
use crate::types::{AdapterType, HealthStatus};

/// Identity, lifecycle, and health check shared by every adapter.
#[async_trait]
pub trait PluginAdapter: Send + Sync + 'static {
    /// Returns the human-readable name of this adapter instance.
    fn name(&self) -> &str;

    /// Returns the semantic version of this adapter.
    fn version(&self) -> semver::Version;

    fn adapter_type(&self) -> AdapterType;

    /// Performs a health check and returns the adapter's current status.
    async fn health_check(&self) -> Result<HealthStatus, SkusError>;

    /// Gracefully shuts down the adapter, releasing any held resources.
    async fn shutdown(&self) -> Result<(), SkusError>;
}

/// A persistence backend with an explicit open/close lifecycle.
#[async_trait]
pub trait StorageAdapter: PluginAdapter {
    /// Opens the database and applies pending migrations.
    async fn initialize(&self) -> Result<(), SkusError>;

    /// Flushes pending writes and releases the connection.
    async fn close(&self) -> Result<(), SkusError>;
}
