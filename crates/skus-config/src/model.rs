// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! Every struct uses `#[serde(deny_unknown_fields)]` so a misspelled key
//! fails at startup instead of silently falling back to a default.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Top-level service configuration. All sections are optional.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SkusConfig {
    #[serde(default)]
    pub service: ServiceConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    /// Background signing loop.
    #[serde(default)]
    pub dispatcher: DispatcherConfig,

    /// Per-product issuance limits.
    #[serde(default)]
    pub credentials: CredentialsConfig,

    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// External blind-signature service.
    #[serde(default)]
    pub signer: SignerConfig,

    #[serde(default)]
    pub prometheus: PrometheusConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
        }
    }
}

fn default_service_name() -> String {
    "skus".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// SQLite storage configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the database file. Defaults to the XDG data directory.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    #[serde(default = "default_true")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: true,
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("skus").join("skus.db"))
        .unwrap_or_else(|| std::path::PathBuf::from("skus.db"))
        .to_string_lossy()
        .into_owned()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct DispatcherConfig {
    /// Seconds between ticks.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Maximum entries claimed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Failed attempts after which an entry is marked errored.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Claims older than this are handed back to the pending pool.
    #[serde(default = "default_claim_lease_secs")]
    pub claim_lease_secs: u64,

    /// Upper bound on a single signer call.
    #[serde(default = "default_signer_timeout_secs")]
    pub signer_timeout_secs: u64,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            batch_size: default_batch_size(),
            max_attempts: default_max_attempts(),
            claim_lease_secs: default_claim_lease_secs(),
            signer_timeout_secs: default_signer_timeout_secs(),
        }
    }
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_batch_size() -> usize {
    10
}

fn default_max_attempts() -> u32 {
    5
}

fn default_claim_lease_secs() -> u64 {
    300
}

fn default_signer_timeout_secs() -> u64 {
    30
}

/// Issuance limits keyed by SKU.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct CredentialsConfig {
    /// Maximum concurrent active signing requests per item.
    #[serde(default = "default_active_limit")]
    pub default_active_limit: usize,

    /// Per-SKU overrides of `default_active_limit`.
    #[serde(default)]
    pub active_limits: BTreeMap<String, usize>,

    /// Per-SKU maximum number of intervals the signer will issue for.
    ///
    /// Time-limited-v2 submissions for these SKUs are truncated instead of rejected.
    #[serde(default)]
    pub interval_ceilings: BTreeMap<String, u64>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            default_active_limit: default_active_limit(),
            active_limits: BTreeMap::new(),
            interval_ceilings: BTreeMap::new(),
        }
    }
}

fn default_active_limit() -> usize {
    5
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RetrievalConfig {
    /// Retry-after reported before any batch has completed.
    #[serde(default = "default_retry_after_secs")]
    pub default_retry_after_secs: u64,

    /// Number of recent completions averaged for retry-after.
    #[serde(default = "default_avg_window")]
    pub avg_window: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_retry_after_secs: default_retry_after_secs(),
            avg_window: default_avg_window(),
        }
    }
}

fn default_retry_after_secs() -> u64 {
    5
}

fn default_avg_window() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SignerConfig {
    #[serde(default = "default_signer_url")]
    pub base_url: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for SignerConfig {
    fn default() -> Self {
        Self {
            base_url: default_signer_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_signer_url() -> String {
    "http://127.0.0.1:2416".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct PrometheusConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for PrometheusConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}
