// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the order store and signing outbox.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::OnceCell;
use tracing::debug;

use skus_config::model::StorageConfig;
use skus_core::{
    AdapterType, Claim, HealthStatus, InsertOutcome, ItemId, NewOutboxEntry, Order, OrderId, OrderItem,
    OrderStatus, OrderStore, OutboxEntry, OutboxKey, OutboxStore, PluginAdapter, RequestId,
    SignedBatch, SkusError, StorageAdapter,
};

use crate::database::Database;
use crate::queries;

/// SQLite-backed storage adapter.
///
/// The database is opened on [`StorageAdapter::initialize`]; every other
/// call fails until then.
pub struct SqliteStorage {
    config: StorageConfig,
    db: OnceCell<Database>,
}

impl SqliteStorage {
    /// The connection is not opened until [`StorageAdapter::initialize`] is called.
    pub fn new(config: StorageConfig) -> Self {
        Self {
            config,
            db: OnceCell::new(),
        }
    }

    /// Creates and initializes storage in one step.
    pub async fn open(config: StorageConfig) -> Result<Self, SkusError> {
        let storage = Self::new(config);
        storage.initialize().await?;
        Ok(storage)
    }

    /// The underlying database, or an error if not initialized.
    pub fn database(&self) -> Result<&Database, SkusError> {
        self.db.get().ok_or_else(|| SkusError::Storage {
            source: "storage not initialized -- call initialize() first".into(),
        })
    }

    fn now() -> DateTime<Utc> {
        Utc::now()
    }
}

#[async_trait]
impl PluginAdapter for SqliteStorage {
    fn name(&self) -> &str {
        "sqlite"
    }

    fn version(&self) -> semver::Version {
        semver::Version::new(0, 1, 0)
    }

    fn adapter_type(&self) -> AdapterType {
        AdapterType::Storage
    }

    async fn health_check(&self) -> Result<HealthStatus, SkusError> {
        let db = self.database()?;
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch("SELECT 1;")?;
                Ok(())
            })
            .await
            .map_err(crate::database::map_tr_err)?;
        Ok(HealthStatus::Healthy)
    }

    async fn shutdown(&self) -> Result<(), SkusError> {
        if let Some(db) = self.db.get() {
            db.checkpoint().await?;
            debug!("shutdown: WAL checkpoint complete");
        }
        Ok(())
    }
}

#[async_trait]
impl StorageAdapter for SqliteStorage {
    async fn initialize(&self) -> Result<(), SkusError> {
        let db = Database::open_with(&self.config.database_path, self.config.wal_mode).await?;
        self.db.set(db).map_err(|_| SkusError::Storage {
            source: "storage already initialized".into(),
        })?;
        debug!(path = %self.config.database_path, "SQLite storage initialized");
        Ok(())
    }

    async fn close(&self) -> Result<(), SkusError> {
        self.database()?.checkpoint().await?;
        debug!("WAL checkpoint complete");
        Ok(())
    }
}

#[async_trait]
impl OrderStore for SqliteStorage {
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, SkusError> {
        queries::orders::get_order(self.database()?, id).await
    }

    async fn get_order_item(&self, id: &ItemId) -> Result<Option<OrderItem>, SkusError> {
        queries::orders::get_order_item(self.database()?, id).await
    }

    async fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<bool, SkusError> {
        queries::orders::update_order_status(self.database()?, id, status).await
    }

    async fn create_order(&self, order: &Order) -> Result<(), SkusError> {
        queries::orders::create_order(self.database()?, order).await
    }
}

#[async_trait]
impl OutboxStore for SqliteStorage {
    async fn insert(
        &self,
        entry: NewOutboxEntry,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, SkusError> {
        queries::outbox::insert(self.database()?, entry, limit, now).await
    }

    async fn claim_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, SkusError> {
        queries::outbox::claim_pending(self.database()?, limit, Self::now()).await
    }

    async fn renew_claim(&self, claim: &Claim) -> Result<bool, SkusError> {
        queries::outbox::renew_claim(self.database()?, claim, Self::now()).await
    }

    async fn complete_entry(&self, claim: &Claim, batch: &SignedBatch) -> Result<bool, SkusError> {
        queries::outbox::complete_entry(self.database()?, claim, batch, Self::now()).await
    }

    async fn release_entry(&self, claim: &Claim, error: &str) -> Result<bool, SkusError> {
        queries::outbox::release_entry(self.database()?, claim, error).await
    }

    async fn mark_errored(&self, claim: &Claim, error: &str) -> Result<bool, SkusError> {
        queries::outbox::mark_errored(self.database()?, claim, error).await
    }

    async fn release_stale_claims(&self, lease: Duration) -> Result<usize, SkusError> {
        queries::outbox::release_stale_claims(self.database()?, lease, Self::now()).await
    }

    async fn get_by_key(&self, key: &OutboxKey) -> Result<Option<OutboxEntry>, SkusError> {
        queries::outbox::get_by_key(self.database()?, key).await
    }

    async fn signed_batch(&self, key: &OutboxKey) -> Result<Option<SignedBatch>, SkusError> {
        queries::outbox::signed_batch(self.database()?, key).await
    }

    async fn find_completed_by_creds(
        &self,
        item_id: &ItemId,
        creds_hash: &str,
    ) -> Result<Option<OutboxEntry>, SkusError> {
        queries::outbox::find_completed_by_creds(self.database()?, item_id, creds_hash).await
    }

    async fn count_active(
        &self,
        item_id: &ItemId,
        now: DateTime<Utc>,
    ) -> Result<usize, SkusError> {
        queries::outbox::count_active(self.database()?, item_id, now).await
    }

    async fn delete_entry(&self, key: &OutboxKey) -> Result<bool, SkusError> {
        queries::outbox::delete_entry(self.database()?, key).await
    }

    async fn delete_entries(
        &self,
        order_id: &OrderId,
        request_id: Option<&RequestId>,
    ) -> Result<usize, SkusError> {
        queries::outbox::delete_entries(self.database()?, order_id, request_id).await
    }

    async fn rolling_avg_duration_seconds(&self, window: usize) -> Result<i64, SkusError> {
        queries::outbox::rolling_avg_duration_seconds(self.database()?, window).await
    }
}
