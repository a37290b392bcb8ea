// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test harness for end-to-end issuance tests.
//!
//! `TestHarness` assembles storage, policy, issuer, retriever and dispatcher
//! over a temp SQLite database with a [`MockSigner`] in place of the signing
//! service.

use std::sync::Arc;
use std::time::Duration;

use skus_config::model::{
    CredentialsConfig, DispatcherConfig, RetrievalConfig, StorageConfig,
};
use skus_core::{
    Order, OrderStore, OutboxKey, RequestId, SignedBatch, SignerError, SkusError, StorageAdapter,
};
use skus_dispatcher::{DispatchReport, SigningDispatcher};
use skus_issuance::{CredentialIssuer, CredentialRetriever};
use skus_policy::CredentialPolicy;
use skus_storage::SqliteStorage;

use crate::fixtures::OrderFixture;
use crate::mock_signer::MockSigner;

/// Builder for [`TestHarness`].
pub struct TestHarnessBuilder {
    credentials: CredentialsConfig,
    dispatcher: DispatcherConfig,
    retrieval: RetrievalConfig,
    script: Vec<Result<SignedBatch, SignerError>>,
    signer_delay: Option<Duration>,
}

impl TestHarnessBuilder {
    fn new() -> Self {
        Self {
            credentials: CredentialsConfig::default(),
            dispatcher: DispatcherConfig {
                signer_timeout_secs: 2,
                ..DispatcherConfig::default()
            },
            retrieval: RetrievalConfig::default(),
            script: Vec::new(),
            signer_delay: None,
        }
    }

    /// Override the active-request limit for `sku`.
    pub fn with_active_limit(mut self, sku: &str, limit: usize) -> Self {
        self.credentials.active_limits.insert(sku.into(), limit);
        self
    }

    /// Cap `sku` at `intervals` signable intervals.
    pub fn with_interval_ceiling(mut self, sku: &str, intervals: u64) -> Self {
        self.credentials.interval_ceilings.insert(sku.into(), intervals);
        self
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.dispatcher.max_attempts = max_attempts;
        self
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.dispatcher.batch_size = batch_size;
        self
    }

    pub fn with_claim_lease_secs(mut self, secs: u64) -> Self {
        self.dispatcher.claim_lease_secs = secs;
        self
    }

    pub fn with_signer_timeout_secs(mut self, secs: u64) -> Self {
        self.dispatcher.signer_timeout_secs = secs;
        self
    }

    /// The mock signer sleeps this long on every call.
    pub fn with_signer_delay(mut self, delay: Duration) -> Self {
        self.signer_delay = Some(delay);
        self
    }

    pub fn with_default_retry_after(mut self, secs: u64) -> Self {
        self.retrieval.default_retry_after_secs = secs;
        self
    }

    /// Scripted signer answers, consumed before the default echo.
    pub fn with_signer_script(mut self, script: Vec<Result<SignedBatch, SignerError>>) -> Self {
        self.script = script;
        self
    }

    pub async fn build(self) -> Result<TestHarness, SkusError> {
        let temp_dir = tempfile::TempDir::new().map_err(SkusError::storage)?;
        let db_path = temp_dir.path().join("test.db");

        let storage = SqliteStorage::new(StorageConfig {
            database_path: db_path.to_string_lossy().to_string(),
            wal_mode: true,
        });
        storage.initialize().await?;
        let storage = Arc::new(storage);

        let mut signer = MockSigner::with_script(self.script);
        if let Some(delay) = self.signer_delay {
            signer = signer.with_delay(delay);
        }
        let issuer = CredentialIssuer::new(
            storage.clone(),
            storage.clone(),
            CredentialPolicy::new(&self.credentials),
        );
        let retriever = CredentialRetriever::new(storage.clone(), storage.clone(), self.retrieval);
        let dispatcher = SigningDispatcher::new(
            storage.clone(),
            Arc::new(signer.clone()),
            self.dispatcher.clone(),
        );

        Ok(TestHarness {
            storage,
            signer,
            issuer,
            retriever,
            dispatcher,
            dispatcher_config: self.dispatcher,
            _temp_dir: temp_dir,
        })
    }
}

/// A wired issuance stack over a throwaway database.
pub struct TestHarness {
    pub storage: Arc<SqliteStorage>,
    pub signer: MockSigner,
    pub issuer: CredentialIssuer,
    pub retriever: CredentialRetriever,
    pub dispatcher: SigningDispatcher,
    pub dispatcher_config: DispatcherConfig,
    _temp_dir: tempfile::TempDir,
}

impl TestHarness {
    pub fn builder() -> TestHarnessBuilder {
        TestHarnessBuilder::new()
    }

    /// Persists the fixture's order and returns it.
    pub async fn create_order(&self, fixture: OrderFixture) -> Result<Order, SkusError> {
        let order = fixture.build();
        self.storage.create_order(&order).await?;
        Ok(order)
    }

    /// Requests signing of `creds` for the order's first item under a fresh request id.
    pub async fn enqueue(&self, order: &Order, creds: Vec<String>) -> Result<OutboxKey, SkusError> {
        let item_id = order
            .items
            .first()
            .map(|item| item.id)
            .ok_or_else(|| SkusError::Validation("order has no items".into()))?;
        let request_id = RequestId::new();
        self.issuer
            .request_credentials(&order.id, &item_id, &request_id, creds)
            .await?;
        Ok(OutboxKey::new(item_id, request_id))
    }

    /// One dispatcher tick.
    pub async fn dispatch(&self) -> Result<DispatchReport, SkusError> {
        self.dispatcher.tick().await
    }

    /// Another dispatcher over the same outbox and signer, as a second
    /// replica would run.
    pub fn replica(&self) -> SigningDispatcher {
        SigningDispatcher::new(
            self.storage.clone(),
            Arc::new(self.signer.clone()),
            self.dispatcher_config.clone(),
        )
    }
}
