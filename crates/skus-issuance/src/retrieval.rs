// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential retrieval: signed credentials, or how long to wait for them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::debug;

use skus_config::model::RetrievalConfig;
use skus_core::{
    IssuedCredentials, ItemId, OrderId, OrderStore, OutboxEntry, OutboxKey, OutboxState,
    OutboxStore, RequestId, SkusError,
};

/// Smallest retry-after ever reported for unfinished work.
const MIN_RETRY_AFTER: Duration = Duration::from_secs(1);

/// How the outbox request id is chosen for a retrieval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestIdResolution {
    /// Clients that predate per-batch request ids used the item id.
    DeriveFromItemId,
    UseSuppliedRequestId(RequestId),
}

impl RequestIdResolution {
    pub fn resolve(self, item_id: &ItemId) -> RequestId {
        match self {
            RequestIdResolution::DeriveFromItemId => RequestId::from(*item_id),
            RequestIdResolution::UseSuppliedRequestId(id) => id,
        }
    }
}

/// Result of a retrieval that did not fail.
#[derive(Debug, Clone, PartialEq)]
pub enum CredentialsOutcome {
    /// Signing finished. `signed_creds` is empty when the batch has expired.
    Ready(IssuedCredentials),
    /// Signing has not finished; ask again after `retry_after`.
    NotReady { retry_after: Duration },
}

/// Serves signed credentials from the outbox.
pub struct CredentialRetriever {
    orders: Arc<dyn OrderStore>,
    outbox: Arc<dyn OutboxStore>,
    config: RetrievalConfig,
}

impl CredentialRetriever {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        outbox: Arc<dyn OutboxStore>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            orders,
            outbox,
            config,
        }
    }

    /// Looks up the signing request for `item_id` and reports its state.
    ///
    /// Fails with [`SkusError::CredentialsNotFound`] when no request exists,
    /// [`SkusError::WrongOrderForRequest`] when it belongs to another order and
    /// [`SkusError::SigningFailed`] when signing gave up.
    pub async fn get_credentials(
        &self,
        order_id: &OrderId,
        item_id: &ItemId,
        resolution: RequestIdResolution,
    ) -> Result<CredentialsOutcome, SkusError> {
        let key = OutboxKey::new(*item_id, resolution.resolve(item_id));
        let entry = self
            .outbox
            .get_by_key(&key)
            .await?
            .ok_or(SkusError::CredentialsNotFound)?;

        if entry.order_id != *order_id {
            return Err(SkusError::WrongOrderForRequest);
        }

        match entry.state {
            OutboxState::Pending | OutboxState::Claimed => {
                let retry_after = self.retry_after().await?;
                debug!(key = %key, state = %entry.state, ?retry_after, "credentials not ready");
                Ok(CredentialsOutcome::NotReady { retry_after })
            }
            OutboxState::Errored => Err(SkusError::SigningFailed(
                entry
                    .last_error
                    .unwrap_or_else(|| "signing failed".to_string()),
            )),
            OutboxState::Completed => self.completed(entry).await,
        }
    }

    /// Order-level retrieval for orders with a single item.
    ///
    /// The request id is derived from the item id.
    pub async fn get_order_credentials(
        &self,
        order_id: &OrderId,
    ) -> Result<CredentialsOutcome, SkusError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| SkusError::OrderNotFound(order_id.to_string()))?;

        let [item] = order.items.as_slice() else {
            return Err(SkusError::Validation(format!(
                "order has {} items, expected exactly one",
                order.items.len()
            )));
        };

        self.get_credentials(order_id, &item.id, RequestIdResolution::DeriveFromItemId)
            .await
    }

    async fn completed(&self, entry: OutboxEntry) -> Result<CredentialsOutcome, SkusError> {
        let mut issued = IssuedCredentials {
            order_id: entry.order_id,
            item_id: entry.item_id,
            request_id: entry.request_id,
            issuer: entry.issuer.clone(),
            blinded_creds: Vec::new(),
            signed_creds: Vec::new(),
            batch_proof: None,
            public_key: None,
            valid_to: entry.expires_at,
        };

        if entry.is_expired(Utc::now()) {
            debug!(key = %entry.key(), "signed credentials expired");
            return Ok(CredentialsOutcome::Ready(issued));
        }

        let batch = self
            .outbox
            .signed_batch(&entry.key())
            .await?
            .ok_or_else(|| {
                SkusError::Internal(format!(
                    "completed outbox entry {} has no signed credentials",
                    entry.key()
                ))
            })?;

        issued.blinded_creds = entry.blinded_creds;
        issued.signed_creds = batch.signed_creds;
        issued.batch_proof = Some(batch.batch_proof);
        issued.public_key = Some(batch.public_key);
        Ok(CredentialsOutcome::Ready(issued))
    }

    /// Rolling mean of recent signing durations, or the configured default
    /// before anything has completed. Never below one second.
    async fn retry_after(&self) -> Result<Duration, SkusError> {
        let avg = self
            .outbox
            .rolling_avg_duration_seconds(self.config.avg_window)
            .await?;
        Ok(retry_after_from_avg(avg, self.config.default_retry_after_secs))
    }
}

fn retry_after_from_avg(avg_secs: i64, default_secs: u64) -> Duration {
    let secs = u64::try_from(avg_secs)
        .ok()
        .filter(|s| *s > 0)
        .unwrap_or(default_secs);
    Duration::from_secs(secs).max(MIN_RETRY_AFTER)
}
