// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Issuance orchestrator: the entry point for blinded credential signing requests.
//!
//! A request is checked against the order, the item's credential policy and
//! the outbox, and ends in exactly one of: a new pending outbox entry, an
//! idempotent success, or a typed error. No network calls happen here; the
//! dispatcher picks the entry up later.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info};

use skus_core::{
    CredentialType, ErrorKind, InsertOutcome, ItemId, NewOutboxEntry, Order, OrderId, OrderItem,
    OrderStore, OutboxStore, RequestId, SkusError, creds_hash, issuer_id,
};
use skus_policy::CredentialPolicy;

use crate::validation::validate_blinded_creds;

/// What a successful [`CredentialIssuer::request_credentials`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOutcome {
    /// A new pending outbox entry was written.
    Enqueued,
    /// The submission matched existing work; nothing was written.
    AlreadyRequested,
}

/// Accepts signing requests and deletes issued credentials.
pub struct CredentialIssuer {
    orders: Arc<dyn OrderStore>,
    outbox: Arc<dyn OutboxStore>,
    policy: CredentialPolicy,
}

impl CredentialIssuer {
    pub fn new(
        orders: Arc<dyn OrderStore>,
        outbox: Arc<dyn OutboxStore>,
        policy: CredentialPolicy,
    ) -> Self {
        Self {
            orders,
            outbox,
            policy,
        }
    }

    pub fn policy(&self) -> &CredentialPolicy {
        &self.policy
    }

    /// Records a signing request for `blinded_creds` under `(item_id, request_id)`.
    ///
    /// Resubmitting identical credentials for the same key succeeds without new
    /// work. Different credentials for an existing key fail with
    /// [`SkusError::CredentialsMismatch`]. Store failures are returned as-is.
    pub async fn request_credentials(
        &self,
        order_id: &OrderId,
        item_id: &ItemId,
        request_id: &RequestId,
        blinded_creds: Vec<String>,
    ) -> Result<RequestOutcome, SkusError> {
        let result = self
            .try_request(order_id, item_id, request_id, blinded_creds)
            .await;

        match &result {
            Ok(RequestOutcome::Enqueued) => {}
            Ok(RequestOutcome::AlreadyRequested) => skus_prometheus::record_idempotent(),
            Err(e) if e.kind() != ErrorKind::TransientStore => {
                skus_prometheus::record_rejected(e.reason());
            }
            Err(_) => {}
        }

        result
    }

    async fn try_request(
        &self,
        order_id: &OrderId,
        item_id: &ItemId,
        request_id: &RequestId,
        blinded_creds: Vec<String>,
    ) -> Result<RequestOutcome, SkusError> {
        validate_blinded_creds(&blinded_creds)?;

        let order = self.paid_order(order_id).await?;
        let item = order
            .item(item_id)
            .ok_or_else(|| SkusError::ItemNotFound(item_id.to_string()))?;

        self.policy
            .check_blinded_count(&order, item, blinded_creds.len())?;
        let creds = self.policy.truncate(&order, item, blinded_creds);

        if item.credential_type == CredentialType::TimeLimitedV2 {
            let hash = creds_hash(&creds);
            let signed = self.outbox.find_completed_by_creds(item_id, &hash).await?;
            if let Some(signed) = signed.filter(|e| e.matches_creds(&creds)) {
                debug!(
                    order_id = %order_id,
                    item_id = %item_id,
                    request_id = %signed.request_id,
                    "blinded credentials already signed"
                );
                return Ok(RequestOutcome::AlreadyRequested);
            }
        }

        // The store checks the key, then the active limit, then inserts, all
        // in one step; an existing key is compared even when the item is full.
        let limit = self.policy.limit_for_item(item);
        let entry = new_entry(&order, item, *request_id, creds.clone());
        match self.outbox.insert(entry, limit, Utc::now()).await? {
            InsertOutcome::Inserted(inserted) => {
                info!(
                    order_id = %order_id,
                    item_id = %item_id,
                    request_id = %request_id,
                    count = inserted.blinded_creds.len(),
                    "signing request enqueued"
                );
                skus_prometheus::record_requested(&item.credential_type.to_string());
                Ok(RequestOutcome::Enqueued)
            }
            InsertOutcome::Existing(existing) => {
                debug!(key = %existing.key(), "outbox entry exists for request");
                compare_existing(&existing.blinded_creds, &creds)
            }
            InsertOutcome::LimitReached { active } => {
                debug!(item_id = %item_id, active, limit, "active request limit reached");
                Err(SkusError::TooManyActive { active, limit })
            }
        }
    }

    /// Deletes the order's signing requests and their signed credentials.
    ///
    /// With `request_id` only that request's entries go. Returns how many
    /// entries were deleted.
    pub async fn delete_credentials(
        &self,
        order_id: &OrderId,
        merchant_id: &str,
        request_id: Option<&RequestId>,
    ) -> Result<usize, SkusError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| SkusError::OrderNotFound(order_id.to_string()))?;

        if order.merchant_id != merchant_id {
            return Err(SkusError::MerchantMismatch);
        }

        let deleted = self.outbox.delete_entries(order_id, request_id).await?;
        info!(order_id = %order_id, deleted, "deleted order credentials");
        Ok(deleted)
    }

    async fn paid_order(&self, order_id: &OrderId) -> Result<Order, SkusError> {
        let order = self
            .orders
            .get_order(order_id)
            .await?
            .ok_or_else(|| SkusError::OrderNotFound(order_id.to_string()))?;

        if !order.is_paid() {
            return Err(SkusError::OrderNotPaid {
                status: order.status,
            });
        }
        Ok(order)
    }
}

fn compare_existing(stored: &[String], submitted: &[String]) -> Result<RequestOutcome, SkusError> {
    if stored == submitted {
        Ok(RequestOutcome::AlreadyRequested)
    } else {
        Err(SkusError::CredentialsMismatch)
    }
}

fn new_entry(
    order: &Order,
    item: &OrderItem,
    request_id: RequestId,
    blinded_creds: Vec<String>,
) -> NewOutboxEntry {
    NewOutboxEntry {
        order_id: order.id,
        item_id: item.id,
        request_id,
        issuer: issuer_id(&order.merchant_id, &item.sku),
        blinded_creds,
        valid_for_secs: item.valid_for_secs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_resubmission_is_idempotent() {
        assert_eq!(
            compare_existing(&v(&["YQ==", "Yg=="]), &v(&["YQ==", "Yg=="])).unwrap(),
            RequestOutcome::AlreadyRequested
        );
    }

    #[test]
    fn reordered_resubmission_is_a_mismatch() {
        let err = compare_existing(&v(&["YQ==", "Yg=="]), &v(&["Yg==", "YQ=="])).unwrap_err();
        assert!(matches!(err, SkusError::CredentialsMismatch));
    }
}
