// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::SkusError;
use crate::types::{
    Claim, InsertOutcome, ItemId, NewOutboxEntry, OrderId, OutboxEntry, OutboxKey, RequestId,
    SignedBatch,
};

/// Durable signing-request outbox.
///
/// Every state change is a conditional update keyed on the current state, and
/// write-backs on claimed entries also on the claim token. Methods that
/// return `bool` report whether the condition held.
#[async_trait]
pub trait OutboxStore: Send + Sync {
    /// Inserts a pending entry unless one already exists for the key.
    ///
    /// The existing-key lookup, the active count at `now` and the insert are
    /// one atomic step: a new key is refused with
    /// [`InsertOutcome::LimitReached`] once the item has `limit` active entries.
    async fn insert(
        &self,
        entry: NewOutboxEntry,
        limit: usize,
        now: DateTime<Utc>,
    ) -> Result<InsertOutcome, SkusError>;

    /// Atomically moves up to `limit` of the oldest pending entries to `claimed`.
    ///
    /// Concurrent callers never receive the same entry. Each returned entry
    /// carries a fresh claim token.
    async fn claim_pending(&self, limit: usize) -> Result<Vec<OutboxEntry>, SkusError>;

    /// Restarts the lease on a claim still held.
    async fn renew_claim(&self, claim: &Claim) -> Result<bool, SkusError>;

    /// Stores the signed batch and moves a claimed entry to `completed`.
    async fn complete_entry(&self, claim: &Claim, batch: &SignedBatch)
    -> Result<bool, SkusError>;

    /// Returns a claimed entry to `pending`, counting one failed attempt.
    async fn release_entry(&self, claim: &Claim, error: &str) -> Result<bool, SkusError>;

    /// Moves a claimed entry to `errored`.
    async fn mark_errored(&self, claim: &Claim, error: &str) -> Result<bool, SkusError>;

    /// Returns entries claimed longer than `lease` ago to `pending`.
    async fn release_stale_claims(&self, lease: Duration) -> Result<usize, SkusError>;

    async fn get_by_key(&self, key: &OutboxKey) -> Result<Option<OutboxEntry>, SkusError>;

    /// Signed output for a completed entry.
    async fn signed_batch(&self, key: &OutboxKey) -> Result<Option<SignedBatch>, SkusError>;

    /// A completed entry for the item whose blinded credentials hash to `creds_hash`.
    async fn find_completed_by_creds(
        &self,
        item_id: &ItemId,
        creds_hash: &str,
    ) -> Result<Option<OutboxEntry>, SkusError>;

    /// Entries counting toward the item's concurrency limit at `now`.
    async fn count_active(&self, item_id: &ItemId, now: DateTime<Utc>)
    -> Result<usize, SkusError>;

    async fn delete_entry(&self, key: &OutboxKey) -> Result<bool, SkusError>;

    /// Deletes every entry of the order, or only those with `request_id`.
    async fn delete_entries(
        &self,
        order_id: &OrderId,
        request_id: Option<&RequestId>,
    ) -> Result<usize, SkusError>;

    /// Mean creation-to-completion time of the last `window` completed entries, rounded up.
    ///
    /// Returns 0 when nothing has completed yet.
    async fn rolling_avg_duration_seconds(&self, window: usize) -> Result<i64, SkusError>;
}
