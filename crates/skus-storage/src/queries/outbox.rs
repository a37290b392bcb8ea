// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing outbox queries.
//!
//! State changes are conditional updates on the current state
//! (`... WHERE id = ? AND state = 'claimed'`), so a writer that lost a race
//! sees zero changed rows instead of overwriting someone else's transition.
//! Write-backs on a claim also match its `claim_token`: once a stale claim
//! is released and taken by another worker, the first worker's token no
//! longer matches.

use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, TransactionBehavior, params};
use skus_core::{
    Claim, InsertOutcome, ItemId, NewOutboxEntry, OrderId, OutboxEntry, OutboxKey, OutboxState,
    RequestId, SignedBatch, SkusError,
};
use uuid::Uuid;

use super::{get_json, get_opt_ts, get_parsed, get_ts, ts};
use crate::database::{Database, map_tr_err};

const ENTRY_COLUMNS: &str = "id, order_id, item_id, request_id, issuer, blinded_creds,
     creds_hash, state, attempts, valid_for_secs, last_error, created_at, claimed_at,
     completed_at, expires_at, claim_token";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OutboxEntry> {
    Ok(OutboxEntry {
        id: row.get(0)?,
        order_id: get_parsed(row, 1)?,
        item_id: get_parsed(row, 2)?,
        request_id: get_parsed(row, 3)?,
        issuer: row.get(4)?,
        blinded_creds: get_json(row, 5)?,
        creds_hash: row.get(6)?,
        state: get_parsed(row, 7)?,
        attempts: row.get(8)?,
        valid_for_secs: row.get(9)?,
        last_error: row.get(10)?,
        created_at: get_ts(row, 11)?,
        claimed_at: get_opt_ts(row, 12)?,
        completed_at: get_opt_ts(row, 13)?,
        expires_at: get_opt_ts(row, 14)?,
        claim_token: row.get(15)?,
    })
}

fn select_by_key(
    conn: &rusqlite::Connection,
    item_id: &str,
    request_id: &str,
) -> rusqlite::Result<Option<OutboxEntry>> {
    conn.query_row(
        &format!(
            "SELECT {ENTRY_COLUMNS} FROM signing_outbox WHERE item_id = ?1 AND request_id = ?2"
        ),
        params![item_id, request_id],
        entry_from_row,
    )
    .optional()
}

fn key_params(key: &OutboxKey) -> (String, String) {
    (key.item_id.to_string(), key.request_id.to_string())
}

fn claim_params(claim: &Claim) -> (String, String, String) {
    let (item_id, request_id) = key_params(&claim.key);
    (item_id, request_id, claim.token.clone())
}

fn active_count(conn: &rusqlite::Connection, item_id: &str, now: &str) -> rusqlite::Result<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM signing_outbox
         WHERE item_id = ?1
           AND (state IN ('pending', 'claimed')
                OR (state = 'completed' AND (expires_at IS NULL OR expires_at > ?2)))",
        params![item_id, now],
        |row| row.get(0),
    )?;
    Ok(usize::try_from(count).unwrap_or(0))
}

/// Inserts a pending entry; an existing entry for the key is returned untouched.
///
/// The key lookup, the active count and the insert share one IMMEDIATE
/// transaction, so concurrent inserts for the same item serialize on the
/// write lock and each sees the others' rows when counting.
pub async fn insert(
    db: &Database,
    entry: NewOutboxEntry,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<InsertOutcome, SkusError> {
    let creds_json = serde_json::to_string(&entry.blinded_creds).map_err(SkusError::storage)?;
    let creds_hash = entry.creds_hash();
    let id = Uuid::new_v4().to_string();
    let (item_id, request_id) = key_params(&entry.key());
    let order_id = entry.order_id.to_string();
    let now = ts(now);

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            if let Some(existing) = select_by_key(&tx, &item_id, &request_id)? {
                return Ok(InsertOutcome::Existing(existing));
            }

            let active = active_count(&tx, &item_id, &now)?;
            if active >= limit {
                return Ok(InsertOutcome::LimitReached { active });
            }

            tx.execute(
                "INSERT INTO signing_outbox (id, order_id, item_id, request_id, issuer,
                     blinded_creds, creds_hash, state, valid_for_secs, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, 'pending', ?8, ?9)",
                params![
                    id,
                    order_id,
                    item_id,
                    request_id,
                    entry.issuer,
                    creds_json,
                    creds_hash,
                    entry.valid_for_secs,
                    now,
                ],
            )?;
            let stored = select_by_key(&tx, &item_id, &request_id)?
                .ok_or(rusqlite::Error::QueryReturnedNoRows)?;
            tx.commit()?;
            Ok(InsertOutcome::Inserted(stored))
        })
        .await
        .map_err(map_tr_err)
}

/// Claims up to `limit` pending entries, oldest first.
///
/// Runs in an IMMEDIATE transaction so competing connections serialize on
/// the write lock, and each row flips only if it is still pending.
pub async fn claim_pending(
    db: &Database,
    limit: usize,
    now: DateTime<Utc>,
) -> Result<Vec<OutboxEntry>, SkusError> {
    let now = ts(now);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let candidates: Vec<String> = {
                let mut stmt = tx.prepare(
                    "SELECT id FROM signing_outbox
                     WHERE state = 'pending'
                     ORDER BY created_at ASC, rowid ASC
                     LIMIT ?1",
                )?;
                stmt.query_map(params![limit], |row| row.get(0))?
                    .collect::<Result<_, _>>()?
            };

            let mut claimed = Vec::with_capacity(candidates.len());
            for id in candidates {
                let token = Uuid::new_v4().to_string();
                let changed = tx.execute(
                    "UPDATE signing_outbox
                     SET state = 'claimed', claimed_at = ?2, claim_token = ?3
                     WHERE id = ?1 AND state = 'pending'",
                    params![id, now, token],
                )?;
                if changed == 1 {
                    claimed.push(tx.query_row(
                        &format!("SELECT {ENTRY_COLUMNS} FROM signing_outbox WHERE id = ?1"),
                        params![id],
                        entry_from_row,
                    )?);
                }
            }
            tx.commit()?;
            Ok(claimed)
        })
        .await
        .map_err(map_tr_err)
}

/// Moves the claim's lease start to `now` if the claim is still held.
pub async fn renew_claim(
    db: &Database,
    claim: &Claim,
    now: DateTime<Utc>,
) -> Result<bool, SkusError> {
    let (item_id, request_id, token) = claim_params(claim);
    let now = ts(now);
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE signing_outbox SET claimed_at = ?4
                 WHERE item_id = ?1 AND request_id = ?2
                   AND state = 'claimed' AND claim_token = ?3",
                params![item_id, request_id, token, now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Stores the signed batch and completes a claimed entry in one transaction.
///
/// `expires_at` is `completed_at + valid_for_secs` when the entry has a lifetime.
pub async fn complete_entry(
    db: &Database,
    claim: &Claim,
    batch: &SignedBatch,
    now: DateTime<Utc>,
) -> Result<bool, SkusError> {
    let signed_json = serde_json::to_string(&batch.signed_creds).map_err(SkusError::storage)?;
    let batch_proof = batch.batch_proof.clone();
    let public_key = batch.public_key.clone();
    let (item_id, request_id, token) = claim_params(claim);

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let row: Option<(String, Option<i64>)> = tx
                .query_row(
                    "SELECT id, valid_for_secs FROM signing_outbox
                     WHERE item_id = ?1 AND request_id = ?2
                       AND state = 'claimed' AND claim_token = ?3",
                    params![item_id, request_id, token],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;

            let Some((id, valid_for_secs)) = row else {
                return Ok(false);
            };

            let expires_at = valid_for_secs.map(|secs| ts(now + chrono::Duration::seconds(secs)));
            let completed_at = ts(now);

            let changed = tx.execute(
                "UPDATE signing_outbox
                 SET state = 'completed', completed_at = ?2, expires_at = ?3,
                     last_error = NULL, claim_token = NULL
                 WHERE id = ?1 AND state = 'claimed'",
                params![id, completed_at, expires_at],
            )?;
            if changed != 1 {
                return Ok(false);
            }

            tx.execute(
                "INSERT INTO signed_credentials
                     (outbox_id, signed_creds, batch_proof, public_key, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![id, signed_json, batch_proof, public_key, completed_at],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)
}

/// Moves a claimed entry to `next` (`pending` or `errored`), counting the attempt.
async fn finish_attempt(
    db: &Database,
    claim: &Claim,
    next: OutboxState,
    error: &str,
) -> Result<bool, SkusError> {
    let (item_id, request_id, token) = claim_params(claim);
    let error = error.to_string();
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE signing_outbox
                 SET state = ?4, attempts = attempts + 1, claimed_at = NULL,
                     claim_token = NULL, last_error = ?5
                 WHERE item_id = ?1 AND request_id = ?2
                   AND state = 'claimed' AND claim_token = ?3",
                params![item_id, request_id, token, next.to_string(), error],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

pub async fn release_entry(db: &Database, claim: &Claim, error: &str) -> Result<bool, SkusError> {
    finish_attempt(db, claim, OutboxState::Pending, error).await
}

pub async fn mark_errored(db: &Database, claim: &Claim, error: &str) -> Result<bool, SkusError> {
    finish_attempt(db, claim, OutboxState::Errored, error).await
}

/// Returns claims older than `lease` to the pending pool.
pub async fn release_stale_claims(
    db: &Database,
    lease: Duration,
    now: DateTime<Utc>,
) -> Result<usize, SkusError> {
    let lease = chrono::Duration::from_std(lease).map_err(SkusError::storage)?;
    let cutoff = ts(now - lease);
    db.connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE signing_outbox SET state = 'pending', claimed_at = NULL, claim_token = NULL
                 WHERE state = 'claimed' AND claimed_at < ?1",
                params![cutoff],
            )
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_by_key(db: &Database, key: &OutboxKey) -> Result<Option<OutboxEntry>, SkusError> {
    let (item_id, request_id) = key_params(key);
    db.connection()
        .call(move |conn| select_by_key(conn, &item_id, &request_id))
        .await
        .map_err(map_tr_err)
}

pub async fn signed_batch(db: &Database, key: &OutboxKey) -> Result<Option<SignedBatch>, SkusError> {
    let (item_id, request_id) = key_params(key);
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT s.signed_creds, s.batch_proof, s.public_key
                 FROM signed_credentials s
                 JOIN signing_outbox o ON o.id = s.outbox_id
                 WHERE o.item_id = ?1 AND o.request_id = ?2 AND o.state = 'completed'",
                params![item_id, request_id],
                |row| {
                    Ok(SignedBatch {
                        signed_creds: get_json(row, 0)?,
                        batch_proof: row.get(1)?,
                        public_key: row.get(2)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Most recent completed entry for the item with the given credential hash.
pub async fn find_completed_by_creds(
    db: &Database,
    item_id: &ItemId,
    creds_hash: &str,
) -> Result<Option<OutboxEntry>, SkusError> {
    let item_id = item_id.to_string();
    let creds_hash = creds_hash.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!(
                    "SELECT {ENTRY_COLUMNS} FROM signing_outbox
                     WHERE item_id = ?1 AND creds_hash = ?2 AND state = 'completed'
                     ORDER BY completed_at DESC
                     LIMIT 1"
                ),
                params![item_id, creds_hash],
                entry_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Pending and claimed entries plus completed entries that have not expired.
pub async fn count_active(
    db: &Database,
    item_id: &ItemId,
    now: DateTime<Utc>,
) -> Result<usize, SkusError> {
    let item_id = item_id.to_string();
    let now = ts(now);
    db.connection()
        .call(move |conn| active_count(conn, &item_id, &now))
        .await
        .map_err(map_tr_err)
}

pub async fn delete_entry(db: &Database, key: &OutboxKey) -> Result<bool, SkusError> {
    let (item_id, request_id) = key_params(key);
    db.connection()
        .call(move |conn| {
            let deleted = conn.execute(
                "DELETE FROM signing_outbox WHERE item_id = ?1 AND request_id = ?2",
                params![item_id, request_id],
            )?;
            Ok(deleted == 1)
        })
        .await
        .map_err(map_tr_err)
}

/// Deletes an order's entries; signed credentials go with them via cascade.
pub async fn delete_entries(
    db: &Database,
    order_id: &OrderId,
    request_id: Option<&RequestId>,
) -> Result<usize, SkusError> {
    let order_id = order_id.to_string();
    let request_id = request_id.map(ToString::to_string);
    db.connection()
        .call(move |conn| match request_id {
            Some(request_id) => conn.execute(
                "DELETE FROM signing_outbox WHERE order_id = ?1 AND request_id = ?2",
                params![order_id, request_id],
            ),
            None => conn.execute(
                "DELETE FROM signing_outbox WHERE order_id = ?1",
                params![order_id],
            ),
        })
        .await
        .map_err(map_tr_err)
}

/// Mean creation-to-completion time of the last `window` completions, in whole
/// seconds rounded up. Zero when nothing has completed.
pub async fn rolling_avg_duration_seconds(db: &Database, window: usize) -> Result<i64, SkusError> {
    let window = i64::try_from(window).unwrap_or(i64::MAX);
    let spans = db
        .connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT created_at, completed_at FROM signing_outbox
                 WHERE state = 'completed' AND completed_at IS NOT NULL
                 ORDER BY completed_at DESC
                 LIMIT ?1",
            )?;
            let spans = stmt
                .query_map(params![window], |row| Ok((get_ts(row, 0)?, get_ts(row, 1)?)))?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(spans)
        })
        .await
        .map_err(map_tr_err)?;

    Ok(ceil_mean_seconds(&spans))
}

fn ceil_mean_seconds(spans: &[(DateTime<Utc>, DateTime<Utc>)]) -> i64 {
    if spans.is_empty() {
        return 0;
    }
    let total_ms: i64 = spans
        .iter()
        .map(|(start, end)| (*end - *start).num_milliseconds().max(0))
        .sum();
    let count = spans.len() as i64;
    let mean_ms = (total_ms + count - 1) / count;
    (mean_ms + 999) / 1000
}
