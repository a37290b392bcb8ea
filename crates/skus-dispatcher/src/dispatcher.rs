// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use skus_config::model::DispatcherConfig;
use skus_core::{Claim, OutboxEntry, OutboxStore, SignedBatch, Signer, SignerError, SkusError};

use crate::retry::{Disposition, disposition};

/// Counts from one dispatcher tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchReport {
    pub released_stale: usize,
    pub claimed: usize,
    pub completed: usize,
    pub retried: usize,
    pub errored: usize,
}

impl DispatchReport {
    pub fn is_idle(&self) -> bool {
        self.released_stale == 0 && self.claimed == 0
    }
}

enum EntryOutcome {
    Completed,
    Retried,
    Errored,
    /// Our claim no longer held when we tried to write back.
    Lost,
}

/// Drains the signing outbox through an external [`Signer`].
pub struct SigningDispatcher {
    outbox: Arc<dyn OutboxStore>,
    signer: Arc<dyn Signer>,
    config: DispatcherConfig,
}

impl SigningDispatcher {
    pub fn new(
        outbox: Arc<dyn OutboxStore>,
        signer: Arc<dyn Signer>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            outbox,
            signer,
            config,
        }
    }

    /// Runs one dispatch pass.
    ///
    /// Stale claims are released first, then up to `batch_size` of the oldest
    /// pending entries are claimed and signed one at a time. Each entry's
    /// lease restarts right before its signer call, so the lease only has to
    /// outlast one call rather than the whole batch. A store failure aborts
    /// the pass; entries it had claimed go back to pending once their lease
    /// runs out.
    pub async fn tick(&self) -> Result<DispatchReport, SkusError> {
        let mut report = DispatchReport {
            released_stale: self
                .outbox
                .release_stale_claims(Duration::from_secs(self.config.claim_lease_secs))
                .await?,
            ..DispatchReport::default()
        };
        if report.released_stale > 0 {
            warn!(count = report.released_stale, "released stale outbox claims");
        }

        let entries = self.outbox.claim_pending(self.config.batch_size).await?;
        report.claimed = entries.len();
        if entries.is_empty() {
            return Ok(report);
        }
        skus_prometheus::record_claimed(entries.len());
        debug!(count = entries.len(), "claimed outbox entries");

        for entry in entries {
            match self.process(&entry).await? {
                EntryOutcome::Completed => report.completed += 1,
                EntryOutcome::Retried => report.retried += 1,
                EntryOutcome::Errored => report.errored += 1,
                EntryOutcome::Lost => {}
            }
        }

        Ok(report)
    }

    /// Ticks every `poll_interval_secs` until `cancel` fires.
    ///
    /// A failed tick is logged and the next one proceeds as normal.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut interval =
            tokio::time::interval(Duration::from_secs(self.config.poll_interval_secs));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        info!(
            poll_interval_secs = self.config.poll_interval_secs,
            batch_size = self.config.batch_size,
            "signing dispatcher started"
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match self.tick().await {
                        Ok(report) if report.is_idle() => {}
                        Ok(report) => {
                            info!(
                                claimed = report.claimed,
                                completed = report.completed,
                                retried = report.retried,
                                errored = report.errored,
                                released_stale = report.released_stale,
                                "dispatch tick finished"
                            );
                        }
                        Err(e) => {
                            error!(error = %e, "dispatch tick failed");
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    info!("signing dispatcher shutting down");
                    break;
                }
            }
        }
    }

    async fn process(&self, entry: &OutboxEntry) -> Result<EntryOutcome, SkusError> {
        let claim = entry.claim().ok_or_else(|| {
            SkusError::Internal(format!("entry {} claimed without a token", entry.key()))
        })?;

        if !self.outbox.renew_claim(&claim).await? {
            warn!(key = %claim, "claim lost before signing, skipping entry");
            return Ok(EntryOutcome::Lost);
        }

        match self.sign(entry).await {
            Ok(batch) => {
                if self.outbox.complete_entry(&claim, &batch).await? {
                    debug!(key = %claim, count = batch.signed_creds.len(), "outbox entry signed");
                    skus_prometheus::record_completed();
                    Ok(EntryOutcome::Completed)
                } else {
                    warn!(key = %claim, "claim lost before completion, discarding signed batch");
                    Ok(EntryOutcome::Lost)
                }
            }
            Err(err) => self.fail(entry, &claim, &err).await,
        }
    }

    /// One signer call, bounded by the configured timeout.
    async fn sign(&self, entry: &OutboxEntry) -> Result<SignedBatch, SignerError> {
        let timeout = Duration::from_secs(self.config.signer_timeout_secs);
        let started = Instant::now();
        let result = tokio::time::timeout(
            timeout,
            self.signer.sign(&entry.issuer, &entry.blinded_creds),
        )
        .await;
        skus_prometheus::record_signing_latency(started.elapsed().as_secs_f64());

        let batch = match result {
            Ok(signed) => signed?,
            Err(_) => {
                return Err(SignerError::Retryable(format!(
                    "signer did not answer within {}s",
                    timeout.as_secs()
                )));
            }
        };

        if batch.signed_creds.len() != entry.blinded_creds.len() {
            return Err(SignerError::Terminal(format!(
                "signer returned {} credentials for {} blinded",
                batch.signed_creds.len(),
                entry.blinded_creds.len()
            )));
        }
        Ok(batch)
    }

    async fn fail(
        &self,
        entry: &OutboxEntry,
        claim: &Claim,
        err: &SignerError,
    ) -> Result<EntryOutcome, SkusError> {
        let key = &claim.key;
        let message = err.message();

        match disposition(err, entry.attempts, self.config.max_attempts) {
            Disposition::Retry => {
                warn!(
                    key = %key,
                    attempt = entry.attempts + 1,
                    max_attempts = self.config.max_attempts,
                    error = message,
                    "signing failed, will retry"
                );
                if !self.outbox.release_entry(claim, message).await? {
                    return Ok(EntryOutcome::Lost);
                }
                skus_prometheus::record_retried();
                Ok(EntryOutcome::Retried)
            }
            Disposition::Errored => {
                error!(
                    key = %key,
                    attempts = entry.attempts + 1,
                    retryable = err.is_retryable(),
                    error = message,
                    "signing failed permanently"
                );
                if !self.outbox.mark_errored(claim, message).await? {
                    return Ok(EntryOutcome::Lost);
                }
                skus_prometheus::record_errored();
                Ok(EntryOutcome::Errored)
            }
        }
    }
}
