// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric descriptions and recording helpers.
//!
//! Recording goes through the metrics facade, so these calls are no-ops
//! until a recorder is installed.

use metrics::{describe_counter, describe_histogram};

/// Register metric descriptions. Called once after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "skus_credentials_requested_total",
        "Blinded credential signing requests accepted into the outbox"
    );
    describe_counter!(
        "skus_credentials_idempotent_total",
        "Resubmissions answered from an existing signing request"
    );
    describe_counter!(
        "skus_credentials_rejected_total",
        "Signing requests rejected, by reason"
    );
    describe_counter!("skus_outbox_claimed_total", "Outbox entries claimed for signing");
    describe_counter!("skus_outbox_completed_total", "Outbox entries signed and stored");
    describe_counter!(
        "skus_outbox_retried_total",
        "Outbox entries returned to pending after a retryable failure"
    );
    describe_counter!(
        "skus_outbox_errored_total",
        "Outbox entries moved to the terminal errored state"
    );
    describe_histogram!(
        "skus_signing_duration_seconds",
        "Latency of external signer calls in seconds"
    );
}

pub fn record_requested(credential_type: &str) {
    metrics::counter!(
        "skus_credentials_requested_total",
        "credential_type" => credential_type.to_string()
    )
    .increment(1);
}

pub fn record_idempotent() {
    metrics::counter!("skus_credentials_idempotent_total").increment(1);
}

pub fn record_rejected(reason: &'static str) {
    metrics::counter!("skus_credentials_rejected_total", "reason" => reason).increment(1);
}

pub fn record_claimed(count: usize) {
    metrics::counter!("skus_outbox_claimed_total").increment(count as u64);
}

pub fn record_completed() {
    metrics::counter!("skus_outbox_completed_total").increment(1);
}

pub fn record_retried() {
    metrics::counter!("skus_outbox_retried_total").increment(1);
}

pub fn record_errored() {
    metrics::counter!("skus_outbox_errored_total").increment(1);
}

/// Record one signer call's latency.
pub fn record_signing_latency(seconds: f64) {
    metrics::histogram!("skus_signing_duration_seconds").record(seconds);
}
