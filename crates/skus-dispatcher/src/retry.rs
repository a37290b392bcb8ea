// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! What happens to an outbox entry after a failed signing attempt.

use skus_core::SignerError;

/// Next state for an entry whose signing attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Back to pending for a later tick.
    Retry,
    /// Terminal; the client must resubmit under a fresh request id.
    Errored,
}

/// Decides the fate of a failed attempt.
///
/// `prior_attempts` counts failures before this one. Terminal errors end the
/// entry at once; retryable ones do so when this failure reaches `max_attempts`.
pub fn disposition(error: &SignerError, prior_attempts: u32, max_attempts: u32) -> Disposition {
    if !error.is_retryable() {
        return Disposition::Errored;
    }
    if prior_attempts.saturating_add(1) >= max_attempts {
        Disposition::Errored
    } else {
        Disposition::Retry
    }
}
