// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Credential policy: how many signing batches an item may have in flight,
//! how many blinded credentials a batch may carry, and when an oversized
//! time-limited-v2 batch is truncated instead of rejected.
//!
//! Everything here is pure and deterministic. Repeating a submission always
//! truncates to the same prefix, which is what lets the orchestrator compare
//! resubmissions byte for byte.

pub mod intervals;

use std::collections::BTreeMap;

use skus_config::model::CredentialsConfig;
use skus_core::{CredentialType, Order, OrderItem, SkusError};
use tracing::debug;

pub use intervals::IntervalParams;

/// Issuance limits resolved from configuration.
#[derive(Debug, Clone)]
pub struct CredentialPolicy {
    default_active_limit: usize,
    active_limits: BTreeMap<String, usize>,
    interval_ceilings: BTreeMap<String, u64>,
}

impl CredentialPolicy {
    pub fn new(config: &CredentialsConfig) -> Self {
        Self {
            default_active_limit: config.default_active_limit,
            active_limits: config.active_limits.clone(),
            interval_ceilings: config.interval_ceilings.clone(),
        }
    }

    /// Maximum concurrent active signing requests per item for `sku`.
    pub fn active_limit(&self, sku: &str) -> usize {
        self.active_limits
            .get(sku)
            .copied()
            .unwrap_or(self.default_active_limit)
    }

    /// Effective limit for an item. Single-use items allow exactly one request, ever.
    pub fn limit_for_item(&self, item: &OrderItem) -> usize {
        match item.credential_type {
            CredentialType::SingleUse => 1,
            CredentialType::TimeLimited | CredentialType::TimeLimitedV2 => {
                self.active_limit(&item.sku)
            }
        }
    }

    /// Most intervals the signer will issue for `sku`, if it is capped.
    pub fn interval_ceiling(&self, sku: &str) -> Option<u64> {
        self.interval_ceilings.get(sku).copied()
    }

    /// Rejects blinded credential counts the item can never legitimately need.
    ///
    /// Capped time-limited-v2 SKUs are exempt from the nominal check; their
    /// excess is removed by [`truncate`](Self::truncate) instead.
    pub fn check_blinded_count(
        &self,
        order: &Order,
        item: &OrderItem,
        submitted: usize,
    ) -> Result<(), SkusError> {
        if submitted == 0 {
            return Err(SkusError::Validation(
                "blinded credentials must not be empty".into(),
            ));
        }

        match item.credential_type {
            CredentialType::SingleUse => {
                let quantity = usize::try_from(item.quantity).unwrap_or(0);
                if submitted > quantity {
                    return Err(SkusError::InvalidCredentialCount(format!(
                        "{submitted} credentials for single-use quantity {quantity}"
                    )));
                }
                Ok(())
            }
            CredentialType::TimeLimitedV2 => {
                let params = IntervalParams::from_order_item(order, item)?;
                if self.interval_ceiling(&item.sku).is_some() {
                    return Ok(());
                }
                let nominal = params.nominal_total();
                if submitted > nominal {
                    return Err(SkusError::InvalidCredentialCount(format!(
                        "{submitted} credentials exceeds {} intervals x {} per interval",
                        params.num_intervals, params.num_per_interval
                    )));
                }
                Ok(())
            }
            CredentialType::TimeLimited => {
                Err(SkusError::UnsupportedCredentialType(item.credential_type))
            }
        }
    }

    /// Returns `(cap, true)` when a capped time-limited-v2 submission is oversized.
    ///
    /// Anything else, including items whose interval metadata is missing,
    /// yields `(0, false)`.
    pub fn should_truncate(&self, order: &Order, item: &OrderItem, submitted: usize) -> (usize, bool) {
        if item.credential_type != CredentialType::TimeLimitedV2 {
            return (0, false);
        }
        let Some(ceiling) = self.interval_ceiling(&item.sku) else {
            return (0, false);
        };
        let Ok(params) = IntervalParams::from_order_item(order, item) else {
            return (0, false);
        };

        let cap = truncation_cap(params, ceiling);
        if submitted > cap {
            (cap, true)
        } else {
            (0, false)
        }
    }

    /// Applies [`should_truncate`](Self::should_truncate): a stable prefix or the input unchanged.
    pub fn truncate(&self, order: &Order, item: &OrderItem, creds: Vec<String>) -> Vec<String> {
        match self.should_truncate(order, item, creds.len()) {
            (cap, true) => {
                debug!(
                    sku = %item.sku,
                    submitted = creds.len(),
                    cap,
                    "truncating blinded credentials"
                );
                truncate_prefix(creds, cap)
            }
            _ => creds,
        }
    }
}

/// Credentials needed for `min(num_intervals, ceiling)` intervals.
pub fn truncation_cap(params: IntervalParams, ceiling: u64) -> usize {
    let intervals = params.num_intervals.min(ceiling);
    usize::try_from(intervals.saturating_mul(params.num_per_interval)).unwrap_or(usize::MAX)
}

/// Keeps the first `cap` elements in their original order.
pub fn truncate_prefix(mut creds: Vec<String>, cap: usize) -> Vec<String> {
    creds.truncate(cap);
    creds
}
