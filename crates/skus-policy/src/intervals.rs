// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reading interval parameters out of order and item metadata.

use serde_json::Value;
use skus_core::{Metadata, Order, OrderItem, SkusError};

pub const NUM_INTERVALS_KEY: &str = "numIntervals";
pub const NUM_PER_INTERVAL_KEY: &str = "numPerInterval";

/// How many intervals an item covers and how many credentials each needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IntervalParams {
    pub num_intervals: u64,
    pub num_per_interval: u64,
}

impl IntervalParams {
    /// Item metadata wins; order metadata is the fallback.
    pub fn from_order_item(order: &Order, item: &OrderItem) -> Result<Self, SkusError> {
        let num_intervals = lookup(&item.metadata, &order.metadata, NUM_INTERVALS_KEY)
            .ok_or(SkusError::NumIntervalsNotSet)
            .and_then(|v| as_count(v).ok_or_else(|| SkusError::InvalidNumIntervals(v.to_string())))?;

        let num_per_interval = lookup(&item.metadata, &order.metadata, NUM_PER_INTERVAL_KEY)
            .ok_or(SkusError::NumPerIntervalNotSet)
            .and_then(|v| {
                as_count(v).ok_or_else(|| SkusError::InvalidNumPerInterval(v.to_string()))
            })?;

        Ok(Self {
            num_intervals,
            num_per_interval,
        })
    }

    /// Credentials for the whole nominal duration.
    pub fn nominal_total(&self) -> usize {
        usize::try_from(self.num_intervals.saturating_mul(self.num_per_interval))
            .unwrap_or(usize::MAX)
    }
}

fn lookup<'a>(item: &'a Metadata, order: &'a Metadata, key: &str) -> Option<&'a Value> {
    item.get(key).or_else(|| order.get(key))
}

/// Positive whole number from a JSON integer, integral float, or numeric string.
fn as_count(value: &Value) -> Option<u64> {
    let n = match value {
        Value::Number(n) => n.as_u64().or_else(|| {
            n.as_f64()
                .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0 && *f <= u64::MAX as f64)
                .map(|f| f as u64)
        })?,
        Value::String(s) => {
            let s = s.trim();
            s.parse::<u64>().ok().or_else(|| {
                s.parse::<f64>()
                    .ok()
                    .filter(|f| f.is_finite() && f.fract() == 0.0 && *f >= 0.0)
                    .map(|f| f as u64)
            })?
        }
        _ => return None,
    };
    (n > 0).then_some(n)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_integers_floats_and_strings() {
        assert_eq!(as_count(&json!(8)), Some(8));
        assert_eq!(as_count(&json!(192.0)), Some(192));
        assert_eq!(as_count(&json!("3")), Some(3));
        assert_eq!(as_count(&json!(" 4 ")), Some(4));
    }

    #[test]
    fn rejects_fractions_negatives_zero_and_junk() {
        assert_eq!(as_count(&json!(1.5)), None);
        assert_eq!(as_count(&json!(-2)), None);
        assert_eq!(as_count(&json!(0)), None);
        assert_eq!(as_count(&json!("many")), None);
        assert_eq!(as_count(&json!(true)), None);
        assert_eq!(as_count(&json!(null)), None);
    }

    #[test]
    fn item_metadata_takes_precedence() {
        let mut item = Metadata::new();
        item.insert(NUM_INTERVALS_KEY.into(), json!(2));
        let mut order = Metadata::new();
        order.insert(NUM_INTERVALS_KEY.into(), json!(9));
        order.insert(NUM_PER_INTERVAL_KEY.into(), json!(5));

        assert_eq!(lookup(&item, &order, NUM_INTERVALS_KEY), Some(&json!(2)));
        assert_eq!(lookup(&item, &order, NUM_PER_INTERVAL_KEY), Some(&json!(5)));
        assert_eq!(lookup(&item, &order, "missing"), None);
    }
}
