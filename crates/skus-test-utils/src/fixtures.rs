// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order fixtures.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use skus_core::{CredentialType, ItemId, Metadata, Order, OrderId, OrderItem, OrderStatus};

/// `n` distinct base64 blinded credentials derived from `prefix`.
pub fn blinded_creds(prefix: &str, n: usize) -> Vec<String> {
    (0..n)
        .map(|i| STANDARD.encode(format!("{prefix}:{i}")))
        .collect()
}

/// Builder for a single-item order.
#[derive(Debug, Clone)]
pub struct OrderFixture {
    status: OrderStatus,
    merchant_id: String,
    sku: String,
    credential_type: CredentialType,
    quantity: i64,
    valid_for_secs: Option<i64>,
    item_metadata: Metadata,
    order_metadata: Metadata,
}

impl OrderFixture {
    /// A paid time-limited-v2 order for `sku`.
    pub fn tlv2(sku: &str) -> Self {
        Self {
            status: OrderStatus::Paid,
            merchant_id: "brave.com".into(),
            sku: sku.into(),
            credential_type: CredentialType::TimeLimitedV2,
            quantity: 1,
            valid_for_secs: Some(30 * 86_400),
            item_metadata: Metadata::new(),
            order_metadata: Metadata::new(),
        }
    }

    /// A paid single-use order for `sku`.
    pub fn single_use(sku: &str, quantity: i64) -> Self {
        Self {
            credential_type: CredentialType::SingleUse,
            quantity,
            valid_for_secs: None,
            ..Self::tlv2(sku)
        }
    }

    pub fn credential_type(mut self, credential_type: CredentialType) -> Self {
        self.credential_type = credential_type;
        self
    }

    pub fn status(mut self, status: OrderStatus) -> Self {
        self.status = status;
        self
    }

    pub fn merchant(mut self, merchant_id: &str) -> Self {
        self.merchant_id = merchant_id.into();
        self
    }

    pub fn valid_for_secs(mut self, secs: Option<i64>) -> Self {
        self.valid_for_secs = secs;
        self
    }

    /// Interval metadata on the item.
    pub fn intervals(mut self, num_intervals: u64, num_per_interval: u64) -> Self {
        self.item_metadata
            .insert("numIntervals".into(), Value::from(num_intervals));
        self.item_metadata
            .insert("numPerInterval".into(), Value::from(num_per_interval));
        self
    }

    pub fn order_metadata(mut self, key: &str, value: Value) -> Self {
        self.order_metadata.insert(key.into(), value);
        self
    }

    pub fn build(self) -> Order {
        let order_id = OrderId::new();
        let now = Utc::now();
        let price = Decimal::new(995, 2);
        Order {
            id: order_id,
            status: self.status,
            currency: "USD".into(),
            total_price: price * Decimal::from(self.quantity),
            merchant_id: self.merchant_id,
            metadata: self.order_metadata,
            valid_for_secs: self.valid_for_secs,
            last_paid_at: (self.status == OrderStatus::Paid).then_some(now),
            expires_at: None,
            trial_days: None,
            created_at: now,
            items: vec![OrderItem {
                id: ItemId::new(),
                order_id,
                sku: self.sku.clone(),
                sku_variant: format!("{}-default", self.sku),
                credential_type: self.credential_type,
                quantity: self.quantity,
                price,
                valid_for_secs: self.valid_for_secs,
                valid_for_iso: None,
                issuance_interval: None,
                metadata: self.item_metadata,
                created_at: now,
            }],
        }
    }
}
