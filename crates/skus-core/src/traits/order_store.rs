// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::SkusError;
use crate::types::{ItemId, Order, OrderId, OrderItem, OrderStatus};

/// Read/update access to orders and their items.
///
/// Order creation and payment confirmation live outside the credential
/// core; this trait exposes only what issuance needs plus the writes used
/// by those outer paths.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Fetches an order together with all of its items.
    async fn get_order(&self, id: &OrderId) -> Result<Option<Order>, SkusError>;

    async fn get_order_item(&self, id: &ItemId) -> Result<Option<OrderItem>, SkusError>;

    /// Sets the order status. Returns false if the order does not exist.
    async fn update_order_status(
        &self,
        id: &OrderId,
        status: OrderStatus,
    ) -> Result<bool, SkusError>;

    /// Persists a new order and its items in one transaction.
    async fn create_order(&self, order: &Order) -> Result<(), SkusError>;
}
