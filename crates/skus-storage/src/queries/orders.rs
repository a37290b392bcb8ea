// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Order and order item queries.

use chrono::Utc;
use rusqlite::{OptionalExtension, params};
use skus_core::{ItemId, Order, OrderId, OrderItem, OrderStatus, SkusError};

use super::{get_json, get_opt_ts, get_parsed, get_ts, opt_ts, ts};
use crate::database::{Database, map_tr_err};

const ORDER_COLUMNS: &str = "id, status, currency, total_price, merchant_id, metadata,
     valid_for_secs, last_paid_at, expires_at, trial_days, created_at";

const ITEM_COLUMNS: &str = "id, order_id, sku, sku_variant, credential_type, quantity, price,
     valid_for_secs, valid_for_iso, issuance_interval, metadata, created_at";

fn order_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Order> {
    Ok(Order {
        id: get_parsed(row, 0)?,
        status: get_parsed(row, 1)?,
        currency: row.get(2)?,
        total_price: get_parsed(row, 3)?,
        merchant_id: row.get(4)?,
        metadata: get_json(row, 5)?,
        valid_for_secs: row.get(6)?,
        last_paid_at: get_opt_ts(row, 7)?,
        expires_at: get_opt_ts(row, 8)?,
        trial_days: row.get(9)?,
        created_at: get_ts(row, 10)?,
        items: Vec::new(),
    })
}

fn item_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<OrderItem> {
    Ok(OrderItem {
        id: get_parsed(row, 0)?,
        order_id: get_parsed(row, 1)?,
        sku: row.get(2)?,
        sku_variant: row.get(3)?,
        credential_type: get_parsed(row, 4)?,
        quantity: row.get(5)?,
        price: get_parsed(row, 6)?,
        valid_for_secs: row.get(7)?,
        valid_for_iso: row.get(8)?,
        issuance_interval: row.get(9)?,
        metadata: get_json(row, 10)?,
        created_at: get_ts(row, 11)?,
    })
}

/// Inserts an order and all of its items atomically.
pub async fn create_order(db: &Database, order: &Order) -> Result<(), SkusError> {
    let order = order.clone();
    let order_meta = serde_json::to_string(&order.metadata).map_err(SkusError::storage)?;
    let item_meta = order
        .items
        .iter()
        .map(|item| serde_json::to_string(&item.metadata))
        .collect::<Result<Vec<_>, _>>()
        .map_err(SkusError::storage)?;

    db.connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO orders (id, status, currency, total_price, merchant_id, metadata,
                     valid_for_secs, last_paid_at, expires_at, trial_days, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                params![
                    order.id.to_string(),
                    order.status.to_string(),
                    order.currency,
                    order.total_price.to_string(),
                    order.merchant_id,
                    order_meta,
                    order.valid_for_secs,
                    opt_ts(order.last_paid_at),
                    opt_ts(order.expires_at),
                    order.trial_days,
                    ts(order.created_at),
                ],
            )?;
            for (item, meta) in order.items.iter().zip(item_meta) {
                tx.execute(
                    "INSERT INTO order_items (id, order_id, sku, sku_variant, credential_type,
                         quantity, price, valid_for_secs, valid_for_iso, issuance_interval,
                         metadata, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
                    params![
                        item.id.to_string(),
                        order.id.to_string(),
                        item.sku,
                        item.sku_variant,
                        item.credential_type.to_string(),
                        item.quantity,
                        item.price.to_string(),
                        item.valid_for_secs,
                        item.valid_for_iso,
                        item.issuance_interval,
                        meta,
                        ts(item.created_at),
                    ],
                )?;
            }
            tx.commit()
        })
        .await
        .map_err(map_tr_err)
}

/// Fetches an order with its items, oldest item first.
pub async fn get_order(db: &Database, id: &OrderId) -> Result<Option<Order>, SkusError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let order = conn
                .query_row(
                    &format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"),
                    params![id],
                    order_from_row,
                )
                .optional()?;

            let Some(mut order) = order else {
                return Ok(None);
            };

            let mut stmt = conn.prepare(&format!(
                "SELECT {ITEM_COLUMNS} FROM order_items WHERE order_id = ?1
                 ORDER BY created_at ASC, rowid ASC"
            ))?;
            order.items = stmt
                .query_map(params![id], item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(Some(order))
        })
        .await
        .map_err(map_tr_err)
}

pub async fn get_order_item(db: &Database, id: &ItemId) -> Result<Option<OrderItem>, SkusError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                &format!("SELECT {ITEM_COLUMNS} FROM order_items WHERE id = ?1"),
                params![id],
                item_from_row,
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Updates the status; moving to `paid` also stamps `last_paid_at`.
pub async fn update_order_status(
    db: &Database,
    id: &OrderId,
    status: OrderStatus,
) -> Result<bool, SkusError> {
    let id = id.to_string();
    let now = ts(Utc::now());
    db.connection()
        .call(move |conn| {
            let changed = conn.execute(
                "UPDATE orders SET status = ?2,
                     last_paid_at = CASE WHEN ?2 = 'paid' THEN ?3 ELSE last_paid_at END,
                     updated_at = ?3
                 WHERE id = ?1",
                params![id, status.to_string(), now],
            )?;
            Ok(changed == 1)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use skus_core::CredentialType;
    use tempfile::tempdir;

    fn sample_order() -> Order {
        let order_id = OrderId::new();
        let now = Utc::now();
        let mut metadata = skus_core::Metadata::new();
        metadata.insert("numIntervals".into(), serde_json::json!(3));
        Order {
            id: order_id,
            status: OrderStatus::Pending,
            currency: "USD".into(),
            total_price: Decimal::new(999, 2),
            merchant_id: "brave.com".into(),
            metadata: skus_core::Metadata::new(),
            valid_for_secs: Some(2_592_000),
            last_paid_at: None,
            expires_at: None,
            trial_days: Some(7),
            created_at: now,
            items: vec![OrderItem {
                id: ItemId::new(),
                order_id,
                sku: "leo".into(),
                sku_variant: "leo-monthly".into(),
                credential_type: CredentialType::TimeLimitedV2,
                quantity: 1,
                price: Decimal::new(999, 2),
                valid_for_secs: Some(86_400),
                valid_for_iso: Some("P1M".into()),
                issuance_interval: Some("P1D".into()),
                metadata,
                created_at: now,
            }],
        }
    }

    #[tokio::test]
    async fn create_and_fetch_order_with_items() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("o.db").to_str().unwrap())
            .await
            .unwrap();
        let order = sample_order();
        create_order(&db, &order).await.unwrap();

        let fetched = get_order(&db, &order.id).await.unwrap().expect("order exists");
        assert_eq!(fetched.items.len(), 1);
        assert_eq!(fetched.total_price, Decimal::new(999, 2));
        assert_eq!(fetched.items[0].credential_type, CredentialType::TimeLimitedV2);
        assert_eq!(fetched.items[0].metadata["numIntervals"], serde_json::json!(3));

        let item = get_order_item(&db, &order.items[0].id).await.unwrap().unwrap();
        assert_eq!(item.sku, "leo");
        assert_eq!(item.order_id, order.id);
    }

    #[tokio::test]
    async fn missing_order_is_none() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("o.db").to_str().unwrap())
            .await
            .unwrap();
        assert!(get_order(&db, &OrderId::new()).await.unwrap().is_none());
        assert!(get_order_item(&db, &ItemId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn marking_paid_stamps_last_paid_at() {
        let dir = tempdir().unwrap();
        let db = Database::open(dir.path().join("o.db").to_str().unwrap())
            .await
            .unwrap();
        let order = sample_order();
        create_order(&db, &order).await.unwrap();

        assert!(update_order_status(&db, &order.id, OrderStatus::Paid).await.unwrap());
        let paid = get_order(&db, &order.id).await.unwrap().unwrap();
        assert_eq!(paid.status, OrderStatus::Paid);
        assert!(paid.last_paid_at.is_some());

        assert!(!update_order_status(&db, &OrderId::new(), OrderStatus::Paid).await.unwrap());
    }
}
