// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Domain types shared by the order store, the outbox, and the credential services.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use strum::{Display, EnumString};
use uuid::Uuid;

/// Free-form key/value metadata attached to orders and items.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generates a fresh random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s).map(Self)
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for an order.
    OrderId
);
uuid_id!(
    /// Unique identifier for an order item.
    ItemId
);
uuid_id!(
    /// Caller-supplied identifier of one signing batch for an item.
    RequestId
);

impl From<ItemId> for RequestId {
    /// Legacy callers reuse the item id as the request id.
    fn from(item: ItemId) -> Self {
        RequestId(item.0)
    }
}

/// Payment lifecycle of an order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Paid,
    Canceled,
}

/// How credentials for an item are issued and redeemed.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum CredentialType {
    #[strum(serialize = "single-use")]
    #[serde(rename = "single-use")]
    SingleUse,
    #[strum(serialize = "time-limited")]
    #[serde(rename = "time-limited")]
    TimeLimited,
    #[strum(serialize = "time-limited-v2")]
    #[serde(rename = "time-limited-v2")]
    TimeLimitedV2,
}

/// A purchasable aggregate owning one or more items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub status: OrderStatus,
    pub currency: String,
    pub total_price: Decimal,
    pub merchant_id: String,
    #[serde(default)]
    pub metadata: Metadata,
    pub valid_for_secs: Option<i64>,
    pub last_paid_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub trial_days: Option<i64>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
}

impl Order {
    pub fn is_paid(&self) -> bool {
        self.status == OrderStatus::Paid
    }

    /// Returns the item with the given id, if it belongs to this order.
    pub fn item(&self, id: &ItemId) -> Option<&OrderItem> {
        self.items.iter().find(|item| item.id == *id)
    }
}

/// A line item of an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: ItemId,
    pub order_id: OrderId,
    pub sku: String,
    pub sku_variant: String,
    pub credential_type: CredentialType,
    pub quantity: i64,
    pub price: Decimal,
    /// Lifetime of signed credentials in seconds; `None` means they never expire.
    pub valid_for_secs: Option<i64>,
    pub valid_for_iso: Option<String>,
    pub issuance_interval: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
}

/// Issuer identity handed to the signer: `<merchant>?sku=<sku>`.
pub fn issuer_id(merchant_id: &str, sku: &str) -> String {
    format!("{merchant_id}?sku={sku}")
}

/// Identity of one outbox entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OutboxKey {
    pub item_id: ItemId,
    pub request_id: RequestId,
}

impl OutboxKey {
    pub fn new(item_id: ItemId, request_id: RequestId) -> Self {
        Self {
            item_id,
            request_id,
        }
    }
}

impl fmt::Display for OutboxKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.item_id, self.request_id)
    }
}

/// Processing state of an outbox entry.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum OutboxState {
    Pending,
    Claimed,
    Completed,
    Errored,
}

/// Hex SHA-256 over the ordered blinded credentials.
///
/// Used for exact-set comparisons without loading every stored batch.
pub fn creds_hash(creds: &[String]) -> String {
    let mut hasher = Sha256::new();
    for cred in creds {
        hasher.update(cred.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// A signing request waiting to be written to the outbox.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOutboxEntry {
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub request_id: RequestId,
    pub issuer: String,
    pub blinded_creds: Vec<String>,
    pub valid_for_secs: Option<i64>,
}

impl NewOutboxEntry {
    pub fn key(&self) -> OutboxKey {
        OutboxKey::new(self.item_id, self.request_id)
    }

    pub fn creds_hash(&self) -> String {
        creds_hash(&self.blinded_creds)
    }
}

/// A durable signing request, the unit of idempotency and work queuing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboxEntry {
    pub id: String,
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub request_id: RequestId,
    pub issuer: String,
    pub blinded_creds: Vec<String>,
    pub creds_hash: String,
    pub state: OutboxState,
    pub attempts: u32,
    pub valid_for_secs: Option<i64>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    /// Set while claimed; identifies the worker holding the claim.
    pub claim_token: Option<String>,
    pub completed_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl OutboxEntry {
    pub fn key(&self) -> OutboxKey {
        OutboxKey::new(self.item_id, self.request_id)
    }

    /// The claim held on a claimed entry.
    pub fn claim(&self) -> Option<Claim> {
        self.claim_token.as_ref().map(|token| Claim {
            key: self.key(),
            token: token.clone(),
        })
    }

    /// True when the stored blinded credentials equal `creds` exactly, in order.
    pub fn matches_creds(&self, creds: &[String]) -> bool {
        self.blinded_creds == creds
    }

    /// True when a completed entry's credentials have lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == OutboxState::Completed && self.expires_at.is_some_and(|at| at <= now)
    }

    /// Counts toward the per-item concurrency limit.
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        match self.state {
            OutboxState::Pending | OutboxState::Claimed => true,
            OutboxState::Completed => !self.is_expired(now),
            OutboxState::Errored => false,
        }
    }
}

/// A worker's hold on a claimed entry.
///
/// Write-backs only apply while the stored token still matches, so a claim
/// that was released and re-claimed elsewhere cannot be completed twice.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Claim {
    pub key: OutboxKey,
    pub token: String,
}

impl fmt::Display for Claim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key.fmt(f)
    }
}

/// Result of an outbox insert.
#[derive(Debug, Clone, PartialEq)]
pub enum InsertOutcome {
    /// A new pending entry was written.
    Inserted(OutboxEntry),
    /// An entry already existed for the key; it is returned unchanged.
    Existing(OutboxEntry),
    /// The item already had `active` entries, at or above the limit; nothing was written.
    LimitReached { active: usize },
}

impl InsertOutcome {
    pub fn entry(&self) -> Option<&OutboxEntry> {
        match self {
            InsertOutcome::Inserted(e) | InsertOutcome::Existing(e) => Some(e),
            InsertOutcome::LimitReached { .. } => None,
        }
    }
}

/// Signer output for one batch of blinded credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedBatch {
    pub signed_creds: Vec<String>,
    pub batch_proof: String,
    pub public_key: String,
}

/// Signed credentials handed back to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedCredentials {
    pub order_id: OrderId,
    pub item_id: ItemId,
    pub request_id: RequestId,
    pub issuer: String,
    pub blinded_creds: Vec<String>,
    pub signed_creds: Vec<String>,
    pub batch_proof: Option<String>,
    pub public_key: Option<String>,
    pub valid_to: Option<DateTime<Utc>>,
}

/// Health status reported by adapter health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

/// Identifies the kind of adapter.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
pub enum AdapterType {
    Storage,
    Signer,
    Observability,
}
