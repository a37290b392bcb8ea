// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the SKUs credential service.
//!
//! Domain types, the error taxonomy, and the collaborator traits that the
//! storage, signer, and credential crates implement or consume.

pub mod error;
pub mod traits;
pub mod types;

pub use error::{ErrorKind, SignerError, SkusError};
pub use traits::{OrderStore, OutboxStore, PluginAdapter, Signer, StorageAdapter};
pub use types::{
    AdapterType, Claim, CredentialType, HealthStatus, InsertOutcome, IssuedCredentials, ItemId,
    Metadata, NewOutboxEntry, Order, OrderId, OrderItem, OrderStatus, OutboxEntry, OutboxKey,
    OutboxState, RequestId, SignedBatch, creds_hash, issuer_id,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_type_round_trips() {
        use std::str::FromStr;

        for variant in [
            AdapterType::Storage,
            AdapterType::Signer,
            AdapterType::Observability,
        ] {
            let parsed = AdapterType::from_str(&variant.to_string()).expect("should parse back");
            assert_eq!(variant, parsed);
        }
    }

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _order(_: &dyn OrderStore) {}
        fn _outbox(_: &dyn OutboxStore) {}
        fn _signer(_: &dyn Signer) {}
        fn _adapter(_: &dyn StorageAdapter) {}
    }
}
