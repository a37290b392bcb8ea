// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator trait definitions.
//!
//! Stores and signers are consumed through these traits so the credential
//! services can be wired against SQLite, HTTP, or in-memory test doubles.

pub mod adapter;
pub mod order_store;
pub mod outbox_store;
pub mod signer;

pub use adapter::{PluginAdapter, StorageAdapter};
pub use order_store::OrderStore;
pub use outbox_store::OutboxStore;
pub use signer::Signer;
