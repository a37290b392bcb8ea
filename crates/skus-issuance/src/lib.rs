// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blinded credential issuance for paid order items.
//!
//! [`CredentialIssuer`] validates and enqueues signing requests into the
//! outbox; [`CredentialRetriever`] serves the signed results, or a
//! retry-after while signing is still in flight.

pub mod orchestrator;
pub mod retrieval;
pub mod validation;

pub use orchestrator::{CredentialIssuer, RequestOutcome};
pub use retrieval::{CredentialRetriever, CredentialsOutcome, RequestIdResolution};
pub use validation::validate_blinded_creds;
