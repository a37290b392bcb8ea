// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use async_trait::async_trait;

use crate::error::SignerError;
use crate::types::SignedBatch;

/// External blind-signature service.
///
/// The scheme is opaque here. Implementations must classify each failure as
/// retryable or terminal.
#[async_trait]
pub trait Signer: Send + Sync {
    async fn sign(&self, issuer: &str, blinded_creds: &[String])
    -> Result<SignedBatch, SignerError>;
}
