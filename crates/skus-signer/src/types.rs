// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Wire types for the signing service.

use serde::{Deserialize, Serialize};

use skus_core::SignedBatch;

#[derive(Debug, Clone, Serialize)]
pub struct SignRequest<'a> {
    pub blinded_tokens: &'a [String],
}

#[derive(Debug, Clone, Deserialize)]
pub struct SignResponse {
    pub batch_proof: String,
    pub signed_tokens: Vec<String>,
    #[serde(default)]
    pub public_key: String,
}

impl From<SignResponse> for SignedBatch {
    fn from(resp: SignResponse) -> Self {
        SignedBatch {
            signed_creds: resp.signed_tokens,
            batch_proof: resp.batch_proof,
            public_key: resp.public_key,
        }
    }
}

/// Error body returned by the signing service.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
    #[serde(default)]
    pub code: Option<u16>,
}
