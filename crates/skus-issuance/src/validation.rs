// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shape checks on submitted blinded credentials.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use skus_core::SkusError;

/// Rejects an empty submission or any entry that is not standard base64.
///
/// The index of the first bad entry is reported so clients can locate it.
pub fn validate_blinded_creds(creds: &[String]) -> Result<(), SkusError> {
    if creds.is_empty() {
        return Err(SkusError::Validation(
            "blinded credentials must not be empty".into(),
        ));
    }

    for (index, cred) in creds.iter().enumerate() {
        if cred.is_empty() || STANDARD.decode(cred).is_err() {
            return Err(SkusError::InvalidBlindedCredential { index });
        }
    }

    Ok(())
}
