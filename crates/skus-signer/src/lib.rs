// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Blind-signature service client.
//!
//! [`HttpSigner`] implements [`skus_core::Signer`] over the signing service's
//! REST API and classifies each failure as retryable or terminal.

pub mod client;
pub mod types;

pub use client::HttpSigner;
