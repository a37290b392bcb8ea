// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for SKUs integration tests.
//!
//! Provides a scripted signer, order fixtures and a harness that wires the
//! issuer, retriever and dispatcher over a temporary SQLite database.

pub mod fixtures;
pub mod harness;
pub mod mock_signer;

pub use fixtures::{OrderFixture, blinded_creds};
pub use harness::{TestHarness, TestHarnessBuilder};
pub use mock_signer::{MockSigner, SignCall};
