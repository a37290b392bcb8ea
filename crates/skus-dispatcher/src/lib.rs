// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Signing job dispatcher.
//!
//! Each tick claims a bounded batch of pending outbox entries, has the
//! external signer sign them and writes the results back. Several dispatchers
//! may share one outbox; the store's atomic claim keeps them from signing the
//! same entry twice.

pub mod dispatcher;
pub mod retry;

pub use dispatcher::{DispatchReport, SigningDispatcher};
pub use retry::{Disposition, disposition};
