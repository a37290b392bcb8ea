// SPDX-FileCopyrightText: 2026 Skus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence for orders and the signing outbox.
//!
//! WAL-mode SQLite with embedded refinery migrations, a single background
//! writer per connection via `tokio-rusqlite`, and conditional state updates
//! so several dispatchers can share one outbox.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStorage;
pub use database::Database;
