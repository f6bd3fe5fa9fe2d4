// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite-backed implementation of the Echotune persistent-store seam.
//!
//! A single tokio-rusqlite connection serializes all writes; the schema is
//! created and upgraded on open via versioned migrations.

pub mod database;
pub mod migrations;
pub mod store;

pub use database::Database;
pub use store::SqliteStore;
