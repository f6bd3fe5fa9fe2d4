// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Echotune binary crate library surface.
//!
//! Exposes the command parser, the dispatcher, and the application wiring so
//! platform bindings (and the integration tests) can embed the player.

pub mod commands;
pub mod dispatch;
pub mod serve;

pub use dispatch::ReplyContext;
pub use serve::App;
