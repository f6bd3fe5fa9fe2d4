// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Time-bounded caches and per-chat playback state.
//!
//! The playback registry serializes all mutations per chat; the TTL caches
//! back the membership, invite-link, and admin-list views with lazy expiry
//! and an optional periodic sweep.

pub mod admins;
pub mod playback;
pub mod ttl;

pub use admins::AdminCache;
pub use playback::{ChatPlayback, ChatRegistry};
pub use ttl::{spawn_sweeper, TtlCache};
