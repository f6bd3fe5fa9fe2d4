// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Echotune voice-chat music player.
//!
//! This crate provides the error type, the domain model (tracks, queues,
//! membership), and the trait seams through which the playback core consumes
//! its three out-of-scope collaborators: the chat-platform client, the native
//! call engine, and the persistent store.

pub mod error;
pub mod traits;
pub mod types;
pub mod util;

pub use error::Error;
pub use traits::{CallEngine, PlatformClient, Store};
pub use types::{AccessMode, ChatId, MemberStatus, Platform, QueueEntry, Track, UserId};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collaborator_traits_are_object_safe() {
        fn _platform(_: &dyn PlatformClient) {}
        fn _engine(_: &dyn CallEngine) {}
        fn _store(_: &dyn Store) {}
    }

    #[test]
    fn error_kinds_cover_the_catalog() {
        // One constructor per user-visible kind; keeps the catalog honest.
        let _ = Error::Config("x".into());
        let _ = Error::Auth("x".into());
        let _ = Error::PermissionDenied("x".into());
        let _ = Error::ChatNotSupergroup(1);
        let _ = Error::AssistantUnavailable;
        let _ = Error::AssistantBanned { chat: 1, user: 2 };
        let _ = Error::InviteLinkUnavailable(1);
        let _ = Error::ResolverInvalidInput("x".into());
        let _ = Error::ResolverNotFound("x".into());
        let _ = Error::download("x");
        let _ = Error::TranscodeFailed("x".into());
        let _ = Error::QueueFull(10);
        let _ = Error::DuplicateTrack("x".into());
        let _ = Error::Cancelled;
    }
}
