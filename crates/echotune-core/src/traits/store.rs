// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Persistent store seam.
//!
//! The store is an opaque key/value-ish collaborator; the core assumes only
//! the operations below. Restart durability is the store's concern, not the
//! playback core's.

use async_trait::async_trait;

use crate::error::Error;
use crate::types::{AccessMode, ChatId, Playlist, Track, UserId};

#[async_trait]
pub trait Store: Send + Sync {
    // -- registries ---------------------------------------------------------

    async fn add_chat(&self, chat: ChatId) -> Result<(), Error>;
    async fn add_user(&self, user: UserId) -> Result<(), Error>;
    async fn all_chats(&self) -> Result<Vec<ChatId>, Error>;
    async fn all_users(&self) -> Result<Vec<UserId>, Error>;

    // -- assistant assignment ----------------------------------------------

    async fn assistant(&self, chat: ChatId) -> Result<Option<String>, Error>;
    async fn set_assistant(&self, chat: ChatId, name: &str) -> Result<(), Error>;
    /// Clears every persisted assignment, returning how many were removed.
    async fn clear_all_assistants(&self) -> Result<u64, Error>;

    // -- per-chat settings --------------------------------------------------

    async fn play_mode(&self, chat: ChatId) -> Result<AccessMode, Error>;
    async fn set_play_mode(&self, chat: ChatId, mode: AccessMode) -> Result<(), Error>;
    async fn admin_mode(&self, chat: ChatId) -> Result<AccessMode, Error>;
    async fn set_admin_mode(&self, chat: ChatId, mode: AccessMode) -> Result<(), Error>;
    async fn lang(&self, chat: ChatId) -> Result<String, Error>;
    async fn set_lang(&self, chat: ChatId, lang: &str) -> Result<(), Error>;
    async fn logger_enabled(&self, bot: UserId) -> Result<bool, Error>;
    async fn set_logger_enabled(&self, bot: UserId, enabled: bool) -> Result<(), Error>;

    // -- authorized users ---------------------------------------------------

    async fn auth_users(&self, chat: ChatId) -> Result<Vec<UserId>, Error>;
    async fn add_auth_user(&self, chat: ChatId, user: UserId) -> Result<(), Error>;
    async fn remove_auth_user(&self, chat: ChatId, user: UserId) -> Result<(), Error>;
    async fn is_auth_user(&self, chat: ChatId, user: UserId) -> Result<bool, Error>;
    async fn is_admin(&self, chat: ChatId, user: UserId) -> Result<bool, Error>;

    // -- playlists ----------------------------------------------------------

    async fn create_playlist(&self, name: &str, owner: UserId) -> Result<String, Error>;
    async fn playlist(&self, id: &str) -> Result<Option<Playlist>, Error>;
    async fn user_playlists(&self, user: UserId) -> Result<Vec<Playlist>, Error>;
    async fn add_song_to_playlist(&self, id: &str, track: &Track) -> Result<(), Error>;
    async fn remove_song_from_playlist(&self, id: &str, track_id: &str) -> Result<(), Error>;
    async fn delete_playlist(&self, id: &str, owner: UserId) -> Result<bool, Error>;

    // -- rtmp ---------------------------------------------------------------

    async fn rtmp_url(&self, chat: ChatId) -> Result<Option<String>, Error>;
    async fn set_rtmp_url(&self, chat: ChatId, url: &str) -> Result<(), Error>;
}
