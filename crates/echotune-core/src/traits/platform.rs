// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat-platform client seam.
//!
//! The MTProto client library is out of scope; the core consumes it through
//! this trait only. Both the primary bot identity and every assistant
//! identity are represented by one implementation each.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::Error;
use crate::types::{ChatAdmin, ChatId, MemberStatus, UserId};

/// The authenticated identity behind a client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub id: UserId,
    pub username: String,
    pub is_bot: bool,
}

/// Reference to a message the client sent or resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageRef {
    pub chat: ChatId,
    pub id: i64,
}

/// Metadata of a file attached to a platform message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileMeta {
    /// Provider-stable file id, used as the duplicate-suppression key.
    pub file_id: String,
    pub name: String,
    pub size: u64,
    /// Duration in seconds from the document attributes; 0 if absent.
    pub duration_secs: u32,
}

/// A platform message resolved from a `t.me`-style URL or a reply.
#[derive(Debug, Clone)]
pub struct PlatformMessage {
    pub reference: MessageRef,
    pub link: String,
    pub file: Option<FileMeta>,
}

/// Summary information about a chat.
#[derive(Debug, Clone)]
pub struct ChatInfo {
    pub id: ChatId,
    pub title: String,
    pub username: Option<String>,
    pub is_supergroup: bool,
}

/// Reference to a chat's active group call, as resolved from the full chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GroupCall {
    pub id: i64,
    pub access_hash: i64,
}

/// Recognized outcomes of a join attempt via invite link.
///
/// Transport failures are errors; these are the protocol-level answers the
/// admission logic branches on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JoinOutcome {
    Joined,
    /// The chat requires approval; a join request is now pending.
    RequestSent,
    AlreadyParticipant,
    InviteExpired,
    /// The chat is private/inaccessible for this identity.
    ChannelPrivate,
}

/// Narrow client surface the playback core needs from the chat platform.
///
/// Implementations must map platform flood-wait errors to
/// [`Error::RateLimited`] so callers can apply the sleep-and-retry policy.
#[async_trait]
pub trait PlatformClient: Send + Sync {
    /// The identity this client is authenticated as.
    fn me(&self) -> Identity;

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageRef, Error>;

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), Error>;

    /// Membership status of `user` in `chat`. `Left` when the platform
    /// reports the user as not a participant.
    async fn chat_member(&self, chat: ChatId, user: UserId) -> Result<MemberStatus, Error>;

    /// Full admin list of the chat.
    async fn chat_admins(&self, chat: ChatId) -> Result<Vec<ChatAdmin>, Error>;

    async fn chat_info(&self, chat: ChatId) -> Result<ChatInfo, Error>;

    /// The chat's already-exported primary invite link, if any.
    async fn invite_link(&self, chat: ChatId) -> Result<Option<String>, Error>;

    /// Export a fresh invite link titled `title`, without join approval.
    async fn export_invite_link(&self, chat: ChatId, title: &str) -> Result<String, Error>;

    /// Join the chat behind `invite_link` as this identity.
    async fn join_chat(&self, invite_link: &str) -> Result<JoinOutcome, Error>;

    /// Approve-or-discard a pending join request using admin power.
    async fn hide_join_request(&self, chat: ChatId, user: UserId) -> Result<(), Error>;

    /// Lift a ban (`unban`) and/or a mute (`unmute`) on `user`.
    async fn edit_banned(
        &self,
        chat: ChatId,
        user: UserId,
        unban: bool,
        unmute: bool,
    ) -> Result<(), Error>;

    async fn leave_chat(&self, chat: ChatId) -> Result<(), Error>;

    /// Resolve a `https://t.me/<username>/<id>` or `/c/<chatid>/<id>` URL
    /// into a message handle.
    async fn resolve_message(&self, url: &str) -> Result<PlatformMessage, Error>;

    /// Download a message attachment to `dest`. Never buffers to memory.
    async fn download_file(&self, file: &FileMeta, dest: &Path) -> Result<PathBuf, Error>;

    /// The chat's active group call, or `None` when no voice chat is live.
    async fn group_call(&self, chat: ChatId) -> Result<Option<GroupCall>, Error>;

    /// Disconnect and release the session.
    async fn close(&self);
}
