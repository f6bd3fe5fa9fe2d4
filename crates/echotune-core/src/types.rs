// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common domain types shared across the Echotune workspace.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Platform chat identifier. Negative values are supergroups/channels,
/// positive values are users or basic groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChatId(pub i64);

impl ChatId {
    /// Whether the id belongs to a supergroup/channel.
    pub fn is_supergroup(self) -> bool {
        self.0 < 0
    }
}

impl std::fmt::Display for ChatId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Platform user identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

/// Music platform a track descriptor originates from.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Youtube,
    Spotify,
    Apple,
    JioSaavn,
    Deezer,
    SoundCloud,
    Gaana,
    DirectLink,
    Telegram,
}

/// Normalized, provider-independent track metadata.
///
/// Immutable after creation; sufficient to enqueue and re-resolve a track.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Track {
    /// Canonical URL of the track on its platform.
    pub url: String,
    /// Display title.
    pub title: String,
    /// Originating platform.
    pub platform: Platform,
    /// Provider-specific track id (video id, file id, URL for direct links).
    pub track_id: String,
    /// Duration in seconds; 0 means unknown.
    pub duration_secs: u32,
    /// Whether the track carries a video stream.
    pub is_video: bool,
    /// Thumbnail URL, when the provider exposes one.
    pub thumbnail: Option<String>,
    /// Channel / uploader display name.
    pub channel: Option<String>,
    /// Human-readable view count, as reported by the provider.
    pub views: Option<String>,
    /// Hex decryption key for protected CDN payloads.
    pub decryption_key: Option<String>,
    /// Direct CDN URL, when already resolved.
    pub cdn_url: Option<String>,
}

impl Track {
    /// Minimal descriptor with the commonly required fields.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        platform: Platform,
        track_id: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            platform,
            track_id: track_id.into(),
            duration_secs: 0,
            is_video: false,
            thumbnail: None,
            channel: None,
            views: None,
            decryption_key: None,
            cdn_url: None,
        }
    }
}

/// A track waiting in (or playing from) a chat's queue.
#[derive(Debug, Clone)]
pub struct QueueEntry {
    pub track: Track,
    /// Display name of the user who requested the track.
    pub requested_by: String,
    /// Local path or streamable URL; empty until the download step resolves it.
    pub file_path: String,
    /// Per-entry loop count applied when the entry reaches the queue head.
    pub loop_count: u32,
}

impl QueueEntry {
    pub fn new(track: Track, requested_by: impl Into<String>) -> Self {
        Self {
            track,
            requested_by: requested_by.into(),
            file_path: String::new(),
            loop_count: 0,
        }
    }
}

/// Membership status of an identity in a chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum MemberStatus {
    Member,
    Admin,
    Creator,
    Left,
    Kicked,
    Restricted,
    Unknown,
}

impl MemberStatus {
    /// Whether this status allows the identity to stream into the call.
    pub fn is_present(self) -> bool {
        matches!(
            self,
            MemberStatus::Member | MemberStatus::Admin | MemberStatus::Creator
        )
    }
}

/// Admin rights relevant to the playback core.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdminRights {
    pub can_ban_users: bool,
    pub can_invite_users: bool,
    pub can_manage_call: bool,
}

/// One entry of a chat's admin list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatAdmin {
    pub user: UserId,
    pub status: MemberStatus,
    pub rights: AdminRights,
}

/// Who may issue play / control commands in a chat.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize, Default,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AccessMode {
    #[default]
    Everyone,
    Admins,
    Auth,
}

/// A user playlist persisted in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Playlist {
    pub id: String,
    pub name: String,
    pub owner: UserId,
    pub songs: Vec<Track>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn supergroup_ids_are_negative() {
        assert!(ChatId(-1001234567890).is_supergroup());
        assert!(!ChatId(123456).is_supergroup());
    }

    #[test]
    fn platform_round_trips_through_strings() {
        for p in [
            Platform::Youtube,
            Platform::Spotify,
            Platform::JioSaavn,
            Platform::DirectLink,
            Platform::Telegram,
        ] {
            let s = p.to_string();
            assert_eq!(Platform::from_str(&s).unwrap(), p);
        }
    }

    #[test]
    fn member_status_presence() {
        assert!(MemberStatus::Member.is_present());
        assert!(MemberStatus::Creator.is_present());
        assert!(!MemberStatus::Left.is_present());
        assert!(!MemberStatus::Kicked.is_present());
        assert!(!MemberStatus::Unknown.is_present());
    }

    #[test]
    fn queue_entry_starts_without_file() {
        let entry = QueueEntry::new(
            Track::new("https://example.org/a.mp3", "A", Platform::DirectLink, "a"),
            "tester",
        );
        assert!(entry.file_path.is_empty());
        assert_eq!(entry.loop_count, 0);
    }
}
