// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Echotune playback core.

use std::time::Duration;

use thiserror::Error;

/// The primary error type used across all Echotune crates and collaborator traits.
///
/// Variants surfaced to operators are rendered through localized reply text by
/// the command layer; raw library messages never reach the chat.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Session-string or login failures while starting an assistant client.
    #[error("authentication error: {0}")]
    Auth(String),

    /// The acting user does not pass the chat's play-mode/admin-mode gate.
    #[error("permission denied: {0}")]
    PermissionDenied(String),

    /// The chat is a basic group or private chat, not a supergroup.
    #[error("chat {0} is not a supergroup")]
    ChatNotSupergroup(i64),

    /// The assistant pool is empty.
    #[error("no assistant client is available")]
    AssistantUnavailable,

    /// The assistant is banned from the chat and cannot be unbanned.
    #[error("assistant {user} is banned from chat {chat}")]
    AssistantBanned { chat: i64, user: i64 },

    /// No invite link could be fetched or exported for the chat.
    #[error("no invite link available for chat {0}")]
    InviteLinkUnavailable(i64),

    /// The query is not a URL or search term any source provider accepts.
    #[error("unsupported input: {0}")]
    ResolverInvalidInput(String),

    /// The provider returned no results for the query.
    #[error("no results found for {0}")]
    ResolverNotFound(String),

    /// A provider, CDN, or external downloader failed to produce a local file.
    #[error("download failed: {message}")]
    DownloadFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// ffmpeg/ffprobe invocation failed.
    #[error("transcode failed: {0}")]
    TranscodeFailed(String),

    /// The native call engine rejected an operation.
    #[error("engine error: {message}")]
    EngineFailed {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The per-chat queue already holds the maximum number of entries.
    #[error("queue is full (max {0} tracks)")]
    QueueFull(usize),

    /// The track is already queued or playing in this chat.
    #[error("track already queued: {0}")]
    DuplicateTrack(String),

    /// The platform asked the caller to wait before retrying.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    /// Operation was cancelled cooperatively.
    #[error("operation cancelled")]
    Cancelled,

    /// Chat-platform transport errors not covered by a more specific kind.
    #[error("platform error: {message}")]
    Platform {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Persistent store errors (connection, query, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },
}

impl Error {
    /// Shorthand for a [`Error::Platform`] without an underlying cause.
    pub fn platform(message: impl Into<String>) -> Self {
        Error::Platform {
            message: message.into(),
            source: None,
        }
    }

    /// Shorthand for a [`Error::DownloadFailed`] without an underlying cause.
    pub fn download(message: impl Into<String>) -> Self {
        Error::DownloadFailed {
            message: message.into(),
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_never_leaks_source_debug() {
        let err = Error::DownloadFailed {
            message: "cdn returned 403".into(),
            source: Some(Box::new(std::io::Error::other("raw io detail"))),
        };
        let rendered = err.to_string();
        assert!(rendered.contains("cdn returned 403"));
        assert!(!rendered.contains("raw io detail"));
    }

    #[test]
    fn rate_limited_carries_duration() {
        let err = Error::RateLimited {
            retry_after: Duration::from_secs(17),
        };
        assert!(err.to_string().contains("17"));
    }
}
