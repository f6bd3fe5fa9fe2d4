// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Native call-engine seam.
//!
//! The engine performs the WebRTC connection, SRTP transport, and media
//! mixing; the core drives it through this narrow surface and consumes its
//! callbacks as [`EngineEvent`]s on a broadcast channel.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::broadcast;

use crate::error::Error;
use crate::types::ChatId;

/// Which direction of the call a stream source belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamKind {
    Capture,
    Playback,
}

/// Media kind reported by engine callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamType {
    Audio,
    Video,
}

/// Device slot a stream source is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamDevice {
    Microphone,
    Camera,
    Screen,
}

/// Shell-sourced PCM audio description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioDescription {
    /// Full transcoder command line writing s16le PCM to stdout.
    pub input: String,
    pub sample_rate: u32,
    pub channels: u8,
}

/// Shell-sourced raw-video description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoDescription {
    /// Full transcoder command line writing rawvideo yuv420p to stdout.
    pub input: String,
    pub width: u16,
    pub height: u16,
    pub fps: u8,
}

/// Complete per-call media description consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaDescription {
    pub microphone: Option<AudioDescription>,
    pub camera: Option<VideoDescription>,
    pub screen: Option<VideoDescription>,
}

/// Playback status of one live call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Playing,
    Paused,
    Idle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CallInfo {
    pub status: CallStatus,
}

/// Callbacks the engine raises, fanned out to the event router.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    /// A configured source reached EOF of its transcoder pipe.
    StreamEnd {
        chat: ChatId,
        stream_type: StreamType,
        device: StreamDevice,
    },
    /// A user is calling the assistant directly.
    IncomingCall { chat: ChatId },
}

/// One engine instance, owned by exactly one assistant.
///
/// `play`/`stop` are locally non-blocking by contract (the native library
/// enqueues); all network and process I/O happens before or after them.
#[async_trait]
pub trait CallEngine: Send + Sync {
    /// Start streaming `media` into the chat's voice call, connecting first
    /// when no call is live yet.
    async fn play(&self, chat: ChatId, media: MediaDescription) -> Result<(), Error>;

    /// Replace the sources of an already-connected call.
    async fn set_stream_sources(
        &self,
        chat: ChatId,
        kind: StreamKind,
        media: MediaDescription,
    ) -> Result<(), Error>;

    async fn stop(&self, chat: ChatId) -> Result<(), Error>;

    async fn pause(&self, chat: ChatId) -> Result<bool, Error>;

    async fn resume(&self, chat: ChatId) -> Result<bool, Error>;

    async fn mute(&self, chat: ChatId) -> Result<bool, Error>;

    async fn unmute(&self, chat: ChatId) -> Result<bool, Error>;

    /// Elapsed playback time of the chat's current stream, in seconds.
    async fn played_time(&self, chat: ChatId) -> Result<u64, Error>;

    /// Currently connected calls.
    fn calls(&self) -> HashMap<ChatId, CallInfo>;

    /// Subscribe to engine callbacks.
    fn subscribe(&self) -> broadcast::Receiver<EngineEvent>;

    /// Tear the instance down; called once at shutdown.
    async fn close(&self);
}
