// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits: the chat platform, the call engine, and the store.

pub mod engine;
pub mod platform;
pub mod store;

pub use engine::{
    AudioDescription, CallEngine, CallInfo, CallStatus, EngineEvent, MediaDescription,
    StreamDevice, StreamKind, StreamType, VideoDescription,
};
pub use platform::{
    ChatInfo, FileMeta, GroupCall, Identity, JoinOutcome, MessageRef, PlatformClient,
    PlatformMessage,
};
pub use store::Store;
