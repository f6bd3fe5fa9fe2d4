// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock call engine for deterministic testing.
//!
//! Records every operation and lets tests raise engine events by hand.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use echotune_core::traits::engine::{
    CallEngine, CallInfo, CallStatus, EngineEvent, MediaDescription, StreamDevice, StreamKind,
    StreamType,
};
use echotune_core::types::ChatId;
use echotune_core::Error;
use tokio::sync::broadcast;

pub struct MockEngine {
    calls: Mutex<HashMap<i64, CallInfo>>,
    plays: Mutex<Vec<(i64, MediaDescription)>>,
    source_updates: Mutex<Vec<(i64, MediaDescription)>>,
    played_time: Mutex<HashMap<i64, u64>>,
    stops: AtomicU32,
    fail_play: AtomicBool,
    events: broadcast::Sender<EngineEvent>,
    closed: AtomicBool,
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            calls: Mutex::new(HashMap::new()),
            plays: Mutex::new(Vec::new()),
            source_updates: Mutex::new(Vec::new()),
            played_time: Mutex::new(HashMap::new()),
            stops: AtomicU32::new(0),
            fail_play: AtomicBool::new(false),
            events,
            closed: AtomicBool::new(false),
        }
    }

    fn lock<'a, T>(mutex: &'a Mutex<T>) -> std::sync::MutexGuard<'a, T> {
        mutex.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- scripting ----------------------------------------------------------

    /// Make subsequent `play` calls fail.
    pub fn fail_next_plays(&self, fail: bool) {
        self.fail_play.store(fail, Ordering::SeqCst);
    }

    pub fn set_played_time(&self, chat: ChatId, seconds: u64) {
        Self::lock(&self.played_time).insert(chat.0, seconds);
    }

    /// Raises a stream-end callback as the native engine would.
    pub fn emit_stream_end(&self, chat: ChatId, stream_type: StreamType) {
        let _ = self.events.send(EngineEvent::StreamEnd {
            chat,
            stream_type,
            device: match stream_type {
                StreamType::Audio => StreamDevice::Microphone,
                StreamType::Video => StreamDevice::Camera,
            },
        });
    }

    pub fn emit_incoming_call(&self, chat: ChatId) {
        let _ = self.events.send(EngineEvent::IncomingCall { chat });
    }

    // -- captured operations ------------------------------------------------

    pub fn play_history(&self) -> Vec<(i64, MediaDescription)> {
        Self::lock(&self.plays).clone()
    }

    pub fn source_update_history(&self) -> Vec<(i64, MediaDescription)> {
        Self::lock(&self.source_updates).clone()
    }

    pub fn stop_count(&self) -> u32 {
        self.stops.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CallEngine for MockEngine {
    async fn play(&self, chat: ChatId, media: MediaDescription) -> Result<(), Error> {
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::EngineFailed {
                message: "play disabled by test".into(),
                source: None,
            });
        }
        Self::lock(&self.plays).push((chat.0, media));
        Self::lock(&self.calls).insert(
            chat.0,
            CallInfo {
                status: CallStatus::Playing,
            },
        );
        Ok(())
    }

    async fn set_stream_sources(
        &self,
        chat: ChatId,
        _kind: StreamKind,
        media: MediaDescription,
    ) -> Result<(), Error> {
        if self.fail_play.load(Ordering::SeqCst) {
            return Err(Error::EngineFailed {
                message: "play disabled by test".into(),
                source: None,
            });
        }
        Self::lock(&self.source_updates).push((chat.0, media));
        Ok(())
    }

    async fn stop(&self, chat: ChatId) -> Result<(), Error> {
        self.stops.fetch_add(1, Ordering::SeqCst);
        Self::lock(&self.calls).remove(&chat.0);
        Ok(())
    }

    async fn pause(&self, chat: ChatId) -> Result<bool, Error> {
        let mut calls = Self::lock(&self.calls);
        match calls.get_mut(&chat.0) {
            Some(info) => {
                info.status = CallStatus::Paused;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn resume(&self, chat: ChatId) -> Result<bool, Error> {
        let mut calls = Self::lock(&self.calls);
        match calls.get_mut(&chat.0) {
            Some(info) => {
                info.status = CallStatus::Playing;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn mute(&self, chat: ChatId) -> Result<bool, Error> {
        Ok(Self::lock(&self.calls).contains_key(&chat.0))
    }

    async fn unmute(&self, chat: ChatId) -> Result<bool, Error> {
        Ok(Self::lock(&self.calls).contains_key(&chat.0))
    }

    async fn played_time(&self, chat: ChatId) -> Result<u64, Error> {
        Ok(Self::lock(&self.played_time)
            .get(&chat.0)
            .copied()
            .unwrap_or(0))
    }

    fn calls(&self) -> HashMap<ChatId, CallInfo> {
        Self::lock(&self.calls)
            .iter()
            .map(|(id, info)| (ChatId(*id), *info))
            .collect()
    }

    fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
