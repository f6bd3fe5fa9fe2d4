// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-assistant engine handle.
//!
//! Wraps the native engine with the input-group-call cache: the platform
//! fetch happens outside the lock, and the result is committed under the
//! write lock with a re-check so concurrent resolvers agree on one value.

use std::collections::HashMap;
use std::sync::Arc;

use echotune_core::traits::engine::{
    CallEngine, CallInfo, EngineEvent, MediaDescription, StreamKind,
};
use echotune_core::traits::platform::GroupCall;
use echotune_core::types::ChatId;
use echotune_core::{Error, PlatformClient};
use tokio::sync::{broadcast, RwLock};
use tracing::debug;

pub struct EngineHandle {
    engine: Arc<dyn CallEngine>,
    client: Arc<dyn PlatformClient>,
    group_calls: RwLock<HashMap<i64, GroupCall>>,
}

impl EngineHandle {
    pub fn new(engine: Arc<dyn CallEngine>, client: Arc<dyn PlatformClient>) -> Self {
        Self {
            engine,
            client,
            group_calls: RwLock::new(HashMap::new()),
        }
    }

    pub fn engine(&self) -> &Arc<dyn CallEngine> {
        &self.engine
    }

    /// The chat's group call, cached across plays.
    pub async fn resolve_group_call(&self, chat: ChatId) -> Result<GroupCall, Error> {
        {
            let cache = self.group_calls.read().await;
            if let Some(call) = cache.get(&chat.0) {
                return Ok(*call);
            }
        }

        // Network fetch outside any lock.
        let fetched = self.client.group_call(chat).await?.ok_or_else(|| {
            Error::EngineFailed {
                message: format!("no active voice chat in {chat}"),
                source: None,
            }
        })?;

        let mut cache = self.group_calls.write().await;
        // Another task may have resolved it while we fetched; first one wins.
        Ok(*cache.entry(chat.0).or_insert(fetched))
    }

    /// Drops the cached group call, e.g. when the voice chat ends.
    pub async fn invalidate_group_call(&self, chat: ChatId) {
        self.group_calls.write().await.remove(&chat.0);
    }

    /// Streams `media` into the chat: a live call gets its sources replaced,
    /// otherwise a fresh connect is made.
    pub async fn play(&self, chat: ChatId, media: MediaDescription) -> Result<(), Error> {
        if self.engine.calls().contains_key(&chat) {
            debug!(chat_id = chat.0, "replacing stream sources on live call");
            return self
                .engine
                .set_stream_sources(chat, StreamKind::Capture, media)
                .await;
        }

        if chat.is_supergroup() {
            self.resolve_group_call(chat).await?;
        }
        self.engine.play(chat, media).await
    }

    pub async fn stop(&self, chat: ChatId) -> Result<(), Error> {
        self.engine.stop(chat).await
    }

    pub async fn pause(&self, chat: ChatId) -> Result<bool, Error> {
        self.engine.pause(chat).await
    }

    pub async fn resume(&self, chat: ChatId) -> Result<bool, Error> {
        self.engine.resume(chat).await
    }

    pub async fn mute(&self, chat: ChatId) -> Result<bool, Error> {
        self.engine.mute(chat).await
    }

    pub async fn unmute(&self, chat: ChatId) -> Result<bool, Error> {
        self.engine.unmute(chat).await
    }

    pub async fn played_time(&self, chat: ChatId) -> Result<u64, Error> {
        self.engine.played_time(chat).await
    }

    pub fn calls(&self) -> HashMap<ChatId, CallInfo> {
        self.engine.calls()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.engine.subscribe()
    }

    pub async fn close(&self) {
        self.engine.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echotune_test_utils::{MockEngine, MockPlatform};

    fn handle() -> (Arc<MockEngine>, Arc<MockPlatform>, EngineHandle) {
        let engine = Arc::new(MockEngine::new());
        let client = Arc::new(MockPlatform::new(900, "assistant", false));
        let h = EngineHandle::new(engine.clone(), client.clone());
        (engine, client, h)
    }

    #[tokio::test]
    async fn group_call_is_fetched_once() {
        let (_, client, handle) = handle();
        let chat = ChatId(-100);
        client.set_group_call(chat, GroupCall { id: 7, access_hash: 8 });

        let first = handle.resolve_group_call(chat).await.unwrap();
        let second = handle.resolve_group_call(chat).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.group_call_fetches(), 1);
    }

    #[tokio::test]
    async fn invalidate_forces_refetch() {
        let (_, client, handle) = handle();
        let chat = ChatId(-100);
        client.set_group_call(chat, GroupCall { id: 7, access_hash: 8 });

        handle.resolve_group_call(chat).await.unwrap();
        handle.invalidate_group_call(chat).await;
        handle.resolve_group_call(chat).await.unwrap();
        assert_eq!(client.group_call_fetches(), 2);
    }

    #[tokio::test]
    async fn missing_voice_chat_fails_play() {
        let (engine, _, handle) = handle();
        let chat = ChatId(-100);
        let err = handle.play(chat, MediaDescription::default()).await;
        assert!(err.is_err());
        assert!(engine.play_history().is_empty());
    }

    #[tokio::test]
    async fn second_play_replaces_sources() {
        let (engine, client, handle) = handle();
        let chat = ChatId(-100);
        client.set_group_call(chat, GroupCall { id: 7, access_hash: 8 });

        handle.play(chat, MediaDescription::default()).await.unwrap();
        assert_eq!(engine.play_history().len(), 1);

        handle.play(chat, MediaDescription::default()).await.unwrap();
        assert_eq!(engine.play_history().len(), 1);
        assert_eq!(engine.source_update_history().len(), 1);
    }
}
