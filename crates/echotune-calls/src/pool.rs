// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assistant pool: authenticated secondary identities and their engines.
//!
//! Each assistant is created once at startup from a configured session
//! string and lives until shutdown. Chats are pinned to one assistant; a
//! persisted assignment wins, otherwise one is picked uniformly at random
//! and persisted.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use echotune_config::model::SessionEncoding;
use echotune_core::types::ChatId;
use echotune_core::{CallEngine, Error, PlatformClient, Store};
use rand::Rng;
use tracing::{info, warn};

use crate::engine::EngineHandle;
use crate::sessions::{decode_session, SessionInfo};

/// Builds the live client + engine pair for a decoded session.
///
/// The MTProto binding lives outside this repository; tests plug in mocks.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        session: &SessionInfo,
    ) -> Result<(Arc<dyn PlatformClient>, Arc<dyn CallEngine>), Error>;
}

/// One authenticated assistant identity.
pub struct Assistant {
    pub name: String,
    pub client: Arc<dyn PlatformClient>,
    pub handle: EngineHandle,
}

impl Assistant {
    pub fn user_id(&self) -> echotune_core::UserId {
        self.client.me().id
    }
}

pub struct AssistantPool {
    assistants: RwLock<Vec<Arc<Assistant>>>,
    counter: AtomicU32,
    store: Arc<dyn Store>,
}

impl AssistantPool {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            assistants: RwLock::new(Vec::new()),
            counter: AtomicU32::new(1),
            store,
        }
    }

    fn snapshot(&self) -> Vec<Arc<Assistant>> {
        self.assistants
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn len(&self) -> usize {
        self.assistants
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn names(&self) -> Vec<String> {
        self.snapshot().iter().map(|a| a.name.clone()).collect()
    }

    pub fn get(&self, name: &str) -> Option<Arc<Assistant>> {
        self.snapshot().into_iter().find(|a| a.name == name)
    }

    /// Authenticates one session string and adds the identity to the pool.
    ///
    /// Bot identities are rejected and their handles torn down; only user
    /// accounts can join voice chats.
    pub async fn start_client(
        &self,
        connector: &dyn Connector,
        encoding: SessionEncoding,
        session_string: &str,
    ) -> Result<Arc<Assistant>, Error> {
        let name = format!("client{}", self.counter.fetch_add(1, Ordering::SeqCst));
        let session = decode_session(encoding, session_string)?;

        if session.is_bot == Some(true) {
            return Err(Error::Auth(format!(
                "session for {name} belongs to a bot account"
            )));
        }

        let (client, engine) = connector.connect(&session).await?;

        if client.me().is_bot {
            engine.close().await;
            client.close().await;
            return Err(Error::Auth(format!("the client {name} is a bot")));
        }

        let assistant = Arc::new(Assistant {
            name: name.clone(),
            client: client.clone(),
            handle: EngineHandle::new(engine, client),
        });

        self.assistants
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .push(assistant.clone());

        info!(name, user_id = assistant.user_id().0, "assistant client started");
        Ok(assistant)
    }

    /// The assistant pinned to `chat`.
    ///
    /// A persisted assignment naming a live assistant wins; otherwise one is
    /// picked uniformly at random and the choice persisted. Idempotent under
    /// a fixed pool once persisted.
    pub async fn select(&self, chat: ChatId) -> Result<Arc<Assistant>, Error> {
        let assistants = self.snapshot();
        if assistants.is_empty() {
            return Err(Error::AssistantUnavailable);
        }

        match self.store.assistant(chat).await {
            Ok(Some(name)) => {
                if let Some(assistant) = assistants.iter().find(|a| a.name == name) {
                    return Ok(assistant.clone());
                }
            }
            Ok(None) => {}
            Err(e) => warn!(chat_id = chat.0, error = %e, "assistant lookup failed"),
        }

        let index = rand::thread_rng().gen_range(0..assistants.len());
        let chosen = assistants[index].clone();

        if let Err(e) = self.store.set_assistant(chat, &chosen.name).await {
            warn!(chat_id = chat.0, error = %e, "persisting assistant assignment failed");
        } else {
            info!(chat_id = chat.0, assistant = chosen.name, "assistant assigned");
        }

        Ok(chosen)
    }

    /// Closes every engine, then every client. Called once at shutdown.
    pub async fn stop_all(&self) {
        for assistant in self.snapshot() {
            assistant.handle.close().await;
            info!(name = assistant.name, "stopping assistant client");
            assistant.client.close().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echotune_test_utils::{MemoryStore, MockEngine, MockPlatform};

    struct MockConnector {
        is_bot: bool,
    }

    #[async_trait]
    impl Connector for MockConnector {
        async fn connect(
            &self,
            _session: &SessionInfo,
        ) -> Result<(Arc<dyn PlatformClient>, Arc<dyn CallEngine>), Error> {
            let client = Arc::new(MockPlatform::new(900, "assistant", self.is_bot));
            let engine = Arc::new(MockEngine::new());
            Ok((client, engine))
        }
    }

    async fn pool_with(n: usize) -> (AssistantPool, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let pool = AssistantPool::new(store.clone());
        let connector = MockConnector { is_bot: false };
        for _ in 0..n {
            pool.start_client(&connector, SessionEncoding::Native, "session")
                .await
                .unwrap();
        }
        (pool, store)
    }

    #[tokio::test]
    async fn empty_pool_fails_selection() {
        let (pool, _) = pool_with(0).await;
        assert!(matches!(
            pool.select(ChatId(-1)).await,
            Err(Error::AssistantUnavailable)
        ));
    }

    #[tokio::test]
    async fn selection_is_stable_per_chat() {
        let (pool, _) = pool_with(3).await;
        let chat = ChatId(-1);
        let first = pool.select(chat).await.unwrap();
        for _ in 0..10 {
            let again = pool.select(chat).await.unwrap();
            assert_eq!(again.name, first.name);
        }
    }

    #[tokio::test]
    async fn persisted_assignment_wins() {
        let (pool, store) = pool_with(3).await;
        let chat = ChatId(-5);
        store.set_assistant(chat, "client2").await.unwrap();
        let selected = pool.select(chat).await.unwrap();
        assert_eq!(selected.name, "client2");
    }

    #[tokio::test]
    async fn stale_assignment_is_replaced_and_persisted() {
        let (pool, store) = pool_with(2).await;
        let chat = ChatId(-6);
        store.set_assistant(chat, "client99").await.unwrap();

        let selected = pool.select(chat).await.unwrap();
        assert_ne!(selected.name, "client99");
        assert_eq!(
            store.assistant(chat).await.unwrap().as_deref(),
            Some(selected.name.as_str())
        );
    }

    #[tokio::test]
    async fn bot_identities_are_rejected() {
        let store = Arc::new(MemoryStore::new());
        let pool = AssistantPool::new(store);
        let connector = MockConnector { is_bot: true };
        let result = pool
            .start_client(&connector, SessionEncoding::Native, "session")
            .await;
        assert!(matches!(result, Err(Error::Auth(_))));
        assert!(pool.is_empty());
    }

    #[tokio::test]
    async fn names_are_sequential() {
        let (pool, _) = pool_with(2).await;
        assert_eq!(pool.names(), vec!["client1", "client2"]);
    }
}
