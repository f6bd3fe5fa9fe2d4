// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Application wiring and lifecycle.
//!
//! [`App::bootstrap`] builds the full object graph from a configuration plus
//! the two platform-side collaborators (the bot client and the assistant
//! connector). The platform binding drives the app by calling
//! [`App::handle_message`], [`App::handle_callback`], and the router hooks;
//! engine callbacks are consumed by background tasks.

use std::sync::Arc;

use echotune_cache::{AdminCache, ChatRegistry};
use echotune_calls::controller::ControllerSettings;
use echotune_calls::{
    Admission, AssistantPool, Connector, EventRouter, Gates, PlaybackController,
};
use echotune_config::EchotuneConfig;
use echotune_core::types::{ChatId, UserId};
use echotune_core::{Error, PlatformClient, Store};
use echotune_resolver::ResolverContext;
use tracing::{error, info};

use crate::commands::{parse_callback, parse_command};
use crate::dispatch::Dispatcher;

pub struct App {
    bot: Arc<dyn PlatformClient>,
    pool: Arc<AssistantPool>,
    router: Arc<EventRouter>,
    dispatcher: Dispatcher,
    store: Arc<dyn Store>,
}

impl App {
    /// Builds and starts the whole system: assistants authenticated, caches
    /// created, engine consumers spawned.
    ///
    /// Startup failures here are fatal by design; a half-started player
    /// would strand chats with a dead assistant.
    pub async fn bootstrap(
        config: &EchotuneConfig,
        bot: Arc<dyn PlatformClient>,
        connector: &dyn Connector,
        store: Arc<dyn Store>,
    ) -> Result<Arc<Self>, Error> {
        tokio::fs::create_dir_all(&config.downloads.dir)
            .await
            .map_err(|e| Error::Config(format!("cannot create downloads dir: {e}")))?;

        let pool = Arc::new(AssistantPool::new(store.clone()));
        for session in &config.assistants.session_strings {
            pool.start_client(connector, config.assistants.session_type, session)
                .await?;
        }
        info!(assistants = pool.len(), "assistant pool started");

        let admins = Arc::new(AdminCache::new());
        let admission = Arc::new(Admission::new(bot.clone(), admins.clone()));
        admission.start_sweepers();
        let registry = Arc::new(ChatRegistry::new());
        let resolver = Arc::new(ResolverContext::new(
            config.sources.clone(),
            config.downloads.clone(),
            Some(bot.clone()),
        ));

        let controller = PlaybackController::new(
            registry,
            pool.clone(),
            admission,
            resolver,
            store.clone(),
            bot.clone(),
            ControllerSettings {
                duration_limit: config.downloads.song_duration_limit,
                logger_id: config.bot.logger_id,
            },
        );

        let gates = Arc::new(Gates::new(store.clone(), admins.clone(), bot.clone()));
        let dispatcher = Dispatcher::new(
            controller.clone(),
            gates,
            store.clone(),
            config.downloads.max_file_size,
        );

        let router = EventRouter::new(
            controller,
            pool.clone(),
            admins,
            store.clone(),
            bot.clone(),
            config.bot.logger_id,
        );
        router.clone().spawn_engine_consumers();

        Ok(Arc::new(Self {
            bot,
            pool,
            router,
            dispatcher,
            store,
        }))
    }

    pub fn router(&self) -> &Arc<EventRouter> {
        &self.router
    }

    pub fn store(&self) -> &Arc<dyn Store> {
        &self.store
    }

    /// One inbound chat message. Returns the reply to send, if the message
    /// was a command for this bot.
    pub async fn handle_message(
        &self,
        chat: ChatId,
        user: UserId,
        display_name: &str,
        text: &str,
    ) -> Option<String> {
        self.handle_message_with_reply(chat, user, display_name, text, None)
            .await
    }

    /// As [`handle_message`], with the implicit arguments a reply supplies.
    pub async fn handle_message_with_reply(
        &self,
        chat: ChatId,
        user: UserId,
        display_name: &str,
        text: &str,
        reply: Option<&crate::dispatch::ReplyContext>,
    ) -> Option<String> {
        let bot_username = self.bot.me().username;
        match parse_command(text, &bot_username)? {
            Ok(command) => {
                if let Err(e) = self.store.add_user(user).await {
                    tracing::debug!(error = %e, "user registration failed");
                }
                Some(
                    self.dispatcher
                        .dispatch(chat, user, display_name, command, reply)
                        .await,
                )
            }
            Err(usage) => Some(usage),
        }
    }

    /// One inbound inline-button callback. Returns the answer text.
    pub async fn handle_callback(
        &self,
        chat: ChatId,
        user: UserId,
        display_name: &str,
        data: &str,
    ) -> Option<String> {
        let action = parse_callback(data)?;
        Some(
            self.dispatcher
                .dispatch_callback(chat, user, display_name, action)
                .await,
        )
    }

    /// Graceful teardown: every engine first, then every client.
    pub async fn shutdown(&self) {
        info!("shutting down assistant pool");
        self.pool.stop_all().await;
        self.bot.close().await;
    }
}

/// `echotune serve` without a platform binding linked in.
///
/// The MTProto client and the native call engine live outside this
/// repository; a deployment links them and calls [`App::bootstrap`] with its
/// own `PlatformClient`/`Connector` pair.
pub async fn serve(config: EchotuneConfig) -> Result<(), Error> {
    let store = echotune_storage::SqliteStore::open(&config.storage.database_path).await?;
    store.close().await?;

    error!(
        "no platform binding is linked into this build; \
         embed echotune and call App::bootstrap with your client"
    );
    Err(Error::Config(
        "platform binding missing; see serve module docs".into(),
    ))
}
