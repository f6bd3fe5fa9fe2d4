// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Event router.
//!
//! Fans engine callbacks and platform updates out to the controller and the
//! caches. The router holds a controller handle; the controller never calls
//! back into the router.

use std::sync::Arc;
use std::time::Duration;

use echotune_core::traits::engine::{EngineEvent, StreamType};
use echotune_core::traits::platform::ChatInfo;
use echotune_core::types::{ChatId, MemberStatus, UserId};
use echotune_cache::AdminCache;
use echotune_core::{PlatformClient, Store};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::controller::PlaybackController;
use crate::pool::AssistantPool;

/// Stream played into a private call when someone rings the assistant.
pub const DEFAULT_STREAM_URL: &str = "https://t.me/FallenSongs/1295";

/// Classified participant transition, derived from (old, new) status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParticipantChange {
    Joined,
    LeftOrKicked,
    Banned,
    Unbanned,
    Promoted,
    Demoted,
    Other,
}

/// Classifies an (old, new) membership pair.
pub fn classify_change(old: MemberStatus, new: MemberStatus) -> ParticipantChange {
    use MemberStatus::*;
    match (old, new) {
        (Left, Member) | (Left, Admin) => ParticipantChange::Joined,
        (Member, Left) | (Admin, Left) => ParticipantChange::LeftOrKicked,
        (_, Kicked) => ParticipantChange::Banned,
        (Kicked, Left) => ParticipantChange::Unbanned,
        (old, Admin) if old != Admin => ParticipantChange::Promoted,
        (Admin, new) if new != Admin => ParticipantChange::Demoted,
        _ => ParticipantChange::Other,
    }
}

/// A platform participant update, as delivered by the client binding.
#[derive(Debug, Clone)]
pub struct ParticipantUpdate {
    pub chat: ChatId,
    pub user: UserId,
    pub old: MemberStatus,
    pub new: MemberStatus,
}

pub struct EventRouter {
    controller: Arc<PlaybackController>,
    pool: Arc<AssistantPool>,
    admins: Arc<AdminCache>,
    store: Arc<dyn Store>,
    bot: Arc<dyn PlatformClient>,
    logger_id: i64,
}

impl EventRouter {
    pub fn new(
        controller: Arc<PlaybackController>,
        pool: Arc<AssistantPool>,
        admins: Arc<AdminCache>,
        store: Arc<dyn Store>,
        bot: Arc<dyn PlatformClient>,
        logger_id: i64,
    ) -> Arc<Self> {
        Arc::new(Self {
            controller,
            pool,
            admins,
            store,
            bot,
            logger_id,
        })
    }

    /// Spawns one consumer task per assistant engine. Tasks end when the
    /// engines close their event channels.
    pub fn spawn_engine_consumers(self: Arc<Self>) {
        for name in self.pool.names() {
            let Some(assistant) = self.pool.get(&name) else {
                continue;
            };
            let mut events = assistant.handle.subscribe();
            let router = self.clone();
            tokio::spawn(async move {
                loop {
                    match events.recv().await {
                        Ok(event) => router.handle_engine_event(event).await,
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            warn!(missed, "engine event consumer lagged");
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            });
        }
    }

    /// One engine callback.
    pub async fn handle_engine_event(&self, event: EngineEvent) {
        match event {
            EngineEvent::StreamEnd {
                chat, stream_type, ..
            } => self.on_stream_end(chat, stream_type).await,
            EngineEvent::IncomingCall { chat } => self.on_incoming_call(chat).await,
        }
    }

    /// Audio stream-end drives queue progression; video end is ignored so a
    /// track with both streams advances exactly once.
    pub async fn on_stream_end(&self, chat: ChatId, stream_type: StreamType) {
        info!(chat_id = chat.0, ?stream_type, "stream ended");
        if stream_type == StreamType::Video {
            debug!(chat_id = chat.0, "ignoring video stream end");
            return;
        }

        if let Err(e) = self.controller.play_next(chat).await {
            warn!(chat_id = chat.0, error = %e, "queue advance failed");
        }
    }

    /// Someone rang the assistant directly: answer with a canned line and a
    /// default stream fetched from the pinned songs channel.
    pub async fn on_incoming_call(&self, chat: ChatId) {
        let _ = self
            .bot
            .send_message(chat, "Are you calling me? Let me play a song for you...")
            .await;

        let cancel = tokio_util::sync::CancellationToken::new();
        if let Err(e) = self
            .controller
            .play(chat, DEFAULT_STREAM_URL, false, "assistant", &cancel)
            .await
        {
            warn!(chat_id = chat.0, error = %e, "default stream playback failed");
        }
    }

    /// Voice-chat lifecycle message: duration 0 marks a start, anything else
    /// an end. Both clear the chat's queue.
    pub async fn on_voice_chat_action(&self, chat: ChatId, duration: u32) {
        self.controller.registry().clear_chat(chat).await;

        if let Ok(assistant) = self.pool.select(chat).await {
            assistant.handle.invalidate_group_call(chat).await;
        }

        let text = if duration == 0 {
            "Voice chat started. Use /play to stream music!"
        } else {
            info!(chat_id = chat.0, duration, "voice chat ended");
            "Voice chat ended. The queue has been cleared."
        };
        let _ = self.bot.send_message(chat, text).await;
    }

    /// One platform participant update.
    pub async fn on_participant_update(&self, update: ParticipantUpdate, chat_info: &ChatInfo) {
        let chat = update.chat;

        // Non-supergroups cannot host the assistant: prompt and leave.
        if !chat.is_supergroup() {
            let _ = self
                .bot
                .send_message(
                    chat,
                    "This chat must be upgraded to a supergroup before music can be played.",
                )
                .await;
            tokio::time::sleep(Duration::from_secs(1)).await;
            let _ = self.bot.leave_chat(chat).await;
            return;
        }

        if let Err(e) = self.store.add_chat(chat).await {
            warn!(chat_id = chat.0, error = %e, "chat registration failed");
        }

        // A public username doubles as a permanent invite link.
        if let Some(username) = &chat_info.username {
            self.controller
                .admission()
                .update_invite_link(chat, &format!("https://t.me/{username}"));
        }

        let assistant = match self.pool.select(chat).await {
            Ok(assistant) => assistant,
            Err(e) => {
                warn!(chat_id = chat.0, error = %e, "no assistant for participant update");
                return;
            }
        };

        let bot_id = self.bot.me().id;
        let ub_id = assistant.user_id();
        if update.user != bot_id && update.user != ub_id {
            debug!(chat_id = chat.0, user_id = update.user.0, "ignoring unrelated update");
            return;
        }

        let change = classify_change(update.old, update.new);
        debug!(chat_id = chat.0, user_id = update.user.0, ?change, "participant change");

        match change {
            ParticipantChange::Joined => {
                if update.user == bot_id {
                    self.log_bot_joined(chat, chat_info).await;
                }
                self.update_assistant_membership(chat, update.user, ub_id, MemberStatus::Member);
            }
            ParticipantChange::LeftOrKicked => {
                if update.user == ub_id {
                    info!(chat_id = chat.0, "assistant left, clearing state");
                    self.controller.registry().clear_chat(chat).await;
                }
                if update.user == bot_id {
                    info!(chat_id = chat.0, "bot left, stopping call");
                    if let Err(e) = self.controller.stop(chat).await {
                        debug!(chat_id = chat.0, error = %e, "stop after bot leave failed");
                    }
                }
                self.update_assistant_membership(chat, update.user, ub_id, MemberStatus::Left);
            }
            ParticipantChange::Banned => {
                if update.user == ub_id {
                    info!(chat_id = chat.0, "assistant banned, cleaning up");
                    self.controller.registry().clear_chat(chat).await;
                    let _ = self
                        .bot
                        .send_message(
                            chat,
                            &format!("The assistant {ub_id} was banned from this chat."),
                        )
                        .await;
                }
                if update.user == bot_id {
                    if let Err(e) = self.controller.stop(chat).await {
                        debug!(chat_id = chat.0, error = %e, "stop after bot ban failed");
                    }
                }
                self.update_assistant_membership(chat, update.user, ub_id, MemberStatus::Kicked);
            }
            ParticipantChange::Unbanned => {
                self.update_assistant_membership(chat, update.user, ub_id, MemberStatus::Left);
            }
            ParticipantChange::Promoted => {
                if update.user == bot_id {
                    info!(chat_id = chat.0, "bot promoted, refreshing admin cache");
                    let _ = self
                        .admins
                        .chat_admins(self.bot.as_ref(), chat, true)
                        .await;
                    self.log_admin_change(chat, update.user, "promoted", chat_info)
                        .await;
                }
                self.controller
                    .admission()
                    .update_membership(chat, update.user, update.new);
            }
            ParticipantChange::Demoted => {
                if update.user == bot_id {
                    info!(chat_id = chat.0, "bot demoted, clearing admin cache");
                    self.admins.clear_chat(chat);
                    self.log_admin_change(chat, update.user, "demoted", chat_info)
                        .await;
                }
                self.controller
                    .admission()
                    .update_membership(chat, update.user, update.new);
            }
            ParticipantChange::Other => {}
        }
    }

    /// Membership cache entries are tracked for the assistant identity only.
    fn update_assistant_membership(
        &self,
        chat: ChatId,
        user: UserId,
        ub_id: UserId,
        status: MemberStatus,
    ) {
        if user == ub_id {
            self.controller
                .admission()
                .update_membership(chat, user, status);
        }
    }

    async fn log_bot_joined(&self, chat: ChatId, chat_info: &ChatInfo) {
        if self.logger_id == 0 {
            return;
        }
        let text = format!(
            "Bot joined a new chat\nChat: {} ({})\nUsername: @{}",
            chat_info.title,
            chat.0,
            chat_info.username.as_deref().unwrap_or("-"),
        );
        if let Err(e) = self.bot.send_message(ChatId(self.logger_id), &text).await {
            warn!(error = %e, "join log failed");
        }
    }

    async fn log_admin_change(&self, chat: ChatId, user: UserId, action: &str, info: &ChatInfo) {
        if self.logger_id == 0 {
            return;
        }
        let text = format!(
            "Admin status changed\nChat: {} ({})\nUser: {}\nAction: {action}",
            info.title, chat.0, user.0,
        );
        if let Err(e) = self.bot.send_message(ChatId(self.logger_id), &text).await {
            warn!(error = %e, "admin change log failed");
        }
    }
}
