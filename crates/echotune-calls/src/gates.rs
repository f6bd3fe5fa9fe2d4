// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Permission gates for operator commands.
//!
//! Order: the chat must be a supergroup; the bot must be an admin with the
//! invite-users right; then the chat's play-mode or admin-mode decides who
//! may act. `/reload` is additionally rate limited per chat.

use std::sync::Arc;
use std::time::{Duration, Instant};

use echotune_cache::{AdminCache, TtlCache};
use echotune_core::types::{AccessMode, ChatId, MemberStatus, UserId};
use echotune_core::{Error, PlatformClient, Store};
use tracing::warn;

const RELOAD_COOLDOWN: Duration = Duration::from_secs(3 * 60);

/// Which mode setting applies to a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateKind {
    /// `/play`-family commands.
    Play,
    /// Queue-mutating control commands.
    Admin,
}

pub struct Gates {
    store: Arc<dyn Store>,
    admins: Arc<AdminCache>,
    bot: Arc<dyn PlatformClient>,
    reload_stamps: TtlCache<i64, Instant>,
}

impl Gates {
    pub fn new(
        store: Arc<dyn Store>,
        admins: Arc<AdminCache>,
        bot: Arc<dyn PlatformClient>,
    ) -> Self {
        Self {
            store,
            admins,
            bot,
            reload_stamps: TtlCache::new(RELOAD_COOLDOWN),
        }
    }

    /// Supergroup check, first gate for every group command.
    pub fn ensure_supergroup(&self, chat: ChatId) -> Result<(), Error> {
        if chat.is_supergroup() {
            Ok(())
        } else {
            Err(Error::ChatNotSupergroup(chat.0))
        }
    }

    /// The bot must be an admin with the invite-users right before any
    /// playback can be controlled.
    pub async fn ensure_bot_admin(&self, chat: ChatId) -> Result<(), Error> {
        let bot_id = self.bot.me().id;
        let admin = self
            .admins
            .user_admin(self.bot.as_ref(), chat, bot_id, false)
            .await
            .map_err(|e| {
                warn!(chat_id = chat.0, error = %e, "bot admin lookup failed");
                Error::PermissionDenied(
                    "failed to check the bot's admin status, try /reload".into(),
                )
            })?
            .ok_or_else(|| {
                Error::PermissionDenied(
                    "the bot is not an admin in this chat; promote it with the invite-users right"
                        .into(),
                )
            })?;

        if !matches!(admin.status, MemberStatus::Admin | MemberStatus::Creator) {
            return Err(Error::PermissionDenied(
                "the bot is not an admin in this chat; use /reload to refresh".into(),
            ));
        }
        if !admin.rights.can_invite_users {
            return Err(Error::PermissionDenied(
                "the bot is missing the invite-users right".into(),
            ));
        }
        Ok(())
    }

    /// Whether `user` may run a command of `kind` in `chat`.
    pub async fn check(&self, kind: GateKind, chat: ChatId, user: UserId) -> Result<(), Error> {
        self.ensure_supergroup(chat)?;
        self.ensure_bot_admin(chat).await?;

        let mode = match kind {
            GateKind::Play => self.store.play_mode(chat).await?,
            GateKind::Admin => self.store.admin_mode(chat).await?,
        };

        if mode == AccessMode::Everyone {
            return Ok(());
        }

        // Chat admins always pass the remaining modes.
        let is_admin = self
            .admins
            .user_admin(self.bot.as_ref(), chat, user, false)
            .await
            .map(|a| a.is_some())
            .unwrap_or(false)
            || self.store.is_admin(chat, user).await.unwrap_or(false);
        if is_admin {
            return Ok(());
        }

        if mode == AccessMode::Auth && self.store.is_auth_user(chat, user).await? {
            return Ok(());
        }

        Err(Error::PermissionDenied(
            "you are not authorized to use this command here".into(),
        ))
    }

    /// Rate-limited admin-cache reload. Returns the fresh admin count, or
    /// the seconds left on the cooldown.
    pub async fn reload_admins(&self, chat: ChatId) -> Result<usize, Error> {
        if let Some(last) = self.reload_stamps.get(&chat.0) {
            let elapsed = last.elapsed();
            if elapsed < RELOAD_COOLDOWN {
                let remaining = (RELOAD_COOLDOWN - elapsed).as_secs();
                return Err(Error::RateLimited {
                    retry_after: Duration::from_secs(remaining),
                });
            }
        }
        self.reload_stamps.set(chat.0, Instant::now());

        self.admins.clear_chat(chat);
        let admins = self
            .admins
            .chat_admins(self.bot.as_ref(), chat, true)
            .await?;
        Ok(admins.len())
    }
}
