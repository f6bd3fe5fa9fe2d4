// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Chat administrator cache.
//!
//! Full admin lists are fetched once and cached for an hour; individual
//! lookups are derived from the cached list. A failed fetch caches an empty
//! list for ten minutes to damp request storms against the platform.

use std::time::Duration;

use echotune_core::types::{ChatAdmin, ChatId, UserId};
use echotune_core::{Error, PlatformClient};
use tracing::warn;

use crate::ttl::TtlCache;

const ADMIN_TTL: Duration = Duration::from_secs(60 * 60);
const FAILURE_TTL: Duration = Duration::from_secs(10 * 60);

pub struct AdminCache {
    entries: TtlCache<i64, Vec<ChatAdmin>>,
}

impl Default for AdminCache {
    fn default() -> Self {
        Self::new()
    }
}

impl AdminCache {
    pub fn new() -> Self {
        Self {
            entries: TtlCache::new(ADMIN_TTL),
        }
    }

    /// The chat's admin list, from cache or freshly fetched.
    ///
    /// `force_reload` bypasses the cache. On fetch failure an empty list is
    /// cached with a shortened TTL and the error is propagated.
    pub async fn chat_admins(
        &self,
        client: &dyn PlatformClient,
        chat: ChatId,
        force_reload: bool,
    ) -> Result<Vec<ChatAdmin>, Error> {
        if !force_reload {
            if let Some(admins) = self.entries.get(&chat.0) {
                return Ok(admins);
            }
        }

        match client.chat_admins(chat).await {
            Ok(admins) => {
                self.entries.set(chat.0, admins.clone());
                Ok(admins)
            }
            Err(e) => {
                warn!(chat_id = chat.0, error = %e, "admin list fetch failed");
                self.entries.set_with_ttl(chat.0, Vec::new(), FAILURE_TTL);
                Err(e)
            }
        }
    }

    /// The admin entry for one user, or `None` when the user is not an admin.
    pub async fn user_admin(
        &self,
        client: &dyn PlatformClient,
        chat: ChatId,
        user: UserId,
        force_reload: bool,
    ) -> Result<Option<ChatAdmin>, Error> {
        let admins = self.chat_admins(client, chat, force_reload).await?;
        Ok(admins.into_iter().find(|a| a.user == user))
    }

    /// Drops the cached list for one chat.
    pub fn clear_chat(&self, chat: ChatId) {
        self.entries.delete(&chat.0);
    }

    /// Drops every cached list.
    pub fn clear_all(&self) {
        self.entries.clear();
    }
}
