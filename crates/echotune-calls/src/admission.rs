// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Assistant admission.
//!
//! Before the first play in a chat (and after membership-changing events)
//! the selected assistant must be a present, non-restricted member. Left
//! assistants join via invite link; kicked or restricted ones additionally
//! need the bot's ban-users admin right to be lifted back in.

use std::sync::Arc;
use std::time::Duration;

use echotune_cache::{AdminCache, TtlCache};
use echotune_core::traits::platform::JoinOutcome;
use echotune_core::types::{ChatId, MemberStatus, UserId};
use echotune_core::{Error, PlatformClient};
use tracing::{info, warn};

use crate::pool::Assistant;
use crate::with_flood_retry;

const MEMBERSHIP_TTL: Duration = Duration::from_secs(60 * 60);
const INVITE_TTL: Duration = Duration::from_secs(60 * 60);
const SWEEP_INTERVAL: Duration = Duration::from_secs(15 * 60);

pub struct Admission {
    bot: Arc<dyn PlatformClient>,
    admins: Arc<AdminCache>,
    membership: Arc<TtlCache<(i64, i64), MemberStatus>>,
    invites: Arc<TtlCache<i64, String>>,
}

impl Admission {
    pub fn new(bot: Arc<dyn PlatformClient>, admins: Arc<AdminCache>) -> Self {
        Self {
            bot,
            admins,
            membership: Arc::new(TtlCache::new(MEMBERSHIP_TTL)),
            invites: Arc::new(TtlCache::new(INVITE_TTL)),
        }
    }

    /// Spawns the periodic expiry sweeps for both caches.
    pub fn start_sweepers(&self) -> Vec<tokio::task::JoinHandle<()>> {
        vec![
            echotune_cache::spawn_sweeper(self.membership.clone(), SWEEP_INTERVAL),
            echotune_cache::spawn_sweeper(self.invites.clone(), SWEEP_INTERVAL),
        ]
    }

    /// Records a fresh membership observation for `(chat, user)`.
    pub fn update_membership(&self, chat: ChatId, user: UserId, status: MemberStatus) {
        info!(chat_id = chat.0, user_id = user.0, status = %status, "membership updated");
        self.membership.set((chat.0, user.0), status);
    }

    /// Caches (or clears, when empty) the chat's invite link.
    pub fn update_invite_link(&self, chat: ChatId, link: &str) {
        if link.is_empty() {
            self.invites.delete(&chat.0);
        } else {
            self.invites.set(chat.0, link.to_string());
        }
    }

    pub fn cached_membership(&self, chat: ChatId, user: UserId) -> Option<MemberStatus> {
        self.membership.get(&(chat.0, user.0))
    }

    /// The assistant's membership status, from cache or a fresh lookup.
    ///
    /// Platform failures degrade to `Left`, which routes into the join path.
    pub async fn check_status(&self, assistant: &Assistant, chat: ChatId) -> MemberStatus {
        let user = assistant.user_id();
        if let Some(status) = self.membership.get(&(chat.0, user.0)) {
            return status;
        }

        let status = match self.bot.chat_member(chat, user).await {
            Ok(status) => status,
            Err(e) => {
                warn!(chat_id = chat.0, user_id = user.0, error = %e,
                    "membership lookup failed, assuming left");
                MemberStatus::Left
            }
        };

        self.membership.set((chat.0, user.0), status);
        status
    }

    /// Ensures the assistant can stream into `chat`, joining or unbanning as
    /// needed. No-op when the status is already present (P6).
    pub async fn ensure_joined(&self, assistant: &Assistant, chat: ChatId) -> Result<(), Error> {
        let status = self.check_status(assistant, chat).await;
        info!(chat_id = chat.0, status = %status, "admission check");

        match status {
            MemberStatus::Member | MemberStatus::Admin | MemberStatus::Creator => Ok(()),

            MemberStatus::Left | MemberStatus::Unknown => self.join(assistant, chat).await,

            MemberStatus::Kicked => {
                self.lift_restriction(assistant, chat, true, false).await?;
                self.join(assistant, chat).await
            }

            MemberStatus::Restricted => {
                self.lift_restriction(assistant, chat, false, true).await
            }
        }
    }

    /// Unbans or unmutes the assistant using the bot's admin power.
    async fn lift_restriction(
        &self,
        assistant: &Assistant,
        chat: ChatId,
        unban: bool,
        unmute: bool,
    ) -> Result<(), Error> {
        let bot_id = self.bot.me().id;
        let ub_id = assistant.user_id();

        let bot_admin = self
            .admins
            .user_admin(self.bot.as_ref(), chat, bot_id, false)
            .await
            .map_err(|e| Error::Platform {
                message: format!("bot admin status check failed: {e}"),
                source: None,
            })?
            .ok_or_else(|| {
                Error::PermissionDenied(format!(
                    "assistant {ub_id} is restricted and the bot is not an admin in {chat}"
                ))
            })?;

        if !matches!(bot_admin.status, MemberStatus::Admin | MemberStatus::Creator) {
            return Err(Error::PermissionDenied(format!(
                "assistant {ub_id} is restricted and the bot is not an admin in {chat}"
            )));
        }
        if !bot_admin.rights.can_ban_users {
            return Err(Error::PermissionDenied(format!(
                "unbanning assistant {ub_id} requires the ban-users right"
            )));
        }

        self.bot
            .edit_banned(chat, ub_id, unban, unmute)
            .await
            .map_err(|e| {
                warn!(chat_id = chat.0, error = %e, "unban failed");
                e
            })?;

        if unmute && !unban {
            self.update_membership(chat, ub_id, MemberStatus::Member);
        }
        Ok(())
    }

    /// Resolves an invite link and joins the assistant through it.
    async fn join(&self, assistant: &Assistant, chat: ChatId) -> Result<(), Error> {
        let link = self.acquire_invite_link(chat).await?;
        let ub_id = assistant.user_id();

        info!(chat_id = chat.0, "joining assistant via invite link");
        let outcome = with_flood_retry(|| assistant.client.join_chat(&link)).await?;

        match outcome {
            JoinOutcome::Joined | JoinOutcome::AlreadyParticipant => {
                self.update_membership(chat, ub_id, MemberStatus::Member);
                Ok(())
            }
            JoinOutcome::RequestSent => {
                // Approve our own pending request with the bot's admin power;
                // only if that fails is the pending state surfaced.
                match self.bot.hide_join_request(chat, ub_id).await {
                    Ok(()) => {
                        self.update_membership(chat, ub_id, MemberStatus::Member);
                        Ok(())
                    }
                    Err(e) => {
                        warn!(chat_id = chat.0, error = %e, "approving join request failed");
                        Err(Error::platform(format!(
                            "join request for assistant {ub_id} is already pending"
                        )))
                    }
                }
            }
            JoinOutcome::InviteExpired => Err(Error::AssistantBanned {
                chat: chat.0,
                user: ub_id.0,
            }),
            JoinOutcome::ChannelPrivate => {
                self.update_membership(chat, ub_id, MemberStatus::Left);
                self.update_invite_link(chat, "");
                Err(Error::AssistantBanned {
                    chat: chat.0,
                    user: ub_id.0,
                })
            }
        }
    }

    /// Invite link acquisition order: cache, existing exported link, freshly
    /// exported link.
    async fn acquire_invite_link(&self, chat: ChatId) -> Result<String, Error> {
        if let Some(link) = self.invites.get(&chat.0) {
            if !link.is_empty() {
                return Ok(link);
            }
        }

        if let Ok(Some(link)) = self.bot.invite_link(chat).await {
            if !link.is_empty() {
                self.invites.set(chat.0, link.clone());
                return Ok(link);
            }
        }

        let title = format!("{} Assistant", self.bot.me().username);
        let link = with_flood_retry(|| self.bot.export_invite_link(chat, &title))
            .await
            .map_err(|e| {
                warn!(chat_id = chat.0, error = %e, "invite link export failed");
                Error::InviteLinkUnavailable(chat.0)
            })?;

        if link.is_empty() {
            return Err(Error::InviteLinkUnavailable(chat.0));
        }

        self.invites.set(chat.0, link.clone());
        Ok(link)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{AssistantPool, Connector};
    use crate::sessions::SessionInfo;
    use async_trait::async_trait;
    use echotune_config::model::SessionEncoding;
    use echotune_core::types::{AdminRights, ChatAdmin};
    use echotune_core::CallEngine;
    use echotune_test_utils::{MemoryStore, MockEngine, MockPlatform};

    const CHAT: ChatId = ChatId(-100);
    const BOT_ID: i64 = 10;
    const UB_ID: i64 = 900;

    struct FixedConnector {
        client: Arc<MockPlatform>,
    }

    #[async_trait]
    impl Connector for FixedConnector {
        async fn connect(
            &self,
            _session: &SessionInfo,
        ) -> Result<(Arc<dyn PlatformClient>, Arc<dyn CallEngine>), Error> {
            Ok((self.client.clone(), Arc::new(MockEngine::new())))
        }
    }

    async fn fixture() -> (Arc<MockPlatform>, Arc<MockPlatform>, Admission, Arc<Assistant>) {
        let bot = Arc::new(MockPlatform::new(BOT_ID, "musicbot", true));
        let ub = Arc::new(MockPlatform::new(UB_ID, "assistant", false));
        let admission = Admission::new(bot.clone(), Arc::new(AdminCache::new()));

        let pool = AssistantPool::new(Arc::new(MemoryStore::new()));
        let assistant = pool
            .start_client(
                &FixedConnector { client: ub.clone() },
                SessionEncoding::Native,
                "s",
            )
            .await
            .unwrap();

        (bot, ub, admission, assistant)
    }

    fn bot_admin(can_ban: bool) -> ChatAdmin {
        ChatAdmin {
            user: UserId(BOT_ID),
            status: MemberStatus::Admin,
            rights: AdminRights {
                can_ban_users: can_ban,
                can_invite_users: true,
                can_manage_call: true,
            },
        }
    }

    #[tokio::test]
    async fn present_member_is_a_no_op() {
        let (bot, ub, admission, assistant) = fixture().await;
        bot.set_member(CHAT, UserId(UB_ID), MemberStatus::Member);

        admission.ensure_joined(&assistant, CHAT).await.unwrap();

        assert!(ub.join_attempts().is_empty());
        assert_eq!(bot.exported_link_count(), 0);
        assert!(bot.ban_edits().is_empty());
    }

    #[tokio::test]
    async fn left_assistant_joins_via_exported_link() {
        let (bot, ub, admission, assistant) = fixture().await;
        // No membership scripted -> platform reports Left.

        admission.ensure_joined(&assistant, CHAT).await.unwrap();

        assert_eq!(ub.join_attempts().len(), 1);
        assert_eq!(bot.exported_link_count(), 1);
        assert_eq!(
            admission.cached_membership(CHAT, UserId(UB_ID)),
            Some(MemberStatus::Member)
        );
    }

    #[tokio::test]
    async fn cached_invite_link_is_preferred() {
        let (bot, ub, admission, assistant) = fixture().await;
        admission.update_invite_link(CHAT, "https://t.me/+cached");

        admission.ensure_joined(&assistant, CHAT).await.unwrap();

        assert_eq!(ub.join_attempts(), vec!["https://t.me/+cached".to_string()]);
        assert_eq!(bot.exported_link_count(), 0);
    }

    #[tokio::test]
    async fn kicked_assistant_is_unbanned_then_joined() {
        let (bot, ub, admission, assistant) = fixture().await;
        bot.set_member(CHAT, UserId(UB_ID), MemberStatus::Kicked);
        bot.set_admins(CHAT, vec![bot_admin(true)]);

        admission.ensure_joined(&assistant, CHAT).await.unwrap();

        assert_eq!(bot.ban_edits(), vec![(CHAT.0, UB_ID, true, false)]);
        assert_eq!(ub.join_attempts().len(), 1);
    }

    #[tokio::test]
    async fn kicked_without_ban_right_is_refused() {
        let (bot, _ub, admission, assistant) = fixture().await;
        bot.set_member(CHAT, UserId(UB_ID), MemberStatus::Kicked);
        bot.set_admins(CHAT, vec![bot_admin(false)]);

        let err = admission.ensure_joined(&assistant, CHAT).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
        assert!(bot.ban_edits().is_empty());
    }

    #[tokio::test]
    async fn kicked_without_bot_admin_is_refused() {
        let (bot, _ub, admission, assistant) = fixture().await;
        bot.set_member(CHAT, UserId(UB_ID), MemberStatus::Kicked);
        bot.set_admins(CHAT, vec![]);

        let err = admission.ensure_joined(&assistant, CHAT).await.unwrap_err();
        assert!(matches!(err, Error::PermissionDenied(_)));
    }

    #[tokio::test]
    async fn restricted_assistant_is_unmuted_without_joining() {
        let (bot, ub, admission, assistant) = fixture().await;
        bot.set_member(CHAT, UserId(UB_ID), MemberStatus::Restricted);
        bot.set_admins(CHAT, vec![bot_admin(true)]);

        admission.ensure_joined(&assistant, CHAT).await.unwrap();

        assert_eq!(bot.ban_edits(), vec![(CHAT.0, UB_ID, false, true)]);
        assert!(ub.join_attempts().is_empty());
    }

    #[tokio::test]
    async fn pending_request_is_auto_approved() {
        let (bot, ub, admission, assistant) = fixture().await;
        ub.set_join_outcome(JoinOutcome::RequestSent);

        admission.ensure_joined(&assistant, CHAT).await.unwrap();

        assert_eq!(bot.hidden_requests(), vec![(CHAT.0, UB_ID)]);
        assert_eq!(
            admission.cached_membership(CHAT, UserId(UB_ID)),
            Some(MemberStatus::Member)
        );
    }

    #[tokio::test]
    async fn private_channel_clears_invite_and_reports_ban() {
        let (_bot, ub, admission, assistant) = fixture().await;
        admission.update_invite_link(CHAT, "https://t.me/+stale");
        ub.set_join_outcome(JoinOutcome::ChannelPrivate);

        let err = admission.ensure_joined(&assistant, CHAT).await.unwrap_err();
        assert!(matches!(err, Error::AssistantBanned { .. }));
        assert_eq!(
            admission.cached_membership(CHAT, UserId(UB_ID)),
            Some(MemberStatus::Left)
        );
    }

    #[tokio::test]
    async fn expired_invite_reports_ban() {
        let (_bot, ub, admission, assistant) = fixture().await;
        ub.set_join_outcome(JoinOutcome::InviteExpired);

        let err = admission.ensure_joined(&assistant, CHAT).await.unwrap_err();
        assert!(matches!(err, Error::AssistantBanned { .. }));
    }

    /// Second admission after a successful join reads the cache, not the
    /// platform (P6 idempotence).
    #[tokio::test]
    async fn admission_is_idempotent_after_join() {
        let (bot, ub, admission, assistant) = fixture().await;

        admission.ensure_joined(&assistant, CHAT).await.unwrap();
        admission.ensure_joined(&assistant, CHAT).await.unwrap();

        assert_eq!(ub.join_attempts().len(), 1);
        assert_eq!(bot.exported_link_count(), 1);
    }
}
