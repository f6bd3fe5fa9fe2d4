// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mock chat-platform client for deterministic testing.
//!
//! State is scripted up front (membership, admins, invite links, messages)
//! and every side effect is captured for assertion.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use echotune_core::traits::platform::{
    ChatInfo, FileMeta, GroupCall, Identity, JoinOutcome, MessageRef, PlatformClient,
    PlatformMessage,
};
use echotune_core::types::{ChatAdmin, ChatId, MemberStatus, UserId};
use echotune_core::Error;

#[derive(Default)]
struct State {
    members: HashMap<(i64, i64), MemberStatus>,
    admins: HashMap<i64, Vec<ChatAdmin>>,
    admin_fetch_fails: bool,
    invite_links: HashMap<i64, String>,
    exported_links: u32,
    join_outcome: Option<JoinOutcome>,
    join_attempts: Vec<String>,
    hidden_requests: Vec<(i64, i64)>,
    ban_edits: Vec<(i64, i64, bool, bool)>,
    sent: Vec<(i64, String)>,
    edited: Vec<(i64, i64, String)>,
    left_chats: Vec<i64>,
    messages: HashMap<String, PlatformMessage>,
    chat_infos: HashMap<i64, ChatInfo>,
    group_calls: HashMap<i64, GroupCall>,
    group_call_fetches: u32,
    next_message_id: i64,
    closed: bool,
}

/// A scripted platform client.
pub struct MockPlatform {
    identity: Identity,
    state: Mutex<State>,
}

impl MockPlatform {
    pub fn new(id: i64, username: &str, is_bot: bool) -> Self {
        Self {
            identity: Identity {
                id: UserId(id),
                username: username.to_string(),
                is_bot,
            },
            state: Mutex::new(State {
                next_message_id: 1,
                ..State::default()
            }),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    // -- scripting ----------------------------------------------------------

    pub fn set_member(&self, chat: ChatId, user: UserId, status: MemberStatus) {
        self.state().members.insert((chat.0, user.0), status);
    }

    pub fn set_admins(&self, chat: ChatId, admins: Vec<ChatAdmin>) {
        self.state().admins.insert(chat.0, admins);
    }

    pub fn fail_admin_fetches(&self, fail: bool) {
        self.state().admin_fetch_fails = fail;
    }

    pub fn set_invite_link(&self, chat: ChatId, link: &str) {
        self.state().invite_links.insert(chat.0, link.to_string());
    }

    /// Outcome returned by the next `join_chat` calls.
    pub fn set_join_outcome(&self, outcome: JoinOutcome) {
        self.state().join_outcome = Some(outcome);
    }

    pub fn set_message(&self, url: &str, message: PlatformMessage) {
        self.state().messages.insert(url.to_string(), message);
    }

    pub fn set_chat_info(&self, info: ChatInfo) {
        self.state().chat_infos.insert(info.id.0, info);
    }

    pub fn set_group_call(&self, chat: ChatId, call: GroupCall) {
        self.state().group_calls.insert(chat.0, call);
    }

    // -- captured side effects ---------------------------------------------

    pub fn sent_messages(&self) -> Vec<(i64, String)> {
        self.state().sent.clone()
    }

    pub fn edited_messages(&self) -> Vec<(i64, i64, String)> {
        self.state().edited.clone()
    }

    pub fn join_attempts(&self) -> Vec<String> {
        self.state().join_attempts.clone()
    }

    pub fn hidden_requests(&self) -> Vec<(i64, i64)> {
        self.state().hidden_requests.clone()
    }

    pub fn ban_edits(&self) -> Vec<(i64, i64, bool, bool)> {
        self.state().ban_edits.clone()
    }

    pub fn exported_link_count(&self) -> u32 {
        self.state().exported_links
    }

    pub fn group_call_fetches(&self) -> u32 {
        self.state().group_call_fetches
    }

    pub fn left_chats(&self) -> Vec<i64> {
        self.state().left_chats.clone()
    }

    pub fn member_of(&self, chat: ChatId, user: UserId) -> Option<MemberStatus> {
        self.state().members.get(&(chat.0, user.0)).copied()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }
}

#[async_trait]
impl PlatformClient for MockPlatform {
    fn me(&self) -> Identity {
        self.identity.clone()
    }

    async fn send_message(&self, chat: ChatId, text: &str) -> Result<MessageRef, Error> {
        let mut state = self.state();
        state.sent.push((chat.0, text.to_string()));
        let id = state.next_message_id;
        state.next_message_id += 1;
        Ok(MessageRef { chat, id })
    }

    async fn edit_message(&self, message: MessageRef, text: &str) -> Result<(), Error> {
        self.state()
            .edited
            .push((message.chat.0, message.id, text.to_string()));
        Ok(())
    }

    async fn chat_member(&self, chat: ChatId, user: UserId) -> Result<MemberStatus, Error> {
        Ok(self
            .state()
            .members
            .get(&(chat.0, user.0))
            .copied()
            .unwrap_or(MemberStatus::Left))
    }

    async fn chat_admins(&self, chat: ChatId) -> Result<Vec<ChatAdmin>, Error> {
        let state = self.state();
        if state.admin_fetch_fails {
            return Err(Error::platform("admin fetch disabled by test"));
        }
        Ok(state.admins.get(&chat.0).cloned().unwrap_or_default())
    }

    async fn chat_info(&self, chat: ChatId) -> Result<ChatInfo, Error> {
        Ok(self
            .state()
            .chat_infos
            .get(&chat.0)
            .cloned()
            .unwrap_or(ChatInfo {
                id: chat,
                title: format!("chat {}", chat.0),
                username: None,
                is_supergroup: chat.is_supergroup(),
            }))
    }

    async fn invite_link(&self, chat: ChatId) -> Result<Option<String>, Error> {
        Ok(self.state().invite_links.get(&chat.0).cloned())
    }

    async fn export_invite_link(&self, chat: ChatId, _title: &str) -> Result<String, Error> {
        let mut state = self.state();
        state.exported_links += 1;
        let link = format!("https://t.me/+exported{}", chat.0.unsigned_abs());
        state.invite_links.insert(chat.0, link.clone());
        Ok(link)
    }

    async fn join_chat(&self, invite_link: &str) -> Result<JoinOutcome, Error> {
        let mut state = self.state();
        state.join_attempts.push(invite_link.to_string());
        Ok(state.join_outcome.unwrap_or(JoinOutcome::Joined))
    }

    async fn hide_join_request(&self, chat: ChatId, user: UserId) -> Result<(), Error> {
        self.state().hidden_requests.push((chat.0, user.0));
        Ok(())
    }

    async fn edit_banned(
        &self,
        chat: ChatId,
        user: UserId,
        unban: bool,
        unmute: bool,
    ) -> Result<(), Error> {
        let mut state = self.state();
        state.ban_edits.push((chat.0, user.0, unban, unmute));
        state.members.insert((chat.0, user.0), MemberStatus::Left);
        Ok(())
    }

    async fn leave_chat(&self, chat: ChatId) -> Result<(), Error> {
        self.state().left_chats.push(chat.0);
        Ok(())
    }

    async fn resolve_message(&self, url: &str) -> Result<PlatformMessage, Error> {
        self.state()
            .messages
            .get(url)
            .cloned()
            .ok_or_else(|| Error::platform(format!("no scripted message for {url}")))
    }

    async fn download_file(&self, file: &FileMeta, dest: &Path) -> Result<PathBuf, Error> {
        // Pretend the bytes landed where asked.
        let _ = file;
        Ok(dest.to_path_buf())
    }

    async fn group_call(&self, chat: ChatId) -> Result<Option<GroupCall>, Error> {
        let mut state = self.state();
        state.group_call_fetches += 1;
        Ok(state.group_calls.get(&chat.0).copied())
    }

    async fn close(&self) {
        self.state().closed = true;
    }
}
