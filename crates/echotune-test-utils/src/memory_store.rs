// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory implementation of the persistent-store seam.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use echotune_core::types::{AccessMode, ChatId, Playlist, Track, UserId};
use echotune_core::{Error, Store};

#[derive(Default)]
struct State {
    chats: HashSet<i64>,
    users: HashSet<i64>,
    assistants: HashMap<i64, String>,
    play_modes: HashMap<i64, AccessMode>,
    admin_modes: HashMap<i64, AccessMode>,
    langs: HashMap<i64, String>,
    logger_flags: HashMap<i64, bool>,
    auth_users: HashMap<i64, HashSet<i64>>,
    admins: HashMap<i64, HashSet<i64>>,
    playlists: HashMap<String, Playlist>,
    rtmp_urls: HashMap<i64, String>,
}

/// A process-local [`Store`] for tests.
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
    playlist_seq: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Marks `user` as a chat admin for `is_admin` lookups.
    pub fn grant_admin(&self, chat: ChatId, user: UserId) {
        self.state().admins.entry(chat.0).or_default().insert(user.0);
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn add_chat(&self, chat: ChatId) -> Result<(), Error> {
        self.state().chats.insert(chat.0);
        Ok(())
    }

    async fn add_user(&self, user: UserId) -> Result<(), Error> {
        self.state().users.insert(user.0);
        Ok(())
    }

    async fn all_chats(&self) -> Result<Vec<ChatId>, Error> {
        Ok(self.state().chats.iter().map(|&id| ChatId(id)).collect())
    }

    async fn all_users(&self) -> Result<Vec<UserId>, Error> {
        Ok(self.state().users.iter().map(|&id| UserId(id)).collect())
    }

    async fn assistant(&self, chat: ChatId) -> Result<Option<String>, Error> {
        Ok(self.state().assistants.get(&chat.0).cloned())
    }

    async fn set_assistant(&self, chat: ChatId, name: &str) -> Result<(), Error> {
        self.state().assistants.insert(chat.0, name.to_string());
        Ok(())
    }

    async fn clear_all_assistants(&self) -> Result<u64, Error> {
        let mut state = self.state();
        let count = state.assistants.len() as u64;
        state.assistants.clear();
        Ok(count)
    }

    async fn play_mode(&self, chat: ChatId) -> Result<AccessMode, Error> {
        Ok(self
            .state()
            .play_modes
            .get(&chat.0)
            .copied()
            .unwrap_or_default())
    }

    async fn set_play_mode(&self, chat: ChatId, mode: AccessMode) -> Result<(), Error> {
        self.state().play_modes.insert(chat.0, mode);
        Ok(())
    }

    async fn admin_mode(&self, chat: ChatId) -> Result<AccessMode, Error> {
        Ok(self
            .state()
            .admin_modes
            .get(&chat.0)
            .copied()
            .unwrap_or_default())
    }

    async fn set_admin_mode(&self, chat: ChatId, mode: AccessMode) -> Result<(), Error> {
        self.state().admin_modes.insert(chat.0, mode);
        Ok(())
    }

    async fn lang(&self, chat: ChatId) -> Result<String, Error> {
        Ok(self
            .state()
            .langs
            .get(&chat.0)
            .cloned()
            .unwrap_or_else(|| "en".to_string()))
    }

    async fn set_lang(&self, chat: ChatId, lang: &str) -> Result<(), Error> {
        self.state().langs.insert(chat.0, lang.to_string());
        Ok(())
    }

    async fn logger_enabled(&self, bot: UserId) -> Result<bool, Error> {
        Ok(self
            .state()
            .logger_flags
            .get(&bot.0)
            .copied()
            .unwrap_or(false))
    }

    async fn set_logger_enabled(&self, bot: UserId, enabled: bool) -> Result<(), Error> {
        self.state().logger_flags.insert(bot.0, enabled);
        Ok(())
    }

    async fn auth_users(&self, chat: ChatId) -> Result<Vec<UserId>, Error> {
        Ok(self
            .state()
            .auth_users
            .get(&chat.0)
            .map(|set| set.iter().map(|&id| UserId(id)).collect())
            .unwrap_or_default())
    }

    async fn add_auth_user(&self, chat: ChatId, user: UserId) -> Result<(), Error> {
        self.state()
            .auth_users
            .entry(chat.0)
            .or_default()
            .insert(user.0);
        Ok(())
    }

    async fn remove_auth_user(&self, chat: ChatId, user: UserId) -> Result<(), Error> {
        if let Some(set) = self.state().auth_users.get_mut(&chat.0) {
            set.remove(&user.0);
        }
        Ok(())
    }

    async fn is_auth_user(&self, chat: ChatId, user: UserId) -> Result<bool, Error> {
        Ok(self
            .state()
            .auth_users
            .get(&chat.0)
            .is_some_and(|set| set.contains(&user.0)))
    }

    async fn is_admin(&self, chat: ChatId, user: UserId) -> Result<bool, Error> {
        Ok(self
            .state()
            .admins
            .get(&chat.0)
            .is_some_and(|set| set.contains(&user.0)))
    }

    async fn create_playlist(&self, name: &str, owner: UserId) -> Result<String, Error> {
        let id = format!("tgpl_{}", self.playlist_seq.fetch_add(1, Ordering::SeqCst) + 1);
        self.state().playlists.insert(
            id.clone(),
            Playlist {
                id: id.clone(),
                name: name.to_string(),
                owner,
                songs: Vec::new(),
            },
        );
        Ok(id)
    }

    async fn playlist(&self, id: &str) -> Result<Option<Playlist>, Error> {
        Ok(self.state().playlists.get(id).cloned())
    }

    async fn user_playlists(&self, user: UserId) -> Result<Vec<Playlist>, Error> {
        Ok(self
            .state()
            .playlists
            .values()
            .filter(|p| p.owner == user)
            .cloned()
            .collect())
    }

    async fn add_song_to_playlist(&self, id: &str, track: &Track) -> Result<(), Error> {
        let mut state = self.state();
        let playlist = state
            .playlists
            .get_mut(id)
            .ok_or_else(|| Error::platform(format!("playlist {id} not found")))?;
        playlist.songs.push(track.clone());
        Ok(())
    }

    async fn remove_song_from_playlist(&self, id: &str, track_id: &str) -> Result<(), Error> {
        let mut state = self.state();
        let playlist = state
            .playlists
            .get_mut(id)
            .ok_or_else(|| Error::platform(format!("playlist {id} not found")))?;
        playlist.songs.retain(|t| t.track_id != track_id);
        Ok(())
    }

    async fn delete_playlist(&self, id: &str, owner: UserId) -> Result<bool, Error> {
        let mut state = self.state();
        match state.playlists.get(id) {
            Some(playlist) if playlist.owner == owner => {
                state.playlists.remove(id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn rtmp_url(&self, chat: ChatId) -> Result<Option<String>, Error> {
        Ok(self.state().rtmp_urls.get(&chat.0).cloned())
    }

    async fn set_rtmp_url(&self, chat: ChatId, url: &str) -> Result<(), Error> {
        self.state().rtmp_urls.insert(chat.0, url.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn assistant_assignment_round_trip() {
        let store = MemoryStore::new();
        let chat = ChatId(-1);
        assert!(store.assistant(chat).await.unwrap().is_none());
        store.set_assistant(chat, "client1").await.unwrap();
        assert_eq!(store.assistant(chat).await.unwrap().as_deref(), Some("client1"));
        assert_eq!(store.clear_all_assistants().await.unwrap(), 1);
        assert!(store.assistant(chat).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn playlist_lifecycle() {
        let store = MemoryStore::new();
        let owner = UserId(7);
        let id = store.create_playlist("mine", owner).await.unwrap();
        assert!(id.starts_with("tgpl_"));

        let track = Track::new("https://x", "t", echotune_core::Platform::Youtube, "vid");
        store.add_song_to_playlist(&id, &track).await.unwrap();
        assert_eq!(store.playlist(&id).await.unwrap().unwrap().songs.len(), 1);

        store.remove_song_from_playlist(&id, "vid").await.unwrap();
        assert!(store.playlist(&id).await.unwrap().unwrap().songs.is_empty());

        // Only the owner may delete.
        assert!(!store.delete_playlist(&id, UserId(8)).await.unwrap());
        assert!(store.delete_playlist(&id, owner).await.unwrap());
        assert!(store.playlist(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn modes_default_to_everyone() {
        let store = MemoryStore::new();
        assert_eq!(store.play_mode(ChatId(-1)).await.unwrap(), AccessMode::Everyone);
        store
            .set_play_mode(ChatId(-1), AccessMode::Admins)
            .await
            .unwrap();
        assert_eq!(store.play_mode(ChatId(-1)).await.unwrap(), AccessMode::Admins);
    }
}
