// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite implementation of the [`Store`] seam.
//!
//! Playlist tracks are stored as JSON blobs keyed by track id; everything
//! else maps onto plain relational rows.

use std::str::FromStr;

use async_trait::async_trait;
use echotune_core::types::{AccessMode, ChatId, Playlist, Track, UserId};
use echotune_core::{Error, Store};
use rusqlite::params;

use crate::database::{map_tr_err, Database};

pub struct SqliteStore {
    db: Database,
}

impl SqliteStore {
    /// Opens the store at `path`, creating the schema on first use.
    pub async fn open(path: &str) -> Result<Self, Error> {
        Ok(Self {
            db: Database::open(path).await?,
        })
    }

    /// In-memory store for tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        Ok(Self {
            db: Database::open_in_memory().await?,
        })
    }

    pub async fn close(&self) -> Result<(), Error> {
        self.db.checkpoint().await
    }

    async fn setting(&self, chat: ChatId, column: &'static str) -> Result<Option<String>, Error> {
        self.db
            .connection()
            .call(move |conn| {
                let sql = format!("SELECT {column} FROM chat_settings WHERE chat_id = ?1");
                let mut stmt = conn.prepare(&sql)?;
                match stmt.query_row(params![chat.0], |row| row.get::<_, Option<String>>(0)) {
                    Ok(value) => Ok(value),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn set_setting(
        &self,
        chat: ChatId,
        column: &'static str,
        value: String,
    ) -> Result<(), Error> {
        self.db
            .connection()
            .call(move |conn| {
                let sql = format!(
                    "INSERT INTO chat_settings (chat_id, {column}) VALUES (?1, ?2)
                     ON CONFLICT(chat_id) DO UPDATE SET {column} = ?2"
                );
                conn.execute(&sql, params![chat.0, value])?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}

fn mode_from(text: Option<String>) -> AccessMode {
    text.as_deref()
        .and_then(|s| AccessMode::from_str(s).ok())
        .unwrap_or_default()
}

#[async_trait]
impl Store for SqliteStore {
    async fn add_chat(&self, chat: ChatId) -> Result<(), Error> {
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO chats (id) VALUES (?1)",
                    params![chat.0],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn add_user(&self, user: UserId) -> Result<(), Error> {
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO users (id) VALUES (?1)",
                    params![user.0],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn all_chats(&self) -> Result<Vec<ChatId>, Error> {
        self.db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM chats")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ids.into_iter().map(ChatId).collect())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn all_users(&self) -> Result<Vec<UserId>, Error> {
        self.db
            .connection()
            .call(|conn| {
                let mut stmt = conn.prepare("SELECT id FROM users")?;
                let ids = stmt
                    .query_map([], |row| row.get::<_, i64>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ids.into_iter().map(UserId).collect())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn assistant(&self, chat: ChatId) -> Result<Option<String>, Error> {
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT name FROM assistants WHERE chat_id = ?1")?;
                match stmt.query_row(params![chat.0], |row| row.get(0)) {
                    Ok(name) => Ok(Some(name)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn set_assistant(&self, chat: ChatId, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO assistants (chat_id, name) VALUES (?1, ?2)
                     ON CONFLICT(chat_id) DO UPDATE SET name = ?2",
                    params![chat.0, name],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn clear_all_assistants(&self) -> Result<u64, Error> {
        self.db
            .connection()
            .call(|conn| Ok(conn.execute("DELETE FROM assistants", [])? as u64))
            .await
            .map_err(map_tr_err)
    }

    async fn play_mode(&self, chat: ChatId) -> Result<AccessMode, Error> {
        Ok(mode_from(self.setting(chat, "play_mode").await?))
    }

    async fn set_play_mode(&self, chat: ChatId, mode: AccessMode) -> Result<(), Error> {
        self.set_setting(chat, "play_mode", mode.to_string()).await
    }

    async fn admin_mode(&self, chat: ChatId) -> Result<AccessMode, Error> {
        Ok(mode_from(self.setting(chat, "admin_mode").await?))
    }

    async fn set_admin_mode(&self, chat: ChatId, mode: AccessMode) -> Result<(), Error> {
        self.set_setting(chat, "admin_mode", mode.to_string()).await
    }

    async fn lang(&self, chat: ChatId) -> Result<String, Error> {
        Ok(self
            .setting(chat, "lang")
            .await?
            .unwrap_or_else(|| "en".to_string()))
    }

    async fn set_lang(&self, chat: ChatId, lang: &str) -> Result<(), Error> {
        self.set_setting(chat, "lang", lang.to_string()).await
    }

    async fn logger_enabled(&self, bot: UserId) -> Result<bool, Error> {
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT enabled FROM logger_flags WHERE bot_id = ?1")?;
                match stmt.query_row(params![bot.0], |row| row.get::<_, i64>(0)) {
                    Ok(flag) => Ok(flag != 0),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(false),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(map_tr_err)
    }

    async fn set_logger_enabled(&self, bot: UserId, enabled: bool) -> Result<(), Error> {
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT INTO logger_flags (bot_id, enabled) VALUES (?1, ?2)
                     ON CONFLICT(bot_id) DO UPDATE SET enabled = ?2",
                    params![bot.0, enabled as i64],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn auth_users(&self, chat: ChatId) -> Result<Vec<UserId>, Error> {
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT user_id FROM auth_users WHERE chat_id = ?1")?;
                let ids = stmt
                    .query_map(params![chat.0], |row| row.get::<_, i64>(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ids.into_iter().map(UserId).collect())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn add_auth_user(&self, chat: ChatId, user: UserId) -> Result<(), Error> {
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "INSERT OR IGNORE INTO auth_users (chat_id, user_id) VALUES (?1, ?2)",
                    params![chat.0, user.0],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn remove_auth_user(&self, chat: ChatId, user: UserId) -> Result<(), Error> {
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM auth_users WHERE chat_id = ?1 AND user_id = ?2",
                    params![chat.0, user.0],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn is_auth_user(&self, chat: ChatId, user: UserId) -> Result<bool, Error> {
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT 1 FROM auth_users WHERE chat_id = ?1 AND user_id = ?2",
                )?;
                Ok(stmt.exists(params![chat.0, user.0])?)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn is_admin(&self, chat: ChatId, user: UserId) -> Result<bool, Error> {
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT 1 FROM chat_admins WHERE chat_id = ?1 AND user_id = ?2",
                )?;
                Ok(stmt.exists(params![chat.0, user.0])?)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn create_playlist(&self, name: &str, owner: UserId) -> Result<String, Error> {
        let name = name.to_string();
        self.db
            .connection()
            .call(move |conn| {
                // Sequential ids keep the `tgpl_` prefix recognizable in
                // /play arguments.
                let next: i64 = conn.query_row(
                    "SELECT COALESCE(MAX(rowid), 0) + 1 FROM playlists",
                    [],
                    |row| row.get(0),
                )?;
                let id = format!("tgpl_{next}");
                conn.execute(
                    "INSERT INTO playlists (id, name, owner_id) VALUES (?1, ?2, ?3)",
                    params![id, name, owner.0],
                )?;
                Ok(id)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn playlist(&self, id: &str) -> Result<Option<Playlist>, Error> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let mut stmt =
                    conn.prepare("SELECT id, name, owner_id FROM playlists WHERE id = ?1")?;
                let header = match stmt.query_row(params![id], |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, i64>(2)?,
                    ))
                }) {
                    Ok(header) => header,
                    Err(rusqlite::Error::QueryReturnedNoRows) => return Ok(None),
                    Err(e) => return Err(e.into()),
                };

                let mut songs_stmt = conn.prepare(
                    "SELECT track_json FROM playlist_songs
                     WHERE playlist_id = ?1 ORDER BY position",
                )?;
                let blobs = songs_stmt
                    .query_map(params![id], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, _>>()?;

                let songs = blobs
                    .iter()
                    .filter_map(|blob| serde_json::from_str::<Track>(blob).ok())
                    .collect();

                Ok(Some(Playlist {
                    id: header.0,
                    name: header.1,
                    owner: UserId(header.2),
                    songs,
                }))
            })
            .await
            .map_err(map_tr_err)
    }

    async fn user_playlists(&self, user: UserId) -> Result<Vec<Playlist>, Error> {
        let ids: Vec<String> = self
            .db
            .connection()
            .call(move |conn| {
                let mut stmt = conn.prepare("SELECT id FROM playlists WHERE owner_id = ?1")?;
                let ids = stmt
                    .query_map(params![user.0], |row| row.get(0))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(ids)
            })
            .await
            .map_err(map_tr_err)?;

        let mut playlists = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(playlist) = self.playlist(&id).await? {
                playlists.push(playlist);
            }
        }
        Ok(playlists)
    }

    async fn add_song_to_playlist(&self, id: &str, track: &Track) -> Result<(), Error> {
        let id = id.to_string();
        let track_id = track.track_id.clone();
        let blob = serde_json::to_string(track).map_err(|e| Error::Storage {
            source: Box::new(e),
        })?;
        self.db
            .connection()
            .call(move |conn| {
                let next: i64 = conn.query_row(
                    "SELECT COALESCE(MAX(position), 0) + 1 FROM playlist_songs
                     WHERE playlist_id = ?1",
                    params![id],
                    |row| row.get(0),
                )?;
                conn.execute(
                    "INSERT OR REPLACE INTO playlist_songs
                     (playlist_id, track_id, track_json, position)
                     VALUES (?1, ?2, ?3, ?4)",
                    params![id, track_id, blob, next],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn remove_song_from_playlist(&self, id: &str, track_id: &str) -> Result<(), Error> {
        let id = id.to_string();
        let track_id = track_id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                conn.execute(
                    "DELETE FROM playlist_songs WHERE playlist_id = ?1 AND track_id = ?2",
                    params![id, track_id],
                )?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }

    async fn delete_playlist(&self, id: &str, owner: UserId) -> Result<bool, Error> {
        let id = id.to_string();
        self.db
            .connection()
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM playlists WHERE id = ?1 AND owner_id = ?2",
                    params![id, owner.0],
                )?;
                Ok(deleted > 0)
            })
            .await
            .map_err(map_tr_err)
    }

    async fn rtmp_url(&self, chat: ChatId) -> Result<Option<String>, Error> {
        self.setting(chat, "rtmp_url").await
    }

    async fn set_rtmp_url(&self, chat: ChatId, url: &str) -> Result<(), Error> {
        self.set_setting(chat, "rtmp_url", url.to_string()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use echotune_core::Platform;

    async fn store() -> SqliteStore {
        SqliteStore::open_in_memory().await.unwrap()
    }

    #[tokio::test]
    async fn chats_and_users_register_once() {
        let store = store().await;
        store.add_chat(ChatId(-1)).await.unwrap();
        store.add_chat(ChatId(-1)).await.unwrap();
        store.add_user(UserId(7)).await.unwrap();

        assert_eq!(store.all_chats().await.unwrap(), vec![ChatId(-1)]);
        assert_eq!(store.all_users().await.unwrap(), vec![UserId(7)]);
    }

    #[tokio::test]
    async fn assistant_assignments_persist_and_clear() {
        let store = store().await;
        store.set_assistant(ChatId(-1), "client1").await.unwrap();
        store.set_assistant(ChatId(-2), "client2").await.unwrap();
        store.set_assistant(ChatId(-1), "client3").await.unwrap();

        assert_eq!(
            store.assistant(ChatId(-1)).await.unwrap().as_deref(),
            Some("client3")
        );
        assert_eq!(store.clear_all_assistants().await.unwrap(), 2);
        assert!(store.assistant(ChatId(-1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn modes_round_trip_and_default() {
        let store = store().await;
        let chat = ChatId(-5);
        assert_eq!(store.play_mode(chat).await.unwrap(), AccessMode::Everyone);

        store.set_play_mode(chat, AccessMode::Auth).await.unwrap();
        store
            .set_admin_mode(chat, AccessMode::Admins)
            .await
            .unwrap();
        assert_eq!(store.play_mode(chat).await.unwrap(), AccessMode::Auth);
        assert_eq!(store.admin_mode(chat).await.unwrap(), AccessMode::Admins);
    }

    #[tokio::test]
    async fn auth_users_lifecycle() {
        let store = store().await;
        let chat = ChatId(-5);
        let user = UserId(77);

        assert!(!store.is_auth_user(chat, user).await.unwrap());
        store.add_auth_user(chat, user).await.unwrap();
        assert!(store.is_auth_user(chat, user).await.unwrap());
        assert_eq!(store.auth_users(chat).await.unwrap(), vec![user]);
        store.remove_auth_user(chat, user).await.unwrap();
        assert!(!store.is_auth_user(chat, user).await.unwrap());
    }

    #[tokio::test]
    async fn playlists_round_trip() {
        let store = store().await;
        let owner = UserId(7);
        let id = store.create_playlist("favorites", owner).await.unwrap();
        assert!(id.starts_with("tgpl_"));

        let mut track = Track::new(
            "https://www.youtube.com/watch?v=dQw4w9WgXcQ",
            "Never Gonna Give You Up",
            Platform::Youtube,
            "dQw4w9WgXcQ",
        );
        track.duration_secs = 212;
        store.add_song_to_playlist(&id, &track).await.unwrap();

        let playlist = store.playlist(&id).await.unwrap().unwrap();
        assert_eq!(playlist.name, "favorites");
        assert_eq!(playlist.songs.len(), 1);
        assert_eq!(playlist.songs[0].duration_secs, 212);

        assert_eq!(store.user_playlists(owner).await.unwrap().len(), 1);

        store
            .remove_song_from_playlist(&id, "dQw4w9WgXcQ")
            .await
            .unwrap();
        assert!(store.playlist(&id).await.unwrap().unwrap().songs.is_empty());

        assert!(!store.delete_playlist(&id, UserId(99)).await.unwrap());
        assert!(store.delete_playlist(&id, owner).await.unwrap());
        assert!(store.playlist(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn lang_and_logger_and_rtmp() {
        let store = store().await;
        let chat = ChatId(-5);

        assert_eq!(store.lang(chat).await.unwrap(), "en");
        store.set_lang(chat, "de").await.unwrap();
        assert_eq!(store.lang(chat).await.unwrap(), "de");

        assert!(!store.logger_enabled(UserId(1)).await.unwrap());
        store.set_logger_enabled(UserId(1), true).await.unwrap();
        assert!(store.logger_enabled(UserId(1)).await.unwrap());

        assert!(store.rtmp_url(chat).await.unwrap().is_none());
        store
            .set_rtmp_url(chat, "rtmp://stream.example.org/live")
            .await
            .unwrap();
        assert_eq!(
            store.rtmp_url(chat).await.unwrap().as_deref(),
            Some("rtmp://stream.example.org/live")
        );
    }

    #[tokio::test]
    async fn file_backed_store_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("echotune.db");
        let path_str = path.to_string_lossy().into_owned();

        {
            let store = SqliteStore::open(&path_str).await.unwrap();
            store.set_assistant(ChatId(-1), "client1").await.unwrap();
            store.close().await.unwrap();
        }

        let store = SqliteStore::open(&path_str).await.unwrap();
        assert_eq!(
            store.assistant(ChatId(-1)).await.unwrap().as_deref(),
            Some("client1")
        );
    }
}
