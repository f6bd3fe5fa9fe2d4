// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned schema migrations, tracked via `PRAGMA user_version`.

use rusqlite::Connection;

/// Ordered migration steps; the index + 1 is the schema version.
const MIGRATIONS: &[&str] = &[
    // v1: base schema
    "CREATE TABLE IF NOT EXISTS chats (
        id INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY
    );
    CREATE TABLE IF NOT EXISTS assistants (
        chat_id INTEGER PRIMARY KEY,
        name TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS chat_settings (
        chat_id INTEGER PRIMARY KEY,
        play_mode TEXT NOT NULL DEFAULT 'everyone',
        admin_mode TEXT NOT NULL DEFAULT 'everyone',
        lang TEXT NOT NULL DEFAULT 'en',
        rtmp_url TEXT
    );
    CREATE TABLE IF NOT EXISTS logger_flags (
        bot_id INTEGER PRIMARY KEY,
        enabled INTEGER NOT NULL DEFAULT 0
    );
    CREATE TABLE IF NOT EXISTS auth_users (
        chat_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        PRIMARY KEY (chat_id, user_id)
    );
    CREATE TABLE IF NOT EXISTS chat_admins (
        chat_id INTEGER NOT NULL,
        user_id INTEGER NOT NULL,
        PRIMARY KEY (chat_id, user_id)
    );
    CREATE TABLE IF NOT EXISTS playlists (
        id TEXT PRIMARY KEY,
        name TEXT NOT NULL,
        owner_id INTEGER NOT NULL
    );
    CREATE TABLE IF NOT EXISTS playlist_songs (
        playlist_id TEXT NOT NULL REFERENCES playlists(id) ON DELETE CASCADE,
        track_id TEXT NOT NULL,
        track_json TEXT NOT NULL,
        position INTEGER NOT NULL,
        PRIMARY KEY (playlist_id, track_id)
    );",
];

/// Applies every migration newer than the connection's `user_version`.
pub fn run(conn: &mut Connection) -> rusqlite::Result<()> {
    let version: i64 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

    for (index, migration) in MIGRATIONS.iter().enumerate() {
        let target = (index + 1) as i64;
        if version < target {
            let tx = conn.transaction()?;
            tx.execute_batch(migration)?;
            tx.execute_batch(&format!("PRAGMA user_version = {target};"))?;
            tx.commit()?;
        }
    }
    Ok(())
}
