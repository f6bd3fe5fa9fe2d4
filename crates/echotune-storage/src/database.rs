// SPDX-FileCopyrightText: 2026 Echotune Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Database connection management with PRAGMA setup, WAL mode, and lifecycle.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread. Do NOT create additional Connection instances for writes.

use echotune_core::Error;
use tokio_rusqlite::Connection;
use tracing::debug;

use crate::migrations;

/// Maps a tokio-rusqlite error into the workspace error type.
pub fn map_tr_err(e: tokio_rusqlite::Error) -> Error {
    Error::Storage {
        source: Box::new(e),
    }
}

/// Owned database handle.
pub struct Database {
    connection: Connection,
}

impl Database {
    /// Opens (creating if needed) the database at `path`, applies PRAGMAs,
    /// and runs pending migrations.
    pub async fn open(path: &str) -> Result<Self, Error> {
        let connection = Connection::open(path).await.map_err(map_tr_err)?;

        connection
            .call(|conn| {
                conn.execute_batch(
                    "PRAGMA journal_mode = WAL;
                     PRAGMA synchronous = NORMAL;
                     PRAGMA foreign_keys = ON;
                     PRAGMA busy_timeout = 5000;",
                )?;
                migrations::run(conn)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;

        debug!(path, "database opened");
        Ok(Self { connection })
    }

    /// In-memory database for tests.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let connection = Connection::open_in_memory().await.map_err(map_tr_err)?;
        connection
            .call(|conn| {
                migrations::run(conn)?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)?;
        Ok(Self { connection })
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Flushes the WAL before shutdown.
    pub async fn checkpoint(&self) -> Result<(), Error> {
        self.connection
            .call(|conn| {
                conn.execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")?;
                Ok(())
            })
            .await
            .map_err(map_tr_err)
    }
}
