//! Database connection management with pragma configuration.
//!
//! Opens the SQLite store file, applies performance pragmas (WAL mode for
//! concurrent readers and writers), and runs migrations eagerly so an
//! unusable store fails at construction, not on first use.

use std::path::Path;

use tokio_rusqlite::Connection;

use super::migrations;
use crate::error::Error;

/// Entries database handle.
///
/// Wraps a tokio-rusqlite Connection that runs database operations on a
/// background thread, keeping blocking I/O off the caller's executor.
#[derive(Clone, Debug)]
pub struct CacheDb {
    pub(crate) conn: Connection,
}

impl CacheDb {
    /// Open a store file, creating it if it doesn't exist.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, Error> {
        let conn = Connection::open(path).await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    /// Open an in-memory store for testing.
    pub async fn open_in_memory() -> Result<Self, Error> {
        let conn = Connection::open_in_memory().await.map_err(|e| Error::Database(e.into()))?;
        Self::init(conn).await
    }

    async fn init(conn: Connection) -> Result<Self, Error> {
        conn.call(|conn| {
            conn.execute_batch(
                "PRAGMA journal_mode=WAL;
                 PRAGMA synchronous=NORMAL;
                 PRAGMA temp_store=MEMORY;",
            )?;
            Ok(())
        })
        .await
        .map_err(Error::Database)?;

        migrations::run(&conn).await?;

        Ok(Self { conn })
    }
}
