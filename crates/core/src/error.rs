//! Unified error types for strux.
//!
//! The cache is an optional accelerant, so most storage failures are
//! recovered locally and surface only as misses. The variants here cover
//! the cases that do propagate: construction of a durable backend and the
//! extraction call itself.

use tokio_rusqlite::rusqlite;

/// Unified error types for the caching subsystem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Cache directory or store file could not be created or opened.
    #[error("cache storage unavailable: {0}")]
    Io(#[from] std::io::Error),

    /// Database operation failed.
    #[error("cache database error: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("cache database error: migration failed: {0}")]
    MigrationFailed(String),

    /// Entry payload could not be serialized.
    #[error("cache entry serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The extraction provider call failed.
    #[error("extraction failed: {0}")]
    ExtractFailed(String),
}

impl From<tokio_rusqlite::Error<Error>> for Error {
    fn from(err: tokio_rusqlite::Error<Error>) -> Self {
        match err {
            tokio_rusqlite::Error::Error(e) => e,
            tokio_rusqlite::Error::ConnectionClosed => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
            tokio_rusqlite::Error::Close(c) => Error::Database(tokio_rusqlite::Error::Close(c)),
            _ => Error::Database(tokio_rusqlite::Error::ConnectionClosed),
        }
    }
}

impl From<tokio_rusqlite::Error<rusqlite::Error>> for Error {
    fn from(err: tokio_rusqlite::Error<rusqlite::Error>) -> Self {
        Error::Database(err)
    }
}

impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        Error::Database(tokio_rusqlite::Error::Error(err))
    }
}
