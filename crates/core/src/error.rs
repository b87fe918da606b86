//! Unified error types for etagcache.
//!
//! Display strings carry a stable code prefix so callers can match on
//! the failure class without inspecting variants.

use std::path::PathBuf;
use tokio_rusqlite::rusqlite;

/// Unified error type shared by the stores and the request coordinator.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid URL.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(String),

    /// The origin answered 304 but no body is cached for the key.
    #[error("CACHE_MISS: {0}")]
    CacheMiss(String),

    /// Database operation failed.
    #[error("CACHE_ERROR: {0}")]
    Database(tokio_rusqlite::Error),

    /// Migration failed to apply.
    #[error("CACHE_ERROR: migration failed: {0}")]
    MigrationFailed(String),

    /// The cache directory could not be created.
    #[error("CACHE_ERROR: failed to create cache directory {path}: {source}")]
    StoreDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The transport could not execute the request.
    #[error("TRANSPORT_ERROR: {0}")]
    Transport(String),

    /// The transport timed out.
    #[error("TRANSPORT_TIMEOUT: {0}")]
    TransportTimeout(String),

    /// Response body exceeds the configured limit.
    #[error("BODY_TOO_LARGE: {0}")]
    BodyTooLarge(String),
}

impl Error {
    /// True for failures raised by the persisted stores.
    pub fn is_store_error(&self) -> bool {
        matches!(self, Error::Database(_) | Error::MigrationFailed(_) | Error::StoreDir { .. })
    }

    /// True for failures raised while executing the request or reading its body.
    pub fn is_transport_error(&self) -> bool {
        matches!(self, Error::Transport(_) | Error::TransportTimeout(_) | Error::BodyTooLarge(_))
    }
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
