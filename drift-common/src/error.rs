//! Common error types for drift

use thiserror::Error;

/// Common result type for drift operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the daemon and its support code.
///
/// Lock-wait timeouts are deliberately absent: a blown wait ceiling is
/// logged and overridden inside the operation lock, never surfaced.
#[derive(Error, Debug)]
pub enum Error {
    /// Durable storage failure (wraps sqlx::Error)
    #[error("storage error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Remote catalog unreachable, unreadable, or empty.
    /// Always propagated to the caller; there is no fallback track.
    #[error("catalog fetch error: {0}")]
    Fetch(String),

    /// Configuration loading or validation error
    #[error("configuration error: {0}")]
    Config(String),

    /// Internal error (corrupt persisted value, dead worker, ...)
    #[error("internal error: {0}")]
    Internal(String),
}
