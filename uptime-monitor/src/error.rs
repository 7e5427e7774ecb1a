//! Application-wide error types.

use thiserror::Error;

/// Application-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Application-wide error type.
///
/// Probe failures are not represented here: an unreachable site is reported
/// through [`crate::monitor::CheckResult`], never as an `Err`.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid rate limiter configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Invalid rate limit key: key must be a non-empty string")]
    InvalidKey,

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Notification error: {0}")]
    Notification(String),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn notification(msg: impl Into<String>) -> Self {
        Self::Notification(msg.into())
    }
}
