use std::io;
use std::result::Result as StdResult;
use teloxide::RequestError;
use thiserror::Error;

use crate::models::Pair;

#[derive(Debug, Error)]
pub enum Error {
    #[error("API error: {0}")]
    ApiError(String),
    #[error("API invalid data: {0}")]
    ApiInvalidData(String),
    #[error("API invalid format: {0}")]
    ApiInvalidFormat(String),
    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),
    #[error("No data returned for {pair}")]
    NoData { pair: Pair },
    #[error("Persistence failure: {0}")]
    PersistenceFailure(String),
    #[error("Notification failure: {0}")]
    NotificationFailure(String),
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Internal error: {0}")]
    InternalError(String),
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl Error {
    /// Per-pair conditions the fetch loop skips instead of aborting the cycle.
    pub fn is_pair_local(&self) -> bool {
        matches!(
            self,
            Error::NoData { .. } | Error::ApiInvalidData(_) | Error::ApiInvalidFormat(_)
        )
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::ApiInvalidFormat(err.to_string())
    }
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::DatabaseError(err.to_string())
    }
}

impl From<RequestError> for Error {
    fn from(err: RequestError) -> Self {
        Error::NotificationFailure(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<toml::ser::Error> for Error {
    fn from(err: toml::ser::Error) -> Self {
        Error::ConfigError(err.to_string())
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::InternalError(err.to_string())
    }
}

pub type Result<T> = StdResult<T, Error>;
