use thiserror::Error;

use super::{ApiError, ChannelError, ComposeError, ConfigError};

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("JSON error: {source}")]
    Json {
        #[from]
        source: serde_json::Error,
    },
    #[error("HTTP client error: {source}")]
    Reqwest {
        #[from]
        source: reqwest::Error,
    },
    #[error("URL error: {source}")]
    Url {
        #[from]
        source: url::ParseError,
    },
    #[error("Api error: {0}")]
    Api(#[from] ApiError),
    #[error("Channel error: {0}")]
    Channel(#[from] ChannelError),
    #[error("Composer error: {0}")]
    Compose(#[from] ComposeError),
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn api<E>(error: E) -> Self
    where
        E: Into<ApiError>,
    {
        error.into().into()
    }

    pub fn channel<E>(error: E) -> Self
    where
        E: Into<ChannelError>,
    {
        error.into().into()
    }

    pub fn compose<E>(error: E) -> Self
    where
        E: Into<ComposeError>,
    {
        error.into().into()
    }

    pub fn config<E>(error: E) -> Self
    where
        E: Into<ConfigError>,
    {
        error.into().into()
    }
}
