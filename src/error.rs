//! Error types for the realtime channel

use std::time::Duration;

/// Result type for channel operations
pub type ChannelResult<T> = Result<T, ChannelError>;

/// Errors raised while opening or talking over the channel
#[derive(thiserror::Error, Debug)]
pub enum ChannelError {
    #[error("invalid realtime endpoint: {0}")]
    InvalidEndpoint(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Errors raised while reading configuration
#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("{name} must be {expected}, got {value:?}")]
    Invalid {
        name: &'static str,
        expected: &'static str,
        value: String,
    },
    #[error("{name} is not a valid url: {source}")]
    Url {
        name: &'static str,
        #[source]
        source: url::ParseError,
    },
    #[error("{name} must be greater than zero, got {value:?}")]
    ZeroDuration { name: &'static str, value: Duration },
    #[error(transparent)]
    Endpoint(#[from] ChannelError),
}
