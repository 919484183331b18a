//! Error types for the depth feed handler

use thiserror::Error;

/// Depth feed handler errors
#[derive(Error, Debug)]
pub enum FeedError {
    #[error("credential fetch failed: {0}")]
    CredentialFetch(String),

    #[error("malformed depth buffer: {len} bytes, need at least {min}")]
    MalformedBuffer { len: usize, min: usize },

    #[error("websocket connection error: {0}")]
    Socket(String),

    #[error("not connected")]
    NotConnected,

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<tokio_tungstenite::tungstenite::Error> for FeedError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        FeedError::Socket(err.to_string())
    }
}

impl From<serde_json::Error> for FeedError {
    fn from(err: serde_json::Error) -> Self {
        FeedError::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;
