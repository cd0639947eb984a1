//! Error types for identity acquisition

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// An ambient provider detected its environment but could not deliver
    #[error("ambient credentials from {name}: {message}")]
    Provider { name: String, message: String },

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("HTTP error: {0}")]
    Http(String),

    #[error("invalid identity token: {0}")]
    Token(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
