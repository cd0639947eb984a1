//! Error types for the bundle data model

use thiserror::Error;

/// Errors raised while parsing or interpreting wire types
#[derive(Error, Debug)]
pub enum Error {
    #[error("invalid media type: {0}")]
    InvalidMediaType(String),

    #[error("missing field: {0}")]
    MissingField(String),

    #[error("invalid base64: {0}")]
    Base64(String),

    #[error("invalid hex: {0}")]
    Hex(String),

    #[error("invalid PEM: {0}")]
    InvalidPem(String),

    #[error("invalid checkpoint: {0}")]
    InvalidCheckpoint(String),

    #[error("invalid statement: {0}")]
    InvalidStatement(String),

    #[error("unsupported hash algorithm: {0}")]
    UnsupportedHashAlgorithm(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
