//! Error types for trust root resolution

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// No source yielded a usable trust root
    #[error("fetching trust root: {0}")]
    Fetch(String),

    #[error("TUF error: {0}")]
    Tuf(String),

    /// The document parsed but fails consistency checks
    #[error("inconsistent trust root: {0}")]
    Inconsistent(String),

    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
