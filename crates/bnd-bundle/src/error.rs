//! Error types for bundle handling

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The input is not a recognized bundle or statement
    #[error("format error: {0}")]
    Format(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Types(#[from] bnd_types::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
