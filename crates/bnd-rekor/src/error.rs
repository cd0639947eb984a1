//! Error types for the log client

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("log rejected the entry ({status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid log response: {0}")]
    InvalidResponse(String),

    #[error("canonicalization failed: {0}")]
    Canonicalization(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
