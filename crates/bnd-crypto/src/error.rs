//! Error types for cryptographic operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("invalid public key: {0}")]
    InvalidKey(String),

    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    #[error("signature verification failed")]
    VerificationFailed,

    #[error("signing failed: {0}")]
    Signing(String),

    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    #[error("certificate error: {0}")]
    Certificate(String),

    #[error("timestamp error: {0}")]
    Timestamp(String),

    #[error("invalid inclusion proof: {0}")]
    InclusionProof(String),

    #[error("DER error: {0}")]
    Der(#[from] der::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
