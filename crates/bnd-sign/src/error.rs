//! Error types for signing

use thiserror::Error;

/// Errors that abort a signing operation. No bundle is produced.
#[derive(Error, Debug)]
pub enum Error {
    /// Bad or missing configuration, raised before any network call
    #[error("invalid signing request: {0}")]
    Validation(String),

    #[error("identity acquisition failed: {0}")]
    Auth(#[from] bnd_oidc::Error),

    #[error("trust material unusable: {0}")]
    TrustMaterial(String),

    #[error("certificate issuance failed: {0}")]
    CertIssuance(String),

    #[error("transparency log publication failed: {0}")]
    LogPublish(String),

    #[error("timestamp request failed: {0}")]
    Timestamp(String),

    #[error("serialization failed: {0}")]
    Serialization(String),

    #[error("key generation failed: {0}")]
    KeyGeneration(String),

    #[error("signing failed: {0}")]
    Signing(String),
}

impl From<bnd_crypto::Error> for Error {
    fn from(err: bnd_crypto::Error) -> Self {
        match err {
            bnd_crypto::Error::KeyGeneration(msg) => Error::KeyGeneration(msg),
            other => Error::Signing(other.to_string()),
        }
    }
}

impl From<bnd_trust_root::Error> for Error {
    fn from(err: bnd_trust_root::Error) -> Self {
        Error::TrustMaterial(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
