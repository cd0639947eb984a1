//! Error types for verification
//!
//! These are operational errors. A bundle that is well formed but does not
//! satisfy the policy is not an error; it yields a rejected
//! [`VerificationResult`](crate::VerificationResult).

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// The root of trust could not be resolved or is empty
    #[error("trust material unusable: {0}")]
    TrustMaterial(String),

    /// Contradictory or underspecified policy, raised before any check runs
    #[error("invalid verification policy: {0}")]
    Policy(String),

    /// The input is not a bundle
    #[error("format error: {0}")]
    Format(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<bnd_trust_root::Error> for Error {
    fn from(err: bnd_trust_root::Error) -> Self {
        Error::TrustMaterial(err.to_string())
    }
}

impl From<bnd_bundle::Error> for Error {
    fn from(err: bnd_bundle::Error) -> Self {
        match err {
            bnd_bundle::Error::Io(e) => Error::Io(e),
            other => Error::Format(other.to_string()),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
