//! Attestation bundle verification
//!
//! Verifies that a bundle's DSSE envelope was signed by a certificate issued
//! from a trusted certificate authority, that independent observers (the
//! transparency log, CT logs and timestamp authorities) saw it, and that the
//! signer and statement subject are the ones the caller expects.
//!
//! # Example
//!
//! ```no_run
//! use bnd_verify::{VerificationPolicy, Verifier};
//! use bnd_trust_root::TrustRootConfig;
//!
//! # async fn example() -> Result<(), bnd_verify::Error> {
//! let policy = VerificationPolicy::builder()
//!     .issuer("https://accounts.google.com")
//!     .san("user@example.com")
//!     .artifact_digest(
//!         "sha256",
//!         "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9",
//!     )
//!     .build()?;
//!
//! let verifier = Verifier::from_config(TrustRootConfig::default());
//! let result = verifier.verify_path("artifact.intoto.json", &policy).await?;
//! if let Some(reason) = &result.failure {
//!     eprintln!("rejected: {reason}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod policy;
pub mod result;
mod verify;

// Private submodules for verification logic
mod verify_impl;

pub use bnd_bundle as bundle;
pub use bnd_trust_root as trust_root;
pub use bnd_types as types;

pub use error::{Error, Result};
pub use policy::{
    ArtifactPolicy, EvidenceRequirements, IdentityMatcher, IdentityPolicy, VerificationOptions,
    VerificationPolicy, VerificationPolicyBuilder,
};
pub use result::{Evidence, FailureReason, SignerIdentity, VerificationResult};
pub use verify::{verify, verify_with_options, Verifier};
