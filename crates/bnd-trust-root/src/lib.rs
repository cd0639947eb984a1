//! Root of trust resolution
//!
//! This crate resolves the documents that anchor signing and verification:
//!
//! - the trusted root, listing certificate authorities, transparency logs,
//!   CT logs and timestamp authorities with their validity windows;
//! - the signing configuration, listing the service endpoints a signer uses.
//!
//! Both are fetched from a TUF repository or read from local files, and
//! cached for the life of the process by [`TrustRootResolver`].
//!
//! # Example
//!
//! ```no_run
//! use bnd_trust_root::{TrustRootConfig, TrustRootResolver, TrustRootSource};
//!
//! # async fn example() -> Result<(), bnd_trust_root::Error> {
//! let resolver = TrustRootResolver::new(TrustRootConfig::default());
//! let material = resolver.resolve().await?;
//! println!("{} certificate authorities", material.trusted_root.certificate_authorities.len());
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod resolver;
pub mod signing_config;
pub mod trusted_root;
pub mod tuf;

pub use error::{Error, Result};
pub use resolver::{
    StaticTrustRoot, TrustMaterial, TrustRootConfig, TrustRootResolver, TrustRootSource,
};
pub use signing_config::{
    Service, ServiceConfiguration, ServiceSelection, ServiceSelector, SigningConfig,
    SIGNING_CONFIG_MEDIA_TYPE, SUPPORTED_CA_VERSIONS, SUPPORTED_REKOR_VERSIONS,
    SUPPORTED_TSA_VERSIONS,
};
pub use trusted_root::{
    CertChain, CertificateAuthority, DistinguishedName, PublicKey, TimeRange,
    TransparencyLogInstance, TrustedRoot, TRUSTED_ROOT_MEDIA_TYPE_V01,
    TRUSTED_ROOT_MEDIA_TYPE_V02,
};
pub use tuf::{
    sanitize_url, TufClient, TufConfig, UserAgentTransport, DEFAULT_TUF_URL,
    SIGNING_CONFIG_TARGET, STAGING_TUF_URL, TRUSTED_ROOT_TARGET,
};
