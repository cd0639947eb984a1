//! Keyless signing for bnd
//!
//! The [`Signer`] wraps an in-toto statement in a DSSE envelope, signs it with
//! an ephemeral key certified for an OIDC identity, countersigns the
//! signature with RFC 3161 timestamps, records it in a transparency log and
//! packages everything as a v0.3 bundle.
//!
//! The certificate authority, transparency log and timestamp authorities
//! sit behind the [`CertificateIssuer`], [`LogPublisher`] and
//! [`TimestampAuthority`] traits; identity and trust material come from
//! `bnd-oidc` and `bnd-trust-root`.

pub mod error;
pub mod fulcio;
pub mod log;
pub mod request;
pub mod sign;
pub mod tsa;

pub use error::{Error, Result};
pub use fulcio::{CertificateIssuer, CertificateRequest, FulcioClient};
pub use log::{LogPublisher, RekorPublisher};
pub use request::{ServiceTimeouts, SigningRequest};
pub use sign::Signer;
pub use tsa::{TimestampAuthority, TsaClient};
