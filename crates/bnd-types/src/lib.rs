//! Core types and data structures for bnd
//!
//! This crate provides the wire data model shared by signing and verification:
//! the bundle format, DSSE envelopes, in-toto statements, transparency log
//! entries and their checkpoints.

pub mod artifact;
pub mod bundle;
pub mod checkpoint;
pub mod dsse;
pub mod encoding;
pub mod error;
pub mod hash;
pub mod intoto;

pub use artifact::ArtifactDigest;
pub use bundle::{
    Bundle, CheckpointEnvelope, HashOutput, InclusionPromise, InclusionProof, KindVersion, LogId,
    MediaType, MessageSignature, PublicKeyIdentifier, Rfc3161SignedTimestamp,
    TimestampVerificationData, TransparencyLogEntry, VerificationMaterial, X509Certificate,
    X509CertificateChain,
};
pub use checkpoint::{Checkpoint, CheckpointSignature};
pub use dsse::{pae, DsseEnvelope, DsseSignature};
pub use encoding::{
    base64_bytes, int64_string, to_pem, CanonicalizedBody, DerCertificate, DerPublicKey,
    HashBytes, KeyId, LogKeyId, PayloadBytes, SignatureBytes, SignedTimestamp,
};
pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use intoto::{Digest, Statement, Subject, INTOTO_PAYLOAD_TYPE, STATEMENT_TYPE_V1};

/// User agent sent on every outbound request.
pub const USER_AGENT: &str = concat!("bnd/", env!("CARGO_PKG_VERSION"));
