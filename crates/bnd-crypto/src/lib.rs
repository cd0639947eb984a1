//! Cryptographic primitives for bnd
//!
//! Ephemeral ECDSA P-256 keys for signing, ECDSA verification over P-256 and
//! P-384, certificate inspection, embedded SCT handling, RFC 3161 timestamp tokens
//! and RFC 6962 Merkle inclusion proofs.

pub mod certificate;
pub mod error;
pub mod hash;
pub mod keypair;
pub mod merkle;
pub mod sct;
pub mod signing;
pub mod timestamp;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use certificate::{
    extract_tbs_der, parse_certificate_info, verify_code_signing_profile, verify_issued_by,
    CertificateInfo, OIDC_ISSUER_V1_OID, OIDC_ISSUER_V2_OID, SCT_LIST_OID,
};
pub use error::{Error, Result};
pub use hash::{digest_by_name, sha256};
pub use keypair::KeyPair;
pub use merkle::{leaf_hash, node_hash, verify_inclusion};
pub use sct::{embedded_scts, SignedCertificateTimestamp};
pub use signing::{curve_oid, verify_signature, verify_signature_auto, SigningScheme};
pub use timestamp::{
    parse_timestamp_response, parse_timestamp_token, verify_timestamp_token, TimestampInfo,
    TimestampRequest,
};
