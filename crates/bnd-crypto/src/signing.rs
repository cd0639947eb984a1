//! ECDSA signature verification
//!
//! Keys arrive as DER SubjectPublicKeyInfo and signatures as ASN.1 DER, the
//! encodings used by certificates, log keys and DSSE envelopes.

use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ID_EC_PUBLIC_KEY, SECP_256_R_1, SECP_384_R_1,
};
use const_oid::ObjectIdentifier;
use der::Decode;
use p256::ecdsa::signature::hazmat::PrehashVerifier;
use p256::ecdsa::signature::Verifier;
use p256::pkcs8::DecodePublicKey;
use sha2::{Digest, Sha256, Sha384};
use spki::SubjectPublicKeyInfoRef;

use crate::error::{Error, Result};

/// Curve and digest combinations this crate verifies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningScheme {
    EcdsaP256Sha256,
    EcdsaP256Sha384,
    EcdsaP384Sha256,
    EcdsaP384Sha384,
}

impl SigningScheme {
    /// Pick the scheme from a key's curve and a signature algorithm OID.
    pub fn from_oids(curve: ObjectIdentifier, signature_algorithm: ObjectIdentifier) -> Result<Self> {
        let p256 = curve == SECP_256_R_1;
        let p384 = curve == SECP_384_R_1;
        let sha256 = signature_algorithm == ECDSA_WITH_SHA_256;
        let sha384 = signature_algorithm == ECDSA_WITH_SHA_384;
        match (p256, p384, sha256, sha384) {
            (true, _, true, _) => Ok(Self::EcdsaP256Sha256),
            (true, _, _, true) => Ok(Self::EcdsaP256Sha384),
            (_, true, true, _) => Ok(Self::EcdsaP384Sha256),
            (_, true, _, true) => Ok(Self::EcdsaP384Sha384),
            _ => Err(Error::UnsupportedAlgorithm(format!(
                "curve {curve} with {signature_algorithm}"
            ))),
        }
    }

    /// The natural scheme for a key: SHA-256 on P-256, SHA-384 on P-384.
    pub fn default_for_key(public_key_der: &[u8]) -> Result<Self> {
        let curve = curve_oid(public_key_der)?;
        if curve == SECP_256_R_1 {
            Ok(Self::EcdsaP256Sha256)
        } else if curve == SECP_384_R_1 {
            Ok(Self::EcdsaP384Sha384)
        } else {
            Err(Error::UnsupportedAlgorithm(format!("curve {curve}")))
        }
    }
}

/// The named curve of an EC SubjectPublicKeyInfo.
pub fn curve_oid(public_key_der: &[u8]) -> Result<ObjectIdentifier> {
    let spki = SubjectPublicKeyInfoRef::from_der(public_key_der)
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    if spki.algorithm.oid != ID_EC_PUBLIC_KEY {
        return Err(Error::UnsupportedAlgorithm(format!(
            "key algorithm {}",
            spki.algorithm.oid
        )));
    }
    spki.algorithm
        .parameters_oid()
        .map_err(|e| Error::InvalidKey(format!("EC key has no curve: {e}")))
}

/// Verify a DER ECDSA signature over `data` with an explicit scheme.
pub fn verify_signature(
    public_key_der: &[u8],
    data: &[u8],
    signature: &[u8],
    scheme: SigningScheme,
) -> Result<()> {
    match scheme {
        SigningScheme::EcdsaP256Sha256 => {
            let (key, sig) = p256_parts(public_key_der, signature)?;
            key.verify(data, &sig).map_err(|_| Error::VerificationFailed)
        }
        SigningScheme::EcdsaP256Sha384 => {
            let (key, sig) = p256_parts(public_key_der, signature)?;
            key.verify_prehash(&Sha384::digest(data), &sig)
                .map_err(|_| Error::VerificationFailed)
        }
        SigningScheme::EcdsaP384Sha256 => {
            let (key, sig) = p384_parts(public_key_der, signature)?;
            key.verify_prehash(&Sha256::digest(data), &sig)
                .map_err(|_| Error::VerificationFailed)
        }
        SigningScheme::EcdsaP384Sha384 => {
            let (key, sig) = p384_parts(public_key_der, signature)?;
            key.verify(data, &sig).map_err(|_| Error::VerificationFailed)
        }
    }
}

/// Verify with the scheme implied by the key's curve.
pub fn verify_signature_auto(public_key_der: &[u8], data: &[u8], signature: &[u8]) -> Result<()> {
    let scheme = SigningScheme::default_for_key(public_key_der)?;
    verify_signature(public_key_der, data, signature, scheme)
}

fn p256_parts(
    public_key_der: &[u8],
    signature: &[u8],
) -> Result<(p256::ecdsa::VerifyingKey, p256::ecdsa::Signature)> {
    let key = p256::ecdsa::VerifyingKey::from_public_key_der(public_key_der)
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    let sig = p256::ecdsa::Signature::from_der(signature)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    Ok((key, sig))
}

fn p384_parts(
    public_key_der: &[u8],
    signature: &[u8],
) -> Result<(p384::ecdsa::VerifyingKey, p384::ecdsa::Signature)> {
    let key = p384::ecdsa::VerifyingKey::from_public_key_der(public_key_der)
        .map_err(|e| Error::InvalidKey(e.to_string()))?;
    let sig = p384::ecdsa::Signature::from_der(signature)
        .map_err(|e| Error::InvalidSignature(e.to_string()))?;
    Ok((key, sig))
}
