//! Ephemeral signing keys

use bnd_types::{DerPublicKey, SignatureBytes};
use p256::ecdsa::signature::Signer;
use p256::ecdsa::{SigningKey, VerifyingKey};
use p256::pkcs8::{DecodePublicKey, EncodePublicKey, LineEnding};

use crate::error::{Error, Result};

/// An ECDSA P-256 keypair used for exactly one signing operation
pub struct KeyPair {
    signing_key: SigningKey,
}

impl KeyPair {
    /// Generate a fresh keypair.
    ///
    /// The public key is exported and parsed back before the pair is handed
    /// out; a key that does not survive that is reported as a generation
    /// failure.
    pub fn generate_ecdsa_p256() -> Result<Self> {
        let signing_key = SigningKey::random(&mut p256::elliptic_curve::rand_core::OsRng);
        let pair = Self { signing_key };

        let exported = pair.public_key_der()?;
        let reparsed = VerifyingKey::from_public_key_der(exported.as_bytes())
            .map_err(|e| Error::KeyGeneration(format!("public key does not re-import: {e}")))?;
        if &reparsed != pair.signing_key.verifying_key() {
            return Err(Error::KeyGeneration(
                "re-imported public key differs from generated key".to_string(),
            ));
        }
        Ok(pair)
    }

    /// Wrap an existing key.
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        Self { signing_key }
    }

    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// DER SubjectPublicKeyInfo of the public half.
    pub fn public_key_der(&self) -> Result<DerPublicKey> {
        let doc = self
            .signing_key
            .verifying_key()
            .to_public_key_der()
            .map_err(|e| Error::KeyGeneration(format!("cannot export public key: {e}")))?;
        Ok(DerPublicKey::from_bytes(doc.as_bytes()))
    }

    /// PEM `PUBLIC KEY` block of the public half.
    pub fn public_key_pem(&self) -> Result<String> {
        self.signing_key
            .verifying_key()
            .to_public_key_pem(LineEnding::LF)
            .map_err(|e| Error::KeyGeneration(format!("cannot export public key: {e}")))
    }

    /// Sign `data` with SHA-256, returning an ASN.1 DER signature.
    pub fn sign(&self, data: &[u8]) -> Result<SignatureBytes> {
        let signature: p256::ecdsa::Signature = self
            .signing_key
            .try_sign(data)
            .map_err(|e| Error::Signing(e.to_string()))?;
        Ok(SignatureBytes::from_bytes(signature.to_der().as_bytes()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair").finish_non_exhaustive()
    }
}
