//! Dead Simple Signing Envelope (DSSE) types
//!
//! DSSE is a signature envelope format used for signing arbitrary payloads.
//! Specification: https://github.com/secure-systems-lab/dsse

use crate::encoding::{KeyId, PayloadBytes, SignatureBytes};
use crate::error::{Error, Result};
use crate::intoto::{Statement, INTOTO_PAYLOAD_TYPE};
use serde::{Deserialize, Serialize};

/// A DSSE envelope containing a signed payload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseEnvelope {
    /// Base64 payload
    pub payload: PayloadBytes,
    /// Type URI of the payload
    pub payload_type: String,
    /// Signatures over the PAE
    #[serde(default)]
    pub signatures: Vec<DsseSignature>,
}

/// A signature in a DSSE envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DsseSignature {
    pub sig: SignatureBytes,
    #[serde(default)]
    pub keyid: KeyId,
}

impl DsseEnvelope {
    /// Create an unsigned envelope around an in-toto statement.
    pub fn for_statement(statement: &[u8]) -> Self {
        Self {
            payload: PayloadBytes::from_bytes(statement),
            payload_type: INTOTO_PAYLOAD_TYPE.to_string(),
            signatures: Vec::new(),
        }
    }

    /// Get the Pre-Authentication Encoding (PAE) string
    ///
    /// PAE is the string that gets signed in DSSE:
    /// `DSSEv1 <payload_type_len> <payload_type> <payload_len> <payload>`
    pub fn pae(&self) -> Vec<u8> {
        pae(&self.payload_type, self.payload.as_bytes())
    }

    /// Attach a signature.
    pub fn with_signature(mut self, sig: SignatureBytes) -> Self {
        self.signatures.push(DsseSignature {
            sig,
            keyid: KeyId::default(),
        });
        self
    }

    /// The first signature, the only one bundles carry.
    pub fn first_signature(&self) -> Option<&DsseSignature> {
        self.signatures.first()
    }

    /// Decode the payload as an in-toto statement.
    pub fn statement(&self) -> Result<Statement> {
        if self.payload.is_empty() {
            return Err(Error::MissingField("payload".to_string()));
        }
        Statement::from_slice(self.payload.as_bytes())
    }
}

/// Compute the Pre-Authentication Encoding (PAE)
///
/// Format: `DSSEv1 <len(type)> <type> <len(body)> <body>`
pub fn pae(payload_type: &str, payload: &[u8]) -> Vec<u8> {
    let mut result = format!(
        "DSSEv1 {} {} {} ",
        payload_type.len(),
        payload_type,
        payload.len()
    )
    .into_bytes();
    result.extend_from_slice(payload);
    result
}
