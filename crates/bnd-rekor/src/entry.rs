//! Rekor log entry types
//!
//! Request and response bodies of the v1 log API for `dsse` entries, plus
//! the canonical body and signed-entry-timestamp payload that verification
//! recomputes.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bnd_types::{CanonicalizedBody, DsseEnvelope};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Entry kind recorded for attestation bundles.
pub const DSSE_KIND: &str = "dsse";
/// Version of the `dsse` entry schema.
pub const DSSE_VERSION: &str = "0.0.1";

/// A log entry from Rekor
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// UUID of the entry (the key in the response map)
    #[serde(skip)]
    pub uuid: String,
    /// Body of the entry (base64 encoded)
    pub body: String,
    /// Integrated time (Unix timestamp)
    pub integrated_time: i64,
    /// Log ID (hex SHA-256 of the public key)
    #[serde(rename = "logID")]
    pub log_id: String,
    pub log_index: i64,
    #[serde(default)]
    pub verification: Option<Verification>,
}

/// Verification data for a log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    #[serde(default)]
    pub inclusion_proof: Option<InclusionProof>,
    /// Base64 signed entry timestamp (SET)
    #[serde(default)]
    pub signed_entry_timestamp: Option<String>,
}

/// Inclusion proof as returned by the v1 API (hex hashes)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    pub checkpoint: String,
    pub hashes: Vec<String>,
    pub log_index: i64,
    pub root_hash: String,
    pub tree_size: i64,
}

/// Response from creating a log entry (map of UUID to LogEntry)
pub type LogEntryResponse = HashMap<String, LogEntry>;

impl LogEntry {
    /// Take the single entry out of a creation response.
    pub fn from_response(response: LogEntryResponse) -> Result<Self> {
        let mut entries = response.into_iter();
        let (uuid, mut entry) = entries
            .next()
            .ok_or_else(|| Error::InvalidResponse("empty log entry response".to_string()))?;
        if entries.next().is_some() {
            return Err(Error::InvalidResponse(
                "log returned more than one entry".to_string(),
            ));
        }
        entry.uuid = uuid;
        Ok(entry)
    }

    /// Decoded entry body.
    pub fn body_bytes(&self) -> Result<Vec<u8>> {
        STANDARD
            .decode(&self.body)
            .map_err(|e| Error::InvalidResponse(format!("entry body is not base64: {e}")))
    }

    /// Decoded log id.
    pub fn log_id_bytes(&self) -> Result<Vec<u8>> {
        hex::decode(&self.log_id)
            .map_err(|e| Error::InvalidResponse(format!("log id is not hex: {e}")))
    }
}

/// DSSE entry proposed to the log
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseEntry {
    pub api_version: String,
    pub kind: String,
    pub spec: DsseEntrySpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseEntrySpec {
    pub proposed_content: DsseProposedContent,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DsseProposedContent {
    pub envelope: String,
    pub verifiers: Vec<String>,
}

impl DsseEntry {
    /// Create a new DSSE entry
    ///
    /// # Arguments
    /// * `envelope_json` - JSON-encoded DSSE envelope (sent as a string, not base64)
    /// * `certificate_pem` - PEM-encoded certificate (base64-encoded for the API)
    pub fn new(envelope_json: &str, certificate_pem: &str) -> Self {
        Self {
            api_version: DSSE_VERSION.to_string(),
            kind: DSSE_KIND.to_string(),
            spec: DsseEntrySpec {
                proposed_content: DsseProposedContent {
                    envelope: envelope_json.to_string(),
                    verifiers: vec![STANDARD.encode(certificate_pem)],
                },
            },
        }
    }
}

/// Canonicalized body the log stores for a `dsse` entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseBody {
    pub api_version: String,
    pub kind: String,
    pub spec: DsseBodySpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DsseBodySpec {
    pub envelope_hash: HashValue,
    pub payload_hash: HashValue,
    pub signatures: Vec<BodySignature>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashValue {
    pub algorithm: String,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BodySignature {
    /// Base64 signature
    pub signature: String,
    /// Base64 of the verifier PEM
    pub verifier: String,
}

impl DsseBody {
    /// The body a log derives from an envelope and its signing certificate.
    ///
    /// `envelope_sha256` and `payload_sha256` are hex digests.
    pub fn for_envelope(
        envelope: &DsseEnvelope,
        envelope_sha256: &str,
        payload_sha256: &str,
        certificate_pem: &str,
    ) -> Self {
        let verifier = STANDARD.encode(certificate_pem);
        Self {
            api_version: DSSE_VERSION.to_string(),
            kind: DSSE_KIND.to_string(),
            spec: DsseBodySpec {
                envelope_hash: HashValue {
                    algorithm: "sha256".to_string(),
                    value: envelope_sha256.to_string(),
                },
                payload_hash: HashValue {
                    algorithm: "sha256".to_string(),
                    value: payload_sha256.to_string(),
                },
                signatures: envelope
                    .signatures
                    .iter()
                    .map(|s| BodySignature {
                        signature: s.sig.to_base64(),
                        verifier: verifier.clone(),
                    })
                    .collect(),
            },
        }
    }

    /// Parse a canonicalized body, requiring kind `dsse`.
    pub fn from_canonicalized(body: &CanonicalizedBody) -> Result<Self> {
        let parsed: Self = serde_json::from_slice(body.as_bytes())?;
        if parsed.kind != DSSE_KIND {
            return Err(Error::InvalidResponse(format!(
                "expected a {DSSE_KIND} entry, got {}",
                parsed.kind
            )));
        }
        Ok(parsed)
    }

    /// Canonical JSON bytes (RFC 8785).
    pub fn canonical_json(&self) -> Result<Vec<u8>> {
        serde_json_canonicalizer::to_vec(self).map_err(|e| Error::Canonicalization(e.to_string()))
    }
}

#[derive(Serialize)]
struct SetPayload<'a> {
    body: &'a str,
    #[serde(rename = "integratedTime")]
    integrated_time: i64,
    #[serde(rename = "logIndex")]
    log_index: i64,
    #[serde(rename = "logID")]
    log_id: &'a str,
}

/// Bytes covered by a signed entry timestamp.
///
/// `body` is the base64 entry body and `log_id_hex` the hex log id.
pub fn signed_entry_timestamp_payload(
    body: &str,
    integrated_time: i64,
    log_index: i64,
    log_id_hex: &str,
) -> Result<Vec<u8>> {
    serde_json_canonicalizer::to_vec(&SetPayload {
        body,
        integrated_time,
        log_index,
        log_id: log_id_hex,
    })
    .map_err(|e| Error::Canonicalization(e.to_string()))
}
