//! Bundle format types
//!
//! The bundle is the core artifact produced by signing and consumed by verification.
//! It contains the signed envelope, verification material (certificate chain),
//! transparency log entries and timestamps. Field names follow the protobuf-JSON
//! mapping of the public bundle format.

use crate::checkpoint::Checkpoint;
use crate::dsse::DsseEnvelope;
use crate::encoding::{
    int64_string, CanonicalizedBody, DerCertificate, HashBytes, LogKeyId, SignatureBytes,
    SignedTimestamp,
};
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Bundle media types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    /// Bundle format version 0.1
    Bundle0_1,
    /// Bundle format version 0.2
    Bundle0_2,
    /// Bundle format version 0.3
    Bundle0_3,
}

impl MediaType {
    /// Get the media type string
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Bundle0_1 => "application/vnd.dev.sigstore.bundle+json;version=0.1",
            MediaType::Bundle0_2 => "application/vnd.dev.sigstore.bundle+json;version=0.2",
            MediaType::Bundle0_3 => "application/vnd.dev.sigstore.bundle.v0.3+json",
        }
    }
}

impl FromStr for MediaType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "application/vnd.dev.sigstore.bundle+json;version=0.1" => Ok(MediaType::Bundle0_1),
            "application/vnd.dev.sigstore.bundle+json;version=0.2" => Ok(MediaType::Bundle0_2),
            "application/vnd.dev.sigstore.bundle.v0.3+json"
            | "application/vnd.dev.sigstore.bundle+json;version=0.3" => Ok(MediaType::Bundle0_3),
            _ => Err(Error::InvalidMediaType(s.to_string())),
        }
    }
}

/// The persisted attestation bundle
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub verification_material: Option<VerificationMaterial>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dsse_envelope: Option<DsseEnvelope>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_signature: Option<MessageSignature>,
}

/// Signature over a raw message digest, the non-DSSE bundle content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSignature {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_digest: Option<HashOutput>,
    pub signature: SignatureBytes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashOutput {
    pub algorithm: String,
    pub digest: HashBytes,
}

/// Material needed to verify the bundle signature
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationMaterial {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub certificate: Option<X509Certificate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x509_certificate_chain: Option<X509CertificateChain>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key: Option<PublicKeyIdentifier>,
    #[serde(default)]
    pub tlog_entries: Vec<TransparencyLogEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp_verification_data: Option<TimestampVerificationData>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct X509Certificate {
    pub raw_bytes: DerCertificate,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct X509CertificateChain {
    #[serde(default)]
    pub certificates: Vec<X509Certificate>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PublicKeyIdentifier {
    #[serde(default)]
    pub hint: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimestampVerificationData {
    #[serde(default)]
    pub rfc3161_timestamps: Vec<Rfc3161SignedTimestamp>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rfc3161SignedTimestamp {
    pub signed_timestamp: SignedTimestamp,
}

/// One transparency log entry recorded for the signature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogEntry {
    #[serde(with = "int64_string")]
    pub log_index: i64,
    pub log_id: LogId,
    pub kind_version: KindVersion,
    #[serde(default, with = "int64_string")]
    pub integrated_time: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_promise: Option<InclusionPromise>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inclusion_proof: Option<InclusionProof>,
    #[serde(default)]
    pub canonicalized_body: CanonicalizedBody,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogId {
    pub key_id: LogKeyId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindVersion {
    pub kind: String,
    pub version: String,
}

/// Signed entry timestamp issued by the log on submission
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionPromise {
    pub signed_entry_timestamp: SignatureBytes,
}

/// Merkle inclusion proof plus the signed checkpoint it was computed against
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InclusionProof {
    #[serde(with = "int64_string")]
    pub log_index: i64,
    pub root_hash: HashBytes,
    #[serde(with = "int64_string")]
    pub tree_size: i64,
    #[serde(default)]
    pub hashes: Vec<HashBytes>,
    pub checkpoint: CheckpointEnvelope,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckpointEnvelope {
    pub envelope: String,
}

impl InclusionProof {
    /// Parse the checkpoint text
    pub fn parse_checkpoint(&self) -> Result<Checkpoint> {
        Checkpoint::from_text(&self.checkpoint.envelope)
    }
}

impl Bundle {
    /// Parse a bundle from JSON
    pub fn from_json(json: &str) -> Result<Bundle> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize the bundle to JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize the bundle to pretty-printed JSON
    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Get the bundle version from the media type
    pub fn version(&self) -> Result<MediaType> {
        MediaType::from_str(&self.media_type)
    }

    /// The leaf (signing) certificate, if any.
    pub fn signing_certificate(&self) -> Option<&DerCertificate> {
        self.certificate_chain().into_iter().next()
    }

    /// All certificates of the verification material, leaf first.
    pub fn certificate_chain(&self) -> Vec<&DerCertificate> {
        let Some(vm) = self.verification_material.as_ref() else {
            return Vec::new();
        };
        if let Some(cert) = &vm.certificate {
            return vec![&cert.raw_bytes];
        }
        vm.x509_certificate_chain
            .as_ref()
            .map(|chain| chain.certificates.iter().map(|c| &c.raw_bytes).collect())
            .unwrap_or_default()
    }

    /// Get the transparency log entries
    pub fn tlog_entries(&self) -> &[TransparencyLogEntry] {
        self.verification_material
            .as_ref()
            .map(|vm| vm.tlog_entries.as_slice())
            .unwrap_or(&[])
    }

    /// Check if the bundle has an inclusion proof
    pub fn has_inclusion_proof(&self) -> bool {
        self.tlog_entries().iter().any(|e| e.inclusion_proof.is_some())
    }

    /// RFC 3161 timestamp tokens carried by the bundle.
    pub fn rfc3161_timestamps(&self) -> Vec<&SignedTimestamp> {
        self.verification_material
            .as_ref()
            .and_then(|vm| vm.timestamp_verification_data.as_ref())
            .map(|tvd| tvd.rfc3161_timestamps.iter().map(|t| &t.signed_timestamp).collect())
            .unwrap_or_default()
    }

    /// Get the DSSE envelope if present
    pub fn dsse_envelope(&self) -> Option<&DsseEnvelope> {
        self.dsse_envelope.as_ref()
    }

    /// Check if bundle contains a DSSE envelope
    pub fn is_dsse_envelope(&self) -> bool {
        self.dsse_envelope.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    pub(crate) const SAMPLE: &str = r#"{
      "mediaType": "application/vnd.dev.sigstore.bundle.v0.3+json",
      "verificationMaterial": {
        "certificate": {"rawBytes": "MIIB"},
        "tlogEntries": [{
          "logIndex": "25915956",
          "logId": {"keyId": "wNI9atQGlz+VWfO6LRygH4QUfY/8W4RFwiT5i5WRgB0="},
          "kindVersion": {"kind": "dsse", "version": "0.0.1"},
          "integratedTime": "1712085549",
          "inclusionPromise": {"signedEntryTimestamp": "MEUCIQ=="},
          "inclusionProof": {
            "logIndex": "25901137",
            "rootHash": "q83v",
            "treeSize": "25901138",
            "hashes": ["AAAA"],
            "checkpoint": {"envelope": "origin\n1\nq83v\n\n— origin AAAAAAA=\n"}
          },
          "canonicalizedBody": "e30="
        }],
        "timestampVerificationData": {"rfc3161Timestamps": [{"signedTimestamp": "MIIC"}]}
      },
      "dsseEnvelope": {
        "payload": "e30=",
        "payloadType": "application/vnd.in-toto+json",
        "signatures": [{"sig": "MEUC", "keyid": ""}]
      }
    }"#;

    #[test]
    fn test_media_type_parsing() {
        assert_eq!(
            MediaType::from_str("application/vnd.dev.sigstore.bundle+json;version=0.1").unwrap(),
            MediaType::Bundle0_1
        );
        assert_eq!(
            MediaType::from_str("application/vnd.dev.sigstore.bundle+json;version=0.2").unwrap(),
            MediaType::Bundle0_2
        );
        assert_eq!(
            MediaType::from_str("application/vnd.dev.sigstore.bundle.v0.3+json").unwrap(),
            MediaType::Bundle0_3
        );
        assert_eq!(
            MediaType::from_str("application/vnd.dev.sigstore.bundle+json;version=0.3").unwrap(),
            MediaType::Bundle0_3
        );
    }

    #[test]
    fn test_media_type_invalid() {
        assert!(MediaType::from_str("invalid").is_err());
    }

    #[test]
    fn test_parse_sample_bundle() {
        let bundle = Bundle::from_json(SAMPLE).unwrap();
        assert_eq!(bundle.version().unwrap(), MediaType::Bundle0_3);
        assert!(bundle.signing_certificate().is_some());
        assert_eq!(bundle.tlog_entries().len(), 1);
        assert_eq!(bundle.tlog_entries()[0].log_index, 25915956);
        assert_eq!(bundle.tlog_entries()[0].integrated_time, 1712085549);
        assert!(bundle.has_inclusion_proof());
        assert_eq!(bundle.rfc3161_timestamps().len(), 1);
        assert!(bundle.is_dsse_envelope());
    }

    #[test]
    fn test_int64_fields_written_as_strings() {
        let bundle = Bundle::from_json(SAMPLE).unwrap();
        let value: serde_json::Value = serde_json::from_str(&bundle.to_json().unwrap()).unwrap();
        let entry = &value["verificationMaterial"]["tlogEntries"][0];
        assert_eq!(entry["logIndex"], "25915956");
        assert_eq!(entry["inclusionProof"]["treeSize"], "25901138");
    }

    #[test]
    fn test_certificate_chain_variant() {
        let json = r#"{
          "mediaType": "application/vnd.dev.sigstore.bundle+json;version=0.1",
          "verificationMaterial": {"x509CertificateChain": {"certificates": [{"rawBytes": "AQI="}, {"rawBytes": "AwQ="}]}},
          "dsseEnvelope": {"payload": "e30=", "payloadType": "application/vnd.in-toto+json", "signatures": []}
        }"#;
        let bundle = Bundle::from_json(json).unwrap();
        let chain = bundle.certificate_chain();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].as_bytes(), &[1, 2]);
    }
}
