//! Bundle builder
//!
//! Assembles a v0.3 bundle from the pieces the signer collects, and converts
//! log API responses into bundle log entries.

use bnd_rekor::LogEntry;
use bnd_types::{
    Bundle, CanonicalizedBody, CheckpointEnvelope, DerCertificate, DsseEnvelope, HashBytes,
    InclusionPromise, InclusionProof, KindVersion, LogId, LogKeyId, MediaType,
    Rfc3161SignedTimestamp, SignatureBytes, SignedTimestamp, TimestampVerificationData,
    TransparencyLogEntry, VerificationMaterial, X509Certificate,
};

use crate::error::{Error, Result};

/// A bundle in v0.3 format under construction.
///
/// v0.3 carries a single leaf certificate rather than a chain.
///
/// # Example
///
/// ```ignore
/// use bnd_bundle::BundleV03;
///
/// let bundle = BundleV03::with_certificate_and_dsse(cert_der, envelope)
///     .with_tlog_entry(tlog_entry)
///     .with_rfc3161_timestamp(token)
///     .into_bundle();
/// ```
#[derive(Debug, Clone)]
pub struct BundleV03 {
    pub certificate: DerCertificate,
    pub envelope: DsseEnvelope,
    pub tlog_entries: Vec<TransparencyLogEntry>,
    pub rfc3161_timestamps: Vec<SignedTimestamp>,
}

impl BundleV03 {
    /// Start a bundle from the signing certificate and signed envelope.
    pub fn with_certificate_and_dsse(certificate: DerCertificate, envelope: DsseEnvelope) -> Self {
        Self {
            certificate,
            envelope,
            tlog_entries: Vec::new(),
            rfc3161_timestamps: Vec::new(),
        }
    }

    pub fn with_tlog_entry(mut self, entry: TransparencyLogEntry) -> Self {
        self.tlog_entries.push(entry);
        self
    }

    /// Add a DER RFC 3161 timestamp token.
    pub fn with_rfc3161_timestamp(mut self, timestamp: SignedTimestamp) -> Self {
        self.rfc3161_timestamps.push(timestamp);
        self
    }

    pub fn into_bundle(self) -> Bundle {
        let timestamp_verification_data = if self.rfc3161_timestamps.is_empty() {
            None
        } else {
            Some(TimestampVerificationData {
                rfc3161_timestamps: self
                    .rfc3161_timestamps
                    .into_iter()
                    .map(|signed_timestamp| Rfc3161SignedTimestamp { signed_timestamp })
                    .collect(),
            })
        };

        Bundle {
            media_type: MediaType::Bundle0_3.as_str().to_string(),
            verification_material: Some(VerificationMaterial {
                certificate: Some(X509Certificate {
                    raw_bytes: self.certificate,
                }),
                x509_certificate_chain: None,
                public_key: None,
                tlog_entries: self.tlog_entries,
                timestamp_verification_data,
            }),
            dsse_envelope: Some(self.envelope),
            message_signature: None,
        }
    }
}

/// Convert a log API response entry into a bundle log entry.
///
/// The v1 API returns the log id and proof hashes as hex and the body and
/// SET as base64; the bundle carries raw bytes for all of them.
pub fn tlog_entry_from_log_entry(
    entry: &LogEntry,
    kind: &str,
    version: &str,
) -> Result<TransparencyLogEntry> {
    let log_id = entry
        .log_id_bytes()
        .map_err(|e| Error::Format(e.to_string()))?;
    let body = entry.body_bytes().map_err(|e| Error::Format(e.to_string()))?;

    let mut tlog_entry = TransparencyLogEntry {
        log_index: entry.log_index,
        log_id: LogId {
            key_id: LogKeyId::new(log_id),
        },
        kind_version: KindVersion {
            kind: kind.to_string(),
            version: version.to_string(),
        },
        integrated_time: entry.integrated_time,
        inclusion_promise: None,
        inclusion_proof: None,
        canonicalized_body: CanonicalizedBody::new(body),
    };

    let Some(verification) = &entry.verification else {
        return Ok(tlog_entry);
    };

    if let Some(set) = &verification.signed_entry_timestamp {
        tlog_entry.inclusion_promise = Some(InclusionPromise {
            signed_entry_timestamp: SignatureBytes::from_base64(set)?,
        });
    }

    if let Some(proof) = &verification.inclusion_proof {
        let decode_hex = |h: &str| {
            hex::decode(h)
                .map(HashBytes::new)
                .map_err(|e| Error::Format(format!("proof hash is not hex: {e}")))
        };
        tlog_entry.inclusion_proof = Some(InclusionProof {
            log_index: proof.log_index,
            root_hash: decode_hex(&proof.root_hash)?,
            tree_size: proof.tree_size,
            hashes: proof
                .hashes
                .iter()
                .map(|h| decode_hex(h))
                .collect::<Result<Vec<_>>>()?,
            checkpoint: CheckpointEnvelope {
                envelope: proof.checkpoint.clone(),
            },
        });
    }

    Ok(tlog_entry)
}
