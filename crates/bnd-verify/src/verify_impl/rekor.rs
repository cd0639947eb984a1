//! Transparency log entry bodies
//!
//! A `dsse` v0.0.1 body records the payload hash and, for every envelope
//! signature, the signature and the certificate that verifies it. The
//! envelope hash is not checked: it covers the JSON the signer submitted,
//! which cannot be reproduced byte for byte.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bnd_rekor::{DsseBody, DSSE_KIND, DSSE_VERSION};
use bnd_types::{DerCertificate, DsseEnvelope, SignatureBytes, TransparencyLogEntry};

use crate::result::{Check, FailureReason};

fn tlog_error(msg: impl Into<String>) -> FailureReason {
    FailureReason::TransparencyLog(msg.into())
}

/// Check that `entry` records this envelope signed by `certificate`.
pub fn verify_dsse_body(
    entry: &TransparencyLogEntry,
    envelope: &DsseEnvelope,
    certificate: &DerCertificate,
) -> Check<()> {
    let kind = &entry.kind_version;
    if kind.kind != DSSE_KIND || kind.version != DSSE_VERSION {
        return Err(tlog_error(format!(
            "unsupported entry type {}/{}",
            kind.kind, kind.version
        )));
    }

    let body = DsseBody::from_canonicalized(&entry.canonicalized_body)
        .map_err(|e| tlog_error(format!("failed to parse entry body: {e}")))?;

    let payload_hash = hex::encode(bnd_crypto::sha256(envelope.payload.as_bytes()));
    let expected = &body.spec.payload_hash;
    if expected.algorithm != "sha256" || !expected.value.eq_ignore_ascii_case(&payload_hash) {
        return Err(tlog_error(format!(
            "DSSE payload hash mismatch: computed {payload_hash}, entry has {}:{}",
            expected.algorithm, expected.value
        )));
    }

    if envelope.signatures.len() != body.spec.signatures.len() {
        return Err(tlog_error(format!(
            "DSSE signature count mismatch: bundle has {}, entry has {}",
            envelope.signatures.len(),
            body.spec.signatures.len()
        )));
    }

    // Both the signature and its verifier must match, or a signature could
    // be paired with a different certificate.
    for signature in &envelope.signatures {
        let recorded = body.spec.signatures.iter().any(|logged| {
            let same_sig = SignatureBytes::from_base64(&logged.signature)
                .is_ok_and(|s| s.as_bytes() == signature.sig.as_bytes());
            same_sig && verifier_certificate(&logged.verifier).as_ref() == Some(certificate)
        });
        if !recorded {
            return Err(tlog_error(
                "DSSE signature does not match any signature in the log entry",
            ));
        }
    }
    Ok(())
}

/// Decode a body verifier: base64 of a PEM certificate.
fn verifier_certificate(verifier: &str) -> Option<DerCertificate> {
    let pem = STANDARD.decode(verifier).ok()?;
    DerCertificate::from_pem(std::str::from_utf8(&pem).ok()?).ok()
}
