//! Signed certificate timestamps embedded in the signing certificate

use bnd_crypto::{embedded_scts, parse_certificate_info, sha256, verify_signature_auto};
use bnd_trust_root::TrustedRoot;
use chrono::{TimeZone, Utc};

use crate::result::{Check, FailureReason};

fn ct_error(msg: impl Into<String>) -> FailureReason {
    FailureReason::CertificateTransparency(msg.into())
}

/// How many SCTs the leaf carries and how many verified.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SctOutcome {
    pub present: usize,
    pub verified: usize,
}

/// Verify the SCTs of `leaf_der`, which was issued by `issuer_der`.
///
/// SCTs from unknown logs or with unsupported algorithms are skipped, not
/// failed; the caller decides whether zero verified SCTs is acceptable.
pub fn verify_embedded_scts(
    leaf_der: &[u8],
    issuer_der: &[u8],
    trusted_root: &TrustedRoot,
) -> Check<SctOutcome> {
    let (scts, precert_tbs) =
        embedded_scts(leaf_der).map_err(|e| ct_error(format!("failed to read SCTs: {e}")))?;
    let mut outcome = SctOutcome {
        present: scts.len(),
        verified: 0,
    };
    if scts.is_empty() {
        return Ok(outcome);
    }

    let issuer = parse_certificate_info(issuer_der)
        .map_err(|e| ct_error(format!("failed to parse issuer: {e}")))?;
    let issuer_key_hash = sha256(&issuer.public_key);

    for sct in &scts {
        let Some(log) = trusted_root.ctlog_by_id(&sct.log_id) else {
            tracing::debug!(log_id = %hex::encode(sct.log_id), "SCT from unknown CT log");
            continue;
        };
        if !sct.is_supported_algorithm() {
            continue;
        }
        let Some(time) = i64::try_from(sct.timestamp)
            .ok()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        else {
            continue;
        };
        if !log.is_valid_at(time) {
            continue;
        }
        let Some(key) = log.key() else {
            continue;
        };
        let signed = sct.signed_data(&issuer_key_hash, &precert_tbs);
        if verify_signature_auto(key.as_bytes(), &signed, &sct.signature).is_ok() {
            outcome.verified += 1;
        }
    }
    Ok(outcome)
}
