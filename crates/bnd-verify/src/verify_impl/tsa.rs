//! RFC 3161 timestamp verification
//!
//! A token is accepted when it was signed by the leaf of a trusted timestamp
//! authority, covers the envelope signature and carries a generation time
//! inside both the authority's window and the leaf's validity.

use bnd_crypto::{parse_certificate_info, verify_issued_by, verify_timestamp_token};
use bnd_trust_root::{CertificateAuthority, TrustedRoot};
use bnd_types::SignedTimestamp;

use super::helpers::to_datetime;
use crate::result::{Check, FailureReason};

fn tsa_error(msg: impl Into<String>) -> FailureReason {
    FailureReason::Timestamp(msg.into())
}

/// Verify every token and return their generation times.
pub fn verify_timestamps(
    tokens: &[&SignedTimestamp],
    signature: &[u8],
    trusted_root: &TrustedRoot,
) -> Check<Vec<i64>> {
    if !tokens.is_empty() && trusted_root.timestamp_authorities.is_empty() {
        return Err(tsa_error(
            "bundle carries timestamps but no timestamp authority is trusted",
        ));
    }

    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            verify_timestamp(token.as_bytes(), signature, trusted_root)
                .map_err(|e| tsa_error(format!("token {i}: {e}")))
        })
        .collect()
}

fn verify_timestamp(token: &[u8], signature: &[u8], trusted_root: &TrustedRoot) -> Result<i64, String> {
    let mut last_error = "no timestamp authority signed the token".to_string();
    for authority in &trusted_root.timestamp_authorities {
        match verify_with_authority(token, signature, authority) {
            Ok(gen_time) => return Ok(gen_time),
            Err(e) => last_error = e,
        }
    }
    Err(last_error)
}

fn verify_with_authority(
    token: &[u8],
    signature: &[u8],
    authority: &CertificateAuthority,
) -> Result<i64, String> {
    let leaf = authority
        .leaf()
        .ok_or_else(|| "timestamp authority has an empty chain".to_string())?;

    let info = verify_timestamp_token(token, leaf.as_bytes()).map_err(|e| e.to_string())?;
    info.check_imprint(signature).map_err(|e| e.to_string())?;

    // leaf first, root last
    let chain: Vec<_> = authority.certificates().collect();
    for pair in chain.windows(2) {
        verify_issued_by(pair[0].as_bytes(), pair[1].as_bytes())
            .map_err(|e| format!("timestamp authority chain: {e}"))?;
    }

    let gen_time = to_datetime(info.gen_time)
        .ok_or_else(|| format!("invalid generation time {}", info.gen_time))?;
    if !authority.is_valid_at(gen_time) {
        return Err(format!(
            "generation time {gen_time} is outside the timestamp authority window"
        ));
    }
    let leaf_info = parse_certificate_info(leaf.as_bytes()).map_err(|e| e.to_string())?;
    if info.gen_time < leaf_info.not_before || info.gen_time > leaf_info.not_after {
        return Err(format!(
            "generation time {gen_time} is outside the TSA certificate validity"
        ));
    }
    Ok(info.gen_time)
}
