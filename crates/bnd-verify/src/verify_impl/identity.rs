//! Signer identity matching

use bnd_crypto::CertificateInfo;

use crate::policy::{IdentityMatcher, IdentityPolicy};
use crate::result::{Check, FailureReason, SignerIdentity};

/// Match the leaf's issuer and SAN against the policy.
///
/// Returns the matched identity, or `None` when the check is skipped.
pub fn check_identity(
    policy: &IdentityPolicy,
    cert_info: &CertificateInfo,
) -> Check<Option<SignerIdentity>> {
    let IdentityPolicy::Match { issuer, san } = policy else {
        return Ok(None);
    };

    let actual_issuer = cert_info.oidc_issuer.clone().unwrap_or_default();
    let actual_san = cert_info.san.clone().unwrap_or_default();

    check_dimension("issuer", issuer.as_ref(), &actual_issuer)?;
    check_dimension("subject alternative name", san.as_ref(), &actual_san)?;

    Ok(Some(SignerIdentity {
        issuer: actual_issuer,
        san: actual_san,
    }))
}

fn check_dimension(name: &str, expected: Option<&IdentityMatcher>, actual: &str) -> Check<()> {
    match expected {
        Some(matcher) if !matcher.matches(actual) => Err(FailureReason::IdentityMismatch(format!(
            "certificate {name} {actual:?} does not match {matcher}"
        ))),
        _ => Ok(()),
    }
}
