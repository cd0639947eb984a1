//! Helper functions for verification
//!
//! Validation time selection and the certificate checks that depend on it.

use bnd_crypto::{verify_code_signing_profile, verify_issued_by, CertificateInfo};
use bnd_trust_root::TrustedRoot;
use bnd_types::DerCertificate;
use chrono::{DateTime, TimeZone, Utc};

use crate::result::{Check, FailureReason};

/// Pick the time the certificate is validated at.
///
/// Priority order:
/// 1. the earliest verified RFC 3161 timestamp
/// 2. the earliest log integration time
/// 3. `now`
pub fn determine_validation_time(tsa_times: &[i64], integrated_times: &[i64], now: i64) -> i64 {
    tsa_times
        .iter()
        .min()
        .or_else(|| integrated_times.iter().min())
        .copied()
        .unwrap_or(now)
}

pub fn to_datetime(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

/// Validate certificate is within validity period
pub fn validate_certificate_time(time: i64, cert_info: &CertificateInfo) -> Check<()> {
    if time < cert_info.not_before {
        return Err(FailureReason::CertificateChain(format!(
            "certificate not yet valid: time {time} is before not_before {}",
            cert_info.not_before
        )));
    }
    if time > cert_info.not_after {
        return Err(FailureReason::CertificateChain(format!(
            "certificate has expired: time {time} is after not_after {}",
            cert_info.not_after
        )));
    }
    Ok(())
}

/// Find the trusted certificate that issued `cert_der`.
///
/// Only authorities whose validity window contains `validation_time` are
/// considered. A candidate must carry the leaf's issuer name as its subject
/// and its key must verify the leaf signature.
pub fn verify_certificate_chain<'a>(
    cert_der: &[u8],
    validation_time: i64,
    trusted_root: &'a TrustedRoot,
) -> Check<&'a DerCertificate> {
    let time = to_datetime(validation_time).ok_or_else(|| {
        FailureReason::CertificateChain(format!("invalid validation time {validation_time}"))
    })?;

    let mut candidates = 0;
    for ca in trusted_root.certificate_authorities_at(time) {
        for cert in ca.certificates() {
            candidates += 1;
            if verify_issued_by(cert_der, cert.as_bytes()).is_ok() {
                return Ok(cert);
            }
        }
    }

    if candidates == 0 {
        return Err(FailureReason::CertificateChain(format!(
            "no trusted certificate authority is valid at {time}"
        )));
    }
    Err(FailureReason::CertificateChain(
        "certificate does not chain to any trusted certificate authority".to_string(),
    ))
}

/// Check the code signing profile of the leaf.
pub fn verify_x509_profile(cert_der: &[u8]) -> Check<()> {
    verify_code_signing_profile(cert_der)
        .map_err(|e| FailureReason::CertificateChain(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use bnd_crypto::testing::TestCa;
    use bnd_crypto::{parse_certificate_info, KeyPair};
    use bnd_trust_root::{CertificateAuthority, TimeRange};

    fn root_with(cas: Vec<CertificateAuthority>) -> TrustedRoot {
        TrustedRoot {
            certificate_authorities: cas,
            ..Default::default()
        }
    }

    fn leaf(ca: &TestCa) -> DerCertificate {
        let key = KeyPair::generate_ecdsa_p256().unwrap();
        ca.issue_leaf(
            key.public_key_der().unwrap().as_bytes(),
            "alice@example.com",
            "https://issuer.example.com",
        )
        .unwrap()
    }

    #[test]
    fn test_validation_time_priority() {
        assert_eq!(determine_validation_time(&[30, 20], &[10], 99), 20);
        assert_eq!(determine_validation_time(&[], &[15, 10], 99), 10);
        assert_eq!(determine_validation_time(&[], &[], 99), 99);
    }

    #[test]
    fn test_chain_to_trusted_ca() {
        let ca = TestCa::new("root").unwrap();
        let leaf = leaf(&ca);
        let root = root_with(vec![CertificateAuthority::new(vec![ca.root_der().clone()])]);
        let now = Utc::now().timestamp();

        let issuer = verify_certificate_chain(leaf.as_bytes(), now, &root).unwrap();
        assert_eq!(issuer, ca.root_der());
        verify_x509_profile(leaf.as_bytes()).unwrap();
    }

    #[test]
    fn test_untrusted_ca_is_rejected() {
        let ca = TestCa::new("root").unwrap();
        let other = TestCa::new("root").unwrap();
        let leaf = leaf(&other);
        let root = root_with(vec![CertificateAuthority::new(vec![ca.root_der().clone()])]);

        let err =
            verify_certificate_chain(leaf.as_bytes(), Utc::now().timestamp(), &root).unwrap_err();
        assert!(matches!(err, FailureReason::CertificateChain(_)));
    }

    #[test]
    fn test_ca_window_is_respected() {
        let ca = TestCa::new("root").unwrap();
        let leaf = leaf(&ca);
        let future = Utc::now() + chrono::Duration::days(1);
        let root = root_with(vec![CertificateAuthority::new(vec![ca.root_der().clone()])
            .with_valid_for(TimeRange::starting_at(future))]);

        let err =
            verify_certificate_chain(leaf.as_bytes(), Utc::now().timestamp(), &root).unwrap_err();
        assert!(err.to_string().contains("no trusted certificate authority"));
    }

    #[test]
    fn test_certificate_time() {
        let ca = TestCa::new("root").unwrap();
        let info = parse_certificate_info(leaf(&ca).as_bytes()).unwrap();
        validate_certificate_time(info.not_before, &info).unwrap();
        assert!(validate_certificate_time(info.not_before - 1, &info).is_err());
        assert!(validate_certificate_time(info.not_after + 1, &info).is_err());
    }
}
