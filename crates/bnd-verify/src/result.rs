//! Verification outcomes

use std::fmt;

use serde::Serialize;

/// A check that passed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Evidence {
    CertificateChain,
    Signature,
    CertificateTransparency,
    TransparencyLog,
    Timestamp,
    Identity,
    ArtifactDigest,
}

impl fmt::Display for Evidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Evidence::CertificateChain => "certificate chain",
            Evidence::Signature => "signature",
            Evidence::CertificateTransparency => "certificate transparency",
            Evidence::TransparencyLog => "transparency log",
            Evidence::Timestamp => "timestamp",
            Evidence::Identity => "identity",
            Evidence::ArtifactDigest => "artifact digest",
        };
        f.write_str(name)
    }
}

/// Why a bundle was rejected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "check", content = "detail", rename_all = "kebab-case")]
pub enum FailureReason {
    /// Required evidence is absent from the bundle
    MissingEvidence(Evidence),
    Envelope(String),
    CertificateChain(String),
    Signature(String),
    TransparencyLog(String),
    CertificateTransparency(String),
    Timestamp(String),
    IdentityMismatch(String),
    ArtifactMismatch(String),
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::MissingEvidence(evidence) => {
                write!(f, "required {evidence} evidence is missing")
            }
            FailureReason::Envelope(msg) => write!(f, "envelope: {msg}"),
            FailureReason::CertificateChain(msg) => write!(f, "certificate chain: {msg}"),
            FailureReason::Signature(msg) => write!(f, "signature: {msg}"),
            FailureReason::TransparencyLog(msg) => write!(f, "transparency log: {msg}"),
            FailureReason::CertificateTransparency(msg) => {
                write!(f, "certificate transparency: {msg}")
            }
            FailureReason::Timestamp(msg) => write!(f, "timestamp: {msg}"),
            FailureReason::IdentityMismatch(msg) => write!(f, "identity mismatch: {msg}"),
            FailureReason::ArtifactMismatch(msg) => write!(f, "artifact mismatch: {msg}"),
        }
    }
}

/// The signer identity read from the leaf certificate
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignerIdentity {
    pub issuer: String,
    pub san: String,
}

/// Outcome of verifying one bundle against one policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationResult {
    pub accepted: bool,
    /// Set when the identity was checked and matched
    pub identity: Option<SignerIdentity>,
    pub identity_skipped: bool,
    pub artifact_skipped: bool,
    /// Checks that passed, in evaluation order
    pub evidence: Vec<Evidence>,
    /// The first failing check of a rejected bundle
    pub failure: Option<FailureReason>,
}

impl VerificationResult {
    pub fn is_accepted(&self) -> bool {
        self.accepted
    }
}

/// Result of a single check inside the verifier.
pub(crate) type Check<T> = std::result::Result<T, FailureReason>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failure_messages() {
        assert_eq!(
            FailureReason::MissingEvidence(Evidence::TransparencyLog).to_string(),
            "required transparency log evidence is missing"
        );
        assert_eq!(
            FailureReason::IdentityMismatch("x".to_string()).to_string(),
            "identity mismatch: x"
        );
    }

    #[test]
    fn test_result_serializes_for_reports() {
        let result = VerificationResult {
            accepted: false,
            identity: None,
            identity_skipped: true,
            artifact_skipped: true,
            evidence: vec![Evidence::CertificateChain],
            failure: Some(FailureReason::MissingEvidence(Evidence::Timestamp)),
        };
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["evidence"][0], "certificate-chain");
        assert_eq!(json["failure"]["check"], "missing-evidence");
        assert_eq!(json["failure"]["detail"], "timestamp");
    }
}
