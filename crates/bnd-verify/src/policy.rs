//! Verification policy
//!
//! [`VerificationOptions`] is the flat, serializable option set a caller
//! fills in. [`VerificationPolicy`] is what the verifier runs, and the only
//! way to get one is through [`VerificationPolicyBuilder::build`] or
//! `TryFrom<&VerificationOptions>`, which reject contradictory or missing
//! identity constraints before any check runs.

use std::fmt;

use bnd_trust_root::TrustRootConfig;
use bnd_types::ArtifactDigest;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Flat verification options
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationOptions {
    /// Hex digest of the artifact; empty skips the artifact binding check
    pub artifact_digest: String,
    pub artifact_digest_algo: String,
    pub expected_issuer: String,
    pub expected_issuer_regex: String,
    pub expected_san: String,
    pub expected_san_regex: String,
    pub skip_identity_check: bool,
    pub require_ctlog: bool,
    pub require_tlog: bool,
    pub require_timestamp: bool,
    pub trust_root: TrustRootConfig,
}

impl Default for VerificationOptions {
    fn default() -> Self {
        Self {
            artifact_digest: String::new(),
            artifact_digest_algo: "sha256".to_string(),
            expected_issuer: String::new(),
            expected_issuer_regex: String::new(),
            expected_san: String::new(),
            expected_san_regex: String::new(),
            skip_identity_check: false,
            require_ctlog: true,
            require_tlog: true,
            require_timestamp: true,
            trust_root: TrustRootConfig::default(),
        }
    }
}

/// How one identity dimension is matched
#[derive(Debug, Clone)]
pub enum IdentityMatcher {
    Exact(String),
    /// Matches anywhere in the value unless the pattern anchors itself
    Pattern(Regex),
}

impl IdentityMatcher {
    /// Compile `pattern` as given. Use `^` and `$` to match the whole value.
    pub fn pattern(pattern: &str) -> Result<Self> {
        Regex::new(pattern)
            .map(IdentityMatcher::Pattern)
            .map_err(|e| Error::Policy(format!("invalid regular expression {pattern:?}: {e}")))
    }

    pub fn matches(&self, value: &str) -> bool {
        match self {
            IdentityMatcher::Exact(expected) => expected == value,
            IdentityMatcher::Pattern(re) => re.is_match(value),
        }
    }
}

impl fmt::Display for IdentityMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentityMatcher::Exact(value) => write!(f, "{value:?}"),
            IdentityMatcher::Pattern(re) => write!(f, "/{}/", re.as_str()),
        }
    }
}

/// Expected signer identity
#[derive(Debug, Clone)]
pub enum IdentityPolicy {
    /// No identity constraint at all. Unsafe, and reported as such.
    Skip,
    /// At least one dimension is constrained; `None` accepts any value.
    Match {
        issuer: Option<IdentityMatcher>,
        san: Option<IdentityMatcher>,
    },
}

/// Expected artifact binding
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactPolicy {
    /// Any subject is accepted. Unsafe, and reported as such.
    Skip,
    Digest(ArtifactDigest),
}

/// Evidence a bundle must carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EvidenceRequirements {
    /// An embedded SCT verified against a CT log
    pub ctlog: bool,
    /// A log entry with a verified inclusion proof
    pub tlog: bool,
    /// A verified RFC 3161 timestamp or a log-promised integration time
    pub timestamp: bool,
}

impl Default for EvidenceRequirements {
    fn default() -> Self {
        Self {
            ctlog: true,
            tlog: true,
            timestamp: true,
        }
    }
}

/// A checked verification policy
#[derive(Debug, Clone)]
pub struct VerificationPolicy {
    pub(crate) identity: IdentityPolicy,
    pub(crate) artifact: ArtifactPolicy,
    pub(crate) evidence: EvidenceRequirements,
}

impl VerificationPolicy {
    pub fn builder() -> VerificationPolicyBuilder {
        VerificationPolicyBuilder::default()
    }

    pub fn identity(&self) -> &IdentityPolicy {
        &self.identity
    }

    pub fn artifact(&self) -> &ArtifactPolicy {
        &self.artifact
    }

    pub fn evidence(&self) -> EvidenceRequirements {
        self.evidence
    }
}

/// Builder for [`VerificationPolicy`]
///
/// # Example
///
/// ```
/// use bnd_verify::VerificationPolicy;
///
/// let policy = VerificationPolicy::builder()
///     .issuer("https://token.actions.githubusercontent.com")
///     .san_regex("https://github.com/acme/.*")
///     .build()
///     .unwrap();
///
/// // a literal and a pattern for the same dimension is a contradiction
/// assert!(VerificationPolicy::builder()
///     .san("alice@example.com")
///     .san_regex(".*@example.com")
///     .build()
///     .is_err());
/// ```
#[derive(Debug, Clone, Default)]
pub struct VerificationPolicyBuilder {
    issuer: Option<String>,
    issuer_regex: Option<String>,
    san: Option<String>,
    san_regex: Option<String>,
    skip_identity: bool,
    artifact: Option<(String, String)>,
    evidence: EvidenceRequirements,
}

impl VerificationPolicyBuilder {
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = Some(issuer.into());
        self
    }

    pub fn issuer_regex(mut self, pattern: impl Into<String>) -> Self {
        self.issuer_regex = Some(pattern.into());
        self
    }

    pub fn san(mut self, san: impl Into<String>) -> Self {
        self.san = Some(san.into());
        self
    }

    pub fn san_regex(mut self, pattern: impl Into<String>) -> Self {
        self.san_regex = Some(pattern.into());
        self
    }

    /// Accept any signer. Only for callers that check identity elsewhere.
    pub fn skip_identity(mut self) -> Self {
        self.skip_identity = true;
        self
    }

    /// Require a statement subject with this digest. An empty hex value
    /// leaves the artifact binding unchecked.
    pub fn artifact_digest(mut self, algorithm: impl Into<String>, hex: impl Into<String>) -> Self {
        self.artifact = Some((algorithm.into(), hex.into()));
        self
    }

    pub fn require_ctlog(mut self, required: bool) -> Self {
        self.evidence.ctlog = required;
        self
    }

    pub fn require_tlog(mut self, required: bool) -> Self {
        self.evidence.tlog = required;
        self
    }

    pub fn require_timestamp(mut self, required: bool) -> Self {
        self.evidence.timestamp = required;
        self
    }

    pub fn build(self) -> Result<VerificationPolicy> {
        let issuer = dimension("issuer", self.issuer, self.issuer_regex)?;
        let san = dimension("subject alternative name", self.san, self.san_regex)?;

        let identity = match (self.skip_identity, issuer, san) {
            (true, None, None) => IdentityPolicy::Skip,
            (true, _, _) => {
                return Err(Error::Policy(
                    "identity check cannot be both skipped and constrained".to_string(),
                ))
            }
            (false, None, None) => {
                return Err(Error::Policy(
                    "expected certificate issuer/identity not defined".to_string(),
                ))
            }
            (false, issuer, san) => IdentityPolicy::Match { issuer, san },
        };

        let artifact = match self.artifact {
            Some((algorithm, hex)) if !hex.trim().is_empty() => ArtifactPolicy::Digest(
                ArtifactDigest::new(&algorithm, &hex)
                    .map_err(|e| Error::Policy(format!("invalid artifact digest: {e}")))?,
            ),
            _ => ArtifactPolicy::Skip,
        };

        Ok(VerificationPolicy {
            identity,
            artifact,
            evidence: self.evidence,
        })
    }
}

/// Resolve one identity dimension. Empty strings count as unset.
fn dimension(
    name: &str,
    literal: Option<String>,
    pattern: Option<String>,
) -> Result<Option<IdentityMatcher>> {
    let literal = literal.filter(|s| !s.is_empty());
    let pattern = pattern.filter(|s| !s.is_empty());
    match (literal, pattern) {
        (Some(_), Some(_)) => Err(Error::Policy(format!(
            "only one of {name} or {name} regex may be set"
        ))),
        (Some(literal), None) => Ok(Some(IdentityMatcher::Exact(literal))),
        (None, Some(pattern)) => IdentityMatcher::pattern(&pattern).map(Some),
        (None, None) => Ok(None),
    }
}

impl TryFrom<&VerificationOptions> for VerificationPolicy {
    type Error = Error;

    fn try_from(opts: &VerificationOptions) -> Result<Self> {
        let mut builder = VerificationPolicy::builder()
            .issuer(&opts.expected_issuer)
            .issuer_regex(&opts.expected_issuer_regex)
            .san(&opts.expected_san)
            .san_regex(&opts.expected_san_regex)
            .artifact_digest(&opts.artifact_digest_algo, &opts.artifact_digest)
            .require_ctlog(opts.require_ctlog)
            .require_tlog(opts.require_tlog)
            .require_timestamp(opts.require_timestamp);
        if opts.skip_identity_check {
            builder = builder.skip_identity();
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DIGEST: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_default_options() {
        let opts = VerificationOptions::default();
        assert_eq!(opts.artifact_digest_algo, "sha256");
        assert!(opts.require_ctlog && opts.require_tlog && opts.require_timestamp);
        assert!(!opts.skip_identity_check);
    }

    #[test]
    fn test_identity_is_required() {
        let err = VerificationPolicy::try_from(&VerificationOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Policy(_)));
        assert!(err.to_string().contains("not defined"));
    }

    #[test]
    fn test_literal_and_pattern_conflict() {
        let opts = VerificationOptions {
            expected_issuer: "https://issuer".to_string(),
            expected_issuer_regex: "https://.*".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            VerificationPolicy::try_from(&opts),
            Err(Error::Policy(_))
        ));

        let opts = VerificationOptions {
            expected_san: "alice@example.com".to_string(),
            expected_san_regex: ".*".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            VerificationPolicy::try_from(&opts),
            Err(Error::Policy(_))
        ));
    }

    #[test]
    fn test_skip_conflicts_with_constraints() {
        let opts = VerificationOptions {
            skip_identity_check: true,
            expected_san: "alice@example.com".to_string(),
            ..Default::default()
        };
        assert!(matches!(
            VerificationPolicy::try_from(&opts),
            Err(Error::Policy(_))
        ));

        let opts = VerificationOptions {
            skip_identity_check: true,
            ..Default::default()
        };
        let policy = VerificationPolicy::try_from(&opts).unwrap();
        assert!(matches!(policy.identity(), IdentityPolicy::Skip));
        assert_eq!(policy.artifact(), &ArtifactPolicy::Skip);
    }

    #[test]
    fn test_single_dimension_is_enough() {
        let policy = VerificationPolicy::builder()
            .san("alice@example.com")
            .build()
            .unwrap();
        match policy.identity() {
            IdentityPolicy::Match { issuer, san } => {
                assert!(issuer.is_none());
                assert!(san.as_ref().unwrap().matches("alice@example.com"));
            }
            IdentityPolicy::Skip => panic!("expected a constrained identity"),
        }
    }

    #[test]
    fn test_patterns_match_substrings() {
        let matcher = IdentityMatcher::pattern("@example\\.com").unwrap();
        assert!(matcher.matches("alice@example.com"));
        assert!(matcher.matches("alice@example.com.evil"));
        assert!(!matcher.matches("alice@example.org"));

        let matcher = IdentityMatcher::pattern("https://github.com/acme/").unwrap();
        assert!(matcher.matches("https://github.com/acme/repo"));
    }

    #[test]
    fn test_explicit_anchors_are_honored() {
        let matcher = IdentityMatcher::pattern("^[a-z]+@example\\.com$").unwrap();
        assert!(matcher.matches("alice@example.com"));
        assert!(!matcher.matches("alice@example.com.evil"));
        assert!(!matcher.matches("mallory+alice@example.com"));
    }

    #[test]
    fn test_invalid_regex_is_policy_error() {
        let err = VerificationPolicy::builder()
            .issuer_regex("(unclosed")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Policy(_)));
    }

    #[test]
    fn test_artifact_digest() {
        let policy = VerificationPolicy::builder()
            .skip_identity()
            .artifact_digest("sha256", DIGEST.to_uppercase())
            .build()
            .unwrap();
        match policy.artifact() {
            ArtifactPolicy::Digest(digest) => assert_eq!(digest.hex, DIGEST),
            ArtifactPolicy::Skip => panic!("expected a digest"),
        }

        let err = VerificationPolicy::builder()
            .skip_identity()
            .artifact_digest("sha256", "not hex")
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Policy(_)));
    }

    #[test]
    fn test_evidence_flags_carry_over() {
        let opts = VerificationOptions {
            skip_identity_check: true,
            require_ctlog: false,
            require_timestamp: false,
            ..Default::default()
        };
        let policy = VerificationPolicy::try_from(&opts).unwrap();
        assert_eq!(
            policy.evidence(),
            EvidenceRequirements {
                ctlog: false,
                tlog: true,
                timestamp: false,
            }
        );
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let opts: VerificationOptions =
            serde_json::from_str(r#"{"expected_san": "alice@example.com"}"#).unwrap();
        assert_eq!(opts.expected_san, "alice@example.com");
        assert!(opts.require_tlog);
    }
}
