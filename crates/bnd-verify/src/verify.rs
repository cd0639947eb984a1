//! Bundle verification
//!
//! [`verify`] runs every check against a trusted root the caller already
//! holds. [`Verifier`] resolves the trusted root first and accepts bundles
//! as parsed values, raw bytes or file paths.
//!
//! Checks run in a fixed order and the first failing one decides the
//! [`FailureReason`] of a rejected result:
//!
//! 1. envelope shape and payload
//! 2. RFC 3161 timestamps and transparency log entries
//! 3. certificate chain at the validation time
//! 4. envelope signature
//! 5. certificate transparency, log inclusion and timestamp requirements
//! 6. signer identity
//! 7. artifact digest

use std::path::Path;
use std::sync::Arc;

use bnd_crypto::{parse_certificate_info, verify_signature_auto};
use bnd_trust_root::{
    StaticTrustRoot, TrustMaterial, TrustRootConfig, TrustRootResolver, TrustRootSource,
    TrustedRoot,
};
use bnd_types::{Bundle, DsseEnvelope, Statement};
use chrono::Utc;
use tokio::io::AsyncReadExt;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::policy::{ArtifactPolicy, IdentityPolicy, VerificationOptions, VerificationPolicy};
use crate::result::{Check, Evidence, FailureReason, SignerIdentity, VerificationResult};
use crate::verify_impl::helpers::{
    determine_validation_time, validate_certificate_time, verify_certificate_chain,
    verify_x509_profile,
};
use crate::verify_impl::identity::check_identity;
use crate::verify_impl::sct::verify_embedded_scts;
use crate::verify_impl::tlog::verify_tlog_entry;
use crate::verify_impl::tsa::verify_timestamps;

/// Verify `bundle` against `policy` using `trusted_root`.
///
/// Returns `Err` only when the trusted root cannot be used. Every other
/// problem, including a malformed envelope, produces a rejected result.
pub fn verify(
    bundle: &Bundle,
    policy: &VerificationPolicy,
    trusted_root: &TrustedRoot,
) -> Result<VerificationResult> {
    if trusted_root.certificate_authorities.is_empty() {
        return Err(Error::TrustMaterial(
            "trusted root has no certificate authorities".to_string(),
        ));
    }

    let identity_skipped = matches!(policy.identity(), IdentityPolicy::Skip);
    let artifact_skipped = matches!(policy.artifact(), ArtifactPolicy::Skip);
    if identity_skipped {
        warn!("signer identity check is disabled; any signer will be accepted");
    }
    if artifact_skipped {
        warn!("artifact digest check is disabled; the statement subject is not checked");
    }

    let mut evidence = Vec::new();
    let outcome = run_checks(bundle, policy, trusted_root, &mut evidence);

    let result = match outcome {
        Ok(identity) => VerificationResult {
            accepted: true,
            identity,
            identity_skipped,
            artifact_skipped,
            evidence,
            failure: None,
        },
        Err(reason) => VerificationResult {
            accepted: false,
            identity: None,
            identity_skipped,
            artifact_skipped,
            evidence,
            failure: Some(reason),
        },
    };

    match &result.failure {
        None => info!(evidence = ?result.evidence, "bundle verified"),
        Some(reason) => info!(%reason, "bundle rejected"),
    }
    Ok(result)
}

fn run_checks(
    bundle: &Bundle,
    policy: &VerificationPolicy,
    trusted_root: &TrustedRoot,
    evidence: &mut Vec<Evidence>,
) -> Check<Option<SignerIdentity>> {
    let requirements = policy.evidence();

    let (envelope, statement) = check_envelope(bundle)?;
    let signature = envelope.signatures[0].sig.as_bytes();

    let leaf = bundle.signing_certificate().ok_or_else(|| {
        FailureReason::CertificateChain("bundle has no signing certificate".to_string())
    })?;
    let cert_info = parse_certificate_info(leaf.as_bytes()).map_err(|e| {
        FailureReason::CertificateChain(format!("failed to parse signing certificate: {e}"))
    })?;

    let tsa_times = verify_timestamps(&bundle.rfc3161_timestamps(), signature, trusted_root)?;

    let mut included = false;
    let mut integrated_times = Vec::new();
    for entry in bundle.tlog_entries() {
        let verified = verify_tlog_entry(entry, envelope, leaf, trusted_root)?;
        included |= verified.included;
        integrated_times.extend(verified.integrated_time);
    }

    let validation_time =
        determine_validation_time(&tsa_times, &integrated_times, Utc::now().timestamp());
    debug!(validation_time, "selected validation time");

    let issuer = verify_certificate_chain(leaf.as_bytes(), validation_time, trusted_root)?;
    validate_certificate_time(validation_time, &cert_info)?;
    verify_x509_profile(leaf.as_bytes())?;
    evidence.push(Evidence::CertificateChain);

    verify_signature_auto(&cert_info.public_key, &envelope.pae(), signature).map_err(|e| {
        FailureReason::Signature(format!("envelope signature does not verify: {e}"))
    })?;
    evidence.push(Evidence::Signature);

    // each observer must have seen the signature while the certificate was valid
    for time in tsa_times.iter().chain(&integrated_times) {
        validate_certificate_time(*time, &cert_info)?;
    }

    let scts = verify_embedded_scts(leaf.as_bytes(), issuer.as_bytes(), trusted_root)?;
    if scts.verified > 0 {
        evidence.push(Evidence::CertificateTransparency);
    } else if requirements.ctlog {
        return Err(if scts.present == 0 {
            FailureReason::MissingEvidence(Evidence::CertificateTransparency)
        } else {
            FailureReason::CertificateTransparency(
                "no embedded SCT verifies with a trusted CT log".to_string(),
            )
        });
    }

    if included {
        evidence.push(Evidence::TransparencyLog);
    } else if requirements.tlog {
        return Err(if bundle.tlog_entries().is_empty() {
            FailureReason::MissingEvidence(Evidence::TransparencyLog)
        } else {
            FailureReason::TransparencyLog(
                "no log entry carries an inclusion proof".to_string(),
            )
        });
    }

    if !tsa_times.is_empty() || !integrated_times.is_empty() {
        evidence.push(Evidence::Timestamp);
    } else if requirements.timestamp {
        return Err(FailureReason::MissingEvidence(Evidence::Timestamp));
    }

    let identity = check_identity(policy.identity(), &cert_info)?;
    if identity.is_some() {
        evidence.push(Evidence::Identity);
    }

    check_artifact(policy.artifact(), &statement)?;
    if !matches!(policy.artifact(), ArtifactPolicy::Skip) {
        evidence.push(Evidence::ArtifactDigest);
    }

    Ok(identity)
}

/// The envelope, its single signature and its decoded statement.
fn check_envelope(bundle: &Bundle) -> Check<(&DsseEnvelope, Statement)> {
    let envelope = bundle.dsse_envelope().ok_or_else(|| {
        FailureReason::Envelope("bundle does not wrap a DSSE envelope".to_string())
    })?;
    let statement = envelope
        .statement()
        .map_err(|e| FailureReason::Envelope(format!("unable to extract payload: {e}")))?;
    if envelope.signatures.len() != 1 {
        return Err(FailureReason::Envelope(format!(
            "expected exactly one signature, found {}",
            envelope.signatures.len()
        )));
    }
    Ok((envelope, statement))
}

fn check_artifact(policy: &ArtifactPolicy, statement: &Statement) -> Check<()> {
    match policy {
        ArtifactPolicy::Skip => Ok(()),
        ArtifactPolicy::Digest(digest) if digest.matches(statement) => Ok(()),
        ArtifactPolicy::Digest(digest) => Err(FailureReason::ArtifactMismatch(format!(
            "no statement subject has digest {digest}"
        ))),
    }
}

/// Verifies bundles against a resolved root of trust.
///
/// # Example
///
/// ```no_run
/// use bnd_verify::{VerificationPolicy, Verifier};
/// use bnd_trust_root::TrustRootConfig;
///
/// # async fn example() -> Result<(), bnd_verify::Error> {
/// let verifier = Verifier::from_config(TrustRootConfig::default());
/// let policy = VerificationPolicy::builder()
///     .issuer("https://token.actions.githubusercontent.com")
///     .san_regex("https://github.com/acme/.*")
///     .build()?;
/// let result = verifier.verify_path("attestation.json", &policy).await?;
/// println!("accepted: {}", result.is_accepted());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Verifier {
    trust: Arc<dyn TrustRootSource>,
}

impl Verifier {
    pub fn new(source: Arc<dyn TrustRootSource>) -> Self {
        Self { trust: source }
    }

    /// Resolve trust material through TUF or a local file as configured.
    pub fn from_config(config: TrustRootConfig) -> Self {
        Self::new(Arc::new(TrustRootResolver::new(config)))
    }

    /// Verify against a fixed trusted root.
    pub fn with_trusted_root(trusted_root: TrustedRoot) -> Self {
        Self::new(Arc::new(StaticTrustRoot::new(TrustMaterial::new(
            trusted_root,
        ))))
    }

    async fn material(&self) -> Result<Arc<TrustMaterial>> {
        Ok(self.trust.resolve().await?)
    }

    pub async fn verify_bundle(
        &self,
        bundle: &Bundle,
        policy: &VerificationPolicy,
    ) -> Result<VerificationResult> {
        let material = self.material().await?;
        verify(bundle, policy, &material.trusted_root)
    }

    /// Decode and verify a serialized bundle.
    pub async fn verify_bytes(
        &self,
        bytes: &[u8],
        policy: &VerificationPolicy,
    ) -> Result<VerificationResult> {
        let bundle = bnd_bundle::decode(bytes)?;
        self.verify_bundle(&bundle, policy).await
    }

    /// Read a bundle from `path`, or from standard input when it is `-`.
    pub async fn verify_path(
        &self,
        path: impl AsRef<Path>,
        policy: &VerificationPolicy,
    ) -> Result<VerificationResult> {
        let path = path.as_ref();
        let bytes = if path == Path::new("-") {
            let mut buf = Vec::new();
            tokio::io::stdin().read_to_end(&mut buf).await?;
            buf
        } else {
            tokio::fs::read(path).await?
        };
        debug!(path = %path.display(), len = bytes.len(), "read bundle");
        self.verify_bytes(&bytes, policy).await
    }

    /// Build the policy from flat options and verify.
    pub async fn verify_with_options(
        &self,
        bundle: &Bundle,
        options: &VerificationOptions,
    ) -> Result<VerificationResult> {
        let policy = VerificationPolicy::try_from(options)?;
        self.verify_bundle(bundle, &policy).await
    }
}

impl std::fmt::Debug for Verifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Verifier").finish_non_exhaustive()
    }
}

/// Verify with a verifier built from `options.trust_root`.
pub async fn verify_with_options(
    bundle: &Bundle,
    options: &VerificationOptions,
) -> Result<VerificationResult> {
    Verifier::from_config(options.trust_root.clone())
        .verify_with_options(bundle, options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use bnd_bundle::BundleV03;
    use bnd_crypto::testing::TestCa;
    use bnd_crypto::KeyPair;
    use bnd_trust_root::CertificateAuthority;
    use bnd_types::SignatureBytes;

    const STATEMENT: &str = r#"{"_type":"https://in-toto.io/Statement/v1","subject":[{"name":"a","digest":{"sha256":"b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"}}],"predicateType":"https://example.com/p","predicate":{}}"#;

    fn signed_bundle(ca: &TestCa, san: &str) -> Bundle {
        let key = KeyPair::generate_ecdsa_p256().unwrap();
        let leaf = ca
            .issue_leaf(
                key.public_key_der().unwrap().as_bytes(),
                san,
                "https://issuer.example.com",
            )
            .unwrap();
        let envelope = DsseEnvelope::for_statement(STATEMENT.as_bytes());
        let sig = key.sign(&envelope.pae()).unwrap();
        BundleV03::with_certificate_and_dsse(leaf, envelope.with_signature(sig)).into_bundle()
    }

    fn lenient() -> VerificationPolicy {
        VerificationPolicy::builder()
            .san("alice@example.com")
            .require_ctlog(false)
            .require_tlog(false)
            .require_timestamp(false)
            .build()
            .unwrap()
    }

    fn root_for(ca: &TestCa) -> TrustedRoot {
        TrustedRoot {
            certificate_authorities: vec![CertificateAuthority::new(vec![ca
                .root_der()
                .clone()])],
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_trusted_root_is_an_error() {
        let ca = TestCa::new("root").unwrap();
        let bundle = signed_bundle(&ca, "alice@example.com");
        assert!(matches!(
            verify(&bundle, &lenient(), &TrustedRoot::default()),
            Err(Error::TrustMaterial(_))
        ));
    }

    #[test]
    fn test_accepted_without_observers_when_not_required() {
        let ca = TestCa::new("root").unwrap();
        let bundle = signed_bundle(&ca, "alice@example.com");
        let result = verify(&bundle, &lenient(), &root_for(&ca)).unwrap();
        assert!(result.is_accepted(), "{:?}", result.failure);
        assert_eq!(
            result.evidence,
            vec![Evidence::CertificateChain, Evidence::Signature, Evidence::Identity]
        );
        assert!(result.artifact_skipped);
    }

    #[test]
    fn test_missing_log_entry_when_required() {
        let ca = TestCa::new("root").unwrap();
        let bundle = signed_bundle(&ca, "alice@example.com");
        let policy = VerificationPolicy::builder()
            .san("alice@example.com")
            .require_ctlog(false)
            .build()
            .unwrap();
        let result = verify(&bundle, &policy, &root_for(&ca)).unwrap();
        assert_eq!(
            result.failure,
            Some(FailureReason::MissingEvidence(Evidence::TransparencyLog))
        );
    }

    #[test]
    fn test_tampered_signature() {
        let ca = TestCa::new("root").unwrap();
        let mut bundle = signed_bundle(&ca, "alice@example.com");
        let envelope = bundle.dsse_envelope.as_mut().unwrap();
        let mut sig = envelope.signatures[0].sig.as_bytes().to_vec();
        let last = sig.len() - 1;
        sig[last] ^= 1;
        envelope.signatures[0].sig = SignatureBytes::new(sig);

        let result = verify(&bundle, &lenient(), &root_for(&ca)).unwrap();
        assert!(matches!(result.failure, Some(FailureReason::Signature(_))));
    }

    #[test]
    fn test_artifact_digest() {
        let ca = TestCa::new("root").unwrap();
        let bundle = signed_bundle(&ca, "alice@example.com");
        let builder = || {
            VerificationPolicy::builder()
                .san("alice@example.com")
                .require_ctlog(false)
                .require_tlog(false)
                .require_timestamp(false)
        };

        let good = builder()
            .artifact_digest(
                "sha256",
                "B94D27B9934D3E08A52E52D7DA7DABFAC484EFE37A5380EE9088F7ACE2EFCDE9",
            )
            .build()
            .unwrap();
        let result = verify(&bundle, &good, &root_for(&ca)).unwrap();
        assert!(result.is_accepted());
        assert_eq!(result.evidence.last(), Some(&Evidence::ArtifactDigest));

        let bad = builder()
            .artifact_digest("sha256", "00".repeat(32))
            .build()
            .unwrap();
        let result = verify(&bundle, &bad, &root_for(&ca)).unwrap();
        assert!(matches!(result.failure, Some(FailureReason::ArtifactMismatch(_))));
    }

    #[test]
    fn test_bundle_without_envelope() {
        let ca = TestCa::new("root").unwrap();
        let mut bundle = signed_bundle(&ca, "alice@example.com");
        bundle.dsse_envelope = None;
        let result = verify(&bundle, &lenient(), &root_for(&ca)).unwrap();
        assert_eq!(
            result.failure,
            Some(FailureReason::Envelope(
                "bundle does not wrap a DSSE envelope".to_string()
            ))
        );
    }

    #[tokio::test]
    async fn test_verifier_rejects_non_bundle_bytes() {
        let ca = TestCa::new("root").unwrap();
        let verifier = Verifier::with_trusted_root(root_for(&ca));
        let err = verifier.verify_bytes(b"not json", &lenient()).await.unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }
}
