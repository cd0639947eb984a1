//! Signing orchestration
//!
//! A [`Signer`] turns statement bytes into a bundle. Every step depends on
//! the previous one succeeding and nothing is retried here; a failed step
//! aborts the whole operation without a partial bundle.

use std::sync::Arc;

use bnd_bundle::{validate_bundle_with_options, BundleV03, ValidationOptions};
use bnd_crypto::{parse_certificate_info, KeyPair};
use bnd_oidc::{IdentityAcquirer, IdentityProvider};
use bnd_trust_root::{ServiceSelection, TrustRootResolver, TrustRootSource};
use bnd_types::{Bundle, DerCertificate, DsseEnvelope, Statement};
use chrono::Utc;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::fulcio::{CertificateIssuer, CertificateRequest, FulcioClient};
use crate::log::{LogPublisher, RekorPublisher};
use crate::request::SigningRequest;
use crate::tsa::{TimestampAuthority, TsaClient};

/// Signs in-toto statements into v0.3 bundles.
///
/// Each collaborator can be replaced, which is how tests run the whole flow
/// without a network.
///
/// # Example
///
/// ```no_run
/// use bnd_sign::{Signer, SigningRequest};
///
/// # async fn example(statement: &[u8]) -> Result<(), bnd_sign::Error> {
/// let signer = Signer::new(SigningRequest::default())?;
/// let bundle = signer.sign(statement).await?;
/// # Ok(())
/// # }
/// ```
pub struct Signer {
    request: SigningRequest,
    identity: Arc<dyn IdentityProvider>,
    trust: Arc<dyn TrustRootSource>,
    issuer: Arc<dyn CertificateIssuer>,
    log: Arc<dyn LogPublisher>,
    tsa: Arc<dyn TimestampAuthority>,
}

impl Signer {
    /// Validate `request` and wire up the default network clients.
    pub fn new(request: SigningRequest) -> Result<Self> {
        request.validate()?;

        let mut acquirer = IdentityAcquirer::new(request.oidc.clone());
        if request.disable_ambient {
            acquirer = acquirer.without_ambient();
        }
        let trust = TrustRootResolver::new(request.trust_root.clone());
        let issuer = FulcioClient::new(request.timeouts.ca(), &request.user_agent)?;
        let log = RekorPublisher::new(request.timeouts.log(), request.user_agent.clone());
        let tsa = TsaClient::new(request.timeouts.tsa(), &request.user_agent)?;

        Ok(Self {
            request,
            identity: Arc::new(acquirer),
            trust: Arc::new(trust),
            issuer: Arc::new(issuer),
            log: Arc::new(log),
            tsa: Arc::new(tsa),
        })
    }

    pub fn with_identity_provider(mut self, provider: impl IdentityProvider + 'static) -> Self {
        self.identity = Arc::new(provider);
        self
    }

    /// Share a trust root source, typically a resolver that is also used for
    /// verification.
    pub fn with_trust_source(mut self, source: Arc<dyn TrustRootSource>) -> Self {
        self.trust = source;
        self
    }

    pub fn with_certificate_issuer(mut self, issuer: impl CertificateIssuer + 'static) -> Self {
        self.issuer = Arc::new(issuer);
        self
    }

    pub fn with_log_publisher(mut self, log: impl LogPublisher + 'static) -> Self {
        self.log = Arc::new(log);
        self
    }

    pub fn with_timestamp_authority(mut self, tsa: impl TimestampAuthority + 'static) -> Self {
        self.tsa = Arc::new(tsa);
        self
    }

    pub fn request(&self) -> &SigningRequest {
        &self.request
    }

    /// Sign a statement value.
    pub async fn sign_statement(&self, statement: &Statement) -> Result<Bundle> {
        let bytes = statement
            .to_json()
            .map_err(|e| Error::Serialization(format!("failed to encode statement: {e}")))?;
        self.sign(&bytes).await
    }

    /// Sign and serialize to bundle JSON.
    pub async fn sign_to_json(&self, statement: &[u8]) -> Result<Vec<u8>> {
        let bundle = self.sign(statement).await?;
        bnd_bundle::encode(&bundle).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Sign raw in-toto statement bytes.
    pub async fn sign(&self, statement: &[u8]) -> Result<Bundle> {
        check_statement(statement)?;
        let envelope = DsseEnvelope::for_statement(statement);

        let key_pair = KeyPair::generate_ecdsa_p256()?;

        let token = self
            .identity
            .acquire(
                &self.request.oidc.client_id,
                self.request.identity_token.as_deref(),
            )
            .await?;
        debug!(issuer = token.issuer(), subject = token.subject(), "identity acquired");

        let services = self.select_services().await?;
        let ca = services
            .ca
            .as_ref()
            .ok_or_else(|| Error::TrustMaterial("no certificate authority available".to_string()))?;

        let certificate = self
            .request_certificate(&ca.url, &key_pair, token.raw(), token.proof_subject())
            .await?;

        let signature = key_pair.sign(&envelope.pae())?;
        let envelope = envelope.with_signature(signature.clone());

        let mut timestamps = Vec::new();
        if self.request.timestamp {
            for tsa in &services.tsas {
                timestamps.push(self.tsa.timestamp(&tsa.url, signature.as_bytes()).await?);
            }
            debug!(count = timestamps.len(), "collected timestamps");
        }

        let mut bundle = BundleV03::with_certificate_and_dsse(certificate.clone(), envelope);
        if self.request.append_to_log {
            // a log is guaranteed by select_services when publishing is on
            if let Some(tlog) = services.tlogs.first() {
                let entry = self
                    .log
                    .publish(&tlog.url, &bundle.envelope, &certificate)
                    .await?;
                info!(log = %tlog.url, log_index = entry.log_index, "published to transparency log");
                bundle = bundle.with_tlog_entry(entry);
            }
        }
        for timestamp in timestamps {
            bundle = bundle.with_rfc3161_timestamp(timestamp);
        }

        let bundle = bundle.into_bundle();
        let checks = ValidationOptions {
            require_inclusion_proof: false,
            require_timestamp: self.request.timestamp,
        };
        validate_bundle_with_options(&bundle, &checks)
            .map_err(|e| Error::Validation(format!("assembled bundle is invalid: {e}")))?;
        Ok(bundle)
    }

    /// Pick endpoints from the signing configuration and refuse requested
    /// guarantees that no configured service can provide.
    async fn select_services(&self) -> Result<ServiceSelection> {
        let material = self.trust.resolve().await?;
        let config = material.signing_config.as_ref().ok_or_else(|| {
            Error::TrustMaterial("trust root carries no signing configuration".to_string())
        })?;

        let selection = config.select(Utc::now());
        if selection.ca.is_none() {
            return Err(Error::TrustMaterial(
                "no valid certificate authority endpoint".to_string(),
            ));
        }
        if self.request.timestamp && selection.tsas.is_empty() {
            return Err(Error::Validation(
                "timestamping requested but no timestamp authority is configured".to_string(),
            ));
        }
        if self.request.append_to_log && selection.tlogs.is_empty() {
            return Err(Error::Validation(
                "log publication requested but no transparency log is configured".to_string(),
            ));
        }
        Ok(selection)
    }

    async fn request_certificate(
        &self,
        ca_url: &str,
        key_pair: &KeyPair,
        raw_token: &str,
        proof_subject: &str,
    ) -> Result<DerCertificate> {
        let public_key_der = key_pair.public_key_der()?;
        let request = CertificateRequest {
            identity_token: raw_token.to_string(),
            public_key_pem: key_pair.public_key_pem()?,
            public_key_der: public_key_der.as_bytes().to_vec(),
            proof_of_possession: key_pair.sign(proof_subject.as_bytes())?,
        };

        // v0.3 bundles carry the leaf only
        let leaf = self
            .issuer
            .issue(ca_url, &request)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::CertIssuance("empty certificate chain".to_string()))?;

        let info = parse_certificate_info(leaf.as_bytes())
            .map_err(|e| Error::CertIssuance(format!("unparseable certificate: {e}")))?;
        if info.public_key != public_key_der.as_bytes() {
            return Err(Error::CertIssuance(
                "issued certificate does not certify the requested key".to_string(),
            ));
        }
        debug!(
            san = info.san.as_deref(),
            issuer = info.oidc_issuer.as_deref(),
            "certificate issued"
        );
        Ok(leaf)
    }
}

/// Refuse input that is not a non-empty in-toto statement.
fn check_statement(statement: &[u8]) -> Result<()> {
    if statement.is_empty() {
        return Err(Error::Validation("statement is empty".to_string()));
    }
    Statement::parse_checked(statement).map_err(|e| Error::Validation(e.to_string()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use base64::engine::general_purpose::URL_SAFE_NO_PAD;
    use base64::Engine;
    use bnd_crypto::testing::{TestCa, TestTsa};
    use bnd_crypto::verify_signature_auto;
    use bnd_oidc::IdentityToken;
    use bnd_trust_root::{
        CertificateAuthority, Service, SigningConfig, StaticTrustRoot, TrustMaterial, TrustedRoot,
    };
    use bnd_types::{
        CanonicalizedBody, CheckpointEnvelope, HashBytes, InclusionProof, KindVersion, LogId,
        LogKeyId, SignedTimestamp, TransparencyLogEntry,
    };

    const STATEMENT: &[u8] = br#"{"_type":"https://in-toto.io/Statement/v1","subject":[{"name":"a","digest":{"sha256":"abcd"}}],"predicateType":"https://example.com/p","predicate":{}}"#;

    fn jwt(email: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let claims = URL_SAFE_NO_PAD.encode(
            serde_json::json!({
                "iss": "https://issuer.example.com",
                "sub": "1234",
                "email": email,
                "exp": 4_000_000_000i64,
            })
            .to_string(),
        );
        format!("{header}.{claims}.sig")
    }

    struct FixedIdentity(Arc<AtomicUsize>);

    #[async_trait]
    impl IdentityProvider for FixedIdentity {
        async fn acquire(
            &self,
            audience: &str,
            _explicit: Option<&str>,
        ) -> bnd_oidc::Result<IdentityToken> {
            assert_eq!(audience, "sigstore");
            self.0.fetch_add(1, Ordering::SeqCst);
            IdentityToken::from_jwt(&jwt("alice@example.com"))
        }
    }

    struct FakeCa {
        ca: TestCa,
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl CertificateIssuer for FakeCa {
        async fn issue(
            &self,
            ca_url: &str,
            request: &CertificateRequest,
        ) -> Result<Vec<DerCertificate>> {
            assert_eq!(ca_url, "https://ca.test");
            self.calls.fetch_add(1, Ordering::SeqCst);
            verify_signature_auto(
                &request.public_key_der,
                b"alice@example.com",
                request.proof_of_possession.as_bytes(),
            )
            .map_err(|e| Error::CertIssuance(format!("bad proof of possession: {e}")))?;
            let leaf = self
                .ca
                .issue_leaf(
                    &request.public_key_der,
                    "alice@example.com",
                    "https://issuer.example.com",
                )
                .map_err(|e| Error::CertIssuance(e.to_string()))?;
            Ok(vec![leaf, self.ca.root_der().clone()])
        }
    }

    struct FakeLog {
        fail: bool,
    }

    #[async_trait]
    impl LogPublisher for FakeLog {
        async fn publish(
            &self,
            _log_url: &str,
            envelope: &DsseEnvelope,
            _certificate: &DerCertificate,
        ) -> Result<TransparencyLogEntry> {
            if self.fail {
                return Err(Error::LogPublish("log unreachable".to_string()));
            }
            assert_eq!(envelope.signatures.len(), 1);
            Ok(TransparencyLogEntry {
                log_index: 7,
                log_id: LogId {
                    key_id: LogKeyId::from_bytes(&[1; 32]),
                },
                kind_version: KindVersion {
                    kind: "dsse".to_string(),
                    version: "0.0.1".to_string(),
                },
                integrated_time: 1_700_000_000,
                inclusion_promise: None,
                inclusion_proof: Some(InclusionProof {
                    log_index: 7,
                    root_hash: HashBytes::from_bytes(&[2; 32]),
                    tree_size: 8,
                    hashes: vec![HashBytes::from_bytes(&[3; 32])],
                    checkpoint: CheckpointEnvelope {
                        envelope: "log\n8\nAgI=\n\n".to_string(),
                    },
                }),
                canonicalized_body: CanonicalizedBody::from_bytes(b"{}"),
            })
        }
    }

    struct FakeTsa(TestTsa);

    #[async_trait]
    impl TimestampAuthority for FakeTsa {
        async fn timestamp(&self, _tsa_url: &str, signature: &[u8]) -> Result<SignedTimestamp> {
            let token = self
                .0
                .timestamp(signature)
                .map_err(|e| Error::Timestamp(e.to_string()))?;
            Ok(SignedTimestamp::new(token))
        }
    }

    struct Harness {
        identity_calls: Arc<AtomicUsize>,
        ca_calls: Arc<AtomicUsize>,
    }

    fn trust(ca: &TestCa, tsas: usize, signing_config: bool) -> StaticTrustRoot {
        let mut root = TrustedRoot::default();
        root.certificate_authorities
            .push(CertificateAuthority::new(vec![ca.root_der().clone()]));

        let mut material = TrustMaterial::new(root);
        if signing_config {
            let mut config = SigningConfig::default();
            config.ca_urls.push(Service::new("https://ca.test", 1));
            config.rekor_tlog_urls.push(Service::new("https://log.test", 1));
            for i in 0..tsas {
                config.tsa_urls.push(Service::new(format!("https://tsa{i}.test"), 1));
            }
            material = material.with_signing_config(config);
        }
        StaticTrustRoot::new(material)
    }

    fn signer(request: SigningRequest, tsas: usize, fail_log: bool) -> (Signer, Harness) {
        let harness = Harness {
            identity_calls: Arc::new(AtomicUsize::new(0)),
            ca_calls: Arc::new(AtomicUsize::new(0)),
        };
        let fake_ca = FakeCa {
            ca: TestCa::new("Signer Test CA").unwrap(),
            calls: harness.ca_calls.clone(),
        };
        let trust = trust(&fake_ca.ca, tsas, true);
        let signer = Signer::new(request)
            .unwrap()
            .with_identity_provider(FixedIdentity(harness.identity_calls.clone()))
            .with_trust_source(Arc::new(trust))
            .with_certificate_issuer(fake_ca)
            .with_log_publisher(FakeLog { fail: fail_log })
            .with_timestamp_authority(FakeTsa(TestTsa::new().unwrap()));
        (signer, harness)
    }

    #[tokio::test]
    async fn test_full_flow_collects_all_evidence() {
        let (signer, harness) = signer(SigningRequest::default(), 2, false);
        let bundle = signer.sign(STATEMENT).await.unwrap();

        let cert = bundle.signing_certificate().unwrap();
        assert_eq!(bundle.tlog_entries().len(), 1);
        assert!(bundle.tlog_entries()[0].inclusion_proof.is_some());
        assert_eq!(bundle.rfc3161_timestamps().len(), 2);
        assert_eq!(harness.identity_calls.load(Ordering::SeqCst), 1);

        let envelope = bundle.dsse_envelope().unwrap();
        assert_eq!(envelope.payload.as_bytes(), STATEMENT);
        let info = parse_certificate_info(cert.as_bytes()).unwrap();
        verify_signature_auto(
            &info.public_key,
            &envelope.pae(),
            envelope.signatures[0].sig.as_bytes(),
        )
        .unwrap();
    }

    #[tokio::test]
    async fn test_flags_disable_log_and_timestamps() {
        let request = SigningRequest {
            timestamp: false,
            append_to_log: false,
            ..Default::default()
        };
        let (signer, _) = signer(request, 0, true);
        let bundle = signer.sign(STATEMENT).await.unwrap();
        assert!(bundle.tlog_entries().is_empty());
        assert!(bundle.rfc3161_timestamps().is_empty());
    }

    #[tokio::test]
    async fn test_timestamp_without_authority_fails_before_ca() {
        let (signer, harness) = signer(SigningRequest::default(), 0, false);
        let err = signer.sign(STATEMENT).await.unwrap_err();
        assert!(matches!(err, Error::Validation(_)), "{err}");
        assert_eq!(harness.ca_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_log_failure_is_not_swallowed() {
        let (signer, _) = signer(SigningRequest::default(), 1, true);
        let err = signer.sign(STATEMENT).await.unwrap_err();
        assert!(matches!(err, Error::LogPublish(_)), "{err}");
    }

    #[tokio::test]
    async fn test_content_check_runs_first() {
        let (signer, harness) = signer(SigningRequest::default(), 1, false);
        for input in [&b""[..], b"not json", br#"{"_type":"x","subject":[]}"#] {
            let err = signer.sign(input).await.unwrap_err();
            assert!(matches!(err, Error::Validation(_)), "{err}");
        }
        assert_eq!(harness.identity_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_signing_config() {
        let ca = TestCa::new("Signer Test CA").unwrap();
        let signer = Signer::new(SigningRequest::default())
            .unwrap()
            .with_identity_provider(FixedIdentity(Arc::new(AtomicUsize::new(0))))
            .with_trust_source(Arc::new(trust(&ca, 1, false)));
        let err = signer.sign(STATEMENT).await.unwrap_err();
        assert!(matches!(err, Error::TrustMaterial(_)), "{err}");
    }

    #[test]
    fn test_invalid_request_is_rejected_up_front() {
        let mut request = SigningRequest::default();
        request.oidc.client_id.clear();
        assert!(matches!(Signer::new(request), Err(Error::Validation(_))));
    }
}
