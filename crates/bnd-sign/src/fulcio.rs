//! Certificate authority client (Fulcio v2 API)

use std::time::Duration;

use async_trait::async_trait;
use bnd_types::{DerCertificate, SignatureBytes};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// What the signer hands a certificate authority.
#[derive(Debug, Clone)]
pub struct CertificateRequest {
    /// Raw OIDC token
    pub identity_token: String,
    pub public_key_pem: String,
    /// DER SubjectPublicKeyInfo, the same key as `public_key_pem`
    pub public_key_der: Vec<u8>,
    /// Signature over the token's subject with the requested key
    pub proof_of_possession: SignatureBytes,
}

/// Issues short-lived signing certificates.
#[async_trait]
pub trait CertificateIssuer: Send + Sync {
    /// Returns the chain, leaf first.
    async fn issue(&self, ca_url: &str, request: &CertificateRequest)
        -> Result<Vec<DerCertificate>>;
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningCertRequest<'a> {
    credentials: Credentials<'a>,
    public_key_request: PublicKeyRequest<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Credentials<'a> {
    oidc_identity_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PublicKeyRequest<'a> {
    public_key: PublicKeyContent<'a>,
    proof_of_possession: String,
}

#[derive(Serialize)]
struct PublicKeyContent<'a> {
    algorithm: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SigningCertResponse {
    signed_certificate_embedded_sct: Option<SignedCertificate>,
    signed_certificate_detached_sct: Option<SignedCertificate>,
}

#[derive(Debug, Deserialize)]
struct SignedCertificate {
    chain: Chain,
}

#[derive(Debug, Deserialize)]
struct Chain {
    certificates: Vec<String>,
}

impl SigningCertResponse {
    fn into_chain(self) -> Result<Vec<DerCertificate>> {
        let signed = self
            .signed_certificate_embedded_sct
            .or(self.signed_certificate_detached_sct)
            .ok_or_else(|| {
                Error::CertIssuance("response carries no certificate chain".to_string())
            })?;

        let chain = signed
            .chain
            .certificates
            .iter()
            .map(|pem| DerCertificate::from_pem(pem))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|e| Error::CertIssuance(format!("invalid certificate in chain: {e}")))?;
        if chain.is_empty() {
            return Err(Error::CertIssuance("empty certificate chain".to_string()));
        }
        Ok(chain)
    }
}

/// HTTP client for the v2 `signingCert` endpoint.
#[derive(Debug, Clone)]
pub struct FulcioClient {
    client: reqwest::Client,
}

impl FulcioClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::CertIssuance(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl CertificateIssuer for FulcioClient {
    async fn issue(
        &self,
        ca_url: &str,
        request: &CertificateRequest,
    ) -> Result<Vec<DerCertificate>> {
        let url = format!("{}/api/v2/signingCert", ca_url.trim_end_matches('/'));
        let body = SigningCertRequest {
            credentials: Credentials {
                oidc_identity_token: &request.identity_token,
            },
            public_key_request: PublicKeyRequest {
                public_key: PublicKeyContent {
                    algorithm: "ECDSA",
                    content: &request.public_key_pem,
                },
                proof_of_possession: request.proof_of_possession.to_base64(),
            },
        };

        debug!(%url, "requesting signing certificate");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::CertIssuance(format!("request to {url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::CertIssuance(format!(
                "certificate authority returned {status}: {text}"
            )));
        }

        let parsed: SigningCertResponse = response
            .json()
            .await
            .map_err(|e| Error::CertIssuance(format!("invalid response: {e}")))?;
        let chain = parsed.into_chain()?;
        debug!(certificates = chain.len(), "received certificate chain");
        Ok(chain)
    }
}
