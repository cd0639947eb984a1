//! RFC 3161 timestamp authority client

use std::time::Duration;

use async_trait::async_trait;
use bnd_crypto::{parse_timestamp_response, parse_timestamp_token, TimestampRequest};
use bnd_types::SignedTimestamp;
use tracing::debug;

use crate::error::{Error, Result};

/// Countersigns a DSSE signature with a trusted time.
#[async_trait]
pub trait TimestampAuthority: Send + Sync {
    /// Returns the DER `TimeStampToken` over `signature`.
    async fn timestamp(&self, tsa_url: &str, signature: &[u8]) -> Result<SignedTimestamp>;
}

/// HTTP client posting DER timestamp queries.
#[derive(Debug, Clone)]
pub struct TsaClient {
    client: reqwest::Client,
}

impl TsaClient {
    pub fn new(timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()
            .map_err(|e| Error::Timestamp(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

/// Check that a token answers `request`: same imprint over `signature` and,
/// when the authority echoes one, the same nonce.
fn check_token(token: &[u8], request: &TimestampRequest, signature: &[u8]) -> Result<()> {
    let info = parse_timestamp_token(token)
        .map_err(|e| Error::Timestamp(format!("invalid token: {e}")))?;
    info.check_imprint(signature)
        .map_err(|e| Error::Timestamp(e.to_string()))?;
    if info.nonce.as_ref().is_some_and(|n| *n != request.nonce) {
        return Err(Error::Timestamp("token nonce does not match the request".to_string()));
    }
    Ok(())
}

#[async_trait]
impl TimestampAuthority for TsaClient {
    async fn timestamp(&self, tsa_url: &str, signature: &[u8]) -> Result<SignedTimestamp> {
        let request = TimestampRequest::sha256(signature)
            .map_err(|e| Error::Timestamp(format!("failed to build request: {e}")))?;

        debug!(url = %tsa_url, "requesting timestamp");
        let response = self
            .client
            .post(tsa_url)
            .header(reqwest::header::CONTENT_TYPE, "application/timestamp-query")
            .body(request.der.clone())
            .send()
            .await
            .map_err(|e| Error::Timestamp(format!("request to {tsa_url} failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(Error::Timestamp(format!("{tsa_url} returned {status}: {text}")));
        }
        let body = response
            .bytes()
            .await
            .map_err(|e| Error::Timestamp(format!("failed to read response: {e}")))?;

        let token = parse_timestamp_response(&body)
            .map_err(|e| Error::Timestamp(format!("{tsa_url}: {e}")))?;
        check_token(&token, &request, signature)?;
        Ok(SignedTimestamp::new(token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bnd_crypto::testing::TestTsa;

    #[test]
    fn test_token_must_cover_signature() {
        let tsa = TestTsa::new().unwrap();
        let request = TimestampRequest::sha256(b"sig").unwrap();

        let token = tsa.timestamp(b"sig").unwrap();
        check_token(&token, &request, b"sig").unwrap();

        let other = tsa.timestamp(b"not the sig").unwrap();
        assert!(matches!(
            check_token(&other, &request, b"sig"),
            Err(Error::Timestamp(_))
        ));
    }
}
