//! Transparency log publication

use std::time::Duration;

use async_trait::async_trait;
use bnd_bundle::tlog_entry_from_log_entry;
use bnd_rekor::{DsseEntry, RekorClient, DSSE_KIND, DSSE_VERSION};
use bnd_types::{DerCertificate, DsseEnvelope, TransparencyLogEntry};

use crate::error::{Error, Result};

/// Records a signed envelope in a transparency log.
#[async_trait]
pub trait LogPublisher: Send + Sync {
    /// Returns the bundle form of the created entry.
    async fn publish(
        &self,
        log_url: &str,
        envelope: &DsseEnvelope,
        certificate: &DerCertificate,
    ) -> Result<TransparencyLogEntry>;
}

/// Publishes `dsse` v0.0.1 entries through the v1 log API.
#[derive(Debug, Clone)]
pub struct RekorPublisher {
    timeout: Duration,
    user_agent: String,
}

impl RekorPublisher {
    pub fn new(timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            timeout,
            user_agent: user_agent.into(),
        }
    }
}

#[async_trait]
impl LogPublisher for RekorPublisher {
    async fn publish(
        &self,
        log_url: &str,
        envelope: &DsseEnvelope,
        certificate: &DerCertificate,
    ) -> Result<TransparencyLogEntry> {
        let client = RekorClient::new(log_url, self.timeout, &self.user_agent)
            .map_err(|e| Error::LogPublish(e.to_string()))?;
        let envelope_json = serde_json::to_string(envelope)
            .map_err(|e| Error::Serialization(format!("failed to encode envelope: {e}")))?;

        let entry = client
            .create_dsse_entry(&DsseEntry::new(&envelope_json, &certificate.to_pem()))
            .await
            .map_err(|e| Error::LogPublish(format!("{log_url}: {e}")))?;

        let tlog_entry = tlog_entry_from_log_entry(&entry, DSSE_KIND, DSSE_VERSION)
            .map_err(|e| Error::LogPublish(format!("unusable log response: {e}")))?;
        if tlog_entry.inclusion_proof.is_none() {
            return Err(Error::LogPublish(
                "log response carries no inclusion proof".to_string(),
            ));
        }
        Ok(tlog_entry)
    }
}
