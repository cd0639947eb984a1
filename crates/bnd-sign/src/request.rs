//! Signing configuration

use std::time::Duration;

use bnd_oidc::OidcConfig;
use bnd_trust_root::TrustRootConfig;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Per-service request deadlines, in seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceTimeouts {
    pub ca_secs: u64,
    pub tsa_secs: u64,
    pub log_secs: u64,
}

impl Default for ServiceTimeouts {
    fn default() -> Self {
        Self {
            ca_secs: 30,
            tsa_secs: 30,
            log_secs: 90,
        }
    }
}

impl ServiceTimeouts {
    pub fn ca(&self) -> Duration {
        Duration::from_secs(self.ca_secs)
    }

    pub fn tsa(&self) -> Duration {
        Duration::from_secs(self.tsa_secs)
    }

    pub fn log(&self) -> Duration {
        Duration::from_secs(self.log_secs)
    }
}

/// Everything a signing operation needs to know up front.
///
/// Construct one, adjust the fields and hand it to
/// [`Signer::new`](crate::Signer::new). It is checked with
/// [`validate`](Self::validate) before any network traffic happens.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningRequest {
    pub oidc: OidcConfig,
    pub trust_root: TrustRootConfig,
    /// Request an RFC 3161 timestamp from every selected TSA
    pub timestamp: bool,
    /// Publish the envelope to the transparency log
    pub append_to_log: bool,
    /// Skip ambient credential providers
    pub disable_ambient: bool,
    /// A token obtained out of band, used verbatim
    #[serde(skip)]
    pub identity_token: Option<String>,
    pub timeouts: ServiceTimeouts,
    pub user_agent: String,
}

impl Default for SigningRequest {
    fn default() -> Self {
        Self {
            oidc: OidcConfig::default(),
            trust_root: TrustRootConfig::default(),
            timestamp: true,
            append_to_log: true,
            disable_ambient: false,
            identity_token: None,
            timeouts: ServiceTimeouts::default(),
            user_agent: bnd_types::USER_AGENT.to_string(),
        }
    }
}

impl SigningRequest {
    pub fn with_identity_token(mut self, token: impl Into<String>) -> Self {
        self.identity_token = Some(token.into());
        self
    }

    pub fn with_trust_root(mut self, trust_root: TrustRootConfig) -> Self {
        self.trust_root = trust_root;
        self
    }

    /// Check required fields.
    pub fn validate(&self) -> Result<()> {
        let missing = self.oidc.missing_fields();
        if !missing.is_empty() {
            return Err(Error::Validation(format!(
                "missing required fields: {}",
                missing.join(", ")
            )));
        }
        if self.user_agent.is_empty() {
            return Err(Error::Validation("user agent must not be empty".to_string()));
        }
        Ok(())
    }
}
