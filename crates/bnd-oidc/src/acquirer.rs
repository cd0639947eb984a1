//! Identity acquisition
//!
//! Resolution order, first success wins:
//!
//! 1. an explicit token supplied by the caller;
//! 2. the ambient providers, in registration order;
//! 3. the interactive browser flow when attached to a terminal;
//! 4. the device code flow otherwise.
//!
//! Once a flow is selected its failure is final.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::ambient::{AmbientRegistry, GitHubActions};
use crate::error::{Error, Result};
use crate::oauth::{randomize_port, OAuthClient, OAuthConfig};
use crate::templates::DefaultTemplates;
use crate::token::IdentityToken;

/// Default OIDC issuer
pub const DEFAULT_OIDC_ISSUER: &str = "https://oauth2.sigstore.dev/auth";

/// Default OAuth client id
pub const DEFAULT_CLIENT_ID: &str = "sigstore";

/// Redirect template; a `:0` port is replaced per call.
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:0/auth/callback";

/// OIDC settings for the interactive and device flows
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcConfig {
    pub issuer: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_url: String,
    pub scopes: Vec<String>,
    pub ambient_timeout_secs: u64,
    /// Deadline for each request to the OIDC provider
    pub request_timeout_secs: u64,
    /// Overall deadline for an interactive or device flow
    pub flow_timeout_secs: u64,
}

impl Default for OidcConfig {
    fn default() -> Self {
        Self {
            issuer: DEFAULT_OIDC_ISSUER.to_string(),
            client_id: DEFAULT_CLIENT_ID.to_string(),
            client_secret: None,
            redirect_url: DEFAULT_REDIRECT_URL.to_string(),
            scopes: vec!["openid".to_string(), "email".to_string()],
            ambient_timeout_secs: 30,
            request_timeout_secs: 30,
            flow_timeout_secs: 300,
        }
    }
}

impl OidcConfig {
    /// Names of required fields that are empty.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.issuer.is_empty() {
            missing.push("OIDC issuer");
        }
        if self.client_id.is_empty() {
            missing.push("OIDC client id");
        }
        if self.redirect_url.is_empty() {
            missing.push("OIDC redirect URL");
        }
        missing
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn flow_timeout(&self) -> Duration {
        Duration::from_secs(self.flow_timeout_secs)
    }
}

/// Obtains an identity token for a signing operation.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// `explicit` is a token the caller already holds.
    async fn acquire(&self, audience: &str, explicit: Option<&str>) -> Result<IdentityToken>;
}

/// A user-facing OAuth flow.
#[async_trait]
pub trait TokenFlow: Send + Sync {
    async fn run(&self, config: &OidcConfig) -> Result<IdentityToken>;
}

async fn oauth_client(config: &OidcConfig) -> Result<OAuthClient> {
    let http = reqwest::Client::builder()
        .user_agent(bnd_types::USER_AGENT)
        .timeout(config.request_timeout())
        .connect_timeout(config.request_timeout())
        .build()
        .map_err(|e| Error::Http(e.to_string()))?;
    let mut oauth =
        match OAuthConfig::discover(&http, &config.issuer, &config.client_id, config.scopes.clone())
            .await
        {
            Ok(oauth) => oauth,
            Err(e) => {
                debug!(error = %e, "OIDC discovery failed, using default endpoint layout");
                OAuthConfig::for_issuer(&config.issuer, &config.client_id, config.scopes.clone())
            }
        };
    oauth.client_secret = config.client_secret.clone();
    Ok(OAuthClient::new(oauth, http).with_request_timeout(config.request_timeout()))
}

/// Bound a whole flow by the configured deadline.
async fn with_deadline<F>(config: &OidcConfig, flow: F) -> Result<IdentityToken>
where
    F: std::future::Future<Output = Result<IdentityToken>>,
{
    tokio::time::timeout(config.flow_timeout(), flow)
        .await
        .map_err(|_| {
            Error::OAuth(format!(
                "no identity token within {}s",
                config.flow_timeout_secs
            ))
        })?
}

/// Browser flow with a local callback server.
#[derive(Debug, Clone, Copy, Default)]
pub struct InteractiveFlow;

#[async_trait]
impl TokenFlow for InteractiveFlow {
    async fn run(&self, config: &OidcConfig) -> Result<IdentityToken> {
        let redirect = randomize_port(&config.redirect_url)?;
        with_deadline(config, async {
            oauth_client(config)
                .await?
                .interactive_flow(&redirect, &DefaultTemplates)
                .await
        })
        .await
    }
}

/// Headless device code flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeviceFlow;

#[async_trait]
impl TokenFlow for DeviceFlow {
    async fn run(&self, config: &OidcConfig) -> Result<IdentityToken> {
        with_deadline(config, async {
            oauth_client(config)
                .await?
                .device_flow(|device| {
                    let uri = device
                        .verification_uri_complete
                        .as_deref()
                        .unwrap_or(&device.verification_uri);
                    eprintln!("To authenticate, visit:\n\n  {uri}\n\nand enter code: {}\n", device.user_code);
                })
                .await
        })
        .await
    }
}

/// The default [`IdentityProvider`].
pub struct IdentityAcquirer {
    config: OidcConfig,
    ambient: AmbientRegistry,
    disable_ambient: bool,
    interactive: Arc<dyn TokenFlow>,
    device: Arc<dyn TokenFlow>,
    terminal: Option<bool>,
}

impl IdentityAcquirer {
    pub fn new(config: OidcConfig) -> Self {
        let ambient = AmbientRegistry::empty().with_provider(
            "actions",
            GitHubActions::new(Duration::from_secs(config.ambient_timeout_secs)),
        );
        Self {
            config,
            ambient,
            disable_ambient: false,
            interactive: Arc::new(InteractiveFlow),
            device: Arc::new(DeviceFlow),
            terminal: None,
        }
    }

    pub fn with_ambient(mut self, registry: AmbientRegistry) -> Self {
        self.ambient = registry;
        self
    }

    /// Skip ambient providers entirely.
    pub fn without_ambient(mut self) -> Self {
        self.disable_ambient = true;
        self
    }

    pub fn with_flows(
        mut self,
        interactive: impl TokenFlow + 'static,
        device: impl TokenFlow + 'static,
    ) -> Self {
        self.interactive = Arc::new(interactive);
        self.device = Arc::new(device);
        self
    }

    /// Override terminal detection.
    pub fn with_terminal(mut self, terminal: bool) -> Self {
        self.terminal = Some(terminal);
        self
    }

    pub fn config(&self) -> &OidcConfig {
        &self.config
    }

    fn is_terminal(&self) -> bool {
        self.terminal
            .unwrap_or_else(|| std::io::stdin().is_terminal())
    }
}

#[async_trait]
impl IdentityProvider for IdentityAcquirer {
    async fn acquire(&self, audience: &str, explicit: Option<&str>) -> Result<IdentityToken> {
        if let Some(raw) = explicit {
            debug!("using caller-supplied identity token");
            let token = IdentityToken::from_jwt(raw)?;
            if token.is_expired_at(Utc::now().timestamp()) {
                return Err(Error::Token(format!(
                    "token for {} has expired",
                    token.proof_subject()
                )));
            }
            return Ok(token);
        }

        if !self.disable_ambient {
            if let Some(token) = self.ambient.provide(audience).await? {
                return Ok(token);
            }
        }

        if self.is_terminal() {
            info!(issuer = %self.config.issuer, "starting interactive OIDC flow");
            self.interactive.run(&self.config).await
        } else {
            info!(issuer = %self.config.issuer, "starting device OIDC flow");
            self.device.run(&self.config).await
        }
    }
}
