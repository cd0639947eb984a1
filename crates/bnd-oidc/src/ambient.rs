//! Ambient credential providers
//!
//! An ambient provider obtains an identity token without user interaction
//! because the environment already attests to an identity, such as a CI job.
//! Providers are consulted in registration order. A provider whose
//! environment is absent returns `Ok(None)`; once it detects its environment
//! any failure is an error for the whole acquisition.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::token::IdentityToken;

/// GitHub Actions token request URL variable
pub const GITHUB_REQUEST_URL_VAR: &str = "ACTIONS_ID_TOKEN_REQUEST_URL";

/// GitHub Actions token request bearer variable
pub const GITHUB_REQUEST_TOKEN_VAR: &str = "ACTIONS_ID_TOKEN_REQUEST_TOKEN";

const GITHUB_ATTEMPTS: usize = 3;

/// A zero-interaction identity source.
#[async_trait]
pub trait AmbientProvider: Send + Sync {
    /// Return a token for `audience`, or `None` when not applicable.
    async fn provide(&self, audience: &str) -> Result<Option<IdentityToken>>;
}

/// Requests a workload identity token from the GitHub Actions runtime.
#[derive(Debug, Clone)]
pub struct GitHubActions {
    timeout: Duration,
    environment: Option<(String, String)>,
}

impl Default for GitHubActions {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl GitHubActions {
    /// Read the request URL and token from the process environment.
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            environment: None,
        }
    }

    /// Use a fixed request URL and token instead of the environment.
    pub fn with_environment(
        mut self,
        request_url: impl Into<String>,
        request_token: impl Into<String>,
    ) -> Self {
        self.environment = Some((request_url.into(), request_token.into()));
        self
    }

    fn request_env(&self) -> (String, String) {
        match &self.environment {
            Some(env) => env.clone(),
            None => (
                std::env::var(GITHUB_REQUEST_URL_VAR).unwrap_or_default(),
                std::env::var(GITHUB_REQUEST_TOKEN_VAR).unwrap_or_default(),
            ),
        }
    }

    fn client(&self, http1_only: bool) -> Result<reqwest::Client> {
        let mut builder = reqwest::Client::builder()
            .user_agent(bnd_types::USER_AGENT)
            .timeout(self.timeout);
        if http1_only {
            builder = builder.http1_only();
        }
        builder.build().map_err(|e| Error::Http(e.to_string()))
    }
}

/// The runtime's request URL with the audience appended.
fn token_request_url(request_url: &str, audience: &str) -> Result<Url> {
    let mut url = Url::parse(request_url)
        .map_err(|e| Error::Http(format!("invalid {GITHUB_REQUEST_URL_VAR}: {e}")))?;
    url.query_pairs_mut().append_pair("audience", audience);
    Ok(url)
}

/// Whether a transport error says the server only speaks HTTP/1.1.
fn requires_http1(error: &str) -> bool {
    error.contains("HTTP_1_1_REQUIRED")
}

#[derive(Deserialize)]
struct ActionsTokenResponse {
    value: String,
}

#[async_trait]
impl AmbientProvider for GitHubActions {
    async fn provide(&self, audience: &str) -> Result<Option<IdentityToken>> {
        let (request_url, request_token) = self.request_env();
        if request_url.is_empty() {
            return Ok(None);
        }

        let url = token_request_url(&request_url, audience)?;
        let mut client = self.client(false)?;
        let mut attempt = 0;

        let response = loop {
            attempt += 1;
            match client.get(url.clone()).bearer_auth(&request_token).send().await {
                Ok(response) => break response,
                Err(e) if attempt < GITHUB_ATTEMPTS => {
                    // reqwest does not downgrade on its own
                    if requires_http1(&format!("{e:?}")) {
                        client = self.client(true)?;
                    }
                    warn!(error = %e, attempt, "error fetching GitHub OIDC token (will retry)");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                }
                Err(e) => return Err(Error::Http(e.to_string())),
            }
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Http(format!("token request failed: {status} {body}")));
        }
        let payload: ActionsTokenResponse = response
            .json()
            .await
            .map_err(|e| Error::Token(format!("unexpected token response: {e}")))?;
        if payload.value.is_empty() {
            return Err(Error::Token("empty token in response".to_string()));
        }

        IdentityToken::from_jwt(&payload.value).map(Some)
    }
}

/// Ordered registry of ambient providers.
pub struct AmbientRegistry {
    providers: Vec<(String, Box<dyn AmbientProvider>)>,
}

impl Default for AmbientRegistry {
    fn default() -> Self {
        Self::empty().with_provider("actions", GitHubActions::default())
    }
}

impl AmbientRegistry {
    pub fn empty() -> Self {
        Self {
            providers: Vec::new(),
        }
    }

    /// Append a provider; it is consulted after those already registered.
    pub fn with_provider(
        mut self,
        name: impl Into<String>,
        provider: impl AmbientProvider + 'static,
    ) -> Self {
        self.providers.push((name.into(), Box::new(provider)));
        self
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.providers.iter().map(|(name, _)| name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }

    /// The first token any provider returns.
    pub async fn provide(&self, audience: &str) -> Result<Option<IdentityToken>> {
        for (name, provider) in &self.providers {
            match provider.provide(audience).await {
                Ok(Some(token)) => {
                    debug!(provider = %name, "obtained ambient identity token");
                    return Ok(Some(token));
                }
                Ok(None) => debug!(provider = %name, "ambient provider not applicable"),
                Err(e) => {
                    return Err(Error::Provider {
                        name: name.clone(),
                        message: e.to_string(),
                    })
                }
            }
        }
        Ok(None)
    }
}
