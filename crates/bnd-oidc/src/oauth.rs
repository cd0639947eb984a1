//! OAuth flows for interactive token acquisition
//!
//! - **Authorization code with PKCE**: a browser flow redirecting to a local
//!   callback server on a per-call random port.
//! - **Device code**: the headless flow, the user enters a code on another
//!   device.

use std::time::Duration;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tracing::debug;
use url::Url;

use crate::error::{Error, Result};
use crate::templates::HtmlTemplates;
use crate::token::IdentityToken;

/// Endpoints and client settings for one OAuth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OAuthConfig {
    pub auth_url: String,
    pub token_url: String,
    pub device_auth_url: String,
    pub client_id: String,
    pub client_secret: Option<String>,
    pub scopes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    authorization_endpoint: String,
    token_endpoint: String,
    #[serde(default)]
    device_authorization_endpoint: Option<String>,
}

impl OAuthConfig {
    /// Endpoints at the paths a Dex issuer serves them.
    pub fn for_issuer(issuer: &str, client_id: &str, scopes: Vec<String>) -> Self {
        let issuer = issuer.trim_end_matches('/');
        Self {
            auth_url: format!("{issuer}/auth"),
            token_url: format!("{issuer}/token"),
            device_auth_url: format!("{issuer}/device/code"),
            client_id: client_id.to_string(),
            client_secret: None,
            scopes,
        }
    }

    /// Read the endpoints from the issuer's discovery document.
    pub async fn discover(
        client: &reqwest::Client,
        issuer: &str,
        client_id: &str,
        scopes: Vec<String>,
    ) -> Result<Self> {
        let url = format!(
            "{}/.well-known/openid-configuration",
            issuer.trim_end_matches('/')
        );
        let document: DiscoveryDocument = client
            .get(&url)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::Http(format!("fetching {url}: {e}")))?
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("invalid discovery document: {e}")))?;

        let fallback = Self::for_issuer(issuer, client_id, scopes);
        Ok(Self {
            auth_url: document.authorization_endpoint,
            token_url: document.token_endpoint,
            device_auth_url: document
                .device_authorization_endpoint
                .unwrap_or(fallback.device_auth_url),
            ..fallback
        })
    }
}

/// Device code flow response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceCodeResponse {
    pub device_code: String,
    /// Code the user enters
    pub user_code: String,
    pub verification_uri: String,
    #[serde(default)]
    pub verification_uri_complete: Option<String>,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_interval() -> u64 {
    5
}

#[derive(Debug, Clone, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    id_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

struct Pkce {
    verifier: String,
    challenge: String,
}

impl Pkce {
    fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::rng().fill(&mut bytes);
        let verifier = URL_SAFE_NO_PAD.encode(bytes);
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

/// Replace a `:0` port in the redirect URL with a random high port.
///
/// Each call picks its own port so concurrent flows do not collide.
pub fn randomize_port(redirect_url: &str) -> Result<Url> {
    let mut url = Url::parse(redirect_url)
        .map_err(|e| Error::OAuth(format!("invalid redirect URL {redirect_url:?}: {e}")))?;
    if url.port() == Some(0) {
        let port: u16 = rand::rng().random_range(1025..=65535);
        url.set_port(Some(port))
            .map_err(|()| Error::OAuth(format!("cannot set port on {redirect_url:?}")))?;
    }
    Ok(url)
}

/// OAuth client for one provider
pub struct OAuthClient {
    config: OAuthConfig,
    client: reqwest::Client,
    request_timeout: Duration,
    callback_timeout: Duration,
}

impl OAuthClient {
    pub fn new(config: OAuthConfig, client: reqwest::Client) -> Self {
        Self {
            config,
            client,
            request_timeout: Duration::from_secs(30),
            callback_timeout: Duration::from_secs(300),
        }
    }

    /// How long a callback connection may take to send its request line.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// How long to wait for the browser to come back.
    pub fn with_callback_timeout(mut self, timeout: Duration) -> Self {
        self.callback_timeout = timeout;
        self
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn token_params<'a>(&'a self, extra: &[(&'a str, &'a str)]) -> Vec<(&'a str, &'a str)> {
        let mut params = vec![("client_id", self.config.client_id.as_str())];
        if let Some(secret) = &self.config.client_secret {
            params.push(("client_secret", secret.as_str()));
        }
        params.extend_from_slice(extra);
        params
    }

    async fn start_device_flow(&self, pkce: &Pkce) -> Result<DeviceCodeResponse> {
        let scope = self.config.scopes.join(" ");
        let params = self.token_params(&[
            ("scope", scope.as_str()),
            ("code_challenge", pkce.challenge.as_str()),
            ("code_challenge_method", "S256"),
        ]);

        let response = self
            .client
            .post(&self.config.device_auth_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth(format!("device auth failed: {status} - {body}")));
        }

        response
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("failed to parse device code response: {e}")))
    }

    async fn poll_for_token(
        &self,
        device: &DeviceCodeResponse,
        pkce: &Pkce,
    ) -> Result<IdentityToken> {
        let params = self.token_params(&[
            ("device_code", device.device_code.as_str()),
            ("grant_type", "urn:ietf:params:oauth:grant-type:device_code"),
            ("code_verifier", pkce.verifier.as_str()),
        ]);
        let mut interval = device.interval.max(1);
        let deadline = tokio::time::Instant::now() + tokio::time::Duration::from_secs(device.expires_in);

        loop {
            tokio::time::sleep(tokio::time::Duration::from_secs(interval)).await;
            if tokio::time::Instant::now() > deadline {
                return Err(Error::OAuth("device code expired".to_string()));
            }

            let response = self
                .client
                .post(&self.config.token_url)
                .form(&params)
                .send()
                .await
                .map_err(|e| Error::Http(e.to_string()))?;

            if response.status().is_success() {
                return self.id_token_from(response).await;
            }

            let error: ErrorResponse = response
                .json()
                .await
                .map_err(|e| Error::OAuth(format!("failed to parse error response: {e}")))?;

            match error.error.as_str() {
                "authorization_pending" => continue,
                "slow_down" => interval += 5,
                "expired_token" => return Err(Error::OAuth("device code expired".to_string())),
                "access_denied" => {
                    return Err(Error::OAuth("user denied authorization".to_string()))
                }
                other => {
                    return Err(Error::OAuth(format!(
                        "token error: {other} {}",
                        error.error_description.unwrap_or_default()
                    )))
                }
            }
        }
    }

    /// Run the device code flow, reporting the code through `display`.
    pub async fn device_flow<F>(&self, display: F) -> Result<IdentityToken>
    where
        F: FnOnce(&DeviceCodeResponse),
    {
        let pkce = Pkce::generate();
        let device = self.start_device_flow(&pkce).await?;
        display(&device);
        self.poll_for_token(&device, &pkce).await
    }

    /// Run the browser flow with a local callback on `redirect_url`.
    ///
    /// `redirect_url` must already carry its final port.
    pub async fn interactive_flow(
        &self,
        redirect_url: &Url,
        templates: &impl HtmlTemplates,
    ) -> Result<IdentityToken> {
        let port = redirect_url
            .port_or_known_default()
            .ok_or_else(|| Error::OAuth("redirect URL has no port".to_string()))?;
        let listener = TcpListener::bind(("127.0.0.1", port))
            .await
            .map_err(|e| Error::OAuth(format!("failed to start local server on {port}: {e}")))?;

        let pkce = Pkce::generate();
        let mut state_bytes = [0u8; 16];
        rand::rng().fill(&mut state_bytes);
        let state = URL_SAFE_NO_PAD.encode(state_bytes);

        let mut auth_url = Url::parse(&self.config.auth_url)
            .map_err(|e| Error::OAuth(format!("invalid auth URL: {e}")))?;
        auth_url
            .query_pairs_mut()
            .append_pair("client_id", &self.config.client_id)
            .append_pair("redirect_uri", redirect_url.as_str())
            .append_pair("response_type", "code")
            .append_pair("scope", &self.config.scopes.join(" "))
            .append_pair("code_challenge", pkce.challenge.as_str())
            .append_pair("code_challenge_method", "S256")
            .append_pair("state", &state);
        let auth_url = auth_url.to_string();

        if open::that(&auth_url).is_ok() {
            eprintln!("Opening browser for authentication. If it does not open, visit:");
        } else {
            eprintln!("Open this URL in your browser to authenticate:");
        }
        eprintln!("  {auth_url}");
        debug!(redirect = %redirect_url, "waiting for OAuth callback");

        let code = wait_for_callback(
            &listener,
            redirect_url.path(),
            &state,
            templates,
            self.request_timeout,
            self.callback_timeout,
        )
        .await?;
        self.exchange_code(&code, &pkce, redirect_url.as_str()).await
    }

    async fn exchange_code(
        &self,
        code: &str,
        pkce: &Pkce,
        redirect_uri: &str,
    ) -> Result<IdentityToken> {
        let params = self.token_params(&[
            ("code", code),
            ("code_verifier", pkce.verifier.as_str()),
            ("grant_type", "authorization_code"),
            ("redirect_uri", redirect_uri),
        ]);

        let response = self
            .client
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| Error::Http(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::OAuth(format!("token exchange failed: {status} - {body}")));
        }
        self.id_token_from(response).await
    }

    async fn id_token_from(&self, response: reqwest::Response) -> Result<IdentityToken> {
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| Error::OAuth(format!("failed to parse token response: {e}")))?;
        let id_token = token
            .id_token
            .ok_or_else(|| Error::OAuth("no id_token in response".to_string()))?;
        IdentityToken::from_jwt(&id_token)
    }
}

/// [`serve_callback`] bounded by `deadline`.
async fn wait_for_callback(
    listener: &TcpListener,
    path: &str,
    expected_state: &str,
    templates: &impl HtmlTemplates,
    read_timeout: Duration,
    deadline: Duration,
) -> Result<String> {
    let serve = serve_callback(listener, path, expected_state, templates, read_timeout);
    tokio::time::timeout(deadline, serve).await.map_err(|_| {
        Error::OAuth(format!(
            "no OAuth callback within {}ms",
            deadline.as_millis()
        ))
    })?
}

/// Accept callbacks until one arrives on `path`, answer it, return the code.
///
/// A connection that sends no request line within `read_timeout` is dropped
/// and the next one accepted. Browsers open idle preconnect sockets.
async fn serve_callback(
    listener: &TcpListener,
    path: &str,
    expected_state: &str,
    templates: &impl HtmlTemplates,
    read_timeout: Duration,
) -> Result<String> {
    loop {
        let (mut stream, peer) = listener
            .accept()
            .await
            .map_err(|e| Error::OAuth(format!("failed to accept connection: {e}")))?;

        let mut request_line = String::new();
        let read = {
            let mut reader = BufReader::new(&mut stream);
            tokio::time::timeout(read_timeout, reader.read_line(&mut request_line)).await
        };
        match read {
            Ok(Ok(_)) => {}
            Ok(Err(e)) => {
                debug!(%peer, error = %e, "dropping unreadable callback connection");
                continue;
            }
            Err(_) => {
                debug!(%peer, "dropping idle callback connection");
                continue;
            }
        }

        let Some(target) = request_line.split_whitespace().nth(1) else {
            if let Err(e) = respond(&mut stream, "400 Bad Request", "").await {
                debug!(%peer, error = %e, "failed to reject malformed callback request");
            }
            continue;
        };
        let url = Url::parse(&format!("http://localhost{target}"))
            .map_err(|e| Error::OAuth(format!("failed to parse callback URL: {e}")))?;

        if url.path() != path {
            // favicon and friends
            if let Err(e) = respond(&mut stream, "404 Not Found", "").await {
                debug!(%peer, error = %e, "failed to answer unrelated request");
            }
            continue;
        }

        let outcome = parse_callback(&url, expected_state);
        let (status, html) = match &outcome {
            Ok(_) => ("200 OK", templates.success_html().to_string()),
            Err(e) => ("400 Bad Request", templates.error_html(&e.to_string())),
        };
        respond(&mut stream, status, &html).await?;
        return outcome;
    }
}

async fn respond(stream: &mut TcpStream, status: &str, html: &str) -> Result<()> {
    let response = format!(
        "HTTP/1.1 {status}\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{html}",
        html.len()
    );
    let write = async {
        stream.write_all(response.as_bytes()).await?;
        stream.flush().await
    };
    write
        .await
        .map_err(|e| Error::OAuth(format!("failed to send response: {e}")))
}

fn parse_callback(url: &Url, expected_state: &str) -> Result<String> {
    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut error_description = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => error_description = Some(value.into_owned()),
            _ => {}
        }
    }

    if let Some(err) = error {
        let msg = error_description.unwrap_or(err);
        return Err(Error::OAuth(format!("authorization failed: {msg}")));
    }
    if state.as_deref() != Some(expected_state) {
        return Err(Error::OAuth("state mismatch in callback".to_string()));
    }
    code.ok_or_else(|| Error::OAuth("missing authorization code".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_oauth_config_for_issuer() {
        let config = OAuthConfig::for_issuer(
            "https://oauth2.sigstore.dev/auth/",
            "sigstore",
            vec!["openid".to_string(), "email".to_string()],
        );
        assert_eq!(config.auth_url, "https://oauth2.sigstore.dev/auth/auth");
        assert_eq!(config.token_url, "https://oauth2.sigstore.dev/auth/token");
        assert_eq!(
            config.device_auth_url,
            "https://oauth2.sigstore.dev/auth/device/code"
        );
    }

    #[test]
    fn test_randomize_port() {
        let url = randomize_port("http://localhost:0/auth/callback").unwrap();
        let port = url.port().unwrap();
        assert!(port >= 1025);
        assert_eq!(url.path(), "/auth/callback");
        assert_eq!(url.host_str(), Some("localhost"));

        let fixed = randomize_port("http://localhost:8080/cb").unwrap();
        assert_eq!(fixed.port(), Some(8080));
        assert!(randomize_port("not a url").is_err());
    }

    #[test]
    fn test_parse_callback() {
        let ok = Url::parse("http://localhost/cb?code=abc&state=s1").unwrap();
        assert_eq!(parse_callback(&ok, "s1").unwrap(), "abc");
        assert!(parse_callback(&ok, "s2").is_err());

        let denied = Url::parse("http://localhost/cb?error=access_denied&state=s1").unwrap();
        assert!(parse_callback(&denied, "s1")
            .unwrap_err()
            .to_string()
            .contains("access_denied"));
    }

    async fn local_listener() -> (TcpListener, std::net::SocketAddr) {
        let listener = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let addr = listener.local_addr().unwrap();
        (listener, addr)
    }

    #[tokio::test]
    async fn test_callback_skips_idle_connection() {
        let (listener, addr) = local_listener().await;
        let browser = tokio::spawn(async move {
            let idle = TcpStream::connect(addr).await.unwrap();
            let mut favicon = TcpStream::connect(addr).await.unwrap();
            favicon
                .write_all(b"GET /favicon.ico HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut callback = TcpStream::connect(addr).await.unwrap();
            callback
                .write_all(b"GET /cb?code=abc&state=s1 HTTP/1.1\r\nHost: localhost\r\n\r\n")
                .await
                .unwrap();
            let mut response = String::new();
            tokio::io::AsyncReadExt::read_to_string(&mut callback, &mut response)
                .await
                .unwrap();
            drop(idle);
            response
        });

        let code = wait_for_callback(
            &listener,
            "/cb",
            "s1",
            &crate::templates::DefaultTemplates,
            Duration::from_millis(200),
            Duration::from_secs(10),
        )
        .await
        .unwrap();
        assert_eq!(code, "abc");
        assert!(browser.await.unwrap().starts_with("HTTP/1.1 200 OK"));
    }

    #[tokio::test]
    async fn test_callback_deadline() {
        let (listener, addr) = local_listener().await;
        let _idle = TcpStream::connect(addr).await.unwrap();

        let started = tokio::time::Instant::now();
        let err = wait_for_callback(
            &listener,
            "/cb",
            "s1",
            &crate::templates::DefaultTemplates,
            Duration::from_secs(60),
            Duration::from_millis(300),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no OAuth callback within 300ms"));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_callback_with_wrong_state_fails() {
        let (listener, addr) = local_listener().await;
        tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            stream
                .write_all(b"GET /cb?code=abc&state=other HTTP/1.1\r\n\r\n")
                .await
                .unwrap();
            let mut sink = Vec::new();
            let _ = tokio::io::AsyncReadExt::read_to_end(&mut stream, &mut sink).await;
        });

        let err = wait_for_callback(
            &listener,
            "/cb",
            "s1",
            &crate::templates::DefaultTemplates,
            Duration::from_secs(5),
            Duration::from_secs(10),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("state mismatch"));
    }

    #[test]
    fn test_pkce_challenge() {
        let pkce = Pkce::generate();
        let expected = URL_SAFE_NO_PAD.encode(Sha256::digest(pkce.verifier.as_bytes()));
        assert_eq!(pkce.challenge, expected);
    }
}
