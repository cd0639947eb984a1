//! TUF client for fetching the trusted root and signing configuration
//!
//! Targets are fetched with `tough` over a reqwest transport that identifies
//! this tool in its user agent. Fetched targets and the latest verified TUF
//! root are kept in a per-repository cache directory so later runs (and
//! offline runs) can start from them.

use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use futures::TryStreamExt;
use tough::{
    FilesystemTransport, IntoVec, RepositoryLoader, TargetName, Transport, TransportError,
    TransportErrorKind,
};
use tracing::{debug, warn};
use url::Url;

use crate::{Error, Result};

/// Byte stream returned by [`Transport::fetch`] (not re-exported by `tough`)
type TransportStream = std::pin::Pin<
    Box<dyn futures::Stream<Item = std::result::Result<tough::Bytes, TransportError>> + Send>,
>;

/// Default production TUF repository URL
pub const DEFAULT_TUF_URL: &str = "https://tuf-repo-cdn.sigstore.dev";

/// Staging TUF repository URL
pub const STAGING_TUF_URL: &str = "https://tuf-repo-cdn.sigstage.dev";

/// TUF target name for trusted root
pub const TRUSTED_ROOT_TARGET: &str = "trusted_root.json";

/// TUF target name for signing configuration
pub const SIGNING_CONFIG_TARGET: &str = "signing_config.v0.2.json";

const CACHED_ROOT: &str = "root.json";

/// Configuration for the TUF client
#[derive(Debug, Clone)]
pub struct TufConfig {
    /// Base URL for the TUF repository
    pub url: String,
    /// Cache directory override
    pub cache_dir: Option<PathBuf>,
    pub disable_cache: bool,
    /// Only read previously cached targets
    pub offline: bool,
    /// TUF root.json to bootstrap trust from
    pub initial_root: Option<Vec<u8>>,
    /// File holding the bootstrap root.json, read when `initial_root` is unset
    pub initial_root_path: Option<PathBuf>,
    /// Accept the repository's own `1.root.json` when no root is pinned or cached
    pub trust_on_first_use: bool,
    pub timeout: Duration,
    pub user_agent: String,
}

impl Default for TufConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TUF_URL.to_string(),
            cache_dir: None,
            disable_cache: false,
            offline: false,
            initial_root: None,
            initial_root_path: None,
            trust_on_first_use: false,
            timeout: Duration::from_secs(60),
            user_agent: bnd_types::USER_AGENT.to_string(),
        }
    }
}

impl TufConfig {
    pub fn production() -> Self {
        Self::default()
    }

    pub fn staging() -> Self {
        Self::for_url(STAGING_TUF_URL)
    }

    pub fn for_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_cache_dir(mut self, path: PathBuf) -> Self {
        self.cache_dir = Some(path);
        self
    }

    pub fn without_cache(mut self) -> Self {
        self.disable_cache = true;
        self
    }

    /// Skip the network and serve targets from the cache.
    ///
    /// Cached targets were verified when downloaded but their freshness is
    /// not checked again.
    pub fn offline(mut self) -> Self {
        self.offline = true;
        self
    }

    pub fn with_initial_root(mut self, root: Vec<u8>) -> Self {
        self.initial_root = Some(root);
        self
    }

    pub fn with_initial_root_path(mut self, path: PathBuf) -> Self {
        self.initial_root_path = Some(path);
        self
    }

    /// Trust whatever initial root the repository serves on the first
    /// fetch. Only sensible for private mirrors.
    pub fn trust_on_first_use(mut self) -> Self {
        self.trust_on_first_use = true;
        self
    }
}

/// Reduce a repository URL to a directory name.
pub fn sanitize_url(url: &str) -> String {
    let without_scheme = url.split_once("://").map_or(url, |(_, rest)| rest);
    without_scheme
        .trim_end_matches('/')
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// HTTP transport that sets the user agent and a request timeout.
#[derive(Debug, Clone)]
pub struct UserAgentTransport {
    client: reqwest::Client,
}

impl UserAgentTransport {
    pub fn new(user_agent: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Tuf(format!("building HTTP client: {e}")))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for UserAgentTransport {
    async fn fetch(&self, url: Url) -> std::result::Result<TransportStream, TransportError> {
        match url.scheme() {
            "file" => return FilesystemTransport.fetch(url).await,
            "http" | "https" => {}
            _ => return Err(TransportError::new(TransportErrorKind::UnsupportedUrlScheme, url)),
        }

        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| TransportError::new_with_cause(TransportErrorKind::Other, url.clone(), e))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND || status == reqwest::StatusCode::FORBIDDEN {
            return Err(TransportError::new(TransportErrorKind::FileNotFound, url));
        }
        let response = response
            .error_for_status()
            .map_err(|e| TransportError::new_with_cause(TransportErrorKind::Other, url.clone(), e))?;

        let stream = response.bytes_stream().map_err(move |e| {
            TransportError::new_with_cause(TransportErrorKind::Other, url.clone(), e)
        });
        Ok(Box::pin(stream))
    }
}

/// Fetches verified targets from one TUF repository.
pub struct TufClient {
    config: TufConfig,
}

impl TufClient {
    pub fn new(config: TufConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TufConfig {
        &self.config
    }

    /// Fetch a target, online through TUF or offline from the cache.
    pub async fn fetch_target(&self, target_name: &str) -> Result<Vec<u8>> {
        if self.config.offline {
            return self.fetch_target_offline(target_name).await;
        }

        match tokio::time::timeout(self.config.timeout, self.fetch_target_online(target_name)).await
        {
            Ok(result) => result,
            Err(_) => Err(Error::Tuf(format!(
                "fetching {target_name} timed out after {:?}",
                self.config.timeout
            ))),
        }
    }

    async fn fetch_target_online(&self, target_name: &str) -> Result<Vec<u8>> {
        let base_url = Url::parse(&format!("{}/", self.config.url.trim_end_matches('/')))
            .map_err(|e| Error::Tuf(format!("invalid repository URL: {e}")))?;
        let targets_url = base_url
            .join("targets/")
            .map_err(|e| Error::Tuf(e.to_string()))?;
        let transport = UserAgentTransport::new(&self.config.user_agent, self.config.timeout)?;

        let cache_dir = if self.config.disable_cache {
            None
        } else {
            let dir = self.cache_dir()?;
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::Tuf(format!("creating cache directory: {e}")))?;
            Some(dir)
        };

        let root = self
            .bootstrap_root(&transport, &base_url, cache_dir.as_ref())
            .await?;

        let mut loader =
            RepositoryLoader::new(&root, base_url, targets_url).transport(transport);
        if let Some(dir) = &cache_dir {
            loader = loader.datastore(dir.clone());
        }
        let repo = loader
            .load()
            .await
            .map_err(|e| Error::Tuf(format!("TUF repository load failed: {e}")))?;

        let target = TargetName::new(target_name)
            .map_err(|e| Error::Tuf(format!("invalid target name: {e}")))?;
        let bytes = repo
            .read_target(&target)
            .await
            .map_err(|e| Error::Tuf(format!("failed to read target: {e}")))?
            .ok_or_else(|| Error::Tuf(format!("target not found: {target_name}")))?
            .into_vec()
            .await
            .map_err(|e| Error::Tuf(format!("failed to read target contents: {e}")))?;

        if let Some(dir) = &cache_dir {
            self.persist(dir, repo.root(), target_name, &bytes).await;
        }
        debug!(target = target_name, url = %self.config.url, "fetched TUF target");
        Ok(bytes)
    }

    /// Pick the TUF root to start the update from.
    ///
    /// A pinned root wins, then the root cached by an earlier run. The
    /// repository's own initial root is only accepted when trust on first
    /// use was requested.
    async fn bootstrap_root(
        &self,
        transport: &UserAgentTransport,
        base_url: &Url,
        cache_dir: Option<&PathBuf>,
    ) -> Result<Vec<u8>> {
        if let Some(root) = &self.config.initial_root {
            return Ok(root.clone());
        }

        if let Some(path) = &self.config.initial_root_path {
            return tokio::fs::read(path).await.map_err(|e| {
                Error::Tuf(format!("reading TUF root {}: {e}", path.display()))
            });
        }

        if let Some(dir) = cache_dir {
            if let Ok(root) = tokio::fs::read(dir.join(CACHED_ROOT)).await {
                debug!(path = %dir.display(), "using cached TUF root");
                return Ok(root);
            }
        }

        if !self.config.trust_on_first_use {
            return Err(Error::Tuf(format!(
                "no trusted TUF root for {}: pin one with a root.json file or enable trust on first use",
                self.config.url
            )));
        }

        let url = base_url
            .join("1.root.json")
            .map_err(|e| Error::Tuf(e.to_string()))?;
        warn!(
            url = %url,
            "trusting the repository's initial TUF root on first use"
        );
        transport
            .fetch(url)
            .await
            .map_err(|e| Error::Tuf(format!("fetching initial TUF root: {e}")))?
            .into_vec()
            .await
            .map_err(|e| Error::Tuf(format!("reading initial TUF root: {e}")))
    }

    async fn persist(
        &self,
        dir: &std::path::Path,
        root: &tough::schema::Signed<tough::schema::Root>,
        target_name: &str,
        bytes: &[u8],
    ) {
        match serde_json::to_vec(root) {
            Ok(root) => {
                if let Err(e) = tokio::fs::write(dir.join(CACHED_ROOT), root).await {
                    debug!(error = %e, "could not cache TUF root");
                }
            }
            Err(e) => debug!(error = %e, "could not serialize TUF root"),
        }

        let targets = dir.join("targets");
        let written = async {
            tokio::fs::create_dir_all(&targets).await?;
            tokio::fs::write(targets.join(target_name), bytes).await
        }
        .await;
        if let Err(e) = written {
            debug!(error = %e, target = target_name, "could not cache TUF target");
        }
    }

    async fn fetch_target_offline(&self, target_name: &str) -> Result<Vec<u8>> {
        if self.config.disable_cache {
            return Err(Error::Tuf(
                "offline mode requires the TUF cache".to_string(),
            ));
        }
        let path = self.cache_dir()?.join("targets").join(target_name);
        tokio::fs::read(&path).await.map_err(|e| {
            Error::Tuf(format!(
                "target '{target_name}' not in cache (offline mode): {e}"
            ))
        })
    }

    /// The cache directory for this repository.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let base = match &self.config.cache_dir {
            Some(dir) => dir.clone(),
            None => directories::ProjectDirs::from("dev", "carabiner", "bnd")
                .ok_or_else(|| Error::Tuf("could not determine cache directory".into()))?
                .cache_dir()
                .join("tuf"),
        };
        Ok(base.join(sanitize_url(&self.config.url)))
    }
}
