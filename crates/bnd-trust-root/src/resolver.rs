//! Trust root resolution with a process-lifetime cache
//!
//! A local trusted root file overrides the remote repository. Resolved
//! material is shared behind an `Arc`; invalidating swaps the cache slot so
//! callers holding the previous material keep a consistent view.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::signing_config::SigningConfig;
use crate::trusted_root::TrustedRoot;
use crate::tuf::{TufClient, TufConfig, DEFAULT_TUF_URL, SIGNING_CONFIG_TARGET, TRUSTED_ROOT_TARGET};
use crate::{Error, Result};

/// Everything a signer or verifier needs from the root of trust.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrustMaterial {
    pub trusted_root: TrustedRoot,
    /// Absent when the source only provides a trusted root
    pub signing_config: Option<SigningConfig>,
}

impl TrustMaterial {
    pub fn new(trusted_root: TrustedRoot) -> Self {
        Self {
            trusted_root,
            signing_config: None,
        }
    }

    pub fn with_signing_config(mut self, config: SigningConfig) -> Self {
        self.signing_config = Some(config);
        self
    }
}

/// A source of trust material.
#[async_trait]
pub trait TrustRootSource: Send + Sync {
    async fn resolve(&self) -> Result<Arc<TrustMaterial>>;
}

/// Fixed trust material, for callers that already hold it.
#[derive(Debug, Clone)]
pub struct StaticTrustRoot(Arc<TrustMaterial>);

impl StaticTrustRoot {
    pub fn new(material: TrustMaterial) -> Self {
        Self(Arc::new(material))
    }
}

#[async_trait]
impl TrustRootSource for StaticTrustRoot {
    async fn resolve(&self) -> Result<Arc<TrustMaterial>> {
        Ok(self.0.clone())
    }
}

/// Where to find the root of trust.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrustRootConfig {
    /// TUF repository base URL
    pub url: String,
    /// Local trusted root file, takes precedence over `url`
    pub path: Option<PathBuf>,
    /// Local signing configuration, used together with `path`
    pub signing_config_path: Option<PathBuf>,
    /// Pinned TUF root.json for `url`
    pub tuf_root_path: Option<PathBuf>,
    /// Accept an unpinned repository's initial root on first contact
    pub trust_on_first_use: bool,
    pub cache_dir: Option<PathBuf>,
    pub disable_cache: bool,
    pub offline: bool,
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for TrustRootConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_TUF_URL.to_string(),
            path: None,
            signing_config_path: None,
            tuf_root_path: None,
            trust_on_first_use: false,
            cache_dir: None,
            disable_cache: false,
            offline: false,
            timeout_secs: 60,
            user_agent: bnd_types::USER_AGENT.to_string(),
        }
    }
}

impl TrustRootConfig {
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    pub fn tuf_config(&self) -> TufConfig {
        TufConfig {
            url: self.url.clone(),
            cache_dir: self.cache_dir.clone(),
            disable_cache: self.disable_cache,
            offline: self.offline,
            initial_root: None,
            initial_root_path: self.tuf_root_path.clone(),
            trust_on_first_use: self.trust_on_first_use,
            timeout: Duration::from_secs(self.timeout_secs),
            user_agent: self.user_agent.clone(),
        }
    }
}

/// Resolves and caches trust material for the life of the process.
pub struct TrustRootResolver {
    config: TrustRootConfig,
    tuf: TufConfig,
    cache: RwLock<Option<Arc<TrustMaterial>>>,
}

impl TrustRootResolver {
    pub fn new(config: TrustRootConfig) -> Self {
        let tuf = config.tuf_config();
        Self {
            config,
            tuf,
            cache: RwLock::new(None),
        }
    }

    /// Use a custom TUF configuration, e.g. one carrying an initial root.
    pub fn with_tuf_config(mut self, tuf: TufConfig) -> Self {
        self.tuf = tuf;
        self
    }

    pub fn config(&self) -> &TrustRootConfig {
        &self.config
    }

    /// Drop the cached material so the next resolve fetches again.
    pub async fn invalidate(&self) {
        debug!("invalidating cached trust root");
        *self.cache.write().await = None;
    }

    async fn fetch(&self) -> Result<TrustMaterial> {
        if let Some(path) = &self.config.path {
            debug!(path = %path.display(), "loading trust root from file");
            let trusted_root = TrustedRoot::from_file(path)?;
            let signing_config = self
                .config
                .signing_config_path
                .as_ref()
                .map(SigningConfig::from_file)
                .transpose()?;
            return Ok(TrustMaterial {
                trusted_root,
                signing_config,
            });
        }

        let client = TufClient::new(self.tuf.clone());
        let data = client
            .fetch_target(TRUSTED_ROOT_TARGET)
            .await
            .map_err(|e| Error::Fetch(format!("{} from {}: {e}", TRUSTED_ROOT_TARGET, self.tuf.url)))?;
        let trusted_root = TrustedRoot::from_slice(&data)?;

        let signing_config = match client.fetch_target(SIGNING_CONFIG_TARGET).await {
            Ok(data) => Some(SigningConfig::from_slice(&data)?),
            Err(e) => {
                warn!(error = %e, "repository has no usable signing configuration");
                None
            }
        };

        Ok(TrustMaterial {
            trusted_root,
            signing_config,
        })
    }
}

#[async_trait]
impl TrustRootSource for TrustRootResolver {
    async fn resolve(&self) -> Result<Arc<TrustMaterial>> {
        if let Some(material) = self.cache.read().await.as_ref() {
            debug!("trust root cache hit");
            return Ok(material.clone());
        }

        debug!("trust root cache miss");
        let material = Arc::new(self.fetch().await?);
        *self.cache.write().await = Some(material.clone());
        debug!("trust root cache refreshed");
        Ok(material)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROOT: &str = r#"{
        "mediaType": "application/vnd.dev.sigstore.trustedroot+json;version=0.1",
        "certificateAuthorities": [{"certChain": {"certificates": [{"rawBytes": "AQID"}]}}]
    }"#;

    const CONFIG: &str = r#"{
        "mediaType": "application/vnd.dev.sigstore.signingconfig.v0.2+json",
        "caUrls": [{"url": "https://ca.example.dev", "majorApiVersion": 1}]
    }"#;

    #[test]
    fn test_trust_root_config_default() {
        let config = TrustRootConfig::default();
        assert_eq!(config.url, DEFAULT_TUF_URL);
        assert!(config.path.is_none());
        assert_eq!(config.tuf_config().timeout, Duration::from_secs(60));
        assert!(!config.tuf_config().trust_on_first_use);

        let pinned = TrustRootConfig {
            tuf_root_path: Some(PathBuf::from("/etc/bnd/root.json")),
            trust_on_first_use: true,
            ..Default::default()
        };
        let tuf = pinned.tuf_config();
        assert_eq!(tuf.initial_root_path, Some(PathBuf::from("/etc/bnd/root.json")));
        assert!(tuf.trust_on_first_use);
    }

    #[tokio::test]
    async fn test_local_path_overrides_url() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("trusted_root.json");
        let signing = dir.path().join("signing_config.json");
        std::fs::write(&root, ROOT).unwrap();
        std::fs::write(&signing, CONFIG).unwrap();

        let config = TrustRootConfig {
            url: "http://127.0.0.1:1/unreachable".to_string(),
            path: Some(root.clone()),
            signing_config_path: Some(signing),
            ..Default::default()
        };
        let resolver = TrustRootResolver::new(config);
        let material = resolver.resolve().await.unwrap();
        assert_eq!(material.trusted_root.certificate_authorities.len(), 1);
        assert!(material.signing_config.is_some());

        // served from the cache even after the file goes away
        std::fs::remove_file(&root).unwrap();
        let again = resolver.resolve().await.unwrap();
        assert!(Arc::ptr_eq(&material, &again));

        resolver.invalidate().await;
        assert!(matches!(resolver.resolve().await, Err(Error::Fetch(_))));
    }

    #[tokio::test]
    async fn test_inconsistent_local_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("trusted_root.json");
        std::fs::write(
            &root,
            r#"{"mediaType": "application/vnd.dev.sigstore.trustedroot+json;version=0.1"}"#,
        )
        .unwrap();
        let resolver = TrustRootResolver::new(TrustRootConfig::from_path(root));
        assert!(matches!(
            resolver.resolve().await,
            Err(Error::Inconsistent(_))
        ));
    }
}
