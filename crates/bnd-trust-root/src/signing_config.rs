//! Signing configuration and service selection
//!
//! The signing configuration lists the service endpoints a signer may use.
//! Selection filters them by validity window and supported API version.

use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::trusted_root::TimeRange;
use crate::{Error, Result};

/// Supported Fulcio API versions
pub const SUPPORTED_CA_VERSIONS: &[u32] = &[1];

/// Supported Rekor API versions
pub const SUPPORTED_REKOR_VERSIONS: &[u32] = &[1];

/// Supported TSA API versions
pub const SUPPORTED_TSA_VERSIONS: &[u32] = &[1];

/// Expected media type for signing config v0.2
pub const SIGNING_CONFIG_MEDIA_TYPE: &str = "application/vnd.dev.sigstore.signingconfig.v0.2+json";

/// A service endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub url: String,
    #[serde(default)]
    pub major_api_version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<TimeRange>,
    #[serde(default)]
    pub operator: String,
}

impl Service {
    pub fn new(url: impl Into<String>, major_api_version: u32) -> Self {
        Self {
            url: url.into(),
            major_api_version,
            valid_for: None,
            operator: String::new(),
        }
    }

    pub fn with_valid_for(mut self, range: TimeRange) -> Self {
        self.valid_for = Some(range);
        self
    }

    /// Whether the service window contains `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        self.valid_for.as_ref().map_or(true, |r| r.contains(now))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceSelector {
    #[default]
    ServiceSelectorUndefined,
    All,
    Any,
    Exact,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfiguration {
    #[serde(default)]
    pub selector: ServiceSelector,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SigningConfig {
    pub media_type: String,
    #[serde(default)]
    pub ca_urls: Vec<Service>,
    #[serde(default)]
    pub oidc_urls: Vec<Service>,
    #[serde(default)]
    pub rekor_tlog_urls: Vec<Service>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rekor_tlog_config: Option<ServiceConfiguration>,
    #[serde(default)]
    pub tsa_urls: Vec<Service>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tsa_config: Option<ServiceConfiguration>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            media_type: SIGNING_CONFIG_MEDIA_TYPE.to_string(),
            ca_urls: Vec::new(),
            oidc_urls: Vec::new(),
            rekor_tlog_urls: Vec::new(),
            rekor_tlog_config: None,
            tsa_urls: Vec::new(),
            tsa_config: None,
        }
    }
}

/// Endpoints chosen for one signing operation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceSelection {
    pub ca: Option<Service>,
    /// Highest API version first; a signer publishes to the first only.
    pub tlogs: Vec<Service>,
    pub tsas: Vec<Service>,
}

impl SigningConfig {
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let config: SigningConfig = serde_json::from_slice(data)?;
        if config.media_type != SIGNING_CONFIG_MEDIA_TYPE {
            return Err(Error::UnsupportedMediaType(config.media_type));
        }
        Ok(config)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_slice(json.as_bytes())
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path.as_ref()).map_err(|e| {
            Error::Fetch(format!("reading {}: {e}", path.as_ref().display()))
        })?;
        Self::from_slice(&data)
    }

    /// The first valid CA with a supported API version.
    pub fn get_ca_url(&self, now: DateTime<Utc>) -> Option<&Service> {
        self.ca_urls
            .iter()
            .find(|s| s.is_valid_at(now) && SUPPORTED_CA_VERSIONS.contains(&s.major_api_version))
    }

    /// Valid Rekor endpoints, highest API version first.
    pub fn get_rekor_urls(&self, now: DateTime<Utc>) -> Vec<&Service> {
        let mut endpoints: Vec<_> = self
            .rekor_tlog_urls
            .iter()
            .filter(|s| {
                s.is_valid_at(now) && SUPPORTED_REKOR_VERSIONS.contains(&s.major_api_version)
            })
            .collect();
        endpoints.sort_by(|a, b| b.major_api_version.cmp(&a.major_api_version));
        endpoints
    }

    pub fn get_tsa_urls(&self, now: DateTime<Utc>) -> Vec<&Service> {
        self.tsa_urls
            .iter()
            .filter(|s| s.is_valid_at(now) && SUPPORTED_TSA_VERSIONS.contains(&s.major_api_version))
            .collect()
    }

    pub fn get_oidc_url(&self, now: DateTime<Utc>) -> Option<&Service> {
        self.oidc_urls.iter().find(|s| s.is_valid_at(now))
    }

    /// Select the endpoints to use at `now`.
    pub fn select(&self, now: DateTime<Utc>) -> ServiceSelection {
        let selection = ServiceSelection {
            ca: self.get_ca_url(now).cloned(),
            tlogs: self.get_rekor_urls(now).into_iter().cloned().collect(),
            tsas: self.get_tsa_urls(now).into_iter().cloned().collect(),
        };
        debug!(
            ca = selection.ca.as_ref().map(|s| s.url.as_str()),
            tlogs = ?selection.tlogs.iter().map(|s| &s.url).collect::<Vec<_>>(),
            tsas = ?selection.tsas.iter().map(|s| &s.url).collect::<Vec<_>>(),
            "selected signing services"
        );
        selection
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const CONFIG_JSON: &str = r#"{
        "mediaType": "application/vnd.dev.sigstore.signingconfig.v0.2+json",
        "caUrls": [
            {"url": "https://old-ca.example.dev", "majorApiVersion": 1,
             "validFor": {"start": "2020-01-01T00:00:00Z", "end": "2021-01-01T00:00:00Z"}},
            {"url": "https://ca.example.dev", "majorApiVersion": 1,
             "validFor": {"start": "2021-01-01T00:00:00Z"}, "operator": "example.dev"}
        ],
        "oidcUrls": [{"url": "https://oauth2.example.dev/auth", "majorApiVersion": 1}],
        "rekorTlogUrls": [
            {"url": "https://rekor.example.dev", "majorApiVersion": 1},
            {"url": "https://log2025.example.dev", "majorApiVersion": 2}
        ],
        "rekorTlogConfig": {"selector": "ANY"},
        "tsaUrls": [
            {"url": "https://tsa.example.dev/api/v1/timestamp", "majorApiVersion": 1},
            {"url": "https://tsa2.example.dev/api/v1/timestamp", "majorApiVersion": 1}
        ],
        "tsaConfig": {"selector": "ALL"}
    }"#;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_signing_config() {
        let config = SigningConfig::from_json(CONFIG_JSON).unwrap();
        assert_eq!(config.ca_urls.len(), 2);
        assert_eq!(
            config.rekor_tlog_config.unwrap().selector,
            ServiceSelector::Any
        );
    }

    #[test]
    fn test_select_skips_expired_and_unsupported() {
        let config = SigningConfig::from_json(CONFIG_JSON).unwrap();
        let selection = config.select(now());
        assert_eq!(selection.ca.unwrap().url, "https://ca.example.dev");
        assert_eq!(selection.tlogs.len(), 1);
        assert_eq!(selection.tlogs[0].url, "https://rekor.example.dev");
        assert_eq!(selection.tsas.len(), 2);
    }

    #[test]
    fn test_select_without_ca() {
        let mut config = SigningConfig::from_json(CONFIG_JSON).unwrap();
        config.ca_urls.truncate(1);
        assert!(config.select(now()).ca.is_none());
    }

    #[test]
    fn test_reject_wrong_media_type() {
        let json = CONFIG_JSON.replace("signingconfig.v0.2", "signingconfig.v0.1");
        assert!(matches!(
            SigningConfig::from_json(&json),
            Err(Error::UnsupportedMediaType(_))
        ));
    }
}
