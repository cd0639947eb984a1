//! Trusted root document
//!
//! The root of trust lists the certificate authorities, transparency logs,
//! CT logs and timestamp authorities a verifier accepts, each with the
//! window during which it is authoritative.

use std::path::Path;

use bnd_types::{DerCertificate, DerPublicKey, LogId, LogKeyId, X509Certificate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Media type of trusted root documents, v0.1
pub const TRUSTED_ROOT_MEDIA_TYPE_V01: &str =
    "application/vnd.dev.sigstore.trustedroot+json;version=0.1";

/// Media type of trusted root documents, v0.2
pub const TRUSTED_ROOT_MEDIA_TYPE_V02: &str = "application/vnd.dev.sigstore.trustedroot.v0.2+json";

/// A validity window. A missing end means still valid.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<DateTime<Utc>>,
}

impl TimeRange {
    pub fn starting_at(start: DateTime<Utc>) -> Self {
        Self {
            start: Some(start),
            end: None,
        }
    }

    /// Whether `time` falls inside the window, bounds included.
    pub fn contains(&self, time: DateTime<Utc>) -> bool {
        self.start.map_or(true, |s| time >= s) && self.end.map_or(true, |e| time <= e)
    }
}

fn window_contains(range: Option<&TimeRange>, time: DateTime<Utc>) -> bool {
    range.map_or(true, |r| r.contains(time))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicKey {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_bytes: Option<DerPublicKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<TimeRange>,
}

/// A transparency log or CT log the root trusts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransparencyLogInstance {
    #[serde(default)]
    pub base_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hash_algorithm: Option<String>,
    pub public_key: PublicKey,
    pub log_id: LogId,
}

impl TransparencyLogInstance {
    pub fn new(base_url: impl Into<String>, key: DerPublicKey, log_id: Vec<u8>) -> Self {
        Self {
            base_url: base_url.into(),
            hash_algorithm: Some("SHA2_256".to_string()),
            public_key: PublicKey {
                raw_bytes: Some(key),
                key_details: Some("PKIX_ECDSA_P256_SHA_256".to_string()),
                valid_for: None,
            },
            log_id: LogId {
                key_id: LogKeyId::new(log_id),
            },
        }
    }

    pub fn with_valid_for(mut self, range: TimeRange) -> Self {
        self.public_key.valid_for = Some(range);
        self
    }

    /// The DER SubjectPublicKeyInfo of the log key.
    pub fn key(&self) -> Option<&DerPublicKey> {
        self.public_key.raw_bytes.as_ref()
    }

    /// The first four bytes of the log id, as used by checkpoint signatures.
    pub fn key_hint(&self) -> Option<[u8; 4]> {
        self.log_id.key_id.as_bytes().get(..4)?.try_into().ok()
    }

    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        window_contains(self.public_key.valid_for.as_ref(), time)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistinguishedName {
    #[serde(default)]
    pub organization: String,
    #[serde(default)]
    pub common_name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertChain {
    #[serde(default)]
    pub certificates: Vec<X509Certificate>,
}

/// A certificate authority or timestamp authority.
///
/// The chain is ordered leaf first, root last.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateAuthority {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<DistinguishedName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub cert_chain: CertChain,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid_for: Option<TimeRange>,
}

impl CertificateAuthority {
    pub fn new(chain: Vec<DerCertificate>) -> Self {
        Self {
            subject: None,
            uri: None,
            cert_chain: CertChain {
                certificates: chain
                    .into_iter()
                    .map(|raw_bytes| X509Certificate { raw_bytes })
                    .collect(),
            },
            valid_for: None,
        }
    }

    pub fn with_valid_for(mut self, range: TimeRange) -> Self {
        self.valid_for = Some(range);
        self
    }

    pub fn certificates(&self) -> impl Iterator<Item = &DerCertificate> {
        self.cert_chain.certificates.iter().map(|c| &c.raw_bytes)
    }

    pub fn leaf(&self) -> Option<&DerCertificate> {
        self.cert_chain.certificates.first().map(|c| &c.raw_bytes)
    }

    pub fn is_valid_at(&self, time: DateTime<Utc>) -> bool {
        window_contains(self.valid_for.as_ref(), time)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrustedRoot {
    pub media_type: String,
    #[serde(default)]
    pub tlogs: Vec<TransparencyLogInstance>,
    #[serde(default)]
    pub certificate_authorities: Vec<CertificateAuthority>,
    #[serde(default)]
    pub ctlogs: Vec<TransparencyLogInstance>,
    #[serde(default)]
    pub timestamp_authorities: Vec<CertificateAuthority>,
}

impl Default for TrustedRoot {
    fn default() -> Self {
        Self {
            media_type: TRUSTED_ROOT_MEDIA_TYPE_V01.to_string(),
            tlogs: Vec::new(),
            certificate_authorities: Vec::new(),
            ctlogs: Vec::new(),
            timestamp_authorities: Vec::new(),
        }
    }
}

impl TrustedRoot {
    /// Parse and check a trusted root document.
    pub fn from_slice(data: &[u8]) -> Result<Self> {
        let root: TrustedRoot = serde_json::from_slice(data)?;
        root.check_consistency()?;
        Ok(root)
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

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Reject documents a verifier could not use.
    pub fn check_consistency(&self) -> Result<()> {
        if self.media_type != TRUSTED_ROOT_MEDIA_TYPE_V01
            && self.media_type != TRUSTED_ROOT_MEDIA_TYPE_V02
        {
            return Err(Error::UnsupportedMediaType(self.media_type.clone()));
        }
        if !self
            .certificate_authorities
            .iter()
            .any(|ca| !ca.cert_chain.certificates.is_empty())
        {
            return Err(Error::Inconsistent(
                "no certificate authority with a certificate chain".to_string(),
            ));
        }
        Ok(())
    }

    /// Certificate authorities whose window contains `time`.
    pub fn certificate_authorities_at(
        &self,
        time: DateTime<Utc>,
    ) -> impl Iterator<Item = &CertificateAuthority> {
        self.certificate_authorities
            .iter()
            .filter(move |ca| ca.is_valid_at(time))
    }

    /// Look up a transparency log by its full log id.
    pub fn tlog_by_id(&self, log_id: &[u8]) -> Option<&TransparencyLogInstance> {
        self.tlogs
            .iter()
            .find(|t| t.log_id.key_id.as_bytes() == log_id)
    }

    /// Look up a transparency log by checkpoint key hint.
    pub fn tlog_by_key_hint(&self, hint: &[u8; 4]) -> Option<&TransparencyLogInstance> {
        self.tlogs.iter().find(|t| t.key_hint().as_ref() == Some(hint))
    }

    /// Look up a CT log by the log id carried in an SCT.
    pub fn ctlog_by_id(&self, log_id: &[u8]) -> Option<&TransparencyLogInstance> {
        self.ctlogs
            .iter()
            .find(|t| t.log_id.key_id.as_bytes() == log_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const ROOT_JSON: &str = r#"{
        "mediaType": "application/vnd.dev.sigstore.trustedroot+json;version=0.1",
        "tlogs": [{
            "baseUrl": "https://rekor.example.dev",
            "hashAlgorithm": "SHA2_256",
            "publicKey": {
                "rawBytes": "AQID",
                "keyDetails": "PKIX_ECDSA_P256_SHA_256",
                "validFor": {"start": "2021-01-12T11:53:27.000Z"}
            },
            "logId": {"keyId": "wNI9atQGlz+VWfO6LRygH4QUfY/8W4RFwiT5i5WRgB0="}
        }],
        "certificateAuthorities": [{
            "subject": {"organization": "example.dev", "commonName": "example"},
            "uri": "https://fulcio.example.dev",
            "certChain": {"certificates": [{"rawBytes": "BAUG"}]},
            "validFor": {"start": "2022-04-13T20:06:15.000Z", "end": "2022-10-01T00:00:00.000Z"}
        }],
        "ctlogs": [],
        "timestampAuthorities": []
    }"#;

    #[test]
    fn test_parse_trusted_root() {
        let root = TrustedRoot::from_json(ROOT_JSON).unwrap();
        assert_eq!(root.tlogs.len(), 1);
        assert_eq!(root.tlogs[0].key_hint(), Some([0xc0, 0xd2, 0x3d, 0x6a]));
        assert_eq!(root.certificate_authorities[0].leaf().unwrap().as_bytes(), &[4, 5, 6]);
        let hint = [0xc0, 0xd2, 0x3d, 0x6a];
        assert!(root.tlog_by_key_hint(&hint).is_some());
    }

    #[test]
    fn test_certificate_authority_window() {
        let root = TrustedRoot::from_json(ROOT_JSON).unwrap();
        let inside = Utc.with_ymd_and_hms(2022, 6, 1, 0, 0, 0).unwrap();
        let after = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(root.certificate_authorities_at(inside).count(), 1);
        assert_eq!(root.certificate_authorities_at(after).count(), 0);
        assert!(root.tlogs[0].is_valid_at(after));
        assert!(!root.tlogs[0].is_valid_at(after - Duration::days(3650)));
    }

    #[test]
    fn test_reject_unknown_media_type() {
        let json = ROOT_JSON.replace("trustedroot+json;version=0.1", "other+json");
        assert!(matches!(
            TrustedRoot::from_json(&json),
            Err(Error::UnsupportedMediaType(_))
        ));
    }

    #[test]
    fn test_reject_root_without_ca() {
        let mut root = TrustedRoot::from_json(ROOT_JSON).unwrap();
        root.certificate_authorities.clear();
        assert!(matches!(
            root.check_consistency(),
            Err(Error::Inconsistent(_))
        ));
    }
}
