//! Byte and integer encodings used on the bundle wire format
//!
//! Protobuf-JSON carries `bytes` fields as standard base64 and `int64` fields
//! as decimal strings. The newtypes here keep the decoded form in memory and
//! only deal with the text form at the serde boundary.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::{Error, Result};

/// Serde adapter for `Vec<u8>` fields encoded as standard base64.
pub mod base64_bytes {
    use super::*;

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        decode_lenient(&s).map_err(serde::de::Error::custom)
    }
}

/// Serde adapter for `i64` fields that protobuf-JSON writes as strings.
///
/// Plain JSON numbers are accepted too, older bundles contain both.
pub mod int64_string {
    use super::*;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(i64),
    }

    pub fn serialize<S: Serializer>(value: &i64, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<i64, D::Error> {
        match StringOrNumber::deserialize(deserializer)? {
            StringOrNumber::String(s) => s.parse().map_err(serde::de::Error::custom),
            StringOrNumber::Number(n) => Ok(n),
        }
    }
}

/// Decode base64, tolerating a missing padding suffix.
pub fn decode_lenient(s: &str) -> Result<Vec<u8>> {
    let trimmed = s.trim();
    STANDARD
        .decode(trimmed)
        .or_else(|_| base64::engine::general_purpose::STANDARD_NO_PAD.decode(trimmed.trim_end_matches('=')))
        .map_err(|e| Error::Base64(e.to_string()))
}

macro_rules! base64_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, Default)]
        pub struct $name(Vec<u8>);

        impl $name {
            /// Wrap raw bytes.
            pub fn new(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }

            /// Copy from a byte slice.
            pub fn from_bytes(bytes: &[u8]) -> Self {
                Self(bytes.to_vec())
            }

            /// Decode from standard base64.
            pub fn from_base64(s: &str) -> Result<Self> {
                decode_lenient(s).map(Self)
            }

            pub fn as_bytes(&self) -> &[u8] {
                &self.0
            }

            pub fn into_bytes(self) -> Vec<u8> {
                self.0
            }

            pub fn to_base64(&self) -> String {
                STANDARD.encode(&self.0)
            }

            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }

        impl From<Vec<u8>> for $name {
            fn from(bytes: Vec<u8>) -> Self {
                Self(bytes)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}({})", stringify!($name), self.to_base64())
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                base64_bytes::serialize(&self.0, serializer)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                base64_bytes::deserialize(deserializer).map(Self)
            }
        }
    };
}

base64_newtype!(
    /// A DER-encoded X.509 certificate.
    DerCertificate
);
base64_newtype!(
    /// A DER-encoded SubjectPublicKeyInfo.
    DerPublicKey
);
base64_newtype!(
    /// DSSE payload bytes.
    PayloadBytes
);
base64_newtype!(
    /// Raw signature bytes (ASN.1 DER for ECDSA).
    SignatureBytes
);
base64_newtype!(
    /// A DER-encoded RFC 3161 timestamp token.
    SignedTimestamp
);
base64_newtype!(
    /// The canonicalized body of a transparency log entry.
    CanonicalizedBody
);
base64_newtype!(
    /// Transparency log identifier (SHA-256 of the log's public key).
    LogKeyId
);
base64_newtype!(
    /// A hash value inside an inclusion proof.
    HashBytes
);

impl DerCertificate {
    /// Parse the first `CERTIFICATE` block of a PEM document.
    pub fn from_pem(pem: &str) -> Result<Self> {
        let body: String = pem
            .lines()
            .map(str::trim)
            .skip_while(|l| !l.starts_with("-----BEGIN CERTIFICATE-----"))
            .skip(1)
            .take_while(|l| !l.starts_with("-----END CERTIFICATE-----"))
            .collect();
        if body.is_empty() {
            return Err(Error::InvalidPem("no CERTIFICATE block found".to_string()));
        }
        Self::from_base64(&body)
    }

    /// Parse every `CERTIFICATE` block of a PEM document, in order.
    pub fn chain_from_pem(pem: &str) -> Result<Vec<Self>> {
        let mut out = Vec::new();
        let mut rest = pem;
        while let Some(start) = rest.find("-----BEGIN CERTIFICATE-----") {
            let block = &rest[start..];
            let end = block
                .find("-----END CERTIFICATE-----")
                .ok_or_else(|| Error::InvalidPem("unterminated CERTIFICATE block".to_string()))?;
            let end = end + "-----END CERTIFICATE-----".len();
            out.push(Self::from_pem(&block[..end])?);
            rest = &block[end..];
        }
        Ok(out)
    }

    /// Encode as a PEM `CERTIFICATE` block.
    pub fn to_pem(&self) -> String {
        to_pem("CERTIFICATE", &self.0)
    }
}

impl LogKeyId {
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }
}

/// Encode DER bytes as a PEM block with 64 character lines.
pub fn to_pem(label: &str, der: &[u8]) -> String {
    let b64 = STANDARD.encode(der);
    let mut out = format!("-----BEGIN {label}-----\n");
    for chunk in b64.as_bytes().chunks(64) {
        // base64 output is ASCII
        out.push_str(std::str::from_utf8(chunk).unwrap_or_default());
        out.push('\n');
    }
    out.push_str(&format!("-----END {label}-----\n"));
    out
}

/// A DSSE signature key id. Empty strings round-trip unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize)]
    struct Wrapper {
        #[serde(with = "int64_string")]
        index: i64,
    }

    #[test]
    fn test_int64_accepts_string_and_number() {
        let a: Wrapper = serde_json::from_str(r#"{"index":"42"}"#).unwrap();
        let b: Wrapper = serde_json::from_str(r#"{"index":42}"#).unwrap();
        assert_eq!(a.index, 42);
        assert_eq!(b.index, 42);
        assert_eq!(serde_json::to_string(&a).unwrap(), r#"{"index":"42"}"#);
    }

    #[test]
    fn test_base64_newtype_json() {
        let sig = SignatureBytes::from_bytes(b"sig");
        let json = serde_json::to_string(&sig).unwrap();
        assert_eq!(json, "\"c2ln\"");
        let back: SignatureBytes = serde_json::from_str(&json).unwrap();
        assert_eq!(back.as_bytes(), b"sig");
    }

    #[test]
    fn test_decode_without_padding() {
        assert_eq!(decode_lenient("c2lnbg").unwrap(), b"sign");
    }

    #[test]
    fn test_pem_chain() {
        let one = to_pem("CERTIFICATE", b"first");
        let two = to_pem("CERTIFICATE", b"second");
        let chain = DerCertificate::chain_from_pem(&format!("{one}{two}")).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[0].as_bytes(), b"first");
        assert_eq!(chain[1].as_bytes(), b"second");
    }

    #[test]
    fn test_pem_missing_block() {
        assert!(DerCertificate::from_pem("nothing here").is_err());
    }
}
