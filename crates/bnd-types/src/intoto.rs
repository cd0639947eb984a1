//! in-toto attestation statements
//!
//! The statement is the payload of the DSSE envelope. Subjects bind the
//! predicate to artifacts by digest.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Payload type of an in-toto statement inside a DSSE envelope.
pub const INTOTO_PAYLOAD_TYPE: &str = "application/vnd.in-toto+json";

/// Statement type URI written by this crate.
pub const STATEMENT_TYPE_V1: &str = "https://in-toto.io/Statement/v1";

/// Older statement type URI, accepted when reading.
pub const STATEMENT_TYPE_V01: &str = "https://in-toto.io/Statement/v0.1";

/// Digest map of a subject, algorithm name to lowercase hex.
pub type Digest = BTreeMap<String, String>;

/// An artifact the statement is about.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subject {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub name: String,
    #[serde(default)]
    pub digest: Digest,
}

impl Subject {
    pub fn new(name: impl Into<String>, algorithm: &str, hex_digest: &str) -> Self {
        let mut digest = Digest::new();
        digest.insert(algorithm.to_string(), hex_digest.to_lowercase());
        Self {
            name: name.into(),
            digest,
        }
    }

    /// Whether this subject carries `algorithm` with the given hex value.
    pub fn matches(&self, algorithm: &str, hex_digest: &str) -> bool {
        self.digest
            .get(algorithm)
            .is_some_and(|d| d.eq_ignore_ascii_case(hex_digest))
    }
}

/// An in-toto statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Statement {
    #[serde(rename = "_type")]
    pub statement_type: String,
    #[serde(default)]
    pub subject: Vec<Subject>,
    #[serde(default)]
    pub predicate_type: String,
    #[serde(default, skip_serializing_if = "serde_json::Value::is_null")]
    pub predicate: serde_json::Value,
}

impl Statement {
    /// Build a v1 statement.
    pub fn new(subject: Vec<Subject>, predicate_type: impl Into<String>, predicate: serde_json::Value) -> Self {
        Self {
            statement_type: STATEMENT_TYPE_V1.to_string(),
            subject,
            predicate_type: predicate_type.into(),
            predicate,
        }
    }

    /// Parse a statement from JSON bytes without checking its contents.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Parse and require a statement type and at least one subject.
    pub fn parse_checked(bytes: &[u8]) -> Result<Self> {
        let statement = Self::from_slice(bytes)
            .map_err(|e| Error::InvalidStatement(format!("not an in-toto statement: {e}")))?;
        if statement.statement_type.is_empty() {
            return Err(Error::InvalidStatement("statement has no _type".to_string()));
        }
        if statement.subject.is_empty() {
            return Err(Error::InvalidStatement("statement has no subjects".to_string()));
        }
        Ok(statement)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// True if any subject carries the given digest.
    pub fn has_subject_digest(&self, algorithm: &str, hex_digest: &str) -> bool {
        self.subject.iter().any(|s| s.matches(algorithm, hex_digest))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATEMENT: &str = r#"{
        "_type": "https://in-toto.io/Statement/v1",
        "subject": [{"name": "pkg.tar.gz", "digest": {"sha256": "ABCDEF"}}],
        "predicateType": "https://slsa.dev/provenance/v1",
        "predicate": {"buildType": "test"}
    }"#;

    #[test]
    fn test_parse_statement() {
        let s = Statement::parse_checked(STATEMENT.as_bytes()).unwrap();
        assert_eq!(s.predicate_type, "https://slsa.dev/provenance/v1");
        assert!(s.has_subject_digest("sha256", "abcdef"));
        assert!(!s.has_subject_digest("sha512", "abcdef"));
    }

    #[test]
    fn test_reject_statement_without_subjects() {
        let err = Statement::parse_checked(br#"{"_type":"https://in-toto.io/Statement/v1","subject":[]}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_reject_non_statement() {
        assert!(Statement::parse_checked(b"[1,2,3]").is_err());
        assert!(Statement::parse_checked(b"").is_err());
    }
}
