//! Artifact digests used to bind a statement to the thing it describes
//!
//! Verification compares these against the `subject` digests of the
//! in-toto statement carried in the envelope.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use crate::intoto::Statement;

/// A hex digest tagged with its algorithm
///
/// # Example
///
/// ```
/// use bnd_types::ArtifactDigest;
///
/// let digest: ArtifactDigest =
///     "sha256:b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
///         .parse()
///         .unwrap();
/// assert_eq!(digest.algorithm.as_str(), "sha256");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactDigest {
    pub algorithm: HashAlgorithm,
    pub hex: String,
}

impl ArtifactDigest {
    /// Build from an algorithm name and a hex value.
    pub fn new(algorithm: &str, hex_digest: &str) -> Result<Self> {
        let algorithm = HashAlgorithm::from_str(algorithm)?;
        let hex = hex_digest.trim().to_lowercase();
        if hex.is_empty() || !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(Error::Hex(format!("invalid {algorithm} digest: {hex_digest:?}")));
        }
        if let Some(len) = algorithm.hex_len() {
            if hex.len() != len {
                return Err(Error::Hex(format!(
                    "{algorithm} digest must be {len} hex characters, got {}",
                    hex.len()
                )));
            }
        }
        Ok(Self { algorithm, hex })
    }

    /// True if a subject of `statement` carries this digest.
    pub fn matches(&self, statement: &Statement) -> bool {
        statement.has_subject_digest(self.algorithm.as_str(), &self.hex)
    }
}

impl FromStr for ArtifactDigest {
    type Err = Error;

    /// Parse the `algorithm:hex` form.
    fn from_str(s: &str) -> Result<Self> {
        let (algorithm, hex_digest) = s
            .split_once(':')
            .ok_or_else(|| Error::Hex(format!("expected algorithm:hex, got {s:?}")))?;
        Self::new(algorithm, hex_digest)
    }
}

impl fmt::Display for ArtifactDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.algorithm, self.hex)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intoto::Subject;

    const HELLO: &str = "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9";

    #[test]
    fn test_digest_matches_statement() {
        let statement = Statement::new(
            vec![Subject::new("hello.txt", "sha256", &HELLO.to_uppercase())],
            "https://example.com/predicate",
            serde_json::Value::Null,
        );
        let digest = ArtifactDigest::new("sha256", HELLO).unwrap();
        assert!(digest.matches(&statement));

        let other = ArtifactDigest::new("sha256", &"0".repeat(64)).unwrap();
        assert!(!other.matches(&statement));
    }

    #[test]
    fn test_digest_rejects_bad_hex() {
        assert!(ArtifactDigest::new("sha256", "xyz").is_err());
        assert!(ArtifactDigest::new("sha256", "abcd").is_err());
        assert!(ArtifactDigest::new("md5", HELLO).is_err());
    }

    #[test]
    fn test_display_round_trip() {
        let digest: ArtifactDigest = format!("sha256:{HELLO}").parse().unwrap();
        assert_eq!(digest.to_string(), format!("sha256:{HELLO}"));
    }
}
