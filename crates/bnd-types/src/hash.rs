//! Digest algorithm names

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Digest algorithms that may appear in statement subjects and artifact bindings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    Sha1,
    Sha256,
    Sha384,
    Sha512,
    Sha3_256,
    GitCommit,
}

impl HashAlgorithm {
    /// The key used for this algorithm in an in-toto `digest` map.
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha1 => "sha1",
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha384 => "sha384",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha3_256 => "sha3",
            HashAlgorithm::GitCommit => "gitCommit",
        }
    }

    /// Expected length of a hex digest, when fixed.
    pub fn hex_len(&self) -> Option<usize> {
        match self {
            HashAlgorithm::Sha1 | HashAlgorithm::GitCommit => Some(40),
            HashAlgorithm::Sha256 | HashAlgorithm::Sha3_256 => Some(64),
            HashAlgorithm::Sha384 => Some(96),
            HashAlgorithm::Sha512 => Some(128),
        }
    }
}

impl FromStr for HashAlgorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "sha1" | "SHA1" => Ok(HashAlgorithm::Sha1),
            "sha256" | "SHA256" | "SHA2_256" => Ok(HashAlgorithm::Sha256),
            "sha384" | "SHA384" | "SHA2_384" => Ok(HashAlgorithm::Sha384),
            "sha512" | "SHA512" | "SHA2_512" => Ok(HashAlgorithm::Sha512),
            "sha3" | "sha3-256" | "SHA3_256" => Ok(HashAlgorithm::Sha3_256),
            "gitCommit" => Ok(HashAlgorithm::GitCommit),
            other => Err(Error::UnsupportedHashAlgorithm(other.to_string())),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_aliases() {
        assert_eq!("SHA2_256".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::Sha256);
        assert_eq!("gitCommit".parse::<HashAlgorithm>().unwrap(), HashAlgorithm::GitCommit);
        assert!("md5".parse::<HashAlgorithm>().is_err());
    }
}
