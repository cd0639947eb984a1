//! Digest helpers

use sha2::{Digest, Sha256, Sha384, Sha512};

use crate::error::{Error, Result};

/// SHA-256 of `data`.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Digest `data` with a SHA-2 algorithm named as in in-toto digest maps.
pub fn digest_by_name(algorithm: &str, data: &[u8]) -> Result<Vec<u8>> {
    match algorithm {
        "sha256" => Ok(Sha256::digest(data).to_vec()),
        "sha384" => Ok(Sha384::digest(data).to_vec()),
        "sha512" => Ok(Sha512::digest(data).to_vec()),
        other => Err(Error::UnsupportedAlgorithm(other.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_vector() {
        assert_eq!(
            hex::encode(sha256(b"hello world")),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_digest_by_name() {
        assert_eq!(digest_by_name("sha384", b"").unwrap().len(), 48);
        assert!(digest_by_name("md5", b"").is_err());
    }
}
