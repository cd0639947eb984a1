//! RFC 6962 Merkle tree hashing and inclusion proofs

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};

/// Hash of a leaf: `SHA-256(0x00 || data)`.
pub fn leaf_hash(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(data);
    hasher.finalize().into()
}

/// Hash of an interior node: `SHA-256(0x01 || left || right)`.
pub fn node_hash(left: &[u8], right: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// Verify that `leaf` sits at `index` in a tree of `tree_size` leaves with
/// the given root, following the algorithm of RFC 9162 section 2.1.3.2.
pub fn verify_inclusion<H: AsRef<[u8]>>(
    index: u64,
    tree_size: u64,
    leaf: &[u8; 32],
    proof: &[H],
    root: &[u8],
) -> Result<()> {
    if index >= tree_size {
        return Err(Error::InclusionProof(format!(
            "index {index} is outside a tree of size {tree_size}"
        )));
    }

    let mut f_n = index;
    let mut s_n = tree_size - 1;
    let mut r = *leaf;

    for p in proof {
        let p = p.as_ref();
        if p.len() != 32 {
            return Err(Error::InclusionProof(format!(
                "proof hash has {} bytes",
                p.len()
            )));
        }
        if s_n == 0 {
            return Err(Error::InclusionProof("proof is too long".to_string()));
        }
        if f_n & 1 == 1 || f_n == s_n {
            r = node_hash(p, &r);
            if f_n & 1 == 0 {
                while f_n & 1 == 0 && f_n != 0 {
                    f_n >>= 1;
                    s_n >>= 1;
                }
            }
        } else {
            r = node_hash(&r, p);
        }
        f_n >>= 1;
        s_n >>= 1;
    }

    if s_n != 0 {
        return Err(Error::InclusionProof("proof is too short".to_string()));
    }
    if r.as_slice() != root {
        return Err(Error::InclusionProof(format!(
            "computed root {} does not match {}",
            hex::encode(r),
            hex::encode(root)
        )));
    }
    Ok(())
}
