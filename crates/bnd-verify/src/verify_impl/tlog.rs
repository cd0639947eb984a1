//! Transparency log verification
//!
//! This module handles verification of transparency log entries including
//! Merkle inclusion proofs, checkpoint verification and SET (Signed Entry
//! Timestamp) verification.

use bnd_crypto::{leaf_hash, verify_inclusion, verify_signature_auto};
use bnd_rekor::signed_entry_timestamp_payload;
use bnd_trust_root::TrustedRoot;
use bnd_types::{
    DerCertificate, DsseEnvelope, InclusionPromise, InclusionProof, TransparencyLogEntry,
};

use super::helpers::to_datetime;
use super::rekor::verify_dsse_body;
use crate::result::{Check, FailureReason};

fn tlog_error(msg: impl Into<String>) -> FailureReason {
    FailureReason::TransparencyLog(msg.into())
}

/// What a verified entry proves.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct VerifiedEntry {
    /// The entry is in the log tree
    pub included: bool,
    /// Integration time vouched for by a verified SET
    pub integrated_time: Option<i64>,
}

/// Verify one entry against the envelope it should record.
pub fn verify_tlog_entry(
    entry: &TransparencyLogEntry,
    envelope: &DsseEnvelope,
    certificate: &DerCertificate,
    trusted_root: &TrustedRoot,
) -> Check<VerifiedEntry> {
    verify_dsse_body(entry, envelope, certificate)?;

    let mut verified = VerifiedEntry::default();
    if let Some(proof) = &entry.inclusion_proof {
        verify_inclusion_proof(entry, proof, trusted_root)?;
        verified.included = true;
    }
    if let Some(promise) = &entry.inclusion_promise {
        verify_set(entry, promise, trusted_root)?;
        verified.integrated_time = Some(entry.integrated_time);
    }

    if !verified.included && verified.integrated_time.is_none() {
        return Err(tlog_error(format!(
            "entry {} carries neither an inclusion proof nor an inclusion promise",
            entry.log_index
        )));
    }
    Ok(verified)
}

/// Verify the Merkle path from the entry body to the proof's root and the
/// checkpoint that signs that root.
pub fn verify_inclusion_proof(
    entry: &TransparencyLogEntry,
    proof: &InclusionProof,
    trusted_root: &TrustedRoot,
) -> Check<()> {
    let index = u64::try_from(proof.log_index)
        .map_err(|_| tlog_error(format!("negative log index {}", proof.log_index)))?;
    let tree_size = u64::try_from(proof.tree_size)
        .map_err(|_| tlog_error(format!("negative tree size {}", proof.tree_size)))?;

    let leaf = leaf_hash(entry.canonicalized_body.as_bytes());
    verify_inclusion(index, tree_size, &leaf, &proof.hashes, proof.root_hash.as_bytes())
        .map_err(|e| tlog_error(format!("inclusion proof does not verify: {e}")))?;

    verify_checkpoint(proof, entry.integrated_time, trusted_root)
}

/// Verify the checkpoint carried by an inclusion proof.
///
/// The checkpoint must commit to the proof's root hash and tree size, and
/// one of its signatures must verify with a trusted log key whose validity
/// window contains the integration time.
pub fn verify_checkpoint(
    proof: &InclusionProof,
    integrated_time: i64,
    trusted_root: &TrustedRoot,
) -> Check<()> {
    let checkpoint = proof
        .parse_checkpoint()
        .map_err(|e| tlog_error(format!("failed to parse checkpoint: {e}")))?;

    if checkpoint.root_hash != proof.root_hash.as_bytes() {
        return Err(tlog_error(format!(
            "checkpoint root hash mismatch: checkpoint has {}, proof has {}",
            hex::encode(&checkpoint.root_hash),
            hex::encode(proof.root_hash.as_bytes())
        )));
    }
    if i64::try_from(checkpoint.tree_size).ok() != Some(proof.tree_size) {
        return Err(tlog_error(format!(
            "checkpoint tree size {} does not match proof tree size {}",
            checkpoint.tree_size, proof.tree_size
        )));
    }

    let time = to_datetime(integrated_time);
    let message = checkpoint.signed_data();
    for sig in &checkpoint.signatures {
        let Some(log) = trusted_root.tlog_by_key_hint(&sig.key_hint) else {
            continue;
        };
        if time.is_some_and(|t| !log.is_valid_at(t)) {
            continue;
        }
        let Some(key) = log.key() else {
            continue;
        };
        if verify_signature_auto(key.as_bytes(), &message, &sig.signature).is_ok() {
            return Ok(());
        }
    }

    Err(tlog_error(
        "no checkpoint signature verifies with a trusted log key",
    ))
}

/// Verify SET (Signed Entry Timestamp)
pub fn verify_set(
    entry: &TransparencyLogEntry,
    promise: &InclusionPromise,
    trusted_root: &TrustedRoot,
) -> Check<()> {
    let log_id = entry.log_id.key_id.as_bytes();
    let log = trusted_root
        .tlog_by_id(log_id)
        .ok_or_else(|| tlog_error(format!("unknown log id {}", hex::encode(log_id))))?;

    let time = to_datetime(entry.integrated_time).ok_or_else(|| {
        tlog_error(format!("invalid integrated time {}", entry.integrated_time))
    })?;
    if !log.is_valid_at(time) {
        return Err(tlog_error(format!(
            "log key was not valid at integrated time {time}"
        )));
    }
    let key = log
        .key()
        .ok_or_else(|| tlog_error("trusted log has no public key"))?;

    let payload = signed_entry_timestamp_payload(
        &entry.canonicalized_body.to_base64(),
        entry.integrated_time,
        entry.log_index,
        &entry.log_id.key_id.to_hex(),
    )
    .map_err(|e| tlog_error(e.to_string()))?;

    verify_signature_auto(
        key.as_bytes(),
        &payload,
        promise.signed_entry_timestamp.as_bytes(),
    )
    .map_err(|e| tlog_error(format!("SET verification failed: {e}")))
}
