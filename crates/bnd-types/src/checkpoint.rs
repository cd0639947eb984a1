//! Signed tree-head checkpoints
//!
//! A checkpoint is a signed note: a body of newline-terminated lines (origin,
//! tree size, base64 root hash, optional extension lines), a blank line, and
//! one signature line per signer of the form `— <name> <base64(keyhint || sig)>`.

use crate::encoding::decode_lenient;
use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;

const SIGNATURE_PREFIX: &str = "\u{2014} ";

/// A parsed checkpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub origin: String,
    pub tree_size: u64,
    pub root_hash: Vec<u8>,
    pub other_content: Vec<String>,
    pub signatures: Vec<CheckpointSignature>,
}

/// One signature line of a signed note
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointSignature {
    pub name: String,
    pub key_hint: [u8; 4],
    pub signature: Vec<u8>,
}

impl Checkpoint {
    /// Parse the text form of a signed checkpoint.
    pub fn from_text(text: &str) -> Result<Self> {
        let (body, sigs) = text
            .split_once("\n\n")
            .ok_or_else(|| Error::InvalidCheckpoint("missing signature separator".to_string()))?;

        let mut lines = body.lines();
        let origin = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or_else(|| Error::InvalidCheckpoint("missing origin".to_string()))?
            .to_string();
        let tree_size = lines
            .next()
            .ok_or_else(|| Error::InvalidCheckpoint("missing tree size".to_string()))?
            .parse::<u64>()
            .map_err(|e| Error::InvalidCheckpoint(format!("tree size: {e}")))?;
        let root_hash = lines
            .next()
            .ok_or_else(|| Error::InvalidCheckpoint("missing root hash".to_string()))
            .and_then(|l| {
                decode_lenient(l).map_err(|e| Error::InvalidCheckpoint(format!("root hash: {e}")))
            })?;
        let other_content = lines.map(str::to_string).collect();

        let mut signatures = Vec::new();
        for line in sigs.lines().filter(|l| !l.is_empty()) {
            let rest = line
                .strip_prefix(SIGNATURE_PREFIX)
                .ok_or_else(|| Error::InvalidCheckpoint(format!("malformed signature line: {line}")))?;
            let (name, encoded) = rest
                .rsplit_once(' ')
                .ok_or_else(|| Error::InvalidCheckpoint("signature line has no key".to_string()))?;
            let raw = decode_lenient(encoded)?;
            if raw.len() < 5 {
                return Err(Error::InvalidCheckpoint("signature too short".to_string()));
            }
            let mut key_hint = [0u8; 4];
            key_hint.copy_from_slice(&raw[..4]);
            signatures.push(CheckpointSignature {
                name: name.to_string(),
                key_hint,
                signature: raw[4..].to_vec(),
            });
        }
        if signatures.is_empty() {
            return Err(Error::InvalidCheckpoint("no signatures".to_string()));
        }

        Ok(Self {
            origin,
            tree_size,
            root_hash,
            other_content,
            signatures,
        })
    }

    /// The bytes covered by the note signatures.
    pub fn signed_data(&self) -> Vec<u8> {
        let mut out = format!(
            "{}\n{}\n{}\n",
            self.origin,
            self.tree_size,
            STANDARD.encode(&self.root_hash)
        );
        for line in &self.other_content {
            out.push_str(line);
            out.push('\n');
        }
        out.into_bytes()
    }

    /// Render the full signed note.
    pub fn to_text(&self) -> String {
        let mut out = String::from_utf8_lossy(&self.signed_data()).into_owned();
        out.push('\n');
        for sig in &self.signatures {
            let mut raw = sig.key_hint.to_vec();
            raw.extend_from_slice(&sig.signature);
            out.push_str(&format!("{SIGNATURE_PREFIX}{} {}\n", sig.name, STANDARD.encode(raw)));
        }
        out
    }

    /// Find the signature whose key hint matches the leading bytes of `log_key_id`.
    pub fn signature_for_key(&self, log_key_id: &[u8]) -> Option<&CheckpointSignature> {
        let hint = log_key_id.get(..4)?;
        self.signatures.iter().find(|s| s.key_hint == hint)
    }
}
