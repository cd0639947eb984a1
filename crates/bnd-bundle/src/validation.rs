//! Bundle validation
//!
//! Structural checks that do not need trust material. Cryptographic checks
//! live in the verifier.

use crate::error::{Error, Result};
use bnd_types::{Bundle, MediaType};

/// Validation options
#[derive(Debug, Clone, Default)]
pub struct ValidationOptions {
    /// Require at least one log entry with an inclusion proof
    pub require_inclusion_proof: bool,
    /// Require timestamp verification data
    pub require_timestamp: bool,
}

/// Checks every decoded bundle must pass.
pub fn validate_structure(bundle: &Bundle) -> Result<()> {
    let version = bundle
        .version()
        .map_err(|e| Error::Validation(format!("invalid media type: {e}")))?;

    match (&bundle.dsse_envelope, &bundle.message_signature) {
        (Some(_), None) | (None, Some(_)) => {}
        (Some(_), Some(_)) => {
            return Err(Error::Validation(
                "bundle carries both a DSSE envelope and a message signature".to_string(),
            ))
        }
        (None, None) => {
            return Err(Error::Validation(
                "bundle carries no signed content".to_string(),
            ))
        }
    }

    if let Some(vm) = &bundle.verification_material {
        let kinds = [
            vm.certificate.is_some(),
            vm.x509_certificate_chain.is_some(),
            vm.public_key.is_some(),
        ];
        if kinds.iter().filter(|k| **k).count() > 1 {
            return Err(Error::Validation(
                "verification material carries more than one key kind".to_string(),
            ));
        }
        if version == MediaType::Bundle0_3 && vm.x509_certificate_chain.is_some() {
            return Err(Error::Validation(
                "v0.3 bundle must use single certificate, not chain".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validate a bundle
pub fn validate_bundle(bundle: &Bundle) -> Result<()> {
    validate_bundle_with_options(bundle, &ValidationOptions::default())
}

/// Validate a bundle with custom options
pub fn validate_bundle_with_options(bundle: &Bundle, options: &ValidationOptions) -> Result<()> {
    validate_structure(bundle)?;

    if let Some(envelope) = bundle.dsse_envelope() {
        if envelope.payload.is_empty() {
            return Err(Error::Validation("DSSE envelope has no payload".to_string()));
        }
        if envelope.signatures.is_empty() {
            return Err(Error::Validation("DSSE envelope has no signatures".to_string()));
        }
    }

    if options.require_inclusion_proof && !bundle.has_inclusion_proof() {
        return Err(Error::Validation(
            "bundle must have an inclusion proof".to_string(),
        ));
    }

    if options.require_timestamp && bundle.rfc3161_timestamps().is_empty() {
        return Err(Error::Validation(
            "bundle must have timestamp verification data".to_string(),
        ));
    }

    Ok(())
}
