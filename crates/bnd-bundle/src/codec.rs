//! Bundle encoding and decoding
//!
//! Decoding is strict about what the bundle is (a recognized media type and
//! exactly one content kind) and lenient about integer encodings. Encoding
//! always produces valid JSON.

use bnd_types::{Bundle, MediaType, Statement};
use serde_json::Value;
use tracing::debug;

use crate::error::{Error, Result};
use crate::validation::validate_structure;

/// Decode and structurally validate a bundle.
pub fn decode(bytes: &[u8]) -> Result<Bundle> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| Error::Format(format!("bundle is not valid JSON: {e}")))?;

    let media_type = value
        .get("mediaType")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::Format("JSON data is not a known envelope format".to_string()))?;
    media_type
        .parse::<MediaType>()
        .map_err(|_| Error::Format(format!("unrecognized bundle media type {media_type:?}")))?;

    let bundle: Bundle = serde_json::from_value(value)
        .map_err(|e| Error::Format(format!("malformed bundle: {e}")))?;
    validate_structure(&bundle).map_err(|e| Error::Format(e.to_string()))?;
    debug!(media_type = %bundle.media_type, "decoded bundle");
    Ok(bundle)
}

/// Decode a bundle from JSON text.
pub fn parse_bundle(json: &str) -> Result<Bundle> {
    decode(json.as_bytes())
}

/// Encode a bundle as compact JSON.
pub fn encode(bundle: &Bundle) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(bundle)?)
}

/// Encode a bundle as indented JSON.
pub fn encode_pretty(bundle: &Bundle) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec_pretty(bundle)?)
}

/// The raw DSSE payload of the bundle.
pub fn extract_statement_json(bundle: &Bundle) -> Result<&[u8]> {
    let envelope = bundle
        .dsse_envelope()
        .ok_or_else(|| Error::Format("bundle has no DSSE payload".to_string()))?;
    if envelope.payload.is_empty() {
        return Err(Error::Format("bundle has no DSSE payload".to_string()));
    }
    Ok(envelope.payload.as_bytes())
}

/// Parse the statement carried in the bundle's DSSE envelope.
pub fn extract_statement(bundle: &Bundle) -> Result<Statement> {
    let payload = extract_statement_json(bundle)?;
    Statement::from_slice(payload)
        .map_err(|e| Error::Format(format!("DSSE payload is not an in-toto statement: {e}")))
}

/// Parse a bare statement, as found in an attestation file.
pub fn parse_statement(bytes: &[u8]) -> Result<Statement> {
    Statement::from_slice(bytes).map_err(|e| Error::Format(format!("not an in-toto statement: {e}")))
}

/// Predicate type and body of a statement.
pub fn extract_predicate(statement: &Statement) -> (&str, &Value) {
    (&statement.predicate_type, &statement.predicate)
}

/// The predicate type of the statement carried in a bundle.
pub fn extract_predicate_type(bundle: &Bundle) -> Result<String> {
    Ok(extract_statement(bundle)?.predicate_type)
}

/// Predicate body of a statement as JSON bytes.
pub fn extract_predicate_json(statement: &Statement) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&statement.predicate)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::BundleV03;
    use bnd_types::{DerCertificate, DsseEnvelope, SignatureBytes};

    const STATEMENT: &str = r#"{"_type":"https://in-toto.io/Statement/v1","subject":[{"name":"a","digest":{"sha256":"00"}}],"predicateType":"https://example.com/p","predicate":{"k":"v"}}"#;

    fn sample_bundle() -> Bundle {
        let envelope = DsseEnvelope::for_statement(STATEMENT.as_bytes())
            .with_signature(SignatureBytes::from_bytes(b"sig"));
        BundleV03::with_certificate_and_dsse(DerCertificate::from_bytes(b"cert"), envelope)
            .into_bundle()
    }

    #[test]
    fn test_decode_encoded_bundle() {
        let bundle = sample_bundle();
        let decoded = decode(&encode(&bundle).unwrap()).unwrap();
        assert_eq!(decoded, bundle);
        assert_eq!(decode(&encode(&decoded).unwrap()).unwrap(), decoded);
    }

    #[test]
    fn test_decode_rejects_unknown_media_type() {
        let mut value = serde_json::to_value(sample_bundle()).unwrap();
        value["mediaType"] = "application/json".into();
        let err = decode(&serde_json::to_vec(&value).unwrap()).unwrap_err();
        assert!(matches!(err, Error::Format(_)));
    }

    #[test]
    fn test_decode_rejects_non_bundle() {
        assert!(matches!(decode(b"not json"), Err(Error::Format(_))));
        assert!(matches!(decode(STATEMENT.as_bytes()), Err(Error::Format(_))));
    }

    #[test]
    fn test_extract_statement_and_predicate() {
        let bundle = sample_bundle();
        let statement = extract_statement(&bundle).unwrap();
        let (predicate_type, predicate) = extract_predicate(&statement);
        assert_eq!(predicate_type, "https://example.com/p");
        assert_eq!(predicate["k"], "v");
        assert_eq!(extract_predicate_json(&statement).unwrap(), br#"{"k":"v"}"#);
        assert_eq!(extract_predicate_type(&bundle).unwrap(), "https://example.com/p");
    }

    #[test]
    fn test_parse_bundle_from_text() {
        let json = String::from_utf8(encode_pretty(&sample_bundle()).unwrap()).unwrap();
        assert_eq!(parse_bundle(&json).unwrap(), sample_bundle());
    }

    #[test]
    fn test_extract_statement_without_dsse() {
        let mut bundle = sample_bundle();
        bundle.dsse_envelope = None;
        assert!(matches!(extract_statement(&bundle), Err(Error::Format(_))));
    }
}
