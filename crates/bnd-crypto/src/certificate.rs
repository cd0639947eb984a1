//! X.509 certificate inspection
//!
//! Short-lived signing certificates carry the signer identity in the
//! subjectAltName and the OIDC issuer in a private extension.

use const_oid::db::rfc5280::{ID_CE_EXT_KEY_USAGE, ID_CE_KEY_USAGE, ID_CE_SUBJECT_ALT_NAME};
use const_oid::db::rfc5912::ID_KP_CODE_SIGNING;
use const_oid::ObjectIdentifier;
use der::{Decode, Encode, Reader, SliceReader};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{ExtendedKeyUsage, KeyUsage, KeyUsages, SubjectAltName};
use x509_cert::Certificate;

use crate::error::{Error, Result};
use crate::signing::{curve_oid, verify_signature, SigningScheme};

/// OIDC issuer extension, DER UTF8String value.
pub const OIDC_ISSUER_V2_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.8");

/// Legacy OIDC issuer extension, raw string value.
pub const OIDC_ISSUER_V1_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.1.1");

/// Embedded SCT list extension (RFC 6962).
pub const SCT_LIST_OID: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.3.6.1.4.1.11129.2.4.2");

/// Fields of a certificate needed by verification
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    /// Start of validity, Unix seconds
    pub not_before: i64,
    /// End of validity, Unix seconds
    pub not_after: i64,
    pub subject: String,
    pub issuer: String,
    /// First email or URI subjectAltName
    pub san: Option<String>,
    /// OIDC issuer from the Fulcio extensions
    pub oidc_issuer: Option<String>,
    /// DER SubjectPublicKeyInfo
    pub public_key: Vec<u8>,
}

/// Parse the parts of a DER certificate that verification looks at.
pub fn parse_certificate_info(cert_der: &[u8]) -> Result<CertificateInfo> {
    let cert = Certificate::from_der(cert_der)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
    let tbs = &cert.tbs_certificate;

    let not_before = tbs.validity.not_before.to_unix_duration().as_secs() as i64;
    let not_after = tbs.validity.not_after.to_unix_duration().as_secs() as i64;

    let mut san = None;
    let mut oidc_issuer = None;
    let mut legacy_issuer = None;
    for ext in tbs.extensions.iter().flatten() {
        if ext.extn_id == ID_CE_SUBJECT_ALT_NAME {
            let names = SubjectAltName::from_der(ext.extn_value.as_bytes())?;
            san = names.0.iter().find_map(|name| match name {
                GeneralName::Rfc822Name(email) => Some(email.to_string()),
                GeneralName::UniformResourceIdentifier(uri) => Some(uri.to_string()),
                _ => None,
            });
        } else if ext.extn_id == OIDC_ISSUER_V2_OID {
            oidc_issuer = Some(String::from_der(ext.extn_value.as_bytes())?);
        } else if ext.extn_id == OIDC_ISSUER_V1_OID {
            legacy_issuer = String::from_utf8(ext.extn_value.as_bytes().to_vec()).ok();
        }
    }

    Ok(CertificateInfo {
        not_before,
        not_after,
        subject: tbs.subject.to_string(),
        issuer: tbs.issuer.to_string(),
        san,
        oidc_issuer: oidc_issuer.or(legacy_issuer),
        public_key: tbs.subject_public_key_info.to_der()?,
    })
}

/// Check that `cert_der` was signed by the key of `issuer_der` and that the
/// issuer/subject names line up.
pub fn verify_issued_by(cert_der: &[u8], issuer_der: &[u8]) -> Result<()> {
    let cert = Certificate::from_der(cert_der)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
    let issuer = Certificate::from_der(issuer_der)
        .map_err(|e| Error::Certificate(format!("failed to parse issuer: {e}")))?;

    if cert.tbs_certificate.issuer != issuer.tbs_certificate.subject {
        return Err(Error::Certificate(
            "issuer name does not match the candidate's subject".to_string(),
        ));
    }

    let issuer_spki = issuer.tbs_certificate.subject_public_key_info.to_der()?;
    let scheme = SigningScheme::from_oids(curve_oid(&issuer_spki)?, cert.signature_algorithm.oid)?;
    let signature = cert
        .signature
        .as_bytes()
        .ok_or_else(|| Error::Certificate("signature has unused bits".to_string()))?;

    // Signatures cover the TBS bytes as transmitted, never a re-encoding.
    let tbs_der = extract_tbs_der(cert_der)?;
    verify_signature(&issuer_spki, &tbs_der, signature, scheme)
}

/// Check the code signing profile: digitalSignature key usage and the
/// codeSigning extended key usage.
pub fn verify_code_signing_profile(cert_der: &[u8]) -> Result<()> {
    let cert = Certificate::from_der(cert_der)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
    let extensions = cert
        .tbs_certificate
        .extensions
        .as_ref()
        .ok_or_else(|| Error::Certificate("certificate has no extensions".to_string()))?;

    let key_usage = extensions
        .iter()
        .find(|ext| ext.extn_id == ID_CE_KEY_USAGE)
        .ok_or_else(|| Error::Certificate("missing KeyUsage extension".to_string()))?;
    let key_usage = KeyUsage::from_der(key_usage.extn_value.as_bytes())?;
    if !key_usage.0.contains(KeyUsages::DigitalSignature) {
        return Err(Error::Certificate(
            "KeyUsage does not contain digitalSignature".to_string(),
        ));
    }

    let eku = extensions
        .iter()
        .find(|ext| ext.extn_id == ID_CE_EXT_KEY_USAGE)
        .ok_or_else(|| Error::Certificate("missing ExtendedKeyUsage extension".to_string()))?;
    let eku = ExtendedKeyUsage::from_der(eku.extn_value.as_bytes())?;
    if !eku.0.contains(&ID_KP_CODE_SIGNING) {
        return Err(Error::Certificate(
            "ExtendedKeyUsage does not contain codeSigning".to_string(),
        ));
    }
    Ok(())
}

/// Extract the original TBSCertificate bytes, header included.
pub fn extract_tbs_der(cert_der: &[u8]) -> Result<Vec<u8>> {
    let mut reader = SliceReader::new(cert_der)?;
    let outer = der::Header::decode(&mut reader)?;
    let contents = reader.read_slice(outer.length)?;

    let mut tbs_reader = SliceReader::new(contents)?;
    let tbs_header = der::Header::decode(&mut tbs_reader)?;
    let header_len: usize = tbs_header.encoded_len()?.try_into()?;
    let body_len: usize = tbs_header.length.try_into()?;
    let total = header_len
        .checked_add(body_len)
        .ok_or_else(|| Error::Certificate("TBS length overflow".to_string()))?;
    contents
        .get(..total)
        .map(<[u8]>::to_vec)
        .ok_or_else(|| Error::Certificate("TBS length exceeds certificate".to_string()))
}
