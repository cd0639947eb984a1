//! RFC 3161 timestamp requests and tokens
//!
//! Tokens are CMS SignedData over a TSTInfo. Only ECDSA signers are
//! supported, which covers the public timestamp authorities.

use cms::content_info::ContentInfo;
use cms::signed_data::{SignedData, SignerInfo};
use const_oid::db::rfc5912::{
    ECDSA_WITH_SHA_256, ECDSA_WITH_SHA_384, ID_EC_PUBLIC_KEY, ID_SHA_256, ID_SHA_384,
};
use const_oid::ObjectIdentifier;
use der::asn1::{Any, Int, OctetString};
use der::{Decode, Encode};
use p256::elliptic_curve::rand_core::{OsRng, RngCore};
use sha2::{Digest, Sha256, Sha384};
use spki::AlgorithmIdentifierOwned;
use x509_cert::Certificate;
use x509_tsp::{MessageImprint, TimeStampReq, TspVersion, TstInfo};

use crate::error::{Error, Result};
use crate::signing::{curve_oid, verify_signature, SigningScheme};

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");
const ID_CONTENT_TYPE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.3");
const ID_MESSAGE_DIGEST: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.4");

/// id-ct-TSTInfo
pub const ID_CT_TST_INFO: ObjectIdentifier =
    ObjectIdentifier::new_unwrap("1.2.840.113549.1.9.16.1.4");

/// A DER `TimeStampReq` and the nonce it carries.
#[derive(Debug, Clone)]
pub struct TimestampRequest {
    pub der: Vec<u8>,
    pub nonce: Vec<u8>,
}

impl TimestampRequest {
    /// Request a timestamp over the SHA-256 of `data`, asking for the TSA
    /// certificate to be included.
    pub fn sha256(data: &[u8]) -> Result<Self> {
        let mut nonce = [0u8; 8];
        OsRng.fill_bytes(&mut nonce);
        // positive, minimally encoded INTEGER
        nonce[0] = (nonce[0] & 0x7f) | 0x01;

        let request = TimeStampReq {
            version: TspVersion::V1,
            message_imprint: MessageImprint {
                hash_algorithm: AlgorithmIdentifierOwned {
                    oid: ID_SHA_256,
                    parameters: None,
                },
                hashed_message: OctetString::new(Sha256::digest(data).to_vec())?,
            },
            req_policy: None,
            nonce: Some(Int::new(&nonce)?),
            cert_req: true,
            extensions: None,
        };
        Ok(Self {
            der: request.to_der()?,
            nonce: nonce.to_vec(),
        })
    }
}

/// Extract the DER `TimeStampToken` from a DER `TimeStampResp`.
///
/// Statuses other than granted (0) and grantedWithMods (1) are errors.
pub fn parse_timestamp_response(der: &[u8]) -> Result<Vec<u8>> {
    let parts: Vec<Any> = Vec::from_der(der)?;
    let status_info: Vec<Any> = parts
        .first()
        .ok_or_else(|| Error::Timestamp("response has no status".to_string()))?
        .decode_as()?;
    let status: u8 = status_info
        .first()
        .ok_or_else(|| Error::Timestamp("status info is empty".to_string()))?
        .decode_as()?;
    if status > 1 {
        return Err(Error::Timestamp(format!(
            "request was not granted (status {status})"
        )));
    }

    let token = parts
        .get(1)
        .ok_or_else(|| Error::Timestamp("granted response carries no token".to_string()))?;
    Ok(token.to_der()?)
}

/// The fields of a token's TSTInfo that callers check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimestampInfo {
    /// Unix seconds
    pub gen_time: i64,
    pub hash_algorithm: ObjectIdentifier,
    pub hashed_message: Vec<u8>,
    pub nonce: Option<Vec<u8>>,
}

impl TimestampInfo {
    /// Check that the token covers `data`.
    pub fn check_imprint(&self, data: &[u8]) -> Result<()> {
        let expected = digest_for(self.hash_algorithm, data)?;
        if expected != self.hashed_message {
            return Err(Error::Timestamp(
                "message imprint does not match the timestamped data".to_string(),
            ));
        }
        Ok(())
    }
}

struct ParsedToken {
    signed_data: SignedData,
    tst_info_der: Vec<u8>,
    info: TimestampInfo,
}

fn parse_token(token_der: &[u8]) -> Result<ParsedToken> {
    let content_info = ContentInfo::from_der(token_der)?;
    if content_info.content_type != ID_SIGNED_DATA {
        return Err(Error::Timestamp(format!(
            "token content type is {}, expected SignedData",
            content_info.content_type
        )));
    }
    let signed_data: SignedData = content_info.content.decode_as()?;

    let encap = &signed_data.encap_content_info;
    if encap.econtent_type != ID_CT_TST_INFO {
        return Err(Error::Timestamp(format!(
            "encapsulated content is {}, expected TSTInfo",
            encap.econtent_type
        )));
    }
    let econtent = encap
        .econtent
        .as_ref()
        .ok_or_else(|| Error::Timestamp("token has no TSTInfo".to_string()))?;
    let tst_info_der = econtent.value().to_vec();
    let tst_info = TstInfo::from_der(&tst_info_der)?;

    let info = TimestampInfo {
        gen_time: tst_info.gen_time.to_unix_duration().as_secs() as i64,
        hash_algorithm: tst_info.message_imprint.hash_algorithm.oid,
        hashed_message: tst_info.message_imprint.hashed_message.as_bytes().to_vec(),
        nonce: tst_info.nonce.as_ref().map(|n| n.as_bytes().to_vec()),
    };
    Ok(ParsedToken {
        signed_data,
        tst_info_der,
        info,
    })
}

/// Parse a token without checking its signature.
pub fn parse_timestamp_token(token_der: &[u8]) -> Result<TimestampInfo> {
    parse_token(token_der).map(|parsed| parsed.info)
}

/// Verify the CMS signature of a token with the TSA certificate
/// `signer_cert_der` and return its TSTInfo.
pub fn verify_timestamp_token(token_der: &[u8], signer_cert_der: &[u8]) -> Result<TimestampInfo> {
    let parsed = parse_token(token_der)?;
    let signer_info = parsed
        .signed_data
        .signer_infos
        .0
        .iter()
        .next()
        .ok_or_else(|| Error::Timestamp("token has no signer".to_string()))?;

    let signer_cert = Certificate::from_der(signer_cert_der)
        .map_err(|e| Error::Certificate(format!("failed to parse TSA certificate: {e}")))?;
    let spki = signer_cert.tbs_certificate.subject_public_key_info.to_der()?;

    let signed_bytes = signed_content(signer_info, &parsed.tst_info_der)?;
    let scheme = SigningScheme::from_oids(
        curve_oid(&spki)?,
        signature_algorithm(signer_info)?,
    )?;
    verify_signature(&spki, &signed_bytes, signer_info.signature.as_bytes(), scheme)
        .map_err(|_| Error::Timestamp("token signature does not verify".to_string()))?;
    Ok(parsed.info)
}

/// The bytes covered by the signer's signature.
fn signed_content(signer_info: &SignerInfo, tst_info_der: &[u8]) -> Result<Vec<u8>> {
    let Some(attrs) = &signer_info.signed_attrs else {
        return Ok(tst_info_der.to_vec());
    };

    let content_type = attrs
        .iter()
        .find(|attr| attr.oid == ID_CONTENT_TYPE)
        .and_then(|attr| attr.values.iter().next())
        .map(|value| value.decode_as::<ObjectIdentifier>())
        .transpose()?;
    if content_type.is_some_and(|oid| oid != ID_CT_TST_INFO) {
        return Err(Error::Timestamp(
            "signed content-type attribute is not TSTInfo".to_string(),
        ));
    }

    let message_digest = attrs
        .iter()
        .find(|attr| attr.oid == ID_MESSAGE_DIGEST)
        .and_then(|attr| attr.values.iter().next())
        .ok_or_else(|| Error::Timestamp("signed attributes lack a message digest".to_string()))?
        .decode_as::<OctetString>()?;
    let expected = digest_for(signer_info.digest_alg.oid, tst_info_der)?;
    if message_digest.as_bytes() != expected.as_slice() {
        return Err(Error::Timestamp(
            "message digest attribute does not match TSTInfo".to_string(),
        ));
    }

    // Signed attributes are signed as an explicit SET OF, not the [0] form.
    Ok(attrs.to_der()?)
}

fn signature_algorithm(signer_info: &SignerInfo) -> Result<ObjectIdentifier> {
    let oid = signer_info.signature_algorithm.oid;
    if oid != ID_EC_PUBLIC_KEY {
        return Ok(oid);
    }
    match signer_info.digest_alg.oid {
        d if d == ID_SHA_256 => Ok(ECDSA_WITH_SHA_256),
        d if d == ID_SHA_384 => Ok(ECDSA_WITH_SHA_384),
        other => Err(Error::UnsupportedAlgorithm(format!("digest {other}"))),
    }
}

fn digest_for(algorithm: ObjectIdentifier, data: &[u8]) -> Result<Vec<u8>> {
    if algorithm == ID_SHA_256 {
        Ok(Sha256::digest(data).to_vec())
    } else if algorithm == ID_SHA_384 {
        Ok(Sha384::digest(data).to_vec())
    } else {
        Err(Error::UnsupportedAlgorithm(format!("digest {algorithm}")))
    }
}
