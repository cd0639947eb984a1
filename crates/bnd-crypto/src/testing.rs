//! In-process certificate authority for tests
//!
//! Issues short-lived code signing certificates shaped like the ones a
//! keyless CA returns: empty subject, identity in the subjectAltName, OIDC
//! issuer extension, optionally embedded SCTs from a test CT log. Also a
//! timestamp authority that signs RFC 3161 tokens and a transparency log
//! that returns fully proven entries.

use std::str::FromStr;
use std::time::{Duration, SystemTime};

use bnd_types::{
    CanonicalizedBody, Checkpoint, CheckpointEnvelope, CheckpointSignature, DerCertificate,
    HashBytes, InclusionPromise, InclusionProof, KindVersion, LogId, LogKeyId,
    TransparencyLogEntry,
};
use const_oid::db::rfc5912::{ECDSA_WITH_SHA_256, ID_KP_CODE_SIGNING, ID_SHA_256};
use const_oid::{AssociatedOid, ObjectIdentifier};
use der::asn1::{Any, ContextSpecific, GeneralizedTime, Ia5String, Int, OctetString};
use der::{
    Decode, Encode, EncodeValue, FixedTag, Length, Sequence, Tag, TagMode, TagNumber, Writer,
};
use spki::AlgorithmIdentifierOwned;
use x509_tsp::MessageImprint;
use p256::ecdsa::signature::Signer;
use p256::ecdsa::SigningKey;
use x509_cert::builder::{Builder, CertificateBuilder, Profile};
use x509_cert::ext::pkix::name::GeneralName;
use x509_cert::ext::pkix::{ExtendedKeyUsage, SubjectAltName};
use x509_cert::ext::{AsExtension, Extension};
use x509_cert::name::Name;
use x509_cert::serial_number::SerialNumber;
use x509_cert::spki::SubjectPublicKeyInfoOwned;
use x509_cert::time::{Time, Validity};
use x509_cert::Certificate;

use crate::certificate::{OIDC_ISSUER_V2_OID, SCT_LIST_OID};
use crate::error::{Error, Result};
use crate::hash::sha256;
use crate::merkle::leaf_hash;
use crate::sct::{encode_sct_list, SignedCertificateTimestamp};
use crate::timestamp::ID_CT_TST_INFO;
use crate::KeyPair;

struct OidcIssuer(String);

impl AssociatedOid for OidcIssuer {
    const OID: ObjectIdentifier = OIDC_ISSUER_V2_OID;
}

impl FixedTag for OidcIssuer {
    const TAG: Tag = Tag::Utf8String;
}

impl EncodeValue for OidcIssuer {
    fn value_len(&self) -> der::Result<Length> {
        Length::try_from(self.0.len())
    }

    fn encode_value(&self, writer: &mut impl Writer) -> der::Result<()> {
        writer.write(self.0.as_bytes())
    }
}

impl AsExtension for OidcIssuer {
    fn critical(&self, _subject: &Name, _extensions: &[Extension]) -> bool {
        false
    }
}

fn time_offset(secs: i64) -> Result<Time> {
    let now = SystemTime::now();
    let t = if secs >= 0 {
        now + Duration::from_secs(secs as u64)
    } else {
        now - Duration::from_secs(secs.unsigned_abs())
    };
    Time::try_from(t).map_err(Error::Der)
}

fn cert_error(e: impl std::fmt::Display) -> Error {
    Error::Certificate(e.to_string())
}

/// A CT log that signs precertificate entries
pub struct TestCtLog {
    pub key: KeyPair,
}

impl TestCtLog {
    pub fn new() -> Result<Self> {
        Ok(Self {
            key: KeyPair::generate_ecdsa_p256()?,
        })
    }

    /// SHA-256 of the log's SPKI, its CT log id.
    pub fn log_id(&self) -> Result<[u8; 32]> {
        Ok(sha256(self.key.public_key_der()?.as_bytes()))
    }
}

/// A self-signed root that issues leaf certificates directly
pub struct TestCa {
    key: SigningKey,
    name: Name,
    root: DerCertificate,
    ct_log: Option<TestCtLog>,
}

impl TestCa {
    /// Create a root with a ten year validity.
    pub fn new(common_name: &str) -> Result<Self> {
        let key = SigningKey::random(&mut p256::elliptic_curve::rand_core::OsRng);
        let name = Name::from_str(&format!("CN={common_name},O=bnd test")).map_err(cert_error)?;
        let spki_der = KeyPair::from_signing_key(key.clone()).public_key_der()?;
        let spki = SubjectPublicKeyInfoOwned::from_der(spki_der.as_bytes())?;
        let validity = Validity {
            not_before: time_offset(-3600)?,
            not_after: time_offset(10 * 365 * 24 * 3600)?,
        };
        let builder = CertificateBuilder::new(
            Profile::Root,
            SerialNumber::from(1u32),
            validity,
            name.clone(),
            spki,
            &key,
        )
        .map_err(cert_error)?;
        let cert = builder
            .build::<p256::ecdsa::DerSignature>()
            .map_err(cert_error)?;
        Ok(Self {
            key,
            name,
            root: DerCertificate::new(cert.to_der()?),
            ct_log: None,
        })
    }

    /// Embed an SCT from `log` in every leaf issued from now on.
    pub fn with_ct_log(mut self, log: TestCtLog) -> Self {
        self.ct_log = Some(log);
        self
    }

    pub fn ct_log(&self) -> Option<&TestCtLog> {
        self.ct_log.as_ref()
    }

    pub fn root_der(&self) -> &DerCertificate {
        &self.root
    }

    /// Issue a ten minute code signing certificate for `public_key_der`.
    pub fn issue_leaf(&self, public_key_der: &[u8], san: &str, issuer: &str) -> Result<DerCertificate> {
        let spki = SubjectPublicKeyInfoOwned::from_der(public_key_der)?;
        let validity = Validity {
            not_before: time_offset(-60)?,
            not_after: time_offset(600)?,
        };
        let serial = SerialNumber::new(&rand_serial()).map_err(cert_error)?;
        let profile = Profile::Leaf {
            issuer: self.name.clone(),
            enable_key_agreement: false,
            enable_key_encipherment: false,
        };
        let mut builder =
            CertificateBuilder::new(profile, serial, validity, Name::default(), spki, &self.key)
                .map_err(cert_error)?;

        let general_name = if san.contains("://") {
            GeneralName::UniformResourceIdentifier(Ia5String::new(san).map_err(cert_error)?)
        } else {
            GeneralName::Rfc822Name(Ia5String::new(san).map_err(cert_error)?)
        };
        builder
            .add_extension(&SubjectAltName(vec![general_name]))
            .map_err(cert_error)?;
        builder
            .add_extension(&ExtendedKeyUsage(vec![ID_KP_CODE_SIGNING]))
            .map_err(cert_error)?;
        builder
            .add_extension(&OidcIssuer(issuer.to_string()))
            .map_err(cert_error)?;

        let cert = builder
            .build::<p256::ecdsa::DerSignature>()
            .map_err(cert_error)?;

        match &self.ct_log {
            Some(log) => self.embed_sct(cert, log),
            None => Ok(DerCertificate::new(cert.to_der()?)),
        }
    }

    /// Append an SCT over the precertificate and re-sign the TBS.
    fn embed_sct(&self, mut cert: Certificate, log: &TestCtLog) -> Result<DerCertificate> {
        let precert_tbs = cert.tbs_certificate.to_der()?;
        let root = Certificate::from_der(self.root.as_bytes())?;
        let issuer_key_hash = sha256(&root.tbs_certificate.subject_public_key_info.to_der()?);

        let timestamp = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(cert_error)?
            .as_millis() as u64;
        let signed = SignedCertificateTimestamp::precert_signed_data(
            timestamp,
            &[],
            &issuer_key_hash,
            &precert_tbs,
        );
        let sct = SignedCertificateTimestamp::new(
            log.log_id()?,
            timestamp,
            log.key.sign(&signed)?.into_bytes(),
        );

        let extn_value = OctetString::new(encode_sct_list(&[sct])?)?;
        cert.tbs_certificate
            .extensions
            .get_or_insert_with(Vec::new)
            .push(Extension {
                extn_id: SCT_LIST_OID,
                critical: false,
                extn_value,
            });

        let tbs_der = cert.tbs_certificate.to_der()?;
        let signature: p256::ecdsa::DerSignature = self.key.sign(&tbs_der);
        cert.signature = der::asn1::BitString::from_bytes(signature.as_bytes())?;
        Ok(DerCertificate::new(cert.to_der()?))
    }
}

const ID_SIGNED_DATA: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.7.2");

#[derive(Sequence)]
struct TstInfoDer {
    version: u8,
    policy: ObjectIdentifier,
    message_imprint: MessageImprint,
    serial_number: Int,
    gen_time: GeneralizedTime,
    #[asn1(optional = "true")]
    nonce: Option<Int>,
}

#[derive(Sequence)]
struct IssuerAndSerialDer {
    issuer: Name,
    serial_number: SerialNumber,
}

#[derive(Sequence)]
struct SignerInfoDer {
    version: u8,
    sid: IssuerAndSerialDer,
    digest_alg: AlgorithmIdentifierOwned,
    signature_algorithm: AlgorithmIdentifierOwned,
    signature: OctetString,
}

#[derive(Sequence)]
struct EncapsulatedDer {
    econtent_type: ObjectIdentifier,
    econtent: ContextSpecific<OctetString>,
}

#[derive(Sequence)]
struct SignedDataDer {
    version: u8,
    digest_algorithms: Any,
    encap_content_info: EncapsulatedDer,
    signer_infos: Any,
}

#[derive(Sequence)]
struct ContentInfoDer {
    content_type: ObjectIdentifier,
    content: ContextSpecific<Any>,
}

#[derive(Sequence)]
struct StatusDer {
    status: u8,
}

#[derive(Sequence)]
struct TimeStampRespDer {
    status: StatusDer,
    token: Any,
}

fn sha256_algorithm() -> AlgorithmIdentifierOwned {
    AlgorithmIdentifierOwned {
        oid: ID_SHA_256,
        parameters: None,
    }
}

/// A timestamp authority whose signing certificate chains to its own root
pub struct TestTsa {
    key: KeyPair,
    ca: TestCa,
    leaf: DerCertificate,
}

impl TestTsa {
    pub fn new() -> Result<Self> {
        let ca = TestCa::new("Test TSA")?;
        let key = KeyPair::generate_ecdsa_p256()?;
        let leaf = ca.issue_leaf(
            key.public_key_der()?.as_bytes(),
            "tsa@example.com",
            "https://tsa.invalid",
        )?;
        Ok(Self { key, ca, leaf })
    }

    pub fn leaf_der(&self) -> &DerCertificate {
        &self.leaf
    }

    pub fn root_der(&self) -> &DerCertificate {
        self.ca.root_der()
    }

    /// Timestamp the SHA-256 of `data` at the current time.
    pub fn timestamp(&self, data: &[u8]) -> Result<Vec<u8>> {
        let now = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map_err(cert_error)?;
        self.timestamp_at(data, now.as_secs())
    }

    /// Timestamp the SHA-256 of `data` at `unix_secs`. Returns the DER token.
    pub fn timestamp_at(&self, data: &[u8], unix_secs: u64) -> Result<Vec<u8>> {
        let tst_info = TstInfoDer {
            version: 1,
            policy: ObjectIdentifier::new_unwrap("1.3.6.1.4.1.57264.2"),
            message_imprint: MessageImprint {
                hash_algorithm: sha256_algorithm(),
                hashed_message: OctetString::new(sha256(data).to_vec())?,
            },
            serial_number: Int::new(&rand_serial())?,
            gen_time: GeneralizedTime::from_unix_duration(Duration::from_secs(unix_secs))?,
            nonce: None,
        }
        .to_der()?;

        let leaf = Certificate::from_der(self.leaf.as_bytes())?;
        let signer_info = SignerInfoDer {
            version: 1,
            sid: IssuerAndSerialDer {
                issuer: leaf.tbs_certificate.issuer.clone(),
                serial_number: leaf.tbs_certificate.serial_number.clone(),
            },
            digest_alg: sha256_algorithm(),
            signature_algorithm: AlgorithmIdentifierOwned {
                oid: ECDSA_WITH_SHA_256,
                parameters: None,
            },
            signature: OctetString::new(self.key.sign(&tst_info)?.into_bytes())?,
        };

        let signed_data = SignedDataDer {
            version: 3,
            digest_algorithms: Any::new(Tag::Set, sha256_algorithm().to_der()?)?,
            encap_content_info: EncapsulatedDer {
                econtent_type: ID_CT_TST_INFO,
                econtent: ContextSpecific {
                    tag_number: TagNumber::N0,
                    tag_mode: TagMode::Explicit,
                    value: OctetString::new(tst_info)?,
                },
            },
            signer_infos: Any::new(Tag::Set, signer_info.to_der()?)?,
        };

        let content_info = ContentInfoDer {
            content_type: ID_SIGNED_DATA,
            content: ContextSpecific {
                tag_number: TagNumber::N0,
                tag_mode: TagMode::Explicit,
                value: Any::encode_from(&signed_data)?,
            },
        };
        Ok(content_info.to_der()?)
    }

    /// Wrap a token in a granted `TimeStampResp`.
    pub fn granted_response(token: &[u8]) -> Result<Vec<u8>> {
        let response = TimeStampRespDer {
            status: StatusDer { status: 0 },
            token: Any::from_der(token)?,
        };
        Ok(response.to_der()?)
    }
}

/// A transparency log that puts every entry in a tree of its own
pub struct TestLog {
    pub key: KeyPair,
    origin: String,
}

impl TestLog {
    pub fn new() -> Result<Self> {
        Ok(Self {
            key: KeyPair::generate_ecdsa_p256()?,
            origin: "log.test.invalid - 1".to_string(),
        })
    }

    /// SHA-256 of the log's SPKI.
    pub fn log_id(&self) -> Result<[u8; 32]> {
        Ok(sha256(self.key.public_key_der()?.as_bytes()))
    }

    /// Record a canonicalized entry body and return the bundle form of the
    /// entry, with an inclusion proof, a signed checkpoint and a SET.
    pub fn entry(
        &self,
        kind: &str,
        version: &str,
        body: &[u8],
        integrated_time: i64,
    ) -> Result<TransparencyLogEntry> {
        let log_id = LogKeyId::new(self.log_id()?.to_vec());
        let body = CanonicalizedBody::from_bytes(body);
        let root = leaf_hash(body.as_bytes());

        let mut checkpoint = Checkpoint {
            origin: self.origin.clone(),
            tree_size: 1,
            root_hash: root.to_vec(),
            other_content: Vec::new(),
            signatures: Vec::new(),
        };
        let mut key_hint = [0u8; 4];
        key_hint.copy_from_slice(&log_id.as_bytes()[..4]);
        checkpoint.signatures.push(CheckpointSignature {
            name: self.origin.clone(),
            key_hint,
            signature: self.key.sign(&checkpoint.signed_data())?.into_bytes(),
        });

        // canonical JSON: keys sorted, no escapes needed for these values
        let set_payload = format!(
            r#"{{"body":"{}","integratedTime":{},"logID":"{}","logIndex":0}}"#,
            body.to_base64(),
            integrated_time,
            log_id.to_hex()
        );

        Ok(TransparencyLogEntry {
            log_index: 0,
            log_id: LogId { key_id: log_id },
            kind_version: KindVersion {
                kind: kind.to_string(),
                version: version.to_string(),
            },
            integrated_time,
            inclusion_promise: Some(InclusionPromise {
                signed_entry_timestamp: self.key.sign(set_payload.as_bytes())?,
            }),
            inclusion_proof: Some(InclusionProof {
                log_index: 0,
                root_hash: HashBytes::from_bytes(&root),
                tree_size: 1,
                hashes: Vec::new(),
                checkpoint: CheckpointEnvelope {
                    envelope: checkpoint.to_text(),
                },
            }),
            canonicalized_body: body,
        })
    }
}

fn rand_serial() -> [u8; 16] {
    use p256::elliptic_curve::rand_core::RngCore;
    let mut serial = [0u8; 16];
    p256::elliptic_curve::rand_core::OsRng.fill_bytes(&mut serial);
    // positive INTEGER
    serial[0] &= 0x7f;
    serial[0] |= 0x01;
    serial
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::certificate::{parse_certificate_info, verify_issued_by};
    use crate::sct::embedded_scts;
    use crate::signing::verify_signature_auto;

    #[test]
    fn test_embedded_sct_verifies() {
        let ca = TestCa::new("Test CA")
            .unwrap()
            .with_ct_log(TestCtLog::new().unwrap());
        let key = KeyPair::generate_ecdsa_p256().unwrap();
        let leaf = ca
            .issue_leaf(key.public_key_der().unwrap().as_bytes(), "bob@example.com", "https://i")
            .unwrap();

        verify_issued_by(leaf.as_bytes(), ca.root_der().as_bytes()).unwrap();
        assert_eq!(
            parse_certificate_info(leaf.as_bytes()).unwrap().san.as_deref(),
            Some("bob@example.com")
        );

        let (scts, tbs) = embedded_scts(leaf.as_bytes()).unwrap();
        assert_eq!(scts.len(), 1);
        let root = Certificate::from_der(ca.root_der().as_bytes()).unwrap();
        let issuer_key_hash =
            sha256(&root.tbs_certificate.subject_public_key_info.to_der().unwrap());
        let log = ca.ct_log().unwrap();
        verify_signature_auto(
            log.key.public_key_der().unwrap().as_bytes(),
            &scts[0].signed_data(&issuer_key_hash, &tbs),
            &scts[0].signature,
        )
        .unwrap();
    }

    #[test]
    fn test_log_entry_is_self_consistent() {
        let log = TestLog::new().unwrap();
        let entry = log.entry("dsse", "0.0.1", b"{\"k\":1}", 1_700_000_000).unwrap();
        let proof = entry.inclusion_proof.as_ref().unwrap();
        let key = log.key.public_key_der().unwrap();

        let leaf = leaf_hash(entry.canonicalized_body.as_bytes());
        crate::merkle::verify_inclusion(0, 1, &leaf, &proof.hashes, proof.root_hash.as_bytes())
            .unwrap();

        let checkpoint = proof.parse_checkpoint().unwrap();
        assert_eq!(checkpoint.root_hash, proof.root_hash.as_bytes());
        let sig = checkpoint.signature_for_key(&log.log_id().unwrap()).unwrap();
        verify_signature_auto(key.as_bytes(), &checkpoint.signed_data(), &sig.signature).unwrap();
    }
}
