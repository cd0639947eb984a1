//! Embedded signed certificate timestamps (RFC 6962 section 3)

use der::asn1::OctetString;
use der::{Decode, Encode};
use x509_cert::Certificate;

use crate::certificate::SCT_LIST_OID;
use crate::error::{Error, Result};

const HASH_SHA256: u8 = 4;
const HASH_SHA384: u8 = 5;
const SIG_ECDSA: u8 = 3;

/// One SCT from a certificate's SCT list extension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignedCertificateTimestamp {
    pub version: u8,
    /// SHA-256 of the CT log's public key
    pub log_id: [u8; 32],
    /// Milliseconds since the epoch
    pub timestamp: u64,
    pub extensions: Vec<u8>,
    pub hash_algorithm: u8,
    pub signature_algorithm: u8,
    pub signature: Vec<u8>,
}

impl SignedCertificateTimestamp {
    /// Build an ECDSA/SHA-256 SCT.
    pub fn new(log_id: [u8; 32], timestamp: u64, signature: Vec<u8>) -> Self {
        Self {
            version: 0,
            log_id,
            timestamp,
            extensions: Vec::new(),
            hash_algorithm: HASH_SHA256,
            signature_algorithm: SIG_ECDSA,
            signature,
        }
    }

    /// The data the log signed for a precertificate entry.
    pub fn precert_signed_data(
        timestamp: u64,
        extensions: &[u8],
        issuer_key_hash: &[u8; 32],
        tbs_without_scts: &[u8],
    ) -> Vec<u8> {
        let mut out = Vec::with_capacity(tbs_without_scts.len() + 64);
        out.push(0); // v1
        out.push(0); // certificate_timestamp
        out.extend_from_slice(&timestamp.to_be_bytes());
        out.extend_from_slice(&1u16.to_be_bytes()); // precert_entry
        out.extend_from_slice(issuer_key_hash);
        let len = tbs_without_scts.len() as u32;
        out.extend_from_slice(&len.to_be_bytes()[1..]);
        out.extend_from_slice(tbs_without_scts);
        out.extend_from_slice(&(extensions.len() as u16).to_be_bytes());
        out.extend_from_slice(extensions);
        out
    }

    /// Signed data for this SCT over the given precertificate.
    pub fn signed_data(&self, issuer_key_hash: &[u8; 32], tbs_without_scts: &[u8]) -> Vec<u8> {
        Self::precert_signed_data(
            self.timestamp,
            &self.extensions,
            issuer_key_hash,
            tbs_without_scts,
        )
    }

    /// True when the signature is ECDSA over a digest this crate supports.
    pub fn is_supported_algorithm(&self) -> bool {
        self.signature_algorithm == SIG_ECDSA
            && matches!(self.hash_algorithm, HASH_SHA256 | HASH_SHA384)
    }

    fn encode(&self) -> Vec<u8> {
        let mut out = vec![self.version];
        out.extend_from_slice(&self.log_id);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&(self.extensions.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.extensions);
        out.push(self.hash_algorithm);
        out.push(self.signature_algorithm);
        out.extend_from_slice(&(self.signature.len() as u16).to_be_bytes());
        out.extend_from_slice(&self.signature);
        out
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        let mut r = Cursor::new(bytes);
        let version = r.u8()?;
        let log_id: [u8; 32] = r
            .take(32)?
            .try_into()
            .map_err(|_| Error::Certificate("short SCT log id".to_string()))?;
        let timestamp = u64::from_be_bytes(
            r.take(8)?
                .try_into()
                .map_err(|_| Error::Certificate("short SCT timestamp".to_string()))?,
        );
        let ext_len = r.u16()? as usize;
        let extensions = r.take(ext_len)?.to_vec();
        let hash_algorithm = r.u8()?;
        let signature_algorithm = r.u8()?;
        let sig_len = r.u16()? as usize;
        let signature = r.take(sig_len)?.to_vec();
        Ok(Self {
            version,
            log_id,
            timestamp,
            extensions,
            hash_algorithm,
            signature_algorithm,
            signature,
        })
    }
}

/// Decode the value of an SCT list extension.
pub fn parse_sct_list(extn_value: &[u8]) -> Result<Vec<SignedCertificateTimestamp>> {
    let octets = OctetString::from_der(extn_value)?;
    let mut r = Cursor::new(octets.as_bytes());
    let total = r.u16()? as usize;
    let mut list = Cursor::new(r.take(total)?);
    let mut out = Vec::new();
    while !list.is_empty() {
        let len = list.u16()? as usize;
        out.push(SignedCertificateTimestamp::decode(list.take(len)?)?);
    }
    Ok(out)
}

/// Encode SCTs as the DER value of an SCT list extension.
pub fn encode_sct_list(scts: &[SignedCertificateTimestamp]) -> Result<Vec<u8>> {
    let mut body = Vec::new();
    for sct in scts {
        let encoded = sct.encode();
        body.extend_from_slice(&(encoded.len() as u16).to_be_bytes());
        body.extend_from_slice(&encoded);
    }
    let mut list = (body.len() as u16).to_be_bytes().to_vec();
    list.extend_from_slice(&body);
    Ok(OctetString::new(list)?.to_der()?)
}

/// SCTs embedded in a certificate, plus the TBS bytes with the SCT
/// extension removed (the precertificate the log signed).
pub fn embedded_scts(cert_der: &[u8]) -> Result<(Vec<SignedCertificateTimestamp>, Vec<u8>)> {
    let mut cert = Certificate::from_der(cert_der)
        .map_err(|e| Error::Certificate(format!("failed to parse certificate: {e}")))?;
    let Some(extensions) = cert.tbs_certificate.extensions.as_mut() else {
        return Ok((Vec::new(), Vec::new()));
    };
    let Some(pos) = extensions.iter().position(|e| e.extn_id == SCT_LIST_OID) else {
        return Ok((Vec::new(), Vec::new()));
    };
    let ext = extensions.remove(pos);
    let scts = parse_sct_list(ext.extn_value.as_bytes())?;
    let tbs = cert.tbs_certificate.to_der()?;
    Ok((scts, tbs))
}

struct Cursor<'a> {
    data: &'a [u8],
}

impl<'a> Cursor<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.data.len() < n {
            return Err(Error::Certificate("truncated SCT list".to_string()));
        }
        let (head, tail) = self.data.split_at(n);
        self.data = tail;
        Ok(head)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sct_list_encoding() {
        let sct = SignedCertificateTimestamp::new([7u8; 32], 1_700_000_000_000, vec![1, 2, 3]);
        let encoded = encode_sct_list(&[sct.clone(), sct.clone()]).unwrap();
        let decoded = parse_sct_list(&encoded).unwrap();
        assert_eq!(decoded, vec![sct.clone(), sct]);
        assert!(decoded[0].is_supported_algorithm());
    }

    #[test]
    fn test_truncated_list() {
        let encoded = OctetString::new(vec![0, 10, 0, 1]).unwrap().to_der().unwrap();
        assert!(parse_sct_list(&encoded).is_err());
    }

    #[test]
    fn test_signed_data_layout() {
        let data = SignedCertificateTimestamp::precert_signed_data(1, &[], &[9u8; 32], b"tbs");
        // version, type, timestamp(8), entry type(2), key hash(32), len(3), tbs, ext len(2)
        assert_eq!(data.len(), 1 + 1 + 8 + 2 + 32 + 3 + 3 + 2);
        assert_eq!(&data[44..47], &[0, 0, 3]);
    }
}
