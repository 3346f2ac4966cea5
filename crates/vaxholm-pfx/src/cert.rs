#![forbid(unsafe_code)]

//! Minimal X.509 helpers. The envelope treats certificates as opaque
//! beyond DER parse/marshal, the SubjectPublicKeyInfo (for local key
//! ids and public-key comparison) and the subject commonName (for
//! trust-store friendly names).

use der::asn1::{Ia5StringRef, PrintableStringRef, Utf8StringRef};
use der::{Decode, Encode};
use vaxholm_core::{Error, Result};
use x509_cert::Certificate;

const AT_COMMON_NAME: der::asn1::ObjectIdentifier =
    der::asn1::ObjectIdentifier::new_unwrap("2.5.4.3");

pub fn parse_certificate(der: &[u8]) -> Result<Certificate> {
    Certificate::from_der(der).map_err(|e| Error::Malformed(format!("X.509 certificate: {e}")))
}

pub fn certificate_der(cert: &Certificate) -> Result<Vec<u8>> {
    cert.to_der()
        .map_err(|e| Error::Crypto(format!("X.509 encoding: {e}")))
}

pub fn subject_public_key_info_der(cert: &Certificate) -> Result<Vec<u8>> {
    cert.tbs_certificate
        .subject_public_key_info
        .to_der()
        .map_err(|e| Error::Crypto(format!("SubjectPublicKeyInfo encoding: {e}")))
}

/// The subject commonName, when present and string-typed.
pub fn subject_common_name(cert: &Certificate) -> Option<String> {
    for rdn in cert.tbs_certificate.subject.0.iter() {
        for atv in rdn.0.iter() {
            if atv.oid != AT_COMMON_NAME {
                continue;
            }
            if let Ok(s) = atv.value.decode_as::<Utf8StringRef>() {
                return Some(s.as_str().to_owned());
            }
            if let Ok(s) = atv.value.decode_as::<PrintableStringRef>() {
                return Some(s.as_str().to_owned());
            }
            if let Ok(s) = atv.value.decode_as::<Ia5StringRef>() {
                return Some(s.as_str().to_owned());
            }
        }
    }
    None
}
