#![forbid(unsafe_code)]

//! Outer-envelope integrity: the legacy PFX MAC (HMAC keyed via the
//! PKCS#12 KDF, purpose byte 3) and PBMAC1 (HMAC keyed via PBKDF2).
//!
//! Verification is constant-time and any mismatch is reported as an
//! incorrect password, so the MAC cannot be used as an oracle.

use hmac::{Hmac, Mac};
use subtle::ConstantTimeEq;
use vaxholm_core::oid::{self, oid};
use vaxholm_core::{Error, Result};
use yasna::{BERReader, DERWriter};

use crate::algid::{Pbkdf2Params, Pbmac1Params, Prf, RawAlgId};
use crate::kdf;
use crate::password::Password;
use crate::suites;

/// MacData ::= SEQUENCE { mac DigestInfo, macSalt OCTET STRING,
/// iterations INTEGER DEFAULT 1 }. The algorithm is kept raw until
/// compute/verify time so unknown OIDs surface as `NotImplemented`.
#[derive(Debug, Clone)]
pub struct MacData {
    pub algorithm: RawAlgId,
    pub digest: Vec<u8>,
    pub salt: Vec<u8>,
    pub iterations: u32,
}

impl MacData {
    pub fn parse(r: BERReader) -> std::result::Result<Self, yasna::ASN1Error> {
        r.read_sequence(|r| {
            let (algorithm, digest) = r.next().read_sequence(|r| {
                let algorithm = RawAlgId::parse(r.next())?;
                let digest = r.next().read_bytes()?;
                Ok((algorithm, digest))
            })?;
            let salt = r.next().read_bytes()?;
            // Some encoders omit the iteration count entirely.
            let iterations = r.read_optional(|r| r.read_u32())?.unwrap_or(1);
            Ok(MacData {
                algorithm,
                digest,
                salt,
                iterations,
            })
        })
    }

    /// The iteration count is always written explicitly, even when it
    /// is the DEFAULT value 1.
    pub fn write(&self, w: DERWriter) {
        w.write_sequence(|w| {
            w.next().write_sequence(|w| {
                self.algorithm.write(w.next());
                w.next().write_bytes(&self.digest);
            });
            w.next().write_bytes(&self.salt);
            w.next().write_u32(self.iterations);
        })
    }
}

/// The MAC constructions a MacData can name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacAlgorithm {
    HmacSha1,
    HmacSha256,
    HmacSm3,
    Pbmac1(Pbmac1Params),
}

impl MacAlgorithm {
    pub fn digest_len(&self) -> usize {
        match self {
            MacAlgorithm::HmacSha1 => 20,
            MacAlgorithm::HmacSha256 | MacAlgorithm::HmacSm3 => 32,
            MacAlgorithm::Pbmac1(params) => params.scheme.output_len(),
        }
    }

    pub fn from_raw(raw: &RawAlgId) -> Result<Self> {
        if raw.oid == oid(oid::SHA1) {
            Ok(MacAlgorithm::HmacSha1)
        } else if raw.oid == oid(oid::SHA256) {
            Ok(MacAlgorithm::HmacSha256)
        } else if raw.oid == oid(oid::SM3) {
            Ok(MacAlgorithm::HmacSm3)
        } else if raw.oid == oid(oid::PBMAC1) {
            Ok(MacAlgorithm::Pbmac1(Pbmac1Params::parse_der(raw.params()?)?))
        } else {
            Err(Error::NotImplemented(format!("MAC algorithm {}", raw.oid)))
        }
    }

    pub fn to_raw(&self) -> RawAlgId {
        match self {
            MacAlgorithm::HmacSha1 => digest_alg_id(oid::SHA1),
            MacAlgorithm::HmacSha256 => digest_alg_id(oid::SHA256),
            MacAlgorithm::HmacSm3 => digest_alg_id(oid::SM3),
            MacAlgorithm::Pbmac1(params) => RawAlgId {
                oid: oid(oid::PBMAC1),
                params: Some(params.to_der()),
            },
        }
    }

    /// Build a PBMAC1 descriptor. The PBKDF2 key length is always
    /// written explicitly, matching the message-auth scheme's output.
    pub fn pbmac1(prf: Prf, scheme: Prf, salt: Vec<u8>, iterations: u32) -> Self {
        MacAlgorithm::Pbmac1(Pbmac1Params {
            kdf: Pbkdf2Params {
                salt,
                iterations,
                key_length: Some(scheme.output_len() as u32),
                prf,
            },
            scheme,
        })
    }
}

fn digest_alg_id(components: &[u64]) -> RawAlgId {
    RawAlgId {
        oid: oid(components),
        params: Some(yasna::construct_der(|w| w.write_null())),
    }
}

/// Compute the MAC over `message` (the DER octets of the authenticated
/// content, not the whole PFX).
pub fn compute_mac(mac: &MacData, message: &[u8], password: &Password) -> Result<Vec<u8>> {
    if mac.iterations == 0 {
        return Err(Error::Malformed("MAC iteration count is zero".into()));
    }
    match MacAlgorithm::from_raw(&mac.algorithm)? {
        MacAlgorithm::HmacSha1 => {
            let key = kdf::derive_sha1(kdf::ID_MAC, password.bmp(), &mac.salt, mac.iterations, 20);
            Ok(tag_sha1(&key, message))
        }
        MacAlgorithm::HmacSha256 => {
            let key =
                kdf::derive_sha256(kdf::ID_MAC, password.bmp(), &mac.salt, mac.iterations, 32);
            Ok(tag_sha256(&key, message))
        }
        MacAlgorithm::HmacSm3 => {
            let key = kdf::derive_sm3(kdf::ID_MAC, password.bmp(), &mac.salt, mac.iterations, 32);
            Ok(tag_sm3(&key, message))
        }
        MacAlgorithm::Pbmac1(params) => {
            let key_len = params
                .kdf
                .key_length
                .map(|n| n as usize)
                .unwrap_or_else(|| params.scheme.output_len());
            let key = suites::pbkdf2_key(
                params.kdf.prf,
                password.utf8(),
                &params.kdf.salt,
                params.kdf.iterations,
                key_len,
            );
            Ok(match params.scheme {
                Prf::HmacSha1 => tag_sha1(&key, message),
                Prf::HmacSha256 => tag_sha256(&key, message),
                Prf::HmacSm3 => tag_sm3(&key, message),
            })
        }
    }
}

/// Verify the MAC in constant time. A mismatch maps to
/// `IncorrectPassword`.
pub fn verify_mac(mac: &MacData, message: &[u8], password: &Password) -> Result<()> {
    let algorithm = MacAlgorithm::from_raw(&mac.algorithm)?;
    if mac.digest.len() != algorithm.digest_len() {
        return Err(Error::Malformed(format!(
            "MAC digest is {} bytes, algorithm produces {}",
            mac.digest.len(),
            algorithm.digest_len()
        )));
    }
    let expected = compute_mac(mac, message, password)?;
    if bool::from(expected.ct_eq(&mac.digest)) {
        Ok(())
    } else {
        Err(Error::IncorrectPassword)
    }
}

fn tag_sha1(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<sha1::Sha1>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn tag_sha256(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<sha2::Sha256>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

fn tag_sm3(key: &[u8], message: &[u8]) -> Vec<u8> {
    let mut mac = Hmac::<sm3::Sm3>::new_from_slice(key).expect("HMAC accepts any key size");
    mac.update(message);
    mac.finalize().into_bytes().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mac_data(algorithm: MacAlgorithm, salt: &[u8], iterations: u32) -> MacData {
        MacData {
            algorithm: algorithm.to_raw(),
            digest: Vec::new(),
            salt: salt.to_vec(),
            iterations,
        }
    }

    #[test]
    fn legacy_mac_verifies_with_right_password_only() {
        let password = Password::new("sekrit");
        let message = b"authenticated content";
        for algorithm in [
            MacAlgorithm::HmacSha1,
            MacAlgorithm::HmacSha256,
            MacAlgorithm::HmacSm3,
        ] {
            let mut mac = mac_data(algorithm, b"macsalt!", 2048);
            mac.digest = compute_mac(&mac, message, &password).unwrap();
            verify_mac(&mac, message, &password).unwrap();
            assert!(matches!(
                verify_mac(&mac, message, &Password::new("wrong")),
                Err(Error::IncorrectPassword)
            ));
            assert!(matches!(
                verify_mac(&mac, b"tampered content", &password),
                Err(Error::IncorrectPassword)
            ));
        }
    }

    #[test]
    fn pbmac1_same_parameters_same_tag() {
        let password = Password::new("pw");
        let algorithm =
            MacAlgorithm::pbmac1(Prf::HmacSha256, Prf::HmacSha256, vec![1; 16], 1000);
        let mac = mac_data(algorithm, &[], 1);
        let a = compute_mac(&mac, b"msg", &password).unwrap();
        let b = compute_mac(&mac, b"msg", &password).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 32);
    }

    #[test]
    fn pbmac1_distinct_prf_or_key_length_distinct_tags() {
        let password = Password::new("pw");
        let message = b"msg";
        let base = MacAlgorithm::pbmac1(Prf::HmacSha256, Prf::HmacSha256, vec![1; 16], 1000);
        let base_tag =
            compute_mac(&mac_data(base, &[], 1), message, &password).unwrap();

        let other_prf = MacAlgorithm::pbmac1(Prf::HmacSm3, Prf::HmacSha256, vec![1; 16], 1000);
        let other_prf_tag =
            compute_mac(&mac_data(other_prf, &[], 1), message, &password).unwrap();
        assert_ne!(base_tag, other_prf_tag);

        let mut short_key = Pbmac1Params {
            kdf: Pbkdf2Params {
                salt: vec![1; 16],
                iterations: 1000,
                key_length: Some(16),
                prf: Prf::HmacSha256,
            },
            scheme: Prf::HmacSha256,
        };
        let short_key_tag = compute_mac(
            &mac_data(MacAlgorithm::Pbmac1(short_key.clone()), &[], 1),
            message,
            &password,
        )
        .unwrap();
        assert_ne!(base_tag, short_key_tag);

        // Absent key length defaults to the scheme output length.
        short_key.kdf.key_length = None;
        let default_key_tag = compute_mac(
            &mac_data(MacAlgorithm::Pbmac1(short_key), &[], 1),
            message,
            &password,
        )
        .unwrap();
        assert_eq!(base_tag, default_key_tag);
    }

    #[test]
    fn mac_data_roundtrips_through_der() {
        let password = Password::new("roundtrip");
        let mut mac = mac_data(MacAlgorithm::HmacSha256, b"saltsalt", 1);
        mac.digest = compute_mac(&mac, b"payload", &password).unwrap();
        let der = yasna::construct_der(|w| mac.write(w));
        let parsed = yasna::parse_der(&der, MacData::parse).unwrap();
        assert_eq!(parsed.digest, mac.digest);
        assert_eq!(parsed.salt, mac.salt);
        assert_eq!(parsed.iterations, 1);
        verify_mac(&parsed, b"payload", &password).unwrap();
    }

    #[test]
    fn digest_length_mismatch_is_malformed() {
        let mut mac = mac_data(MacAlgorithm::HmacSha256, b"salt", 1);
        mac.digest = vec![0; 20];
        assert!(matches!(
            verify_mac(&mac, b"m", &Password::new("")),
            Err(Error::Malformed(_))
        ));
    }
}
