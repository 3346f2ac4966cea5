#![forbid(unsafe_code)]

//! PKCS#8 PrivateKeyInfo and EncryptedPrivateKeyInfo handling.
//!
//! Plain keys dispatch on the PrivateKeyInfo algorithm (RSA, or
//! id-ecPublicKey with a named curve); encrypted keys are unwrapped
//! with the cipher-suite registry first.

use der::asn1::ObjectIdentifier;
use pkcs8::DecodePrivateKey;
use vaxholm_core::{Error, Result};
use vaxholm_crypto::algid::{self, EncryptionScheme, RawAlgId};
use vaxholm_crypto::{suites, Password};
use zeroize::Zeroizing;

use crate::key::PrivateKey;

const RSA_ENCRYPTION: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.113549.1.1.1");
const EC_PUBLIC_KEY: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.2.1");
const SECP224R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.33");
const PRIME256V1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.840.10045.3.1.7");
const SECP384R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.34");
const SECP521R1: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.3.132.0.35");
const SM2_CURVE: ObjectIdentifier = ObjectIdentifier::new_unwrap("1.2.156.10197.1.301");

/// Decode a plain PKCS#8 PrivateKeyInfo into a typed key.
pub fn parse_private_key(der: &[u8]) -> Result<PrivateKey> {
    let info = pkcs8::PrivateKeyInfo::try_from(der)
        .map_err(|e| Error::Malformed(format!("PKCS#8 PrivateKeyInfo: {e}")))?;

    if info.algorithm.oid == RSA_ENCRYPTION {
        return rsa::RsaPrivateKey::from_pkcs8_der(der)
            .map(PrivateKey::Rsa)
            .map_err(|e| Error::Malformed(format!("RSA private key: {e}")));
    }
    if info.algorithm.oid == EC_PUBLIC_KEY {
        let curve = info
            .algorithm
            .parameters_oid()
            .map_err(|e| Error::Malformed(format!("EC curve parameters: {e}")))?;
        let key = if curve == SECP224R1 {
            p224::SecretKey::from_pkcs8_der(der).map(PrivateKey::P224)
        } else if curve == PRIME256V1 {
            p256::SecretKey::from_pkcs8_der(der).map(PrivateKey::P256)
        } else if curve == SECP384R1 {
            p384::SecretKey::from_pkcs8_der(der).map(PrivateKey::P384)
        } else if curve == SECP521R1 {
            p521::SecretKey::from_pkcs8_der(der).map(PrivateKey::P521)
        } else if curve == SM2_CURVE {
            sm2::SecretKey::from_pkcs8_der(der).map(PrivateKey::Sm2)
        } else {
            return Err(Error::NotImplemented(format!("EC named curve {curve}")));
        };
        return key.map_err(|e| Error::Malformed(format!("EC private key: {e}")));
    }
    Err(Error::NotImplemented(format!(
        "private key algorithm {}",
        info.algorithm.oid
    )))
}

/// Decode a PKCS#8 EncryptedPrivateKeyInfo, decrypting with `password`.
///
/// This is the standalone entry point; a pkcs8ShroudedKeyBag inside a
/// PFX goes through the same path.
pub fn parse_pkcs8_private_key(der: &[u8], password: &str) -> Result<PrivateKey> {
    let password = Password::new(password);
    let plaintext = decrypt_encrypted_private_key_info(der, &password)?;
    parse_private_key(&plaintext)
}

/// Unwrap an EncryptedPrivateKeyInfo ::= SEQUENCE {
/// encryptionAlgorithm AlgorithmIdentifier, encryptedData OCTET STRING }.
pub fn decrypt_encrypted_private_key_info(
    der: &[u8],
    password: &Password,
) -> Result<Zeroizing<Vec<u8>>> {
    let (alg, ciphertext) = algid::parse_full(der, "EncryptedPrivateKeyInfo", |r| {
        r.read_sequence(|r| {
            let alg = RawAlgId::parse(r.next())?;
            let data = r.next().read_bytes()?;
            Ok((alg, data))
        })
    })?;
    suites::decrypt(&alg, password, &ciphertext)
}

/// Build an EncryptedPrivateKeyInfo from a scheme and its ciphertext.
pub fn encrypted_private_key_info(scheme: &EncryptionScheme, ciphertext: &[u8]) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence(|w| {
            scheme.to_raw().write(w.next());
            w.next().write_bytes(ciphertext);
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use vaxholm_crypto::suites::SuiteKind;

    // Encrypted PKCS#8 vectors, one per legacy suite plus PBES2.
    const ENC_KEY_RC2_128: &str = include_str!("../../../test-data/enc-pkcs8-rc2-128.pem");
    const ENC_KEY_3DES: &str = include_str!("../../../test-data/enc-pkcs8-3des.pem");
    const ENC_KEY_RC2_40: &str = include_str!("../../../test-data/enc-pkcs8-rc2-40.pem");
    const ENC_KEY_AES128_SHA1: &str = include_str!("../../../test-data/enc-pkcs8-aes128-sha1.pem");

    fn decode_pem(armored: &str) -> Vec<u8> {
        let block = pem::parse(armored).expect("valid PEM");
        assert_eq!(block.tag(), "ENCRYPTED PRIVATE KEY");
        block.contents().to_vec()
    }

    #[test]
    fn decrypts_pbe_sha1_rc2_128_key() {
        let key = parse_pkcs8_private_key(&decode_pem(ENC_KEY_RC2_128), "12345678").unwrap();
        assert!(!key.public_key_der().unwrap().is_empty());
    }

    #[test]
    fn decrypts_pbe_sha1_3des_key() {
        let key = parse_pkcs8_private_key(&decode_pem(ENC_KEY_3DES), "12345678").unwrap();
        assert!(!key.public_key_der().unwrap().is_empty());
    }

    #[test]
    fn decrypts_pbe_sha1_rc2_40_key() {
        let key = parse_pkcs8_private_key(&decode_pem(ENC_KEY_RC2_40), "12345678").unwrap();
        assert!(!key.public_key_der().unwrap().is_empty());
    }

    #[test]
    fn decrypts_pbes2_aes128_sha1_key() {
        let key = parse_pkcs8_private_key(&decode_pem(ENC_KEY_AES128_SHA1), "password").unwrap();
        assert!(!key.public_key_der().unwrap().is_empty());
    }

    #[test]
    fn wrong_password_is_rejected() {
        let der = decode_pem(ENC_KEY_3DES);
        match parse_pkcs8_private_key(&der, "wrong") {
            Err(Error::IncorrectPassword) | Err(Error::Malformed(_)) => {}
            other => panic!("expected a failure, got {other:?}"),
        }
    }

    #[test]
    fn shroud_and_unshroud_roundtrip() {
        let mut rng = StdRng::seed_from_u64(42);
        let secret = p256::SecretKey::random(&mut rng);
        let key = PrivateKey::P256(secret);
        let pkcs8_der = key.to_pkcs8_der().unwrap();

        let password = Password::new("shroud");
        let scheme = SuiteKind::Pbes2Aes256CbcHmacSha256.fresh_scheme(&mut rng, 2048, 16);
        let ciphertext = suites::encrypt_scheme(&scheme, &password, &pkcs8_der).unwrap();
        let wrapped = encrypted_private_key_info(&scheme, &ciphertext);

        let unwrapped = decrypt_encrypted_private_key_info(&wrapped, &password).unwrap();
        assert_eq!(unwrapped.as_slice(), pkcs8_der.as_slice());
        let reparsed = parse_private_key(&unwrapped).unwrap();
        assert_eq!(
            reparsed.public_key_der().unwrap(),
            key.public_key_der().unwrap()
        );
    }

    #[test]
    fn unknown_key_algorithm_reports_oid() {
        // PrivateKeyInfo with the DSA OID and an empty key.
        let der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(0);
                w.next().write_sequence(|w| {
                    w.next()
                        .write_oid(&yasna::models::ObjectIdentifier::from_slice(&[
                            1, 2, 840, 10040, 4, 1,
                        ]));
                });
                w.next().write_bytes(&[]);
            })
        });
        match parse_private_key(&der) {
            Err(Error::NotImplemented(msg)) => assert!(msg.contains("1.2.840.10040.4.1")),
            other => panic!("expected NotImplemented, got {other:?}"),
        }
    }
}
