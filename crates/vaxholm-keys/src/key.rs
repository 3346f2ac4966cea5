#![forbid(unsafe_code)]

//! The typed private-key variants a PFX can carry.

use pkcs8::{EncodePrivateKey, EncodePublicKey};
use vaxholm_core::{Error, Result};
use zeroize::Zeroizing;

/// A private key decoded from a PFX or a standalone PKCS#8 blob.
///
/// Callers pattern-match on the variant; the library itself only ever
/// needs the public half (for SubjectPublicKeyInfo comparison) and the
/// PKCS#8 encoding (for re-shrouding on encode).
pub enum PrivateKey {
    Rsa(rsa::RsaPrivateKey),
    P224(p224::SecretKey),
    P256(p256::SecretKey),
    P384(p384::SecretKey),
    P521(p521::SecretKey),
    Sm2(sm2::SecretKey),
}

impl PrivateKey {
    /// PKCS#8 PrivateKeyInfo encoding of the key.
    pub fn to_pkcs8_der(&self) -> Result<Zeroizing<Vec<u8>>> {
        let doc = match self {
            PrivateKey::Rsa(k) => k.to_pkcs8_der(),
            PrivateKey::P224(k) => k.to_pkcs8_der(),
            PrivateKey::P256(k) => k.to_pkcs8_der(),
            PrivateKey::P384(k) => k.to_pkcs8_der(),
            PrivateKey::P521(k) => k.to_pkcs8_der(),
            PrivateKey::Sm2(k) => k.to_pkcs8_der(),
        }
        .map_err(|e| Error::Crypto(format!("PKCS#8 encoding: {e}")))?;
        Ok(Zeroizing::new(doc.as_bytes().to_vec()))
    }

    /// DER-encoded SubjectPublicKeyInfo of the public half.
    pub fn public_key_der(&self) -> Result<Vec<u8>> {
        let doc = match self {
            PrivateKey::Rsa(k) => k.to_public_key().to_public_key_der(),
            PrivateKey::P224(k) => k.public_key().to_public_key_der(),
            PrivateKey::P256(k) => k.public_key().to_public_key_der(),
            PrivateKey::P384(k) => k.public_key().to_public_key_der(),
            PrivateKey::P521(k) => k.public_key().to_public_key_der(),
            PrivateKey::Sm2(k) => k.public_key().to_public_key_der(),
        }
        .map_err(|e| Error::Crypto(format!("SubjectPublicKeyInfo encoding: {e}")))?;
        Ok(doc.as_bytes().to_vec())
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PrivateKey::Rsa(_) => write!(f, "RSA private key"),
            PrivateKey::P224(_) => write!(f, "EC P-224 private key"),
            PrivateKey::P256(_) => write!(f, "EC P-256 private key"),
            PrivateKey::P384(_) => write!(f, "EC P-384 private key"),
            PrivateKey::P521(_) => write!(f, "EC P-521 private key"),
            PrivateKey::Sm2(_) => write!(f, "SM2 private key"),
        }
    }
}
