#![forbid(unsafe_code)]

//! Object identifiers used by the PKCS#12 container format and the
//! algorithms it references.

use yasna::models::ObjectIdentifier;

/// Build a `yasna` OID from its arc components.
pub fn oid(components: &[u64]) -> ObjectIdentifier {
    ObjectIdentifier::from_slice(components)
}

// PKCS#7 content types
pub const DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 1];
pub const SIGNED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 2];
pub const ENVELOPED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 3];
pub const ENCRYPTED_DATA: &[u64] = &[1, 2, 840, 113549, 1, 7, 6];

// PKCS#12 bag types
pub const KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 1];
pub const PKCS8_SHROUDED_KEY_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 2];
pub const CERT_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 3];
pub const CRL_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 4];
pub const SECRET_BAG: &[u64] = &[1, 2, 840, 113549, 1, 12, 10, 1, 5];

// Certificate type inside a cert bag
pub const X509_CERTIFICATE: &[u64] = &[1, 2, 840, 113549, 1, 9, 22, 1];

// Bag attributes
pub const FRIENDLY_NAME: &[u64] = &[1, 2, 840, 113549, 1, 9, 20];
pub const LOCAL_KEY_ID: &[u64] = &[1, 2, 840, 113549, 1, 9, 21];
/// Java keytool marks trust-store certificates with this attribute.
pub const JAVA_TRUSTED_KEY_USAGE: &[u64] = &[2, 16, 840, 1, 113894, 746875, 1, 1];
pub const ANY_EXTENDED_KEY_USAGE: &[u64] = &[2, 5, 29, 37, 0];

// Password-based encryption schemes
pub const PBE_SHA1_3DES: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 3];
pub const PBE_SHA1_RC2_128: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 5];
pub const PBE_SHA1_RC2_40: &[u64] = &[1, 2, 840, 113549, 1, 12, 1, 6];
pub const PBES2: &[u64] = &[1, 2, 840, 113549, 1, 5, 13];
pub const PBKDF2: &[u64] = &[1, 2, 840, 113549, 1, 5, 12];
pub const PBMAC1: &[u64] = &[1, 2, 840, 113549, 1, 5, 14];

// PBES2 encryption schemes
pub const RC2_CBC: &[u64] = &[1, 2, 840, 113549, 3, 2];
pub const AES_128_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 2];
pub const AES_192_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 22];
pub const AES_256_CBC: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 1, 42];
pub const SM4_CBC: &[u64] = &[1, 2, 156, 10197, 1, 104, 2];
pub const SM4_GCM: &[u64] = &[1, 2, 156, 10197, 1, 104, 8];

// Digests and HMAC PRFs
pub const SHA1: &[u64] = &[1, 3, 14, 3, 2, 26];
pub const SHA256: &[u64] = &[2, 16, 840, 1, 101, 3, 4, 2, 1];
pub const SM3: &[u64] = &[1, 2, 156, 10197, 1, 401];
pub const HMAC_SHA1: &[u64] = &[1, 2, 840, 113549, 2, 7];
pub const HMAC_SHA256: &[u64] = &[1, 2, 840, 113549, 2, 9];
pub const HMAC_SM3: &[u64] = &[1, 2, 156, 10197, 1, 401, 2];

// X.509 attribute types
pub const AT_COMMON_NAME: &[u64] = &[2, 5, 4, 3];
