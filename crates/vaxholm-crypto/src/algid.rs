#![forbid(unsafe_code)]

//! AlgorithmIdentifier parsing and construction for every PBE shape
//! PKCS#12 uses: the pkcs-12PbeParams pair, the PBES2 composite with
//! its PBKDF2 sub-parameters, PBMAC1, and the per-cipher parameter
//! encodings (CBC IVs, GCM nonce plus tag length, RC2 effective key
//! bits).
//!
//! Structures are lifted off the wire as [`RawAlgId`] (OID plus raw
//! parameter bytes) inside the `yasna` readers and interpreted later,
//! so that an unrecognised algorithm surfaces as `NotImplemented`
//! carrying the OID rather than a bare parse failure.

use vaxholm_core::oid::{self, oid};
use vaxholm_core::{Error, Result};
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, BERReader, DERWriter};

/// An AlgorithmIdentifier as transmitted: OID plus undecoded parameters.
#[derive(Debug, Clone)]
pub struct RawAlgId {
    pub oid: ObjectIdentifier,
    pub params: Option<Vec<u8>>,
}

impl RawAlgId {
    pub fn parse(r: BERReader) -> std::result::Result<Self, ASN1Error> {
        r.read_sequence(|r| {
            let oid = r.next().read_oid()?;
            let params = r.read_optional(|r| r.read_der())?;
            Ok(RawAlgId { oid, params })
        })
    }

    pub fn write(&self, w: DERWriter) {
        w.write_sequence(|w| {
            w.next().write_oid(&self.oid);
            if let Some(params) = &self.params {
                w.next().write_der(params);
            }
        })
    }

    pub(crate) fn params(&self) -> Result<&[u8]> {
        self.params
            .as_deref()
            .ok_or_else(|| Error::Malformed(format!("{} without parameters", self.oid)))
    }
}

// ── PRF / HMAC scheme ──────────────────────────────────────────────────────

/// An HMAC algorithm, used both as the PBKDF2 PRF and as the PBMAC1
/// message-auth scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prf {
    HmacSha1,
    HmacSha256,
    HmacSm3,
}

impl Prf {
    pub fn output_len(self) -> usize {
        match self {
            Prf::HmacSha1 => 20,
            Prf::HmacSha256 | Prf::HmacSm3 => 32,
        }
    }

    pub fn from_raw(raw: &RawAlgId) -> Result<Self> {
        if raw.oid == oid(oid::HMAC_SHA1) {
            Ok(Prf::HmacSha1)
        } else if raw.oid == oid(oid::HMAC_SHA256) {
            Ok(Prf::HmacSha256)
        } else if raw.oid == oid(oid::HMAC_SM3) {
            Ok(Prf::HmacSm3)
        } else {
            Err(Error::NotImplemented(format!("PRF algorithm {}", raw.oid)))
        }
    }

    fn to_oid(self) -> ObjectIdentifier {
        match self {
            Prf::HmacSha1 => oid(oid::HMAC_SHA1),
            Prf::HmacSha256 => oid(oid::HMAC_SHA256),
            Prf::HmacSm3 => oid(oid::HMAC_SM3),
        }
    }

    /// AlgorithmIdentifier form. The NULL parameter is written on
    /// encode (RFC 8018 shape) and tolerated either way on decode.
    pub fn to_raw(self) -> RawAlgId {
        RawAlgId {
            oid: self.to_oid(),
            params: Some(yasna::construct_der(|w| w.write_null())),
        }
    }

    fn parse_alg_id(der: &[u8]) -> Result<Self> {
        let raw = parse_full(der, "PRF AlgorithmIdentifier", RawAlgId::parse)?;
        if let Some(params) = &raw.params {
            yasna::parse_der(params, |r| r.read_null())
                .map_err(|e| Error::malformed("PRF parameters", e))?;
        }
        Prf::from_raw(&raw)
    }
}

// ── PBKDF2 ─────────────────────────────────────────────────────────────────

/// PBKDF2-params (RFC 8018 A.2). The salt is always the `specified`
/// CHOICE; `key_length` is carried when present so PBMAC1 can honour
/// an explicit override.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pbkdf2Params {
    pub salt: Vec<u8>,
    pub iterations: u32,
    pub key_length: Option<u32>,
    pub prf: Prf,
}

impl Pbkdf2Params {
    pub fn parse_der(der: &[u8]) -> Result<Self> {
        let params = parse_full(der, "PBKDF2 parameters", |r| {
            r.read_sequence(|r| {
                let salt = r.next().read_bytes()?;
                let iterations = r.next().read_u32()?;

                // keyLength (INTEGER) and prf (SEQUENCE) are both
                // optional; sniff the outer tag to tell them apart.
                let mut key_length = None;
                let mut prf_der = None;
                if let Some(first) = r.read_optional(|r| r.read_der())? {
                    if first.first() == Some(&0x30) {
                        prf_der = Some(first);
                    } else {
                        key_length = Some(yasna::parse_der(&first, |r| r.read_u32())?);
                        prf_der = r.read_optional(|r| r.read_der())?;
                    }
                }
                Ok((salt, iterations, key_length, prf_der))
            })
        })?;
        let (salt, iterations, key_length, prf_der) = params;
        if iterations == 0 {
            return Err(Error::Malformed("PBKDF2 iteration count is zero".into()));
        }
        let prf = match prf_der {
            Some(der) => Prf::parse_alg_id(&der)?,
            None => Prf::HmacSha1,
        };
        Ok(Pbkdf2Params {
            salt,
            iterations,
            key_length,
            prf,
        })
    }

    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_bytes(&self.salt);
                w.next().write_u32(self.iterations);
                if let Some(len) = self.key_length {
                    w.next().write_u32(len);
                }
                self.prf.to_raw().write(w.next());
            })
        })
    }

    pub fn to_raw(&self) -> RawAlgId {
        RawAlgId {
            oid: oid(oid::PBKDF2),
            params: Some(self.to_der()),
        }
    }
}

// ── PBES2 ciphers ──────────────────────────────────────────────────────────

/// The encryptionScheme half of PBES2-params, parameters included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Pbes2Cipher {
    Aes128Cbc { iv: [u8; 16] },
    Aes192Cbc { iv: [u8; 16] },
    Aes256Cbc { iv: [u8; 16] },
    Sm4Cbc { iv: [u8; 16] },
    Sm4Gcm { nonce: Vec<u8>, tag_len: u32 },
    Rc2Cbc { eff_key_bits: u32, iv: [u8; 8] },
}

impl Pbes2Cipher {
    pub fn key_len(&self) -> usize {
        match self {
            Pbes2Cipher::Aes128Cbc { .. } => 16,
            Pbes2Cipher::Aes192Cbc { .. } => 24,
            Pbes2Cipher::Aes256Cbc { .. } => 32,
            Pbes2Cipher::Sm4Cbc { .. } | Pbes2Cipher::Sm4Gcm { .. } => 16,
            Pbes2Cipher::Rc2Cbc { eff_key_bits, .. } => (*eff_key_bits as usize).div_ceil(8),
        }
    }

    pub fn from_raw(raw: &RawAlgId) -> Result<Self> {
        if raw.oid == oid(oid::AES_128_CBC) {
            Ok(Pbes2Cipher::Aes128Cbc {
                iv: parse_iv(raw.params()?)?,
            })
        } else if raw.oid == oid(oid::AES_192_CBC) {
            Ok(Pbes2Cipher::Aes192Cbc {
                iv: parse_iv(raw.params()?)?,
            })
        } else if raw.oid == oid(oid::AES_256_CBC) {
            Ok(Pbes2Cipher::Aes256Cbc {
                iv: parse_iv(raw.params()?)?,
            })
        } else if raw.oid == oid(oid::SM4_CBC) {
            Ok(Pbes2Cipher::Sm4Cbc {
                iv: parse_iv(raw.params()?)?,
            })
        } else if raw.oid == oid(oid::SM4_GCM) {
            let (nonce, tag_len) = parse_gcm_params(raw.params()?)?;
            Ok(Pbes2Cipher::Sm4Gcm { nonce, tag_len })
        } else if raw.oid == oid(oid::RC2_CBC) {
            let (eff_key_bits, iv) = parse_rc2_params(raw.params()?)?;
            Ok(Pbes2Cipher::Rc2Cbc { eff_key_bits, iv })
        } else {
            Err(Error::NotImplemented(format!(
                "PBES2 encryption scheme {}",
                raw.oid
            )))
        }
    }

    pub fn to_raw(&self) -> RawAlgId {
        let (o, params) = match self {
            Pbes2Cipher::Aes128Cbc { iv } => (oid::AES_128_CBC, octet_string(iv)),
            Pbes2Cipher::Aes192Cbc { iv } => (oid::AES_192_CBC, octet_string(iv)),
            Pbes2Cipher::Aes256Cbc { iv } => (oid::AES_256_CBC, octet_string(iv)),
            Pbes2Cipher::Sm4Cbc { iv } => (oid::SM4_CBC, octet_string(iv)),
            Pbes2Cipher::Sm4Gcm { nonce, tag_len } => (
                oid::SM4_GCM,
                yasna::construct_der(|w| {
                    w.write_sequence(|w| {
                        w.next().write_bytes(nonce);
                        w.next().write_u32(*tag_len);
                    })
                }),
            ),
            Pbes2Cipher::Rc2Cbc { eff_key_bits, iv } => (
                oid::RC2_CBC,
                yasna::construct_der(|w| {
                    w.write_sequence(|w| {
                        w.next().write_u32(rc2_version(*eff_key_bits));
                        w.next().write_bytes(iv);
                    })
                }),
            ),
        };
        RawAlgId {
            oid: oid(o),
            params: Some(params),
        }
    }
}

// ── Encryption schemes ─────────────────────────────────────────────────────

/// Every password-based encryption AlgorithmIdentifier the library can
/// interpret, parameters included. The set of PKCS#12 ciphers is
/// historically stable, so this is a closed enum rather than an open
/// registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EncryptionScheme {
    PbeSha1And3DesCbc { salt: Vec<u8>, iterations: u32 },
    PbeSha1AndRc2Cbc40 { salt: Vec<u8>, iterations: u32 },
    PbeSha1AndRc2Cbc128 { salt: Vec<u8>, iterations: u32 },
    Pbes2 { kdf: Pbkdf2Params, cipher: Pbes2Cipher },
}

impl EncryptionScheme {
    pub fn from_raw(raw: &RawAlgId) -> Result<Self> {
        if raw.oid == oid(oid::PBE_SHA1_3DES) {
            let (salt, iterations) = parse_pkcs12_pbe_params(raw.params()?)?;
            Ok(EncryptionScheme::PbeSha1And3DesCbc { salt, iterations })
        } else if raw.oid == oid(oid::PBE_SHA1_RC2_40) {
            let (salt, iterations) = parse_pkcs12_pbe_params(raw.params()?)?;
            Ok(EncryptionScheme::PbeSha1AndRc2Cbc40 { salt, iterations })
        } else if raw.oid == oid(oid::PBE_SHA1_RC2_128) {
            let (salt, iterations) = parse_pkcs12_pbe_params(raw.params()?)?;
            Ok(EncryptionScheme::PbeSha1AndRc2Cbc128 { salt, iterations })
        } else if raw.oid == oid(oid::PBES2) {
            let (kdf_raw, cipher_raw) = parse_full(raw.params()?, "PBES2 parameters", |r| {
                r.read_sequence(|r| {
                    let kdf = RawAlgId::parse(r.next())?;
                    let cipher = RawAlgId::parse(r.next())?;
                    Ok((kdf, cipher))
                })
            })?;
            if kdf_raw.oid != oid(oid::PBKDF2) {
                return Err(Error::NotImplemented(format!(
                    "PBES2 key derivation {}",
                    kdf_raw.oid
                )));
            }
            let kdf = Pbkdf2Params::parse_der(kdf_raw.params()?)?;
            let cipher = Pbes2Cipher::from_raw(&cipher_raw)?;
            Ok(EncryptionScheme::Pbes2 { kdf, cipher })
        } else {
            Err(Error::NotImplemented(format!("PBE algorithm {}", raw.oid)))
        }
    }

    pub fn to_raw(&self) -> RawAlgId {
        match self {
            EncryptionScheme::PbeSha1And3DesCbc { salt, iterations } => RawAlgId {
                oid: oid(oid::PBE_SHA1_3DES),
                params: Some(pkcs12_pbe_params(salt, *iterations)),
            },
            EncryptionScheme::PbeSha1AndRc2Cbc40 { salt, iterations } => RawAlgId {
                oid: oid(oid::PBE_SHA1_RC2_40),
                params: Some(pkcs12_pbe_params(salt, *iterations)),
            },
            EncryptionScheme::PbeSha1AndRc2Cbc128 { salt, iterations } => RawAlgId {
                oid: oid(oid::PBE_SHA1_RC2_128),
                params: Some(pkcs12_pbe_params(salt, *iterations)),
            },
            EncryptionScheme::Pbes2 { kdf, cipher } => RawAlgId {
                oid: oid(oid::PBES2),
                params: Some(yasna::construct_der(|w| {
                    w.write_sequence(|w| {
                        kdf.to_raw().write(w.next());
                        cipher.to_raw().write(w.next());
                    })
                })),
            },
        }
    }
}

// ── PBMAC1 ─────────────────────────────────────────────────────────────────

/// PBMAC1-params (RFC 8018 A.5): PBKDF2 plus a message-auth scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pbmac1Params {
    pub kdf: Pbkdf2Params,
    pub scheme: Prf,
}

impl Pbmac1Params {
    pub fn parse_der(der: &[u8]) -> Result<Self> {
        let (kdf_raw, scheme_raw) = parse_full(der, "PBMAC1 parameters", |r| {
            r.read_sequence(|r| {
                let kdf = RawAlgId::parse(r.next())?;
                let scheme = RawAlgId::parse(r.next())?;
                Ok((kdf, scheme))
            })
        })?;
        if kdf_raw.oid != oid(oid::PBKDF2) {
            return Err(Error::NotImplemented(format!(
                "PBMAC1 key derivation {}",
                kdf_raw.oid
            )));
        }
        let kdf = Pbkdf2Params::parse_der(kdf_raw.params()?)?;
        let scheme = Prf::from_raw(&scheme_raw)
            .map_err(|_| Error::NotImplemented(format!("message auth scheme {}", scheme_raw.oid)))?;
        Ok(Pbmac1Params { kdf, scheme })
    }

    pub fn to_der(&self) -> Vec<u8> {
        yasna::construct_der(|w| {
            w.write_sequence(|w| {
                self.kdf.to_raw().write(w.next());
                self.scheme.to_raw().write(w.next());
            })
        })
    }
}

// ── RC2 effective-key-bits mapping ─────────────────────────────────────────

/// RC2-CBC-Parameter carries the effective key bits as a "version"
/// integer (RFC 2268 section 6): 40 -> 160, 64 -> 120, 128 -> 58, and
/// values of 256 or more stand for themselves.
pub fn rc2_version(eff_key_bits: u32) -> u32 {
    match eff_key_bits {
        40 => 160,
        64 => 120,
        128 => 58,
        other => other,
    }
}

fn rc2_eff_key_bits(version: u32) -> Result<u32> {
    match version {
        160 => Ok(40),
        120 => Ok(64),
        58 => Ok(128),
        v if v >= 256 => Ok(v),
        v => Err(Error::Malformed(format!("RC2 parameter version {v}"))),
    }
}

// ── Parameter shapes ───────────────────────────────────────────────────────

/// Run a strict-DER parse over a complete buffer; trailing bytes are a
/// hard failure.
pub fn parse_full<T, F>(der: &[u8], context: &str, f: F) -> Result<T>
where
    F: for<'a, 'b> FnOnce(BERReader<'a, 'b>) -> std::result::Result<T, ASN1Error>,
{
    yasna::parse_der(der, f).map_err(|e| Error::malformed(context, e))
}

fn parse_pkcs12_pbe_params(der: &[u8]) -> Result<(Vec<u8>, u32)> {
    let (salt, iterations) = parse_full(der, "PBE parameters", |r| {
        r.read_sequence(|r| {
            let salt = r.next().read_bytes()?;
            let iterations = r.next().read_u32()?;
            Ok((salt, iterations))
        })
    })?;
    if iterations == 0 {
        return Err(Error::Malformed("PBE iteration count is zero".into()));
    }
    Ok((salt, iterations))
}

fn pkcs12_pbe_params(salt: &[u8], iterations: u32) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_bytes(salt);
            w.next().write_u32(iterations);
        })
    })
}

fn parse_iv<const N: usize>(der: &[u8]) -> Result<[u8; N]> {
    let bytes = parse_full(der, "CBC IV", |r| r.read_bytes())?;
    bytes
        .try_into()
        .map_err(|_| Error::Malformed(format!("CBC IV is not {N} bytes")))
}

fn parse_gcm_params(der: &[u8]) -> Result<(Vec<u8>, u32)> {
    parse_full(der, "GCM parameters", |r| {
        r.read_sequence(|r| {
            let nonce = r.next().read_bytes()?;
            let tag_len = r.read_optional(|r| r.read_u32())?.unwrap_or(12);
            Ok((nonce, tag_len))
        })
    })
}

fn parse_rc2_params(der: &[u8]) -> Result<(u32, [u8; 8])> {
    let (version, iv) = parse_full(der, "RC2 parameters", |r| {
        r.read_sequence(|r| {
            let first = r.next().read_der()?;
            if first.first() == Some(&0x02) {
                let version = yasna::parse_der(&first, |r| r.read_u32())?;
                let iv = r.next().read_bytes()?;
                Ok((Some(version), iv))
            } else {
                let iv = yasna::parse_der(&first, |r| r.read_bytes())?;
                Ok((None, iv))
            }
        })
    })?;
    let eff_key_bits = match version {
        Some(v) => rc2_eff_key_bits(v)?,
        // Absent version means a 32-bit effective key per RFC 2268.
        None => 32,
    };
    let iv: [u8; 8] = iv
        .try_into()
        .map_err(|_| Error::Malformed("RC2 IV is not 8 bytes".into()))?;
    Ok((eff_key_bits, iv))
}

fn octet_string(bytes: &[u8]) -> Vec<u8> {
    yasna::construct_der(|w| w.write_bytes(bytes))
}
