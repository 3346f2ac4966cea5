#![forbid(unsafe_code)]

//! Cipher-suite registry: one decrypt/encrypt dispatch over every
//! supported password-based encryption suite.
//!
//! pkcs12-v1 suites derive the key and IV separately (purpose bytes 1
//! and 2) with SHA-1; PBES2 suites derive one key with PBKDF2 and take
//! the IV or nonce from the AlgorithmIdentifier parameters. CBC modes
//! pad with PKCS#7; GCM appends a 16-byte tag instead. A CBC unpad
//! failure is indistinguishable from a wrong password on purpose.

use cipher::block_padding::Pkcs7;
use cipher::{BlockDecryptMut, BlockEncryptMut, BlockSizeUser, InnerIvInit, KeyIvInit};
use rand::{CryptoRng, RngCore};
use vaxholm_core::{Error, Result};
use zeroize::Zeroizing;

use crate::algid::{EncryptionScheme, Pbes2Cipher, Pbkdf2Params, Prf, RawAlgId};
use crate::kdf;
use crate::password::Password;

type Sm4Gcm = aes_gcm::AesGcm<sm4::Sm4, aes_gcm::aead::consts::U12>;

/// Decrypt `ciphertext` under the AlgorithmIdentifier carried next to
/// it on the wire.
pub fn decrypt(raw: &RawAlgId, password: &Password, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    decrypt_scheme(&EncryptionScheme::from_raw(raw)?, password, ciphertext)
}

pub fn decrypt_scheme(
    scheme: &EncryptionScheme,
    password: &Password,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    match scheme {
        EncryptionScheme::PbeSha1And3DesCbc { salt, iterations } => {
            let key = kdf::derive_sha1(kdf::ID_KEY, password.bmp(), salt, *iterations, 24);
            let iv = kdf::derive_sha1(kdf::ID_IV, password.bmp(), salt, *iterations, 8);
            let dec = cbc::Decryptor::<des::TdesEde3>::new_from_slices(&key, &iv)
                .map_err(|e| Error::Crypto(format!("3DES-CBC init: {e}")))?;
            cbc_decrypt(dec, ciphertext)
        }
        EncryptionScheme::PbeSha1AndRc2Cbc40 { salt, iterations } => {
            pkcs12_rc2_decrypt(password, salt, *iterations, 5, 40, ciphertext)
        }
        EncryptionScheme::PbeSha1AndRc2Cbc128 { salt, iterations } => {
            pkcs12_rc2_decrypt(password, salt, *iterations, 16, 128, ciphertext)
        }
        EncryptionScheme::Pbes2 { kdf: params, cipher } => {
            let key = pbes2_key(params, cipher, password)?;
            match cipher {
                Pbes2Cipher::Aes128Cbc { iv } => {
                    let dec = cbc::Decryptor::<aes::Aes128>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("AES-128-CBC init: {e}")))?;
                    cbc_decrypt(dec, ciphertext)
                }
                Pbes2Cipher::Aes192Cbc { iv } => {
                    let dec = cbc::Decryptor::<aes::Aes192>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("AES-192-CBC init: {e}")))?;
                    cbc_decrypt(dec, ciphertext)
                }
                Pbes2Cipher::Aes256Cbc { iv } => {
                    let dec = cbc::Decryptor::<aes::Aes256>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("AES-256-CBC init: {e}")))?;
                    cbc_decrypt(dec, ciphertext)
                }
                Pbes2Cipher::Sm4Cbc { iv } => {
                    let dec = cbc::Decryptor::<sm4::Sm4>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("SM4-CBC init: {e}")))?;
                    cbc_decrypt(dec, ciphertext)
                }
                Pbes2Cipher::Sm4Gcm { nonce, tag_len } => {
                    sm4_gcm_decrypt(&key, nonce, *tag_len, ciphertext)
                }
                Pbes2Cipher::Rc2Cbc { eff_key_bits, iv } => {
                    let rc2 = rc2::Rc2::new_with_eff_key_len(&key, *eff_key_bits as usize);
                    let dec = cbc::Decryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, iv)
                        .map_err(|e| Error::Crypto(format!("RC2-CBC init: {e}")))?;
                    cbc_decrypt(dec, ciphertext)
                }
            }
        }
    }
}

/// Encrypt `plaintext` under a fully parameterised scheme (salts and
/// IVs already chosen; see [`SuiteKind::fresh_scheme`]).
pub fn encrypt_scheme(
    scheme: &EncryptionScheme,
    password: &Password,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    match scheme {
        EncryptionScheme::PbeSha1And3DesCbc { salt, iterations } => {
            let key = kdf::derive_sha1(kdf::ID_KEY, password.bmp(), salt, *iterations, 24);
            let iv = kdf::derive_sha1(kdf::ID_IV, password.bmp(), salt, *iterations, 8);
            let enc = cbc::Encryptor::<des::TdesEde3>::new_from_slices(&key, &iv)
                .map_err(|e| Error::Crypto(format!("3DES-CBC init: {e}")))?;
            cbc_encrypt(enc, plaintext)
        }
        EncryptionScheme::PbeSha1AndRc2Cbc40 { salt, iterations } => {
            let key = kdf::derive_sha1(kdf::ID_KEY, password.bmp(), salt, *iterations, 5);
            let iv = kdf::derive_sha1(kdf::ID_IV, password.bmp(), salt, *iterations, 8);
            let rc2 = rc2::Rc2::new_with_eff_key_len(&key, 40);
            let enc = cbc::Encryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, &iv)
                .map_err(|e| Error::Crypto(format!("RC2-CBC init: {e}")))?;
            cbc_encrypt(enc, plaintext)
        }
        EncryptionScheme::PbeSha1AndRc2Cbc128 { salt, iterations } => {
            let key = kdf::derive_sha1(kdf::ID_KEY, password.bmp(), salt, *iterations, 16);
            let iv = kdf::derive_sha1(kdf::ID_IV, password.bmp(), salt, *iterations, 8);
            let rc2 = rc2::Rc2::new_with_eff_key_len(&key, 128);
            let enc = cbc::Encryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, &iv)
                .map_err(|e| Error::Crypto(format!("RC2-CBC init: {e}")))?;
            cbc_encrypt(enc, plaintext)
        }
        EncryptionScheme::Pbes2 { kdf: params, cipher } => {
            let key = pbes2_key(params, cipher, password)?;
            match cipher {
                Pbes2Cipher::Aes128Cbc { iv } => {
                    let enc = cbc::Encryptor::<aes::Aes128>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("AES-128-CBC init: {e}")))?;
                    cbc_encrypt(enc, plaintext)
                }
                Pbes2Cipher::Aes192Cbc { iv } => {
                    let enc = cbc::Encryptor::<aes::Aes192>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("AES-192-CBC init: {e}")))?;
                    cbc_encrypt(enc, plaintext)
                }
                Pbes2Cipher::Aes256Cbc { iv } => {
                    let enc = cbc::Encryptor::<aes::Aes256>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("AES-256-CBC init: {e}")))?;
                    cbc_encrypt(enc, plaintext)
                }
                Pbes2Cipher::Sm4Cbc { iv } => {
                    let enc = cbc::Encryptor::<sm4::Sm4>::new_from_slices(&key, iv)
                        .map_err(|e| Error::Crypto(format!("SM4-CBC init: {e}")))?;
                    cbc_encrypt(enc, plaintext)
                }
                Pbes2Cipher::Sm4Gcm { nonce, tag_len } => {
                    sm4_gcm_encrypt(&key, nonce, *tag_len, plaintext)
                }
                Pbes2Cipher::Rc2Cbc { eff_key_bits, iv } => {
                    let rc2 = rc2::Rc2::new_with_eff_key_len(&key, *eff_key_bits as usize);
                    let enc = cbc::Encryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, iv)
                        .map_err(|e| Error::Crypto(format!("RC2-CBC init: {e}")))?;
                    cbc_encrypt(enc, plaintext)
                }
            }
        }
    }
}

// ── Shared helpers ─────────────────────────────────────────────────────────

fn pkcs12_rc2_decrypt(
    password: &Password,
    salt: &[u8],
    iterations: u32,
    key_len: usize,
    eff_key_bits: usize,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    let key = kdf::derive_sha1(kdf::ID_KEY, password.bmp(), salt, iterations, key_len);
    let iv = kdf::derive_sha1(kdf::ID_IV, password.bmp(), salt, iterations, 8);
    let rc2 = rc2::Rc2::new_with_eff_key_len(&key, eff_key_bits);
    let dec = cbc::Decryptor::<rc2::Rc2>::inner_iv_slice_init(rc2, &iv)
        .map_err(|e| Error::Crypto(format!("RC2-CBC init: {e}")))?;
    cbc_decrypt(dec, ciphertext)
}

/// Derive the PBES2 key. The cipher fixes the key length; an explicit
/// PBKDF2 keyLength must agree, except for RC2 where the declared
/// length wins over the effective-key-bits default.
fn pbes2_key(
    params: &Pbkdf2Params,
    cipher: &Pbes2Cipher,
    password: &Password,
) -> Result<Zeroizing<Vec<u8>>> {
    let key_len = match cipher {
        Pbes2Cipher::Rc2Cbc { .. } => params
            .key_length
            .map(|n| n as usize)
            .unwrap_or_else(|| cipher.key_len()),
        _ => {
            let key_len = cipher.key_len();
            if let Some(declared) = params.key_length {
                if declared as usize != key_len {
                    return Err(Error::Malformed(format!(
                        "PBKDF2 key length {declared} does not match cipher key length {key_len}"
                    )));
                }
            }
            key_len
        }
    };
    Ok(pbkdf2_key(
        params.prf,
        password.utf8(),
        &params.salt,
        params.iterations,
        key_len,
    ))
}

/// PBKDF2, dispatched over the PRF. Takes the raw UTF-8 password.
pub fn pbkdf2_key(
    prf: Prf,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    len: usize,
) -> Zeroizing<Vec<u8>> {
    let mut key = Zeroizing::new(vec![0u8; len]);
    match prf {
        Prf::HmacSha1 => pbkdf2::pbkdf2_hmac::<sha1::Sha1>(password, salt, iterations, &mut key),
        Prf::HmacSha256 => pbkdf2::pbkdf2_hmac::<sha2::Sha256>(password, salt, iterations, &mut key),
        Prf::HmacSm3 => pbkdf2::pbkdf2_hmac::<sm3::Sm3>(password, salt, iterations, &mut key),
    }
    key
}

fn cbc_decrypt<D: BlockDecryptMut>(dec: D, ciphertext: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    let mut buf = Zeroizing::new(ciphertext.to_vec());
    let plaintext = dec
        .decrypt_padded_mut::<Pkcs7>(&mut buf)
        .map_err(|_| Error::IncorrectPassword)?;
    Ok(Zeroizing::new(plaintext.to_vec()))
}

fn cbc_encrypt<E: BlockEncryptMut + BlockSizeUser>(enc: E, plaintext: &[u8]) -> Result<Vec<u8>> {
    let block = E::block_size();
    let padded_len = (plaintext.len() / block + 1) * block;
    let mut buf = Zeroizing::new(vec![0u8; padded_len]);
    buf[..plaintext.len()].copy_from_slice(plaintext);
    let ciphertext = enc
        .encrypt_padded_mut::<Pkcs7>(&mut buf, plaintext.len())
        .map_err(|e| Error::Crypto(format!("CBC pad: {e}")))?;
    Ok(ciphertext.to_vec())
}

fn sm4_gcm_cipher(key: &[u8], nonce: &[u8], tag_len: u32) -> Result<Sm4Gcm> {
    use aes_gcm::KeyInit;
    if tag_len != 16 {
        return Err(Error::NotImplemented(format!("SM4-GCM tag length {tag_len}")));
    }
    if nonce.len() != 12 {
        return Err(Error::NotImplemented(format!(
            "SM4-GCM nonce length {}",
            nonce.len()
        )));
    }
    Sm4Gcm::new_from_slice(key).map_err(|e| Error::Crypto(format!("SM4-GCM init: {e}")))
}

fn sm4_gcm_decrypt(
    key: &[u8],
    nonce: &[u8],
    tag_len: u32,
    ciphertext: &[u8],
) -> Result<Zeroizing<Vec<u8>>> {
    use aes_gcm::aead::Aead;
    let cipher = sm4_gcm_cipher(key, nonce, tag_len)?;
    let plaintext = cipher
        .decrypt(aes_gcm::Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::Decryption("SM4-GCM authentication failed".into()))?;
    Ok(Zeroizing::new(plaintext))
}

fn sm4_gcm_encrypt(key: &[u8], nonce: &[u8], tag_len: u32, plaintext: &[u8]) -> Result<Vec<u8>> {
    use aes_gcm::aead::Aead;
    let cipher = sm4_gcm_cipher(key, nonce, tag_len)?;
    cipher
        .encrypt(aes_gcm::Nonce::from_slice(nonce), plaintext)
        .map_err(|e| Error::Crypto(format!("SM4-GCM encrypt: {e}")))
}

// ── Encoder-side suite selection ───────────────────────────────────────────

/// The cipher choices encoder profiles draw from. Each value mints a
/// fully parameterised [`EncryptionScheme`] with fresh salt and IV
/// material from the caller's RNG.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuiteKind {
    PbeSha1AndRc2Cbc40,
    PbeSha1And3DesCbc,
    Pbes2Aes256CbcHmacSha256,
    Pbes2Sm4GcmHmacSm3,
}

impl SuiteKind {
    pub fn fresh_scheme<R: RngCore + CryptoRng>(
        self,
        rng: &mut R,
        iterations: u32,
        salt_len: usize,
    ) -> EncryptionScheme {
        let mut salt = vec![0u8; salt_len];
        rng.fill_bytes(&mut salt);
        match self {
            SuiteKind::PbeSha1AndRc2Cbc40 => {
                EncryptionScheme::PbeSha1AndRc2Cbc40 { salt, iterations }
            }
            SuiteKind::PbeSha1And3DesCbc => {
                EncryptionScheme::PbeSha1And3DesCbc { salt, iterations }
            }
            SuiteKind::Pbes2Aes256CbcHmacSha256 => {
                let mut iv = [0u8; 16];
                rng.fill_bytes(&mut iv);
                EncryptionScheme::Pbes2 {
                    kdf: Pbkdf2Params {
                        salt,
                        iterations,
                        key_length: None,
                        prf: Prf::HmacSha256,
                    },
                    cipher: Pbes2Cipher::Aes256Cbc { iv },
                }
            }
            SuiteKind::Pbes2Sm4GcmHmacSm3 => {
                let mut nonce = vec![0u8; 12];
                rng.fill_bytes(&mut nonce);
                EncryptionScheme::Pbes2 {
                    kdf: Pbkdf2Params {
                        salt,
                        iterations,
                        key_length: Some(16),
                        prf: Prf::HmacSm3,
                    },
                    cipher: Pbes2Cipher::Sm4Gcm {
                        nonce,
                        tag_len: 16,
                    },
                }
            }
        }
    }
}
