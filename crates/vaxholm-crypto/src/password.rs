#![forbid(unsafe_code)]

//! The two password encodings that coexist in PKCS#12.

use zeroize::Zeroizing;

/// A PKCS#12 password, materialised in both wire encodings up front.
///
/// The PKCS#12 v1 KDF consumes the password as a BMPString: every
/// UTF-16 code unit as two big-endian bytes, followed by a 0x0000
/// terminator. The terminator is included even for the empty password,
/// which therefore encodes as two zero bytes. PBKDF2-based
/// constructions (PBES2, PBMAC1) instead consume the raw UTF-8 bytes
/// with no terminator. The two forms are not interchangeable and both
/// are needed while walking a single PFX.
pub struct Password {
    bmp: Zeroizing<Vec<u8>>,
    utf8: Zeroizing<Vec<u8>>,
}

impl Password {
    pub fn new(password: &str) -> Self {
        let mut bmp = Vec::with_capacity(password.len() * 2 + 2);
        for unit in password.encode_utf16() {
            bmp.extend_from_slice(&unit.to_be_bytes());
        }
        bmp.extend_from_slice(&[0, 0]);
        Password {
            bmp: Zeroizing::new(bmp),
            utf8: Zeroizing::new(password.as_bytes().to_vec()),
        }
    }

    /// BMPString form, terminator included. Feed this to the PKCS#12 KDF.
    pub fn bmp(&self) -> &[u8] {
        &self.bmp
    }

    /// Raw UTF-8 form, no terminator. Feed this to PBKDF2.
    pub fn utf8(&self) -> &[u8] {
        &self.utf8
    }

    pub fn is_empty(&self) -> bool {
        self.utf8.is_empty()
    }

    /// Some producers encode the empty password as an empty byte
    /// string instead of a bare BMP terminator. This yields that
    /// second form, so MAC verification can try both and carry the
    /// matching one into decryption.
    pub fn empty_alternate(&self) -> Option<Password> {
        if self.is_empty() {
            Some(Password {
                bmp: Zeroizing::new(Vec::new()),
                utf8: Zeroizing::new(Vec::new()),
            })
        } else {
            None
        }
    }
}

impl std::fmt::Debug for Password {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Password({} bytes)", self.utf8.len())
    }
}
