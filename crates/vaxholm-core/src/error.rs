#![forbid(unsafe_code)]

/// Errors produced by the Vaxholm PKCS#12 library.
///
/// CBC padding failures are deliberately reported as
/// [`Error::IncorrectPassword`] so that a padding oracle cannot be
/// distinguished from a wrong password.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("decryption password incorrect")]
    IncorrectPassword,

    #[error("could not parse PFX data: {0}")]
    Malformed(String),

    #[error("{0} is not implemented")]
    NotImplemented(String),

    #[error("decryption failed: {0}")]
    Decryption(String),

    #[error("unexpected PFX structure: {0}")]
    Structure(String),

    #[error("cryptographic error: {0}")]
    Crypto(String),
}

impl Error {
    /// Wrap a DER-level failure. Used wherever `yasna` hands back an
    /// `ASN1Error` (structural violations, trailing bytes, integers
    /// out of range all surface through this path).
    pub fn malformed(context: &str, e: impl std::fmt::Display) -> Self {
        Error::Malformed(format!("{context}: {e}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
