#![forbid(unsafe_code)]

//! Cryptographic plumbing for the Vaxholm PKCS#12 library.
//!
//! Four layers, leaves first: password encoding ([`password`]), the
//! PKCS#12 v1 key-derivation function ([`kdf`]), the
//! AlgorithmIdentifier codec ([`algid`]), the cipher-suite registry
//! ([`suites`]) and the outer-integrity MAC layer ([`mac`]).

pub mod algid;
pub mod kdf;
pub mod mac;
pub mod password;
pub mod suites;

pub use password::Password;
