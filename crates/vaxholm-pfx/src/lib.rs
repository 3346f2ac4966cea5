#![forbid(unsafe_code)]

//! PKCS#12 (PFX) envelope engine for the Vaxholm library.
//!
//! Decoding walks the nested pipeline: strict-DER PFX parse, MAC
//! verification, ContentInfo unwrapping, password-based decryption of
//! each safe-bag layer and finally typed private keys. Encoding runs
//! the pipeline in reverse, with the cipher, MAC and iteration choices
//! fixed by an [`Encoder`] profile ([`LEGACY`], [`PASSWORDLESS`],
//! [`MODERN2023`], [`SHANGMI2024`]).
//!
//! Operations are whole-buffer and stateless; every encode entry point
//! takes the caller's RNG, so output is deterministic under a fixed
//! seed.

pub mod bags;
pub mod cert;
pub mod decode;
pub mod encode;
pub mod envelope;

pub use decode::{decode, decode_chain, decode_trust_store, to_pem};
pub use encode::{Encoder, LEGACY, MODERN2023, PASSWORDLESS, SHANGMI2024};
pub use vaxholm_keys::{parse_pkcs8_private_key, PrivateKey};
pub use x509_cert::Certificate;
