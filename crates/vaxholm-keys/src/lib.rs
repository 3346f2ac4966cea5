#![forbid(unsafe_code)]

//! Typed private keys and PKCS#8 (plain and encrypted) handling for
//! the Vaxholm PKCS#12 library.

pub mod key;
pub mod pkcs8;

pub use key::PrivateKey;
pub use pkcs8::parse_pkcs8_private_key;
