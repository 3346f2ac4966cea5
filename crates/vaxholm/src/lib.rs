#![forbid(unsafe_code)]

pub use vaxholm_core as core;
pub use vaxholm_crypto as crypto;
pub use vaxholm_keys as keys;
pub use vaxholm_pfx as pfx;

pub use vaxholm_pfx::{
    decode, decode_chain, decode_trust_store, parse_pkcs8_private_key, to_pem, Certificate,
    Encoder, PrivateKey, LEGACY, MODERN2023, PASSWORDLESS, SHANGMI2024,
};
