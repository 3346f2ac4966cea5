#![forbid(unsafe_code)]

//! Core types shared across the Vaxholm PKCS#12 workspace: the error
//! taxonomy and the OID table.

pub mod error;
pub mod oid;

pub use error::{Error, Result};
