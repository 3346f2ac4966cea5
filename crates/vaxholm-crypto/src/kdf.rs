#![forbid(unsafe_code)]

//! The PKCS#12 v1 key-derivation function (RFC 7292 Appendix B).
//!
//! Used for the historical pbeWithSHAAnd… ciphers (always with SHA-1)
//! and for keying the legacy PFX MAC (SHA-1, SHA-256 or SM3). PBES2
//! and PBMAC1 use PBKDF2 instead, via the `pbkdf2` crate.

use digest::{Digest, FixedOutputReset};
use zeroize::Zeroizing;

/// Purpose bytes (RFC 7292 Appendix B.3).
pub const ID_KEY: u8 = 1;
pub const ID_IV: u8 = 2;
pub const ID_MAC: u8 = 3;

/// Derive with SHA-1 (u = 20, v = 64).
pub fn derive_sha1(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Zeroizing<Vec<u8>> {
    derive::<sha1::Sha1>(id, password, salt, iterations, output_len, 64)
}

/// Derive with SHA-256 (u = 32, v = 64).
pub fn derive_sha256(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Zeroizing<Vec<u8>> {
    derive::<sha2::Sha256>(id, password, salt, iterations, output_len, 64)
}

/// Derive with SM3 (u = 32, v = 64).
pub fn derive_sm3(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
) -> Zeroizing<Vec<u8>> {
    derive::<sm3::Sm3>(id, password, salt, iterations, output_len, 64)
}

/// The derivation pipeline, generic over the hash. `password` is the
/// BMP-encoded password (UTF-16BE with the two-byte terminator) and
/// `v` the hash's input block size; iteration counts of zero are
/// rejected at parse time, so `iterations >= 1` holds here.
///
/// Each output block is H applied `iterations` times over the purpose
/// diversifier concatenated with a feed string built from salt and
/// password. Between blocks the feed is advanced by adding the block
/// (cycled out to `v` bytes) plus one into every `v`-byte segment.
fn derive<D>(
    id: u8,
    password: &[u8],
    salt: &[u8],
    iterations: u32,
    output_len: usize,
    v: usize,
) -> Zeroizing<Vec<u8>>
where
    D: Digest + FixedOutputReset,
{
    let diversifier = vec![id; v];

    let mut feed = Zeroizing::new(Vec::new());
    fill_cycled(&mut feed, salt, v);
    fill_cycled(&mut feed, password, v);

    let mut hasher = D::new();
    let mut out = Zeroizing::new(Vec::with_capacity(output_len));
    loop {
        Digest::update(&mut hasher, &diversifier);
        Digest::update(&mut hasher, &feed);
        let mut block = hasher.finalize_reset();
        for _ in 1..iterations {
            Digest::update(&mut hasher, &block);
            block = hasher.finalize_reset();
        }

        out.extend_from_slice(&block);
        if out.len() >= output_len {
            break;
        }

        // Advance the feed: big-endian addition of (block cycled to v
        // bytes) + 1 into each segment, carries staying segment-local.
        for segment in feed.chunks_mut(v) {
            let mut carry = 1u16;
            for (i, byte) in segment.iter_mut().enumerate().rev() {
                let sum = *byte as u16 + block[i % block.len()] as u16 + carry;
                *byte = sum as u8;
                carry = sum >> 8;
            }
        }
    }

    out.truncate(output_len);
    out
}

/// Append `src` to `out`, repeated cyclically out to the next multiple
/// of `v` bytes. An empty source contributes nothing (an absent salt
/// or password simply drops out of the feed).
fn fill_cycled(out: &mut Vec<u8>, src: &[u8], v: usize) {
    if src.is_empty() {
        return;
    }
    let target = src.len().div_ceil(v) * v;
    out.extend(src.iter().cycle().take(target));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::password::Password;
    use hex_literal::hex;

    // RFC 7292 Appendix B vectors as published with the "smeg" test
    // password, reproduced across implementations.
    #[test]
    fn sha1_vector_purpose_key() {
        let password = Password::new("smeg");
        let salt = hex!("0A58CF64530D823F");
        let key = derive_sha1(ID_KEY, password.bmp(), &salt, 1, 24);
        assert_eq!(
            key.as_slice(),
            hex!("8AAAE6297B6CB04642AB5B077851284EB7128F1A2A7FBCA3")
        );
    }

    #[test]
    fn sha1_vector_purpose_iv() {
        let password = Password::new("smeg");
        let salt = hex!("0A58CF64530D823F");
        let iv = derive_sha1(ID_IV, password.bmp(), &salt, 1, 8);
        assert_eq!(iv.as_slice(), hex!("79993DFE048D3B76"));
    }

    #[test]
    fn sha1_vector_purpose_mac() {
        let password = Password::new("smeg");
        let salt = hex!("3D83C0E4546AC140");
        let key = derive_sha1(ID_MAC, password.bmp(), &salt, 1, 20);
        assert_eq!(
            key.as_slice(),
            hex!("8D967D88F6CAA9D714800AB3D48051D63F73A312")
        );
    }

    #[test]
    fn purposes_produce_distinct_material() {
        let password = Password::new("test");
        let salt = b"saltsalt";
        let key = derive_sha1(ID_KEY, password.bmp(), salt, 2048, 24);
        let iv = derive_sha1(ID_IV, password.bmp(), salt, 2048, 8);
        let mac = derive_sha1(ID_MAC, password.bmp(), salt, 2048, 20);
        assert_ne!(&key[..8], &iv[..]);
        assert_ne!(&key[..20], &mac[..]);
        assert_ne!(&iv[..], &mac[..8]);
    }

    #[test]
    fn deterministic_across_hashes() {
        let password = Password::new("test");
        let salt = b"saltsalt";
        for (a, b) in [
            (
                derive_sha256(ID_KEY, password.bmp(), salt, 100, 32),
                derive_sha256(ID_KEY, password.bmp(), salt, 100, 32),
            ),
            (
                derive_sm3(ID_KEY, password.bmp(), salt, 100, 32),
                derive_sm3(ID_KEY, password.bmp(), salt, 100, 32),
            ),
        ] {
            assert_eq!(a.len(), 32);
            assert_eq!(a, b);
        }
    }

    #[test]
    fn long_output_spans_blocks() {
        // More than one hash-output block forces the feed-advance path.
        let password = Password::new("block");
        let out = derive_sha1(ID_KEY, password.bmp(), b"12345678", 3, 48);
        assert_eq!(out.len(), 48);
        assert_ne!(&out[..20], &out[20..40]);
    }
}
