#![forbid(unsafe_code)]

//! The decode-side public operations: strict single-pair decode, chain
//! decode, trust-store decode and PEM transcoding.

use vaxholm_core::oid::{self, oid};
use vaxholm_core::{Error, Result};
use vaxholm_crypto::{mac, suites, Password};
use vaxholm_keys::pkcs8;
use vaxholm_keys::PrivateKey;
use x509_cert::Certificate;
use zeroize::Zeroizing;

use crate::bags::{self, BagValue, SafeBag};
use crate::cert;
use crate::envelope::{self, ContentInfo};

/// Decode a PFX holding exactly one private key and one certificate.
/// Additional chain certificates are a structural error; use
/// [`decode_chain`] for those.
pub fn decode(pfx_der: &[u8], password: &str) -> Result<(PrivateKey, Certificate)> {
    let (key, leaf, ca_certs) = decode_chain(pfx_der, password)?;
    if !ca_certs.is_empty() {
        return Err(Error::Structure(
            "expected exactly one certificate bag".into(),
        ));
    }
    Ok((key, leaf))
}

/// Decode a PFX holding one private key, the matching leaf certificate
/// and any number of chain certificates. The leaf is the certificate
/// whose local-key-id equals the key bag's (both absent also matches),
/// and its SubjectPublicKeyInfo must equal the key's public component.
pub fn decode_chain(
    pfx_der: &[u8],
    password: &str,
) -> Result<(PrivateKey, Certificate, Vec<Certificate>)> {
    let (all_bags, password) = extract_bags(pfx_der, Password::new(password))?;

    let mut key: Option<(PrivateKey, Option<Vec<u8>>)> = None;
    for bag in &all_bags {
        let parsed = match &bag.value {
            BagValue::Key(der) => Some(pkcs8::parse_private_key(der)?),
            BagValue::ShroudedKey(der) => {
                let plaintext = pkcs8::decrypt_encrypted_private_key_info(der, &password)?;
                Some(pkcs8::parse_private_key(&plaintext)?)
            }
            _ => None,
        };
        if let Some(parsed) = parsed {
            if key.is_some() {
                return Err(Error::Structure("more than one private key".into()));
            }
            key = Some((parsed, bag.local_key_id().map(<[u8]>::to_vec)));
        }
    }
    let (key, key_id) = key.ok_or_else(|| Error::Structure("private key missing".into()))?;

    let mut leaf: Option<Certificate> = None;
    let mut ca_certs = Vec::new();
    for bag in &all_bags {
        if let BagValue::Cert { .. } = &bag.value {
            let certificate = cert_from_bag(bag)?;
            if bag.local_key_id().map(<[u8]>::to_vec) == key_id {
                if leaf.is_some() {
                    return Err(Error::Structure(
                        "multiple certificates match the private key".into(),
                    ));
                }
                leaf = Some(certificate);
            } else {
                ca_certs.push(certificate);
            }
        }
    }
    let leaf = leaf.ok_or_else(|| Error::Structure("leaf certificate missing".into()))?;
    if key.public_key_der()? != cert::subject_public_key_info_der(&leaf)? {
        return Err(Error::Structure(
            "leaf certificate public key does not match the private key".into(),
        ));
    }
    Ok((key, leaf, ca_certs))
}

/// Decode a trust store: certificate bags (bare or carrying the Java
/// trustedKeyUsage attribute) and the secret-bag dialect. Key material
/// is a structural error.
pub fn decode_trust_store(pfx_der: &[u8], password: &str) -> Result<Vec<Certificate>> {
    let (all_bags, _) = extract_bags(pfx_der, Password::new(password))?;
    let mut certs = Vec::new();
    for bag in all_bags {
        match &bag.value {
            BagValue::Cert { .. } => certs.push(cert_from_bag(&bag)?),
            BagValue::Secret { secret_type, value } => {
                if *secret_type == oid(oid::JAVA_TRUSTED_KEY_USAGE)
                    || *secret_type == oid(oid::X509_CERTIFICATE)
                {
                    let der = bags::x509_cert_der(value)
                        .map_err(|e| Error::malformed("secret bag", e))?;
                    certs.push(cert::parse_certificate(&der)?);
                } else {
                    return Err(Error::NotImplemented(format!("secret type {secret_type}")));
                }
            }
            _ => {
                return Err(Error::Structure("expected only certificate bags".into()));
            }
        }
    }
    Ok(certs)
}

/// Decrypt everything and re-emit each bag as a PEM block, carrying
/// the local-key-id (hex) and friendly name as armor headers.
pub fn to_pem(pfx_der: &[u8], password: &str) -> Result<Vec<pem::Pem>> {
    let (all_bags, password) = extract_bags(pfx_der, Password::new(password))?;
    let mut blocks = Vec::new();
    for bag in all_bags {
        let block = match &bag.value {
            BagValue::Cert { .. } => {
                let certificate = cert_from_bag(&bag)?;
                Some(pem_block(
                    "CERTIFICATE",
                    cert::certificate_der(&certificate)?,
                    &bag,
                )?)
            }
            BagValue::Key(der) => Some(pem_block("PRIVATE KEY", der.clone(), &bag)?),
            BagValue::ShroudedKey(der) => {
                let plaintext = pkcs8::decrypt_encrypted_private_key_info(der, &password)?;
                Some(pem_block("PRIVATE KEY", plaintext.to_vec(), &bag)?)
            }
            _ => None,
        };
        blocks.extend(block);
    }
    Ok(blocks)
}

/// Extract every SafeBag: verify the MAC, then walk the authenticated
/// safe, decrypting encrypted ContentInfos with the suite registry.
///
/// Returns the effective password alongside the bags: the empty
/// password exists in two wire encodings (BMP terminator alone, or an
/// empty byte string), and whichever form the MAC accepts must also be
/// the one used for the remaining decryption work.
pub(crate) fn extract_bags(
    pfx_der: &[u8],
    password: Password,
) -> Result<(Vec<SafeBag>, Password)> {
    let pfx = envelope::parse_pfx(pfx_der)?;

    let password = match &pfx.mac {
        Some(mac_data) => match mac::verify_mac(mac_data, &pfx.auth_safe, &password) {
            Ok(()) => password,
            Err(Error::IncorrectPassword) => match password.empty_alternate() {
                Some(alternate) => {
                    mac::verify_mac(mac_data, &pfx.auth_safe, &alternate)?;
                    alternate
                }
                None => return Err(Error::IncorrectPassword),
            },
            Err(e) => return Err(e),
        },
        None if password.is_empty() => password,
        None => return Err(Error::Structure("no MAC present".into())),
    };

    let mut all = Vec::new();
    for content in envelope::parse_content_infos(&pfx.auth_safe)? {
        let safe_contents: Zeroizing<Vec<u8>> = match content {
            ContentInfo::Data(data) => Zeroizing::new(data),
            ContentInfo::EncryptedData {
                algorithm,
                ciphertext,
            } => suites::decrypt(&algorithm, &password, &ciphertext)?,
            ContentInfo::Other(content_type) => {
                return Err(Error::NotImplemented(format!(
                    "content type {content_type}"
                )));
            }
        };
        let parsed = bags::parse_safe_contents(&safe_contents)
            .map_err(|e| Error::malformed("SafeContents", e))?;
        all.extend(parsed);
    }
    Ok((all, password))
}

fn cert_from_bag(bag: &SafeBag) -> Result<Certificate> {
    match &bag.value {
        BagValue::Cert { cert_type, value } => {
            if *cert_type != oid(oid::X509_CERTIFICATE) {
                return Err(Error::NotImplemented(format!(
                    "certificate type {cert_type}"
                )));
            }
            let der = bags::x509_cert_der(value).map_err(|e| Error::malformed("cert bag", e))?;
            cert::parse_certificate(&der)
        }
        _ => Err(Error::Structure("not a certificate bag".into())),
    }
}

fn pem_block(tag: &str, contents: Vec<u8>, bag: &SafeBag) -> Result<pem::Pem> {
    let mut block = pem::Pem::new(tag, contents);
    if let Some(id) = bag.local_key_id() {
        block
            .headers_mut()
            .add("localKeyId", &hex::encode(id))
            .map_err(|e| Error::Structure(format!("PEM header: {e}")))?;
    }
    if let Some(name) = bag.friendly_name() {
        block
            .headers_mut()
            .add("friendlyName", name)
            .map_err(|e| Error::Structure(format!("PEM header: {e}")))?;
    }
    Ok(block)
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine;

    // PFX exported by old Windows Azure tooling; encrypted under the
    // empty password with the RC2-40/3DES legacy suites.
    const AZURE_TOOLS_B64: &str = include_str!("../../../test-data/azure-tools.b64");
    // OpenSSL-produced PFX, also under the empty password.
    const TESTING_EXAMPLE_B64: &str = include_str!("../../../test-data/testing-example-com.b64");
    // Windows certmgr export: PBES2, PBKDF2, AES-256-CBC, iteration
    // 2000, PRF hmacWithSHA256. Password "password".
    const STANDALONE_B64: &str = include_str!("../../../test-data/pbes2-aes256-standalone.b64");
    // PBES2/AES-128-CBC, iteration 2048, PRF hmacWithSHA256.
    const AES128_B64: &str = include_str!("../../../test-data/pbes2-aes128-example-com.b64");
    // PBES2/AES-192-CBC, iteration 2048, PRF hmacWithSHA256.
    const AES192_B64: &str = include_str!("../../../test-data/pbes2-aes192-example-com.b64");

    fn b64(data: &str) -> Vec<u8> {
        let compact: String = data.split_whitespace().collect();
        base64::engine::general_purpose::STANDARD
            .decode(compact)
            .expect("valid base64 test vector")
    }

    fn assert_key_matches_cert(key: &PrivateKey, leaf: &Certificate) {
        assert_eq!(
            key.public_key_der().unwrap(),
            cert::subject_public_key_info_der(leaf).unwrap()
        );
    }

    #[test]
    fn decodes_azure_tools_pfx_with_empty_password() {
        let (key, leaf) = decode(&b64(AZURE_TOOLS_B64), "").unwrap();
        assert!(matches!(key, PrivateKey::Rsa(_)));
        assert_eq!(
            cert::subject_common_name(&leaf).as_deref(),
            Some("Windows Azure Tools")
        );
        assert_key_matches_cert(&key, &leaf);
    }

    #[test]
    fn decodes_testing_example_com_pfx() {
        let (key, leaf) = decode(&b64(TESTING_EXAMPLE_B64), "").unwrap();
        assert!(matches!(key, PrivateKey::Rsa(_)));
        assert_eq!(
            cert::subject_common_name(&leaf).as_deref(),
            Some("testing@example.com")
        );
    }

    #[test]
    fn decodes_pbes2_aes256_pfx() {
        let (key, leaf, ca_certs) = decode_chain(&b64(STANDALONE_B64), "password").unwrap();
        assert!(matches!(key, PrivateKey::Rsa(_)));
        assert_eq!(
            cert::subject_common_name(&leaf).as_deref(),
            Some("*.ad.standalone.com")
        );
        assert!(ca_certs.is_empty());
        assert_key_matches_cert(&key, &leaf);
    }

    #[test]
    fn decodes_pbes2_aes128_pfx() {
        let (key, leaf, ca_certs) =
            decode_chain(&b64(AES128_B64), "rHyQTJsubhfxcpH5JttyilHE6BBsNoZp").unwrap();
        assert_eq!(
            cert::subject_common_name(&leaf).as_deref(),
            Some("example-com")
        );
        assert!(ca_certs.is_empty());
        assert_key_matches_cert(&key, &leaf);
    }

    #[test]
    fn decodes_pbes2_aes192_pfx() {
        let (key, leaf, ca_certs) = decode_chain(&b64(AES192_B64), "password").unwrap();
        assert_eq!(
            cert::subject_common_name(&leaf).as_deref(),
            Some("example-com")
        );
        assert!(ca_certs.is_empty());
        assert_key_matches_cert(&key, &leaf);
    }

    #[test]
    fn wrong_password_is_incorrect_password() {
        assert!(matches!(
            decode(&b64(STANDALONE_B64), "not the password"),
            Err(Error::IncorrectPassword)
        ));
    }

    #[test]
    fn trailing_byte_is_malformed() {
        let mut der = b64(AZURE_TOOLS_B64);
        der.push(0x00);
        assert!(matches!(decode(&der, ""), Err(Error::Malformed(_))));
    }

    #[test]
    fn truncated_input_is_malformed() {
        let der = b64(AZURE_TOOLS_B64);
        assert!(matches!(
            decode(&der[..der.len() - 1], ""),
            Err(Error::Malformed(_))
        ));
    }

    #[test]
    fn to_pem_emits_key_and_cert_blocks() {
        let blocks = to_pem(&b64(AZURE_TOOLS_B64), "").unwrap();
        let tags: Vec<&str> = blocks.iter().map(|b| b.tag()).collect();
        assert!(tags.contains(&"CERTIFICATE"));
        assert!(tags.contains(&"PRIVATE KEY"));
        for block in &blocks {
            // Both bags in this file carry the same local key id.
            let id = block.headers().get("localKeyId").expect("localKeyId header");
            assert!(!id.is_empty());
            assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
        }
        // The key block must reparse as PKCS#8.
        let key_block = blocks.iter().find(|b| b.tag() == "PRIVATE KEY").unwrap();
        pkcs8::parse_private_key(key_block.contents()).unwrap();
    }

    #[test]
    fn trust_store_rejects_key_material() {
        assert!(matches!(
            decode_trust_store(&b64(AZURE_TOOLS_B64), ""),
            Err(Error::Structure(_))
        ));
    }
}
