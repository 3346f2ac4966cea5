#![forbid(unsafe_code)]

//! The outer PFX envelope and the ContentInfos inside its
//! authenticated safe.
//!
//! PFX ::= SEQUENCE {
//!     version  INTEGER {v3(3)},
//!     authSafe ContentInfo,
//!     macData  MacData OPTIONAL }

use vaxholm_core::oid::{self, oid};
use vaxholm_core::{Error, Result};
use vaxholm_crypto::algid::RawAlgId;
use vaxholm_crypto::mac::MacData;
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, BERReader, DERWriter, Tag};

pub struct Pfx {
    /// Content octets of the authenticated-safe `data` ContentInfo —
    /// exactly the bytes the MAC covers.
    pub auth_safe: Vec<u8>,
    pub mac: Option<MacData>,
}

/// Strict-DER parse of the outer PFX. The authenticated safe must be a
/// `data` ContentInfo; `signedData` (public-key integrity mode) is
/// recognised but not supported.
pub fn parse_pfx(der: &[u8]) -> Result<Pfx> {
    let (version, content_type, content, mac) = yasna::parse_der(der, |r| {
        r.read_sequence(|r| {
            let version = r.next().read_u32()?;
            let (content_type, content) = r.next().read_sequence(|r| {
                let content_type = r.next().read_oid()?;
                let content = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                Ok((content_type, content))
            })?;
            let mac = r.read_optional(MacData::parse)?;
            Ok((version, content_type, content, mac))
        })
    })
    .map_err(|e| Error::malformed("PFX", e))?;

    if version != 3 {
        return Err(Error::Malformed(format!("PFX version {version}")));
    }
    if content_type == oid(oid::SIGNED_DATA) {
        return Err(Error::NotImplemented(
            "signedData authenticated safe".into(),
        ));
    }
    if content_type != oid(oid::DATA) {
        return Err(Error::NotImplemented(format!(
            "authenticated safe content type {content_type}"
        )));
    }
    let auth_safe = yasna::parse_der(&content, |r| r.read_bytes())
        .map_err(|e| Error::malformed("authenticated safe", e))?;
    Ok(Pfx { auth_safe, mac })
}

/// Serialise the outer PFX around finished authenticated-safe octets.
pub fn write_pfx(auth_safe: &[u8], mac: Option<&MacData>) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence(|w| {
            w.next().write_u32(3);
            w.next().write_sequence(|w| {
                w.next().write_oid(&oid(oid::DATA));
                w.next()
                    .write_tagged(Tag::context(0), |w| w.write_bytes(auth_safe));
            });
            if let Some(mac) = mac {
                mac.write(w.next());
            }
        })
    })
}

/// One entry of the AuthenticatedSafe ::= SEQUENCE OF ContentInfo.
pub enum ContentInfo {
    /// Plain SafeContents octets.
    Data(Vec<u8>),
    /// PKCS#7 EncryptedData holding SafeContents under a PBE scheme.
    EncryptedData {
        algorithm: RawAlgId,
        ciphertext: Vec<u8>,
    },
    /// Recognised but unsupported (envelopedData, signedData); the
    /// operation layer reports the OID.
    Other(ObjectIdentifier),
}

impl ContentInfo {
    pub fn parse(r: BERReader) -> std::result::Result<Self, ASN1Error> {
        r.read_sequence(|r| {
            let content_type = r.next().read_oid()?;
            if content_type == oid(oid::DATA) {
                let data = r.next().read_tagged(Tag::context(0), |r| r.read_bytes())?;
                Ok(ContentInfo::Data(data))
            } else if content_type == oid(oid::ENCRYPTED_DATA) {
                // EncryptedData ::= SEQUENCE { version, EncryptedContentInfo }
                r.next().read_tagged(Tag::context(0), |r| {
                    r.read_sequence(|r| {
                        let _version = r.next().read_u32()?;
                        r.next().read_sequence(|r| {
                            let _content_type = r.next().read_oid()?;
                            let algorithm = RawAlgId::parse(r.next())?;
                            let ciphertext = r
                                .next()
                                .read_tagged_implicit(Tag::context(0), |r| r.read_bytes())?;
                            Ok(ContentInfo::EncryptedData {
                                algorithm,
                                ciphertext,
                            })
                        })
                    })
                })
            } else {
                let _ = r.read_optional(|r| r.read_tagged(Tag::context(0), |r| r.read_der()))?;
                Ok(ContentInfo::Other(content_type))
            }
        })
    }

    pub fn write(&self, w: DERWriter) {
        match self {
            ContentInfo::Data(data) => w.write_sequence(|w| {
                w.next().write_oid(&oid(oid::DATA));
                w.next()
                    .write_tagged(Tag::context(0), |w| w.write_bytes(data));
            }),
            ContentInfo::EncryptedData {
                algorithm,
                ciphertext,
            } => w.write_sequence(|w| {
                w.next().write_oid(&oid(oid::ENCRYPTED_DATA));
                w.next().write_tagged(Tag::context(0), |w| {
                    w.write_sequence(|w| {
                        w.next().write_u32(0);
                        w.next().write_sequence(|w| {
                            w.next().write_oid(&oid(oid::DATA));
                            algorithm.write(w.next());
                            w.next().write_tagged_implicit(Tag::context(0), |w| {
                                w.write_bytes(ciphertext)
                            });
                        });
                    })
                });
            }),
            // Never constructed by the encoder.
            ContentInfo::Other(content_type) => w.write_sequence(|w| {
                w.next().write_oid(content_type);
            }),
        }
    }
}

/// Parse the AuthenticatedSafe sequence; trailing bytes are rejected.
pub fn parse_content_infos(der: &[u8]) -> Result<Vec<ContentInfo>> {
    yasna::parse_der(der, |r| r.collect_sequence_of(ContentInfo::parse))
        .map_err(|e| Error::malformed("authenticated safe contents", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pfx_without_mac_roundtrips() {
        let auth_safe = yasna::construct_der(|w| {
            w.write_sequence_of(|w| {
                ContentInfo::Data(b"bags".to_vec()).write(w.next());
            })
        });
        let der = write_pfx(&auth_safe, None);
        let pfx = parse_pfx(&der).unwrap();
        assert!(pfx.mac.is_none());
        let contents = parse_content_infos(&pfx.auth_safe).unwrap();
        assert_eq!(contents.len(), 1);
        match &contents[0] {
            ContentInfo::Data(data) => assert_eq!(data, b"bags"),
            _ => panic!("expected a data ContentInfo"),
        }
    }

    #[test]
    fn wrong_version_rejected() {
        let auth_safe = b"";
        let mut der = write_pfx(auth_safe, None);
        // Patch the INTEGER 3 to 4 (offset: SEQUENCE hdr + INTEGER hdr).
        let pos = der
            .iter()
            .position(|&b| b == 0x03)
            .expect("version byte present");
        der[pos] = 0x04;
        assert!(matches!(parse_pfx(&der), Err(Error::Malformed(_))));
    }

    #[test]
    fn signed_data_reported_not_implemented() {
        let der = yasna::construct_der(|w| {
            w.write_sequence(|w| {
                w.next().write_u32(3);
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(oid::SIGNED_DATA));
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_bytes(b""));
                });
            })
        });
        assert!(matches!(parse_pfx(&der), Err(Error::NotImplemented(_))));
    }

    #[test]
    fn trailing_bytes_after_pfx_rejected() {
        let mut der = write_pfx(b"x", None);
        der.push(0x00);
        assert!(matches!(parse_pfx(&der), Err(Error::Malformed(_))));
    }

    #[test]
    fn enveloped_data_surfaces_as_other() {
        let der = yasna::construct_der(|w| {
            w.write_sequence_of(|w| {
                w.next().write_sequence(|w| {
                    w.next().write_oid(&oid(oid::ENVELOPED_DATA));
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_bytes(b""));
                });
            })
        });
        let contents = parse_content_infos(&der).unwrap();
        assert!(matches!(&contents[0], ContentInfo::Other(o) if *o == oid(oid::ENVELOPED_DATA)));
    }
}
