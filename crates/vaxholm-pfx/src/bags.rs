#![forbid(unsafe_code)]

//! SafeBag parsing and construction.
//!
//! SafeBag ::= SEQUENCE {
//!     bagId         OBJECT IDENTIFIER,
//!     bagValue      [0] EXPLICIT ANY DEFINED BY bagId,
//!     bagAttributes SET OF PKCS12Attribute OPTIONAL }

use vaxholm_core::oid::{self, oid};
use yasna::models::ObjectIdentifier;
use yasna::{ASN1Error, BERReader, DERWriter, Tag};

/// The payload of a SafeBag, dispatched on the bag OID. Encrypted and
/// typed payloads are kept as raw DER here; interpretation (and
/// decryption) happens at the operation layer so that parse errors and
/// wrong-password errors stay distinguishable.
#[derive(Debug, Clone)]
pub enum BagValue {
    /// keyBag: an unencrypted PKCS#8 PrivateKeyInfo.
    Key(Vec<u8>),
    /// pkcs8ShroudedKeyBag: a PKCS#8 EncryptedPrivateKeyInfo.
    ShroudedKey(Vec<u8>),
    /// certBag: certificate type OID plus the wrapped value bytes.
    Cert {
        cert_type: ObjectIdentifier,
        value: Vec<u8>,
    },
    /// secretBag: secret type OID plus the wrapped value bytes.
    Secret {
        secret_type: ObjectIdentifier,
        value: Vec<u8>,
    },
    /// crlBag, kept raw; recognised but rarely populated.
    Crl(Vec<u8>),
    /// A bag type outside RFC 7292; skipped by every operation.
    Other(ObjectIdentifier),
}

/// A bag attribute. Unknown attribute types are dropped during parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BagAttribute {
    FriendlyName(String),
    LocalKeyId(Vec<u8>),
    /// Java keytool's trust marker; the value names the permitted key
    /// usage (in practice always anyExtendedKeyUsage).
    TrustedKeyUsage(ObjectIdentifier),
}

impl BagAttribute {
    fn parse(r: BERReader) -> Result<Option<Self>, ASN1Error> {
        r.read_sequence(|r| {
            let attr_oid = r.next().read_oid()?;
            if attr_oid == oid(oid::FRIENDLY_NAME) {
                let names = r.next().collect_set_of(|r| r.read_bmp_string())?;
                Ok(names.into_iter().next().map(BagAttribute::FriendlyName))
            } else if attr_oid == oid(oid::LOCAL_KEY_ID) {
                let ids = r.next().collect_set_of(|r| r.read_bytes())?;
                Ok(ids.into_iter().next().map(BagAttribute::LocalKeyId))
            } else if attr_oid == oid(oid::JAVA_TRUSTED_KEY_USAGE) {
                let usages = r.next().collect_set_of(|r| r.read_oid())?;
                Ok(usages.into_iter().next().map(BagAttribute::TrustedKeyUsage))
            } else {
                let _ = r.next().read_der()?;
                Ok(None)
            }
        })
    }

    fn write(&self, w: DERWriter) {
        w.write_sequence(|w| match self {
            BagAttribute::FriendlyName(name) => {
                w.next().write_oid(&oid(oid::FRIENDLY_NAME));
                w.next().write_set(|w| {
                    w.next().write_bmp_string(name);
                });
            }
            BagAttribute::LocalKeyId(id) => {
                w.next().write_oid(&oid(oid::LOCAL_KEY_ID));
                w.next().write_set(|w| {
                    w.next().write_bytes(id);
                });
            }
            BagAttribute::TrustedKeyUsage(usage) => {
                w.next().write_oid(&oid(oid::JAVA_TRUSTED_KEY_USAGE));
                w.next().write_set(|w| {
                    w.next().write_oid(usage);
                });
            }
        })
    }
}

#[derive(Debug, Clone)]
pub struct SafeBag {
    pub value: BagValue,
    pub attributes: Vec<BagAttribute>,
}

impl SafeBag {
    pub fn new(value: BagValue) -> Self {
        SafeBag {
            value,
            attributes: Vec::new(),
        }
    }

    pub fn with_attributes(value: BagValue, attributes: Vec<BagAttribute>) -> Self {
        SafeBag { value, attributes }
    }

    pub fn local_key_id(&self) -> Option<&[u8]> {
        self.attributes.iter().find_map(|a| match a {
            BagAttribute::LocalKeyId(id) => Some(id.as_slice()),
            _ => None,
        })
    }

    pub fn friendly_name(&self) -> Option<&str> {
        self.attributes.iter().find_map(|a| match a {
            BagAttribute::FriendlyName(name) => Some(name.as_str()),
            _ => None,
        })
    }

    pub fn parse(r: BERReader) -> Result<Self, ASN1Error> {
        r.read_sequence(|r| {
            let bag_id = r.next().read_oid()?;

            let value = if bag_id == oid(oid::KEY_BAG) {
                let der = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                BagValue::Key(der)
            } else if bag_id == oid(oid::PKCS8_SHROUDED_KEY_BAG) {
                let der = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                BagValue::ShroudedKey(der)
            } else if bag_id == oid(oid::CERT_BAG) {
                // CertBag ::= SEQUENCE { certId OID, certValue [0] EXPLICIT ANY }
                let (cert_type, value) = r.next().read_tagged(Tag::context(0), |r| {
                    r.read_sequence(|r| {
                        let cert_type = r.next().read_oid()?;
                        let value = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                        Ok((cert_type, value))
                    })
                })?;
                BagValue::Cert { cert_type, value }
            } else if bag_id == oid(oid::SECRET_BAG) {
                // SecretBag ::= SEQUENCE { secretTypeId OID, secretValue [0] EXPLICIT ANY }
                let (secret_type, value) = r.next().read_tagged(Tag::context(0), |r| {
                    r.read_sequence(|r| {
                        let secret_type = r.next().read_oid()?;
                        let value = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                        Ok((secret_type, value))
                    })
                })?;
                BagValue::Secret { secret_type, value }
            } else if bag_id == oid(oid::CRL_BAG) {
                let der = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                BagValue::Crl(der)
            } else {
                let _ = r.next().read_tagged(Tag::context(0), |r| r.read_der())?;
                BagValue::Other(bag_id)
            };

            let mut attributes = Vec::new();
            r.read_optional(|r| {
                r.read_set_of(|r| {
                    if let Some(attr) = BagAttribute::parse(r)? {
                        attributes.push(attr);
                    }
                    Ok(())
                })
            })?;

            Ok(SafeBag { value, attributes })
        })
    }

    pub fn write(&self, w: DERWriter) {
        w.write_sequence(|w| {
            match &self.value {
                BagValue::Key(der) => {
                    w.next().write_oid(&oid(oid::KEY_BAG));
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_der(der));
                }
                BagValue::ShroudedKey(der) => {
                    w.next().write_oid(&oid(oid::PKCS8_SHROUDED_KEY_BAG));
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_der(der));
                }
                BagValue::Cert { cert_type, value } => {
                    w.next().write_oid(&oid(oid::CERT_BAG));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_sequence(|w| {
                            w.next().write_oid(cert_type);
                            w.next()
                                .write_tagged(Tag::context(0), |w| w.write_der(value));
                        })
                    });
                }
                BagValue::Secret { secret_type, value } => {
                    w.next().write_oid(&oid(oid::SECRET_BAG));
                    w.next().write_tagged(Tag::context(0), |w| {
                        w.write_sequence(|w| {
                            w.next().write_oid(secret_type);
                            w.next()
                                .write_tagged(Tag::context(0), |w| w.write_der(value));
                        })
                    });
                }
                BagValue::Crl(der) => {
                    w.next().write_oid(&oid(oid::CRL_BAG));
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_der(der));
                }
                BagValue::Other(bag_id) => {
                    w.next().write_oid(bag_id);
                    w.next()
                        .write_tagged(Tag::context(0), |w| w.write_null());
                }
            }
            if !self.attributes.is_empty() {
                w.next().write_set_of(|w| {
                    for attribute in &self.attributes {
                        attribute.write(w.next());
                    }
                });
            }
        })
    }
}

/// Build a cert bag wrapping a DER certificate.
pub fn x509_cert_bag(cert_der: &[u8], attributes: Vec<BagAttribute>) -> SafeBag {
    SafeBag::with_attributes(
        BagValue::Cert {
            cert_type: oid(oid::X509_CERTIFICATE),
            value: yasna::construct_der(|w| w.write_bytes(cert_der)),
        },
        attributes,
    )
}

/// Unwrap the OCTET STRING inside a cert bag value.
pub fn x509_cert_der(value: &[u8]) -> Result<Vec<u8>, ASN1Error> {
    yasna::parse_der(value, |r| r.read_bytes())
}

/// Serialise a SafeContents (SEQUENCE OF SafeBag).
pub fn write_safe_contents(bags: &[SafeBag]) -> Vec<u8> {
    yasna::construct_der(|w| {
        w.write_sequence_of(|w| {
            for bag in bags {
                bag.write(w.next());
            }
        })
    })
}

/// Parse a SafeContents buffer; trailing bytes are rejected.
pub fn parse_safe_contents(der: &[u8]) -> Result<Vec<SafeBag>, ASN1Error> {
    yasna::parse_der(der, |r| r.collect_sequence_of(SafeBag::parse))
}
