//! Certificate and CRL extensions.
//!
//! Extensions are kept as decoded `(oid, critical, value)` triples in an [`ExtensionSet`],
//! preserving their encoding order. The `value` is the raw content of the `extnValue` OCTET
//! STRING; typed views decode it on demand through the [`ExtensionType`] trait, so an extension
//! the crate does not understand never prevents a certificate from loading.
//!
//! # Key Components
//!
//! - [`Extension`] / [`ExtensionSet`] - The generic triple model with lookup by OID
//! - [`SubjectKeyIdentifier`], [`AuthorityKeyIdentifier`] - Key identifiers used for chain
//!   building and store file names
//! - [`BasicConstraints`], [`KeyUsage`], [`ExtendedKeyUsage`] - Usage restrictions
//! - [`SubjectAltName`] / [`GeneralName`] - Alternative subject identities
//!
//! # Examples
//!
//! ```rust,no_run
//! use certscope::x509::{extensions::BasicConstraints, oid, Certificate};
//! use std::path::Path;
//!
//! let cert = Certificate::from_file(Path::new("tests/samples/root_rsa.cer"))?;
//! let extension = cert.extensions().get(oid::BASIC_CONSTRAINTS).unwrap();
//! assert!(extension.critical);
//!
//! let constraints = cert.extensions().typed::<BasicConstraints>()?.unwrap();
//! assert!(constraints.ca);
//! # Ok::<(), certscope::Error>(())
//! ```

use std::net::IpAddr;

use bitflags::bitflags;

use crate::{
    x509::{
        asn1::{self, tag, Element},
        name::DistinguishedName,
        oid,
    },
    Result,
};

/// A single extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Extension {
    /// Dotted extension OID
    pub oid: String,
    /// Whether a relying party must understand the extension
    pub critical: bool,
    /// Content of the `extnValue` OCTET STRING
    pub value: Vec<u8>,
}

/// Ordered, read-only collection of extensions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionSet {
    extensions: Vec<Extension>,
}

impl ExtensionSet {
    /// Decodes `Extensions ::= SEQUENCE OF Extension`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a structurally invalid extension.
    pub fn decode(element: &Element<'_>) -> Result<ExtensionSet> {
        element.expect(tag::SEQUENCE)?;

        let mut extensions = Vec::new();
        for entry in element.children()? {
            entry.expect(tag::SEQUENCE)?;
            let mut reader = entry.reader();

            let oid = reader.read_tagged(tag::OID)?.as_oid()?;
            let critical = match reader.read_optional(tag::BOOLEAN)? {
                Some(flag) => flag.as_bool()?,
                None => false,
            };
            let value = reader.read_tagged(tag::OCTET_STRING)?.content.to_vec();
            reader.finish()?;

            extensions.push(Extension {
                oid,
                critical,
                value,
            });
        }

        Ok(ExtensionSet { extensions })
    }

    /// Looks up an extension by exact OID.
    #[must_use]
    pub fn get(&self, oid: &str) -> Option<&Extension> {
        self.extensions.iter().find(|extension| extension.oid == oid)
    }

    /// Decodes the typed view of an extension, if present.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the extension is present but its value is invalid.
    pub fn typed<T: ExtensionType>(&self) -> Result<Option<T>> {
        self.get(T::OID)
            .map(|extension| T::decode(&extension.value))
            .transpose()
    }

    /// Iterates the extensions in encoding order.
    pub fn iter(&self) -> impl Iterator<Item = &Extension> {
        self.extensions.iter()
    }

    /// Number of extensions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.extensions.len()
    }

    /// True if there are no extensions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.extensions.is_empty()
    }
}

impl<'a> IntoIterator for &'a ExtensionSet {
    type Item = &'a Extension;
    type IntoIter = std::slice::Iter<'a, Extension>;

    fn into_iter(self) -> Self::IntoIter {
        self.extensions.iter()
    }
}

/// A typed extension value.
pub trait ExtensionType: Sized {
    /// OID the extension is registered under
    const OID: &'static str;

    /// Decodes the content of the `extnValue` OCTET STRING.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for an invalid value.
    fn decode(value: &[u8]) -> Result<Self>;
}

/// Subject Key Identifier (2.5.29.14).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectKeyIdentifier(pub Vec<u8>);

impl ExtensionType for SubjectKeyIdentifier {
    const OID: &'static str = oid::SUBJECT_KEY_IDENTIFIER;

    fn decode(value: &[u8]) -> Result<Self> {
        Ok(SubjectKeyIdentifier(
            asn1::decode(value)?.as_octet_string()?.to_vec(),
        ))
    }
}

/// Authority Key Identifier (2.5.29.35).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthorityKeyIdentifier {
    /// `[0] keyIdentifier`, matching the issuer's SKI
    pub key_identifier: Option<Vec<u8>>,
    /// `[1] authorityCertIssuer`, the directory names of the issuer's issuer
    pub issuer: Vec<DistinguishedName>,
    /// `[2] authorityCertSerialNumber`, big-endian as encoded
    pub serial: Option<Vec<u8>>,
}

impl ExtensionType for AuthorityKeyIdentifier {
    const OID: &'static str = oid::AUTHORITY_KEY_IDENTIFIER;

    fn decode(value: &[u8]) -> Result<Self> {
        let sequence = asn1::decode(value)?;
        sequence.expect(tag::SEQUENCE)?;

        let mut aki = AuthorityKeyIdentifier::default();
        for field in sequence.children()? {
            match field.tag {
                t if t == tag::context_primitive(0) => {
                    aki.key_identifier = Some(field.content.to_vec());
                }
                t if t == tag::context(1) => {
                    let names = GeneralName::decode_all(field.content)?;
                    aki.issuer = names
                        .into_iter()
                        .filter_map(|name| match name {
                            GeneralName::Directory(dn) => Some(dn),
                            _ => None,
                        })
                        .collect();
                }
                t if t == tag::context_primitive(2) => {
                    aki.serial = Some(field.content.to_vec());
                }
                other => {
                    return Err(malformed_error!(
                        "Unexpected AuthorityKeyIdentifier field 0x{:02X}",
                        other
                    ));
                }
            }
        }
        Ok(aki)
    }
}

/// Basic Constraints (2.5.29.19).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BasicConstraints {
    /// The subject is a certificate authority
    pub ca: bool,
    /// Maximum number of intermediate CAs below this one
    pub path_len: Option<u32>,
}

impl ExtensionType for BasicConstraints {
    const OID: &'static str = oid::BASIC_CONSTRAINTS;

    fn decode(value: &[u8]) -> Result<Self> {
        let sequence = asn1::decode(value)?;
        sequence.expect(tag::SEQUENCE)?;

        let mut reader = sequence.reader();
        let ca = match reader.read_optional(tag::BOOLEAN)? {
            Some(flag) => flag.as_bool()?,
            None => false,
        };
        let path_len = match reader.read_optional(tag::INTEGER)? {
            Some(len) => Some(
                u32::try_from(len.as_u64()?)
                    .map_err(|_| malformed_error!("pathLenConstraint out of range"))?,
            ),
            None => None,
        };
        reader.finish()?;

        Ok(BasicConstraints { ca, path_len })
    }
}

bitflags! {
    /// Key Usage (2.5.29.15) bits.
    ///
    /// The first BIT STRING octet maps onto the low byte, named bit 0 being the most significant
    /// bit; `decipherOnly` lives in the second octet.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct KeyUsage: u32 {
        /// digitalSignature
        const DIGITAL_SIGNATURE = 0x80;
        /// nonRepudiation (contentCommitment)
        const NON_REPUDIATION = 0x40;
        /// keyEncipherment
        const KEY_ENCIPHERMENT = 0x20;
        /// dataEncipherment
        const DATA_ENCIPHERMENT = 0x10;
        /// keyAgreement
        const KEY_AGREEMENT = 0x08;
        /// keyCertSign
        const KEY_CERT_SIGN = 0x04;
        /// cRLSign
        const CRL_SIGN = 0x02;
        /// encipherOnly
        const ENCIPHER_ONLY = 0x01;
        /// decipherOnly
        const DECIPHER_ONLY = 0x8000;
    }
}

impl ExtensionType for KeyUsage {
    const OID: &'static str = oid::KEY_USAGE;

    fn decode(value: &[u8]) -> Result<Self> {
        let bits = asn1::decode(value)?.as_bit_string()?;
        let low = bits.first().copied().map_or(0, u32::from);
        let high = bits.get(1).copied().map_or(0, u32::from);
        Ok(KeyUsage::from_bits_truncate(low | (high << 8)))
    }
}

/// Extended Key Usage (2.5.29.37): the list of permitted purpose OIDs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtendedKeyUsage(pub Vec<String>);

impl ExtendedKeyUsage {
    /// TLS server authentication
    pub const SERVER_AUTH: &'static str = "1.3.6.1.5.5.7.3.1";
    /// TLS client authentication
    pub const CLIENT_AUTH: &'static str = "1.3.6.1.5.5.7.3.2";
    /// Code signing
    pub const CODE_SIGNING: &'static str = "1.3.6.1.5.5.7.3.3";
    /// Email protection
    pub const EMAIL_PROTECTION: &'static str = "1.3.6.1.5.5.7.3.4";

    /// True if `purpose` is listed.
    #[must_use]
    pub fn contains(&self, purpose: &str) -> bool {
        self.0.iter().any(|oid| oid == purpose)
    }
}

impl ExtensionType for ExtendedKeyUsage {
    const OID: &'static str = oid::EXTENDED_KEY_USAGE;

    fn decode(value: &[u8]) -> Result<Self> {
        let sequence = asn1::decode(value)?;
        sequence.expect(tag::SEQUENCE)?;
        let purposes = sequence
            .children()?
            .iter()
            .map(Element::as_oid)
            .collect::<Result<Vec<_>>>()?;
        Ok(ExtendedKeyUsage(purposes))
    }
}

/// One entry of a `GeneralNames` sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GeneralName {
    /// `[1] rfc822Name`
    Email(String),
    /// `[2] dNSName`
    Dns(String),
    /// `[4] directoryName`
    Directory(DistinguishedName),
    /// `[6] uniformResourceIdentifier`
    Uri(String),
    /// `[7] iPAddress`
    Ip(IpAddr),
    /// Any other choice, with its tag and raw content
    Other(u8, Vec<u8>),
}

impl GeneralName {
    fn decode_all(data: &[u8]) -> Result<Vec<GeneralName>> {
        let mut reader = asn1::DerReader::new(data);
        let mut names = Vec::new();
        while reader.has_more() {
            names.push(GeneralName::decode(&reader.read()?)?);
        }
        Ok(names)
    }

    fn decode(element: &Element<'_>) -> Result<GeneralName> {
        let text = || String::from_utf8_lossy(element.content).into_owned();
        Ok(match element.tag {
            0x81 => GeneralName::Email(text()),
            0x82 => GeneralName::Dns(text()),
            0xA4 => GeneralName::Directory(DistinguishedName::decode(&element.unwrap_explicit()?)?),
            0x86 => GeneralName::Uri(text()),
            0x87 => match element.content.len() {
                4 => {
                    let octets: [u8; 4] = element
                        .content
                        .try_into()
                        .map_err(|_| malformed_error!("Invalid IPv4 address"))?;
                    GeneralName::Ip(IpAddr::from(octets))
                }
                16 => {
                    let octets: [u8; 16] = element
                        .content
                        .try_into()
                        .map_err(|_| malformed_error!("Invalid IPv6 address"))?;
                    GeneralName::Ip(IpAddr::from(octets))
                }
                len => return Err(malformed_error!("IP address of {} bytes", len)),
            },
            other => GeneralName::Other(other, element.content.to_vec()),
        })
    }
}

/// Subject Alternative Name (2.5.29.17).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubjectAltName(pub Vec<GeneralName>);

impl SubjectAltName {
    /// DNS names, in encoding order.
    pub fn dns_names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|name| match name {
            GeneralName::Dns(dns) => Some(dns.as_str()),
            _ => None,
        })
    }

    /// Email addresses, in encoding order.
    pub fn emails(&self) -> impl Iterator<Item = &str> {
        self.0.iter().filter_map(|name| match name {
            GeneralName::Email(email) => Some(email.as_str()),
            _ => None,
        })
    }
}

impl ExtensionType for SubjectAltName {
    const OID: &'static str = oid::SUBJECT_ALT_NAME;

    fn decode(value: &[u8]) -> Result<Self> {
        let sequence = asn1::decode(value)?;
        sequence.expect(tag::SEQUENCE)?;
        Ok(SubjectAltName(GeneralName::decode_all(sequence.content)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::asn1::{encode, encode_oid, encode_sequence};

    fn extension(oid: &str, critical: bool, value: &[u8]) -> Vec<u8> {
        let oid = encode_oid(oid).unwrap();
        let value = encode(tag::OCTET_STRING, value);
        if critical {
            encode_sequence(&[&oid, &[0x01, 0x01, 0xFF], &value])
        } else {
            encode_sequence(&[&oid, &value])
        }
    }

    fn set(extensions: &[Vec<u8>]) -> ExtensionSet {
        let der = encode(tag::SEQUENCE, &extensions.concat());
        ExtensionSet::decode(&asn1::decode(&der).unwrap()).unwrap()
    }

    #[test]
    fn lookup_by_exact_oid() {
        let ski_value = encode(tag::OCTET_STRING, &[0xA6, 0x4D, 0x20]);
        let extensions = set(&[extension(oid::SUBJECT_KEY_IDENTIFIER, false, &ski_value)]);

        assert_eq!(extensions.len(), 1);
        let found = extensions.get("2.5.29.14").unwrap();
        assert!(!found.critical);
        assert_eq!(found.value, ski_value);
        assert!(extensions.get("2.5.29.15").is_none());
        assert!(extensions.get("2.5.29.1").is_none());

        let ski = extensions.typed::<SubjectKeyIdentifier>().unwrap().unwrap();
        assert_eq!(ski.0, vec![0xA6, 0x4D, 0x20]);
        assert!(extensions.typed::<BasicConstraints>().unwrap().is_none());
    }

    #[test]
    fn basic_constraints() {
        let ca = BasicConstraints::decode(&[0x30, 0x06, 0x01, 0x01, 0xFF, 0x02, 0x01, 0x00]).unwrap();
        assert_eq!(
            ca,
            BasicConstraints {
                ca: true,
                path_len: Some(0)
            }
        );

        let end_entity = BasicConstraints::decode(&[0x30, 0x00]).unwrap();
        assert!(!end_entity.ca);
        assert_eq!(end_entity.path_len, None);

        assert!(BasicConstraints::decode(&[0x30, 0x03, 0x02, 0x01, 0x05, 0x00]).is_err());
    }

    #[test]
    fn key_usage_bits() {
        // digitalSignature + keyEncipherment
        let usage = KeyUsage::decode(&[0x03, 0x02, 0x05, 0xA0]).unwrap();
        assert_eq!(usage, KeyUsage::DIGITAL_SIGNATURE | KeyUsage::KEY_ENCIPHERMENT);

        // keyCertSign + cRLSign
        let usage = KeyUsage::decode(&[0x03, 0x02, 0x01, 0x06]).unwrap();
        assert!(usage.contains(KeyUsage::KEY_CERT_SIGN | KeyUsage::CRL_SIGN));

        // decipherOnly in the second octet
        let usage = KeyUsage::decode(&[0x03, 0x03, 0x07, 0x00, 0x80]).unwrap();
        assert_eq!(usage, KeyUsage::DECIPHER_ONLY);
    }

    #[test]
    fn authority_key_identifier() {
        let value = [
            0x30, 0x07, 0x80, 0x02, 0x1F, 0xDB, 0x82, 0x01, 0x02,
        ];
        let aki = AuthorityKeyIdentifier::decode(&value).unwrap();
        assert_eq!(aki.key_identifier, Some(vec![0x1F, 0xDB]));
        assert_eq!(aki.serial, Some(vec![0x02]));
        assert!(aki.issuer.is_empty());
    }

    #[test]
    fn alt_names_and_eku() {
        let san = encode_sequence(&[
            &encode(0x82, b"leaf.certscope.test"),
            &encode(0x81, b"admin@certscope.test"),
            &encode(0x87, &[127, 0, 0, 1]),
        ]);
        let san = SubjectAltName::decode(&san).unwrap();
        assert_eq!(san.dns_names().collect::<Vec<_>>(), vec!["leaf.certscope.test"]);
        assert_eq!(san.emails().collect::<Vec<_>>(), vec!["admin@certscope.test"]);
        assert_eq!(san.0[2], GeneralName::Ip("127.0.0.1".parse().unwrap()));

        let eku = encode_sequence(&[
            &encode_oid(ExtendedKeyUsage::SERVER_AUTH).unwrap(),
            &encode_oid(ExtendedKeyUsage::CLIENT_AUTH).unwrap(),
        ]);
        let eku = ExtendedKeyUsage::decode(&eku).unwrap();
        assert!(eku.contains(ExtendedKeyUsage::SERVER_AUTH));
        assert!(!eku.contains(ExtendedKeyUsage::CODE_SIGNING));
    }

    #[test]
    fn malformed_extension() {
        // missing extnValue
        let der = encode_sequence(&[&encode_sequence(&[&encode_oid("2.5.29.14").unwrap()])]);
        assert!(ExtensionSet::decode(&asn1::decode(&der).unwrap()).is_err());
    }
}
