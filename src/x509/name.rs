//! X.501 distinguished names.
//!
//! A [`DistinguishedName`] keeps its relative distinguished names in encoding order. The string
//! form renders every attribute as `LABEL=value`, joins multi-valued RDNs with `" + "` and RDNs
//! with `", "`, so `C=US, O=certscope, CN=leaf` reads issuer-first like the encoding. Two names
//! are equal when their attribute types and decoded values are equal in the same order, which is
//! exactly when their canonical strings are equal.

use std::fmt;

use crate::{
    x509::{
        asn1::{tag, Element},
        oid,
    },
    Result,
};

/// One `type=value` pair of a relative distinguished name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Attribute {
    /// Dotted attribute type
    pub oid: String,
    /// Decoded string value
    pub value: String,
}

impl Attribute {
    /// Short label (`CN`, `O`, ...) or `OID.<dotted>` for unknown types.
    #[must_use]
    pub fn label(&self) -> String {
        match oid::attribute_label(&self.oid) {
            Some(label) => label.to_string(),
            None => format!("OID.{}", self.oid),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=", self.label())?;
        if needs_quotes(&self.value) {
            write!(f, "\"{}\"", self.value.replace('"', "\"\""))
        } else {
            f.write_str(&self.value)
        }
    }
}

fn needs_quotes(value: &str) -> bool {
    value.starts_with(' ')
        || value.ends_with(' ')
        || value
            .chars()
            .any(|c| matches!(c, ',' | '+' | '=' | '"' | '\\' | '<' | '>' | ';' | '#'))
}

/// A decoded `Name` (SEQUENCE OF RelativeDistinguishedName).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct DistinguishedName {
    rdns: Vec<Vec<Attribute>>,
}

impl DistinguishedName {
    /// Decodes a `Name` element.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the structure is not a SEQUENCE of SETs of
    /// `SEQUENCE { OID, value }`.
    pub fn decode(element: &Element<'_>) -> Result<DistinguishedName> {
        element.expect(tag::SEQUENCE)?;

        let mut rdns = Vec::new();
        for set in element.children()? {
            set.expect(tag::SET)?;

            let mut rdn = Vec::new();
            for pair in set.children()? {
                pair.expect(tag::SEQUENCE)?;
                let mut reader = pair.reader();
                let oid = reader.read_tagged(tag::OID)?.as_oid()?;
                let value = reader.read()?.as_string()?;
                reader.finish()?;
                rdn.push(Attribute { oid, value });
            }
            if rdn.is_empty() {
                return Err(malformed_error!("Empty relative distinguished name"));
            }
            rdns.push(rdn);
        }

        Ok(DistinguishedName { rdns })
    }

    /// Relative distinguished names in encoding order.
    #[must_use]
    pub fn rdns(&self) -> &[Vec<Attribute>] {
        &self.rdns
    }

    /// All attributes, flattened in encoding order.
    pub fn attributes(&self) -> impl Iterator<Item = &Attribute> {
        self.rdns.iter().flatten()
    }

    /// Value of the first attribute of type `oid`.
    #[must_use]
    pub fn get(&self, oid: &str) -> Option<&str> {
        self.attributes()
            .find(|attribute| attribute.oid == oid)
            .map(|attribute| attribute.value.as_str())
    }

    /// The `CN` attribute, if present.
    #[must_use]
    pub fn common_name(&self) -> Option<&str> {
        self.get(oid::COMMON_NAME)
    }

    /// True for a name without any RDN.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rdns.is_empty()
    }
}

impl fmt::Display for DistinguishedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, rdn) in self.rdns.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            for (position, attribute) in rdn.iter().enumerate() {
                if position > 0 {
                    f.write_str(" + ")?;
                }
                write!(f, "{attribute}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::x509::asn1::{self, encode, encode_oid, encode_sequence};

    fn atv(oid: &str, string_tag: u8, value: &str) -> Vec<u8> {
        encode_sequence(&[&encode_oid(oid).unwrap(), &encode(string_tag, value.as_bytes())])
    }

    fn name(rdns: &[Vec<Vec<u8>>]) -> Vec<u8> {
        let sets: Vec<Vec<u8>> = rdns
            .iter()
            .map(|rdn| encode(tag::SET, &rdn.concat()))
            .collect();
        encode(tag::SEQUENCE, &sets.concat())
    }

    #[test]
    fn renders_in_encoding_order() {
        let der = name(&[
            vec![atv(oid::COUNTRY, tag::PRINTABLE_STRING, "US")],
            vec![atv(oid::ORGANIZATION, tag::UTF8_STRING, "certscope")],
            vec![atv(oid::COMMON_NAME, tag::UTF8_STRING, "leaf.certscope.test")],
        ]);
        let dn = DistinguishedName::decode(&asn1::decode(&der).unwrap()).unwrap();

        assert_eq!(dn.to_string(), "C=US, O=certscope, CN=leaf.certscope.test");
        assert_eq!(dn.common_name(), Some("leaf.certscope.test"));
        assert_eq!(dn.rdns().len(), 3);
    }

    #[test]
    fn quoting_and_unknown_types() {
        let der = name(&[
            vec![
                atv(oid::ORGANIZATIONAL_UNIT, tag::UTF8_STRING, "Servers, Web"),
                atv("1.2.3.4", tag::IA5_STRING, "x"),
            ],
            vec![atv(oid::COMMON_NAME, tag::UTF8_STRING, " padded")],
            vec![atv(oid::EMAIL_ADDRESS, tag::IA5_STRING, "say \"hi\"")],
        ]);
        let dn = DistinguishedName::decode(&asn1::decode(&der).unwrap()).unwrap();

        assert_eq!(
            dn.to_string(),
            "OU=\"Servers, Web\" + OID.1.2.3.4=x, CN=\" padded\", E=\"say \"\"hi\"\"\""
        );
    }

    #[test]
    fn equality_follows_order() {
        let a = name(&[
            vec![atv(oid::COUNTRY, tag::PRINTABLE_STRING, "US")],
            vec![atv(oid::COMMON_NAME, tag::UTF8_STRING, "x")],
        ]);
        let b = name(&[
            vec![atv(oid::COUNTRY, tag::PRINTABLE_STRING, "US")],
            vec![atv(oid::COMMON_NAME, tag::PRINTABLE_STRING, "x")],
        ]);
        let c = name(&[
            vec![atv(oid::COMMON_NAME, tag::UTF8_STRING, "x")],
            vec![atv(oid::COUNTRY, tag::PRINTABLE_STRING, "US")],
        ]);

        let decode = |der: &[u8]| DistinguishedName::decode(&asn1::decode(der).unwrap()).unwrap();
        // string type does not matter, order does
        assert_eq!(decode(&a), decode(&b));
        assert_ne!(decode(&a), decode(&c));
    }

    #[test]
    fn empty_and_malformed() {
        let empty = DistinguishedName::decode(&asn1::decode(&[0x30, 0x00]).unwrap()).unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.to_string(), "");

        let empty_set = [0x30, 0x02, 0x31, 0x00];
        assert!(DistinguishedName::decode(&asn1::decode(&empty_set).unwrap()).is_err());

        let not_a_set = [0x30, 0x02, 0x30, 0x00];
        assert!(DistinguishedName::decode(&asn1::decode(&not_a_set).unwrap()).is_err());
    }
}
