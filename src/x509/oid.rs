//! Object identifier encoding and the OIDs the decoder understands.
//!
//! OIDs are carried through the crate in their dotted text form (`"2.5.29.14"`). This keeps
//! lookups in the algorithm registry and the extension set simple string comparisons.

use crate::Result;

/// `commonName`
pub const COMMON_NAME: &str = "2.5.4.3";
/// `countryName`
pub const COUNTRY: &str = "2.5.4.6";
/// `organizationName`
pub const ORGANIZATION: &str = "2.5.4.10";
/// `organizationalUnitName`
pub const ORGANIZATIONAL_UNIT: &str = "2.5.4.11";
/// PKCS #9 `emailAddress`
pub const EMAIL_ADDRESS: &str = "1.2.840.113549.1.9.1";

/// Subject Key Identifier extension
pub const SUBJECT_KEY_IDENTIFIER: &str = "2.5.29.14";
/// Key Usage extension
pub const KEY_USAGE: &str = "2.5.29.15";
/// Subject Alternative Name extension
pub const SUBJECT_ALT_NAME: &str = "2.5.29.17";
/// Basic Constraints extension
pub const BASIC_CONSTRAINTS: &str = "2.5.29.19";
/// CRL Number extension
pub const CRL_NUMBER: &str = "2.5.29.20";
/// CRL entry Reason Code extension
pub const CRL_REASON: &str = "2.5.29.21";
/// Authority Key Identifier extension
pub const AUTHORITY_KEY_IDENTIFIER: &str = "2.5.29.35";
/// Extended Key Usage extension
pub const EXTENDED_KEY_USAGE: &str = "2.5.29.37";

/// Short labels used when rendering distinguished names.
const ATTRIBUTE_LABELS: &[(&str, &str)] = &[
    (COMMON_NAME, "CN"),
    (COUNTRY, "C"),
    ("2.5.4.7", "L"),
    ("2.5.4.8", "S"),
    (ORGANIZATION, "O"),
    (ORGANIZATIONAL_UNIT, "OU"),
    (EMAIL_ADDRESS, "E"),
    ("0.9.2342.19200300.100.1.25", "DC"),
    ("2.5.4.9", "STREET"),
    ("2.5.4.5", "SERIALNUMBER"),
    ("2.5.4.12", "T"),
    ("2.5.4.42", "G"),
    ("2.5.4.43", "I"),
    ("2.5.4.4", "SN"),
    ("0.9.2342.19200300.100.1.1", "UID"),
];

/// Returns the short label of a distinguished name attribute, if it has one.
#[must_use]
pub fn attribute_label(oid: &str) -> Option<&'static str> {
    ATTRIBUTE_LABELS
        .iter()
        .find(|(known, _)| *known == oid)
        .map(|(_, label)| *label)
}

/// Decodes the content octets of an OBJECT IDENTIFIER into dotted form.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for empty content, a truncated sub-identifier or an arc
/// that does not fit into 64 bits.
pub fn decode(content: &[u8]) -> Result<String> {
    if content.is_empty() {
        return Err(malformed_error!("Empty OBJECT IDENTIFIER"));
    }

    let mut arcs: Vec<u64> = Vec::new();
    let mut value: u64 = 0;
    let mut pending = false;

    for &byte in content {
        if value > (u64::MAX >> 7) {
            return Err(malformed_error!("OBJECT IDENTIFIER arc overflows"));
        }
        value = (value << 7) | u64::from(byte & 0x7F);
        pending = byte & 0x80 != 0;

        if !pending {
            if arcs.is_empty() {
                // the first sub-identifier packs the first two arcs
                let (first, second) = match value {
                    0..=39 => (0, value),
                    40..=79 => (1, value - 40),
                    _ => (2, value - 80),
                };
                arcs.push(first);
                arcs.push(second);
            } else {
                arcs.push(value);
            }
            value = 0;
        }
    }

    if pending {
        return Err(malformed_error!("Truncated OBJECT IDENTIFIER"));
    }

    Ok(arcs
        .iter()
        .map(u64::to_string)
        .collect::<Vec<_>>()
        .join("."))
}

/// Encodes a dotted OID into OBJECT IDENTIFIER content octets.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the text is not a valid OID.
pub fn encode(dotted: &str) -> Result<Vec<u8>> {
    let arcs = dotted
        .split('.')
        .map(str::parse::<u64>)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|_| malformed_error!("Invalid OID '{}'", dotted))?;

    if arcs.len() < 2 || arcs[0] > 2 || (arcs[0] < 2 && arcs[1] > 39) {
        return Err(malformed_error!("Invalid OID '{}'", dotted));
    }

    let Some(first) = arcs[0].checked_mul(40).and_then(|v| v.checked_add(arcs[1])) else {
        return Err(malformed_error!("Invalid OID '{}'", dotted));
    };

    let mut content = Vec::new();
    for arc in std::iter::once(first).chain(arcs[2..].iter().copied()) {
        let mut chunk = vec![(arc & 0x7F) as u8];
        let mut rest = arc >> 7;
        while rest > 0 {
            chunk.push(((rest & 0x7F) as u8) | 0x80);
            rest >>= 7;
        }
        content.extend(chunk.iter().rev());
    }
    Ok(content)
}
