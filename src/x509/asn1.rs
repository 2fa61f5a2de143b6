//! Minimal DER reader and writer.
//!
//! Only the subset of X.690 needed for certificates, CRLs, key structures and their extensions
//! is supported: single-octet tags, definite lengths up to four length octets and the universal
//! string and time types found in distinguished names and validity periods.
//!
//! Decoding never copies: every [`Element`] borrows its header and content from the input, so the
//! exact encoded bytes of any element (most importantly the TBSCertificate) stay available for
//! hashing.
//!
//! # Examples
//!
//! ```rust
//! use certscope::x509::asn1::{self, tag, DerReader};
//!
//! // SEQUENCE { INTEGER 5, BOOLEAN TRUE }
//! let der = [0x30, 0x06, 0x02, 0x01, 0x05, 0x01, 0x01, 0xFF];
//! let sequence = asn1::decode(&der)?;
//! assert_eq!(sequence.tag, tag::SEQUENCE);
//!
//! let mut reader = sequence.reader();
//! assert_eq!(reader.read_tagged(tag::INTEGER)?.content, &[0x05]);
//! assert!(reader.read_tagged(tag::BOOLEAN)?.as_bool()?);
//! assert!(!reader.has_more());
//! # Ok::<(), certscope::Error>(())
//! ```

use num_bigint_dig::BigUint;

use crate::{file::parser::Parser, x509::oid, Result};

/// Tag constants for the universal types the decoder understands.
pub mod tag {
    /// BOOLEAN
    pub const BOOLEAN: u8 = 0x01;
    /// INTEGER
    pub const INTEGER: u8 = 0x02;
    /// BIT STRING
    pub const BIT_STRING: u8 = 0x03;
    /// OCTET STRING
    pub const OCTET_STRING: u8 = 0x04;
    /// NULL
    pub const NULL: u8 = 0x05;
    /// OBJECT IDENTIFIER
    pub const OID: u8 = 0x06;
    /// ENUMERATED
    pub const ENUMERATED: u8 = 0x0A;
    /// UTF8String
    pub const UTF8_STRING: u8 = 0x0C;
    /// NumericString
    pub const NUMERIC_STRING: u8 = 0x12;
    /// PrintableString
    pub const PRINTABLE_STRING: u8 = 0x13;
    /// TeletexString (T61String)
    pub const TELETEX_STRING: u8 = 0x14;
    /// IA5String
    pub const IA5_STRING: u8 = 0x16;
    /// UTCTime
    pub const UTC_TIME: u8 = 0x17;
    /// GeneralizedTime
    pub const GENERALIZED_TIME: u8 = 0x18;
    /// VisibleString
    pub const VISIBLE_STRING: u8 = 0x1A;
    /// UniversalString
    pub const UNIVERSAL_STRING: u8 = 0x1C;
    /// BMPString
    pub const BMP_STRING: u8 = 0x1E;
    /// SEQUENCE / SEQUENCE OF
    pub const SEQUENCE: u8 = 0x30;
    /// SET / SET OF
    pub const SET: u8 = 0x31;

    /// Constructed context-specific tag `[n]`.
    #[must_use]
    pub const fn context(n: u8) -> u8 {
        0xA0 | n
    }

    /// Primitive context-specific tag `[n]` (implicit tagging of a primitive type).
    #[must_use]
    pub const fn context_primitive(n: u8) -> u8 {
        0x80 | n
    }
}

/// A decoded TLV that borrows from the input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Element<'a> {
    /// The identifier octet
    pub tag: u8,
    /// Content octets
    pub content: &'a [u8],
    /// The complete encoding, header included
    pub raw: &'a [u8],
}

impl<'a> Element<'a> {
    /// Length of the tag and length octets.
    #[must_use]
    pub fn header_len(&self) -> usize {
        self.raw.len() - self.content.len()
    }

    /// True for constructed encodings (SEQUENCE, SET, explicit context tags).
    #[must_use]
    pub fn is_constructed(&self) -> bool {
        self.tag & 0x20 != 0
    }

    /// Reader over the children of a constructed element.
    #[must_use]
    pub fn reader(&self) -> DerReader<'a> {
        DerReader::new(self.content)
    }

    /// Decodes all children of a constructed element.
    ///
    /// # Errors
    ///
    /// Returns an error if any child is malformed.
    pub fn children(&self) -> Result<Vec<Element<'a>>> {
        let mut reader = self.reader();
        let mut children = Vec::new();
        while reader.has_more() {
            children.push(reader.read()?);
        }
        Ok(children)
    }

    /// Returns the single element wrapped by an explicit tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the content is not exactly one element.
    pub fn unwrap_explicit(&self) -> Result<Element<'a>> {
        let mut reader = self.reader();
        let inner = reader.read()?;
        if reader.has_more() {
            return Err(malformed_error!(
                "Explicit tag 0x{:02X} wraps more than one element",
                self.tag
            ));
        }
        Ok(inner)
    }

    /// Checks that the element carries `expected` as its tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] on a tag mismatch.
    pub fn expect(&self, expected: u8) -> Result<&Self> {
        if self.tag != expected {
            return Err(malformed_error!(
                "Expected tag 0x{:02X}, found 0x{:02X}",
                expected,
                self.tag
            ));
        }
        Ok(self)
    }

    /// INTEGER content with redundant sign octets removed, as an unsigned big-endian magnitude.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a non-INTEGER, an empty or a negative value.
    pub fn as_unsigned_bytes(&self) -> Result<&'a [u8]> {
        self.expect(tag::INTEGER)?;
        match self.content {
            [] => Err(malformed_error!("Empty INTEGER")),
            [first, ..] if first & 0x80 != 0 => {
                Err(malformed_error!("Negative INTEGER where unsigned expected"))
            }
            [0, rest @ ..] if !rest.is_empty() => Ok(rest),
            content => Ok(content),
        }
    }

    /// INTEGER as an arbitrary-precision unsigned value.
    ///
    /// # Errors
    ///
    /// See [`Element::as_unsigned_bytes`].
    pub fn as_biguint(&self) -> Result<BigUint> {
        Ok(BigUint::from_bytes_be(self.as_unsigned_bytes()?))
    }

    /// Small INTEGER or ENUMERATED value.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] if the value is negative or exceeds 64 bits.
    pub fn as_u64(&self) -> Result<u64> {
        if self.tag != tag::INTEGER && self.tag != tag::ENUMERATED {
            return Err(malformed_error!("Expected INTEGER, found 0x{:02X}", self.tag));
        }
        let magnitude = match self.content {
            [] => return Err(malformed_error!("Empty INTEGER")),
            [first, ..] if first & 0x80 != 0 => {
                return Err(malformed_error!("Negative INTEGER"));
            }
            [0, rest @ ..] => rest,
            content => content,
        };
        if magnitude.len() > 8 {
            return Err(malformed_error!("INTEGER exceeds 64 bits"));
        }
        Ok(magnitude
            .iter()
            .fold(0_u64, |acc, &byte| (acc << 8) | u64::from(byte)))
    }

    /// BOOLEAN value. Any non-zero octet is true.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a non-BOOLEAN or a length other than one.
    pub fn as_bool(&self) -> Result<bool> {
        self.expect(tag::BOOLEAN)?;
        match self.content {
            [value] => Ok(*value != 0),
            _ => Err(malformed_error!("BOOLEAN of length {}", self.content.len())),
        }
    }

    /// OBJECT IDENTIFIER in dotted form.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a non-OID or invalid content.
    pub fn as_oid(&self) -> Result<String> {
        self.expect(tag::OID)?;
        oid::decode(self.content)
    }

    /// BIT STRING payload without the leading unused-bits octet.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for a non-BIT STRING or an empty encoding.
    pub fn as_bit_string(&self) -> Result<&'a [u8]> {
        self.expect(tag::BIT_STRING)?;
        match self.content {
            [unused, rest @ ..] if *unused < 8 => Ok(rest),
            [unused, ..] => Err(malformed_error!("BIT STRING with {} unused bits", unused)),
            [] => Err(malformed_error!("Empty BIT STRING")),
        }
    }

    /// OCTET STRING content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for any other tag.
    pub fn as_octet_string(&self) -> Result<&'a [u8]> {
        self.expect(tag::OCTET_STRING)?;
        Ok(self.content)
    }

    /// Decodes any of the directory string types to text.
    ///
    /// TeletexString is treated as Latin-1, BMPString as UTF-16BE and UniversalString as
    /// UTF-32BE. Unknown tags fall back to a lossy UTF-8 rendering of the content.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for invalid UTF-8, UTF-16 or UTF-32 content.
    pub fn as_string(&self) -> Result<String> {
        match self.tag {
            tag::UTF8_STRING => String::from_utf8(self.content.to_vec())
                .map_err(|_| malformed_error!("Invalid UTF8String")),
            tag::PRINTABLE_STRING
            | tag::IA5_STRING
            | tag::NUMERIC_STRING
            | tag::VISIBLE_STRING
            | tag::TELETEX_STRING => Ok(self.content.iter().map(|&b| char::from(b)).collect()),
            tag::BMP_STRING => {
                if self.content.len() % 2 != 0 {
                    return Err(malformed_error!("Odd BMPString length"));
                }
                let units: Vec<u16> = self
                    .content
                    .chunks_exact(2)
                    .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|_| malformed_error!("Invalid BMPString"))
            }
            tag::UNIVERSAL_STRING => {
                if self.content.len() % 4 != 0 {
                    return Err(malformed_error!("UniversalString length not a multiple of 4"));
                }
                self.content
                    .chunks_exact(4)
                    .map(|quad| {
                        char::from_u32(u32::from_be_bytes([quad[0], quad[1], quad[2], quad[3]]))
                            .ok_or_else(|| malformed_error!("Invalid UniversalString"))
                    })
                    .collect()
            }
            _ => Ok(String::from_utf8_lossy(self.content).into_owned()),
        }
    }
}

/// Sequential reader over concatenated DER elements.
pub struct DerReader<'a> {
    parser: Parser<'a>,
}

impl<'a> DerReader<'a> {
    /// Creates a reader over `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        DerReader {
            parser: Parser::new(data),
        }
    }

    /// True while unread elements remain.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.parser.has_more_data()
    }

    /// Current offset within the reader's data.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.parser.pos()
    }

    /// Tag of the next element without consuming it.
    #[must_use]
    pub fn peek_tag(&self) -> Option<u8> {
        self.parser.peek_byte().ok()
    }

    /// Reads the next element.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for high tag numbers or invalid lengths and
    /// [`crate::Error::OutOfBounds`] if the content runs past the end of the data.
    pub fn read(&mut self) -> Result<Element<'a>> {
        let data = self.parser.data();
        self.parser.transactional(|parser| {
            let start = parser.pos();
            let tag = parser.read_be::<u8>()?;
            if tag & 0x1F == 0x1F {
                return Err(malformed_error!("High tag number form at offset {}", start));
            }

            let length = parser.read_der_length()?;
            let content = parser.read_bytes(length)?;
            Ok(Element {
                tag,
                content,
                raw: &data[start..parser.pos()],
            })
        })
    }

    /// Reads the next element and checks its tag.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] on a tag mismatch, plus the errors of
    /// [`DerReader::read`].
    pub fn read_tagged(&mut self, expected: u8) -> Result<Element<'a>> {
        match self.peek_tag() {
            Some(found) if found == expected => self.read(),
            Some(found) => Err(malformed_error!(
                "Expected tag 0x{:02X}, found 0x{:02X}",
                expected,
                found
            )),
            None => Err(out_of_bounds_error!()),
        }
    }

    /// Reads the next element only if it carries `expected` as its tag.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`DerReader::read`] when the tag matches.
    pub fn read_optional(&mut self, expected: u8) -> Result<Option<Element<'a>>> {
        if self.peek_tag() == Some(expected) {
            return self.read().map(Some);
        }
        Ok(None)
    }

    /// Fails if any data remains.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] when trailing data is present.
    pub fn finish(&self) -> Result<()> {
        if self.has_more() {
            return Err(malformed_error!(
                "{} unexpected trailing bytes",
                self.parser.remaining()
            ));
        }
        Ok(())
    }
}

/// Decodes exactly one element spanning the whole input.
///
/// # Errors
///
/// Returns [`crate::Error::Empty`] for empty input, [`crate::Error::Malformed`] for trailing
/// data and the errors of [`DerReader::read`].
pub fn decode(data: &[u8]) -> Result<Element<'_>> {
    if data.is_empty() {
        return Err(crate::Error::Empty);
    }
    let mut reader = DerReader::new(data);
    let element = reader.read()?;
    reader.finish()?;
    Ok(element)
}

/// Encodes a definite length.
#[must_use]
pub fn encode_length(length: usize) -> Vec<u8> {
    if length < 0x80 {
        return vec![length as u8];
    }
    let bytes = length.to_be_bytes();
    let skip = bytes.iter().take_while(|&&b| b == 0).count();
    let mut encoded = vec![0x80 | (bytes.len() - skip) as u8];
    encoded.extend_from_slice(&bytes[skip..]);
    encoded
}

/// Encodes a complete TLV.
#[must_use]
pub fn encode(tag: u8, content: &[u8]) -> Vec<u8> {
    let mut encoded = vec![tag];
    encoded.extend(encode_length(content.len()));
    encoded.extend_from_slice(content);
    encoded
}

/// Encodes a SEQUENCE around already encoded children.
#[must_use]
pub fn encode_sequence(children: &[&[u8]]) -> Vec<u8> {
    encode(tag::SEQUENCE, &children.concat())
}

/// Encodes an unsigned big-endian magnitude as a DER INTEGER.
#[must_use]
pub fn encode_unsigned(magnitude: &[u8]) -> Vec<u8> {
    let trimmed = match magnitude.iter().position(|&b| b != 0) {
        Some(first) => &magnitude[first..],
        None => &[0][..],
    };
    let mut content = Vec::with_capacity(trimmed.len() + 1);
    if trimmed[0] & 0x80 != 0 {
        content.push(0);
    }
    content.extend_from_slice(trimmed);
    encode(tag::INTEGER, &content)
}

/// Encodes a dotted OID as a DER OBJECT IDENTIFIER.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] if the text is not a valid OID.
pub fn encode_oid(dotted: &str) -> Result<Vec<u8>> {
    Ok(encode(tag::OID, &oid::encode(dotted)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn read_nested() {
        // SEQUENCE { OID 2.5.29.14, BOOLEAN TRUE, OCTET STRING { 04 02 AB CD } }
        let der = [
            0x30, 0x0E, 0x06, 0x03, 0x55, 0x1D, 0x0E, 0x01, 0x01, 0xFF, 0x04, 0x04, 0x04, 0x02,
            0xAB, 0xCD,
        ];
        let sequence = decode(&der).unwrap();
        assert!(sequence.is_constructed());
        assert_eq!(sequence.header_len(), 2);

        let children = sequence.children().unwrap();
        assert_eq!(children.len(), 3);
        assert_eq!(children[0].as_oid().unwrap(), "2.5.29.14");
        assert!(children[1].as_bool().unwrap());

        let inner = decode(children[2].as_octet_string().unwrap()).unwrap();
        assert_eq!(inner.as_octet_string().unwrap(), &[0xAB, 0xCD]);
        assert_eq!(children[2].raw, &der[10..]);
    }

    #[test]
    fn optional_and_tagged() {
        let der = [0xA0, 0x03, 0x02, 0x01, 0x02, 0x02, 0x01, 0x07];
        let mut reader = DerReader::new(&der);

        assert!(reader.read_optional(tag::context(1)).unwrap().is_none());
        let version = reader.read_optional(tag::context(0)).unwrap().unwrap();
        assert_eq!(version.unwrap_explicit().unwrap().as_u64().unwrap(), 2);

        assert!(reader.read_tagged(tag::SEQUENCE).is_err());
        assert_eq!(reader.read_tagged(tag::INTEGER).unwrap().as_u64().unwrap(), 7);
        assert!(matches!(
            reader.read_tagged(tag::INTEGER),
            Err(Error::OutOfBounds { .. })
        ));
    }

    #[test]
    fn integers() {
        let der = encode_unsigned(&[0x00, 0x00, 0x80, 0x01]);
        assert_eq!(der, vec![0x02, 0x03, 0x00, 0x80, 0x01]);

        let element = decode(&der).unwrap();
        assert_eq!(element.as_unsigned_bytes().unwrap(), &[0x80, 0x01]);
        assert_eq!(element.as_u64().unwrap(), 0x8001);
        assert_eq!(element.as_biguint().unwrap(), BigUint::from(0x8001_u32));

        let zero_der = encode_unsigned(&[]);
        let zero = decode(&zero_der).unwrap();
        assert_eq!(zero.as_unsigned_bytes().unwrap(), &[0x00]);

        let negative = decode(&[0x02, 0x01, 0xFF]).unwrap();
        assert!(negative.as_unsigned_bytes().is_err());
    }

    #[test]
    fn strings() {
        let bmp = Element {
            tag: tag::BMP_STRING,
            content: &[0x00, 0x41, 0x00, 0xE9],
            raw: &[],
        };
        assert_eq!(bmp.as_string().unwrap(), "Aé");

        let teletex = Element {
            tag: tag::TELETEX_STRING,
            content: &[0x4D, 0xFC],
            raw: &[],
        };
        assert_eq!(teletex.as_string().unwrap(), "Mü");

        let universal = Element {
            tag: tag::UNIVERSAL_STRING,
            content: &[0x00, 0x00, 0x00, 0x5A],
            raw: &[],
        };
        assert_eq!(universal.as_string().unwrap(), "Z");
    }

    #[test]
    fn malformed_input() {
        assert!(matches!(decode(&[]), Err(Error::Empty)));
        // content runs past the end
        assert!(matches!(
            decode(&[0x30, 0x05, 0x02, 0x01]),
            Err(Error::OutOfBounds { .. })
        ));
        // trailing data
        assert!(matches!(
            decode(&[0x05, 0x00, 0x00]),
            Err(Error::Malformed { .. })
        ));
        // high tag number
        assert!(decode(&[0x1F, 0x81, 0x00]).is_err());
        // indefinite length
        assert!(decode(&[0x30, 0x80, 0x00, 0x00]).is_err());
    }

    #[test]
    fn lengths() {
        assert_eq!(encode_length(0x7F), vec![0x7F]);
        assert_eq!(encode_length(0x80), vec![0x81, 0x80]);
        assert_eq!(encode_length(0x1234), vec![0x82, 0x12, 0x34]);

        let long = vec![0xAA; 300];
        let encoded = encode(tag::OCTET_STRING, &long);
        assert_eq!(&encoded[..4], &[0x04, 0x82, 0x01, 0x2C]);
        assert_eq!(decode(&encoded).unwrap().content, &long[..]);
    }
}
