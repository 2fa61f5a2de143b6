//! UTCTime and GeneralizedTime decoding.
//!
//! Both forms are normalised to [`chrono::DateTime<Utc>`]. Two-digit UTCTime years below 50 are
//! mapped to 20xx, the rest to 19xx (RFC 5280, 4.1.2.5.1). Missing seconds, fractional seconds
//! and explicit `+hhmm` / `-hhmm` offsets are tolerated since older issuers emit them.

use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};

use crate::{
    x509::asn1::{tag, Element},
    Result,
};

/// Decodes a UTCTime or GeneralizedTime element.
///
/// # Errors
///
/// Returns [`crate::Error::Malformed`] for any other tag or an invalid time string.
pub fn decode_time(element: &Element<'_>) -> Result<DateTime<Utc>> {
    let text = std::str::from_utf8(element.content)
        .map_err(|_| malformed_error!("Time value is not ASCII"))?;

    match element.tag {
        tag::UTC_TIME => parse(text, 2),
        tag::GENERALIZED_TIME => parse(text, 4),
        other => Err(malformed_error!("Expected a time value, found tag 0x{:02X}", other)),
    }
}

struct Digits<'a> {
    text: &'a str,
    pos: usize,
}

impl Digits<'_> {
    fn take(&mut self, count: usize) -> Result<u32> {
        let Some(slice) = self.text.get(self.pos..self.pos + count) else {
            return Err(malformed_error!("Truncated time value '{}'", self.text));
        };
        if !slice.bytes().all(|b| b.is_ascii_digit()) {
            return Err(malformed_error!("Invalid digits in time value '{}'", self.text));
        }
        self.pos += count;
        slice
            .parse()
            .map_err(|_| malformed_error!("Invalid time value '{}'", self.text))
    }

    fn peek(&self) -> Option<u8> {
        self.text.as_bytes().get(self.pos).copied()
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }
}

fn parse(text: &str, year_digits: usize) -> Result<DateTime<Utc>> {
    let mut digits = Digits { text, pos: 0 };

    let year = match (year_digits, digits.take(year_digits)?) {
        (2, yy) if yy < 50 => 2000 + yy,
        (2, yy) => 1900 + yy,
        (_, yyyy) => yyyy,
    };
    let month = digits.take(2)?;
    let day = digits.take(2)?;
    let hour = digits.take(2)?;
    let minute = digits.take(2)?;
    let second = match digits.peek() {
        Some(b) if b.is_ascii_digit() => digits.take(2)?,
        _ => 0,
    };

    let mut millis = 0;
    if matches!(digits.peek(), Some(b'.' | b',')) {
        digits.pos += 1;
        let start = digits.pos;
        while matches!(digits.peek(), Some(b) if b.is_ascii_digit()) {
            digits.pos += 1;
        }
        let fraction = &text[start..digits.pos];
        if fraction.is_empty() {
            return Err(malformed_error!("Empty fraction in time value '{}'", text));
        }
        millis = format!("{:0<3}", &fraction[..fraction.len().min(3)])
            .parse::<i64>()
            .map_err(|_| malformed_error!("Invalid fraction in time value '{}'", text))?;
    }

    let offset_minutes: i64 = match digits.peek() {
        Some(b'Z') if digits.rest().len() == 1 => 0,
        // GeneralizedTime without a zone designator is local time, read as UTC
        None if year_digits == 4 => 0,
        Some(sign @ (b'+' | b'-')) => {
            digits.pos += 1;
            let hours = i64::from(digits.take(2)?);
            let minutes = i64::from(digits.take(2)?);
            if digits.peek().is_some() {
                return Err(malformed_error!("Trailing data in time value '{}'", text));
            }
            let offset = hours * 60 + minutes;
            if sign == b'-' {
                -offset
            } else {
                offset
            }
        }
        _ => return Err(malformed_error!("Invalid time zone in '{}'", text)),
    };

    let naive = NaiveDate::from_ymd_opt(year as i32, month, day)
        .and_then(|date| date.and_hms_opt(hour, minute, second))
        .ok_or_else(|| malformed_error!("Time value '{}' is out of range", text))?;

    Ok(Utc.from_utc_datetime(&naive) + Duration::milliseconds(millis)
        - Duration::minutes(offset_minutes))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn element(tag: u8, text: &str) -> Element<'_> {
        Element {
            tag,
            content: text.as_bytes(),
            raw: &[],
        }
    }

    #[test]
    fn utc_time_century_window() {
        let t = decode_time(&element(tag::UTC_TIME, "200101000000Z")).unwrap();
        assert_eq!(t.to_rfc3339(), "2020-01-01T00:00:00+00:00");

        let t = decode_time(&element(tag::UTC_TIME, "491231235959Z")).unwrap();
        assert_eq!(t.to_rfc3339(), "2049-12-31T23:59:59+00:00");

        let t = decode_time(&element(tag::UTC_TIME, "500101000000Z")).unwrap();
        assert_eq!(t.to_rfc3339(), "1950-01-01T00:00:00+00:00");
    }

    #[test]
    fn utc_time_variants() {
        // no seconds
        let t = decode_time(&element(tag::UTC_TIME, "9901010000Z")).unwrap();
        assert_eq!(t.to_rfc3339(), "1999-01-01T00:00:00+00:00");

        // explicit offset
        let t = decode_time(&element(tag::UTC_TIME, "240601123000+0130")).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-06-01T11:00:00+00:00");
    }

    #[test]
    fn generalized_time() {
        let t = decode_time(&element(tag::GENERALIZED_TIME, "20500101000000Z")).unwrap();
        assert_eq!(t.to_rfc3339(), "2050-01-01T00:00:00+00:00");

        let t = decode_time(&element(tag::GENERALIZED_TIME, "20240101120000.5Z")).unwrap();
        assert_eq!(t.timestamp_subsec_millis(), 500);

        let t = decode_time(&element(tag::GENERALIZED_TIME, "20240101120000")).unwrap();
        assert_eq!(t.to_rfc3339(), "2024-01-01T12:00:00+00:00");
    }

    #[test]
    fn invalid() {
        assert!(decode_time(&element(tag::UTC_TIME, "2001010000")).is_err());
        assert!(decode_time(&element(tag::UTC_TIME, "201301000000Z")).is_err());
        assert!(decode_time(&element(tag::UTC_TIME, "20010100000AZ")).is_err());
        assert!(decode_time(&element(tag::UTC_TIME, "200101000000Zjunk")).is_err());
        assert!(decode_time(&element(tag::INTEGER, "200101000000Z")).is_err());
    }
}
