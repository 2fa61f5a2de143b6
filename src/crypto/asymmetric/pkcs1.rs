//! PKCS #1 v1.5 signature encoding (EMSA-PKCS1-v1_5, RFC 8017 section 9.2).
//!
//! The RSA primitives in [`super::rsa`] are padding-agnostic. This module builds the encoded
//! message `00 01 FF .. FF 00 || DigestInfo` that is fed to the private exponentiation when
//! signing and compared against the public exponentiation when verifying.

use crate::{
    crypto::HashAlgorithm,
    x509::asn1::{self, tag},
    Error::{InvalidLength, InvalidParameters},
    Result,
};

/// DER `DigestInfo ::= SEQUENCE { AlgorithmIdentifier, OCTET STRING }`.
///
/// With `null_parameters` the algorithm identifier carries an explicit NULL, which is the
/// canonical form; some legacy signers omit it.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidLength`] if `hash` does not match the digest size.
pub fn digest_info(hash: &[u8], algorithm: HashAlgorithm, null_parameters: bool) -> Result<Vec<u8>> {
    if hash.len() != algorithm.output_size() {
        return Err(InvalidLength {
            expected: algorithm.output_size(),
            actual: hash.len(),
        });
    }

    let oid = asn1::encode_oid(algorithm.oid())?;
    let identifier = if null_parameters {
        asn1::encode_sequence(&[&oid, &asn1::encode(tag::NULL, &[])])
    } else {
        asn1::encode_sequence(&[&oid])
    };
    Ok(asn1::encode_sequence(&[
        &identifier,
        &asn1::encode(tag::OCTET_STRING, hash),
    ]))
}

/// Builds the `k`-byte encoded message for a signature.
///
/// # Errors
///
/// - [`crate::Error::InvalidLength`] if `hash` does not match the digest size
/// - [`crate::Error::InvalidParameters`] if the modulus is too short for the DigestInfo
pub fn encode(hash: &[u8], algorithm: HashAlgorithm, k: usize) -> Result<Vec<u8>> {
    encode_with(hash, algorithm, k, true)
}

fn encode_with(
    hash: &[u8],
    algorithm: HashAlgorithm,
    k: usize,
    null_parameters: bool,
) -> Result<Vec<u8>> {
    let info = digest_info(hash, algorithm, null_parameters)?;
    if k < info.len() + 11 {
        return Err(InvalidParameters(format!(
            "{k} byte modulus is too short for a {algorithm} signature"
        )));
    }

    let mut message = Vec::with_capacity(k);
    message.extend_from_slice(&[0x00, 0x01]);
    message.resize(k - info.len() - 1, 0xFF);
    message.push(0x00);
    message.extend_from_slice(&info);
    Ok(message)
}

/// Checks a recovered encoded message against `hash`, accepting both DigestInfo forms.
///
/// # Errors
///
/// Returns [`crate::Error::InvalidLength`] if `hash` does not match the digest size.
pub fn matches(message: &[u8], hash: &[u8], algorithm: HashAlgorithm) -> Result<bool> {
    let k = message.len();
    for null_parameters in [true, false] {
        match encode_with(hash, algorithm, k, null_parameters) {
            Ok(expected) if expected == message => return Ok(true),
            Ok(_) | Err(InvalidParameters(_)) => {}
            Err(error) => return Err(error),
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn sha1_digest_info_prefix() {
        let hash = HashAlgorithm::Sha1.digest(b"test");
        let info = digest_info(&hash, HashAlgorithm::Sha1, true).unwrap();
        assert_eq!(
            hex::encode(&info[..15]),
            "3021300906052b0e03021a05000414"
        );
        assert_eq!(&info[15..], &hash[..]);
    }

    #[test]
    fn sha256_digest_info_prefix() {
        let hash = HashAlgorithm::Sha256.digest(b"test");
        let info = digest_info(&hash, HashAlgorithm::Sha256, true).unwrap();
        assert_eq!(
            hex::encode(&info[..19]),
            "3031300d060960864801650304020105000420"
        );
    }

    #[test]
    fn encoded_message_layout() {
        let hash = HashAlgorithm::Md5.digest(b"test");
        let message = encode(&hash, HashAlgorithm::Md5, 64).unwrap();
        assert_eq!(message.len(), 64);
        assert_eq!(&message[..2], &[0x00, 0x01]);
        assert!(matches(&message, &hash, HashAlgorithm::Md5).unwrap());

        let other = HashAlgorithm::Md5.digest(b"other");
        assert!(!matches(&message, &other, HashAlgorithm::Md5).unwrap());
    }

    #[test]
    fn legacy_form_without_null() {
        let hash = HashAlgorithm::Sha1.digest(b"test");
        let message = encode_with(&hash, HashAlgorithm::Sha1, 128, false).unwrap();
        assert!(matches(&message, &hash, HashAlgorithm::Sha1).unwrap());
    }

    #[test]
    fn errors() {
        assert!(matches!(
            encode(&[0u8; 19], HashAlgorithm::Sha1, 128),
            Err(Error::InvalidLength {
                expected: 20,
                actual: 19
            })
        ));
        let hash = HashAlgorithm::Sha512.digest(b"");
        assert!(matches!(
            encode(&hash, HashAlgorithm::Sha512, 64),
            Err(Error::InvalidParameters(_))
        ));
    }
}
