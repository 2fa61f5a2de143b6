//! RSA and DSA key engine.
//!
//! Both algorithms are implemented on top of `num-bigint-dig`. Keys are modelled as the closed
//! enum [`AsymmetricKey`] over [`RsaKey`] and [`DsaKey`]; certificate code only ever needs
//! [`AsymmetricKey::from_public_key_info`] and [`AsymmetricKey::verify_signature`], while the
//! concrete key types expose the full import / export / sign / verify surface.
//!
//! # Key lifecycle
//!
//! A key constructed with [`RsaKey::new`] or [`DsaKey::new`] only records its size; the key
//! material is generated the first time an operation needs it and is immutable afterwards.
//! [`RsaKey::generate`] and [`DsaKey::generate`] generate eagerly. Private scalars are held in
//! [`SecretScalar`] and wiped as soon as the key is dropped.
//!
//! # Key Components
//!
//! - [`RsaKey`] / [`RsaParameters`] - RSA generation, raw and PKCS #1 v1.5 operations
//! - [`DsaKey`] / [`DsaParameters`] - FIPS 186-2 DSA generation, sign and verify
//! - [`AsymmetricKey`] / [`KeyAlgorithm`] - Algorithm-independent key handle
//! - [`pkcs1`] - EMSA-PKCS1-v1_5 encoding
//! - [`blob`] - CryptoAPI key blobs and PVK files

pub mod blob;
mod dsa;
pub mod pkcs1;
mod rsa;
mod secret;

pub use dsa::{DsaKey, DsaParameters};
pub use rsa::{RsaKey, RsaParameters};
pub use secret::SecretScalar;

use num_bigint_dig::{BigInt, BigUint, ModInverse, Sign};
use strum::{Display, EnumIter, EnumString};

use crate::{
    crypto::HashAlgorithm,
    x509::asn1::{self, tag},
    Error::{InvalidParameters, UnsupportedAlgorithm},
    Result,
};

/// Public-key algorithm family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum KeyAlgorithm {
    /// RSA (PKCS #1)
    Rsa,
    /// DSA (FIPS 186-2)
    Dsa,
}

impl KeyAlgorithm {
    /// Dotted OID used in SubjectPublicKeyInfo.
    #[must_use]
    pub fn oid(self) -> &'static str {
        match self {
            KeyAlgorithm::Rsa => "1.2.840.113549.1.1.1",
            KeyAlgorithm::Dsa => "1.2.840.10040.4.1",
        }
    }
}

/// An RSA or DSA key.
#[derive(Debug, Clone)]
pub enum AsymmetricKey {
    /// RSA key
    Rsa(RsaKey),
    /// DSA key
    Dsa(DsaKey),
}

impl AsymmetricKey {
    /// Decodes the public key carried by a certificate.
    ///
    /// `parameters` is the raw DER of the algorithm parameters (absent or NULL for RSA,
    /// `Dss-Parms ::= SEQUENCE { p, q, g }` for DSA) and `key` the content of the
    /// `subjectPublicKey` BIT STRING.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::UnsupportedAlgorithm`] for an unknown key OID
    /// - [`crate::Error::InvalidParameters`] for DSA keys without domain parameters
    /// - [`crate::Error::Malformed`] if the key structure cannot be decoded
    pub fn from_public_key_info(
        algorithm_oid: &str,
        parameters: Option<&[u8]>,
        key: &[u8],
    ) -> Result<AsymmetricKey> {
        if algorithm_oid == KeyAlgorithm::Rsa.oid() {
            let sequence = asn1::decode(key)?;
            sequence.expect(tag::SEQUENCE)?;
            let mut reader = sequence.reader();
            let modulus = reader.read_tagged(tag::INTEGER)?.as_unsigned_bytes()?;
            let exponent = reader.read_tagged(tag::INTEGER)?.as_unsigned_bytes()?;
            reader.finish()?;

            let parameters = RsaParameters {
                modulus: modulus.to_vec(),
                exponent: exponent.to_vec(),
                d: None,
                p: None,
                q: None,
                dp: None,
                dq: None,
                inverse_q: None,
            };
            return Ok(AsymmetricKey::Rsa(RsaKey::from_parameters(&parameters)?));
        }

        if algorithm_oid == KeyAlgorithm::Dsa.oid() {
            let domain = match parameters {
                Some(der) if der.first() == Some(&tag::SEQUENCE) => asn1::decode(der)?,
                _ => {
                    return Err(InvalidParameters(
                        "DSA public key without domain parameters".to_string(),
                    ));
                }
            };
            let mut reader = domain.reader();
            let p = reader.read_tagged(tag::INTEGER)?.as_unsigned_bytes()?;
            let q = reader.read_tagged(tag::INTEGER)?.as_unsigned_bytes()?;
            let g = reader.read_tagged(tag::INTEGER)?.as_unsigned_bytes()?;
            reader.finish()?;

            let y = asn1::decode(key)?.as_unsigned_bytes()?;
            let parameters = DsaParameters {
                p: p.to_vec(),
                q: q.to_vec(),
                g: g.to_vec(),
                y: Some(y.to_vec()),
                x: None,
                j: None,
                seed: None,
                counter: None,
            };
            return Ok(AsymmetricKey::Dsa(DsaKey::from_parameters(&parameters)?));
        }

        Err(UnsupportedAlgorithm(algorithm_oid.to_string()))
    }

    /// The key's algorithm family.
    #[must_use]
    pub fn algorithm(&self) -> KeyAlgorithm {
        match self {
            AsymmetricKey::Rsa(_) => KeyAlgorithm::Rsa,
            AsymmetricKey::Dsa(_) => KeyAlgorithm::Dsa,
        }
    }

    /// Key size in bits (modulus length for RSA, `p` length for DSA).
    #[must_use]
    pub fn key_size(&self) -> usize {
        match self {
            AsymmetricKey::Rsa(key) => key.key_size(),
            AsymmetricKey::Dsa(key) => key.key_size(),
        }
    }

    /// True if the key can perform private operations.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        match self {
            AsymmetricKey::Rsa(key) => key.has_private_key(),
            AsymmetricKey::Dsa(key) => key.has_private_key(),
        }
    }

    /// Verifies a signature over a precomputed digest.
    ///
    /// RSA signatures are PKCS #1 v1.5 encoded; DSA signatures are the 40-byte `r || s` form
    /// and require a SHA-1 digest.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidLength`] for a digest of the wrong size
    /// - [`crate::Error::UnsupportedAlgorithm`] for a DSA signature over a non SHA-1 digest
    pub fn verify_signature(
        &self,
        algorithm: HashAlgorithm,
        hash: &[u8],
        signature: &[u8],
    ) -> Result<bool> {
        match self {
            AsymmetricKey::Rsa(key) => key.verify_hash(hash, algorithm, signature),
            AsymmetricKey::Dsa(key) => {
                if algorithm != HashAlgorithm::Sha1 {
                    return Err(UnsupportedAlgorithm(format!("DSA with {algorithm}")));
                }
                key.verify(hash, signature)
            }
        }
    }
}

impl From<RsaKey> for AsymmetricKey {
    fn from(key: RsaKey) -> Self {
        AsymmetricKey::Rsa(key)
    }
}

impl From<DsaKey> for AsymmetricKey {
    fn from(key: DsaKey) -> Self {
        AsymmetricKey::Dsa(key)
    }
}

/// `value⁻¹ mod modulus`, normalised into `[0, modulus)`.
pub(crate) fn mod_inverse(value: &BigUint, modulus: &BigUint) -> Option<BigUint> {
    let inverse = value.mod_inverse(modulus)?;
    let modulus = BigInt::from_biguint(Sign::Plus, modulus.clone());
    ((inverse % &modulus + &modulus) % &modulus).to_biguint()
}

/// Big-endian bytes of `value`, left-padded to at least `min_len` and then to a multiple of 4.
pub(crate) fn export_bytes(value: &BigUint, min_len: usize) -> Vec<u8> {
    let raw = value.to_bytes_be();
    let len = raw.len().max(min_len).div_ceil(4) * 4;
    let mut padded = vec![0; len - raw.len()];
    padded.extend_from_slice(&raw);
    padded
}

/// Big-endian bytes of `value` left-padded to exactly `len`, or `None` if it does not fit.
pub(crate) fn fixed_bytes(value: &BigUint, len: usize) -> Option<Vec<u8>> {
    let raw = value.to_bytes_be();
    let raw = match raw.iter().position(|&b| b != 0) {
        Some(first) => &raw[first..],
        None => &[][..],
    };
    if raw.len() > len {
        return None;
    }
    let mut padded = vec![0; len - raw.len()];
    padded.extend_from_slice(raw);
    Some(padded)
}
