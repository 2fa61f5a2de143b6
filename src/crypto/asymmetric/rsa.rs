//! RSA key generation and the raw / PKCS #1 v1.5 primitives.

use std::{fmt, sync::OnceLock};

use num_bigint_dig::{BigUint, RandBigInt, RandPrime};
use num_integer::Integer;
use num_traits::One;
use tracing::{debug, trace};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{export_bytes, fixed_bytes, mod_inverse, pkcs1, SecretScalar};
use crate::{
    crypto::HashAlgorithm,
    Error::{InvalidKeySize, InvalidLength, InvalidParameters, KeyUnavailable, NoPrivateKey},
    Result,
};

const MIN_KEY_SIZE: usize = 384;
const MAX_KEY_SIZE: usize = 16384;
const KEY_SIZE_STEP: usize = 8;
const DEFAULT_EXPONENT: u32 = 65537;

/// Numeric fields of an RSA key as big-endian byte strings.
///
/// `modulus` and `exponent` are mandatory on import. `d` is optional, and the five CRT
/// fields must be supplied together or not at all. Private fields are wiped when the value is
/// dropped.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct RsaParameters {
    /// Modulus `n`
    pub modulus: Vec<u8>,
    /// Public exponent `e`
    pub exponent: Vec<u8>,
    /// Private exponent `d`
    pub d: Option<Vec<u8>>,
    /// First prime `p`
    pub p: Option<Vec<u8>>,
    /// Second prime `q`
    pub q: Option<Vec<u8>>,
    /// `d mod (p - 1)`
    pub dp: Option<Vec<u8>>,
    /// `d mod (q - 1)`
    pub dq: Option<Vec<u8>>,
    /// `q⁻¹ mod p`
    pub inverse_q: Option<Vec<u8>>,
}

impl fmt::Debug for RsaParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaParameters")
            .field("modulus", &hex::encode(&self.modulus))
            .field("exponent", &hex::encode(&self.exponent))
            .field("private", &self.d.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
struct Crt {
    p: SecretScalar,
    q: SecretScalar,
    dp: SecretScalar,
    dq: SecretScalar,
    inverse_q: SecretScalar,
}

#[derive(Debug, Clone)]
struct RsaMaterial {
    n: BigUint,
    e: BigUint,
    d: Option<SecretScalar>,
    crt: Option<Crt>,
}

impl RsaMaterial {
    fn generate(bits: usize, e: &BigUint) -> Result<RsaMaterial> {
        let mut rng = rand::thread_rng();
        let one = BigUint::one();
        let p_bits = (bits + 1) / 2;
        let q_bits = bits - p_bits;

        loop {
            let p = loop {
                let candidate: BigUint = rng.gen_prime(p_bits);
                if (&candidate - &one).gcd(e).is_one() {
                    break SecretScalar::new(candidate);
                }
                trace!("rejected p candidate sharing a factor with e");
            };

            let q = loop {
                let candidate: BigUint = rng.gen_prime(q_bits);
                if &candidate != p.expose() && (&candidate - &one).gcd(e).is_one() {
                    break SecretScalar::new(candidate);
                }
                trace!("rejected q candidate");
            };

            let n = p.expose() * q.expose();
            if n.bits() != bits {
                debug!(
                    "modulus has {} bits instead of {}, retrying",
                    n.bits(),
                    bits
                );
                continue;
            }

            let (p, q) = if p.expose() < q.expose() { (q, p) } else { (p, q) };
            let p_1 = SecretScalar::new(p.expose() - &one);
            let q_1 = SecretScalar::new(q.expose() - &one);
            let phi = SecretScalar::new(p_1.expose() * q_1.expose());

            let (Some(d), Some(inverse_q)) = (
                mod_inverse(e, phi.expose()).map(SecretScalar::new),
                mod_inverse(q.expose(), p.expose()).map(SecretScalar::new),
            ) else {
                debug!("non-invertible parameters, retrying");
                continue;
            };

            let crt = Crt {
                dp: SecretScalar::new(d.expose() % p_1.expose()),
                dq: SecretScalar::new(d.expose() % q_1.expose()),
                inverse_q,
                p,
                q,
            };

            debug!("generated {} bit RSA key", bits);
            return Ok(RsaMaterial {
                n,
                e: e.clone(),
                d: Some(d),
                crt: Some(crt),
            });
        }
    }

    fn from_parameters(parameters: &RsaParameters) -> Result<RsaMaterial> {
        let n = BigUint::from_bytes_be(&parameters.modulus);
        let e = BigUint::from_bytes_be(&parameters.exponent);
        if n.bits() == 0 {
            return Err(InvalidParameters("RSA modulus is missing".to_string()));
        }
        if n <= BigUint::from(2_u32) {
            return Err(InvalidParameters("RSA modulus is too small".to_string()));
        }
        if e.bits() == 0 {
            return Err(InvalidParameters("RSA exponent is missing".to_string()));
        }

        let d = parameters
            .d
            .as_deref()
            .map(|d| SecretScalar::new(BigUint::from_bytes_be(d)));

        let crt_fields = [
            &parameters.p,
            &parameters.q,
            &parameters.dp,
            &parameters.dq,
            &parameters.inverse_q,
        ];
        let present = crt_fields.iter().filter(|field| field.is_some()).count();

        let crt = match (
            &parameters.p,
            &parameters.q,
            &parameters.dp,
            &parameters.dq,
            &parameters.inverse_q,
        ) {
            (Some(p), Some(q), Some(dp), Some(dq), Some(inverse_q)) => {
                let scalar = |bytes: &[u8]| SecretScalar::new(BigUint::from_bytes_be(bytes));
                let one = BigUint::one();
                if BigUint::from_bytes_be(p) <= one || BigUint::from_bytes_be(q) <= one {
                    return Err(InvalidParameters("RSA primes must exceed 1".to_string()));
                }
                Some(Crt {
                    p: scalar(p),
                    q: scalar(q),
                    dp: scalar(dp),
                    dq: scalar(dq),
                    inverse_q: scalar(inverse_q),
                })
            }
            _ if present == 0 => None,
            _ => {
                return Err(InvalidParameters(format!(
                    "{present} of 5 CRT parameters supplied"
                )));
            }
        };

        Ok(RsaMaterial { n, e, d, crt })
    }

    fn modulus_len(&self) -> usize {
        self.n.bits().div_ceil(8)
    }

    fn public_op(&self, input: &BigUint) -> BigUint {
        input.modpow(&self.e, &self.n)
    }

    fn private_op(&self, input: &BigUint) -> Result<BigUint> {
        if self.d.is_none() && self.crt.is_none() {
            return Err(NoPrivateKey);
        }

        // blind the input so timing does not depend on it
        let mut rng = rand::thread_rng();
        let two = BigUint::from(2_u32);
        let (r, r_inverse) = loop {
            let r = rng.gen_biguint_range(&two, &self.n);
            if let Some(inverse) = mod_inverse(&r, &self.n) {
                break (r, inverse);
            }
        };
        let blinded = (input * self.public_op(&r)) % &self.n;

        let result = match (&self.crt, &self.d) {
            (Some(crt), _) => {
                let p = crt.p.expose();
                let q = crt.q.expose();
                let m1 = blinded.modpow(crt.dp.expose(), p);
                let m2 = blinded.modpow(crt.dq.expose(), q);
                let h = (crt.inverse_q.expose() * ((&m1 + p - (&m2 % p)) % p)) % p;
                m2 + h * q
            }
            (None, Some(d)) => blinded.modpow(d.expose(), &self.n),
            (None, None) => return Err(NoPrivateKey),
        };

        Ok((result * r_inverse) % &self.n)
    }
}

/// An RSA key pair or public key.
///
/// # Examples
///
/// ```rust
/// use certscope::crypto::asymmetric::RsaKey;
///
/// let key = RsaKey::new(512)?; // generated on first use
/// let ciphertext = key.encrypt_value(b"secret")?;
/// assert_eq!(ciphertext.len(), 64);
///
/// let plaintext = key.decrypt_value(&ciphertext)?;
/// assert_eq!(&plaintext[plaintext.len() - 6..], b"secret");
///
/// let public = key.export_parameters(false)?;
/// assert!(public.d.is_none());
/// # Ok::<(), certscope::Error>(())
/// ```
#[derive(Clone)]
pub struct RsaKey {
    key_size: usize,
    exponent: BigUint,
    material: OnceLock<RsaMaterial>,
}

impl fmt::Debug for RsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaKey")
            .field("key_size", &self.key_size())
            .field("generated", &self.material.get().is_some())
            .finish()
    }
}

impl RsaKey {
    /// Legal key sizes in bits: `(min, max, step)`.
    pub const LEGAL_KEY_SIZES: (usize, usize, usize) = (MIN_KEY_SIZE, MAX_KEY_SIZE, KEY_SIZE_STEP);

    /// Default key size in bits.
    pub const DEFAULT_KEY_SIZE: usize = 1024;

    /// Creates a key that is generated on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKeySize`] for an illegal size.
    pub fn new(bits: usize) -> Result<RsaKey> {
        validate_size(bits)?;
        Ok(RsaKey {
            key_size: bits,
            exponent: BigUint::from(DEFAULT_EXPONENT),
            material: OnceLock::new(),
        })
    }

    /// Generates a key pair now, with public exponent 65537.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKeySize`] for an illegal size.
    pub fn generate(bits: usize) -> Result<RsaKey> {
        Self::generate_with_exponent(bits, DEFAULT_EXPONENT)
    }

    /// Generates a key pair now with a custom odd public exponent.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidKeySize`] for an illegal size
    /// - [`crate::Error::InvalidParameters`] for an even exponent or one below 3
    pub fn generate_with_exponent(bits: usize, exponent: u32) -> Result<RsaKey> {
        validate_size(bits)?;
        if exponent < 3 || exponent % 2 == 0 {
            return Err(InvalidParameters(format!(
                "public exponent {exponent} must be odd and at least 3"
            )));
        }

        let exponent = BigUint::from(exponent);
        let material = RsaMaterial::generate(bits, &exponent)?;
        Ok(RsaKey {
            key_size: bits,
            exponent,
            material: OnceLock::from(material),
        })
    }

    /// Creates a key from imported parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameters`] if the modulus or exponent is missing or the
    /// CRT fields are incomplete.
    pub fn from_parameters(parameters: &RsaParameters) -> Result<RsaKey> {
        let material = RsaMaterial::from_parameters(parameters)?;
        Ok(RsaKey {
            key_size: material.n.bits(),
            exponent: material.e.clone(),
            material: OnceLock::from(material),
        })
    }

    /// Replaces the key with imported parameters.
    ///
    /// # Errors
    ///
    /// See [`RsaKey::from_parameters`]. The key is unchanged on error.
    pub fn import_parameters(&mut self, parameters: &RsaParameters) -> Result<()> {
        *self = Self::from_parameters(parameters)?;
        Ok(())
    }

    /// Exports the key's numeric fields.
    ///
    /// Fields are left-padded: the modulus and `d` to the modulus length, the CRT values to half
    /// of it, and every field to a multiple of four bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::KeyUnavailable`] if `include_private` is set but `d` or any CRT
    /// value is missing.
    pub fn export_parameters(&self, include_private: bool) -> Result<RsaParameters> {
        let material = self.material()?;
        let k = material.modulus_len();

        let mut parameters = RsaParameters {
            modulus: export_bytes(&material.n, k),
            exponent: export_bytes(&material.e, 0),
            d: None,
            p: None,
            q: None,
            dp: None,
            dq: None,
            inverse_q: None,
        };

        if include_private {
            let (Some(d), Some(crt)) = (&material.d, &material.crt) else {
                return Err(KeyUnavailable);
            };
            let half = k.div_ceil(2);
            parameters.d = Some(export_bytes(d.expose(), k));
            parameters.p = Some(export_bytes(crt.p.expose(), half));
            parameters.q = Some(export_bytes(crt.q.expose(), half));
            parameters.dp = Some(export_bytes(crt.dp.expose(), half));
            parameters.dq = Some(export_bytes(crt.dq.expose(), half));
            parameters.inverse_q = Some(export_bytes(crt.inverse_q.expose(), half));
        }

        Ok(parameters)
    }

    /// Modulus length in bits.
    #[must_use]
    pub fn key_size(&self) -> usize {
        self.material
            .get()
            .map_or(self.key_size, |material| material.n.bits())
    }

    /// True unless the key was imported without private material.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.material
            .get()
            .map_or(true, |material| {
                material.d.is_some() || material.crt.is_some()
            })
    }

    /// True once the key material exists.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.material.get().is_some()
    }

    /// Raw public operation `m^e mod n`, left-padded to the modulus length.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameters`] if the value is not below the modulus.
    pub fn encrypt_value(&self, value: &[u8]) -> Result<Vec<u8>> {
        let material = self.material()?;
        let m = below_modulus(material, value)?;
        to_modulus_len(material, &material.public_op(&m))
    }

    /// Raw private operation `c^d mod n`, left-padded to the modulus length.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidParameters`] if the value is not below the modulus
    /// - [`crate::Error::NoPrivateKey`] for a public-only key
    pub fn decrypt_value(&self, value: &[u8]) -> Result<Vec<u8>> {
        let material = self.material()?;
        let c = below_modulus(material, value)?;
        to_modulus_len(material, &material.private_op(&c)?)
    }

    /// Raw, padding-agnostic signature `m^d mod n`.
    ///
    /// # Errors
    ///
    /// See [`RsaKey::decrypt_value`].
    pub fn sign_raw(&self, value: &[u8]) -> Result<Vec<u8>> {
        self.decrypt_value(value)
    }

    /// Checks a raw signature: `signature^e mod n == value`.
    ///
    /// Signatures that are not below the modulus simply fail verification.
    ///
    /// # Errors
    ///
    /// Only fails if the lazy key cannot be generated.
    pub fn verify_raw(&self, value: &[u8], signature: &[u8]) -> Result<bool> {
        let material = self.material()?;
        let s = BigUint::from_bytes_be(signature);
        if s >= material.n {
            return Ok(false);
        }
        Ok(material.public_op(&s) == BigUint::from_bytes_be(value))
    }

    /// PKCS #1 v1.5 signature over a precomputed digest.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidLength`] if `hash` does not match the digest size
    /// - [`crate::Error::InvalidParameters`] if the modulus is too short for the encoding
    /// - [`crate::Error::NoPrivateKey`] for a public-only key
    pub fn sign_hash(&self, hash: &[u8], algorithm: HashAlgorithm) -> Result<Vec<u8>> {
        let material = self.material()?;
        let message = pkcs1::encode(hash, algorithm, material.modulus_len())?;
        self.sign_raw(&message)
    }

    /// Verifies a PKCS #1 v1.5 signature over a precomputed digest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidLength`] if `hash` does not match the digest size.
    pub fn verify_hash(
        &self,
        hash: &[u8],
        algorithm: HashAlgorithm,
        signature: &[u8],
    ) -> Result<bool> {
        if hash.len() != algorithm.output_size() {
            return Err(InvalidLength {
                expected: algorithm.output_size(),
                actual: hash.len(),
            });
        }

        let material = self.material()?;
        let k = material.modulus_len();
        if signature.len() > k {
            return Ok(false);
        }
        let s = BigUint::from_bytes_be(signature);
        if s >= material.n {
            return Ok(false);
        }

        let Some(message) = fixed_bytes(&material.public_op(&s), k) else {
            return Ok(false);
        };
        pkcs1::matches(&message, hash, algorithm)
    }

    fn material(&self) -> Result<&RsaMaterial> {
        if let Some(material) = self.material.get() {
            return Ok(material);
        }
        let generated = RsaMaterial::generate(self.key_size, &self.exponent)?;
        Ok(self.material.get_or_init(|| generated))
    }
}

fn validate_size(bits: usize) -> Result<()> {
    if !(MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&bits) || bits % KEY_SIZE_STEP != 0 {
        return Err(InvalidKeySize(bits));
    }
    Ok(())
}

fn below_modulus(material: &RsaMaterial, value: &[u8]) -> Result<BigUint> {
    let value = BigUint::from_bytes_be(value);
    if value >= material.n {
        return Err(InvalidParameters(
            "input is not smaller than the modulus".to_string(),
        ));
    }
    Ok(value)
}

fn to_modulus_len(material: &RsaMaterial, value: &BigUint) -> Result<Vec<u8>> {
    fixed_bytes(value, material.modulus_len())
        .ok_or_else(|| InvalidParameters("result exceeds the modulus length".to_string()))
}
