//! DSA (FIPS 186-2) domain parameter generation, signing and verification.
//!
//! Domain parameters are generated with the seeded construction of FIPS 186-2 appendix 2.2, and
//! the seed and counter are kept so that imported parameters carrying them can be re-validated.
//! Only SHA-1 sized (160-bit) `q` values are supported, which limits `p` to 1024 bits.

use std::{fmt, sync::OnceLock};

use num_bigint_dig::{prime::probably_prime, BigUint, RandBigInt};
use num_integer::Integer;
use num_traits::{One, Zero};
use rand::RngCore;
use tracing::{debug, trace};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{export_bytes, fixed_bytes, mod_inverse, SecretScalar};
use crate::{
    crypto::HashAlgorithm,
    Error::{InvalidKeySize, InvalidLength, InvalidParameters, KeyUnavailable, NoPrivateKey},
    Result,
};

const MIN_KEY_SIZE: usize = 512;
const MAX_KEY_SIZE: usize = 1024;
const KEY_SIZE_STEP: usize = 64;
const MAX_COUNTER: u32 = 4096;
const PRIME_ROUNDS: usize = 50;

/// Length of the SHA-1 sized values: `q`, `x`, the seed and each half of a signature.
const Q_LEN: usize = 20;

/// Numeric fields of a DSA key as big-endian byte strings.
///
/// `p`, `q` and `g` are mandatory on import together with at least one of `x` and `y`. When a
/// `seed` is supplied the domain parameters are re-derived from it and must match.
#[derive(Clone, Default, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct DsaParameters {
    /// Prime modulus `p`
    pub p: Vec<u8>,
    /// Prime divisor `q` of `p - 1`
    pub q: Vec<u8>,
    /// Generator `g`
    pub g: Vec<u8>,
    /// Public value `y = g^x mod p`
    pub y: Option<Vec<u8>>,
    /// Private value `x`
    pub x: Option<Vec<u8>>,
    /// Cofactor `(p - 1) / q`
    pub j: Option<Vec<u8>>,
    /// Generation seed
    pub seed: Option<Vec<u8>>,
    /// Generation counter
    pub counter: Option<u32>,
}

impl fmt::Debug for DsaParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsaParameters")
            .field("p", &hex::encode(&self.p))
            .field("q", &hex::encode(&self.q))
            .field("g", &hex::encode(&self.g))
            .field("y", &self.y.as_ref().map(hex::encode))
            .field("private", &self.x.is_some())
            .field("counter", &self.counter)
            .finish()
    }
}

#[derive(Debug, Clone)]
struct DsaMaterial {
    p: BigUint,
    q: BigUint,
    g: BigUint,
    y: BigUint,
    x: Option<SecretScalar>,
    j: Option<BigUint>,
    seed: Option<Vec<u8>>,
    counter: Option<u32>,
}

/// Result of the seeded prime search.
struct Domain {
    p: BigUint,
    q: BigUint,
    seed: Vec<u8>,
    counter: u32,
}

/// `SHA1((seed + offset) mod 2^160)` as an integer.
fn seed_hash(seed: &BigUint, offset: u64) -> BigUint {
    let modulus = BigUint::one() << 160;
    let value = (seed + BigUint::from(offset)) % modulus;
    let bytes = fixed_bytes(&value, Q_LEN).unwrap_or_default();
    BigUint::from_bytes_be(&HashAlgorithm::Sha1.digest(&bytes))
}

/// Derives `q` from a seed: `U = SHA1(seed) xor SHA1(seed + 1)`, top and bottom bits set.
fn derive_q(seed: &BigUint) -> BigUint {
    let u = seed_hash(seed, 0) ^ seed_hash(seed, 1);
    u | (BigUint::one() << 159) | BigUint::one()
}

/// Candidate `p` for a given counter, following FIPS 186-2 steps 7 to 9.
fn derive_p(seed: &BigUint, q: &BigUint, bits: usize, counter: u32) -> BigUint {
    let n = (bits - 1) / 160;
    let b = (bits - 1) % 160;
    let offset = 2 + u64::from(counter) * (n as u64 + 1);

    let mut w = BigUint::zero();
    for k in 0..=n {
        let mut v = seed_hash(seed, offset + k as u64);
        if k == n {
            v %= BigUint::one() << b;
        }
        w += v << (160 * k);
    }

    let x = w + (BigUint::one() << (bits - 1));
    let c = &x % (q << 1);
    // p = X - (c - 1), with c <= X
    x + BigUint::one() - c
}

fn generate_domain(bits: usize) -> Domain {
    let mut rng = rand::thread_rng();
    let lower = BigUint::one() << (bits - 1);

    loop {
        let mut seed_bytes = vec![0_u8; Q_LEN];
        rng.fill_bytes(&mut seed_bytes);
        let seed = BigUint::from_bytes_be(&seed_bytes);

        let q = derive_q(&seed);
        if !probably_prime(&q, PRIME_ROUNDS) {
            trace!("seed did not yield a prime q");
            continue;
        }

        for counter in 0..MAX_COUNTER {
            let p = derive_p(&seed, &q, bits, counter);
            if p >= lower && probably_prime(&p, PRIME_ROUNDS) {
                debug!("found {} bit DSA prime at counter {}", bits, counter);
                return Domain {
                    p,
                    q,
                    seed: seed_bytes,
                    counter,
                };
            }
        }
        debug!("exhausted {} candidates, choosing a new seed", MAX_COUNTER);
    }
}

impl DsaMaterial {
    fn generate(bits: usize) -> DsaMaterial {
        let mut rng = rand::thread_rng();
        let domain = generate_domain(bits);
        let one = BigUint::one();
        let j = (&domain.p - &one) / &domain.q;

        let two = BigUint::from(2_u32);
        let p_1 = &domain.p - &one;
        let g = loop {
            let h = rng.gen_biguint_range(&two, &p_1);
            let g = h.modpow(&j, &domain.p);
            if g > one {
                break g;
            }
        };

        let x = rng.gen_biguint_range(&one, &domain.q);
        let y = g.modpow(&x, &domain.p);

        DsaMaterial {
            p: domain.p,
            q: domain.q,
            g,
            y,
            x: Some(SecretScalar::new(x)),
            j: Some(j),
            seed: Some(domain.seed),
            counter: Some(domain.counter),
        }
    }

    fn from_parameters(parameters: &DsaParameters) -> Result<DsaMaterial> {
        let p = BigUint::from_bytes_be(&parameters.p);
        let q = BigUint::from_bytes_be(&parameters.q);
        let g = BigUint::from_bytes_be(&parameters.g);
        if p.is_zero() || q.is_zero() || g.is_zero() {
            return Err(InvalidParameters("DSA p, q and g are mandatory".to_string()));
        }
        if q.bits() != Q_LEN * 8 || p <= q {
            return Err(InvalidParameters(format!(
                "DSA q must be a {} bit divisor of p - 1",
                Q_LEN * 8
            )));
        }
        let one = BigUint::one();
        let (j, remainder) = (&p - &one).div_rem(&q);
        if !remainder.is_zero() {
            return Err(InvalidParameters("DSA q does not divide p - 1".to_string()));
        }
        if g <= one || g >= p {
            return Err(InvalidParameters("DSA g is out of range".to_string()));
        }
        if let Some(supplied) = &parameters.j {
            if BigUint::from_bytes_be(supplied) != j {
                return Err(InvalidParameters("DSA j is not (p - 1) / q".to_string()));
            }
        }

        let x = parameters
            .x
            .as_deref()
            .map(|x| SecretScalar::new(BigUint::from_bytes_be(x)));
        if let Some(x) = &x {
            if x.expose().is_zero() || x.expose() >= &q {
                return Err(InvalidParameters("DSA x is out of range".to_string()));
            }
        }

        let y = match (&parameters.y, &x) {
            (Some(y), _) => BigUint::from_bytes_be(y),
            (None, Some(x)) => g.modpow(x.expose(), &p),
            (None, None) => {
                return Err(InvalidParameters(
                    "DSA key needs at least one of x and y".to_string(),
                ));
            }
        };
        if let (Some(_), Some(x)) = (&parameters.y, &x) {
            if g.modpow(x.expose(), &p) != y {
                return Err(InvalidParameters("DSA y does not match x".to_string()));
            }
        }

        if let Some(seed) = &parameters.seed {
            let seed_value = BigUint::from_bytes_be(seed);
            if derive_q(&seed_value) != q {
                return Err(InvalidParameters("DSA q does not match the seed".to_string()));
            }
            if let Some(counter) = parameters.counter {
                if counter >= MAX_COUNTER || derive_p(&seed_value, &q, p.bits(), counter) != p {
                    return Err(InvalidParameters(
                        "DSA p does not match the seed and counter".to_string(),
                    ));
                }
            }
        }

        Ok(DsaMaterial {
            j: Some(j),
            seed: parameters.seed.clone(),
            counter: parameters.counter,
            p,
            q,
            g,
            y,
            x,
        })
    }
}

/// A DSA key pair or public key.
///
/// # Examples
///
/// ```rust,no_run
/// use certscope::crypto::{asymmetric::DsaKey, HashAlgorithm};
///
/// let key = DsaKey::generate(512)?;
/// let hash = HashAlgorithm::Sha1.digest(b"test");
/// let signature = key.sign(&hash)?;
/// assert_eq!(signature.len(), 40);
/// assert!(key.verify(&hash, &signature)?);
/// # Ok::<(), certscope::Error>(())
/// ```
#[derive(Clone)]
pub struct DsaKey {
    key_size: usize,
    material: OnceLock<DsaMaterial>,
}

impl fmt::Debug for DsaKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DsaKey")
            .field("key_size", &self.key_size())
            .field("generated", &self.material.get().is_some())
            .finish()
    }
}

impl DsaKey {
    /// Legal key sizes in bits: `(min, max, step)`.
    pub const LEGAL_KEY_SIZES: (usize, usize, usize) = (MIN_KEY_SIZE, MAX_KEY_SIZE, KEY_SIZE_STEP);

    /// Default key size in bits.
    pub const DEFAULT_KEY_SIZE: usize = 1024;

    /// Creates a key that is generated on first use.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKeySize`] for an illegal size.
    pub fn new(bits: usize) -> Result<DsaKey> {
        validate_size(bits)?;
        Ok(DsaKey {
            key_size: bits,
            material: OnceLock::new(),
        })
    }

    /// Generates domain parameters and a key pair now.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidKeySize`] for an illegal size.
    pub fn generate(bits: usize) -> Result<DsaKey> {
        validate_size(bits)?;
        Ok(DsaKey {
            key_size: bits,
            material: OnceLock::from(DsaMaterial::generate(bits)),
        })
    }

    /// Creates a key from imported parameters.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameters`] if mandatory fields are missing or the
    /// parameters are inconsistent with each other or with the seed.
    pub fn from_parameters(parameters: &DsaParameters) -> Result<DsaKey> {
        let material = DsaMaterial::from_parameters(parameters)?;
        Ok(DsaKey {
            key_size: material.p.bits(),
            material: OnceLock::from(material),
        })
    }

    /// Replaces the key with imported parameters.
    ///
    /// # Errors
    ///
    /// See [`DsaKey::from_parameters`]. The key is unchanged on error.
    pub fn import_parameters(&mut self, parameters: &DsaParameters) -> Result<()> {
        *self = Self::from_parameters(parameters)?;
        Ok(())
    }

    /// Exports the key's numeric fields, each left-padded to a multiple of four bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::KeyUnavailable`] if `include_private` is set on a public key.
    pub fn export_parameters(&self, include_private: bool) -> Result<DsaParameters> {
        let material = self.material();

        let x = if include_private {
            let Some(x) = &material.x else {
                return Err(KeyUnavailable);
            };
            Some(export_bytes(x.expose(), Q_LEN))
        } else {
            None
        };

        Ok(DsaParameters {
            p: export_bytes(&material.p, 0),
            q: export_bytes(&material.q, 0),
            g: export_bytes(&material.g, 0),
            y: Some(export_bytes(&material.y, 0)),
            x,
            j: material.j.as_ref().map(|j| export_bytes(j, 0)),
            seed: material.seed.clone(),
            counter: material.counter,
        })
    }

    /// Length of `p` in bits.
    #[must_use]
    pub fn key_size(&self) -> usize {
        self.material
            .get()
            .map_or(self.key_size, |material| material.p.bits())
    }

    /// True unless the key was imported without `x`.
    #[must_use]
    pub fn has_private_key(&self) -> bool {
        self.material
            .get()
            .map_or(true, |material| material.x.is_some())
    }

    /// True once the key material exists.
    #[must_use]
    pub fn is_generated(&self) -> bool {
        self.material.get().is_some()
    }

    /// Signs a 20-byte SHA-1 digest, returning `r || s` with each half padded to 20 bytes.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidLength`] if `hash` is not 20 bytes
    /// - [`crate::Error::NoPrivateKey`] for a public-only key
    pub fn sign(&self, hash: &[u8]) -> Result<Vec<u8>> {
        check_len(Q_LEN, hash.len())?;
        let material = self.material();
        let Some(x) = &material.x else {
            return Err(NoPrivateKey);
        };

        let mut rng = rand::thread_rng();
        let one = BigUint::one();
        let h = BigUint::from_bytes_be(hash);
        let q = &material.q;

        loop {
            let k = SecretScalar::new(rng.gen_biguint_range(&one, q));
            let r = material.g.modpow(k.expose(), &material.p) % q;
            if r.is_zero() {
                continue;
            }
            let Some(k_inverse) = mod_inverse(k.expose(), q).map(SecretScalar::new) else {
                continue;
            };
            let s = (k_inverse.expose() * (&h + x.expose() * &r)) % q;
            if s.is_zero() {
                continue;
            }

            let (Some(mut signature), Some(s)) = (fixed_bytes(&r, Q_LEN), fixed_bytes(&s, Q_LEN))
            else {
                return Err(InvalidParameters("DSA q exceeds 160 bits".to_string()));
            };
            signature.extend_from_slice(&s);
            return Ok(signature);
        }
    }

    /// Verifies a 40-byte `r || s` signature over a 20-byte digest.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidLength`] if `hash` is not 20 bytes or `signature` is not
    /// 40 bytes.
    pub fn verify(&self, hash: &[u8], signature: &[u8]) -> Result<bool> {
        check_len(Q_LEN, hash.len())?;
        check_len(2 * Q_LEN, signature.len())?;

        let material = self.material();
        let q = &material.q;
        let r = BigUint::from_bytes_be(&signature[..Q_LEN]);
        let s = BigUint::from_bytes_be(&signature[Q_LEN..]);
        if r.is_zero() || &r >= q || s.is_zero() || &s >= q {
            return Ok(false);
        }

        let Some(w) = mod_inverse(&s, q) else {
            return Ok(false);
        };
        let h = BigUint::from_bytes_be(hash);
        let u1 = (h * &w) % q;
        let u2 = (&r * &w) % q;
        let v = ((material.g.modpow(&u1, &material.p) * material.y.modpow(&u2, &material.p))
            % &material.p)
            % q;

        Ok(v == r)
    }

    fn material(&self) -> &DsaMaterial {
        self.material
            .get_or_init(|| DsaMaterial::generate(self.key_size))
    }
}

fn validate_size(bits: usize) -> Result<()> {
    if !(MIN_KEY_SIZE..=MAX_KEY_SIZE).contains(&bits) || bits % KEY_SIZE_STEP != 0 {
        return Err(InvalidKeySize(bits));
    }
    Ok(())
}

fn check_len(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(InvalidLength { expected, actual });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::OnceLock;

    use super::*;
    use crate::Error;

    /// Generation is slow, share one 512-bit key across the tests.
    fn shared_key() -> &'static DsaKey {
        static KEY: OnceLock<DsaKey> = OnceLock::new();
        KEY.get_or_init(|| DsaKey::generate(512).unwrap())
    }

    #[test]
    fn generated_domain_is_consistent() {
        let key = shared_key();
        assert_eq!(key.key_size(), 512);

        let parameters = key.export_parameters(true).unwrap();
        let p = BigUint::from_bytes_be(&parameters.p);
        let q = BigUint::from_bytes_be(&parameters.q);
        let g = BigUint::from_bytes_be(&parameters.g);
        let j = BigUint::from_bytes_be(parameters.j.as_ref().unwrap());

        assert_eq!(q.bits(), 160);
        assert_eq!(p.bits(), 512);
        assert_eq!(&j * &q + BigUint::one(), p);
        assert_eq!(g.modpow(&q, &p), BigUint::one());
        assert_eq!(parameters.seed.as_ref().unwrap().len(), 20);
        assert!(parameters.counter.unwrap() < MAX_COUNTER);
        assert_eq!(parameters.x.as_ref().unwrap().len(), 20);
    }

    #[test]
    fn sign_verify() {
        let key = shared_key();
        let hash = HashAlgorithm::Sha1.digest(b"test");
        let signature = key.sign(&hash).unwrap();
        assert_eq!(signature.len(), 40);
        assert!(key.verify(&hash, &signature).unwrap());

        let other = HashAlgorithm::Sha1.digest(b"other");
        assert!(!key.verify(&other, &signature).unwrap());
    }

    #[test]
    fn flipped_bits_fail() {
        let key = shared_key();
        let hash = HashAlgorithm::Sha1.digest(b"flip");
        let signature = key.sign(&hash).unwrap();

        for byte in [0, 7, 19, 20, 31, 39] {
            let mut tampered = signature.clone();
            tampered[byte] ^= 0x10;
            assert!(!key.verify(&hash, &tampered).unwrap(), "byte {byte}");
        }
    }

    #[test]
    fn length_checks() {
        let key = shared_key();
        assert!(matches!(
            key.sign(&[0; 16]),
            Err(Error::InvalidLength {
                expected: 20,
                actual: 16
            })
        ));
        assert!(matches!(
            key.verify(&[0; 20], &[1; 41]),
            Err(Error::InvalidLength {
                expected: 40,
                actual: 41
            })
        ));
        assert!(!key.verify(&[0; 20], &[0; 40]).unwrap());
    }

    #[test]
    fn import_round_trip_and_validation() {
        let key = shared_key();
        let full = key.export_parameters(true).unwrap();

        // seeded import re-derives p and q
        let imported = DsaKey::from_parameters(&full).unwrap();
        let hash = HashAlgorithm::Sha1.digest(b"import");
        assert!(key.verify(&hash, &imported.sign(&hash).unwrap()).unwrap());

        // y derived from x
        let mut without_y = full.clone();
        without_y.y = None;
        let derived = DsaKey::from_parameters(&without_y).unwrap();
        assert_eq!(derived.export_parameters(false).unwrap().y, full.y);

        // wrong seed
        let mut bad_seed = full.clone();
        if let Some(seed) = bad_seed.seed.as_mut() {
            seed[19] ^= 0x01;
        }
        assert!(matches!(
            DsaKey::from_parameters(&bad_seed),
            Err(Error::InvalidParameters(_))
        ));

        // neither x nor y
        let mut neither = full.clone();
        neither.x = None;
        neither.y = None;
        assert!(DsaKey::from_parameters(&neither).is_err());

        assert!(DsaKey::from_parameters(&DsaParameters::default()).is_err());
    }

    #[test]
    fn cofactor_is_derived_on_import() {
        let key = shared_key();
        let full = key.export_parameters(true).unwrap();

        let mut without_j = full.clone();
        without_j.j = None;
        let imported = DsaKey::from_parameters(&without_j).unwrap();
        assert_eq!(imported.export_parameters(true).unwrap(), full);

        let mut wrong_j = full.clone();
        wrong_j.j = Some(vec![0x01]);
        assert!(matches!(
            DsaKey::from_parameters(&wrong_j),
            Err(Error::InvalidParameters(_))
        ));
    }

    #[test]
    fn degenerate_domains_are_rejected() {
        let full = shared_key().export_parameters(true).unwrap();

        for q in [vec![0x01], vec![0x02], vec![0x7F; 20]] {
            let mut parameters = full.clone();
            parameters.q = q;
            parameters.seed = None;
            assert!(matches!(
                DsaKey::from_parameters(&parameters),
                Err(Error::InvalidParameters(_))
            ));
        }

        let mut bad_g = full.clone();
        bad_g.g = vec![0x01];
        assert!(DsaKey::from_parameters(&bad_g).is_err());

        let mut bad_x = full.clone();
        bad_x.x = Some(full.q.clone());
        bad_x.y = None;
        assert!(DsaKey::from_parameters(&bad_x).is_err());
    }

    #[test]
    fn public_export() {
        let key = shared_key();
        let public = key.export_parameters(false).unwrap();
        assert!(public.x.is_none());
        assert!(public.p.len() % 4 == 0 && public.g.len() % 4 == 0);

        let verifier = DsaKey::from_parameters(&public).unwrap();
        assert!(!verifier.has_private_key());
        assert!(matches!(
            verifier.sign(&[0; 20]),
            Err(Error::NoPrivateKey)
        ));
        assert!(matches!(
            verifier.export_parameters(true),
            Err(Error::KeyUnavailable)
        ));
    }

    #[test]
    fn key_sizes() {
        assert!(matches!(DsaKey::new(448), Err(Error::InvalidKeySize(448))));
        assert!(DsaKey::new(2048).is_err());
        assert!(DsaKey::new(520).is_err());
        let lazy = DsaKey::new(576).unwrap();
        assert!(!lazy.is_generated());
        assert_eq!(lazy.key_size(), 576);
    }
}
