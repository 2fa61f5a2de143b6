//! Cryptographic primitives backing certificate validation and key storage.
//!
//! This module groups everything that operates on key material or digests. Certificates and
//! CRLs only ever reach into it through [`registry`] (to map an OID onto an algorithm) and
//! [`asymmetric::AsymmetricKey`] (to verify a signature). The symmetric transform and the MAC
//! builders are independent leaves used directly by callers.
//!
//! # Key Components
//!
//! - [`HashAlgorithm`] - Digest selection and one-shot / incremental hashing
//! - [`registry`] - Process-wide OID to algorithm lookup
//! - [`asymmetric`] - RSA and DSA key engine, PKCS #1 formatting, key container blobs
//! - [`symmetric`] - Block ciphers, chaining modes and padding
//! - [`mac`] - HMAC and CBC-MAC builders
//!
//! # Examples
//!
//! ```rust
//! use certscope::crypto::{asymmetric::RsaKey, HashAlgorithm};
//!
//! let key = RsaKey::generate(512)?;
//! let hash = HashAlgorithm::Sha1.digest(b"test");
//! let signature = key.sign_hash(&hash, HashAlgorithm::Sha1)?;
//! assert!(key.verify_hash(&hash, HashAlgorithm::Sha1, &signature)?);
//! # Ok::<(), certscope::Error>(())
//! ```

pub mod asymmetric;
mod hash;
pub mod mac;
pub mod registry;
pub mod symmetric;

pub use hash::HashAlgorithm;
