//! Process-wide OID registry for signature, digest and public-key algorithms.
//!
//! Certificates and CRLs name their algorithms by object identifier. The registry resolves those
//! OIDs into the crate's own types: a signature OID maps to the pair of
//! [`crate::crypto::HashAlgorithm`] and [`crate::crypto::asymmetric::KeyAlgorithm`] needed to
//! verify it, a digest OID to a hash, and a key OID to a key algorithm.
//!
//! The tables are built once on first use and are read-only afterwards, so lookups are safe from
//! any thread without locking.
//!
//! # Examples
//!
//! ```rust
//! use certscope::crypto::{registry, HashAlgorithm, asymmetric::KeyAlgorithm};
//!
//! let alg = registry::signature_algorithm("1.2.840.113549.1.1.5")?;
//! assert_eq!(alg.hash, HashAlgorithm::Sha1);
//! assert_eq!(alg.key, KeyAlgorithm::Rsa);
//! assert_eq!(alg.name, "sha1RSA");
//!
//! assert!(registry::signature_algorithm("1.2.3.4").is_err());
//! # Ok::<(), certscope::Error>(())
//! ```

use std::{collections::HashMap, sync::OnceLock};

use strum::IntoEnumIterator;

use crate::{
    crypto::{asymmetric::KeyAlgorithm, HashAlgorithm},
    Error::UnsupportedAlgorithm,
    Result,
};

/// A signature algorithm: the digest applied to the signed data and the key type that signs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureAlgorithm {
    /// Dotted object identifier
    pub oid: &'static str,
    /// Short display name
    pub name: &'static str,
    /// Digest applied to the to-be-signed bytes
    pub hash: HashAlgorithm,
    /// Key algorithm producing the signature
    pub key: KeyAlgorithm,
}

const SIGNATURE_ALGORITHMS: &[SignatureAlgorithm] = &[
    SignatureAlgorithm {
        oid: "1.2.840.113549.1.1.2",
        name: "md2RSA",
        hash: HashAlgorithm::Md2,
        key: KeyAlgorithm::Rsa,
    },
    SignatureAlgorithm {
        oid: "1.2.840.113549.1.1.4",
        name: "md5RSA",
        hash: HashAlgorithm::Md5,
        key: KeyAlgorithm::Rsa,
    },
    SignatureAlgorithm {
        oid: "1.2.840.113549.1.1.5",
        name: "sha1RSA",
        hash: HashAlgorithm::Sha1,
        key: KeyAlgorithm::Rsa,
    },
    // OIW alias still found in certificates issued by older toolchains
    SignatureAlgorithm {
        oid: "1.3.14.3.2.29",
        name: "sha1RSA",
        hash: HashAlgorithm::Sha1,
        key: KeyAlgorithm::Rsa,
    },
    SignatureAlgorithm {
        oid: "1.2.840.113549.1.1.11",
        name: "sha256RSA",
        hash: HashAlgorithm::Sha256,
        key: KeyAlgorithm::Rsa,
    },
    SignatureAlgorithm {
        oid: "1.2.840.113549.1.1.12",
        name: "sha384RSA",
        hash: HashAlgorithm::Sha384,
        key: KeyAlgorithm::Rsa,
    },
    SignatureAlgorithm {
        oid: "1.2.840.113549.1.1.13",
        name: "sha512RSA",
        hash: HashAlgorithm::Sha512,
        key: KeyAlgorithm::Rsa,
    },
    SignatureAlgorithm {
        oid: "1.2.840.10040.4.3",
        name: "sha1DSA",
        hash: HashAlgorithm::Sha1,
        key: KeyAlgorithm::Dsa,
    },
    SignatureAlgorithm {
        oid: "1.3.14.3.2.27",
        name: "sha1DSA",
        hash: HashAlgorithm::Sha1,
        key: KeyAlgorithm::Dsa,
    },
];

struct Registry {
    signatures: HashMap<&'static str, &'static SignatureAlgorithm>,
    hashes: HashMap<&'static str, HashAlgorithm>,
    keys: HashMap<&'static str, KeyAlgorithm>,
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(|| Registry {
        signatures: SIGNATURE_ALGORITHMS
            .iter()
            .map(|algorithm| (algorithm.oid, algorithm))
            .collect(),
        hashes: HashAlgorithm::iter()
            .map(|hash| (hash.oid(), hash))
            .collect(),
        keys: KeyAlgorithm::iter().map(|key| (key.oid(), key)).collect(),
    })
}

/// Resolves a signature algorithm OID.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedAlgorithm`] for unknown OIDs.
pub fn signature_algorithm(oid: &str) -> Result<&'static SignatureAlgorithm> {
    registry()
        .signatures
        .get(oid)
        .copied()
        .ok_or_else(|| UnsupportedAlgorithm(oid.to_string()))
}

/// Resolves a digest algorithm OID.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedAlgorithm`] for unknown OIDs.
pub fn hash_algorithm(oid: &str) -> Result<HashAlgorithm> {
    registry()
        .hashes
        .get(oid)
        .copied()
        .ok_or_else(|| UnsupportedAlgorithm(oid.to_string()))
}

/// Resolves a public-key algorithm OID.
///
/// # Errors
///
/// Returns [`crate::Error::UnsupportedAlgorithm`] for unknown OIDs.
pub fn key_algorithm(oid: &str) -> Result<KeyAlgorithm> {
    registry()
        .keys
        .get(oid)
        .copied()
        .ok_or_else(|| UnsupportedAlgorithm(oid.to_string()))
}

/// Returns the preferred signature OID for a hash and key combination, if one is registered.
#[must_use]
pub fn signature_oid(hash: HashAlgorithm, key: KeyAlgorithm) -> Option<&'static str> {
    SIGNATURE_ALGORITHMS
        .iter()
        .find(|algorithm| algorithm.hash == hash && algorithm.key == key)
        .map(|algorithm| algorithm.oid)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[test]
    fn signature_lookup() {
        let md5 = signature_algorithm("1.2.840.113549.1.1.4").unwrap();
        assert_eq!(md5.hash, HashAlgorithm::Md5);
        assert_eq!(md5.key, KeyAlgorithm::Rsa);

        let oiw = signature_algorithm("1.3.14.3.2.29").unwrap();
        assert_eq!(oiw.hash, HashAlgorithm::Sha1);
        assert_eq!(oiw.name, "sha1RSA");

        let dsa = signature_algorithm("1.2.840.10040.4.3").unwrap();
        assert_eq!(dsa.hash, HashAlgorithm::Sha1);
        assert_eq!(dsa.key, KeyAlgorithm::Dsa);
    }

    #[test]
    fn unknown_oid() {
        match signature_algorithm("1.2.840.10045.4.3.2") {
            Err(Error::UnsupportedAlgorithm(oid)) => assert_eq!(oid, "1.2.840.10045.4.3.2"),
            other => panic!("unexpected {other:?}"),
        }
        assert!(hash_algorithm("1.2.3").is_err());
        assert!(key_algorithm("1.2.3").is_err());
    }

    #[test]
    fn hash_and_key_lookup() {
        assert_eq!(hash_algorithm("1.3.14.3.2.26").unwrap(), HashAlgorithm::Sha1);
        assert_eq!(
            hash_algorithm("2.16.840.1.101.3.4.2.1").unwrap(),
            HashAlgorithm::Sha256
        );
        assert_eq!(
            key_algorithm("1.2.840.113549.1.1.1").unwrap(),
            KeyAlgorithm::Rsa
        );
        assert_eq!(key_algorithm("1.2.840.10040.4.1").unwrap(), KeyAlgorithm::Dsa);
    }

    #[test]
    fn reverse_lookup_prefers_pkcs_oid() {
        assert_eq!(
            signature_oid(HashAlgorithm::Sha1, KeyAlgorithm::Rsa),
            Some("1.2.840.113549.1.1.5")
        );
        assert_eq!(
            signature_oid(HashAlgorithm::Sha1, KeyAlgorithm::Dsa),
            Some("1.2.840.10040.4.3")
        );
        assert_eq!(signature_oid(HashAlgorithm::Md5, KeyAlgorithm::Dsa), None);
    }
}
