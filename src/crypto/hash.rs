//! Digest algorithms used for certificate hashing, signatures and HMAC.
//!
//! [`HashAlgorithm`] is a closed set over the RustCrypto digest implementations. It is the
//! currency between the OID registry, the PKCS#1 formatter and the MAC builders: each of those
//! asks the enum for output size, block size, OID or a fresh boxed hasher instead of naming a
//! concrete digest type.

use digest::{Digest, DynDigest};
use strum::{Display, EnumIter, EnumString};

/// A supported message digest.
///
/// The string form (`Display` / `FromStr`) uses the conventional upper-case names, parsing is
/// case-insensitive and also accepts the hyphenated spellings (`SHA-1`, `SHA-256`, ...).
///
/// # Examples
///
/// ```rust
/// use certscope::crypto::HashAlgorithm;
/// use std::str::FromStr;
///
/// let sha1 = HashAlgorithm::from_str("sha-1")?;
/// assert_eq!(sha1, HashAlgorithm::Sha1);
/// assert_eq!(sha1.output_size(), 20);
/// assert_eq!(hex::encode(sha1.digest(b"abc")), "a9993e364706816aba3e25717850c26c9cd0d89d");
/// # Ok::<(), strum::ParseError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum HashAlgorithm {
    /// MD2 (RFC 1319), only seen in very old certificates
    #[strum(serialize = "MD2")]
    Md2,
    /// MD5 (RFC 1321)
    #[strum(serialize = "MD5")]
    Md5,
    /// SHA-1 (FIPS 180-1)
    #[strum(to_string = "SHA1", serialize = "SHA-1")]
    Sha1,
    /// SHA-256
    #[strum(to_string = "SHA256", serialize = "SHA-256")]
    Sha256,
    /// SHA-384
    #[strum(to_string = "SHA384", serialize = "SHA-384")]
    Sha384,
    /// SHA-512
    #[strum(to_string = "SHA512", serialize = "SHA-512")]
    Sha512,
}

impl HashAlgorithm {
    /// Digest length in bytes.
    #[must_use]
    pub fn output_size(self) -> usize {
        match self {
            HashAlgorithm::Md2 | HashAlgorithm::Md5 => 16,
            HashAlgorithm::Sha1 => 20,
            HashAlgorithm::Sha256 => 32,
            HashAlgorithm::Sha384 => 48,
            HashAlgorithm::Sha512 => 64,
        }
    }

    /// Internal block length in bytes, as used by HMAC key preparation.
    #[must_use]
    pub fn block_size(self) -> usize {
        match self {
            HashAlgorithm::Md2 => 16,
            HashAlgorithm::Md5 | HashAlgorithm::Sha1 | HashAlgorithm::Sha256 => 64,
            HashAlgorithm::Sha384 | HashAlgorithm::Sha512 => 128,
        }
    }

    /// Dotted OID of the bare digest algorithm (as used inside `DigestInfo`).
    #[must_use]
    pub fn oid(self) -> &'static str {
        match self {
            HashAlgorithm::Md2 => "1.2.840.113549.2.2",
            HashAlgorithm::Md5 => "1.2.840.113549.2.5",
            HashAlgorithm::Sha1 => "1.3.14.3.2.26",
            HashAlgorithm::Sha256 => "2.16.840.1.101.3.4.2.1",
            HashAlgorithm::Sha384 => "2.16.840.1.101.3.4.2.2",
            HashAlgorithm::Sha512 => "2.16.840.1.101.3.4.2.3",
        }
    }

    /// Creates a fresh incremental hasher.
    #[must_use]
    pub fn hasher(self) -> Box<dyn DynDigest + Send + Sync> {
        match self {
            HashAlgorithm::Md2 => Box::new(md2::Md2::new()),
            HashAlgorithm::Md5 => Box::new(md5::Md5::new()),
            HashAlgorithm::Sha1 => Box::new(sha1::Sha1::new()),
            HashAlgorithm::Sha256 => Box::new(sha2::Sha256::new()),
            HashAlgorithm::Sha384 => Box::new(sha2::Sha384::new()),
            HashAlgorithm::Sha512 => Box::new(sha2::Sha512::new()),
        }
    }

    /// Hashes `data` in one call.
    #[must_use]
    pub fn digest(self, data: &[u8]) -> Vec<u8> {
        let mut hasher = self.hasher();
        hasher.update(data);
        hasher.finalize().into_vec()
    }
}
