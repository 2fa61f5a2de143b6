//! Message authentication codes.
//!
//! - [`Hmac`] - RFC 2104 keyed hashing over any [`HashAlgorithm`]
//! - [`CipherMac`] - CBC-MAC over any [`BlockCipher`] (zero IV, zero padding)
//!
//! Both builders are incremental and start over after `finalize`, so one keyed instance can
//! authenticate any number of messages.
//!
//! # Examples
//!
//! ```rust
//! use certscope::crypto::{mac::Hmac, HashAlgorithm};
//!
//! let mut hmac = Hmac::new(HashAlgorithm::Sha256, b"key");
//! hmac.update(b"The quick brown fox ");
//! hmac.update(b"jumps over the lazy dog");
//! assert_eq!(
//!     hex::encode(hmac.finalize()),
//!     "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
//! );
//! ```

use digest::DynDigest;
use zeroize::Zeroize;

use crate::{
    crypto::{
        symmetric::{BlockCipher, CipherConfig, CipherContext, CipherMode, Direction, PaddingMode},
        HashAlgorithm,
    },
    Error::InvalidParameters,
    Result,
};

const IPAD: u8 = 0x36;
const OPAD: u8 = 0x5C;

/// Incremental HMAC.
pub struct Hmac {
    algorithm: HashAlgorithm,
    inner: Box<dyn DynDigest + Send + Sync>,
    outer: Box<dyn DynDigest + Send + Sync>,
    inner_pad: Vec<u8>,
    outer_pad: Vec<u8>,
}

impl Hmac {
    /// Keys a new HMAC. Keys longer than the digest block are hashed first.
    #[must_use]
    pub fn new(algorithm: HashAlgorithm, key: &[u8]) -> Hmac {
        let block_size = algorithm.block_size();

        let mut block_key = if key.len() > block_size {
            algorithm.digest(key)
        } else {
            key.to_vec()
        };
        block_key.resize(block_size, 0);

        let inner_pad: Vec<u8> = block_key.iter().map(|b| b ^ IPAD).collect();
        let outer_pad: Vec<u8> = block_key.iter().map(|b| b ^ OPAD).collect();
        block_key.zeroize();

        let mut inner = algorithm.hasher();
        inner.update(&inner_pad);

        Hmac {
            algorithm,
            inner,
            outer: algorithm.hasher(),
            inner_pad,
            outer_pad,
        }
    }

    /// One-shot HMAC of `data`.
    #[must_use]
    pub fn compute(algorithm: HashAlgorithm, key: &[u8], data: &[u8]) -> Vec<u8> {
        let mut hmac = Hmac::new(algorithm, key);
        hmac.update(data);
        hmac.finalize()
    }

    /// Underlying digest.
    #[must_use]
    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Length of the produced MAC in bytes.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.algorithm.output_size()
    }

    /// Feeds message bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.inner.update(data);
    }

    /// Returns the MAC and rearms the instance for the next message.
    pub fn finalize(&mut self) -> Vec<u8> {
        let inner_hash = self.inner.finalize_reset();
        self.inner.update(&self.inner_pad);

        self.outer.update(&self.outer_pad);
        self.outer.update(&inner_hash);
        self.outer.finalize_reset().into_vec()
    }
}

impl std::fmt::Debug for Hmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hmac")
            .field("algorithm", &self.algorithm)
            .finish_non_exhaustive()
    }
}

impl Drop for Hmac {
    fn drop(&mut self) {
        self.inner_pad.zeroize();
        self.outer_pad.zeroize();
    }
}

/// CBC-MAC over a block cipher.
///
/// The message is CBC-encrypted under a zero IV with zero padding; the MAC is the leading
/// `mac_bits / 8` bytes of the final ciphertext block. An empty message is treated as one
/// zero block.
pub struct CipherMac {
    context: CipherContext,
    mac_len: usize,
    last_block: Vec<u8>,
}

impl CipherMac {
    /// Wraps `cipher` into a CBC-MAC producing `mac_bits` bits.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameters`] unless `mac_bits` is a non-zero multiple of 8
    /// no larger than the cipher block.
    pub fn new(cipher: Box<dyn BlockCipher>, mac_bits: usize) -> Result<CipherMac> {
        let block_size = cipher.block_size();
        if mac_bits == 0 || mac_bits % 8 != 0 || mac_bits / 8 > block_size {
            return Err(InvalidParameters(format!(
                "{mac_bits} bit MAC does not fit a {block_size} byte block"
            )));
        }

        let config = CipherConfig::new(CipherMode::Cbc, PaddingMode::Zeros);
        Ok(CipherMac {
            context: CipherContext::new(cipher, Direction::Encrypt, config)?,
            mac_len: mac_bits / 8,
            last_block: Vec::new(),
        })
    }

    /// Length of the produced MAC in bytes.
    #[must_use]
    pub fn output_size(&self) -> usize {
        self.mac_len
    }

    /// Feeds message bytes.
    ///
    /// # Errors
    ///
    /// Propagates errors from the underlying transform.
    pub fn update(&mut self, data: &[u8]) -> Result<()> {
        let output = self.context.update(data)?;
        self.remember_last_block(&output);
        Ok(())
    }

    /// Returns the MAC and rearms the instance for the next message.
    ///
    /// # Errors
    ///
    /// Propagates errors from the underlying transform.
    pub fn finalize(&mut self) -> Result<Vec<u8>> {
        let mut output = self.context.finalize(&[])?;
        if output.is_empty() && self.last_block.is_empty() {
            let zero_block = vec![0; self.context.block_size()];
            output = self.context.finalize(&zero_block)?;
        }
        self.remember_last_block(&output);

        let mac = self.last_block[..self.mac_len].to_vec();
        self.last_block.clear();
        Ok(mac)
    }

    fn remember_last_block(&mut self, output: &[u8]) {
        let block_size = self.context.block_size();
        if output.len() >= block_size {
            self.last_block.clear();
            self.last_block
                .extend_from_slice(&output[output.len() - block_size..]);
        }
    }
}

impl std::fmt::Debug for CipherMac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CipherMac")
            .field("mac_len", &self.mac_len)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::symmetric::SymmetricAlgorithm;

    #[test]
    fn hmac_sha1_rfc2202() {
        let mac = Hmac::compute(HashAlgorithm::Sha1, &[0x0b; 20], b"Hi There");
        assert_eq!(hex::encode(mac), "b617318655057264e28bc0b6fb378c8ef146be00");

        let mac = Hmac::compute(
            HashAlgorithm::Sha1,
            &[0xaa; 80],
            b"Test Using Larger Than Block-Size Key - Hash Key First",
        );
        assert_eq!(hex::encode(mac), "aa4ae5e15272d00e95705637ce8a3b55ed402112");
    }

    #[test]
    fn hmac_md5_rfc2202() {
        let mac = Hmac::compute(HashAlgorithm::Md5, b"Jefe", b"what do ya want for nothing?");
        assert_eq!(hex::encode(mac), "750c783e6ab0b503eaa86e310a5db738");
    }

    #[test]
    fn hmac_sha256_rfc4231() {
        let mut hmac = Hmac::new(HashAlgorithm::Sha256, b"Jefe");
        assert_eq!(hmac.output_size(), 32);
        hmac.update(b"what do ya want ");
        hmac.update(b"for nothing?");
        assert_eq!(
            hex::encode(hmac.finalize()),
            "5bdcc146bf60754e6a042426089575c75a003f089d2739839dec58b964ec3843"
        );
    }

    #[test]
    fn hmac_is_reusable() {
        let mut hmac = Hmac::new(HashAlgorithm::Md5, b"Jefe");
        hmac.update(b"garbage");
        let _ = hmac.finalize();

        hmac.update(b"what do ya want for nothing?");
        assert_eq!(hex::encode(hmac.finalize()), "750c783e6ab0b503eaa86e310a5db738");
    }

    #[test]
    fn triple_des_cbc_mac() {
        let key: Vec<u8> = (1..=24).collect();
        let cipher = SymmetricAlgorithm::TripleDes.create(&key).unwrap();
        let mut mac = CipherMac::new(cipher, 64).unwrap();

        mac.update(b"certscope ").unwrap();
        mac.update(b"mac test").unwrap();
        assert_eq!(hex::encode(mac.finalize().unwrap()), "4dc958d34d3943ed");

        // reusable, and chunking does not matter
        mac.update(b"certscope mac test").unwrap();
        assert_eq!(hex::encode(mac.finalize().unwrap()), "4dc958d34d3943ed");
    }

    #[test]
    fn aes_cbc_mac() {
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let cipher = SymmetricAlgorithm::Aes.create(&key).unwrap();
        let mut mac = CipherMac::new(cipher, 128).unwrap();
        mac.update(b"certscope mac test").unwrap();
        assert_eq!(
            hex::encode(mac.finalize().unwrap()),
            "813b4f3671bd0ed6bc560c309281b776"
        );
    }

    #[test]
    fn truncated_mac_and_empty_message() {
        let key = hex::decode("2b7e151628aed2a6abf7158809cf4f3c").unwrap();
        let mut full = CipherMac::new(SymmetricAlgorithm::Aes.create(&key).unwrap(), 128).unwrap();
        let mut short = CipherMac::new(SymmetricAlgorithm::Aes.create(&key).unwrap(), 32).unwrap();

        let full_mac = full.finalize().unwrap();
        let short_mac = short.finalize().unwrap();
        assert_eq!(full_mac.len(), 16);
        assert_eq!(short_mac, full_mac[..4]);

        // E_K(0^128)
        let mut block = [0u8; 16];
        SymmetricAlgorithm::Aes
            .create(&key)
            .unwrap()
            .encrypt_block(&mut block);
        assert_eq!(full_mac, block);
    }

    #[test]
    fn invalid_mac_sizes() {
        for bits in [0, 12, 72] {
            let cipher = SymmetricAlgorithm::Des.create(&[1; 8]).unwrap();
            assert!(CipherMac::new(cipher, bits).is_err());
        }
    }
}
