//! Symmetric block ciphers, chaining modes and padding.
//!
//! The raw block permutations come from the RustCrypto `aes` and `des` crates and are exposed
//! behind the object-safe [`BlockCipher`] trait. Everything above a single block - chaining,
//! feedback, buffering of partial input and padding - is implemented by
//! [`transform::CipherContext`], so any cipher can be combined with any mode.
//!
//! # Key Components
//!
//! - [`BlockCipher`] - Encrypt/decrypt a single block in place
//! - [`SymmetricAlgorithm`] - Factory validating key sizes and building a [`BlockCipher`]
//! - [`CipherMode`], [`PaddingMode`], [`Direction`] - Transform configuration
//! - [`transform::CipherContext`] - Streaming encrypt/decrypt with `update` / `finalize`
//!
//! # Examples
//!
//! ```rust
//! use certscope::crypto::symmetric::{
//!     CipherConfig, CipherContext, CipherMode, Direction, PaddingMode, SymmetricAlgorithm,
//! };
//!
//! let key = [0x42u8; 16];
//! let iv = [0x24u8; 16];
//! let config = CipherConfig::new(CipherMode::Cbc, PaddingMode::Pkcs7).with_iv(&iv);
//!
//! let mut encryptor = CipherContext::new(
//!     SymmetricAlgorithm::Aes.create(&key)?,
//!     Direction::Encrypt,
//!     config.clone(),
//! )?;
//! let ciphertext = encryptor.finalize(b"attack at dawn")?;
//! assert_eq!(ciphertext.len(), 16);
//!
//! let mut decryptor = CipherContext::new(
//!     SymmetricAlgorithm::Aes.create(&key)?,
//!     Direction::Decrypt,
//!     config,
//! )?;
//! assert_eq!(decryptor.finalize(&ciphertext)?, b"attack at dawn");
//! # Ok::<(), certscope::Error>(())
//! ```

mod padding;
pub mod transform;

pub use transform::{CipherConfig, CipherContext};

use cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, BlockSizeUser, KeyInit};
use strum::{Display, EnumIter, EnumString};

use crate::{Error::InvalidParameters, Result};

/// A block permutation keyed at construction.
///
/// Implementations must process exactly [`BlockCipher::block_size`] bytes per call. The transform
/// guarantees the slice length, so implementations may panic on any other length.
pub trait BlockCipher: Send + Sync {
    /// Block length in bytes.
    fn block_size(&self) -> usize;

    /// Encrypts one block in place.
    fn encrypt_block(&self, block: &mut [u8]);

    /// Decrypts one block in place.
    fn decrypt_block(&self, block: &mut [u8]);
}

/// Adapter from a RustCrypto block cipher to [`BlockCipher`].
struct RustCryptoCipher<C> {
    inner: C,
}

impl<C> BlockCipher for RustCryptoCipher<C>
where
    C: BlockEncrypt + BlockDecrypt + BlockSizeUser + Send + Sync,
{
    fn block_size(&self) -> usize {
        C::block_size()
    }

    fn encrypt_block(&self, block: &mut [u8]) {
        self.inner.encrypt_block(GenericArray::from_mut_slice(block));
    }

    fn decrypt_block(&self, block: &mut [u8]) {
        self.inner.decrypt_block(GenericArray::from_mut_slice(block));
    }
}

fn build<C>(key: &[u8]) -> Result<Box<dyn BlockCipher>>
where
    C: KeyInit + BlockEncrypt + BlockDecrypt + BlockSizeUser + Send + Sync + 'static,
{
    let inner = C::new_from_slice(key)
        .map_err(|_| InvalidParameters(format!("invalid key length {}", key.len())))?;
    Ok(Box::new(RustCryptoCipher { inner }))
}

/// Supported block cipher families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum SymmetricAlgorithm {
    /// AES (Rijndael with 128-bit blocks), 128/192/256-bit keys
    #[strum(to_string = "AES", serialize = "Rijndael")]
    Aes,
    /// Single DES, 64-bit key (56 effective bits)
    #[strum(serialize = "DES")]
    Des,
    /// Triple DES in EDE mode with two-key (128-bit) or three-key (192-bit) keys
    #[strum(to_string = "3DES", serialize = "TripleDES")]
    TripleDes,
}

impl SymmetricAlgorithm {
    /// Block length in bytes.
    #[must_use]
    pub fn block_size(self) -> usize {
        match self {
            SymmetricAlgorithm::Aes => 16,
            SymmetricAlgorithm::Des | SymmetricAlgorithm::TripleDes => 8,
        }
    }

    /// Accepted key lengths in bytes.
    #[must_use]
    pub fn legal_key_sizes(self) -> &'static [usize] {
        match self {
            SymmetricAlgorithm::Aes => &[16, 24, 32],
            SymmetricAlgorithm::Des => &[8],
            SymmetricAlgorithm::TripleDes => &[16, 24],
        }
    }

    /// Builds a keyed cipher instance.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::InvalidParameters`] if `key` has an illegal length.
    pub fn create(self, key: &[u8]) -> Result<Box<dyn BlockCipher>> {
        match (self, key.len()) {
            (SymmetricAlgorithm::Aes, 16) => build::<aes::Aes128>(key),
            (SymmetricAlgorithm::Aes, 24) => build::<aes::Aes192>(key),
            (SymmetricAlgorithm::Aes, 32) => build::<aes::Aes256>(key),
            (SymmetricAlgorithm::Des, 8) => build::<des::Des>(key),
            (SymmetricAlgorithm::TripleDes, 16) => build::<des::TdesEde2>(key),
            (SymmetricAlgorithm::TripleDes, 24) => build::<des::TdesEde3>(key),
            (algorithm, len) => Err(InvalidParameters(format!(
                "{algorithm} does not accept a {len} byte key"
            ))),
        }
    }
}

/// Block chaining mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(ascii_case_insensitive, serialize_all = "UPPERCASE")]
pub enum CipherMode {
    /// Cipher block chaining
    Cbc,
    /// Electronic codebook
    Ecb,
    /// Output feedback, `feedback_size` bytes per step
    Ofb,
    /// Cipher feedback, `feedback_size` bytes per step
    Cfb,
    /// Ciphertext stealing, not implemented
    Cts,
}

/// Padding applied to the final unit when encrypting and removed when decrypting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumString, Display)]
#[strum(ascii_case_insensitive)]
pub enum PaddingMode {
    /// No padding; input must be a whole number of units
    None,
    /// PKCS #7: `n` bytes of value `n`
    #[strum(serialize = "PKCS7")]
    Pkcs7,
    /// Zero bytes up to the unit boundary, not removed on decrypt
    Zeros,
    /// ANSI X9.23: zero bytes followed by the count
    #[strum(serialize = "ANSIX923")]
    AnsiX923,
    /// ISO 10126: random bytes followed by the count
    #[strum(serialize = "ISO10126")]
    Iso10126,
}

/// Direction a transform operates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Plaintext in, ciphertext out
    Encrypt,
    /// Ciphertext in, plaintext out
    Decrypt,
}
