//! Streaming cipher transform over any [`BlockCipher`].
//!
//! A [`CipherContext`] is bound to one keyed cipher and one [`Direction`]. Input is fed with
//! [`CipherContext::update`], which processes every complete unit and buffers the rest, and the
//! message is closed with [`CipherContext::finalize`], which applies or strips padding and resets
//! the chaining state to the initial IV so the context can process the next message.
//!
//! The processing unit is the cipher block for ECB and CBC and the feedback size for CFB and
//! OFB. In CFB and OFB the underlying cipher is only ever run in the encrypt direction.
//!
//! When decrypting with any padding other than [`PaddingMode::None`], the last complete unit is
//! withheld from `update` output: it may carry the padding trailer, which can only be checked
//! once the caller signals the end of the message.

use zeroize::Zeroize;

use super::{padding, BlockCipher, CipherMode, Direction, PaddingMode};
use crate::{
    Error::{InvalidLength, InvalidParameters, NotSupported},
    Result,
};

/// Mode, padding, IV and feedback size for a [`CipherContext`].
///
/// The defaults are CBC with PKCS #7 padding, an all-zero IV
/// and a feedback size equal to the block size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CipherConfig {
    /// Chaining mode
    pub mode: CipherMode,
    /// Padding scheme
    pub padding: PaddingMode,
    /// Initialization vector, all zeros when `None`. Must be one block long.
    pub iv: Option<Vec<u8>>,
    /// Feedback size in bytes for CFB and OFB, the block size when `None`
    pub feedback_size: Option<usize>,
}

impl Default for CipherConfig {
    fn default() -> Self {
        CipherConfig {
            mode: CipherMode::Cbc,
            padding: PaddingMode::Pkcs7,
            iv: None,
            feedback_size: None,
        }
    }
}

impl CipherConfig {
    /// Creates a configuration with a zero IV and full-block feedback.
    #[must_use]
    pub fn new(mode: CipherMode, padding: PaddingMode) -> Self {
        CipherConfig {
            mode,
            padding,
            ..CipherConfig::default()
        }
    }

    /// Sets the initialization vector.
    #[must_use]
    pub fn with_iv(mut self, iv: &[u8]) -> Self {
        self.iv = Some(iv.to_vec());
        self
    }

    /// Sets the CFB/OFB feedback size in bytes.
    #[must_use]
    pub fn with_feedback_size(mut self, bytes: usize) -> Self {
        self.feedback_size = Some(bytes);
        self
    }
}

/// A single-direction, single-key streaming cipher transform.
pub struct CipherContext {
    cipher: Box<dyn BlockCipher>,
    direction: Direction,
    mode: CipherMode,
    padding: PaddingMode,
    block_size: usize,
    unit: usize,
    initial_iv: Vec<u8>,
    state: Vec<u8>,
    work: Vec<u8>,
    pending: Vec<u8>,
}

impl CipherContext {
    /// Creates a transform.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidParameters`] if the IV is not one block long or the feedback size
    ///   does not divide the block size
    /// - [`crate::Error::NotSupported`] for [`CipherMode::Cts`]
    pub fn new(
        cipher: Box<dyn BlockCipher>,
        direction: Direction,
        config: CipherConfig,
    ) -> Result<CipherContext> {
        let block_size = cipher.block_size();

        let initial_iv = match config.iv {
            Some(iv) if iv.len() != block_size => {
                return Err(InvalidParameters(format!(
                    "IV must be {} bytes, got {}",
                    block_size,
                    iv.len()
                )));
            }
            Some(iv) => iv,
            None => vec![0; block_size],
        };

        let unit = match config.mode {
            CipherMode::Ecb | CipherMode::Cbc => block_size,
            CipherMode::Cfb | CipherMode::Ofb => {
                let feedback = config.feedback_size.unwrap_or(block_size);
                if feedback == 0 || feedback > block_size || block_size % feedback != 0 {
                    return Err(InvalidParameters(format!(
                        "feedback size {feedback} does not divide the {block_size} byte block"
                    )));
                }
                feedback
            }
            CipherMode::Cts => return Err(NotSupported("CTS cipher mode")),
        };

        Ok(CipherContext {
            cipher,
            direction,
            mode: config.mode,
            padding: config.padding,
            block_size,
            unit,
            state: initial_iv.clone(),
            initial_iv,
            work: vec![0; block_size],
            pending: Vec::new(),
        })
    }

    /// Number of bytes consumed and produced per processing step.
    #[must_use]
    pub fn unit_size(&self) -> usize {
        self.unit
    }

    /// Block length of the underlying cipher.
    #[must_use]
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// The direction this transform was created for.
    #[must_use]
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Processes as much of the buffered input plus `input` as possible.
    ///
    /// Incomplete trailing units are buffered for the next call.
    ///
    /// # Errors
    ///
    /// The current implementation cannot fail here; the `Result` is kept for parity with
    /// [`CipherContext::finalize`].
    pub fn update(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.pending.extend_from_slice(input);

        let mut ready = self.pending.len() - self.pending.len() % self.unit;
        if self.withholds_last_unit() && ready == self.pending.len() && ready > 0 {
            ready -= self.unit;
        }

        let chunk: Vec<u8> = self.pending.drain(..ready).collect();
        let output = self.process(&chunk);
        Ok(output)
    }

    /// Processes the remaining input, applies or strips padding and resets the chaining state.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::InvalidLength`] if padding is [`PaddingMode::None`] and the total input
    ///   is not a whole number of units, or when decrypting a partial unit
    /// - [`crate::Error::InvalidPadding`] if the decrypted trailer is malformed
    pub fn finalize(&mut self, input: &[u8]) -> Result<Vec<u8>> {
        self.pending.extend_from_slice(input);
        let mut data = std::mem::take(&mut self.pending);

        let result = match self.direction {
            Direction::Encrypt => padding::pad(self.padding, &mut data, self.unit)
                .map(|()| self.process(&data)),
            Direction::Decrypt => {
                if data.len() % self.unit != 0 {
                    Err(InvalidLength {
                        expected: data.len() + self.unit - data.len() % self.unit,
                        actual: data.len(),
                    })
                } else {
                    let mut plain = self.process(&data);
                    padding::unpad(self.padding, &mut plain, self.unit).map(|()| plain)
                }
            }
        };

        data.zeroize();
        self.reset();
        result
    }

    /// Drops buffered input and restores the initial IV.
    pub fn reset(&mut self) {
        self.pending.zeroize();
        self.pending.clear();
        self.state.copy_from_slice(&self.initial_iv);
    }

    fn withholds_last_unit(&self) -> bool {
        self.direction == Direction::Decrypt && self.padding != PaddingMode::None
    }

    fn process(&mut self, input: &[u8]) -> Vec<u8> {
        let mut output = Vec::with_capacity(input.len());
        for unit in input.chunks_exact(self.unit) {
            self.process_unit(unit, &mut output);
        }
        output
    }

    fn process_unit(&mut self, input: &[u8], output: &mut Vec<u8>) {
        match (self.mode, self.direction) {
            (CipherMode::Ecb, Direction::Encrypt) => {
                self.work.copy_from_slice(input);
                self.cipher.encrypt_block(&mut self.work);
                output.extend_from_slice(&self.work);
            }
            (CipherMode::Ecb, Direction::Decrypt) => {
                self.work.copy_from_slice(input);
                self.cipher.decrypt_block(&mut self.work);
                output.extend_from_slice(&self.work);
            }
            (CipherMode::Cbc, Direction::Encrypt) => {
                for (w, (i, s)) in self.work.iter_mut().zip(input.iter().zip(&self.state)) {
                    *w = i ^ s;
                }
                self.cipher.encrypt_block(&mut self.work);
                self.state.copy_from_slice(&self.work);
                output.extend_from_slice(&self.work);
            }
            (CipherMode::Cbc, Direction::Decrypt) => {
                // input is the next chaining value, keep it until the xor is done
                let saved: Vec<u8> = input.to_vec();
                self.work.copy_from_slice(input);
                self.cipher.decrypt_block(&mut self.work);
                for (w, s) in self.work.iter_mut().zip(&self.state) {
                    *w ^= s;
                }
                self.state.copy_from_slice(&saved);
                output.extend_from_slice(&self.work);
            }
            (CipherMode::Cfb, direction) => {
                self.keystream();
                let start = output.len();
                output.extend(input.iter().zip(&self.work).map(|(i, k)| i ^ k));
                let feedback = match direction {
                    Direction::Encrypt => output[start..].to_vec(),
                    Direction::Decrypt => input.to_vec(),
                };
                self.shift_in(&feedback);
            }
            (CipherMode::Ofb, _) => {
                self.keystream();
                output.extend(input.iter().zip(&self.work).map(|(i, k)| i ^ k));
                let feedback = self.work[..self.unit].to_vec();
                self.shift_in(&feedback);
            }
            (CipherMode::Cts, _) => unreachable!("rejected in CipherContext::new"),
        }
    }

    /// Encrypts the shift register into the work buffer.
    fn keystream(&mut self) {
        self.work.copy_from_slice(&self.state);
        self.cipher.encrypt_block(&mut self.work);
    }

    fn shift_in(&mut self, feedback: &[u8]) {
        let keep = self.block_size - feedback.len();
        self.state.copy_within(feedback.len().., 0);
        self.state[keep..].copy_from_slice(feedback);
    }
}

impl Drop for CipherContext {
    fn drop(&mut self) {
        self.state.zeroize();
        self.work.zeroize();
        self.pending.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{crypto::symmetric::SymmetricAlgorithm, Error};

    const KEY: &str = "2b7e151628aed2a6abf7158809cf4f3c";
    const IV: &str = "000102030405060708090a0b0c0d0e0f";
    const PLAIN: &str = "6bc1bee22e409f96e93d7e117393172aae2d8a571e03ac9c9eb76fac45af8e51";

    fn context(direction: Direction, config: CipherConfig) -> CipherContext {
        let cipher = SymmetricAlgorithm::Aes
            .create(&hex::decode(KEY).unwrap())
            .unwrap();
        CipherContext::new(cipher, direction, config).unwrap()
    }

    fn config(mode: CipherMode, padding: PaddingMode) -> CipherConfig {
        CipherConfig::new(mode, padding).with_iv(&hex::decode(IV).unwrap())
    }

    #[test]
    fn cbc_sp800_38a() {
        let mut ctx = context(Direction::Encrypt, config(CipherMode::Cbc, PaddingMode::None));
        let out = ctx.finalize(&hex::decode(PLAIN).unwrap()).unwrap();
        assert_eq!(
            hex::encode(out),
            "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2"
        );
    }

    #[test]
    fn cbc_pkcs7_round_trip_in_pieces() {
        let plain = hex::decode(PLAIN).unwrap();
        let mut enc = context(Direction::Encrypt, config(CipherMode::Cbc, PaddingMode::Pkcs7));

        let mut ciphertext = enc.update(&plain[..5]).unwrap();
        assert!(ciphertext.is_empty());
        ciphertext.extend(enc.update(&plain[5..16]).unwrap());
        assert_eq!(ciphertext.len(), 16);
        ciphertext.extend(enc.finalize(&plain[16..]).unwrap());

        // one extra block of padding for block-aligned input
        assert_eq!(ciphertext.len(), 48);
        assert_eq!(
            hex::encode(&ciphertext[..32]),
            "7649abac8119b246cee98e9b12e9197d5086cb9b507219ee95db113a917678b2"
        );

        let mut dec = context(Direction::Decrypt, config(CipherMode::Cbc, PaddingMode::Pkcs7));
        let mut recovered = dec.update(&ciphertext[..32]).unwrap();
        // the last complete block is withheld
        assert_eq!(recovered.len(), 16);
        recovered.extend(dec.update(&ciphertext[32..]).unwrap());
        assert_eq!(recovered.len(), 32);
        recovered.extend(dec.finalize(&[]).unwrap());
        assert_eq!(recovered, plain);
    }

    fn round_trip(cfg: &CipherConfig, plain: &[u8]) -> Vec<u8> {
        let mut enc = context(Direction::Encrypt, cfg.clone());
        let ciphertext = enc.finalize(plain).unwrap();
        let mut dec = context(Direction::Decrypt, cfg.clone());
        assert_eq!(dec.finalize(&ciphertext).unwrap(), plain, "{} bytes", plain.len());
        ciphertext
    }

    #[test]
    fn pkcs7_every_length() {
        let plain: Vec<u8> = (0..=48_u8).collect();
        let cbc = config(CipherMode::Cbc, PaddingMode::Pkcs7);

        for len in 0..=48 {
            let ciphertext = round_trip(&cbc, &plain[..len]);
            assert_eq!(ciphertext.len(), (len / 16 + 1) * 16);
        }

        for mode in [CipherMode::Cfb, CipherMode::Ofb] {
            for feedback in [1, 2, 4, 8, 16] {
                let cfg = config(mode, PaddingMode::Pkcs7).with_feedback_size(feedback);
                for len in 0..=48 {
                    let ciphertext = round_trip(&cfg, &plain[..len]);
                    assert_eq!(ciphertext.len(), (len / feedback + 1) * feedback);
                }
            }
        }
    }

    #[test]
    fn cbc_short_message() {
        let mut enc = context(Direction::Encrypt, config(CipherMode::Cbc, PaddingMode::Pkcs7));
        let out = enc.finalize(b"certscope").unwrap();
        assert_eq!(hex::encode(&out), "77eafba7cd76afa5b7719146cf027d29");
    }

    #[test]
    fn ecb_sp800_38a() {
        let mut ctx = context(Direction::Encrypt, config(CipherMode::Ecb, PaddingMode::None));
        let out = ctx
            .finalize(&hex::decode("6bc1bee22e409f96e93d7e117393172a").unwrap())
            .unwrap();
        assert_eq!(hex::encode(&out), "3ad77bb40d7a3660a89ecaf32466ef97");

        let mut dec = context(Direction::Decrypt, config(CipherMode::Ecb, PaddingMode::None));
        assert_eq!(
            hex::encode(dec.finalize(&out).unwrap()),
            "6bc1bee22e409f96e93d7e117393172a"
        );
    }

    #[test]
    fn cfb8_sp800_38a() {
        let plain = hex::decode("6bc1bee22e409f96e93d7e117393172aae2d").unwrap();
        let cfg = config(CipherMode::Cfb, PaddingMode::None).with_feedback_size(1);

        let mut enc = context(Direction::Encrypt, cfg.clone());
        assert_eq!(enc.unit_size(), 1);
        let mut out = enc.update(&plain[..7]).unwrap();
        assert_eq!(out.len(), 7);
        out.extend(enc.finalize(&plain[7..]).unwrap());
        assert_eq!(hex::encode(&out), "3b79424c9c0dd436bace9e0ed4586a4f32b9");

        let mut dec = context(Direction::Decrypt, cfg);
        assert_eq!(dec.finalize(&out).unwrap(), plain);
    }

    #[test]
    fn cfb128_and_ofb_sp800_38a() {
        let plain = hex::decode(PLAIN).unwrap();

        let mut cfb = context(Direction::Encrypt, config(CipherMode::Cfb, PaddingMode::None));
        assert_eq!(
            hex::encode(cfb.finalize(&plain).unwrap()),
            "3b3fd92eb72dad20333449f8e83cfb4ac8a64537a0b3a93fcde3cdad9f1ce58b"
        );

        let mut ofb = context(Direction::Encrypt, config(CipherMode::Ofb, PaddingMode::None));
        let out = ofb.finalize(&plain).unwrap();
        assert_eq!(
            hex::encode(&out),
            "3b3fd92eb72dad20333449f8e83cfb4a7789508d16918f03f53c52dac54ed825"
        );

        let mut ofb = context(Direction::Decrypt, config(CipherMode::Ofb, PaddingMode::None));
        assert_eq!(ofb.finalize(&out).unwrap(), plain);
    }

    #[test]
    fn context_is_reusable_after_finalize() {
        let mut enc = context(Direction::Encrypt, config(CipherMode::Cbc, PaddingMode::Pkcs7));
        let first = enc.finalize(b"certscope").unwrap();
        let second = enc.finalize(b"certscope").unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn corrupted_padding_is_rejected() {
        let mut enc = context(Direction::Encrypt, config(CipherMode::Cbc, PaddingMode::Pkcs7));
        let mut ciphertext = enc.finalize(b"certscope").unwrap();
        ciphertext[15] ^= 0x01;
        ciphertext[14] ^= 0x80;

        let mut dec = context(Direction::Decrypt, config(CipherMode::Cbc, PaddingMode::Pkcs7));
        assert!(matches!(dec.finalize(&ciphertext), Err(Error::InvalidPadding)));
    }

    #[test]
    fn partial_input_errors() {
        let mut enc = context(Direction::Encrypt, config(CipherMode::Cbc, PaddingMode::None));
        assert!(matches!(
            enc.finalize(&[0u8; 17]),
            Err(Error::InvalidLength {
                expected: 32,
                actual: 17
            })
        ));

        let mut dec = context(Direction::Decrypt, config(CipherMode::Cbc, PaddingMode::Pkcs7));
        assert!(matches!(
            dec.finalize(&[0u8; 15]),
            Err(Error::InvalidLength { .. })
        ));
    }

    #[test]
    fn zeros_padding_is_not_stripped() {
        let cfg = config(CipherMode::Cbc, PaddingMode::Zeros);
        let mut enc = context(Direction::Encrypt, cfg.clone());
        let ciphertext = enc.finalize(b"abc").unwrap();
        assert_eq!(ciphertext.len(), 16);

        let mut dec = context(Direction::Decrypt, cfg);
        let plain = dec.finalize(&ciphertext).unwrap();
        assert_eq!(&plain[..3], b"abc");
        assert!(plain[3..].iter().all(|&b| b == 0));
    }

    #[test]
    fn invalid_configuration() {
        let cipher = || {
            SymmetricAlgorithm::Aes
                .create(&hex::decode(KEY).unwrap())
                .unwrap()
        };

        let bad_iv = CipherConfig::new(CipherMode::Cbc, PaddingMode::Pkcs7).with_iv(&[0; 8]);
        assert!(matches!(
            CipherContext::new(cipher(), Direction::Encrypt, bad_iv),
            Err(Error::InvalidParameters(_))
        ));

        let bad_feedback =
            CipherConfig::new(CipherMode::Cfb, PaddingMode::None).with_feedback_size(3);
        assert!(CipherContext::new(cipher(), Direction::Encrypt, bad_feedback).is_err());

        let cts = CipherConfig::new(CipherMode::Cts, PaddingMode::None);
        assert!(matches!(
            CipherContext::new(cipher(), Direction::Encrypt, cts),
            Err(Error::NotSupported(_))
        ));
    }

    #[test]
    fn triple_des_round_trip() {
        let key = (1u8..=24).collect::<Vec<_>>();
        let cfg = CipherConfig::new(CipherMode::Cbc, PaddingMode::AnsiX923).with_iv(&[7; 8]);
        let mut enc = CipherContext::new(
            SymmetricAlgorithm::TripleDes.create(&key).unwrap(),
            Direction::Encrypt,
            cfg.clone(),
        )
        .unwrap();
        let ciphertext = enc.finalize(b"the quick brown fox").unwrap();
        assert_eq!(ciphertext.len(), 24);

        let mut dec = CipherContext::new(
            SymmetricAlgorithm::TripleDes.create(&key).unwrap(),
            Direction::Decrypt,
            cfg,
        )
        .unwrap();
        assert_eq!(dec.finalize(&ciphertext).unwrap(), b"the quick brown fox");
    }
}
