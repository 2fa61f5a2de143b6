//! CryptoAPI key blobs and PVK private key files.
//!
//! Private keys are persisted in the little-endian `PUBLICKEYBLOB` / `PRIVATEKEYBLOB` layout
//! used by the Windows CryptoAPI, optionally wrapped in the PVK file header:
//!
//! ```text
//! BLOBHEADER   type u8 (0x06 public, 0x07 private), version u8 (2), reserved u16, alg_id u32
//! RSAPUBKEY    magic u32 ("RSA1" / "RSA2"), bitlen u32, pubexp u32
//!              modulus[bitlen/8]
//!              prime1[bitlen/16] prime2 exponent1 exponent2 coefficient   (private only)
//!              privateExponent[bitlen/8]                                  (private only)
//! DSSPUBKEY    magic u32 ("DSS1" / "DSS2"), bitlen u32
//!              p[bitlen/8] q[20] g[bitlen/8] y[bitlen/8] | x[20]
//! DSSSEED      counter u32, seed[20]   (0xFFFFFFFF / 0xFF.. when unknown)
//! ```
//!
//! All numbers are stored least significant byte first.
//!
//! # Examples
//!
//! ```rust
//! use certscope::crypto::asymmetric::{blob::KeyBlob, AsymmetricKey, RsaKey};
//!
//! let key = KeyBlob::new(AsymmetricKey::Rsa(RsaKey::generate(512)?));
//! let pvk = key.to_pvk()?;
//!
//! let restored = KeyBlob::from_pvk(&pvk)?;
//! assert_eq!(restored.alg_id, key.alg_id);
//! assert!(restored.key.has_private_key());
//! # Ok::<(), certscope::Error>(())
//! ```

use num_bigint_dig::BigUint;

use super::{fixed_bytes, AsymmetricKey, DsaKey, DsaParameters, RsaKey, RsaParameters};
use crate::{
    file::{
        io::{write_le_at, ByteIO},
        parser::Parser,
    },
    Error::{InvalidParameters, NotSupported},
    Result,
};

/// `PUBLICKEYBLOB` blob type
pub const PUBLIC_KEY_BLOB: u8 = 0x06;
/// `PRIVATEKEYBLOB` blob type
pub const PRIVATE_KEY_BLOB: u8 = 0x07;
/// Blob format version
pub const BLOB_VERSION: u8 = 0x02;

/// RSA key exchange algorithm id
pub const CALG_RSA_KEYX: u32 = 0x0000_A400;
/// RSA signature algorithm id
pub const CALG_RSA_SIGN: u32 = 0x0000_2400;
/// DSS signature algorithm id
pub const CALG_DSS_SIGN: u32 = 0x0000_2200;

const MAGIC_RSA1: u32 = 0x3141_5352;
const MAGIC_RSA2: u32 = 0x3241_5352;
const MAGIC_DSS1: u32 = 0x3153_5344;
const MAGIC_DSS2: u32 = 0x3253_5344;

/// PVK file signature
pub const PVK_MAGIC: u32 = 0xB0B5_F11E;
const AT_KEYEXCHANGE: u32 = 1;
const AT_SIGNATURE: u32 = 2;

const DSS_Q_LEN: usize = 20;

/// A key together with the CryptoAPI algorithm id it is stored under.
#[derive(Debug, Clone)]
pub struct KeyBlob {
    /// `ALG_ID` from the blob header
    pub alg_id: u32,
    /// The key
    pub key: AsymmetricKey,
}

impl KeyBlob {
    /// Wraps a key with the default algorithm id for its type.
    #[must_use]
    pub fn new(key: AsymmetricKey) -> KeyBlob {
        let alg_id = match key {
            AsymmetricKey::Rsa(_) => CALG_RSA_KEYX,
            AsymmetricKey::Dsa(_) => CALG_DSS_SIGN,
        };
        KeyBlob { alg_id, key }
    }

    /// Decodes a public or private key blob.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Malformed`] for an unknown blob type, version or magic
    /// - [`crate::Error::OutOfBounds`] for a truncated blob
    /// - [`crate::Error::InvalidParameters`] if the key fields are inconsistent
    pub fn decode(data: &[u8]) -> Result<KeyBlob> {
        let mut parser = Parser::new(data);

        let blob_type = parser.read_le::<u8>()?;
        let version = parser.read_le::<u8>()?;
        let _reserved = parser.read_le::<u16>()?;
        let alg_id = parser.read_le::<u32>()?;
        let magic = parser.read_le::<u32>()?;
        let bits = parser.read_le::<u32>()? as usize;

        if version != BLOB_VERSION {
            return Err(malformed_error!("Unsupported key blob version {}", version));
        }

        let key = match (blob_type, magic) {
            (PUBLIC_KEY_BLOB, MAGIC_RSA1) => decode_rsa(&mut parser, bits, false)?,
            (PRIVATE_KEY_BLOB, MAGIC_RSA2) => decode_rsa(&mut parser, bits, true)?,
            (PUBLIC_KEY_BLOB, MAGIC_DSS1) => decode_dsa(&mut parser, bits, false)?,
            (PRIVATE_KEY_BLOB, MAGIC_DSS2) => decode_dsa(&mut parser, bits, true)?,
            _ => {
                return Err(malformed_error!(
                    "Unknown key blob type 0x{:02X} with magic 0x{:08X}",
                    blob_type,
                    magic
                ));
            }
        };

        Ok(KeyBlob { alg_id, key })
    }

    /// Encodes the key as a public or private blob.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::KeyUnavailable`] if `include_private` is set but the key is incomplete
    /// - [`crate::Error::InvalidParameters`] for an RSA exponent wider than 32 bits
    pub fn encode(&self, include_private: bool) -> Result<Vec<u8>> {
        let mut writer = BlobWriter::default();
        let blob_type = if include_private {
            PRIVATE_KEY_BLOB
        } else {
            PUBLIC_KEY_BLOB
        };
        writer.put(blob_type)?;
        writer.put(BLOB_VERSION)?;
        writer.put(0_u16)?;
        writer.put(self.alg_id)?;

        match &self.key {
            AsymmetricKey::Rsa(key) => encode_rsa(&mut writer, key, include_private)?,
            AsymmetricKey::Dsa(key) => encode_dsa(&mut writer, key, include_private)?,
        }

        Ok(writer.data)
    }

    /// Encodes the private key as an unencrypted PVK file.
    ///
    /// # Errors
    ///
    /// See [`KeyBlob::encode`].
    pub fn to_pvk(&self) -> Result<Vec<u8>> {
        let blob = self.encode(true)?;
        let key_type = if self.alg_id == CALG_RSA_KEYX {
            AT_KEYEXCHANGE
        } else {
            AT_SIGNATURE
        };
        let key_len =
            u32::try_from(blob.len()).map_err(|_| malformed_error!("Key blob too large"))?;

        let mut writer = BlobWriter::default();
        writer.put(PVK_MAGIC)?;
        writer.put(0_u32)?;
        writer.put(key_type)?;
        writer.put(0_u32)?; // not encrypted
        writer.put(0_u32)?; // no salt
        writer.put(key_len)?;
        writer.data.extend_from_slice(&blob);
        Ok(writer.data)
    }

    /// Decodes an unencrypted PVK file.
    ///
    /// # Errors
    ///
    /// - [`crate::Error::Malformed`] for a wrong signature
    /// - [`crate::Error::NotSupported`] for password protected files
    /// - the errors of [`KeyBlob::decode`]
    pub fn from_pvk(data: &[u8]) -> Result<KeyBlob> {
        let mut parser = Parser::new(data);
        let magic = parser.read_le::<u32>()?;
        if magic != PVK_MAGIC {
            return Err(malformed_error!("Invalid PVK signature 0x{:08X}", magic));
        }
        let _reserved = parser.read_le::<u32>()?;
        let _key_type = parser.read_le::<u32>()?;
        let encrypted = parser.read_le::<u32>()?;
        let salt_len = parser.read_le::<u32>()? as usize;
        let key_len = parser.read_le::<u32>()? as usize;

        if encrypted != 0 {
            return Err(NotSupported("encrypted PVK files"));
        }
        parser.advance_by(salt_len)?;
        KeyBlob::decode(parser.read_bytes(key_len)?)
    }
}

#[derive(Default)]
struct BlobWriter {
    data: Vec<u8>,
}

impl BlobWriter {
    fn put<T: ByteIO>(&mut self, value: T) -> Result<()> {
        let mut offset = self.data.len();
        self.data.resize(offset + std::mem::size_of::<T>(), 0);
        write_le_at(&mut self.data, &mut offset, value)
    }

    /// Writes a big-endian number as a little-endian field of exactly `width` bytes.
    fn number(&mut self, big_endian: &[u8], width: usize) -> Result<()> {
        let value = BigUint::from_bytes_be(big_endian);
        let Some(mut bytes) = fixed_bytes(&value, width) else {
            return Err(InvalidParameters(format!(
                "key field does not fit into {width} bytes"
            )));
        };
        bytes.reverse();
        self.data.extend_from_slice(&bytes);
        Ok(())
    }
}

/// Reads a little-endian field and returns it big-endian.
fn read_number(parser: &mut Parser<'_>, width: usize) -> Result<Vec<u8>> {
    let mut bytes = parser.read_bytes(width)?.to_vec();
    bytes.reverse();
    Ok(bytes)
}

fn decode_rsa(parser: &mut Parser<'_>, bits: usize, private: bool) -> Result<AsymmetricKey> {
    let exponent = parser.read_le::<u32>()?;
    let k = bits.div_ceil(8);
    let half = bits.div_ceil(16);

    let mut parameters = RsaParameters {
        modulus: read_number(parser, k)?,
        exponent: exponent.to_be_bytes().to_vec(),
        d: None,
        p: None,
        q: None,
        dp: None,
        dq: None,
        inverse_q: None,
    };
    if private {
        parameters.p = Some(read_number(parser, half)?);
        parameters.q = Some(read_number(parser, half)?);
        parameters.dp = Some(read_number(parser, half)?);
        parameters.dq = Some(read_number(parser, half)?);
        parameters.inverse_q = Some(read_number(parser, half)?);
        parameters.d = Some(read_number(parser, k)?);
    }

    Ok(AsymmetricKey::Rsa(RsaKey::from_parameters(&parameters)?))
}

fn encode_rsa(writer: &mut BlobWriter, key: &RsaKey, include_private: bool) -> Result<()> {
    let parameters = key.export_parameters(include_private)?;
    let bits = key.key_size();
    let k = bits.div_ceil(8);
    let half = bits.div_ceil(16);

    let exponent = BigUint::from_bytes_be(&parameters.exponent);
    let exponent = fixed_bytes(&exponent, 4)
        .ok_or_else(|| InvalidParameters("RSA exponent exceeds 32 bits".to_string()))?;
    let exponent = u32::from_be_bytes([exponent[0], exponent[1], exponent[2], exponent[3]]);

    let magic = if include_private {
        MAGIC_RSA2
    } else {
        MAGIC_RSA1
    };
    writer.put(magic)?;
    writer.put(bits as u32)?;
    writer.put(exponent)?;
    writer.number(&parameters.modulus, k)?;

    if let (Some(p), Some(q), Some(dp), Some(dq), Some(inverse_q), Some(d)) = (
        &parameters.p,
        &parameters.q,
        &parameters.dp,
        &parameters.dq,
        &parameters.inverse_q,
        &parameters.d,
    ) {
        for field in [p, q, dp, dq, inverse_q] {
            writer.number(field, half)?;
        }
        writer.number(d, k)?;
    }
    Ok(())
}

fn decode_dsa(parser: &mut Parser<'_>, bits: usize, private: bool) -> Result<AsymmetricKey> {
    let len = bits.div_ceil(8);

    let mut parameters = DsaParameters {
        p: read_number(parser, len)?,
        q: read_number(parser, DSS_Q_LEN)?,
        g: read_number(parser, len)?,
        y: None,
        x: None,
        j: None,
        seed: None,
        counter: None,
    };
    if private {
        parameters.x = Some(read_number(parser, DSS_Q_LEN)?);
    } else {
        parameters.y = Some(read_number(parser, len)?);
    }

    if parser.remaining() >= 4 + DSS_Q_LEN {
        let counter = parser.read_le::<u32>()?;
        let seed = read_number(parser, DSS_Q_LEN)?;
        if counter != u32::MAX {
            parameters.counter = Some(counter);
            parameters.seed = Some(seed);
        }
    }

    Ok(AsymmetricKey::Dsa(DsaKey::from_parameters(&parameters)?))
}

fn encode_dsa(writer: &mut BlobWriter, key: &DsaKey, include_private: bool) -> Result<()> {
    let parameters = key.export_parameters(include_private)?;
    let bits = key.key_size();
    let len = bits.div_ceil(8);

    let magic = if include_private {
        MAGIC_DSS2
    } else {
        MAGIC_DSS1
    };
    writer.put(magic)?;
    writer.put(bits as u32)?;
    writer.number(&parameters.p, len)?;
    writer.number(&parameters.q, DSS_Q_LEN)?;
    writer.number(&parameters.g, len)?;

    match (&parameters.x, &parameters.y) {
        (Some(x), _) => writer.number(x, DSS_Q_LEN)?,
        (None, Some(y)) => writer.number(y, len)?,
        (None, None) => return Err(InvalidParameters("DSA key without x or y".to_string())),
    }

    match (&parameters.seed, parameters.counter) {
        (Some(seed), Some(counter)) => {
            writer.put(counter)?;
            writer.number(seed, DSS_Q_LEN)?;
        }
        _ => {
            writer.put(u32::MAX)?;
            writer.data.extend_from_slice(&[0xFF; DSS_Q_LEN]);
        }
    }
    Ok(())
}
