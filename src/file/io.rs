//! Endian-aware, bounds-checked reading and writing of primitive values.
//!
//! DER is big-endian throughout, while the key container blobs persisted by the store use the
//! little-endian layout of the CryptoAPI structures. Both directions go through the
//! [`crate::file::io::ByteIO`] trait so that every read and write is checked against the buffer
//! length before touching it.
//!
//! # Key Components
//!
//! - [`crate::file::io::ByteIO`] - Conversion between primitive integers and fixed byte arrays
//! - [`crate::file::io::read_le_at`] / [`crate::file::io::read_be_at`] - Read at an offset and advance it
//! - [`crate::file::io::write_le_at`] - Write at an offset and advance it
//!
//! # Examples
//!
//! ```rust,ignore
//! use certscope::file::io::{read_le_at, write_le_at};
//!
//! let mut data = [0u8; 6];
//! let mut offset = 0;
//! write_le_at(&mut data, &mut offset, 0x0207_u16)?;
//! write_le_at(&mut data, &mut offset, 0x0000_A400_u32)?;
//!
//! let mut offset = 0;
//! assert_eq!(read_le_at::<u16>(&data, &mut offset)?, 0x0207);
//! # Ok::<(), certscope::Error>(())
//! ```

use crate::Result;

/// Conversion between a primitive integer and its fixed-size byte representation.
///
/// Implemented for the unsigned integer types used by the DER and key blob codecs.
pub trait ByteIO: Sized {
    /// Byte array type holding the encoded value.
    type Bytes: Sized + AsRef<[u8]> + for<'a> TryFrom<&'a [u8]>;

    /// Decode from little-endian bytes
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Decode from big-endian bytes
    fn from_be_bytes(bytes: Self::Bytes) -> Self;
    /// Encode as little-endian bytes
    fn to_le_bytes(self) -> Self::Bytes;
    /// Encode as big-endian bytes
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! impl_byte_io {
    ($($ty:ty),*) => {
        $(
            impl ByteIO for $ty {
                type Bytes = [u8; std::mem::size_of::<$ty>()];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )*
    };
}

impl_byte_io!(u8, u16, u32, u64);

/// Reads a value in little-endian byte order at `offset`, advancing it past the value.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_le_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_le_bytes(bytes))
}

/// Reads a value in big-endian byte order at `offset`, advancing it past the value.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if fewer than `size_of::<T>()` bytes remain.
pub fn read_be_at<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T> {
    let bytes = take::<T>(data, offset)?;
    Ok(T::from_be_bytes(bytes))
}

/// Writes a value in little-endian byte order at `offset`, advancing it past the value.
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small.
pub fn write_le_at<T: ByteIO>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let bytes = value.to_le_bytes();
    let bytes = bytes.as_ref();

    let Some(end) = offset.checked_add(bytes.len()) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    data[*offset..end].copy_from_slice(bytes);
    *offset = end;
    Ok(())
}

fn take<T: ByteIO>(data: &[u8], offset: &mut usize) -> Result<T::Bytes> {
    let type_len = std::mem::size_of::<T>();
    let Some(end) = offset.checked_add(type_len) else {
        return Err(out_of_bounds_error!());
    };
    if end > data.len() {
        return Err(out_of_bounds_error!());
    }

    let Ok(read) = data[*offset..end].try_into() else {
        return Err(out_of_bounds_error!());
    };

    *offset = end;
    Ok(read)
}
