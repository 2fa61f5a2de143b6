use rand::RngCore;

use super::PaddingMode;
use crate::{
    Error::{InvalidLength, InvalidPadding},
    Result,
};

/// Pads `data` up to a multiple of `unit` bytes.
pub(crate) fn pad(mode: PaddingMode, data: &mut Vec<u8>, unit: usize) -> Result<()> {
    let remainder = data.len() % unit;
    let count = unit - remainder;

    match mode {
        PaddingMode::None => {
            if remainder != 0 {
                return Err(InvalidLength {
                    expected: data.len() + count,
                    actual: data.len(),
                });
            }
        }
        PaddingMode::Zeros => {
            if remainder != 0 {
                data.resize(data.len() + count, 0);
            }
        }
        PaddingMode::Pkcs7 => {
            data.resize(data.len() + count, trailer(count)?);
        }
        PaddingMode::AnsiX923 => {
            data.resize(data.len() + count - 1, 0);
            data.push(trailer(count)?);
        }
        PaddingMode::Iso10126 => {
            let start = data.len();
            data.resize(start + count - 1, 0);
            rand::thread_rng().fill_bytes(&mut data[start..]);
            data.push(trailer(count)?);
        }
    }

    Ok(())
}

/// Removes padding from decrypted `data`, which must be a whole number of units.
pub(crate) fn unpad(mode: PaddingMode, data: &mut Vec<u8>, unit: usize) -> Result<()> {
    match mode {
        PaddingMode::None | PaddingMode::Zeros => Ok(()),
        PaddingMode::Pkcs7 => {
            let count = trailer_count(data, unit)?;
            let start = data.len() - count;
            if data[start..].iter().any(|&byte| usize::from(byte) != count) {
                return Err(InvalidPadding);
            }
            data.truncate(start);
            Ok(())
        }
        PaddingMode::AnsiX923 => {
            let count = trailer_count(data, unit)?;
            let start = data.len() - count;
            if data[start..data.len() - 1].iter().any(|&byte| byte != 0) {
                return Err(InvalidPadding);
            }
            data.truncate(start);
            Ok(())
        }
        PaddingMode::Iso10126 => {
            let count = trailer_count(data, unit)?;
            data.truncate(data.len() - count);
            Ok(())
        }
    }
}

fn trailer(count: usize) -> Result<u8> {
    u8::try_from(count).map_err(|_| InvalidPadding)
}

fn trailer_count(data: &[u8], unit: usize) -> Result<usize> {
    let Some(&last) = data.last() else {
        return Err(InvalidPadding);
    };

    let count = usize::from(last);
    if count == 0 || count > unit || count > data.len() {
        return Err(InvalidPadding);
    }
    Ok(count)
}
