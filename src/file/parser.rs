//! Cursor-based byte parser used by the DER and key blob decoders.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a bounds-checked cursor over a
//! byte slice. It knows how to read primitive values in either byte order, borrow raw byte runs
//! without copying, and decode the definite-length form used by DER.
//!
//! # Key Components
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//! - [`crate::file::parser::Parser::transactional`] - Roll back the position if a closure fails
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_le`] / [`crate::file::parser::Parser::read_be`] - Read primitive types
//! - [`crate::file::parser::Parser::read_bytes`] - Borrow a run of bytes
//! - [`crate::file::parser::Parser::peek_byte`] - Peek at current byte without advancing
//! - [`crate::file::parser::Parser::read_der_length`] - Read a DER definite length
//!
//! # Usage Examples
//!
//! ```rust
//! use certscope::Parser;
//!
//! // INTEGER 0x0100AB
//! let data = [0x02, 0x03, 0x01, 0x00, 0xAB];
//! let mut parser = Parser::new(&data);
//!
//! assert_eq!(parser.read_be::<u8>()?, 0x02);
//! let len = parser.read_der_length()?;
//! assert_eq!(parser.read_bytes(len)?, &[0x01, 0x00, 0xAB]);
//! assert!(!parser.has_more_data());
//! # Ok::<(), certscope::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, read_le_at, ByteIO},
    Result,
};

/// A bounds-checked cursor over a borrowed byte slice.
///
/// Every read advances the position on success and leaves it unchanged on failure, so callers
/// can report the offset at which decoding stopped.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Creates a parser positioned at the start of `data`.
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Total length of the underlying data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the underlying data is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` while unread bytes remain.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Number of unread bytes.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Moves the cursor to an absolute position.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if `pos` is past the end of the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Skips `step` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `step` bytes remain.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        match self.position.checked_add(step) {
            Some(end) if end <= self.data.len() => {
                self.position = end;
                Ok(())
            }
            _ => Err(out_of_bounds_error!()),
        }
    }

    /// Current position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// The complete underlying slice.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Returns the byte at the cursor without advancing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] at the end of the data.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Runs `f`, restoring the cursor if it fails.
    ///
    /// # Errors
    ///
    /// Propagates the error returned by `f`.
    pub fn transactional<T, F>(&mut self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Self) -> Result<T>,
    {
        let saved_position = self.position;
        let result = f(self);
        if result.is_err() {
            self.position = saved_position;
        }
        result
    }

    /// Reads a little-endian primitive.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_le<T: ByteIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Reads a big-endian primitive.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if not enough data remains.
    pub fn read_be<T: ByteIO>(&mut self) -> Result<T> {
        read_be_at::<T>(self.data, &mut self.position)
    }

    /// Borrows the next `len` bytes and advances past them.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let start = self.position;
        self.advance_by(len)?;
        Ok(&self.data[start..self.position])
    }

    /// Reads a DER definite length (short or long form).
    ///
    /// Long forms of up to four length octets are accepted. Non-minimal encodings are tolerated,
    /// the indefinite form (`0x80`) is not.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Malformed`] for indefinite or oversized lengths and
    /// [`crate::Error::OutOfBounds`] if the length octets are truncated.
    pub fn read_der_length(&mut self) -> Result<usize> {
        self.transactional(|parser| {
            let first = parser.read_be::<u8>()?;
            if first & 0x80 == 0 {
                return Ok(usize::from(first));
            }

            let count = usize::from(first & 0x7F);
            if count == 0 {
                return Err(malformed_error!("Indefinite length is not allowed in DER"));
            }
            if count > 4 {
                return Err(malformed_error!("Length uses {} octets", count));
            }

            let mut length = 0_usize;
            for _ in 0..count {
                length = (length << 8) | usize::from(parser.read_be::<u8>()?);
            }
            Ok(length)
        })
    }
}
