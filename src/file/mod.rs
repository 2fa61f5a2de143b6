//! Byte sources for certificates, CRLs and key material.
//!
//! Everything the crate decodes starts as a byte sequence, either already in memory or in a file
//! on disk. This module abstracts over both through the [`crate::file::Backend`] trait and
//! exposes the [`crate::file::Input`] type as the common entry point used by the decoders.
//!
//! # Key Components
//!
//! ## Core Types
//! - [`crate::file::Input`] - An owned byte source, loaded from disk or memory
//! - [`crate::file::Backend`] - Trait for different data sources
//!
//! ## Parsing Infrastructure
//! - [`crate::file::parser::Parser`] - Cursor over a byte slice, used by the DER decoder
//! - [`crate::file::io`] - Bounds-checked endian-aware primitive reads and writes
//!
//! ## Backend Implementations
//! - [`crate::file::physical::Physical`] - Memory-mapped file backend for disk access
//! - [`crate::file::memory::Memory`] - In-memory buffer backend
//!
//! # Examples
//!
//! ```rust,no_run
//! use certscope::file::Input;
//! use std::path::Path;
//!
//! let input = Input::from_file(Path::new("tests/samples/root_rsa.cer"))?;
//! println!("{} bytes, starts with tag 0x{:02X}", input.len(), input.data()[0]);
//! # Ok::<(), certscope::Error>(())
//! ```

pub mod io;
pub mod parser;

mod memory;
mod physical;

pub use memory::Memory;
pub use physical::Physical;

use std::path::Path;

use crate::{Error::Empty, Result};

/// Backend trait for different data sources.
///
/// Implementors provide read access to a contiguous byte range. All slicing is bounds-checked
/// and reports [`crate::Error::OutOfBounds`] instead of panicking.
pub trait Backend: Send + Sync {
    /// Returns a slice of `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the complete data.
    fn data(&self) -> &[u8];

    /// Returns the number of bytes available.
    fn len(&self) -> usize;

    /// Consumes the backend and returns an owned copy of the data.
    fn into_data(self: Box<Self>) -> Vec<u8>;
}

/// A loaded, non-empty byte source.
///
/// `Input` owns its backend. Decoders that need to keep the raw encoding (certificates keep their
/// DER bytes for hashing and persistence) call [`Input::into_data`] to take ownership.
pub struct Input {
    data: Box<dyn Backend>,
}

impl Input {
    /// Maps the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened and
    /// [`crate::Error::Empty`] if it has no content.
    pub fn from_file(path: &Path) -> Result<Input> {
        let input = Physical::new(path)?;

        Self::load(input)
    }

    /// Wraps an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Empty`] if the buffer is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<Input> {
        let input = Memory::new(data);

        Self::load(input)
    }

    fn load<T: Backend + 'static>(data: T) -> Result<Input> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(Input {
            data: Box::new(data),
        })
    }

    /// Returns the total size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Always `false` for a successfully loaded input.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the complete data.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns `len` bytes starting at `offset`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }

    /// Consumes the input and returns the bytes as an owned buffer.
    #[must_use]
    pub fn into_data(self) -> Vec<u8> {
        self.data.into_data()
    }
}
