//! Memory-mapped file backend.
//!
//! Certificates, CRLs and key files on disk are mapped rather than read, so the decoder works
//! directly on the page cache. The mapping is read-only and lives as long as the backend.

use super::Backend;
use crate::{
    Error::{Error, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// Byte source over a read-only memory mapping of a file.
#[derive(Debug)]
pub struct Physical {
    data: Mmap,
}

impl Physical {
    /// Opens and maps the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::FileError`] if the file cannot be opened, or
    /// [`crate::Error::Error`] if the mapping fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Physical> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        // Zero-length files cannot be mapped on every platform
        if file.metadata()?.len() == 0 {
            return Err(crate::Error::Empty);
        }

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error(error.to_string())),
        };

        Ok(Physical { data: mmap })
    }
}

impl Backend for Physical {
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[offset..offset_end])
    }

    fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn into_data(self: Box<Self>) -> Vec<u8> {
        self.data.as_ref().to_vec()
    }
}
