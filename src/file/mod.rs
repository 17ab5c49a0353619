//! Byte sources for module images.
//!
//! This module abstracts over where the bytes of a module come from. The catalog does not
//! care whether a module was mapped from disk or handed over as a buffer; it only needs a
//! stable `&[u8]` for as long as the module stays registered.
//!
//! # Key Components
//!
//! - [`crate::file::File`] - An owned byte source plus the path it was read from, if any
//! - [`crate::file::Backend`] - Trait for different data sources
//! - [`crate::file::physical::Physical`] - Memory-mapped file backend for disk access
//! - [`crate::file::memory::Memory`] - In-memory buffer backend
//! - [`crate::file::parser::Parser`] - Bounds-checked cursor used by every decoder
//!
//! # Thread Safety
//!
//! [`crate::file::Backend`] requires `Send + Sync`, so a [`crate::file::File`] can be
//! shared between threads once it is owned by a catalog descriptor.

pub mod io;
/// In-memory byte buffer backend.
pub mod memory;
pub mod parser;
pub mod physical;

use std::path::{Path, PathBuf};

use crate::{Error::Empty, Result};
use memory::Memory;
use physical::Physical;

/// Backend trait for file data sources.
///
/// Implementations must be immutable views: the crate never writes through a backend.
pub trait Backend: Send + Sync {
    /// Returns a slice of the data at the given offset and length.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]>;

    /// Returns the entire data buffer.
    fn data(&self) -> &[u8];

    /// Returns the total length of the data.
    fn len(&self) -> usize;
}

/// An owned module byte source.
pub struct File {
    data: Box<dyn Backend>,
    path: Option<PathBuf>,
}

impl File {
    /// Map a file from disk.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or mapped and
    /// [`crate::Error::Empty`] for zero-length files.
    pub fn from_file(path: &Path) -> Result<File> {
        let input = Physical::new(path)?;
        Self::load(input, Some(path.to_path_buf()))
    }

    /// Take ownership of an in-memory buffer.
    ///
    /// # Errors
    /// Returns [`crate::Error::Empty`] if `data` is empty.
    pub fn from_mem(data: Vec<u8>) -> Result<File> {
        Self::load(Memory::new(data), None)
    }

    fn load<T: Backend + 'static>(data: T, path: Option<PathBuf>) -> Result<File> {
        if data.len() == 0 {
            return Err(Empty);
        }

        Ok(File {
            data: Box::new(data),
            path,
        })
    }

    /// The path this file was mapped from, `None` for in-memory buffers.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Returns the total length of the data.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the file contains no bytes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }

    /// Returns the full content.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.data()
    }

    /// Returns a bounds-checked slice of the content.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the range exceeds the data.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        self.data.data_slice(offset, len)
    }
}

impl std::fmt::Debug for File {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("File")
            .field("path", &self.path)
            .field("len", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_mem() {
        let file = File::from_mem(vec![0x4D, 0x5A, 0x90, 0x00]).unwrap();
        assert_eq!(file.len(), 4);
        assert!(file.path().is_none());
        assert_eq!(file.data_slice(0, 2).unwrap(), b"MZ");
    }

    #[test]
    fn empty_is_rejected() {
        assert!(matches!(File::from_mem(Vec::new()), Err(Empty)));
    }
}
