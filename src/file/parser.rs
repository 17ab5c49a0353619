//! Cursor-based byte stream parser for PE headers and metadata structures.
//!
//! [`crate::file::parser::Parser`] wraps a byte slice together with a position and offers
//! bounds-checked sequential reads. It is the workhorse behind the header walk in
//! [`crate::image`] and the table decoding in [`crate::metadata`]; none of its operations
//! mutate the underlying bytes.
//!
//! # Examples
//!
//! ```rust
//! use modscope::Parser;
//!
//! let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
//! let mut parser = Parser::new(&data);
//!
//! let first = parser.read_le::<u32>()?;
//! assert_eq!(first, 0x04030201);
//!
//! parser.seek(6)?;
//! let last_bytes = parser.read_le::<u16>()?;
//! assert_eq!(last_bytes, 0x0807);
//! # Ok::<(), modscope::Error>(())
//! ```

use crate::{
    file::io::{read_le_at, CilIO},
    Error::OutOfBounds,
    Result,
};

/// A generic binary data parser for reading PE and ECMA-335 structures.
///
/// The parser maintains an internal position cursor and provides bounds checking
/// to prevent buffer overruns when reading malformed or truncated data.
pub struct Parser<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new `Parser` positioned at the start of `data`.
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

    /// Move the cursor to an absolute position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if `pos` lies outside the data.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos >= self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = pos;
        Ok(())
    }

    /// Move the cursor forward by `step` bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the cursor would move past the end.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        let Some(end) = self.position.checked_add(step) else {
            return Err(OutOfBounds);
        };

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        self.position = end;
        Ok(())
    }

    /// Current cursor position.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Number of bytes left after the cursor.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.position)
    }

    /// Read a little-endian value and advance.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if not enough data is left.
    pub fn read_le<T: CilIO>(&mut self) -> Result<T> {
        read_le_at::<T>(self.data, &mut self.position)
    }

    /// Read a compressed unsigned integer as defined in ECMA-335 II.23.2.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading would exceed the data length or
    /// [`crate::Error::Malformed`] for an invalid leading byte.
    pub fn read_compressed_uint(&mut self) -> Result<u32> {
        let first_byte = self.read_le::<u8>()?;

        // 1-byte encoding: 0xxxxxxx
        if (first_byte & 0x80) == 0 {
            return Ok(u32::from(first_byte));
        }

        // 2-byte encoding: 10xxxxxx xxxxxxxx
        if (first_byte & 0xC0) == 0x80 {
            let second_byte = self.read_le::<u8>()?;
            return Ok(((u32::from(first_byte) & 0x3F) << 8) | u32::from(second_byte));
        }

        // 4-byte encoding: 110xxxxx xxxxxxxx xxxxxxxx xxxxxxxx
        if (first_byte & 0xE0) == 0xC0 {
            let b1 = u32::from(self.read_le::<u8>()?);
            let b2 = u32::from(self.read_le::<u8>()?);
            let b3 = u32::from(self.read_le::<u8>()?);
            return Ok(((u32::from(first_byte) & 0x1F) << 24) | (b1 << 16) | (b2 << 8) | b3);
        }

        Err(malformed_error!("Invalid compressed uint - {}", first_byte))
    }

    /// Read `length` raw bytes and advance past them.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `length` bytes remain.
    pub fn read_bytes(&mut self, length: usize) -> Result<&'a [u8]> {
        let Some(end) = self.position.checked_add(length) else {
            return Err(OutOfBounds);
        };

        if end > self.data.len() {
            return Err(OutOfBounds);
        }

        let bytes = &self.data[self.position..end];
        self.position = end;
        Ok(bytes)
    }

    /// Read a fixed-width, NUL-padded ASCII field (e.g. a section name) and trim the padding.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `width` bytes remain.
    pub fn read_padded_ascii(&mut self, width: usize) -> Result<String> {
        let bytes = self.read_bytes(width)?;
        let end = bytes.iter().position(|b| *b == 0).unwrap_or(bytes.len());
        Ok(bytes[..end].iter().map(|b| char::from(*b)).collect())
    }

    /// Read a serialized string as used in custom attribute blobs (ECMA-335 II.23.3).
    ///
    /// A leading `0xFF` denotes a null string and yields `None`.
    ///
    /// # Errors
    /// Returns an error if the length prefix or payload is truncated or not valid UTF-8.
    pub fn read_ser_string(&mut self) -> Result<Option<String>> {
        if self.remaining() > 0 && self.data[self.position] == 0xFF {
            self.position += 1;
            return Ok(None);
        }

        let length = self.read_compressed_uint()? as usize;
        let bytes = self.read_bytes(length)?;
        match std::str::from_utf8(bytes) {
            Ok(value) => Ok(Some(value.to_string())),
            Err(_) => Err(malformed_error!("Invalid UTF-8 in serialized string")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequential_reads() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0201);
        assert_eq!(parser.read_le::<u16>().unwrap(), 0x0403);
        assert_eq!(parser.pos(), 4);
        assert_eq!(parser.remaining(), 2);
        assert!(parser.read_le::<u32>().is_err());
    }

    #[test]
    fn seek_and_advance() {
        let data = [0u8; 8];
        let mut parser = Parser::new(&data);

        parser.seek(4).unwrap();
        parser.advance_by(4).unwrap();
        assert_eq!(parser.pos(), 8);
        assert!(parser.advance_by(1).is_err());
        assert!(parser.seek(8).is_err());
        assert!(parser.advance_by(usize::MAX).is_err());
    }

    #[test]
    fn compressed_uint() {
        let data = [0x03, 0x80, 0x80, 0xC0, 0x00, 0x40, 0x00];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_compressed_uint().unwrap(), 0x03);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x80);
        assert_eq!(parser.read_compressed_uint().unwrap(), 0x4000);
    }

    #[test]
    fn padded_ascii() {
        let data = *b".text\0\0\0rest";
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_padded_ascii(8).unwrap(), ".text");
        assert_eq!(parser.pos(), 8);
    }

    #[test]
    fn ser_string() {
        let data = [0x05, b'T', b'i', b't', b'l', b'e', 0xFF];
        let mut parser = Parser::new(&data);

        assert_eq!(parser.read_ser_string().unwrap().as_deref(), Some("Title"));
        assert_eq!(parser.read_ser_string().unwrap(), None);
    }
}
