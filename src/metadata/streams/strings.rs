//! The `#Strings` heap.

use std::{ffi::CStr, str};

use crate::{Error::OutOfBounds, Result};

/// View over the `#Strings` heap: NUL-terminated UTF-8 strings addressed by byte offset.
pub struct Strings<'a> {
    data: &'a [u8],
}

impl<'a> Strings<'a> {
    /// Wrap the heap bytes.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the heap does not start with the empty string.
    pub fn from(data: &'a [u8]) -> Result<Strings<'a>> {
        if data.is_empty() || data[0] != 0 {
            return Err(malformed_error!("Provided #Strings heap is empty"));
        }

        Ok(Strings { data })
    }

    /// The string starting at `index`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for an index past the heap and
    /// [`crate::Error::Malformed`] for unterminated or non-UTF-8 data.
    pub fn get(&self, index: usize) -> Result<&'a str> {
        if index >= self.data.len() {
            return Err(OutOfBounds);
        }

        CStr::from_bytes_until_nul(&self.data[index..])
            .ok()
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| malformed_error!("Invalid string at index - {}", index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn crafted() {
        let data = b"\0<Module>\0System.Object\0Plugins\0";
        let heap = Strings::from(data).unwrap();

        assert_eq!(heap.get(0).unwrap(), "");
        assert_eq!(heap.get(1).unwrap(), "<Module>");
        assert_eq!(heap.get(10).unwrap(), "System.Object");
        assert_eq!(heap.get(17).unwrap(), "Object");
        assert_eq!(heap.get(24).unwrap(), "Plugins");
        assert!(heap.get(data.len()).is_err());
    }

    #[test]
    fn unterminated() {
        let heap = Strings::from(b"\0abc").unwrap();
        assert!(heap.get(1).is_err());
        assert!(Strings::from(b"abc\0").is_err());
    }
}
