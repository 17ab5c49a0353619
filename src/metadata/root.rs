//! Metadata root header and stream directory.
//!
//! The metadata root is the entry point for everything [`crate::metadata`] reads: it carries
//! the runtime version string and the directory of streams (`#~`, `#Strings`, `#Blob`, ...).
//!
//! # Example
//!
//! ```rust
//! use modscope::metadata::root::Root;
//! let root = Root::read(&[
//!            0x42, 0x53, 0x4A, 0x42,
//!            0x01, 0x00,
//!            0x01, 0x00,
//!            0x00, 0x00, 0x00, 0x00,
//!            0x04, 0x00, 0x00, 0x00,
//!            b'v', b'4', b'.', 0x00,
//!            0x00, 0x00,
//!            0x01, 0x00,
//!            0x1C, 0x00, 0x00, 0x00, // StreamHeader
//!            0x04, 0x00, 0x00, 0x00,
//!            0x23, 0x7E, 0x00, 0x00,
//!            0x00, 0x00, 0x00, 0x00,
//!        ])?;
//! assert_eq!(root.version, "v4.");
//! assert_eq!(root.stream_headers[0].name, "#~");
//! # Ok::<(), modscope::Error>(())
//! ```
//!
//! # References
//!
//! - [ECMA-335 II.24.2.1: Metadata root](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

use crate::{
    file::io::{read_le, read_le_at},
    metadata::streams::StreamHeader,
    Error::OutOfBounds,
    Result,
};

/// The magic signature of the metadata root (`BSJB`).
pub const CIL_HEADER_MAGIC: u32 = 0x424A_5342;

/// Upper bound for the number of streams a sane metadata root declares.
const MAX_STREAMS: u16 = 8;

/// The metadata root header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Root {
    /// Magic signature, always [`CIL_HEADER_MAGIC`]
    pub signature: u32,
    /// Major version of the metadata format
    pub major_version: u16,
    /// Minor version of the metadata format
    pub minor_version: u16,
    /// Runtime version string, NUL padding removed
    pub version: String,
    /// Reserved flags
    pub flags: u16,
    /// The stream directory
    pub stream_headers: Vec<StreamHeader>,
}

impl Root {
    /// Read the metadata root from the start of `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] for truncated input and [`crate::Error::Malformed`]
    /// for a wrong signature, an invalid stream count or a stream outside of `data`.
    pub fn read(data: &[u8]) -> Result<Root> {
        if data.len() < 20 {
            return Err(OutOfBounds);
        }

        let signature = read_le::<u32>(data)?;
        if signature != CIL_HEADER_MAGIC {
            return Err(malformed_error!(
                "CIL_HEADER_MAGIC does not match - {}",
                signature
            ));
        }

        let version_length = read_le_at::<u32>(data, &mut 12)? as usize;
        let Some(version_end) = version_length.checked_add(16) else {
            return Err(malformed_error!(
                "Version string length causing integer overflow - {}",
                version_length
            ));
        };
        if version_end > data.len() {
            return Err(OutOfBounds);
        }

        let version: String = data[16..version_end]
            .iter()
            .take_while(|b| **b != 0)
            .map(|b| char::from(*b))
            .collect();

        let mut offset = version_end;
        let flags = read_le_at::<u16>(data, &mut offset)?;
        let stream_count = read_le_at::<u16>(data, &mut offset)?;
        if stream_count == 0 || stream_count > MAX_STREAMS {
            return Err(malformed_error!("Invalid stream count - {}", stream_count));
        }

        let mut stream_headers = Vec::with_capacity(usize::from(stream_count));
        for _ in 0..stream_count {
            if offset >= data.len() {
                return Err(OutOfBounds);
            }

            let header = StreamHeader::from(&data[offset..])?;
            match header.offset.checked_add(header.size) {
                Some(end) if end as usize <= data.len() => {}
                Some(_) => return Err(OutOfBounds),
                None => {
                    return Err(malformed_error!(
                        "Stream offset and size cause integer overflow - {} + {}",
                        header.offset,
                        header.size
                    ))
                }
            }

            offset += 8 + ((header.name.len() + 1 + 3) & !3);
            stream_headers.push(header);
        }

        Ok(Root {
            signature,
            major_version: read_le::<u16>(&data[4..])?,
            minor_version: read_le::<u16>(&data[6..])?,
            version,
            flags,
            stream_headers,
        })
    }

    /// Locate a stream by name and return its bytes within `data`.
    #[must_use]
    pub fn stream<'a>(&self, data: &'a [u8], name: &str) -> Option<&'a [u8]> {
        self.stream_headers
            .iter()
            .find(|header| header.name == name)
            .and_then(|header| {
                data.get(header.offset as usize..(header.offset + header.size) as usize)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[rustfmt::skip]
    const HEADER: [u8; 60] = [
        0x42, 0x53, 0x4A, 0x42,
        0x01, 0x00,
        0x01, 0x00,
        0x00, 0x00, 0x00, 0x00,
        0x0C, 0x00, 0x00, 0x00,
        b'v', b'4', b'.', b'0', b'.', b'3', b'0', b'3', b'1', b'9', 0x00, 0x00,
        0x00, 0x00,
        0x02, 0x00,
        0x3C, 0x00, 0x00, 0x00, // #~
        0x02, 0x00, 0x00, 0x00,
        0x23, 0x7E, 0x00, 0x00,
        0x3E, 0x00, 0x00, 0x00, // #Blob
        0x02, 0x00, 0x00, 0x00,
        0x23, 0x42, 0x6C, 0x6F, 0x62, 0x00, 0x00, 0x00,
    ];

    #[test]
    fn crafted() {
        let mut data = HEADER.to_vec();
        data.extend_from_slice(&[0xAA, 0xBB, 0x00, 0x01]);

        let root = Root::read(&data).unwrap();
        assert_eq!(root.signature, CIL_HEADER_MAGIC);
        assert_eq!(root.version, "v4.0.30319");
        assert_eq!(root.stream_headers.len(), 2);
        assert_eq!(root.stream_headers[1].name, "#Blob");
        assert_eq!(root.stream(&data, "#~"), Some(&[0xAA, 0xBB][..]));
        assert_eq!(root.stream(&data, "#Blob"), Some(&[0x00, 0x01][..]));
        assert_eq!(root.stream(&data, "#GUID"), None);
    }

    #[test]
    fn stream_outside_data() {
        assert!(Root::read(&HEADER).is_err());
    }

    #[test]
    fn wrong_signature() {
        let mut data = HEADER.to_vec();
        data[0] = 0;
        assert!(matches!(
            Root::read(&data),
            Err(crate::Error::Malformed { .. })
        ));
    }
}
