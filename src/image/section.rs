//! Section table used to translate relative virtual addresses into file offsets.

use crate::{file::parser::Parser, Result};

/// Size of one `IMAGE_SECTION_HEADER` entry.
pub const SECTION_HEADER_SIZE: usize = 40;

/// The PE format caps the number of sections at 96.
pub const MAX_SECTIONS: u16 = 96;

/// One entry of the section table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name, NUL padding removed
    pub name: String,
    /// RVA of the first byte of the section when mapped
    pub virtual_address: u32,
    /// File offset of the section's raw data
    pub raw_data_pointer: u32,
    /// Size of the section's raw data in the file
    pub raw_data_size: u32,
}

/// Ordered sequence of sections, only alive for the duration of one parse.
#[derive(Debug, Default)]
pub struct SectionTable {
    sections: Vec<Section>,
}

impl SectionTable {
    /// Read `count` section headers from the parser's current position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the table is truncated.
    pub fn read(parser: &mut Parser, count: u16) -> Result<SectionTable> {
        let mut sections = Vec::with_capacity(usize::from(count));
        for _ in 0..count {
            let name = parser.read_padded_ascii(8)?;
            let _virtual_size = parser.read_le::<u32>()?;
            let virtual_address = parser.read_le::<u32>()?;
            let raw_data_size = parser.read_le::<u32>()?;
            let raw_data_pointer = parser.read_le::<u32>()?;
            // relocations, line numbers and characteristics
            parser.advance_by(16)?;

            sections.push(Section {
                name,
                virtual_address,
                raw_data_pointer,
                raw_data_size,
            });
        }

        Ok(SectionTable { sections })
    }

    /// Translate an RVA into a file offset, `None` if no section contains it.
    #[must_use]
    pub fn rva_to_offset(&self, rva: u32) -> Option<usize> {
        self.sections.iter().find_map(|section| {
            let end = section
                .virtual_address
                .checked_add(section.raw_data_size)?;
            if rva >= section.virtual_address && rva < end {
                let offset = u64::from(rva - section.virtual_address)
                    + u64::from(section.raw_data_pointer);
                usize::try_from(offset).ok()
            } else {
                None
            }
        })
    }

    /// Iterate over the sections in table order.
    pub fn iter(&self) -> impl Iterator<Item = &Section> {
        self.sections.iter()
    }

    /// Number of sections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sections.len()
    }

    /// `true` if the table has no sections.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sections.is_empty()
    }
}
