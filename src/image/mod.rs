//! Header-level introspection of PE/CLI module images.
//!
//! This module implements the binary module reader: given the bytes of a candidate module it
//! recovers the target machine, the CLI executable kind, the application kind and the managed
//! runtime version, without loading or executing anything.
//!
//! # Layout walked by the reader
//!
//! ```text
//! DOS header ("MZ", e_lfanew @ 0x3C)
//!   └─ "PE\0\0" signature
//!        ├─ COFF header (machine, section count, characteristics)
//!        ├─ Optional header (PE32 / PE32+ magic, subsystem, data directory #14 = CLI header)
//!        └─ Section table (RVA → file offset)
//!              └─ CLI header (metadata directory, flags)
//!                    └─ Metadata root ("BSJB", version string)
//! ```
//!
//! # Failure Policy
//!
//! Any structural inconsistency (truncated input, bad magic, an address outside all sections)
//! is reported as [`crate::Error::NotAnImage`] rather than as a partial result. A version
//! string that cannot be parsed does not fail the parse; the image is simply reported as not
//! managed.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modscope::image::ModuleImage;
//!
//! let data = std::fs::read("Plugin.dll")?;
//! let image = ModuleImage::parse(&data)?;
//! println!("{:?} managed={} kind={:?}", image.machine, image.is_managed(), image.kind);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! # References
//!
//! - [ECMA-335 II.25: File format extensions to PE](https://ecma-international.org/wp-content/uploads/ECMA-335_6th_edition_june_2012.pdf)

mod section;
mod types;

pub use section::{Section, SectionTable, MAX_SECTIONS, SECTION_HEADER_SIZE};
pub use types::{
    Bitness, Characteristics, ExecutableKind, Machine, ModuleKind, RuntimeVersion,
    SUBSYSTEM_LIBRARY, SUBSYSTEM_WINDOWS_CE_GUI, SUBSYSTEM_WINDOWS_CUI, SUBSYSTEM_WINDOWS_GUI,
};

use std::path::Path;

use goblin::pe::{
    header::{DOS_MAGIC, PE_MAGIC},
    optional_header::{MAGIC_32, MAGIC_64},
};

use crate::{file::parser::Parser, file::File, metadata::root::CIL_HEADER_MAGIC, Error, Result};

/// Inputs shorter than this can not hold a DOS header plus a PE signature.
pub const MIN_IMAGE_SIZE: usize = 128;

/// Offset of `e_lfanew` inside the DOS header.
const PE_POINTER_OFFSET: usize = 0x3C;
/// Bytes between the optional header magic and the `Subsystem` field (identical for PE32 and PE32+).
const SUBSYSTEM_SKIP: usize = 66;
/// Offset of the data directory table from the start of a PE32 optional header.
const DIRECTORIES_OFFSET_PE32: usize = 96;
/// Offset of the data directory table from the start of a PE32+ optional header.
const DIRECTORIES_OFFSET_PE32_PLUS: usize = 112;
/// Index of the CLI header in the data directory table.
const CLI_DIRECTORY_INDEX: usize = 14;

/// Location of the metadata root inside the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct MetadataLocation {
    pub offset: usize,
    pub size: usize,
}

/// Parsed header facts of one module image.
///
/// Immutable once parsed. [`ModuleImage::runtime_version`] is `None` for native images and
/// for images whose metadata version string could not be parsed; both count as "not managed".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleImage {
    /// Target CPU architecture
    pub machine: Machine,
    /// CLI header flags
    pub executable_kind: ExecutableKind,
    /// Library / console / windowed application, from the subsystem field
    pub kind: ModuleKind,
    /// Raw COFF characteristics
    pub characteristics: Characteristics,
    /// `true` for the PE32+ optional header layout
    pub pe32_plus: bool,
    /// Managed runtime version from the metadata root
    pub runtime_version: Option<RuntimeVersion>,
    pub(crate) metadata: Option<MetadataLocation>,
}

impl ModuleImage {
    /// Parse the headers of a module image.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotAnImage`] for anything that is not a structurally valid
    /// PE image. Parsing never panics, whatever the input.
    pub fn parse(data: &[u8]) -> Result<ModuleImage> {
        read_image(data).map_err(|error| match error {
            Error::NotAnImage(reason) => Error::NotAnImage(reason),
            other => Error::NotAnImage(other.to_string()),
        })
    }

    /// Map the file at `path` and parse its headers.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be read, otherwise the same
    /// errors as [`ModuleImage::parse`].
    pub fn from_path(path: &Path) -> Result<ModuleImage> {
        let file = File::from_file(path)?;
        ModuleImage::parse(file.data())
    }

    /// `true` if a managed runtime version was recovered from the metadata root.
    #[must_use]
    pub fn is_managed(&self) -> bool {
        self.runtime_version.is_some()
    }

    /// `true` if the COFF header marks the image as a dynamic-link library.
    #[must_use]
    pub fn is_library(&self) -> bool {
        self.characteristics.contains(Characteristics::DLL)
    }
}

fn not_an_image(reason: &str) -> Error {
    Error::NotAnImage(reason.to_string())
}

fn read_image(data: &[u8]) -> Result<ModuleImage> {
    if data.len() < MIN_IMAGE_SIZE {
        return Err(not_an_image("input is too short"));
    }

    let mut parser = Parser::new(data);
    if parser.read_le::<u16>()? != DOS_MAGIC {
        return Err(not_an_image("missing DOS signature"));
    }

    parser.seek(PE_POINTER_OFFSET)?;
    let pe_offset = parser.read_le::<u32>()? as usize;
    parser.seek(pe_offset)?;
    if parser.read_le::<u32>()? != PE_MAGIC {
        return Err(not_an_image("missing PE signature"));
    }

    // COFF file header
    let machine = Machine::from(parser.read_le::<u16>()?);
    let section_count = parser.read_le::<u16>()?;
    if section_count > MAX_SECTIONS {
        return Err(not_an_image("too many sections"));
    }
    // TimeDateStamp, PointerToSymbolTable, NumberOfSymbols
    parser.advance_by(12)?;
    let optional_header_size = usize::from(parser.read_le::<u16>()?);
    let characteristics = Characteristics::from_bits_retain(parser.read_le::<u16>()?);

    // Optional header
    let optional_start = parser.pos();
    let pe32_plus = match parser.read_le::<u16>()? {
        MAGIC_32 => false,
        MAGIC_64 => true,
        _ => return Err(not_an_image("unknown optional header magic")),
    };

    parser.advance_by(SUBSYSTEM_SKIP)?;
    let kind = ModuleKind::from(parser.read_le::<u16>()?);

    let directories = optional_start
        + if pe32_plus {
            DIRECTORIES_OFFSET_PE32_PLUS
        } else {
            DIRECTORIES_OFFSET_PE32
        };
    parser.seek(directories + CLI_DIRECTORY_INDEX * 8)?;
    let cli_rva = parser.read_le::<u32>()?;
    let _cli_size = parser.read_le::<u32>()?;

    parser.seek(optional_start + optional_header_size)?;
    let sections = SectionTable::read(&mut parser, section_count)?;

    let mut image = ModuleImage {
        machine,
        executable_kind: ExecutableKind::empty(),
        kind,
        characteristics,
        pe32_plus,
        runtime_version: None,
        metadata: None,
    };

    if cli_rva == 0 {
        // Native image without a CLI header
        return Ok(image);
    }

    // CLI header
    let cli_offset = sections
        .rva_to_offset(cli_rva)
        .ok_or_else(|| not_an_image("CLI header is outside of all sections"))?;
    parser.seek(cli_offset)?;
    // cb, MajorRuntimeVersion, MinorRuntimeVersion
    parser.advance_by(8)?;
    let metadata_rva = parser.read_le::<u32>()?;
    let metadata_size = parser.read_le::<u32>()?;
    image.executable_kind = ExecutableKind::from_bits_retain(parser.read_le::<u32>()?);

    // Metadata root
    let metadata_offset = sections
        .rva_to_offset(metadata_rva)
        .ok_or_else(|| not_an_image("metadata root is outside of all sections"))?;
    parser.seek(metadata_offset)?;
    if parser.read_le::<u32>()? != CIL_HEADER_MAGIC {
        return Err(not_an_image("missing metadata signature"));
    }
    // MajorVersion, MinorVersion, Reserved
    parser.advance_by(8)?;
    let version_length = parser.read_le::<u32>()? as usize;
    let version_bytes = parser.read_bytes(version_length)?;
    let version: String = version_bytes.iter().map(|b| char::from(*b)).collect();

    image.runtime_version = RuntimeVersion::parse(&version).ok();
    image.metadata = Some(MetadataLocation {
        offset: metadata_offset,
        size: metadata_size as usize,
    });

    Ok(image)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::builder::ImageBuilder;

    #[test]
    fn parse_pe32_library() {
        let data = ImageBuilder::new("Contracts").build();
        let image = ModuleImage::parse(&data).unwrap();

        assert_eq!(image.machine, Machine::I386);
        assert!(!image.pe32_plus);
        assert!(image.is_managed());
        assert!(image.is_library());
        assert_eq!(image.kind, ModuleKind::ConsoleApplication);
        assert!(image.executable_kind.contains(ExecutableKind::IL_ONLY));

        let version = image.runtime_version.unwrap();
        assert_eq!((version.major, version.minor), (4, 0));
        assert_eq!(version.build, Some(30319));
    }

    #[test]
    fn parse_pe32_plus() {
        let data = ImageBuilder::new("Native64")
            .machine(Machine::Amd64)
            .pe32_plus(true)
            .subsystem(SUBSYSTEM_WINDOWS_GUI)
            .runtime_version("v2.0.50727")
            .build();
        let image = ModuleImage::parse(&data).unwrap();

        assert_eq!(image.machine, Machine::Amd64);
        assert!(image.pe32_plus);
        assert_eq!(image.kind, ModuleKind::WindowedApplication);
        assert_eq!(image.runtime_version, Some(RuntimeVersion {
            major: 2,
            minor: 0,
            build: Some(50727),
            revision: None,
        }));
    }

    #[test]
    fn parse_subsystem_library() {
        let data = ImageBuilder::new("Lib")
            .subsystem(SUBSYSTEM_LIBRARY)
            .build();
        let image = ModuleImage::parse(&data).unwrap();
        assert_eq!(image.kind, ModuleKind::Library);
    }

    #[test]
    fn unparseable_version_is_not_managed() {
        let data = ImageBuilder::new("Odd")
            .runtime_version("Standard CLI")
            .build();
        let image = ModuleImage::parse(&data).unwrap();

        assert!(!image.is_managed());
        assert!(image.metadata.is_some());
    }

    #[test]
    fn native_image_is_not_managed() {
        let data = ImageBuilder::new("Native").native().build();
        let image = ModuleImage::parse(&data).unwrap();

        assert!(!image.is_managed());
        assert_eq!(image.executable_kind, ExecutableKind::empty());
        assert!(image.metadata.is_none());
    }

    #[test]
    fn truncated_input() {
        let data = ImageBuilder::new("Contracts").build();

        for len in [0, 1, 2, 64, MIN_IMAGE_SIZE - 1] {
            assert!(matches!(
                ModuleImage::parse(&data[..len]),
                Err(Error::NotAnImage(_))
            ));
        }

        // Cut inside the section table / metadata root
        for len in [MIN_IMAGE_SIZE, 300, 0x210] {
            assert!(ModuleImage::parse(&data[..len]).is_err());
        }
    }

    #[test]
    fn bad_magic() {
        let mut data = ImageBuilder::new("Contracts").build();
        data[0] = b'X';
        assert!(matches!(ModuleImage::parse(&data), Err(Error::NotAnImage(_))));

        let mut data = ImageBuilder::new("Contracts").build();
        let pe_offset = u32::from_le_bytes([data[0x3C], data[0x3D], data[0x3E], data[0x3F]]);
        data[pe_offset as usize] = b'X';
        assert!(matches!(ModuleImage::parse(&data), Err(Error::NotAnImage(_))));
    }

    #[test]
    fn cli_header_outside_sections() {
        let data = ImageBuilder::new("Broken").cli_rva_override(0x0090_0000).build();
        assert!(matches!(ModuleImage::parse(&data), Err(Error::NotAnImage(_))));
    }

    #[test]
    fn garbage_never_panics() {
        let mut state = 0x1234_5678_u32;
        for len in [128usize, 256, 512, 4096] {
            let mut data = vec![0u8; len];
            for byte in &mut data {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                *byte = state as u8;
            }
            data[0] = b'M';
            data[1] = b'Z';
            assert!(ModuleImage::parse(&data).is_err());
        }
    }

    #[test]
    fn pe_offset_out_of_range() {
        let mut data = ImageBuilder::new("Contracts").build();
        data[0x3C..0x40].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(matches!(ModuleImage::parse(&data), Err(Error::NotAnImage(_))));
    }
}
