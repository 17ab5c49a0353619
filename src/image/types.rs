//! Header-level facts recovered from a PE/CLI image.

use std::{fmt, str::FromStr};

use bitflags::bitflags;
use goblin::pe::{
    characteristic::{
        IMAGE_FILE_32BIT_MACHINE, IMAGE_FILE_DLL, IMAGE_FILE_EXECUTABLE_IMAGE,
        IMAGE_FILE_LARGE_ADDRESS_AWARE,
    },
    header::{
        COFF_MACHINE_ARM64, COFF_MACHINE_ARMNT, COFF_MACHINE_IA64, COFF_MACHINE_X86,
        COFF_MACHINE_X86_64,
    },
};

use crate::{Error, Result};

/// `IMAGE_SUBSYSTEM_NATIVE`, which the reader reports as a library.
pub const SUBSYSTEM_LIBRARY: u16 = 1;
/// `IMAGE_SUBSYSTEM_WINDOWS_GUI`
pub const SUBSYSTEM_WINDOWS_GUI: u16 = 2;
/// `IMAGE_SUBSYSTEM_WINDOWS_CUI`
pub const SUBSYSTEM_WINDOWS_CUI: u16 = 3;
/// `IMAGE_SUBSYSTEM_WINDOWS_CE_GUI`
pub const SUBSYSTEM_WINDOWS_CE_GUI: u16 = 9;

/// Pointer width of a process or of the native code contained in a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Bitness {
    /// 32-bit code (x86, ARM)
    Bits32,
    /// 64-bit code (x64, ARM64, Itanium)
    Bits64,
}

impl Bitness {
    /// Bitness of the currently running process.
    #[must_use]
    pub const fn current() -> Self {
        if cfg!(target_pointer_width = "64") {
            Bitness::Bits64
        } else {
            Bitness::Bits32
        }
    }
}

impl fmt::Display for Bitness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Bitness::Bits32 => write!(f, "32-bit"),
            Bitness::Bits64 => write!(f, "64-bit"),
        }
    }
}

/// Target CPU architecture tag from the COFF file header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Machine {
    /// Intel 386 and compatibles
    I386,
    /// x64
    Amd64,
    /// ARM Thumb-2
    Arm,
    /// ARM64
    Arm64,
    /// Intel Itanium
    Ia64,
    /// Any other machine value, kept verbatim
    Unknown(u16),
}

impl Machine {
    /// The native bitness implied by this machine, `None` if unknown.
    #[must_use]
    pub fn bitness(&self) -> Option<Bitness> {
        match self {
            Machine::I386 | Machine::Arm => Some(Bitness::Bits32),
            Machine::Amd64 | Machine::Arm64 | Machine::Ia64 => Some(Bitness::Bits64),
            Machine::Unknown(_) => None,
        }
    }

    /// The raw COFF machine value.
    #[must_use]
    pub fn raw(&self) -> u16 {
        match self {
            Machine::I386 => COFF_MACHINE_X86,
            Machine::Amd64 => COFF_MACHINE_X86_64,
            Machine::Arm => COFF_MACHINE_ARMNT,
            Machine::Arm64 => COFF_MACHINE_ARM64,
            Machine::Ia64 => COFF_MACHINE_IA64,
            Machine::Unknown(value) => *value,
        }
    }
}

impl From<u16> for Machine {
    fn from(value: u16) -> Self {
        match value {
            COFF_MACHINE_X86 => Machine::I386,
            COFF_MACHINE_X86_64 => Machine::Amd64,
            COFF_MACHINE_ARMNT => Machine::Arm,
            COFF_MACHINE_ARM64 => Machine::Arm64,
            COFF_MACHINE_IA64 => Machine::Ia64,
            other => Machine::Unknown(other),
        }
    }
}

/// Application kind derived from the optional header's `Subsystem` field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModuleKind {
    /// Subsystem 1
    Library,
    /// Subsystem 2 or 9
    WindowedApplication,
    /// Subsystem 3
    ConsoleApplication,
    /// Any other subsystem value, kept verbatim
    Other(u16),
}

impl From<u16> for ModuleKind {
    fn from(subsystem: u16) -> Self {
        match subsystem {
            SUBSYSTEM_LIBRARY => ModuleKind::Library,
            SUBSYSTEM_WINDOWS_GUI | SUBSYSTEM_WINDOWS_CE_GUI => ModuleKind::WindowedApplication,
            SUBSYSTEM_WINDOWS_CUI => ModuleKind::ConsoleApplication,
            other => ModuleKind::Other(other),
        }
    }
}

bitflags! {
    /// Raw COFF `Characteristics` flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct Characteristics: u16 {
        /// The image is a valid executable
        const EXECUTABLE_IMAGE = IMAGE_FILE_EXECUTABLE_IMAGE;
        /// The application can handle addresses above 2 GB
        const LARGE_ADDRESS_AWARE = IMAGE_FILE_LARGE_ADDRESS_AWARE;
        /// The machine is based on a 32-bit word architecture
        const MACHINE_32BIT = IMAGE_FILE_32BIT_MACHINE;
        /// The image is a dynamic-link library
        const DLL = IMAGE_FILE_DLL;
    }
}

bitflags! {
    /// CLI header `Flags` (`COMIMAGE_FLAGS_*`), the module's executable kind.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExecutableKind: u32 {
        /// Contains only IL code
        const IL_ONLY = 0x0000_0001;
        /// Can only be loaded into a 32-bit process
        const REQUIRES_32BIT = 0x0000_0002;
        /// Image is a precompiled IL library
        const IL_LIBRARY = 0x0000_0004;
        /// Image carries a strong name signature
        const STRONG_NAME_SIGNED = 0x0000_0008;
        /// Entry point is a native method
        const NATIVE_ENTRYPOINT = 0x0000_0010;
        /// Debug data is tracked by the loader
        const TRACK_DEBUG_DATA = 0x0001_0000;
        /// Prefers running as a 32-bit process
        const PREFERS_32BIT = 0x0002_0000;
    }
}

impl ExecutableKind {
    /// `true` when the module has no architecture-specific code and runs in either a 32-bit
    /// or a 64-bit process.
    #[must_use]
    pub fn is_platform_neutral(&self) -> bool {
        self.contains(ExecutableKind::IL_ONLY) && !self.contains(ExecutableKind::REQUIRES_32BIT)
    }
}

/// Managed runtime version parsed from the metadata root version string (e.g. `v4.0.30319`).
///
/// Ordering compares all present components; compatibility decisions only ever look at
/// [`RuntimeVersion::major`] and [`RuntimeVersion::minor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RuntimeVersion {
    /// Major component
    pub major: u32,
    /// Minor component
    pub minor: u32,
    /// Build component, if present
    pub build: Option<u32>,
    /// Revision component, if present
    pub revision: Option<u32>,
}

impl RuntimeVersion {
    /// Creates a `major.minor` version.
    #[must_use]
    pub const fn new(major: u32, minor: u32) -> Self {
        RuntimeVersion {
            major,
            minor,
            build: None,
            revision: None,
        }
    }

    /// Parses a metadata version string.
    ///
    /// A leading `v`/`V` marker and trailing NULs are trimmed. Any trailing suffix after the
    /// numeric components (such as `-preview` or ` build`) is ignored.
    ///
    /// # Errors
    /// Returns [`crate::Error::Error`] unless at least `major.minor` parse as integers.
    pub fn parse(version: &str) -> Result<Self> {
        let trimmed = version.trim_end_matches('\0').trim();
        let trimmed = trimmed
            .strip_prefix('v')
            .or_else(|| trimmed.strip_prefix('V'))
            .unwrap_or(trimmed);

        let numeric_end = trimmed
            .find(|c: char| !(c.is_ascii_digit() || c == '.'))
            .unwrap_or(trimmed.len());

        let mut components = trimmed[..numeric_end]
            .split('.')
            .map(|part| part.parse::<u32>().ok());

        let (Some(Some(major)), Some(Some(minor))) = (components.next(), components.next())
        else {
            return Err(Error::Error(format!("Invalid runtime version - {}", version)));
        };

        Ok(RuntimeVersion {
            major,
            minor,
            build: components.next().flatten(),
            revision: components.next().flatten(),
        })
    }

    /// `true` when a module built for `self` may be loaded by a runtime of `reference`.
    ///
    /// Only major and minor are compared: a candidate is accepted if its major is lower, or
    /// if the majors match and its minor is not higher.
    #[must_use]
    pub fn is_loadable_by(&self, reference: &RuntimeVersion) -> bool {
        if self.major != reference.major {
            return self.major < reference.major;
        }

        self.minor <= reference.minor
    }
}

impl FromStr for RuntimeVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        RuntimeVersion::parse(s)
    }
}

impl fmt::Display for RuntimeVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)?;
        if let Some(build) = self.build {
            write!(f, ".{}", build)?;
            if let Some(revision) = self.revision {
                write!(f, ".{}", revision)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn runtime_version_parse() {
        let version = RuntimeVersion::parse("v4.0.30319\0\0").unwrap();
        assert_eq!(version.major, 4);
        assert_eq!(version.minor, 0);
        assert_eq!(version.build, Some(30319));
        assert_eq!(version.revision, None);
        assert_eq!(version.to_string(), "4.0.30319");

        let version = RuntimeVersion::parse("v2.0.50727").unwrap();
        assert_eq!((version.major, version.minor), (2, 0));

        let version = RuntimeVersion::parse("v4.0.30319-preview").unwrap();
        assert_eq!(version.build, Some(30319));
    }

    #[test]
    fn runtime_version_parse_invalid() {
        assert!(RuntimeVersion::parse("").is_err());
        assert!(RuntimeVersion::parse("v").is_err());
        assert!(RuntimeVersion::parse("Standard CLI 2005").is_err());
        assert!(RuntimeVersion::parse("v4").is_err());
    }

    #[test]
    fn loadable_by() {
        let reference = RuntimeVersion::new(4, 0);

        assert!(RuntimeVersion::new(2, 0).is_loadable_by(&reference));
        assert!(RuntimeVersion::new(2, 9).is_loadable_by(&reference));
        assert!(RuntimeVersion::new(4, 0).is_loadable_by(&reference));
        assert!(!RuntimeVersion::new(4, 1).is_loadable_by(&reference));
        assert!(!RuntimeVersion::new(5, 0).is_loadable_by(&reference));
    }

    #[test]
    fn loadable_is_monotonic() {
        let candidates = [(1, 0), (1, 1), (2, 0), (2, 5), (3, 0), (4, 0), (4, 5)];
        let references = [(1, 0), (1, 5), (2, 0), (2, 5), (3, 0), (4, 0), (4, 5), (5, 0)];

        for (c_major, c_minor) in candidates {
            let candidate = RuntimeVersion::new(c_major, c_minor);
            for (r_major, r_minor) in references {
                let reference = RuntimeVersion::new(r_major, r_minor);
                if !candidate.is_loadable_by(&reference) {
                    continue;
                }

                for (h_major, h_minor) in references {
                    let higher = RuntimeVersion::new(h_major, h_minor);
                    let same_major_higher = h_major == r_major && h_minor >= r_minor;
                    if same_major_higher || h_major > r_major {
                        assert!(candidate.is_loadable_by(&higher));
                    }
                }
            }
        }
    }

    #[test]
    fn machine_bitness() {
        assert_eq!(Machine::from(0x014C), Machine::I386);
        assert_eq!(Machine::from(0x8664), Machine::Amd64);
        assert_eq!(Machine::from(0xAA64), Machine::Arm64);
        assert_eq!(Machine::from(0x1234), Machine::Unknown(0x1234));
        assert_eq!(Machine::I386.bitness(), Some(Bitness::Bits32));
        assert_eq!(Machine::Amd64.bitness(), Some(Bitness::Bits64));
        assert_eq!(Machine::Unknown(7).bitness(), None);
        assert_eq!(Machine::Amd64.raw(), 0x8664);
    }

    #[test]
    fn module_kind_from_subsystem() {
        assert_eq!(ModuleKind::from(1), ModuleKind::Library);
        assert_eq!(ModuleKind::from(2), ModuleKind::WindowedApplication);
        assert_eq!(ModuleKind::from(9), ModuleKind::WindowedApplication);
        assert_eq!(ModuleKind::from(3), ModuleKind::ConsoleApplication);
        assert_eq!(ModuleKind::from(14), ModuleKind::Other(14));
    }

    #[test]
    fn platform_neutral() {
        assert!(ExecutableKind::IL_ONLY.is_platform_neutral());
        assert!(!(ExecutableKind::IL_ONLY | ExecutableKind::REQUIRES_32BIT).is_platform_neutral());
        assert!(!ExecutableKind::empty().is_platform_neutral());
    }
}
