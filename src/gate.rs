//! Compatibility gate: decides whether a module on disk may be loaded into this process.
//!
//! Loading a module into the catalog keeps it mapped for the rest of the process lifetime, so
//! every candidate is checked from its headers first. The gate fails closed: a missing file,
//! anything that is not a PE image and any native image are rejected, as are modules built
//! for a newer runtime than the reference or for the other pointer width.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modscope::{gate::CompatibilityGate, image::RuntimeVersion};
//! use std::path::Path;
//!
//! let gate = CompatibilityGate::new(RuntimeVersion::new(4, 0));
//! if gate.can_load(Path::new("plugins/Extra.dll")) {
//!     println!("safe to load");
//! }
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
    time::SystemTime,
};

use dashmap::DashMap;
use tracing::{debug, trace};

use crate::{
    image::{Bitness, ModuleImage, RuntimeVersion},
    Error, Result,
};

/// Identity of one version of a file: the image is re-parsed whenever size or modification
/// time change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct FileStamp {
    len: u64,
    modified: Option<SystemTime>,
}

impl FileStamp {
    pub(crate) fn of(path: &Path) -> Result<FileStamp> {
        let metadata = fs::metadata(path)?;
        Ok(FileStamp {
            len: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// Header-based loadability check against a reference runtime version and bitness.
#[derive(Debug)]
pub struct CompatibilityGate {
    reference: RuntimeVersion,
    bitness: Bitness,
    cache: Option<DashMap<PathBuf, (FileStamp, Arc<ModuleImage>)>>,
}

impl CompatibilityGate {
    /// A gate for the current process bitness, without an image cache.
    #[must_use]
    pub fn new(reference: RuntimeVersion) -> Self {
        CompatibilityGate {
            reference,
            bitness: Bitness::current(),
            cache: None,
        }
    }

    /// Compare against `bitness` instead of the current process bitness.
    #[must_use]
    pub fn with_bitness(mut self, bitness: Bitness) -> Self {
        self.bitness = bitness;
        self
    }

    /// Enable or disable caching of parsed headers per (path, size, modification time).
    #[must_use]
    pub fn caching(mut self, enabled: bool) -> Self {
        self.cache = enabled.then(DashMap::new);
        self
    }

    /// The reference runtime version.
    #[must_use]
    pub fn reference(&self) -> RuntimeVersion {
        self.reference
    }

    /// The bitness candidates must match unless they are platform neutral.
    #[must_use]
    pub fn bitness(&self) -> Bitness {
        self.bitness
    }

    /// Parse (or fetch from the cache) the headers of the file at `path`.
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file can not be read and
    /// [`crate::Error::NotAnImage`] if it is not a PE image.
    pub fn inspect(&self, path: &Path) -> Result<Arc<ModuleImage>> {
        let Some(cache) = &self.cache else {
            return Ok(Arc::new(ModuleImage::from_path(path)?));
        };

        let stamp = FileStamp::of(path)?;
        let key = fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        if let Some(entry) = cache.get(&key) {
            if entry.0 == stamp {
                trace!(path = %path.display(), "image cache hit");
                return Ok(entry.1.clone());
            }
        }

        let image = Arc::new(ModuleImage::from_path(path)?);
        cache.insert(key, (stamp, image.clone()));
        Ok(image)
    }

    /// Check already parsed headers.
    ///
    /// # Errors
    /// Returns the reason for rejecting the image as a plain message.
    pub fn evaluate(&self, image: &ModuleImage) -> std::result::Result<(), String> {
        let Some(version) = image.runtime_version else {
            return Err("not a managed module".to_string());
        };

        if !version.is_loadable_by(&self.reference) {
            return Err(format!(
                "built for runtime {}, newer than {}",
                version, self.reference
            ));
        }

        if !image.executable_kind.is_platform_neutral() && image.machine.bitness() != Some(self.bitness)
        {
            return Err(format!(
                "machine {:?} can not run in a {} process",
                image.machine, self.bitness
            ));
        }

        Ok(())
    }

    /// Check the file at `path` and return its headers if it may be loaded.
    ///
    /// # Errors
    /// Returns [`crate::Error::Incompatible`] naming the reason for any rejected file,
    /// including files that can not be read or parsed.
    pub fn check(&self, path: &Path) -> Result<Arc<ModuleImage>> {
        let incompatible = |reason: String| Error::Incompatible {
            path: path.to_path_buf(),
            reason,
        };

        let image = self.inspect(path).map_err(|error| match error {
            Error::NotAnImage(reason) => incompatible(reason),
            other => incompatible(other.to_string()),
        })?;
        self.evaluate(&image).map_err(incompatible)?;

        Ok(image)
    }

    /// `true` if the module at `path` may be loaded. Never fails; any problem means `false`.
    #[must_use]
    pub fn can_load(&self, path: &Path) -> bool {
        match self.check(path) {
            Ok(_) => true,
            Err(error) => {
                debug!(%error, "compatibility gate rejected module");
                false
            }
        }
    }

    /// Number of cached headers.
    #[must_use]
    pub fn cached_images(&self) -> usize {
        self.cache.as_ref().map_or(0, DashMap::len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        image::Machine,
        test::{write_module, ImageBuilder},
    };

    fn gate() -> CompatibilityGate {
        CompatibilityGate::new(RuntimeVersion::new(4, 0))
    }

    #[test]
    fn accepts_neutral_module() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_module(dir.path(), "Plugins", &ImageBuilder::new("Plugins"));

        assert!(gate().can_load(&path));
        let image = gate().check(&path).unwrap();
        assert!(image.is_managed());
    }

    #[test]
    fn rejects_missing_and_junk() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!gate().can_load(&dir.path().join("missing.dll")));

        let junk = dir.path().join("junk.dll");
        fs::write(&junk, b"not a module at all").unwrap();
        assert!(matches!(gate().check(&junk), Err(Error::Incompatible { .. })));

        let native = write_module(dir.path(), "Native", ImageBuilder::new("Native").native());
        let error = gate().check(&native).unwrap_err();
        assert!(error.to_string().contains("not a managed module"));
    }

    #[test]
    fn version_check() {
        let dir = tempfile::tempdir().unwrap();
        let old = write_module(
            dir.path(),
            "Old",
            ImageBuilder::new("Old").runtime_version("v2.0.50727"),
        );
        let newer_minor = write_module(
            dir.path(),
            "NewerMinor",
            ImageBuilder::new("NewerMinor").runtime_version("v4.5"),
        );
        let newer_major = write_module(
            dir.path(),
            "NewerMajor",
            ImageBuilder::new("NewerMajor").runtime_version("v5.0"),
        );

        assert!(gate().can_load(&old));
        assert!(!gate().can_load(&newer_minor));
        assert!(!gate().can_load(&newer_major));

        let later = CompatibilityGate::new(RuntimeVersion::new(4, 5));
        assert!(later.can_load(&newer_minor));
        assert!(!later.can_load(&newer_major));
    }

    #[test]
    fn bitness_check() {
        let image = ModuleImage::parse(
            &ImageBuilder::new("X86")
                .machine(Machine::I386)
                .cli_flags(0x3)
                .build(),
        )
        .unwrap();
        assert!(gate().with_bitness(Bitness::Bits32).evaluate(&image).is_ok());
        assert!(gate().with_bitness(Bitness::Bits64).evaluate(&image).is_err());

        let image = ModuleImage::parse(
            &ImageBuilder::new("X64")
                .machine(Machine::Amd64)
                .pe32_plus(true)
                .cli_flags(0)
                .build(),
        )
        .unwrap();
        assert!(gate().with_bitness(Bitness::Bits64).evaluate(&image).is_ok());
        assert!(gate().with_bitness(Bitness::Bits32).evaluate(&image).is_err());

        // Platform neutral images pass either way
        let image = ModuleImage::parse(&ImageBuilder::new("AnyCpu").build()).unwrap();
        assert!(gate().with_bitness(Bitness::Bits32).evaluate(&image).is_ok());
        assert!(gate().with_bitness(Bitness::Bits64).evaluate(&image).is_ok());
    }

    #[test]
    fn foreign_architecture_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_module(
            dir.path(),
            "Foreign",
            ImageBuilder::new("Foreign").foreign_architecture(),
        );
        assert!(!gate().can_load(&path));
    }

    #[test]
    fn image_cache() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_module(dir.path(), "Cached", &ImageBuilder::new("Cached"));
        let gate = gate().caching(true);

        let first = gate.inspect(&path).unwrap();
        let second = gate.inspect(&path).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(gate.cached_images(), 1);

        // A different file size invalidates the entry
        let mut data = ImageBuilder::new("Cached").build();
        data.extend_from_slice(&[0u8; 16]);
        fs::write(&path, data).unwrap();
        let third = gate.inspect(&path).unwrap();
        assert!(!Arc::ptr_eq(&first, &third));
        assert_eq!(gate.cached_images(), 1);
    }
}
