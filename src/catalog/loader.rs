//! How modules get loaded.
//!
//! A [`LoadedModule`] owns the byte source of a module together with its parsed headers and
//! metadata. The catalog obtains loaded modules through the [`ModuleLoader`] trait so callers
//! can observe or replace the loading step; [`MappedLoader`] memory-maps the file.

use std::{fmt, path::Path};

use crate::{
    file::File,
    image::ModuleImage,
    metadata::module::ModuleMetadata,
    Error::NotSupported,
    Result,
};

/// A module whose bytes stay available for as long as the value lives.
pub struct LoadedModule {
    file: File,
    image: ModuleImage,
    metadata: ModuleMetadata,
}

impl LoadedModule {
    /// Parse headers and metadata of `file`.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotAnImage`] for anything but a PE image,
    /// [`crate::Error::NotSupported`] for native images and metadata errors otherwise.
    pub fn from_file(file: File) -> Result<LoadedModule> {
        let image = ModuleImage::parse(file.data())?;
        if !image.is_managed() {
            return Err(NotSupported);
        }

        let metadata = ModuleMetadata::read(file.data(), &image)?;
        Ok(LoadedModule {
            file,
            image,
            metadata,
        })
    }

    /// Load a module from an in-memory buffer.
    ///
    /// # Errors
    /// Same as [`LoadedModule::from_file`], plus [`crate::Error::Empty`] for an empty buffer.
    pub fn from_bytes(data: Vec<u8>) -> Result<LoadedModule> {
        LoadedModule::from_file(File::from_mem(data)?)
    }

    /// The byte source.
    #[must_use]
    pub fn file(&self) -> &File {
        &self.file
    }

    /// The parsed headers.
    #[must_use]
    pub fn image(&self) -> &ModuleImage {
        &self.image
    }

    /// The parsed metadata.
    #[must_use]
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    pub(crate) fn into_parts(self) -> (File, ModuleImage, ModuleMetadata) {
        (self.file, self.image, self.metadata)
    }
}

impl fmt::Debug for LoadedModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedModule")
            .field("path", &self.file.path())
            .field("identity", &self.metadata.identity.display_name())
            .finish()
    }
}

/// Performs the full load of a module file.
///
/// The catalog only calls a loader for files the compatibility gate accepted.
pub trait ModuleLoader: Send + Sync {
    /// Load the module at `path`.
    ///
    /// # Errors
    /// Returns an error if the file can not be read or is not a managed module.
    fn load(&self, path: &Path) -> Result<LoadedModule>;
}

/// Loads modules by memory-mapping them.
#[derive(Debug, Default, Clone, Copy)]
pub struct MappedLoader;

impl ModuleLoader for MappedLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        LoadedModule::from_file(File::from_file(path)?)
    }
}
