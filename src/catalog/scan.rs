//! Directory listing and header-only reading for catalog scans.

use std::{
    fs,
    path::{Path, PathBuf},
};

use tracing::{debug, trace};

use crate::{config::CatalogConfig, image::ModuleImage, metadata::module::ModuleMetadata, Result};

/// Module-like files directly inside `directory`, sorted by file name.
///
/// Unreadable directories yield no candidates.
pub(crate) fn candidates(directory: &Path, config: &CatalogConfig) -> Vec<PathBuf> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(error) => {
            debug!(directory = %directory.display(), %error, "skipping unreadable directory");
            return Vec::new();
        }
    };

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file())
        .filter(|path| {
            let candidate = config.is_candidate_file(path);
            if !candidate {
                trace!(path = %path.display(), "not a module candidate");
            }
            candidate
        })
        .collect();

    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    files
}

/// Lower-cased file stem, the name a module is expected to have on disk.
pub(crate) fn short_name(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_ascii_lowercase)
}

/// Read the metadata of an already gated file. The bytes are dropped before returning.
pub(crate) fn read_header_only(path: &Path, image: &ModuleImage) -> Result<ModuleMetadata> {
    let data = fs::read(path)?;
    ModuleMetadata::read(&data, image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_candidates_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.dll", "A.exe", "c.txt", "testhost.dll", "d.DLL"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }
        fs::create_dir(dir.path().join("sub.dll")).unwrap();

        let files: Vec<String> = candidates(dir.path(), &CatalogConfig::default())
            .iter()
            .map(|path| path.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(files, vec!["A.exe", "b.dll", "d.DLL"]);

        assert!(candidates(&dir.path().join("missing"), &CatalogConfig::default()).is_empty());
    }

    #[test]
    fn short_names() {
        assert_eq!(short_name(Path::new("/x/Plugins.Core.dll")).as_deref(), Some("plugins.core"));
    }
}
