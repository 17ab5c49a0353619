//! Catalog configuration.
//!
//! [`CatalogConfig`] controls which directories are scanned for modules that are not loaded
//! yet, which runtime version the compatibility gate compares against and which signing
//! markers classify a module as part of the platform. It is plain data, read from TOML:
//!
//! ```toml
//! runtime_version = "4.0"
//! directories = ["/opt/app/plugins"]
//! global_cache_directories = ["/usr/lib/mono/gac"]
//! extensions = ["dll"]
//! binaries_subdirectory = ""   # no binaries subdirectory
//! ```
//!
//! [`CatalogConfig::load`] honours an explicit file named by the `MODSCOPE_CONFIG` environment
//! variable and falls back to the defaults otherwise.

use std::{
    fs,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};

use crate::{image::RuntimeVersion, Error, Result};

/// Environment variable naming a configuration file.
pub const CONFIG_ENV: &str = "MODSCOPE_CONFIG";

/// Public key tokens of platform assemblies (ECMA, Microsoft, .NET Core, Silverlight and
/// the shared framework signing keys).
pub const DEFAULT_SYSTEM_TOKENS: &[&str] = &[
    "b77a5c561934e089",
    "b03f5f7f11d50a3a",
    "31bf3856ad364e35",
    "7cec85d7bea7798e",
    "cc7b13ffcd2ddd51",
    "adb9793829ddae60",
];

/// File name prefixes of test-host artifacts that are never scanned.
pub const DEFAULT_EXCLUDED_PREFIXES: &[&str] = &[
    "testhost",
    "Microsoft.TestPlatform",
    "Microsoft.VisualStudio.TestPlatform",
    "xunit.runner",
    "nunit.engine",
];

/// `None` is written as an empty string and read back from one, so it survives TOML.
mod empty_is_none {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(
        value: &Option<String>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_deref().unwrap_or_default())
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<String>, D::Error> {
        let value = String::deserialize(deserializer)?;
        Ok(Some(value).filter(|name| !name.trim().is_empty()))
    }
}

/// Configuration of a [`crate::catalog::ModuleCatalog`].
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct CatalogConfig {
    /// Reference runtime version (`major.minor`) the compatibility gate compares against
    pub runtime_version: String,
    /// Seed the directory set with the directory of the running executable
    pub include_execution_directory: bool,
    /// Subdirectory of the execution directory added when it exists. An empty string
    /// disables it.
    #[serde(with = "empty_is_none")]
    pub binaries_subdirectory: Option<String>,
    /// Additional directories to scan
    pub directories: Vec<PathBuf>,
    /// Directories whose modules belong to the global shared cache
    pub global_cache_directories: Vec<PathBuf>,
    /// File extensions of module files, without the dot
    pub extensions: Vec<String>,
    /// File name prefixes that are never scanned
    pub excluded_prefixes: Vec<String>,
    /// Public key tokens (lower-case hex) that mark a module as part of the platform
    pub system_public_key_tokens: Vec<String>,
    /// Cache parsed headers per (path, size, modification time)
    pub cache_images: bool,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        CatalogConfig {
            runtime_version: "4.0".to_string(),
            include_execution_directory: true,
            binaries_subdirectory: Some("bin".to_string()),
            directories: Vec::new(),
            global_cache_directories: Vec::new(),
            extensions: vec!["dll".to_string(), "exe".to_string()],
            excluded_prefixes: DEFAULT_EXCLUDED_PREFIXES
                .iter()
                .map(|prefix| prefix.to_string())
                .collect(),
            system_public_key_tokens: DEFAULT_SYSTEM_TOKENS
                .iter()
                .map(|token| token.to_string())
                .collect(),
            cache_images: true,
        }
    }
}

impl CatalogConfig {
    /// A configuration that scans only `directories` and nothing derived from the running
    /// executable.
    #[must_use]
    pub fn isolated(directories: Vec<PathBuf>) -> Self {
        CatalogConfig {
            include_execution_directory: false,
            binaries_subdirectory: None,
            directories,
            ..CatalogConfig::default()
        }
    }

    /// Load the file named by `MODSCOPE_CONFIG`, or the defaults if the variable is unset.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if the named file can not be read or parsed.
    pub fn load() -> Result<Self> {
        match std::env::var(CONFIG_ENV) {
            Ok(path) if !path.trim().is_empty() => Self::from_file(Path::new(path.trim())),
            _ => Ok(CatalogConfig::default()),
        }
    }

    /// Parse a configuration file.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if the file can not be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|error| Error::Config(format!("{}: {}", path.display(), error)))?;
        Self::from_toml_str(&content)
    }

    /// Parse a configuration from TOML text.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] for invalid TOML or an invalid runtime version.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: CatalogConfig =
            toml::from_str(content).map_err(|error| Error::Config(error.to_string()))?;
        config.reference_version()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if serialization fails.
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|error| Error::Config(error.to_string()))
    }

    /// The parsed reference runtime version.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if `runtime_version` is not a version.
    pub fn reference_version(&self) -> Result<RuntimeVersion> {
        RuntimeVersion::parse(&self.runtime_version).map_err(|_| {
            Error::Config(format!(
                "Invalid runtime_version - {}",
                self.runtime_version
            ))
        })
    }

    /// The initial directory set: the execution directory and its binaries subdirectory
    /// (when enabled and present) followed by the configured directories, without duplicates.
    #[must_use]
    pub fn initial_directories(&self) -> Vec<PathBuf> {
        let mut directories = Vec::new();

        if self.include_execution_directory {
            if let Some(execution) = std::env::current_exe()
                .ok()
                .and_then(|exe| exe.parent().map(Path::to_path_buf))
            {
                if let Some(binaries) = &self.binaries_subdirectory {
                    let candidate = execution.join(binaries);
                    directories.push(execution);
                    if candidate.is_dir() {
                        directories.push(candidate);
                    }
                } else {
                    directories.push(execution);
                }
            }
        }

        for directory in &self.directories {
            if !directories.contains(directory) {
                directories.push(directory.clone());
            }
        }

        directories
    }

    /// `true` if `path` has one of the configured module extensions and is not a test-host
    /// artifact.
    #[must_use]
    pub fn is_candidate_file(&self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|e| e.to_str()) else {
            return false;
        };
        if !self
            .extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(extension))
        {
            return false;
        }

        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return false;
        };
        !self.excluded_prefixes.iter().any(|prefix| {
            file_name.len() >= prefix.len()
                && file_name[..prefix.len()].eq_ignore_ascii_case(prefix)
        })
    }
}
