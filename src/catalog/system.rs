//! Classification of platform ("system") modules and of modules from a global shared cache.
//!
//! System modules are recognised by their strong-name signing key: the public key token in
//! the identity's display string is compared against a fixed list of platform tokens. Plugin
//! scans skip them; direct lookups still find them.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::metadata::identity::AssemblyIdentity;

/// Decides which modules are part of the platform or of a global cache.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    tokens: HashSet<String>,
    global_directories: Vec<PathBuf>,
}

impl Classifier {
    /// A classifier for the given lower-case hex tokens and global cache directories.
    #[must_use]
    pub fn new<I, S>(tokens: I, global_directories: &[PathBuf]) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Classifier {
            tokens: tokens
                .into_iter()
                .map(|token| token.as_ref().to_ascii_lowercase())
                .collect(),
            global_directories: global_directories
                .iter()
                .map(|directory| normalize(directory))
                .collect(),
        }
    }

    /// `true` if `identity` carries one of the platform signing markers.
    #[must_use]
    pub fn is_system(&self, identity: &AssemblyIdentity) -> bool {
        let display = identity.display_name().to_ascii_lowercase();
        display
            .rsplit_once("publickeytoken=")
            .is_some_and(|(_, token)| self.tokens.contains(token))
    }

    /// `true` if `path` lies in one of the global cache directories.
    #[must_use]
    pub fn is_global(&self, path: Option<&Path>) -> bool {
        let Some(path) = path else {
            return false;
        };

        let path = normalize(path);
        self.global_directories
            .iter()
            .any(|directory| path.starts_with(directory))
    }
}

/// The canonical form of `path`, or `path` itself if it can not be canonicalized.
#[must_use]
pub fn normalize(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}
