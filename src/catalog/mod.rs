//! The module catalog: a process-wide registry of loaded modules plus on-demand scanning of
//! module directories.
//!
//! # Architecture
//!
//! - Loaded modules are registered by identity with get-or-create semantics: loading the same
//!   assembly twice, under the same or a different path, yields the same
//!   [`ModuleDescriptor`]. Registration order is preserved and is the order every search
//!   walks the catalog in.
//! - Directory scans never load anything. Each candidate file passes the
//!   [`crate::gate::CompatibilityGate`] and is then read once into a header-only descriptor;
//!   the bytes are dropped right after. [`ModuleCatalog::promote`] turns a header-only
//!   descriptor into a loaded one on request.
//! - Files already represented by a loaded module (same normalised path or same short name)
//!   are skipped by scans. A header-only descriptor is remembered with the file's length and
//!   modification time and is re-read when either changes.
//!
//! # Thread Safety
//!
//! All operations take `&self`. The maps are [`dashmap::DashMap`]s, registration order is a
//! [`boxcar::Vec`], and only the directory set sits behind a lock.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modscope::{catalog::ModuleCatalog, config::CatalogConfig};
//! use std::path::Path;
//!
//! let catalog = ModuleCatalog::new(CatalogConfig::load()?)?;
//! let core = catalog.load(Path::new("plugins/Contracts.dll"))?;
//! println!("{} ({})", core.title(), core.version());
//!
//! for module in catalog.scan_all() {
//!     println!("found {} at {:?}", module.identity(), module.path());
//! }
//! # Ok::<(), modscope::Error>(())
//! ```

mod descriptor;
mod loader;
mod scan;
mod system;

pub use descriptor::{types, LoadState, ModuleDescriptor, ModuleKey, TypeDescriptor};
pub use loader::{LoadedModule, MappedLoader, ModuleLoader};
pub use system::{normalize, Classifier};

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
    sync::{Arc, OnceLock, RwLock},
};

use dashmap::{mapref::entry::Entry, DashMap};
use rayon::prelude::*;
use tracing::{debug, trace, warn};

use crate::{
    config::CatalogConfig,
    gate::{CompatibilityGate, FileStamp},
    metadata::{
        identity::AssemblyIdentity,
        typedef::{ExternalType, TypeScope},
    },
    Error, Result,
};

/// Registry of loaded and scanned modules.
pub struct ModuleCatalog {
    config: CatalogConfig,
    gate: CompatibilityGate,
    loader: Box<dyn ModuleLoader>,
    classifier: Classifier,
    modules: DashMap<ModuleKey, Arc<ModuleDescriptor>>,
    order: boxcar::Vec<Arc<ModuleDescriptor>>,
    paths: DashMap<PathBuf, Arc<ModuleDescriptor>>,
    scanned: DashMap<PathBuf, (FileStamp, Arc<ModuleDescriptor>)>,
    directories: RwLock<Vec<PathBuf>>,
    entry: OnceLock<Arc<ModuleDescriptor>>,
}

impl ModuleCatalog {
    /// A catalog that loads modules with [`MappedLoader`].
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if the configured runtime version is invalid.
    pub fn new(config: CatalogConfig) -> Result<Self> {
        Self::with_loader(config, Box::new(MappedLoader))
    }

    /// A catalog that loads modules with `loader`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Config`] if the configured runtime version is invalid.
    pub fn with_loader(config: CatalogConfig, loader: Box<dyn ModuleLoader>) -> Result<Self> {
        let gate = CompatibilityGate::new(config.reference_version()?).caching(config.cache_images);
        let classifier = Classifier::new(
            config.system_public_key_tokens.iter(),
            &config.global_cache_directories,
        );
        let directories = config.initial_directories();

        Ok(ModuleCatalog {
            config,
            gate,
            loader,
            classifier,
            modules: DashMap::new(),
            order: boxcar::Vec::new(),
            paths: DashMap::new(),
            scanned: DashMap::new(),
            directories: RwLock::new(directories),
            entry: OnceLock::new(),
        })
    }

    /// The configuration this catalog was built from.
    #[must_use]
    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// The compatibility gate every load and scan goes through.
    #[must_use]
    pub fn gate(&self) -> &CompatibilityGate {
        &self.gate
    }

    /// Register a loaded module, or return the descriptor already registered for its identity.
    pub fn register(&self, module: LoadedModule) -> Arc<ModuleDescriptor> {
        let (file, image, metadata) = module.into_parts();
        let path = file.path().map(normalize);
        let key = ModuleKey::of(&metadata.identity);

        if let Some(existing) = self.modules.get(&key).map(|entry| entry.value().clone()) {
            trace!(module = %key, "module already registered");
            self.forget_scanned(&key);
            if let Some(path) = path {
                self.paths.entry(path).or_insert(existing.clone());
            }
            return existing;
        }

        let system = self.classifier.is_system(&metadata.identity);
        let global = self.classifier.is_global(path.as_deref());
        let mut created = false;
        let descriptor = self
            .modules
            .entry(key)
            .or_insert_with(|| {
                created = true;
                Arc::new(ModuleDescriptor::new(
                    LoadState::Loaded,
                    path.clone(),
                    Arc::new(image),
                    metadata,
                    Some(file),
                    system,
                    global,
                ))
            })
            .value()
            .clone();

        self.forget_scanned(descriptor.key());
        if created {
            self.order.push(descriptor.clone());
            debug!(module = %descriptor, system, global, "registered module");
        }
        if let Some(path) = path {
            self.paths.entry(path).or_insert(descriptor.clone());
        }

        descriptor
    }

    /// Drop header-only descriptors of an identity that is now loaded, whatever their path.
    fn forget_scanned(&self, key: &ModuleKey) {
        self.scanned.retain(|path, (_, module)| {
            let keep = module.key() != key;
            if !keep {
                trace!(path = %path.display(), module = %key, "dropping header-only copy of loaded module");
            }
            keep
        });
    }

    /// Load the module at `path` after it passed the compatibility gate.
    ///
    /// Loading a path that is already registered returns the existing descriptor without
    /// touching the file again.
    ///
    /// # Errors
    /// Returns [`crate::Error::Incompatible`] if the gate rejects the file and the loader's
    /// error if the full load fails.
    pub fn load(&self, path: &Path) -> Result<Arc<ModuleDescriptor>> {
        let normalized = normalize(path);
        if let Some(existing) = self.paths.get(&normalized) {
            return Ok(existing.value().clone());
        }

        self.gate.check(path)?;
        let module = self.loader.load(path)?;
        Ok(self.register(module))
    }

    /// Load a module from an in-memory image.
    ///
    /// # Errors
    /// Returns an error if the bytes are not a managed module, and
    /// [`crate::Error::Incompatible`] if the gate rejects its headers.
    pub fn load_bytes(&self, data: Vec<u8>) -> Result<Arc<ModuleDescriptor>> {
        let module = LoadedModule::from_bytes(data)?;
        self.gate
            .evaluate(module.image())
            .map_err(|reason| Error::Incompatible {
                path: PathBuf::from("<memory>"),
                reason,
            })?;

        Ok(self.register(module))
    }

    /// Mark `module` as the module of the running process. Only the first call has an effect.
    pub fn set_entry_module(&self, module: Arc<ModuleDescriptor>) -> bool {
        self.entry.set(module).is_ok()
    }

    /// The module of the running process, if one was set.
    #[must_use]
    pub fn entry_module(&self) -> Option<Arc<ModuleDescriptor>> {
        self.entry.get().cloned()
    }

    /// The loaded module with `identity`.
    #[must_use]
    pub fn get(&self, identity: &AssemblyIdentity) -> Option<Arc<ModuleDescriptor>> {
        self.modules
            .get(&ModuleKey::of(identity))
            .map(|entry| entry.value().clone())
    }

    /// Number of loaded modules.
    #[must_use]
    pub fn loaded_count(&self) -> usize {
        self.order.count()
    }

    /// The loaded module registered at position `index`.
    #[must_use]
    pub fn loaded_at(&self, index: usize) -> Option<Arc<ModuleDescriptor>> {
        self.order.get(index).cloned()
    }

    /// All loaded modules in registration order.
    #[must_use]
    pub fn all_loaded(&self) -> Vec<Arc<ModuleDescriptor>> {
        self.order.iter().map(|(_, module)| module.clone()).collect()
    }

    /// Header-only descriptors produced by earlier scans and not promoted since.
    #[must_use]
    pub fn header_only(&self) -> Vec<Arc<ModuleDescriptor>> {
        let mut modules: Vec<Arc<ModuleDescriptor>> = self
            .scanned
            .iter()
            .map(|entry| entry.value().1.clone())
            .collect();
        modules.sort_by(|a, b| a.path().cmp(&b.path()));
        modules
    }

    /// The loaded module with simple name `name`; an exact match wins over a
    /// case-insensitive one.
    #[must_use]
    pub fn by_name(&self, name: &str) -> Option<Arc<ModuleDescriptor>> {
        let loaded = self.all_loaded();
        loaded
            .iter()
            .find(|module| module.name() == name)
            .or_else(|| loaded.iter().find(|module| module.identity().same_name(name)))
            .cloned()
    }

    /// Find a type by full name across the loaded modules, in registration order.
    #[must_use]
    pub fn find_type(&self, name: &str, ignore_case: bool) -> Option<TypeDescriptor> {
        let loaded = self.all_loaded();
        let find = |ignore_case: bool| {
            loaded.iter().find_map(|module| {
                let type_def = module.metadata().find_type(name, ignore_case)?;
                TypeDescriptor::new(module, type_def.token)
            })
        };

        find(false).or_else(|| if ignore_case { find(true) } else { None })
    }

    /// Resolve a type named by `from` to its declaration, looking at `from` itself, then at
    /// loaded modules and finally at header-only modules of the referenced assembly.
    #[must_use]
    pub fn resolve_external(
        &self,
        from: &Arc<ModuleDescriptor>,
        external: &ExternalType,
    ) -> Option<TypeDescriptor> {
        let declare = |module: &Arc<ModuleDescriptor>| {
            let type_def = module.metadata().find_external(external)?;
            TypeDescriptor::new(module, type_def.token)
        };

        match &external.scope {
            TypeScope::CurrentModule => declare(from),
            TypeScope::Assembly(name) if from.identity().same_name(name) => declare(from),
            TypeScope::Assembly(name) => {
                if let Some(module) = self.by_name(name) {
                    return declare(&module);
                }
                self.scanned
                    .iter()
                    .find(|entry| entry.value().1.identity().same_name(name))
                    .map(|entry| entry.value().1.clone())
                    .and_then(|module| declare(&module))
            }
        }
    }

    /// The directories scanned for modules that are not loaded.
    #[must_use]
    pub fn directories(&self) -> Vec<PathBuf> {
        read_lock!(self.directories).clone()
    }

    /// Add a directory to the scan set.
    pub fn add_directory(&self, directory: impl Into<PathBuf>) {
        let directory = directory.into();
        let mut directories = write_lock!(self.directories);
        if !directories.contains(&directory) {
            directories.push(directory);
        }
    }

    /// Replace the scan set.
    pub fn set_directories(&self, directories: Vec<PathBuf>) {
        *write_lock!(self.directories) = directories;
    }

    /// Header-only descriptors of every compatible module file in `directory` that is not
    /// loaded already. Nothing is loaded.
    #[must_use]
    pub fn scan_directory(&self, directory: &Path) -> Vec<Arc<ModuleDescriptor>> {
        let files = scan::candidates(directory, &self.config);
        let loaded_names: HashSet<String> = self
            .order
            .iter()
            .flat_map(|(_, module)| {
                let mut names = vec![module.name().to_ascii_lowercase()];
                names.extend(module.path().and_then(scan::short_name));
                names
            })
            .collect();

        files
            .par_iter()
            .map(|path| self.scan_file(path, &loaded_names))
            .collect::<Vec<_>>()
            .into_iter()
            .flatten()
            .collect()
    }

    /// Scan every configured directory; a module found in two directories is reported once.
    #[must_use]
    pub fn scan_all(&self) -> Vec<Arc<ModuleDescriptor>> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();
        for directory in self.directories() {
            for module in self.scan_directory(&directory) {
                if seen.insert(module.key().clone()) {
                    found.push(module);
                }
            }
        }
        found
    }

    fn scan_file(&self, path: &Path, loaded_names: &HashSet<String>) -> Option<Arc<ModuleDescriptor>> {
        let normalized = normalize(path);
        if self.paths.contains_key(&normalized) {
            trace!(path = %path.display(), "already loaded");
            return None;
        }
        if scan::short_name(path).is_some_and(|name| loaded_names.contains(&name)) {
            trace!(path = %path.display(), "a module with this name is already loaded");
            return None;
        }

        let stamp = match FileStamp::of(path) {
            Ok(stamp) => stamp,
            Err(error) => {
                debug!(path = %path.display(), %error, "skipping unreadable file");
                return None;
            }
        };
        if let Some((previous, module)) = self.scanned.get(&normalized).map(|entry| entry.value().clone()) {
            if self.modules.contains_key(module.key()) {
                trace!(path = %path.display(), "same identity is already loaded");
                self.scanned.remove(&normalized);
                return None;
            }
            if previous == stamp {
                return Some(module);
            }
            trace!(path = %path.display(), "file changed since the last scan");
            self.scanned.remove(&normalized);
        }

        let image = match self.gate.check(path) {
            Ok(image) => image,
            Err(error) => {
                debug!(%error, "skipping scanned module");
                return None;
            }
        };

        let metadata = match scan::read_header_only(path, &image) {
            Ok(metadata) => metadata,
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping module with unreadable metadata");
                return None;
            }
        };

        if self.modules.contains_key(&ModuleKey::of(&metadata.identity)) {
            trace!(path = %path.display(), "same identity is already loaded");
            return None;
        }

        let system = self.classifier.is_system(&metadata.identity);
        let global = self.classifier.is_global(Some(&normalized));
        let descriptor = Arc::new(ModuleDescriptor::new(
            LoadState::HeaderOnly,
            Some(normalized.clone()),
            image,
            metadata,
            None,
            system,
            global,
        ));
        trace!(module = %descriptor, "scanned module");

        match self.scanned.entry(normalized) {
            Entry::Occupied(entry) if entry.get().0 == stamp => Some(entry.get().1.clone()),
            Entry::Occupied(mut entry) => {
                entry.insert((stamp, descriptor.clone()));
                Some(descriptor)
            }
            Entry::Vacant(entry) => {
                entry.insert((stamp, descriptor.clone()));
                Some(descriptor)
            }
        }
    }

    /// Fully load the module behind a header-only descriptor. Loaded descriptors are
    /// returned unchanged.
    ///
    /// # Errors
    /// Returns [`crate::Error::NotSupported`] for descriptors without a path and the errors
    /// of [`ModuleCatalog::load`] otherwise.
    pub fn promote(&self, module: &Arc<ModuleDescriptor>) -> Result<Arc<ModuleDescriptor>> {
        if module.is_loaded() {
            return Ok(module.clone());
        }

        if let Some(existing) = self.modules.get(module.key()).map(|entry| entry.value().clone()) {
            self.forget_scanned(module.key());
            return Ok(existing);
        }

        let path = module.path().ok_or(Error::NotSupported)?;
        let loaded = self.load(path)?;
        self.scanned.remove(&normalize(path));
        debug!(module = %loaded, "promoted header-only module");
        Ok(loaded)
    }
}

impl std::fmt::Debug for ModuleCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleCatalog")
            .field("loaded", &self.loaded_count())
            .field("scanned", &self.scanned.len())
            .field("directories", &self.directories())
            .finish_non_exhaustive()
    }
}
