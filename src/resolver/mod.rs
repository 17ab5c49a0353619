//! Plugin discovery: concrete types implementing a capability.
//!
//! A capability is an interface or base type, identified by a [`TypeDescriptor`]. The
//! resolver answers two questions:
//!
//! - [`PluginResolver::find`]: which concrete types of one module conform to the capability.
//!   The answer is cached on the module's descriptor, an empty answer included, so each
//!   `(module, capability)` pair is searched at most once per process.
//! - [`PluginResolver::find_all`]: which concrete types of the whole catalog conform. Modules
//!   are visited in registration order. System modules, global cache modules (on request)
//!   and modules that do not reference the capability's declaring assembly are skipped.
//!   Header-only modules from the scan directories are searched when asked for and promoted
//!   to a full load only when they contain a match.
//!
//! # Examples
//!
//! ```rust,no_run
//! use modscope::prelude::*;
//! use std::{path::Path, sync::Arc};
//!
//! let catalog = Arc::new(ModuleCatalog::new(CatalogConfig::load()?)?);
//! catalog.load(Path::new("Contracts.dll"))?;
//! let resolver = PluginResolver::new(catalog.clone());
//!
//! let capability = catalog
//!     .find_type("Contracts.IPlugin", false)
//!     .ok_or_else(|| Error::TypeNotFound("Contracts.IPlugin".into()))?;
//! let options = FindOptions {
//!     include_unloaded: true,
//!     ..FindOptions::default()
//! };
//! for plugin in resolver.find_all(&capability, options) {
//!     println!("{}", plugin);
//! }
//! # Ok::<(), modscope::Error>(())
//! ```

mod conformance;

use std::{
    collections::{HashSet, VecDeque},
    sync::Arc,
};

use tracing::{debug, trace, warn};

use crate::{
    catalog::{types, ModuleCatalog, ModuleDescriptor, TypeDescriptor},
    metadata::token::Token,
};

/// Knobs of a catalog-wide search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FindOptions {
    /// Also search header-only modules of the scan directories
    pub include_unloaded: bool,
    /// Skip modules that live in a global shared cache
    pub exclude_global: bool,
    /// Skip modules that do not reference the capability's declaring assembly
    pub prune_by_dependency: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        FindOptions {
            include_unloaded: false,
            exclude_global: true,
            prune_by_dependency: true,
        }
    }
}

/// Searches a [`ModuleCatalog`] for implementations of a capability.
#[derive(Debug, Clone)]
pub struct PluginResolver {
    catalog: Arc<ModuleCatalog>,
}

impl PluginResolver {
    /// A resolver over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<ModuleCatalog>) -> Self {
        PluginResolver { catalog }
    }

    /// The catalog being searched.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    /// `true` if `candidate` is `capability`, derives from it or implements it.
    #[must_use]
    pub fn is_assignable(&self, candidate: &TypeDescriptor, capability: &TypeDescriptor) -> bool {
        conformance::conforms(&self.catalog, candidate, capability)
    }

    /// Concrete types of `module` that conform to `capability`, in declaration order.
    ///
    /// Interfaces, abstract types and open generic definitions never match. The result is
    /// cached on `module`.
    #[must_use]
    pub fn find(&self, capability: &TypeDescriptor, module: &Arc<ModuleDescriptor>) -> Vec<TypeDescriptor> {
        let key = capability.capability_key();
        if let Some(cached) = module.cached_plugins(&key) {
            trace!(module = %module.key(), capability = %capability, "plugin cache hit");
            return materialize(module, cached.as_deref());
        }

        let found: Vec<Token> = types(module)
            .filter(TypeDescriptor::is_concrete)
            .filter(|candidate| self.is_assignable(candidate, capability))
            .map(|candidate| candidate.token())
            .collect();
        debug!(
            module = %module.key(),
            capability = %capability,
            found = found.len(),
            "searched module for plugins"
        );

        let found = if found.is_empty() {
            None
        } else {
            Some(Arc::from(found))
        };
        let stored = module.cache_plugins(key, found);
        materialize(module, stored.as_deref())
    }

    /// Every conforming concrete type of the catalog, lazily, in discovery order and without
    /// duplicates.
    #[must_use]
    pub fn find_all(&self, capability: &TypeDescriptor, options: FindOptions) -> FindAll<'_> {
        FindAll {
            resolver: self,
            capability: capability.clone(),
            options,
            loaded_end: self.catalog.loaded_count(),
            next_loaded: 0,
            unloaded: None,
            pending: VecDeque::new(),
            seen: HashSet::new(),
        }
    }

    /// `true` if `module` may contain implementations of `capability` under `options`.
    #[must_use]
    pub fn should_search(
        &self,
        module: &ModuleDescriptor,
        capability: &TypeDescriptor,
        options: FindOptions,
    ) -> bool {
        if module.is_system() {
            trace!(module = %module.key(), "skipping system module");
            return false;
        }
        if options.exclude_global && module.is_global() {
            trace!(module = %module.key(), "skipping global cache module");
            return false;
        }

        let declaring = capability.module();
        if !options.prune_by_dependency || module.key() == declaring.key() {
            return true;
        }

        let references = module.references(declaring.name());
        if !references {
            trace!(
                module = %module.key(),
                declaring = %declaring.key(),
                "skipping module without a reference to the declaring assembly"
            );
        }
        references
    }

    /// Search a header-only module and promote it if it holds matches.
    fn find_unloaded(&self, capability: &TypeDescriptor, module: &Arc<ModuleDescriptor>) -> Vec<TypeDescriptor> {
        let found = self.find(capability, module);
        if found.is_empty() || module.is_loaded() {
            return found;
        }

        match self.catalog.promote(module) {
            Ok(loaded) => found
                .iter()
                .filter_map(|plugin| plugin.rebind(&loaded))
                .collect(),
            Err(error) => {
                warn!(module = %module.key(), %error, "failed to promote module with plugins");
                Vec::new()
            }
        }
    }
}

fn materialize(module: &Arc<ModuleDescriptor>, tokens: Option<&[Token]>) -> Vec<TypeDescriptor> {
    tokens
        .unwrap_or_default()
        .iter()
        .filter_map(|token| TypeDescriptor::new(module, *token))
        .collect()
}

/// Lazy result of [`PluginResolver::find_all`].
///
/// Loaded modules are searched first, in registration order as of the call. Directory scans
/// and promotions only happen once those are exhausted.
pub struct FindAll<'a> {
    resolver: &'a PluginResolver,
    capability: TypeDescriptor,
    options: FindOptions,
    loaded_end: usize,
    next_loaded: usize,
    unloaded: Option<std::vec::IntoIter<Arc<ModuleDescriptor>>>,
    pending: VecDeque<TypeDescriptor>,
    seen: HashSet<TypeDescriptor>,
}

impl FindAll<'_> {
    fn next_batch(&mut self) -> Option<Vec<TypeDescriptor>> {
        let catalog = &self.resolver.catalog;

        while self.next_loaded < self.loaded_end {
            let index = self.next_loaded;
            self.next_loaded += 1;
            let Some(module) = catalog.loaded_at(index) else {
                continue;
            };
            if self.resolver.should_search(&module, &self.capability, self.options) {
                return Some(self.resolver.find(&self.capability, &module));
            }
        }

        if !self.options.include_unloaded {
            return None;
        }

        let unloaded = self
            .unloaded
            .get_or_insert_with(|| catalog.scan_all().into_iter());
        for module in unloaded.by_ref() {
            if self.resolver.should_search(&module, &self.capability, self.options) {
                return Some(self.resolver.find_unloaded(&self.capability, &module));
            }
        }

        None
    }
}

impl Iterator for FindAll<'_> {
    type Item = TypeDescriptor;

    fn next(&mut self) -> Option<TypeDescriptor> {
        loop {
            while let Some(plugin) = self.pending.pop_front() {
                if self.seen.insert(plugin.clone()) {
                    return Some(plugin);
                }
            }

            let batch = self.next_batch()?;
            self.pending.extend(batch);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::{counting_catalog, write_module, ImageBuilder, TypeBuilder};
    use rayon::prelude::*;
    use std::sync::atomic::Ordering;

    fn contracts() -> ImageBuilder {
        let mut builder = ImageBuilder::new("Contracts");
        builder.add_type(TypeBuilder::interface("Contracts", "IPlugin"));
        builder
    }

    /// A module with one plugin `T` and the infrastructure types that must never match.
    fn module_m() -> ImageBuilder {
        let mut builder = ImageBuilder::new("M");
        let asm = builder.assembly_ref("Contracts", [1, 0, 0, 0]);
        let iplugin = builder.type_ref(asm, "Contracts", "IPlugin");
        builder.add_type(TypeBuilder::class("M", "T").implements(iplugin));
        builder.add_type(TypeBuilder::interface("M", "IDerived").implements(iplugin));
        builder.add_type(TypeBuilder::class("M", "Abstract").abstract_type().implements(iplugin));
        builder.add_type(TypeBuilder::class("M", "Open`1").generic(&["T"]).implements(iplugin));
        builder.add_type(TypeBuilder::class("M", "Plain"));
        builder
    }

    fn module_m2() -> ImageBuilder {
        let mut builder = ImageBuilder::new("M2");
        builder.assembly_ref("Other", [1, 0, 0, 0]);
        builder.add_type(TypeBuilder::class("M2", "Helper"));
        builder
    }

    fn names(plugins: &[TypeDescriptor]) -> Vec<String> {
        plugins.iter().map(|p| p.full_name().to_string()).collect()
    }

    #[test]
    fn find_in_single_module() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        let m = catalog.load_bytes(module_m().build()).unwrap();
        let m2 = catalog.load_bytes(module_m2().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();

        assert_eq!(names(&resolver.find(&capability, &m)), vec!["M.T"]);
        assert!(resolver.find(&capability, &m2).is_empty());
        assert!(m2.has_searched(&capability));
    }

    #[test]
    fn find_is_idempotent() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        let m = catalog.load_bytes(module_m().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();

        let first = resolver.find(&capability, &m);
        let second = resolver.find(&capability, &m);
        assert_eq!(first, second);
        assert_eq!(m.searched_capabilities(), 1);
    }

    #[test]
    fn find_all_prunes_by_dependency() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        catalog.load_bytes(module_m().build()).unwrap();
        let m2 = catalog.load_bytes(module_m2().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();

        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, FindOptions::default()).collect();
        assert_eq!(names(&found), vec!["M.T"]);
        assert!(!m2.has_searched(&capability));

        let unpruned = FindOptions {
            prune_by_dependency: false,
            ..FindOptions::default()
        };
        assert_eq!(resolver.find_all(&capability, unpruned).count(), 1);
        assert!(m2.has_searched(&capability));
    }

    #[test]
    fn find_all_in_registration_order() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();

        let mut zulu = ImageBuilder::new("Zulu");
        let asm = zulu.assembly_ref("Contracts", [1, 0, 0, 0]);
        let iplugin = zulu.type_ref(asm, "Contracts", "IPlugin");
        zulu.add_type(TypeBuilder::class("Zulu", "Plugin").implements(iplugin));
        catalog.load_bytes(zulu.build()).unwrap();
        catalog.load_bytes(module_m().build()).unwrap();

        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();
        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, FindOptions::default()).collect();
        assert_eq!(names(&found), vec!["Zulu.Plugin", "M.T"]);
    }

    #[test]
    fn capability_module_is_searched() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        let mut builder = contracts();
        builder.add_type(TypeBuilder::class("Contracts", "Default").implements(crate::test::TypeHandle::Def(2)));
        catalog.load_bytes(builder.build()).unwrap();

        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();
        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, FindOptions::default()).collect();
        assert_eq!(names(&found), vec!["Contracts.Default"]);
    }

    #[test]
    fn system_and_global_modules_are_skipped() {
        let global = tempfile::tempdir().unwrap();
        let mut config = crate::config::CatalogConfig::isolated(vec![]);
        config.global_cache_directories = vec![global.path().to_path_buf()];
        let catalog = Arc::new(ModuleCatalog::new(config).unwrap());
        catalog.load_bytes(contracts().build()).unwrap();

        let mut shared = module_m();
        shared.version(2, 0, 0, 0);
        let path = write_module(global.path(), "M", &shared);
        let shared = catalog.load(&path).unwrap();
        assert!(shared.is_global());

        let mut system = ImageBuilder::new("System.Plugins");
        system.public_key(&[0, 0, 0, 0, 0, 0, 0, 0, 4, 0, 0, 0, 0, 0, 0, 0]);
        let asm = system.assembly_ref("Contracts", [1, 0, 0, 0]);
        let iplugin = system.type_ref(asm, "Contracts", "IPlugin");
        system.add_type(TypeBuilder::class("System.Plugins", "Builtin").implements(iplugin));
        let system = catalog.load_bytes(system.build()).unwrap();
        assert!(system.is_system());

        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();

        assert_eq!(resolver.find_all(&capability, FindOptions::default()).count(), 0);
        let with_global = FindOptions {
            exclude_global: false,
            ..FindOptions::default()
        };
        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, with_global).collect();
        assert_eq!(names(&found), vec!["M.T"]);
        assert!(!system.has_searched(&capability));

        // Direct lookups still see system modules
        assert!(catalog.find_type("System.Plugins.Builtin", false).is_some());
    }

    #[test]
    fn unloaded_modules_promoted_only_on_hits() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "M", &module_m());
        write_module(dir.path(), "M2", &{
            let mut builder = module_m2();
            builder.assembly_ref("Contracts", [1, 0, 0, 0]);
            builder
        });
        write_module(
            dir.path(),
            "Foreign",
            module_m().foreign_architecture(),
        );

        let (catalog, loads) = counting_catalog(vec![dir.path().to_path_buf()]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();

        // Loaded modules only
        assert_eq!(resolver.find_all(&capability, FindOptions::default()).count(), 0);
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        let options = FindOptions {
            include_unloaded: true,
            ..FindOptions::default()
        };
        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, options).collect();
        assert_eq!(names(&found), vec!["M.T"]);
        assert!(found[0].module().is_loaded());

        // Only M was promoted; M2 had no hits and Foreign never passed the gate
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.loaded_count(), 2);
        let header_only: Vec<String> = catalog
            .header_only()
            .iter()
            .map(|m| m.name().to_string())
            .collect();
        assert_eq!(header_only, vec!["M2"]);

        // Now served from the loaded module without further loads
        let again: Vec<TypeDescriptor> = resolver.find_all(&capability, options).collect();
        assert_eq!(found, again);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn loaded_and_scanned_copies_yield_once() {
        let scanned = tempfile::tempdir().unwrap();
        write_module(scanned.path(), "Copy", &module_m());
        let installed = tempfile::tempdir().unwrap();
        let path = write_module(installed.path(), "M", &module_m());

        let (catalog, loads) = counting_catalog(vec![scanned.path().to_path_buf()]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();
        let options = FindOptions {
            include_unloaded: true,
            ..FindOptions::default()
        };

        // Scanned first, loaded from elsewhere afterwards
        assert_eq!(catalog.scan_all().len(), 1);
        catalog.load(&path).unwrap();
        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, options).collect();
        assert_eq!(names(&found), vec!["M.T"]);
        assert_eq!(loads.load(Ordering::SeqCst), 1);

        // Later walks read the copy again and skip it by identity
        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, options).collect();
        assert_eq!(names(&found), vec!["M.T"]);
        assert_eq!(loads.load(Ordering::SeqCst), 1);
        assert_eq!(catalog.loaded_count(), 2);
        assert!(catalog.header_only().is_empty());
    }

    #[test]
    fn find_all_sees_replaced_file() {
        let dir = tempfile::tempdir().unwrap();
        let ext = write_module(dir.path(), "Ext", &module_m2());
        let (catalog, _) = counting_catalog(vec![dir.path().to_path_buf()]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();
        let options = FindOptions {
            include_unloaded: true,
            ..FindOptions::default()
        };

        assert_eq!(resolver.find_all(&capability, options).count(), 0);

        let mut replacement = ImageBuilder::new("ExtV2");
        let asm = replacement.assembly_ref("Contracts", [1, 0, 0, 0]);
        let iplugin = replacement.type_ref(asm, "Contracts", "IPlugin");
        replacement.add_type(TypeBuilder::class("ExtV2", "Worker").implements(iplugin));
        for index in 0..64 {
            replacement.add_type(TypeBuilder::class("ExtV2.Generated", &format!("Helper{index}")));
        }
        std::fs::write(&ext, replacement.build()).unwrap();

        let found: Vec<TypeDescriptor> = resolver.find_all(&capability, options).collect();
        assert_eq!(names(&found), vec!["ExtV2.Worker"]);
    }

    #[test]
    fn find_all_never_repeats() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        catalog.load_bytes(module_m().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();

        let mut all = resolver.find_all(&capability, FindOptions::default());
        assert_eq!(all.next().unwrap().full_name(), "M.T");
        assert!(all.next().is_none());

        let mut seen = HashSet::new();
        for plugin in resolver.find_all(&capability, FindOptions::default()) {
            assert!(seen.insert(plugin));
        }
    }

    #[test]
    fn concurrent_queries_agree() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();
        let m = catalog.load_bytes(module_m().build()).unwrap();
        let resolver = PluginResolver::new(catalog.clone());
        let capability = catalog.find_type("Contracts.IPlugin", false).unwrap();

        let results: Vec<Vec<TypeDescriptor>> = (0..16)
            .into_par_iter()
            .map(|_| resolver.find_all(&capability, FindOptions::default()).collect())
            .collect();

        assert!(results.iter().all(|found| names(found) == vec!["M.T"]));
        assert_eq!(m.searched_capabilities(), 1);
    }
}
