//! Shared test support: a byte-exact builder for small managed images and helpers that place
//! them on disk.


use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
};

pub(crate) use builder::{ImageBuilder, TypeBuilder, TypeHandle};

use crate::{
    catalog::{LoadedModule, MappedLoader, ModuleCatalog, ModuleLoader},
    config::CatalogConfig,
    Result,
};

/// Writes `builder`'s image as `dir/<name>.dll` and returns the path.
pub(crate) fn write_module(dir: &Path, name: &str, builder: &ImageBuilder) -> PathBuf {
    let path = dir.join(format!("{}.dll", name));
    std::fs::write(&path, builder.build()).unwrap();
    path
}

/// A [`MappedLoader`] that counts full loads.
pub(crate) struct CountingLoader {
    loads: Arc<AtomicUsize>,
}

impl ModuleLoader for CountingLoader {
    fn load(&self, path: &Path) -> Result<LoadedModule> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        MappedLoader.load(path)
    }
}

/// A catalog over exactly `directories` whose loads are counted.
pub(crate) fn counting_catalog(directories: Vec<PathBuf>) -> (ModuleCatalog, Arc<AtomicUsize>) {
    let loads = Arc::new(AtomicUsize::new(0));
    let loader = CountingLoader {
        loads: loads.clone(),
    };
    let catalog =
        ModuleCatalog::with_loader(CatalogConfig::isolated(directories), Box::new(loader)).unwrap();
    (catalog, loads)
}
