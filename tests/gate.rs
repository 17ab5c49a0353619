//! Compatibility gate and directory scanning against files that are not loadable modules.

use std::{fs, path::Path, sync::Arc};

use modscope::{
    catalog::ModuleCatalog,
    config::CatalogConfig,
    gate::CompatibilityGate,
    image::{ModuleImage, RuntimeVersion},
    resolver::PluginResolver,
    Error,
};

fn gate() -> CompatibilityGate {
    CompatibilityGate::new(RuntimeVersion::new(4, 0)).caching(true)
}

#[test]
fn missing_files_are_rejected() {
    let gate = gate();
    let path = Path::new("/nonexistent/directory/Plugin.dll");

    assert!(!gate.can_load(path));
    assert!(matches!(gate.check(path), Err(Error::Incompatible { .. })));
    assert!(matches!(gate.inspect(path), Err(Error::FileError(_))));
}

#[test]
fn junk_and_truncated_files_are_rejected() {
    let directory = tempfile::tempdir().unwrap();
    let junk = directory.path().join("Junk.dll");
    let truncated = directory.path().join("Truncated.dll");
    let empty = directory.path().join("Empty.dll");
    fs::write(&junk, vec![0xAB; 4096]).unwrap();
    fs::write(&truncated, b"MZ\x90\x00\x03").unwrap();
    fs::write(&empty, b"").unwrap();

    let gate = gate();
    for path in [&junk, &truncated, &empty] {
        assert!(!gate.can_load(path), "{} was accepted", path.display());
        let Err(Error::Incompatible { path: rejected, .. }) = gate.check(path) else {
            panic!("{} was not rejected as incompatible", path.display());
        };
        assert_eq!(&rejected, path);
    }

    assert!(matches!(
        ModuleImage::parse(&[0u8; 64]),
        Err(Error::NotAnImage(_))
    ));
}

#[test]
fn scanning_skips_non_modules() {
    let directory = tempfile::tempdir().unwrap();
    fs::write(directory.path().join("Junk.dll"), vec![0u8; 1024]).unwrap();
    fs::write(directory.path().join("notes.txt"), b"not a module").unwrap();
    fs::write(directory.path().join("testhost.dll"), vec![0u8; 1024]).unwrap();

    let catalog = Arc::new(
        ModuleCatalog::new(CatalogConfig::isolated(vec![directory.path().to_path_buf()])).unwrap(),
    );
    assert!(catalog.scan_directory(directory.path()).is_empty());
    assert!(catalog.scan_all().is_empty());
    assert!(catalog.header_only().is_empty());
    assert_eq!(catalog.loaded_count(), 0);

    assert!(matches!(
        catalog.load(&directory.path().join("Junk.dll")),
        Err(Error::Incompatible { .. })
    ));
    assert_eq!(catalog.loaded_count(), 0);

    let resolver = PluginResolver::new(catalog.clone());
    assert_eq!(resolver.catalog().loaded_count(), 0);
    assert!(catalog.find_type("Plugins.IPlugin", true).is_none());
}

#[test]
fn runtime_versions_compare_by_major_and_minor() {
    let reference = RuntimeVersion::new(4, 0);

    assert!(RuntimeVersion::parse("v2.0.50727").unwrap().is_loadable_by(&reference));
    assert!(RuntimeVersion::parse("v4.0.30319").unwrap().is_loadable_by(&reference));
    assert!(!RuntimeVersion::parse("v4.5").unwrap().is_loadable_by(&reference));
    assert!(!RuntimeVersion::parse("v8.0").unwrap().is_loadable_by(&reference));
    assert!(RuntimeVersion::parse("garbage").is_err());
}
