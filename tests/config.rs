//! Loading catalog configuration from TOML.

use std::{fs, path::PathBuf};

use modscope::{catalog::ModuleCatalog, config::CatalogConfig, image::RuntimeVersion, Error};

#[test]
fn from_file() {
    let directory = tempfile::tempdir().unwrap();
    let plugins = directory.path().join("plugins");
    fs::create_dir(&plugins).unwrap();

    let path = directory.path().join("modscope.toml");
    fs::write(
        &path,
        format!(
            r#"
            runtime_version = "4.0"
            include_execution_directory = false
            directories = ["{}"]
            extensions = ["dll"]
            "#,
            plugins.display()
        ),
    )
    .unwrap();

    let config = CatalogConfig::from_file(&path).unwrap();
    assert_eq!(config.reference_version().unwrap(), RuntimeVersion::new(4, 0));
    assert_eq!(config.initial_directories(), vec![plugins.clone()]);
    assert!(config.is_candidate_file(&plugins.join("Extra.DLL")));
    assert!(!config.is_candidate_file(&plugins.join("Extra.exe")));
    assert!(!config.is_candidate_file(&plugins.join("testhost.dll")));

    let catalog = ModuleCatalog::new(config).unwrap();
    assert_eq!(catalog.directories(), vec![plugins]);
}

#[test]
fn invalid_files() {
    assert!(matches!(
        CatalogConfig::from_file(&PathBuf::from("/nonexistent/modscope.toml")),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        CatalogConfig::from_toml_str("runtime_version = \"latest\""),
        Err(Error::Config(_))
    ));
    assert!(matches!(
        CatalogConfig::from_toml_str("directories = 3"),
        Err(Error::Config(_))
    ));
}

#[test]
fn round_trip() {
    let config = CatalogConfig {
        directories: vec![PathBuf::from("/opt/plugins")],
        cache_images: false,
        ..CatalogConfig::default()
    };
    let text = config.to_toml_string().unwrap();
    assert_eq!(CatalogConfig::from_toml_str(&text).unwrap(), config);

    let isolated = CatalogConfig::isolated(vec![PathBuf::from("/opt/plugins")]);
    let text = isolated.to_toml_string().unwrap();
    let parsed = CatalogConfig::from_toml_str(&text).unwrap();
    assert_eq!(parsed.binaries_subdirectory, None);
    assert_eq!(parsed, isolated);
}
