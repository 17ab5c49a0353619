//! Type providers: where [`crate::facade::TypeFacade`] gets its types from.
//!
//! [`CatalogProvider`] answers from a [`ModuleCatalog`], searching the process's own module
//! first, then every loaded module, then (when allowed) the scan directories. Runtime
//! behaviour is attached to catalogued types by binding a [`ClassType`] or an [`EnumType`]
//! to their full name. [`RegistryProvider`] is a plain name registry for callers without
//! modules on disk.

use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, warn};

use crate::{
    catalog::{ModuleCatalog, ModuleDescriptor, TypeDescriptor},
    facade::object::{ClassType, EnumType, RuntimeType},
    resolver::{FindOptions, PluginResolver},
    Error, Result,
};

/// A source of types for the facade.
pub trait TypeProvider: Send + Sync {
    /// Resolve a type by full name. Primitive aliases are handled by the facade before a
    /// provider is asked.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if the name is unknown.
    fn resolve(&self, name: &str, allow_unloaded: bool) -> Result<RuntimeType>;

    /// Concrete types implementing the capability named `capability`, in discovery order.
    ///
    /// # Errors
    /// Returns [`crate::Error::TypeNotFound`] if the capability itself is unknown.
    fn implementations(&self, capability: &str, options: FindOptions) -> Result<Vec<RuntimeType>>;
}

/// Types registered by name, in registration order.
#[derive(Default)]
pub struct RegistryProvider {
    types: DashMap<String, RuntimeType>,
    order: boxcar::Vec<String>,
}

impl RegistryProvider {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        RegistryProvider::default()
    }

    /// Register a class under its name. The first registration of a name wins.
    pub fn register_class(&self, class: Arc<ClassType>) -> &Self {
        self.register(class.name().to_string(), RuntimeType::Class(class))
    }

    /// Register an enumeration under its name. The first registration of a name wins.
    pub fn register_enum(&self, enum_type: Arc<EnumType>) -> &Self {
        self.register(enum_type.name().to_string(), RuntimeType::Enum(enum_type))
    }

    fn register(&self, name: String, ty: RuntimeType) -> &Self {
        let mut created = false;
        self.types.entry(name.clone()).or_insert_with(|| {
            created = true;
            ty
        });
        if created {
            self.order.push(name);
        }
        self
    }
}

impl TypeProvider for RegistryProvider {
    fn resolve(&self, name: &str, _allow_unloaded: bool) -> Result<RuntimeType> {
        if let Some(ty) = self.types.get(name) {
            return Ok(ty.value().clone());
        }

        self.order
            .iter()
            .find(|(_, registered)| registered.eq_ignore_ascii_case(name))
            .and_then(|(_, registered)| self.types.get(registered).map(|ty| ty.value().clone()))
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))
    }

    fn implementations(&self, capability: &str, _options: FindOptions) -> Result<Vec<RuntimeType>> {
        Ok(self
            .order
            .iter()
            .filter_map(|(_, name)| self.types.get(name).map(|ty| ty.value().clone()))
            .filter(|ty| match ty {
                RuntimeType::Class(class) => class.name() != capability && class.is_a(capability),
                _ => false,
            })
            .collect())
    }
}

/// Types of the modules in a [`ModuleCatalog`].
pub struct CatalogProvider {
    catalog: Arc<ModuleCatalog>,
    resolver: PluginResolver,
    bindings: DashMap<String, RuntimeType>,
}

impl CatalogProvider {
    /// A provider over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<ModuleCatalog>) -> Self {
        CatalogProvider {
            resolver: PluginResolver::new(catalog.clone()),
            catalog,
            bindings: DashMap::new(),
        }
    }

    /// The catalog being searched.
    #[must_use]
    pub fn catalog(&self) -> &Arc<ModuleCatalog> {
        &self.catalog
    }

    /// Attach runtime behaviour to the catalogued type `full_name`. Bound names that no
    /// module declares still resolve to the binding.
    pub fn bind_class(&self, full_name: impl Into<String>, class: Arc<ClassType>) {
        self.bindings.insert(full_name.into(), RuntimeType::Class(class));
    }

    /// Attach members to the catalogued enumeration `full_name`.
    pub fn bind_enum(&self, full_name: impl Into<String>, enum_type: Arc<EnumType>) {
        self.bindings.insert(full_name.into(), RuntimeType::Enum(enum_type));
    }

    /// Find the declaration of `name`: the process's own module first, then loaded modules in
    /// registration order, then header-only modules, which are promoted when they declare it.
    #[must_use]
    pub fn locate(&self, name: &str, allow_unloaded: bool) -> Option<TypeDescriptor> {
        if let Some(found) = self.catalog.entry_module().and_then(|entry| declared_in(&entry, name)) {
            return Some(found);
        }
        if let Some(found) = self.catalog.find_type(name, true) {
            return Some(found);
        }
        if !allow_unloaded {
            return None;
        }

        for module in self.catalog.scan_all() {
            let Some(declared) = declared_in(&module, name) else {
                continue;
            };
            match self.catalog.promote(&module) {
                Ok(loaded) => return declared.rebind(&loaded),
                Err(error) => {
                    warn!(module = %module.key(), %error, "failed to promote module declaring {}", name);
                }
            }
        }
        None
    }

    fn runtime_type(&self, descriptor: TypeDescriptor) -> RuntimeType {
        match self.bindings.get(descriptor.full_name()).map(|ty| ty.value().clone()) {
            Some(RuntimeType::Class(class)) => RuntimeType::Class(class.bound_to(descriptor)),
            Some(bound) => bound,
            None => RuntimeType::Declared(descriptor),
        }
    }

    fn binding(&self, name: &str) -> Option<RuntimeType> {
        if let Some(ty) = self.bindings.get(name) {
            return Some(ty.value().clone());
        }
        self.bindings
            .iter()
            .find(|entry| entry.key().eq_ignore_ascii_case(name))
            .map(|entry| entry.value().clone())
    }
}

fn declared_in(module: &Arc<ModuleDescriptor>, name: &str) -> Option<TypeDescriptor> {
    let metadata = module.metadata();
    let type_def = metadata
        .find_type(name, false)
        .or_else(|| metadata.find_type(name, true))?;
    TypeDescriptor::new(module, type_def.token)
}

impl TypeProvider for CatalogProvider {
    fn resolve(&self, name: &str, allow_unloaded: bool) -> Result<RuntimeType> {
        if let Some(descriptor) = self.locate(name, allow_unloaded) {
            debug!(name, declared = %descriptor, "resolved type");
            return Ok(self.runtime_type(descriptor));
        }

        self.binding(name)
            .ok_or_else(|| Error::TypeNotFound(name.to_string()))
    }

    fn implementations(&self, capability: &str, options: FindOptions) -> Result<Vec<RuntimeType>> {
        let capability = self
            .locate(capability, options.include_unloaded)
            .ok_or_else(|| Error::TypeNotFound(capability.to_string()))?;

        Ok(self
            .resolver
            .find_all(&capability, options)
            .map(|plugin| self.runtime_type(plugin))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        facade::primitives::Primitive,
        test::{counting_catalog, write_module, ImageBuilder, TypeBuilder},
    };
    use std::sync::atomic::Ordering;

    #[test]
    fn registry_resolution() {
        let registry = RegistryProvider::new();
        let widget = ClassType::builder("Demo.Widget").implements("Demo.IWidget").build();
        registry
            .register_class(widget.clone())
            .register_class(ClassType::builder("Demo.Other").build())
            .register_enum(EnumType::new("Demo.Color", &[("Red", 0)]));

        assert_eq!(registry.resolve("Demo.Widget", false).unwrap(), RuntimeType::Class(widget));
        assert_eq!(registry.resolve("demo.color", false).unwrap().name(), "Demo.Color");
        assert!(matches!(
            registry.resolve("Demo.Missing", false),
            Err(Error::TypeNotFound(_))
        ));

        let found = registry
            .implementations("Demo.IWidget", FindOptions::default())
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].name(), "Demo.Widget");
    }

    #[test]
    fn registry_first_registration_wins() {
        let registry = RegistryProvider::new();
        registry.register_class(ClassType::builder("Demo.Widget").build());
        registry.register_class(
            ClassType::builder("Demo.Widget")
                .field("Extra", RuntimeType::Primitive(Primitive::I32))
                .build(),
        );

        let RuntimeType::Class(class) = registry.resolve("Demo.Widget", false).unwrap() else {
            panic!("expected a class");
        };
        assert!(class.fields().is_empty());
    }

    fn contracts() -> ImageBuilder {
        let mut builder = ImageBuilder::new("Contracts");
        builder.add_type(TypeBuilder::interface("Contracts", "IPlugin"));
        builder.add_type(TypeBuilder::class("Contracts", "Shared"));
        builder
    }

    #[test]
    fn entry_module_first() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();

        let mut app = ImageBuilder::new("App");
        app.add_type(TypeBuilder::class("Contracts", "Shared"));
        let app = catalog.load_bytes(app.build()).unwrap();

        let provider = CatalogProvider::new(catalog.clone());
        assert_eq!(provider.locate("Contracts.Shared", false).unwrap().module().name(), "Contracts");

        catalog.set_entry_module(app);
        assert_eq!(provider.locate("Contracts.Shared", false).unwrap().module().name(), "App");
        assert_eq!(provider.locate("contracts.shared", false).unwrap().module().name(), "App");
    }

    #[test]
    fn unloaded_only_when_allowed() {
        let dir = tempfile::tempdir().unwrap();
        write_module(dir.path(), "Contracts", &contracts());
        let (catalog, loads) = counting_catalog(vec![dir.path().to_path_buf()]);
        let provider = CatalogProvider::new(Arc::new(catalog));

        assert!(matches!(
            provider.resolve("Contracts.IPlugin", false),
            Err(Error::TypeNotFound(_))
        ));
        assert_eq!(loads.load(Ordering::SeqCst), 0);

        let resolved = provider.resolve("Contracts.IPlugin", true).unwrap();
        let descriptor = resolved.descriptor().unwrap();
        assert!(descriptor.module().is_loaded());
        assert_eq!(loads.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn bindings_attach_behaviour() {
        let (catalog, _) = counting_catalog(vec![]);
        let catalog = Arc::new(catalog);
        catalog.load_bytes(contracts().build()).unwrap();

        let mut plugins = ImageBuilder::new("Plugins");
        let asm = plugins.assembly_ref("Contracts", [1, 0, 0, 0]);
        let iplugin = plugins.type_ref(asm, "Contracts", "IPlugin");
        plugins.add_type(TypeBuilder::class("Plugins", "Bound").implements(iplugin));
        plugins.add_type(TypeBuilder::class("Plugins", "Unbound").implements(iplugin));
        catalog.load_bytes(plugins.build()).unwrap();

        let provider = CatalogProvider::new(catalog);
        provider.bind_class("Plugins.Bound", ClassType::builder("Plugins.Bound").build());
        provider.bind_class("Virtual.Only", ClassType::builder("Virtual.Only").build());

        let found = provider
            .implementations("Contracts.IPlugin", FindOptions::default())
            .unwrap();
        assert_eq!(found.len(), 2);
        assert!(matches!(&found[0], RuntimeType::Class(class) if class.descriptor().is_some()));
        assert!(matches!(&found[1], RuntimeType::Declared(d) if d.full_name() == "Plugins.Unbound"));

        assert_eq!(provider.resolve("virtual.only", false).unwrap().name(), "Virtual.Only");
        assert!(matches!(
            provider.implementations("Contracts.Missing", FindOptions::default()),
            Err(Error::TypeNotFound(_))
        ));
    }
}
