//! Long-lived descriptors of catalogued modules and their types.
//!
//! A [`ModuleDescriptor`] wraps one module, either fully loaded (registered in the catalog and
//! kept mapped) or header-only (built from the file's bytes by a directory scan, nothing
//! retained). Derived fields such as the title or the compile timestamp, the flattened type
//! list and the per-capability plugin index are computed on first use and never invalidated.
//!
//! A [`TypeDescriptor`] pairs a type declaration with its owning module. Two type
//! descriptors are equal when they name the same token in the same module.

use std::{
    collections::{HashSet, VecDeque},
    fmt,
    hash::{Hash, Hasher},
    path::{Path, PathBuf},
    sync::{Arc, OnceLock},
};

use chrono::{NaiveDate, NaiveDateTime, TimeDelta};
use dashmap::DashMap;

use crate::{
    file::File,
    image::ModuleImage,
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion},
        module::ModuleMetadata,
        token::Token,
        typedef::TypeDef,
    },
};

/// Catalog key of a module: its lower-cased assembly display name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModuleKey(String);

impl ModuleKey {
    /// The key of `identity`.
    #[must_use]
    pub fn of(identity: &AssemblyIdentity) -> Self {
        ModuleKey(identity.display_name().to_ascii_lowercase())
    }

    /// The key as text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Whether a module is registered as loaded or only known from its headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LoadState {
    /// Registered in the catalog, bytes kept for the process lifetime
    Loaded,
    /// Built from header bytes by a scan, nothing retained
    HeaderOnly,
}

/// Identity of a capability inside a plugin index.
pub(crate) type CapabilityKey = (ModuleKey, Token);

/// One catalogued module.
pub struct ModuleDescriptor {
    key: ModuleKey,
    state: LoadState,
    path: Option<PathBuf>,
    image: Arc<ModuleImage>,
    metadata: ModuleMetadata,
    system: bool,
    global: bool,
    _file: Option<File>,
    title: OnceLock<String>,
    compiled: OnceLock<Option<NaiveDateTime>>,
    flattened: OnceLock<Arc<[Token]>>,
    plugins: DashMap<CapabilityKey, Option<Arc<[Token]>>>,
}

impl ModuleDescriptor {
    pub(crate) fn new(
        state: LoadState,
        path: Option<PathBuf>,
        image: Arc<ModuleImage>,
        metadata: ModuleMetadata,
        file: Option<File>,
        system: bool,
        global: bool,
    ) -> Self {
        ModuleDescriptor {
            key: ModuleKey::of(&metadata.identity),
            state,
            path,
            image,
            metadata,
            system,
            global,
            _file: file,
            title: OnceLock::new(),
            compiled: OnceLock::new(),
            flattened: OnceLock::new(),
            plugins: DashMap::new(),
        }
    }

    /// Catalog key.
    #[must_use]
    pub fn key(&self) -> &ModuleKey {
        &self.key
    }

    /// Assembly identity.
    #[must_use]
    pub fn identity(&self) -> &AssemblyIdentity {
        &self.metadata.identity
    }

    /// Simple assembly name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.metadata.identity.name
    }

    /// Assembly version.
    #[must_use]
    pub fn version(&self) -> AssemblyVersion {
        self.metadata.identity.version
    }

    /// Loaded or header-only.
    #[must_use]
    pub fn state(&self) -> LoadState {
        self.state
    }

    /// `true` for fully loaded modules.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.state == LoadState::Loaded
    }

    /// The file the module was read from, `None` for in-memory modules.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Parsed headers.
    #[must_use]
    pub fn image(&self) -> &ModuleImage {
        &self.image
    }

    /// Parsed metadata.
    #[must_use]
    pub fn metadata(&self) -> &ModuleMetadata {
        &self.metadata
    }

    /// `true` if the module is signed with a platform key.
    #[must_use]
    pub fn is_system(&self) -> bool {
        self.system
    }

    /// `true` if the module lives in a global shared cache directory.
    #[must_use]
    pub fn is_global(&self) -> bool {
        self.global
    }

    /// `AssemblyTitleAttribute`, falling back to the simple name.
    #[must_use]
    pub fn title(&self) -> &str {
        self.title.get_or_init(|| {
            self.metadata
                .attributes
                .title
                .clone()
                .filter(|title| !title.trim().is_empty())
                .unwrap_or_else(|| self.metadata.identity.name.clone())
        })
    }

    /// `AssemblyCompanyAttribute`.
    #[must_use]
    pub fn company(&self) -> Option<&str> {
        self.metadata.attributes.company.as_deref()
    }

    /// `AssemblyDescriptionAttribute`.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.metadata.attributes.description.as_deref()
    }

    /// Build time recovered from an auto-incremented version: the build number counts days
    /// since 2000-01-01 and the revision counts two-second intervals since midnight.
    ///
    /// `None` when build and revision are both zero.
    #[must_use]
    pub fn compiled(&self) -> Option<NaiveDateTime> {
        *self
            .compiled
            .get_or_init(|| compiled_from_version(self.version()))
    }

    /// `true` if the module references the assembly named `name`, or is that assembly.
    #[must_use]
    pub fn references(&self, name: &str) -> bool {
        self.metadata.identity.same_name(name) || self.metadata.references_assembly(name)
    }

    /// Tokens of every materialised type, nested types included, in breadth-first order
    /// starting from the top-level types.
    pub(crate) fn flattened_tokens(&self) -> Arc<[Token]> {
        self.flattened
            .get_or_init(|| {
                let mut queue: VecDeque<&Arc<TypeDef>> = self.metadata.top_level_types().collect();
                let mut seen = HashSet::new();
                let mut tokens = Vec::with_capacity(queue.len());

                while let Some(type_def) = queue.pop_front() {
                    if !seen.insert(type_def.token) {
                        continue;
                    }
                    tokens.push(type_def.token);
                    queue.extend(
                        type_def
                            .nested
                            .iter()
                            .filter_map(|token| self.metadata.type_def(*token)),
                    );
                }

                tokens.into()
            })
            .clone()
    }

    pub(crate) fn cached_plugins(&self, capability: &CapabilityKey) -> Option<Option<Arc<[Token]>>> {
        self.plugins.get(capability).map(|entry| entry.value().clone())
    }

    /// Store a search result; a concurrent first writer wins and its value is returned.
    pub(crate) fn cache_plugins(
        &self,
        capability: CapabilityKey,
        found: Option<Arc<[Token]>>,
    ) -> Option<Arc<[Token]>> {
        self.plugins
            .entry(capability)
            .or_insert(found)
            .value()
            .clone()
    }

    /// Number of capabilities this module has been searched for.
    #[must_use]
    pub fn searched_capabilities(&self) -> usize {
        self.plugins.len()
    }

    /// `true` if this module has been searched for `capability`.
    #[must_use]
    pub fn has_searched(&self, capability: &TypeDescriptor) -> bool {
        self.plugins.contains_key(&capability.capability_key())
    }
}

/// Every type of `module`, nested types included, computed once and cached.
pub fn types(module: &Arc<ModuleDescriptor>) -> impl Iterator<Item = TypeDescriptor> + '_ {
    let tokens = module.flattened_tokens();
    (0..tokens.len()).filter_map(move |index| TypeDescriptor::new(module, tokens[index]))
}

fn compiled_from_version(version: AssemblyVersion) -> Option<NaiveDateTime> {
    if version.build == 0 && version.revision == 0 {
        return None;
    }

    let epoch = NaiveDate::from_ymd_opt(2000, 1, 1)?.and_hms_opt(0, 0, 0)?;
    epoch
        .checked_add_signed(TimeDelta::try_days(i64::from(version.build))?)?
        .checked_add_signed(TimeDelta::try_seconds(i64::from(version.revision) * 2)?)
}

impl fmt::Debug for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleDescriptor")
            .field("identity", &self.metadata.identity.display_name())
            .field("state", &self.state)
            .field("path", &self.path)
            .field("system", &self.system)
            .field("global", &self.global)
            .finish_non_exhaustive()
    }
}

impl fmt::Display for ModuleDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.metadata.identity.display_name())
    }
}

/// A type together with the module declaring it.
#[derive(Clone)]
pub struct TypeDescriptor {
    module: Arc<ModuleDescriptor>,
    type_def: Arc<TypeDef>,
}

impl TypeDescriptor {
    /// The type with `token` in `module`, `None` if it did not materialise.
    #[must_use]
    pub fn new(module: &Arc<ModuleDescriptor>, token: Token) -> Option<Self> {
        let type_def = module.metadata.type_def(token)?.clone();
        Some(TypeDescriptor {
            module: module.clone(),
            type_def,
        })
    }

    /// The declaring module.
    #[must_use]
    pub fn module(&self) -> &Arc<ModuleDescriptor> {
        &self.module
    }

    /// The declaration.
    #[must_use]
    pub fn type_def(&self) -> &Arc<TypeDef> {
        &self.type_def
    }

    /// `TypeDef` token inside the declaring module.
    #[must_use]
    pub fn token(&self) -> Token {
        self.type_def.token
    }

    /// Full name in `Namespace.Outer+Inner` form.
    #[must_use]
    pub fn full_name(&self) -> &str {
        &self.type_def.full_name
    }

    /// Simple name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.type_def.name
    }

    /// `true` if instances of the type can exist.
    #[must_use]
    pub fn is_concrete(&self) -> bool {
        self.type_def.is_concrete()
    }

    pub(crate) fn capability_key(&self) -> CapabilityKey {
        (self.module.key.clone(), self.type_def.token)
    }

    /// The same type, declared by `module` (used when a header-only module was promoted).
    pub(crate) fn rebind(&self, module: &Arc<ModuleDescriptor>) -> Option<TypeDescriptor> {
        TypeDescriptor::new(module, self.type_def.token)
    }
}

impl PartialEq for TypeDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.type_def.token == other.type_def.token && self.module.key == other.module.key
    }
}

impl Eq for TypeDescriptor {}

impl Hash for TypeDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.module.key.hash(state);
        self.type_def.token.hash(state);
    }
}

impl fmt::Debug for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeDescriptor({}, {})", self.type_def.full_name, self.module.name())
    }
}

impl fmt::Display for TypeDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.type_def.full_name, self.module.name())
    }
}
