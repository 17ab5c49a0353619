//! # modscope Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the modscope library. Import this module to get quick access to the essential
//! types for module inspection and plugin discovery.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all modscope operations
pub use crate::Error;

/// The result type used throughout modscope
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Binary Module Reader and Compatibility
// ================================================================================================

/// Parsed header facts of a module image
pub use crate::image::{
    Bitness, Characteristics, ExecutableKind, Machine, ModuleImage, ModuleKind, RuntimeVersion,
};

/// Loadability decisions
pub use crate::gate::CompatibilityGate;

// ================================================================================================
// Metadata
// ================================================================================================

/// Identities and type declarations
pub use crate::metadata::{
    identity::{AssemblyIdentity, AssemblyVersion},
    module::ModuleMetadata,
    token::Token,
    typedef::{TypeDef, TypeReference},
};

// ================================================================================================
// Catalog and Discovery
// ================================================================================================

/// Module registry and descriptors
pub use crate::catalog::{
    LoadState, LoadedModule, ModuleCatalog, ModuleDescriptor, ModuleLoader, TypeDescriptor,
};

/// Plugin discovery
pub use crate::resolver::{FindOptions, PluginResolver};

/// Configuration
pub use crate::config::CatalogConfig;

// ================================================================================================
// Type Facade
// ================================================================================================

/// Capability-set API and its value model
pub use crate::facade::{
    Arguments, CatalogProvider, ClassType, EnumType, Primitive, RegistryProvider, RuntimeType,
    TypeFacade, TypeProvider, Value,
};
