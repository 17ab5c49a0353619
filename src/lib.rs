// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory

//! # modscope
//!
//! Header-level introspection of .NET PE/CLI modules and a concurrent plugin-discovery type
//! catalog. Built in pure Rust, `modscope` reads the PE headers and the ECMA-335 metadata of
//! managed modules without loading or executing them, decides whether a module is safe to load
//! into the current process, and finds the concrete types that implement a given interface or
//! base type across every loaded and on-disk module.
//!
//! ## Features
//!
//! - **Byte-exact header reader** - Machine, executable kind, subsystem and runtime version of any PE/CLI image
//! - **Compatibility gate** - Rejects unmanaged, newer-runtime and foreign-architecture modules before any load
//! - **Module catalog** - One descriptor per module identity, header-only scans of plugin directories
//! - **Plugin discovery** - Cached per module and capability, pruned by assembly references
//! - **Type facade** - Members, invocation and value coercion behind a swappable provider
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use modscope::prelude::*;
//! use std::{path::Path, sync::Arc};
//!
//! let catalog = Arc::new(ModuleCatalog::new(CatalogConfig::load()?)?);
//! catalog.load(Path::new("Contracts.dll"))?;
//!
//! let facade = TypeFacade::from_catalog(catalog);
//! let options = FindOptions {
//!     include_unloaded: true,
//!     ..FindOptions::default()
//! };
//! for plugin in facade.implementations("Contracts.IPlugin", options)? {
//!     println!("{}", plugin);
//! }
//! # Ok::<(), modscope::Error>(())
//! ```
//!
//! ## Architecture
//!
//! Leaf to root:
//!
//! - [`image`] - Parses a byte stream into a [`image::ModuleImage`]
//! - [`gate`] - [`gate::CompatibilityGate`] decides loadability from the image alone
//! - [`metadata`] - Reads the metadata tables into identities, references and type declarations
//! - [`catalog`] - [`catalog::ModuleCatalog`] registers loaded modules and scans directories
//! - [`resolver`] - [`resolver::PluginResolver`] finds implementations of a capability
//! - [`facade`] - [`facade::TypeFacade`], the capability-set API consumed by callers
//! - [`config`] - [`config::CatalogConfig`], read from TOML
//!
//! ## Logging
//!
//! The crate logs through [`tracing`] and never installs a subscriber. Rejected and skipped
//! modules are reported at `debug`, cache activity at `trace`.
//!
//! ## Error Handling
//!
//! All operations return [`Result<T, Error>`](Result). Discovery degrades silently: modules
//! that can not be read or loaded are skipped. Named lookups fail loudly:
//!
//! ```rust,no_run
//! use modscope::{facade::TypeFacade, Error};
//! # fn facade() -> TypeFacade { unimplemented!() }
//!
//! match facade().resolve_type("Contracts.IPlugin", false) {
//!     Ok(ty) => println!("found {}", ty),
//!     Err(Error::TypeNotFound(name)) => println!("no type {}", name),
//!     Err(e) => println!("other error: {}", e),
//! }
//! ```
//!
//! ## Development and Testing
//!
//! ### Fuzzing
//!
//! ```bash
//! cargo +nightly fuzz run image --release
//! ```
//!
//! ### Testing
//!
//! Test images are synthesised in memory, no binary fixtures are needed:
//!
//! ```bash
//! cargo test
//! ```
#[macro_use]
pub(crate) mod macros;

#[macro_use]
pub(crate) mod error;

/// Shared functionality which is used in unit-tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types and traits.
///
/// # Example
///
/// ```rust,no_run
/// use modscope::prelude::*;
///
/// let data = std::fs::read("Plugin.dll")?;
/// let image = ModuleImage::parse(&data)?;
/// println!("managed: {}", image.is_managed());
/// # Ok::<(), modscope::Error>(())
/// ```
pub mod prelude;

/// Byte sources: memory-mapped files, in-memory buffers and the bounds-checked [`Parser`].
pub mod file;

/// Binary module reader for PE/CLI headers.
pub mod image;

/// ECMA-335 metadata reader.
pub mod metadata;

/// Loadability decisions made from module headers.
pub mod gate;

/// Process-wide registry of loaded and scanned modules.
pub mod catalog;

/// Plugin discovery over the catalog.
pub mod resolver;

/// Capability-set API over types, objects and values.
pub mod facade;

/// Catalog configuration.
pub mod config;

/// `modscope` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
///
/// # Examples
///
/// ```rust,no_run
/// use modscope::{image::ModuleImage, Result};
///
/// fn is_managed(path: &str) -> Result<bool> {
///     Ok(ModuleImage::from_path(std::path::Path::new(path))?.is_managed())
/// }
/// ```
pub type Result<T> = std::result::Result<T, Error>;

/// `modscope` Error type
///
/// The main error type for all operations in this crate.
pub use error::Error;

/// Low-level file parsing utilities
pub use file::{parser::Parser, File};
