//! ECMA-335 metadata reader.
//!
//! Given the bytes of a managed image, this module reads the metadata root, the `#Strings` and
//! `#Blob` heaps and the `#~` tables, and materialises the small type model the catalog works
//! with. It reads exactly what plugin discovery needs: identities, assembly references, type
//! declarations with their inheritance edges, and assembly-level string attributes.
//!
//! # Key Components
//!
//! - [`module::ModuleMetadata`] - The materialised metadata of one module
//! - [`typedef`] - Type declarations and references between types
//! - [`identity`] - Assembly names, versions and public key tokens
//! - [`tables`] - Table layouts, coded indexes and row decoding
//! - [`streams`] - Heaps and stream headers
//! - [`token`] - Metadata tokens
//!
//! # Examples
//!
//! ```rust,no_run
//! use modscope::{image::ModuleImage, metadata::module::ModuleMetadata};
//!
//! let data = std::fs::read("Plugins.dll")?;
//! let image = ModuleImage::parse(&data)?;
//! let metadata = ModuleMetadata::read(&data, &image)?;
//!
//! println!("{}", metadata.identity.display_name());
//! for type_def in metadata.types() {
//!     println!("  {}", type_def.full_name);
//! }
//! # Ok::<(), modscope::Error>(())
//! ```

pub mod identity;
pub mod module;
pub mod root;
pub mod signatures;
pub mod streams;
pub mod tables;
pub mod token;
pub mod typedef;
