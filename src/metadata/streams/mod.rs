//! Metadata heaps and the stream directory entries that locate them.
//!
//! # Key Components
//!
//! - [`StreamHeader`] - One entry of the metadata root's stream directory
//! - [`Strings`] - The `#Strings` heap (NUL-terminated UTF-8 identifiers)
//! - [`Blob`] - The `#Blob` heap (length-prefixed binary data such as signatures)
//!
//! The `#GUID` and `#US` heaps are never dereferenced; only their index widths matter, and
//! those come from the tables header.

mod blob;
mod streamheader;
mod strings;

pub use blob::Blob;
pub use streamheader::StreamHeader;
pub use strings::Strings;
