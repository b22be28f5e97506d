//! Normative reference data: versions, price tables, coefficient sets and
//! rule sets.
//!
//! - [`NormRegistry`]: version resolution plus a shared, append-only cache
//!   of decoded and integrity-checked documents.
//! - [`NormSource`]: raw document access, implemented by
//!   [`BuiltinSource`] (compiled-in catalog) and [`DirectorySource`].

pub mod builtin;
pub mod config;
pub mod directory;
pub mod error;
pub mod registry;
pub mod source;

pub use builtin::BuiltinSource;
pub use config::{RegistryConfig, DEFAULT_VERSION};
pub use directory::DirectorySource;
pub use error::SourceError;
pub use registry::{CatalogFailure, CatalogReport, NormRegistry};
pub use source::NormSource;
