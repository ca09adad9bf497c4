//! Persistent stores backing incremental compilation.
//!
//! Four stores live in the site's temporary directory: object checksums, the
//! dependency graph, rule memories and the compiled-content cache. They share
//! one validated file format ([`store`]) and are loaded fail-safe: a missing,
//! damaged or out-of-date store reads as empty, which only costs a full
//! recompile.

#![warn(missing_docs)]

pub mod checksums;
pub mod compiled_content;
pub mod dependencies;
pub mod error;
pub mod rule_memory;
pub mod store;
pub mod stores;

pub use checksums::{modified_attribute_keys, ChecksumStore, Checksummer, ObjectChecksums};
pub use compiled_content::{CachedContent, CompiledContentCache};
pub use dependencies::DependencyStore;
pub use error::CacheError;
pub use rule_memory::ActionSequenceStore;
pub use store::{StoreFile, StoreHeader};
pub use stores::{LiveObjects, SiteStores};
