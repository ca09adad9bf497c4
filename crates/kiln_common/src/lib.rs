//! Shared foundational types used across the Kiln site compiler.
//!
//! This crate provides content hashing, document identifiers and the patterns
//! used to match them, attribute maps with a canonical byte form, and the
//! internal error type used for invariant violations.

#![warn(missing_docs)]

pub mod attributes;
pub mod hash;
pub mod identifier;
pub mod pattern;
pub mod result;

pub use attributes::{canonical_json, Attributes};
pub use hash::{ContentHash, ContentHasher};
pub use identifier::{Identifier, IdentifierError};
pub use pattern::{Pattern, PatternError, StringPatternType};
pub use result::{InternalError, KilnResult};
