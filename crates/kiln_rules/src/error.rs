//! Error types for rule evaluation.

use std::path::PathBuf;

use kiln_common::{Identifier, PatternError};
use kiln_model::SnapshotName;

/// Errors raised while loading rules or computing action sequences.
#[derive(Debug, thiserror::Error)]
pub enum RuleError {
    /// No compilation rule matches an item rep.
    #[error("no compilation rule found for {rep}")]
    NoApplicableRule {
        /// The rep, as `/identifier (name)`.
        rep: String,
    },

    /// No layout rule matches a layout.
    #[error("no layout rule found for layout {layout}")]
    NoApplicableLayoutRule {
        /// The layout's identifier.
        layout: Identifier,
    },

    /// A rule declares the same snapshot twice.
    #[error("snapshot '{name}' is declared more than once for {rep}")]
    DuplicateSnapshot {
        /// The rep, as `/identifier (name)`.
        rep: String,
        /// The repeated snapshot name.
        name: SnapshotName,
    },

    /// `layout` was called with something that is not an identifier or pattern.
    #[error("layout identifier '{identifier}' must start with a slash")]
    InvalidLayoutIdentifier {
        /// The rejected argument.
        identifier: String,
    },

    /// A routing rule or `write` produced a path not starting with a slash.
    #[error("path '{path}' for {rep} does not start with a slash")]
    RouteWithoutSlash {
        /// The rep, as `/identifier (name)`.
        rep: String,
        /// The offending path.
        path: String,
    },

    /// A rule pattern is invalid.
    #[error(transparent)]
    Pattern(#[from] PatternError),

    /// The rules file could not be read.
    #[error("failed to read rules file {path}: {source}")]
    Io {
        /// The rules file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The rules file could not be parsed.
    #[error("invalid rules file {path}: {message}")]
    Parse {
        /// The rules file.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// A rule body failed for a reason of its own.
    #[error("{0}")]
    Custom(String),
}
