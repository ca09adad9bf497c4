//! Error types for the site model.

use std::path::PathBuf;

use kiln_common::IdentifierError;

use crate::reference::SnapshotName;

/// Errors raised while building or loading the site model.
#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    /// Two objects of the same kind share an identifier.
    #[error("duplicate {kind} identifier '{identifier}'")]
    DuplicateIdentifier {
        /// `item` or `layout`.
        kind: &'static str,
        /// The shared identifier.
        identifier: String,
    },

    /// A string could not be turned into an identifier.
    #[error(transparent)]
    Identifier(#[from] IdentifierError),

    /// A file could not be read.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Text was requested from binary content.
    #[error("content at {path} is binary and has no text")]
    BinaryContent {
        /// The binary file.
        path: PathBuf,
    },

    /// A front matter block could not be parsed.
    #[error("invalid front matter in {path}: {message}")]
    FrontMatter {
        /// The file holding the front matter.
        path: PathBuf,
        /// What went wrong.
        message: String,
    },

    /// An action sequence declares the same snapshot twice.
    #[error("snapshot '{name}' is declared more than once")]
    DuplicateSnapshot {
        /// The repeated snapshot name.
        name: SnapshotName,
    },
}
