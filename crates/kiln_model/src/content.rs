//! Textual and binary document content.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use kiln_common::ContentHash;

use crate::error::ModelError;

/// The content of a document or of a snapshot.
///
/// Binary content is only ever referenced by path. Textual content may be
/// loaded lazily from its file on first access.
#[derive(Debug, Clone)]
pub enum Content {
    /// Text, possibly not yet read from disk.
    Textual(TextualContent),
    /// A file on disk, never loaded into memory in full.
    Binary {
        /// Location of the bytes.
        filename: PathBuf,
    },
}

/// Textual content, either held in memory or read on demand.
#[derive(Debug, Clone)]
pub struct TextualContent {
    string: OnceLock<Arc<str>>,
    filename: Option<PathBuf>,
}

impl Content {
    /// Creates textual content held in memory.
    pub fn textual(s: impl Into<Arc<str>>) -> Self {
        let string = OnceLock::new();
        let _ = string.set(s.into());
        Content::Textual(TextualContent {
            string,
            filename: None,
        })
    }

    /// Creates textual content held in memory, remembering where it came from.
    pub fn textual_with_filename(s: impl Into<Arc<str>>, filename: impl Into<PathBuf>) -> Self {
        let string = OnceLock::new();
        let _ = string.set(s.into());
        Content::Textual(TextualContent {
            string,
            filename: Some(filename.into()),
        })
    }

    /// Creates textual content read from `filename` on first access.
    pub fn lazy_textual(filename: impl Into<PathBuf>) -> Self {
        Content::Textual(TextualContent {
            string: OnceLock::new(),
            filename: Some(filename.into()),
        })
    }

    /// Creates binary content backed by `filename`.
    pub fn binary(filename: impl Into<PathBuf>) -> Self {
        Content::Binary {
            filename: filename.into(),
        }
    }

    /// Returns true for binary content.
    pub fn is_binary(&self) -> bool {
        matches!(self, Content::Binary { .. })
    }

    /// Returns the backing filename, if any.
    pub fn filename(&self) -> Option<&Path> {
        match self {
            Content::Textual(t) => t.filename.as_deref(),
            Content::Binary { filename } => Some(filename),
        }
    }

    /// Returns the text, reading it from disk if it was deferred.
    pub fn string(&self) -> Result<&str, ModelError> {
        match self {
            Content::Textual(t) => t.string(),
            Content::Binary { filename } => Err(ModelError::BinaryContent {
                path: filename.clone(),
            }),
        }
    }

    /// Computes the digest of the raw bytes.
    ///
    /// Binary files are streamed from disk.
    pub fn checksum(&self) -> Result<ContentHash, ModelError> {
        match self {
            Content::Textual(t) => Ok(ContentHash::from_bytes(t.string()?.as_bytes())),
            Content::Binary { filename } => {
                ContentHash::from_file(filename).map_err(|source| ModelError::Io {
                    path: filename.clone(),
                    source,
                })
            }
        }
    }
}

impl TextualContent {
    /// Returns the text, reading it from disk on first call if deferred.
    pub fn string(&self) -> Result<&str, ModelError> {
        if let Some(s) = self.string.get() {
            return Ok(&**s);
        }
        let Some(path) = &self.filename else {
            return Ok("");
        };
        let loaded = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.clone(),
            source,
        })?;
        Ok(&**self.string.get_or_init(|| Arc::from(loaded)))
    }

    /// Returns true once the text is in memory.
    pub fn is_loaded(&self) -> bool {
        self.string.get().is_some()
    }
}
