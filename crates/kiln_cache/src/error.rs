//! Error types for store operations.

use std::path::PathBuf;

use kiln_model::{ModelError, Reference};

/// Errors that can occur while loading, computing or saving stores.
///
/// Loading is fail-safe: an unreadable store is treated as absent, and these
/// errors only surface when saving or when computing fresh checksums.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing a store file.
    #[error("store I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A store file has an invalid or missing header.
    #[error("invalid store header in {path}: {reason}")]
    InvalidHeader {
        /// The store file path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The stored checksum does not match the computed checksum of the payload.
    #[error("checksum mismatch in {path}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        /// The store file path.
        path: PathBuf,
        /// The expected checksum from the header.
        expected: String,
        /// The actual checksum computed from the payload.
        actual: String,
    },

    /// The store was written by an incompatible version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The store file path.
        path: PathBuf,
        /// The expected version.
        expected: u32,
        /// The version found in the file.
        actual: u32,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// The checksum of an object could not be computed.
    #[error("cannot compute checksum of {reference}: {source}")]
    Checksum {
        /// The object being digested.
        reference: Reference,
        /// Why its content could not be read.
        source: ModelError,
    },

    /// The text of a snapshot could not be read for caching.
    #[error("cannot read compiled content of {reference}: {source}")]
    Content {
        /// The item rep being cached.
        reference: Reference,
        /// Why its content could not be read.
        source: ModelError,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = CacheError::Io {
            path: PathBuf::from("/tmp/kiln/checksums.bin"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        let msg = err.to_string();
        assert!(msg.contains("store I/O error"));
        assert!(msg.contains("checksums.bin"));
    }

    #[test]
    fn version_mismatch_display() {
        let err = CacheError::VersionMismatch {
            path: PathBuf::from("dependencies.bin"),
            expected: 2,
            actual: 1,
        };
        let msg = err.to_string();
        assert!(msg.contains("expected 2"));
        assert!(msg.contains("got 1"));
    }

    #[test]
    fn checksum_error_names_object() {
        let err = CacheError::Checksum {
            reference: Reference::Configuration,
            source: ModelError::BinaryContent {
                path: PathBuf::from("x.png"),
            },
        };
        assert!(err.to_string().starts_with("cannot compute checksum of configuration"));
    }
}
