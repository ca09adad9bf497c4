//! The on-disk format shared by every persisted store.
//!
//! A store file is a 4-byte little-endian header length, a bincode-encoded
//! [`StoreHeader`], then the bincode-encoded payload. The header carries magic
//! bytes, the file format version, the store's name and version, and a
//! checksum of the payload. Any mismatch on load means "store absent".

use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::CacheError;

/// Magic bytes identifying a Kiln store file.
const STORE_MAGIC: [u8; 4] = *b"KILN";

/// Version of the header layout. Increment on breaking changes to the header.
const STORE_FORMAT_VERSION: u32 = 1;

/// Header prepended to every store file for validation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreHeader {
    /// Magic bytes: must be `b"KILN"`.
    pub magic: [u8; 4],
    /// Header layout version.
    pub format_version: u32,
    /// Name of the store, guarding against files swapped between stores.
    pub store_name: String,
    /// Version of the store's payload layout.
    pub store_version: u32,
    /// Content hash of the payload.
    pub checksum: ContentHash,
}

/// One persisted store file, such as `tmp/kiln/checksums.bin`.
#[derive(Debug, Clone)]
pub struct StoreFile {
    path: PathBuf,
    name: &'static str,
    version: u32,
}

impl StoreFile {
    /// Describes the store `name` at version `version` inside `dir`.
    pub fn new(dir: &Path, name: &'static str, version: u32) -> Self {
        Self {
            path: dir.join(format!("{name}.bin")),
            name,
            version,
        }
    }

    /// The file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads and decodes the payload.
    ///
    /// Returns `None` if the file is missing, damaged, or written by another
    /// version. This is fail-safe: a bad store is a full recompute, not an error.
    pub fn load<T: DeserializeOwned>(&self) -> Option<T> {
        if !self.path.exists() {
            debug!(store = self.name, "no stored data");
            return None;
        }
        match self.try_load() {
            Ok(data) => Some(data),
            Err(err) => {
                warn!(store = self.name, error = %err, "discarding unreadable store");
                None
            }
        }
    }

    fn try_load<T: DeserializeOwned>(&self) -> Result<T, CacheError> {
        let raw = std::fs::read(&self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;

        if raw.len() < 4 {
            return Err(self.invalid_header("file shorter than header length"));
        }
        let mut len_bytes = [0u8; 4];
        len_bytes.copy_from_slice(&raw[..4]);
        let header_len = u32::from_le_bytes(len_bytes) as usize;
        if raw.len() < 4 + header_len {
            return Err(self.invalid_header("truncated header"));
        }

        let (header, _): (StoreHeader, usize) = bincode::serde::decode_from_slice(
            &raw[4..4 + header_len],
            bincode::config::standard(),
        )
        .map_err(|e| self.invalid_header(&e.to_string()))?;

        if header.magic != STORE_MAGIC {
            return Err(self.invalid_header("bad magic bytes"));
        }
        if header.format_version != STORE_FORMAT_VERSION {
            return Err(CacheError::VersionMismatch {
                path: self.path.clone(),
                expected: STORE_FORMAT_VERSION,
                actual: header.format_version,
            });
        }
        if header.store_name != self.name {
            return Err(self.invalid_header(&format!(
                "holds store '{}', expected '{}'",
                header.store_name, self.name
            )));
        }
        if header.store_version != self.version {
            return Err(CacheError::VersionMismatch {
                path: self.path.clone(),
                expected: self.version,
                actual: header.store_version,
            });
        }

        let payload = &raw[4 + header_len..];
        let actual = ContentHash::from_bytes(payload);
        if actual != header.checksum {
            return Err(CacheError::ChecksumMismatch {
                path: self.path.clone(),
                expected: header.checksum.to_string(),
                actual: actual.to_string(),
            });
        }

        let (data, _) = bincode::serde::decode_from_slice(payload, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        Ok(data)
    }

    /// Encodes and writes the payload, replacing any previous file atomically.
    pub fn save<T: Serialize>(&self, data: &T) -> Result<(), CacheError> {
        let payload = bincode::serde::encode_to_vec(data, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        let header = StoreHeader {
            magic: STORE_MAGIC,
            format_version: STORE_FORMAT_VERSION,
            store_name: self.name.to_string(),
            store_version: self.version,
            checksum: ContentHash::from_bytes(&payload),
        };
        let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
            .map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;

        let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
        output.extend_from_slice(&(header_bytes.len() as u32).to_le_bytes());
        output.extend_from_slice(&header_bytes);
        output.extend_from_slice(&payload);

        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir).map_err(|source| CacheError::Io {
                path: dir.to_path_buf(),
                source,
            })?;
        }
        let tmp = self.path.with_extension("bin.tmp");
        std::fs::write(&tmp, &output).map_err(|source| CacheError::Io {
            path: tmp.clone(),
            source,
        })?;
        std::fs::rename(&tmp, &self.path).map_err(|source| CacheError::Io {
            path: self.path.clone(),
            source,
        })?;
        debug!(store = self.name, bytes = output.len(), "saved store");
        Ok(())
    }

    fn invalid_header(&self, reason: &str) -> CacheError {
        CacheError::InvalidHeader {
            path: self.path.clone(),
            reason: reason.to_string(),
        }
    }
}
