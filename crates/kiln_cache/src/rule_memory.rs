//! The rule memory: the serialized action sequence last used per item rep and layout.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use kiln_model::{Reference, RuleMemory};
use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::store::StoreFile;

const STORE_NAME: &str = "rule_memory";
const STORE_VERSION: u32 = 1;

/// Persisted rule memories, keyed by item rep or layout reference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionSequenceStore {
    memories: BTreeMap<Reference, RuleMemory>,
}

impl ActionSequenceStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// The memory recorded for `reference` by the previous run.
    pub fn get(&self, reference: &Reference) -> Option<&RuleMemory> {
        self.memories.get(reference)
    }

    /// Records the memory used for `reference` in this run.
    pub fn set(&mut self, reference: Reference, memory: RuleMemory) {
        self.memories.insert(reference, memory);
    }

    /// Drops entries for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&Reference) -> bool) {
        self.memories.retain(|r, _| keep(r));
    }

    /// Number of stored memories.
    pub fn len(&self) -> usize {
        self.memories.len()
    }

    /// Returns true if nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.memories.is_empty()
    }

    /// Loads the store from `dir`, keeping only references in `live`.
    pub fn load(dir: &Path, live: &BTreeSet<Reference>) -> Self {
        let mut store: Self = Self::file(dir).load().unwrap_or_default();
        store.retain(|r| live.contains(r));
        store
    }

    /// Saves the store into `dir`.
    pub fn save(&self, dir: &Path) -> Result<(), CacheError> {
        Self::file(dir).save(self)
    }

    fn file(dir: &Path) -> StoreFile {
        StoreFile::new(dir, STORE_NAME, STORE_VERSION)
    }
}
