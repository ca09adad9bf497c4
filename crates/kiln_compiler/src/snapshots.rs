//! In-memory snapshot contents of the current run.

use std::collections::{BTreeMap, HashMap};

use kiln_model::{Content, RepId, SnapshotName};

/// Snapshot contents by rep, filled by the executor or from the cache.
#[derive(Debug, Default)]
pub struct SnapshotRepo {
    contents: HashMap<RepId, BTreeMap<SnapshotName, Content>>,
}

impl SnapshotRepo {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `content` as snapshot `name` of `rep`, replacing any earlier value.
    pub fn set(&mut self, rep: RepId, name: SnapshotName, content: Content) {
        self.contents.entry(rep).or_default().insert(name, content);
    }

    /// Returns snapshot `name` of `rep`.
    pub fn get(&self, rep: RepId, name: &SnapshotName) -> Option<&Content> {
        self.contents.get(&rep).and_then(|s| s.get(name))
    }

    /// Returns true if `rep` has a value for snapshot `name`.
    pub fn contains(&self, rep: RepId, name: &SnapshotName) -> bool {
        self.get(rep, name).is_some()
    }

    /// All snapshots of `rep`.
    pub fn get_all(&self, rep: RepId) -> Option<&BTreeMap<SnapshotName, Content>> {
        self.contents.get(&rep)
    }

    /// Replaces all snapshots of `rep`.
    pub fn set_all(&mut self, rep: RepId, snapshots: BTreeMap<SnapshotName, Content>) {
        self.contents.insert(rep, snapshots);
    }

    /// Drops all snapshots of `rep`.
    pub fn remove(&mut self, rep: RepId) {
        self.contents.remove(&rep);
    }
}
