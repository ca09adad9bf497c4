//! Item representations and the repository that owns them.

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use kiln_common::Identifier;

use crate::reference::{Reference, RepName, SnapshotName};

/// A snapshot an item rep declares, and whether its content is binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDef {
    /// The snapshot name.
    pub name: SnapshotName,
    /// Whether the content at this snapshot is binary.
    pub binary: bool,
}

impl SnapshotDef {
    /// Creates a snapshot definition.
    pub fn new(name: SnapshotName, binary: bool) -> Self {
        Self { name, binary }
    }
}

/// Handle to an [`ItemRep`] inside an [`ItemRepRepo`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepId(usize);

impl RepId {
    /// The position of the rep in its repository.
    pub fn index(self) -> usize {
        self.0
    }
}

/// One named view of an item, compiled independently of its siblings.
///
/// Reps are rebuilt every run from the items and the rules. Their paths are
/// assigned by the router, and `compiled` is set once the executor has run
/// the whole action sequence (or the cache supplied the content).
#[derive(Debug, Clone)]
pub struct ItemRep {
    item: Identifier,
    name: RepName,
    /// Set once all snapshots hold their final content.
    pub compiled: bool,
    /// Absolute output file per snapshot.
    pub raw_paths: BTreeMap<SnapshotName, Vec<PathBuf>>,
    /// Public path per snapshot, with index filenames stripped.
    pub paths: BTreeMap<SnapshotName, Vec<String>>,
    /// Declared snapshots.
    pub snapshot_defs: Vec<SnapshotDef>,
}

impl ItemRep {
    /// Creates an uncompiled, unrouted rep.
    pub fn new(item: Identifier, name: RepName) -> Self {
        Self {
            item,
            name,
            compiled: false,
            raw_paths: BTreeMap::new(),
            paths: BTreeMap::new(),
            snapshot_defs: Vec::new(),
        }
    }

    /// The owning item's identifier.
    pub fn item(&self) -> &Identifier {
        &self.item
    }

    /// The rep's name.
    pub fn name(&self) -> &RepName {
        &self.name
    }

    /// The rep's reference.
    pub fn reference(&self) -> Reference {
        Reference::ItemRep(self.item.clone(), self.name.clone())
    }

    /// The owning item's reference.
    pub fn item_reference(&self) -> Reference {
        Reference::Item(self.item.clone())
    }

    /// Returns the definition of snapshot `name`, if declared.
    pub fn snapshot_def(&self, name: &SnapshotName) -> Option<&SnapshotDef> {
        self.snapshot_defs.iter().find(|d| &d.name == name)
    }

    /// Returns true if the rep declares a snapshot named `name`.
    pub fn has_snapshot(&self, name: &SnapshotName) -> bool {
        self.snapshot_def(name).is_some()
    }

    /// Returns true if any snapshot holds binary content.
    pub fn is_binary(&self) -> bool {
        self.snapshot_def(&SnapshotName::last())
            .map(|d| d.binary)
            .unwrap_or(false)
    }

    /// The first public path of snapshot `name`.
    pub fn path(&self, name: &SnapshotName) -> Option<&str> {
        self.paths
            .get(name)
            .and_then(|p| p.first())
            .map(String::as_str)
    }

    /// The first output file of snapshot `name`.
    pub fn raw_path(&self, name: &SnapshotName) -> Option<&PathBuf> {
        self.raw_paths.get(name).and_then(|p| p.first())
    }
}

impl std::fmt::Display for ItemRep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.item, self.name)
    }
}

/// Owns every item rep of a run.
#[derive(Debug, Default)]
pub struct ItemRepRepo {
    reps: Vec<ItemRep>,
    index: HashMap<(Identifier, RepName), RepId>,
    by_item: HashMap<Identifier, Vec<RepId>>,
}

impl ItemRepRepo {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rep and returns its handle.
    ///
    /// Adding a rep with the same item and name twice returns the existing handle.
    pub fn add(&mut self, rep: ItemRep) -> RepId {
        let key = (rep.item.clone(), rep.name.clone());
        if let Some(&id) = self.index.get(&key) {
            return id;
        }
        let id = RepId(self.reps.len());
        self.by_item.entry(rep.item.clone()).or_default().push(id);
        self.index.insert(key, id);
        self.reps.push(rep);
        id
    }

    /// Returns the rep behind `id`.
    ///
    /// Handles are only created by [`add`](Self::add), so every handle from
    /// this repository is valid.
    pub fn get(&self, id: RepId) -> &ItemRep {
        &self.reps[id.0]
    }

    /// Returns the rep behind `id` mutably.
    pub fn get_mut(&mut self, id: RepId) -> &mut ItemRep {
        &mut self.reps[id.0]
    }

    /// Looks up a rep by item identifier and name.
    pub fn find(&self, item: &Identifier, name: &RepName) -> Option<RepId> {
        self.index.get(&(item.clone(), name.clone())).copied()
    }

    /// Looks up a rep by reference.
    pub fn find_reference(&self, reference: &Reference) -> Option<RepId> {
        match reference {
            Reference::ItemRep(item, name) => self.find(item, name),
            _ => None,
        }
    }

    /// Handles of all reps of `item`, in creation order.
    pub fn reps_for_item(&self, item: &Identifier) -> &[RepId] {
        self.by_item.get(item).map(Vec::as_slice).unwrap_or(&[])
    }

    /// All handles in creation order.
    pub fn ids(&self) -> impl Iterator<Item = RepId> + '_ {
        (0..self.reps.len()).map(RepId)
    }

    /// All reps in creation order.
    pub fn iter(&self) -> impl Iterator<Item = (RepId, &ItemRep)> {
        self.reps.iter().enumerate().map(|(i, r)| (RepId(i), r))
    }

    /// Number of reps.
    pub fn len(&self) -> usize {
        self.reps.len()
    }

    /// Returns true if there are no reps.
    pub fn is_empty(&self) -> bool {
        self.reps.is_empty()
    }
}
