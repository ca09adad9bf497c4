//! Loading and saving every store of a site together.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use kiln_model::Reference;
use tracing::{debug, info};

use crate::checksums::ChecksumStore;
use crate::compiled_content::CompiledContentCache;
use crate::dependencies::DependencyStore;
use crate::error::CacheError;
use crate::rule_memory::ActionSequenceStore;

/// The persisted state of the previous run.
///
/// Loading is fail-safe: each store that is missing or unreadable is empty,
/// which makes everything it covers outdated.
#[derive(Debug)]
pub struct SiteStores {
    dir: PathBuf,
    /// Digests from the previous run.
    pub checksums: ChecksumStore,
    /// The dependency graph.
    pub dependencies: DependencyStore,
    /// Rule memories from the previous run.
    pub rule_memory: ActionSequenceStore,
    /// Snapshot contents from the previous run.
    pub compiled_content: CompiledContentCache,
}

/// References of the current run, used to prune stale store entries.
#[derive(Debug, Default)]
pub struct LiveObjects {
    /// Checksum-bearing objects, in canonical order.
    pub objects: Vec<Reference>,
    /// Item references.
    pub items: Vec<Reference>,
    /// Item rep references.
    pub reps: Vec<Reference>,
    /// Layout references.
    pub layouts: Vec<Reference>,
}

impl SiteStores {
    /// Loads every store from `dir`.
    pub fn load(dir: &Path, live: &LiveObjects) -> Self {
        let objects: BTreeSet<Reference> = live.objects.iter().cloned().collect();
        let reps: BTreeSet<Reference> = live.reps.iter().cloned().collect();
        let memorable: BTreeSet<Reference> =
            live.reps.iter().chain(&live.layouts).cloned().collect();

        let stores = Self {
            dir: dir.to_path_buf(),
            checksums: ChecksumStore::load(dir, &objects),
            dependencies: DependencyStore::load(dir, &live.objects, &live.items),
            rule_memory: ActionSequenceStore::load(dir, &memorable),
            compiled_content: CompiledContentCache::load(dir, &reps),
        };
        debug!(
            checksums = stores.checksums.len(),
            dependencies = stores.dependencies.edge_count(),
            rule_memories = stores.rule_memory.len(),
            cached_reps = stores.compiled_content.len(),
            "loaded stores"
        );
        stores
    }

    /// Persists the stores, with `checksums` replacing the previous digests.
    pub fn save(
        &mut self,
        checksums: &ChecksumStore,
        rule_memory: &ActionSequenceStore,
    ) -> Result<(), CacheError> {
        checksums.save(&self.dir)?;
        self.dependencies.save(&self.dir)?;
        rule_memory.save(&self.dir)?;
        self.compiled_content.save()?;
        info!(dir = %self.dir.display(), "saved stores");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;
    use kiln_model::{Props, RepName};

    fn item(id: &str) -> Reference {
        Reference::Item(Identifier::new(id).unwrap())
    }

    fn rep(id: &str) -> Reference {
        Reference::ItemRep(Identifier::new(id).unwrap(), RepName::default_rep())
    }

    #[test]
    fn empty_directory_gives_empty_stores() {
        let dir = tempfile::tempdir().unwrap();
        let live = LiveObjects {
            objects: vec![Reference::Configuration, item("/a.md")],
            items: vec![item("/a.md")],
            reps: vec![rep("/a.md")],
            layouts: vec![],
        };
        let stores = SiteStores::load(dir.path(), &live);
        assert!(stores.checksums.is_empty());
        assert_eq!(stores.dependencies.edge_count(), 0);
        assert!(stores.rule_memory.is_empty());
        assert!(stores.compiled_content.is_empty());
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let live = LiveObjects {
            objects: vec![item("/a.md"), item("/b.md")],
            items: vec![item("/a.md"), item("/b.md")],
            reps: vec![rep("/a.md"), rep("/b.md")],
            layouts: vec![],
        };
        let mut stores = SiteStores::load(dir.path(), &live);
        stores
            .dependencies
            .record_dependency(&item("/a.md"), &item("/b.md"), Props::compiled_content());
        stores
            .save(&ChecksumStore::new(), &ActionSequenceStore::new())
            .unwrap();

        let reloaded = SiteStores::load(dir.path(), &live);
        assert_eq!(
            reloaded.dependencies.objects_causing_outdatedness_of(&item("/a.md")),
            vec![Some(item("/b.md"))]
        );
        assert!(reloaded.dependencies.new_objects().is_empty());
    }
}
