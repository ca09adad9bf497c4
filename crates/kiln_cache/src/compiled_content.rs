//! The compiled-content cache.
//!
//! Holds the snapshot contents of every item rep compiled in earlier runs, so
//! that a rep that is not outdated can be restored without running its action
//! sequence. Binary snapshots are copied into `<tmp>/binary_content/` because
//! the files filters produce may not outlive the run. Copies are staged next to
//! their final name and only moved into place by [`CompiledContentCache::save`],
//! so a run that fails leaves the previous cache intact.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use kiln_model::{Content, Reference, SnapshotName};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CacheError;
use crate::store::StoreFile;

const STORE_NAME: &str = "compiled_content";
const STORE_VERSION: u32 = 1;
const BINARY_DIR: &str = "binary_content";
const STAGED_EXT: &str = "staged";

/// One cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CachedContent {
    /// Textual content, stored inline.
    Text(String),
    /// Binary content, stored as a file inside the cache directory.
    Binary(PathBuf),
}

impl CachedContent {
    /// Converts back into snapshot content.
    pub fn to_content(&self) -> Content {
        match self {
            CachedContent::Text(s) => Content::textual(s.as_str()),
            CachedContent::Binary(path) => Content::binary(path.clone()),
        }
    }
}

/// Snapshot contents per item rep.
#[derive(Debug)]
pub struct CompiledContentCache {
    dir: PathBuf,
    entries: BTreeMap<Reference, BTreeMap<SnapshotName, CachedContent>>,
    /// Final binary path to the staged copy that replaces it on save.
    staged: BTreeMap<PathBuf, PathBuf>,
}

impl CompiledContentCache {
    /// Creates an empty cache that keeps its binary files under `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
            entries: BTreeMap::new(),
            staged: BTreeMap::new(),
        }
    }

    /// Loads the cache from `dir`, dropping reps not in `live` and entries
    /// whose binary files have disappeared.
    pub fn load(dir: &Path, live: &BTreeSet<Reference>) -> Self {
        let entries: BTreeMap<Reference, BTreeMap<SnapshotName, CachedContent>> =
            Self::file(dir).load().unwrap_or_default();
        remove_staged(&dir.join(BINARY_DIR));
        let mut cache = Self {
            dir: dir.to_path_buf(),
            entries,
            staged: BTreeMap::new(),
        };
        cache.entries.retain(|r, snapshots| {
            live.contains(r)
                && snapshots.values().all(|c| match c {
                    CachedContent::Text(_) => true,
                    CachedContent::Binary(path) => path.is_file(),
                })
        });
        cache
    }

    /// Moves the binary copies staged by [`set`](Self::set) into place and
    /// saves the cache index.
    pub fn save(&mut self) -> Result<(), CacheError> {
        for (target, staged) in std::mem::take(&mut self.staged) {
            std::fs::rename(&staged, &target).map_err(|e| CacheError::Io {
                path: staged.clone(),
                source: e,
            })?;
        }
        Self::file(&self.dir).save(&self.entries)
    }

    /// The cached snapshots of `rep`, converted back into content.
    pub fn get(&self, rep: &Reference) -> Option<BTreeMap<SnapshotName, Content>> {
        self.entries.get(rep).map(|snapshots| {
            snapshots
                .iter()
                .map(|(name, cached)| (name.clone(), self.resolve(cached)))
                .collect()
        })
    }

    /// Returns true if `rep` has cached snapshots.
    pub fn contains(&self, rep: &Reference) -> bool {
        self.entries.contains_key(rep)
    }

    /// Replaces the cached snapshots of `rep`.
    ///
    /// Textual content is stored inline. Binary content is copied into the
    /// cache directory under a name derived from the rep and snapshot.
    pub fn set(
        &mut self,
        rep: &Reference,
        snapshots: &BTreeMap<SnapshotName, Content>,
    ) -> Result<(), CacheError> {
        let mut cached = BTreeMap::new();
        for (name, content) in snapshots {
            let entry = match content {
                Content::Textual(text) => {
                    let s = text.string().map_err(|source| CacheError::Content {
                        reference: rep.clone(),
                        source,
                    })?;
                    CachedContent::Text(s.to_string())
                }
                Content::Binary { filename } => {
                    CachedContent::Binary(self.copy_binary(rep, name, filename)?)
                }
            };
            cached.insert(name.clone(), entry);
        }
        debug!(rep = %rep, snapshots = cached.len(), "cached compiled content");
        self.entries.insert(rep.clone(), cached);
        Ok(())
    }

    /// Content of `cached`, reading binaries from their staged copy until saved.
    fn resolve(&self, cached: &CachedContent) -> Content {
        match cached {
            CachedContent::Binary(path) => match self.staged.get(path) {
                Some(staged) => Content::binary(staged.clone()),
                None => cached.to_content(),
            },
            CachedContent::Text(_) => cached.to_content(),
        }
    }

    /// Drops entries for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&Reference) -> bool) {
        self.entries.retain(|r, _| keep(r));
    }

    /// Number of reps with cached content.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn copy_binary(
        &mut self,
        rep: &Reference,
        name: &SnapshotName,
        source: &Path,
    ) -> Result<PathBuf, CacheError> {
        let dir = self.dir.join(BINARY_DIR);
        std::fs::create_dir_all(&dir).map_err(|e| CacheError::Io {
            path: dir.clone(),
            source: e,
        })?;
        let key = ContentHash::from_bytes(format!("{rep}\0{name}").as_bytes());
        let target = dir.join(key.to_string());
        let staged = target.with_extension(STAGED_EXT);
        if source == target {
            self.staged.remove(&target);
        } else if source != staged {
            std::fs::copy(source, &staged).map_err(|e| CacheError::Io {
                path: source.to_path_buf(),
                source: e,
            })?;
            self.staged.insert(target.clone(), staged);
        }
        Ok(target)
    }

    fn file(dir: &Path) -> StoreFile {
        StoreFile::new(dir, STORE_NAME, STORE_VERSION)
    }
}

/// Deletes copies staged by a run that never saved.
fn remove_staged(dir: &Path) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for path in entries.flatten().map(|e| e.path()) {
        if path.extension().is_some_and(|ext| ext == STAGED_EXT) {
            debug!(path = %path.display(), "removing unsaved binary copy");
            let _ = std::fs::remove_file(&path);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;
    use kiln_model::RepName;

    fn rep(id: &str) -> Reference {
        Reference::ItemRep(Identifier::new(id).unwrap(), RepName::default_rep())
    }

    fn snapshots(pairs: Vec<(SnapshotName, Content)>) -> BTreeMap<SnapshotName, Content> {
        pairs.into_iter().collect()
    }

    #[test]
    fn textual_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let mut cache = CompiledContentCache::new(dir.path());
        cache
            .set(
                &rep("/a.md"),
                &snapshots(vec![
                    (SnapshotName::raw(), Content::textual("# Hi")),
                    (SnapshotName::last(), Content::textual("<h1>Hi</h1>")),
                ]),
            )
            .unwrap();
        cache.save().unwrap();

        let live: BTreeSet<Reference> = [rep("/a.md")].into();
        let loaded = CompiledContentCache::load(dir.path(), &live);
        let back = loaded.get(&rep("/a.md")).unwrap();
        assert_eq!(back[&SnapshotName::last()].string().unwrap(), "<h1>Hi</h1>");
        assert_eq!(back[&SnapshotName::raw()].string().unwrap(), "# Hi");
    }

    #[test]
    fn binary_content_is_copied() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("filter-output.bin");
        std::fs::write(&src, [1u8, 2, 3]).unwrap();

        let cache_dir = dir.path().join("tmp");
        let mut cache = CompiledContentCache::new(&cache_dir);
        cache
            .set(
                &rep("/logo.png"),
                &snapshots(vec![(SnapshotName::last(), Content::binary(&src))]),
            )
            .unwrap();
        cache.save().unwrap();
        std::fs::remove_file(&src).unwrap();

        let live: BTreeSet<Reference> = [rep("/logo.png")].into();
        let loaded = CompiledContentCache::load(&cache_dir, &live);
        let back = loaded.get(&rep("/logo.png")).unwrap();
        let path = back[&SnapshotName::last()].filename().unwrap().to_path_buf();
        assert!(path.starts_with(cache_dir.join(BINARY_DIR)));
        assert_eq!(std::fs::read(path).unwrap(), vec![1, 2, 3]);
    }

    #[test]
    fn unsaved_binary_leaves_previous_cache_intact() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("out.bin");
        std::fs::write(&src, [1u8]).unwrap();
        let cache_dir = dir.path().join("tmp");
        let live: BTreeSet<Reference> = [rep("/logo.png")].into();
        let logo = snapshots(vec![(SnapshotName::last(), Content::binary(&src))]);

        let mut cache = CompiledContentCache::new(&cache_dir);
        cache.set(&rep("/logo.png"), &logo).unwrap();
        cache.save().unwrap();

        std::fs::write(&src, [2u8]).unwrap();
        let mut failed_run = CompiledContentCache::load(&cache_dir, &live);
        failed_run.set(&rep("/logo.png"), &logo).unwrap();
        let during = failed_run.get(&rep("/logo.png")).unwrap();
        let staged = during[&SnapshotName::last()].filename().unwrap().to_path_buf();
        assert_eq!(std::fs::read(staged).unwrap(), vec![2]);
        drop(failed_run);

        let reloaded = CompiledContentCache::load(&cache_dir, &live);
        let back = reloaded.get(&rep("/logo.png")).unwrap();
        let path = back[&SnapshotName::last()].filename().unwrap().to_path_buf();
        assert_eq!(std::fs::read(path).unwrap(), vec![1]);
        let leftovers = std::fs::read_dir(cache_dir.join(BINARY_DIR)).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn load_drops_dead_reps_and_missing_binaries() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("x.bin");
        std::fs::write(&src, b"x").unwrap();

        let mut cache = CompiledContentCache::new(dir.path());
        cache
            .set(&rep("/a.md"), &snapshots(vec![(SnapshotName::last(), Content::textual("a"))]))
            .unwrap();
        cache
            .set(&rep("/b.md"), &snapshots(vec![(SnapshotName::last(), Content::textual("b"))]))
            .unwrap();
        cache
            .set(&rep("/c.png"), &snapshots(vec![(SnapshotName::last(), Content::binary(&src))]))
            .unwrap();
        cache.save().unwrap();
        std::fs::remove_dir_all(dir.path().join(BINARY_DIR)).unwrap();

        let live: BTreeSet<Reference> = [rep("/a.md"), rep("/c.png")].into();
        let loaded = CompiledContentCache::load(dir.path(), &live);
        assert!(loaded.contains(&rep("/a.md")));
        assert!(!loaded.contains(&rep("/b.md")));
        assert!(!loaded.contains(&rep("/c.png")));
        assert_eq!(loaded.len(), 1);
    }
}
