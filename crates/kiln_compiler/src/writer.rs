//! Writing compiled snapshots to the output directory.

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use kiln_common::ContentHash;
use kiln_model::{Content, ItemRep, SnapshotName};
use tracing::debug;

use crate::error::RepError;
use crate::notifications::{Notification, NotificationCenter};

/// What writing one output file did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    /// The file did not exist.
    Created,
    /// The file existed with other content.
    Updated,
    /// The file already had this content and was left alone.
    Identical,
}

impl fmt::Display for WriteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            WriteKind::Created => "create",
            WriteKind::Updated => "update",
            WriteKind::Identical => "identical",
        })
    }
}

/// Writes the routed snapshots of compiled reps.
pub struct ItemRepWriter<'a> {
    notifications: &'a NotificationCenter,
}

impl<'a> ItemRepWriter<'a> {
    /// Creates a writer that announces each file through `notifications`.
    pub fn new(notifications: &'a NotificationCenter) -> Self {
        Self { notifications }
    }

    /// Writes every routed snapshot of `rep`.
    ///
    /// Only called once `rep` is fully compiled, so no partially computed
    /// content reaches the output directory.
    pub fn write_all(
        &self,
        rep: &ItemRep,
        snapshots: &BTreeMap<SnapshotName, Content>,
    ) -> Result<Vec<(PathBuf, WriteKind)>, RepError> {
        let mut written = Vec::new();
        for (name, paths) in &rep.raw_paths {
            let content = snapshots.get(name).ok_or_else(|| {
                kiln_common::InternalError::new(format!(
                    "{} has no content for snapshot {name}",
                    rep.reference()
                ))
            })?;
            for path in paths {
                let kind = write_one(path, content)?;
                debug!(rep = %rep.reference(), path = %path.display(), %kind, "wrote output");
                self.notifications.post(Notification::RepWritten {
                    rep: rep.reference(),
                    path: path.clone(),
                    kind,
                });
                written.push((path.clone(), kind));
            }
        }
        Ok(written)
    }
}

fn write_one(path: &Path, content: &Content) -> Result<WriteKind, RepError> {
    let write_error = |source: std::io::Error| RepError::Write {
        path: path.to_path_buf(),
        source,
    };
    let new_hash = content.checksum()?;
    let kind = if path.is_file() {
        let old_hash = ContentHash::from_file(path).map_err(write_error)?;
        if old_hash == new_hash {
            return Ok(WriteKind::Identical);
        }
        WriteKind::Updated
    } else {
        WriteKind::Created
    };

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_error)?;
    }
    match content {
        Content::Textual(_) => std::fs::write(path, content.string()?).map_err(write_error)?,
        Content::Binary { filename } => {
            std::fs::copy(filename, path).map_err(write_error)?;
        }
    }
    Ok(kind)
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;
    use kiln_model::RepName;

    use crate::notifications::NotificationLog;
    use std::rc::Rc;

    fn routed_rep(dir: &Path) -> ItemRep {
        let mut rep = ItemRep::new(Identifier::new("/a.md").unwrap(), RepName::default_rep());
        rep.raw_paths
            .insert(SnapshotName::last(), vec![dir.join("a/index.html")]);
        rep
    }

    fn snapshots(text: &str) -> BTreeMap<SnapshotName, Content> {
        BTreeMap::from([
            (SnapshotName::raw(), Content::textual("raw")),
            (SnapshotName::last(), Content::textual(text)),
        ])
    }

    #[test]
    fn created_identical_updated() {
        let dir = tempfile::tempdir().unwrap();
        let rep = routed_rep(dir.path());
        let center = NotificationCenter::new();
        let writer = ItemRepWriter::new(&center);
        let target = dir.path().join("a/index.html");

        assert_eq!(
            writer.write_all(&rep, &snapshots("one")).unwrap(),
            vec![(target.clone(), WriteKind::Created)]
        );
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "one");
        assert_eq!(
            writer.write_all(&rep, &snapshots("one")).unwrap(),
            vec![(target.clone(), WriteKind::Identical)]
        );
        assert_eq!(
            writer.write_all(&rep, &snapshots("two")).unwrap(),
            vec![(target.clone(), WriteKind::Updated)]
        );
        assert_eq!(std::fs::read_to_string(&target).unwrap(), "two");
    }

    #[test]
    fn copies_binary_content() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("source.bin");
        std::fs::write(&source, [1u8, 2, 3]).unwrap();
        let rep = routed_rep(dir.path());
        let center = NotificationCenter::new();
        let content = BTreeMap::from([(SnapshotName::last(), Content::binary(&source))]);
        ItemRepWriter::new(&center).write_all(&rep, &content).unwrap();
        assert_eq!(
            std::fs::read(dir.path().join("a/index.html")).unwrap(),
            vec![1, 2, 3]
        );
    }

    #[test]
    fn posts_notifications() {
        let dir = tempfile::tempdir().unwrap();
        let rep = routed_rep(dir.path());
        let log = Rc::new(NotificationLog::new());
        let mut center = NotificationCenter::new();
        center.subscribe(Box::new(Rc::clone(&log)));
        ItemRepWriter::new(&center)
            .write_all(&rep, &snapshots("x"))
            .unwrap();
        assert_eq!(
            log.take_all(),
            vec![Notification::RepWritten {
                rep: rep.reference(),
                path: dir.path().join("a/index.html"),
                kind: WriteKind::Created,
            }]
        );
    }

    #[test]
    fn missing_snapshot_is_an_internal_error() {
        let dir = tempfile::tempdir().unwrap();
        let rep = routed_rep(dir.path());
        let center = NotificationCenter::new();
        let err = ItemRepWriter::new(&center)
            .write_all(&rep, &BTreeMap::new())
            .unwrap_err();
        assert!(matches!(err, RepError::Internal(_)));
    }
}
