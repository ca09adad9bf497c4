//! Assigning output paths to reps.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use kiln_config::SiteConfig;
use kiln_model::{ActionSequence, ItemRep, ProcessingAction, Reference};

use crate::error::CompileError;

/// Fills in `raw_paths` and `paths` of reps from their snapshot actions.
///
/// The raw path is the route below the output directory. The public path is
/// the route with a trailing index filename removed when
/// `strip_index_filenames` is on.
#[derive(Debug)]
pub struct ItemRepRouter<'a> {
    config: &'a SiteConfig,
    output_dir: PathBuf,
    assigned: BTreeMap<String, Reference>,
}

impl<'a> ItemRepRouter<'a> {
    /// Creates a router writing below `output_dir`.
    pub fn new(config: &'a SiteConfig, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            config,
            output_dir: output_dir.into(),
            assigned: BTreeMap::new(),
        }
    }

    /// Routes `rep` according to `sequence`.
    ///
    /// Fails if another rep was already routed to one of the paths.
    pub fn route(&mut self, rep: &mut ItemRep, sequence: &ActionSequence) -> Result<(), CompileError> {
        let reference = rep.reference();
        rep.raw_paths.clear();
        rep.paths.clear();
        for action in sequence.actions() {
            let ProcessingAction::Snapshot { names, paths } = action else {
                continue;
            };
            if paths.is_empty() {
                continue;
            }
            for path in paths {
                match self.assigned.get(path) {
                    Some(first) if *first != reference => {
                        return Err(CompileError::IdenticalRoutes {
                            path: path.clone(),
                            first: first.clone(),
                            second: reference,
                        })
                    }
                    Some(_) => {}
                    None => {
                        self.assigned.insert(path.clone(), reference.clone());
                    }
                }
            }
            for name in names {
                rep.raw_paths.insert(
                    name.clone(),
                    paths.iter().map(|p| self.raw_path(p)).collect(),
                );
                rep.paths.insert(
                    name.clone(),
                    paths.iter().map(|p| self.public_path(p)).collect(),
                );
            }
        }
        Ok(())
    }

    fn raw_path(&self, path: &str) -> PathBuf {
        self.output_dir.join(path.trim_start_matches('/'))
    }

    fn public_path(&self, path: &str) -> String {
        if !self.config.strip_index_filenames {
            return path.to_string();
        }
        let basename = Path::new(path)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        if self.config.index_filenames.iter().any(|i| i == basename) {
            path[..path.len() - basename.len()].to_string()
        } else {
            path.to_string()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;
    use kiln_model::{RepName, SnapshotName};

    fn rep(id: &str, name: &str) -> ItemRep {
        ItemRep::new(Identifier::new(id).unwrap(), RepName::new(name))
    }

    fn routed(paths: &[(&str, &str)]) -> ActionSequence {
        ActionSequence::new(
            paths
                .iter()
                .map(|(name, path)| ProcessingAction::Snapshot {
                    names: vec![SnapshotName::new(*name)],
                    paths: vec![path.to_string()],
                })
                .collect(),
        )
    }

    #[test]
    fn assigns_raw_and_public_paths() {
        let config = SiteConfig::default();
        let mut router = ItemRepRouter::new(&config, "/site/output");
        let mut about = rep("/about.md", "default");
        router
            .route(&mut about, &routed(&[("last", "/about/index.html")]))
            .unwrap();
        assert_eq!(
            about.raw_path(&SnapshotName::last()),
            Some(&PathBuf::from("/site/output/about/index.html"))
        );
        assert_eq!(about.path(&SnapshotName::last()), Some("/about/"));
    }

    #[test]
    fn keeps_index_filenames_when_not_stripping() {
        let config = SiteConfig {
            strip_index_filenames: false,
            ..SiteConfig::default()
        };
        let mut router = ItemRepRouter::new(&config, "out");
        let mut about = rep("/about.md", "default");
        router
            .route(&mut about, &routed(&[("last", "/about/index.html")]))
            .unwrap();
        assert_eq!(about.path(&SnapshotName::last()), Some("/about/index.html"));
    }

    #[test]
    fn unrouted_snapshots_have_no_paths() {
        let config = SiteConfig::default();
        let mut router = ItemRepRouter::new(&config, "out");
        let mut draft = rep("/draft.md", "default");
        let sequence = ActionSequence::new(vec![ProcessingAction::Snapshot {
            names: vec![SnapshotName::raw(), SnapshotName::last()],
            paths: vec![],
        }]);
        router.route(&mut draft, &sequence).unwrap();
        assert_eq!(draft.raw_path(&SnapshotName::last()), None);
        assert_eq!(draft.path(&SnapshotName::last()), None);
    }

    #[test]
    fn identical_routes_are_rejected() {
        let config = SiteConfig::default();
        let mut router = ItemRepRouter::new(&config, "out");
        let mut a = rep("/a.md", "default");
        let mut b = rep("/b.md", "default");
        router.route(&mut a, &routed(&[("last", "/x.html")])).unwrap();
        let err = router
            .route(&mut b, &routed(&[("last", "/x.html")]))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "item_rep:/a.md:default and item_rep:/b.md:default are both routed to /x.html"
        );
    }

    #[test]
    fn one_rep_may_write_a_path_from_two_snapshots() {
        let config = SiteConfig::default();
        let mut router = ItemRepRouter::new(&config, "out");
        let mut a = rep("/a.md", "default");
        router
            .route(&mut a, &routed(&[("pre", "/a.html"), ("last", "/a.html")]))
            .unwrap();
        assert_eq!(a.raw_paths.len(), 2);
    }
}
