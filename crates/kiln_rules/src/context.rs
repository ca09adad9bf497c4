//! The contexts rule bodies run against.
//!
//! A compilation rule never filters anything itself. Its calls are recorded
//! as [`ProcessingAction`](kiln_model::ProcessingAction)s, and the executor
//! replays them later.

use kiln_model::{
    ActionSequenceBuilder, Configuration, FilterParams, Item, ModelError, RepName, SnapshotName,
};

use crate::error::RuleError;

/// The recording context passed to compilation rule bodies.
pub struct RuleContext<'a> {
    item: &'a Item,
    rep_name: &'a RepName,
    config: &'a Configuration,
    builder: ActionSequenceBuilder,
    writes: usize,
}

impl<'a> RuleContext<'a> {
    pub(crate) fn new(
        item: &'a Item,
        rep_name: &'a RepName,
        config: &'a Configuration,
        builder: ActionSequenceBuilder,
    ) -> Self {
        Self {
            item,
            rep_name,
            config,
            builder,
            writes: 0,
        }
    }

    /// The item being compiled.
    pub fn item(&self) -> &'a Item {
        self.item
    }

    /// The name of the rep being compiled.
    pub fn rep_name(&self) -> &'a RepName {
        self.rep_name
    }

    /// The site configuration.
    pub fn config(&self) -> &'a Configuration {
        self.config
    }

    /// Records a filter call.
    pub fn filter(&mut self, name: &str, params: FilterParams) {
        self.builder.add_filter(name, params);
    }

    /// Records a layout call.
    ///
    /// The first layout is preceded by an implicit `pre` snapshot unless the
    /// rule already declared one.
    pub fn layout(&mut self, identifier: &str, params: FilterParams) -> Result<(), RuleError> {
        if !identifier.starts_with('/') {
            return Err(RuleError::InvalidLayoutIdentifier {
                identifier: identifier.to_string(),
            });
        }
        if !self.builder.has_layout() && !self.builder.has_snapshot(&SnapshotName::pre()) {
            self.add_snapshot(SnapshotName::pre(), None)?;
        }
        self.builder.add_layout(identifier, params);
        Ok(())
    }

    /// Records a named snapshot, optionally written to `path`.
    pub fn snapshot(&mut self, name: &str, path: Option<&str>) -> Result<(), RuleError> {
        if let Some(path) = path {
            self.check_path(path)?;
        }
        self.add_snapshot(SnapshotName::new(name), path.map(str::to_string))
    }

    /// Writes the current content to `path`, through an auto-named snapshot.
    pub fn write_path(&mut self, path: &str) -> Result<(), RuleError> {
        self.check_path(path)?;
        let name = SnapshotName::write(self.writes);
        self.writes += 1;
        self.add_snapshot(name, Some(path.to_string()))
    }

    /// Writes the current content next to the item, with extension `ext`.
    pub fn write_ext(&mut self, ext: &str) -> Result<(), RuleError> {
        let ext = ext.trim_start_matches('.');
        let path = format!("{}.{}", self.item.identifier().without_ext(), ext);
        self.write_path(&path)
    }

    pub(crate) fn into_builder(self) -> ActionSequenceBuilder {
        self.builder
    }

    fn add_snapshot(&mut self, name: SnapshotName, path: Option<String>) -> Result<(), RuleError> {
        let added = self.builder.add_snapshot(name, path).map(|_| ());
        added.map_err(|e| self.rep_error(e))
    }

    fn check_path(&self, path: &str) -> Result<(), RuleError> {
        if path.starts_with('/') {
            Ok(())
        } else {
            Err(RuleError::RouteWithoutSlash {
                rep: self.rep_label(),
                path: path.to_string(),
            })
        }
    }

    fn rep_error(&self, err: ModelError) -> RuleError {
        match err {
            ModelError::DuplicateSnapshot { name } => RuleError::DuplicateSnapshot {
                rep: self.rep_label(),
                name,
            },
            other => RuleError::Custom(other.to_string()),
        }
    }

    fn rep_label(&self) -> String {
        format!("{} ({})", self.item.identifier(), self.rep_name)
    }
}

/// The read-only context passed to routing rule bodies.
pub struct RouteContext<'a> {
    pub(crate) item: &'a Item,
    pub(crate) rep_name: &'a RepName,
    pub(crate) snapshot: &'a SnapshotName,
    pub(crate) config: &'a Configuration,
}

impl<'a> RouteContext<'a> {
    /// The item being routed.
    pub fn item(&self) -> &'a Item {
        self.item
    }

    /// The name of the rep being routed.
    pub fn rep_name(&self) -> &'a RepName {
        self.rep_name
    }

    /// The snapshot being routed.
    pub fn snapshot(&self) -> &'a SnapshotName {
        self.snapshot
    }

    /// The site configuration.
    pub fn config(&self) -> &'a Configuration {
        self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::{Attributes, Identifier};
    use kiln_model::{Content, Document, ProcessingAction};

    fn item() -> Item {
        Item::new(Document::new(
            Identifier::new("/blog/post.md").unwrap(),
            Content::textual("x"),
            Attributes::new(),
        ))
    }

    fn with_context(f: impl FnOnce(&mut RuleContext<'_>)) -> Vec<ProcessingAction> {
        let item = item();
        let rep = RepName::default_rep();
        let config = Configuration::default();
        let mut ctx = RuleContext::new(&item, &rep, &config, ActionSequenceBuilder::new());
        f(&mut ctx);
        ctx.into_builder().build().into_actions()
    }

    #[test]
    fn layout_injects_pre_once() {
        let actions = with_context(|ctx| {
            ctx.layout("/a.*", FilterParams::new()).unwrap();
            ctx.layout("/b.*", FilterParams::new()).unwrap();
        });
        assert_eq!(actions.len(), 3);
        assert!(matches!(
            &actions[0],
            ProcessingAction::Snapshot { names, .. } if names == &[SnapshotName::pre()]
        ));
    }

    #[test]
    fn explicit_pre_suppresses_implicit_one() {
        let actions = with_context(|ctx| {
            ctx.snapshot("pre", None).unwrap();
            ctx.filter("erb", FilterParams::new());
            ctx.layout("/a.*", FilterParams::new()).unwrap();
        });
        assert_eq!(actions.len(), 3);
        assert!(matches!(&actions[2], ProcessingAction::Layout { .. }));
    }

    #[test]
    fn layout_requires_slash() {
        with_context(|ctx| {
            let err = ctx.layout("default", FilterParams::new()).unwrap_err();
            assert!(matches!(err, RuleError::InvalidLayoutIdentifier { .. }));
        });
    }

    #[test]
    fn writes_get_numbered_snapshots() {
        let actions = with_context(|ctx| {
            ctx.write_path("/a/index.html").unwrap();
            ctx.write_ext("json").unwrap();
        });
        assert_eq!(
            actions,
            vec![
                ProcessingAction::Snapshot {
                    names: vec![SnapshotName::new("_0")],
                    paths: vec!["/a/index.html".into()],
                },
                ProcessingAction::Snapshot {
                    names: vec![SnapshotName::new("_1")],
                    paths: vec!["/blog/post.json".into()],
                },
            ]
        );
    }

    #[test]
    fn write_without_slash_rejected() {
        with_context(|ctx| {
            let err = ctx.write_path("a.html").unwrap_err();
            assert!(matches!(err, RuleError::RouteWithoutSlash { .. }));
        });
    }

    #[test]
    fn duplicate_snapshot_names_rep() {
        with_context(|ctx| {
            ctx.snapshot("foo", None).unwrap();
            let err = ctx.snapshot("foo", None).unwrap_err();
            assert_eq!(
                err.to_string(),
                "snapshot 'foo' is declared more than once for /blog/post.md (default)"
            );
        });
    }
}
