//! Computing action sequences and snapshot definitions from rules.

use kiln_model::{
    ActionSequence, ActionSequenceBuilder, Configuration, Item, Layout, ProcessingAction,
    RepName, SnapshotDef, SnapshotName,
};
use tracing::trace;

use crate::collection::RuleCollection;
use crate::compact::compact_snapshots;
use crate::context::RuleContext;
use crate::error::RuleError;
use crate::filters::{FilterKind, FilterLookup};

/// Evaluates rules into action sequences.
///
/// Deterministic: the same rules and objects always give the same sequence.
pub struct ActionSequenceCalculator<'a> {
    rules: &'a RuleCollection,
    filters: &'a dyn FilterLookup,
    config: &'a Configuration,
}

impl<'a> ActionSequenceCalculator<'a> {
    /// Creates a calculator over `rules`.
    pub fn new(
        rules: &'a RuleCollection,
        filters: &'a dyn FilterLookup,
        config: &'a Configuration,
    ) -> Self {
        Self {
            rules,
            filters,
            config,
        }
    }

    /// The action sequence of rep `rep_name` of `item`.
    ///
    /// The sequence starts with a `raw` snapshot and always contains `last`
    /// and `pre` snapshots, plus `post` after the last layout if there is one.
    /// Adjacent snapshots are merged, and snapshots without explicit paths get
    /// them from routing rules.
    pub fn action_sequence_for_rep(
        &self,
        item: &Item,
        rep_name: &RepName,
    ) -> Result<ActionSequence, RuleError> {
        let rule = self
            .rules
            .compilation_rule_for(item.identifier(), rep_name)
            .ok_or_else(|| RuleError::NoApplicableRule {
                rep: format!("{} ({})", item.identifier(), rep_name),
            })?;

        let mut builder = ActionSequenceBuilder::new();
        builder
            .add_snapshot(SnapshotName::raw(), None)
            .map_err(|e| RuleError::Custom(e.to_string()))?;

        let mut ctx = RuleContext::new(item, rep_name, self.config, builder);
        rule.apply(&mut ctx)?;
        let mut builder = ctx.into_builder();

        let duplicate = |name: SnapshotName| RuleError::DuplicateSnapshot {
            rep: format!("{} ({})", item.identifier(), rep_name),
            name,
        };
        if builder.has_layout() {
            builder
                .add_snapshot(SnapshotName::post(), None)
                .map_err(|_| duplicate(SnapshotName::post()))?;
        }
        if !builder.has_snapshot(&SnapshotName::last()) {
            builder
                .add_snapshot(SnapshotName::last(), None)
                .map_err(|_| duplicate(SnapshotName::last()))?;
        }
        if !builder.has_snapshot(&SnapshotName::pre()) {
            builder
                .add_snapshot(SnapshotName::pre(), None)
                .map_err(|_| duplicate(SnapshotName::pre()))?;
        }

        let actions = compact_snapshots(builder.build().into_actions());
        let actions = self.copy_paths_from_routing_rules(actions, item, rep_name)?;
        let sequence = ActionSequence::new(actions);
        trace!(item = %item.identifier(), rep = %rep_name, actions = sequence.len(), "computed action sequence");
        Ok(sequence)
    }

    /// The action sequence of `layout`: one filter action from its layout rule.
    pub fn action_sequence_for_layout(&self, layout: &Layout) -> Result<ActionSequence, RuleError> {
        let rule = self
            .rules
            .layout_rule_for(layout.identifier())
            .ok_or_else(|| RuleError::NoApplicableLayoutRule {
                layout: layout.identifier().clone(),
            })?;
        Ok(ActionSequence::new(vec![ProcessingAction::Filter {
            name: rule.filter().to_string(),
            params: rule.params().clone(),
        }]))
    }

    /// Works out which snapshots of a rep hold binary content.
    ///
    /// Content starts out binary if the item is. A filter switches to its
    /// declared output kind; a layout always produces text.
    pub fn snapshot_defs_for(&self, item: &Item, sequence: &ActionSequence) -> Vec<SnapshotDef> {
        let mut binary = item.content().is_binary();
        let mut defs = Vec::new();
        for action in sequence.actions() {
            match action {
                ProcessingAction::Filter { name, .. } => {
                    if let Some((_, output)) = self.filters.filter_kinds(name) {
                        binary = output == FilterKind::Binary;
                    }
                }
                ProcessingAction::Layout { .. } => binary = false,
                ProcessingAction::Snapshot { names, .. } => {
                    defs.extend(names.iter().map(|n| SnapshotDef::new(n.clone(), binary)));
                }
            }
        }
        defs
    }

    fn copy_paths_from_routing_rules(
        &self,
        actions: Vec<ProcessingAction>,
        item: &Item,
        rep_name: &RepName,
    ) -> Result<Vec<ProcessingAction>, RuleError> {
        actions
            .into_iter()
            .map(|action| match action {
                ProcessingAction::Snapshot { names, paths } if paths.is_empty() => {
                    let mut routed = Vec::new();
                    for name in &names {
                        if let Some(path) =
                            self.rules.route_for(item, rep_name, name, self.config)?
                        {
                            routed.push(path);
                        }
                    }
                    Ok(ProcessingAction::Snapshot {
                        names,
                        paths: routed,
                    })
                }
                other => Ok(other),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    use kiln_common::{Attributes, Identifier, Pattern};
    use kiln_model::{Content, Document, FilterParams};

    struct Kinds(HashMap<&'static str, (FilterKind, FilterKind)>);

    impl FilterLookup for Kinds {
        fn filter_kinds(&self, name: &str) -> Option<(FilterKind, FilterKind)> {
            self.0.get(name).copied()
        }
    }

    fn kinds() -> Kinds {
        Kinds(HashMap::from([
            ("erb", (FilterKind::Text, FilterKind::Text)),
            ("typohero", (FilterKind::Text, FilterKind::Text)),
            ("thumbnail", (FilterKind::Binary, FilterKind::Binary)),
            ("base64", (FilterKind::Binary, FilterKind::Text)),
        ]))
    }

    fn item(id: &str, binary: bool) -> Item {
        let content = if binary {
            Content::binary("/tmp/x.png")
        } else {
            Content::textual("hi")
        };
        Item::new(Document::new(Identifier::new(id).unwrap(), content, Attributes::new()))
    }

    fn glob(s: &str) -> Pattern {
        Pattern::glob(s).unwrap()
    }

    fn snap(names: &[&str], paths: &[&str]) -> ProcessingAction {
        ProcessingAction::Snapshot {
            names: names.iter().map(|n| SnapshotName::new(*n)).collect(),
            paths: paths.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn filter(name: &str) -> ProcessingAction {
        ProcessingAction::Filter {
            name: name.into(),
            params: FilterParams::new(),
        }
    }

    #[test]
    fn filter_layout_filter_gives_six_actions() {
        let mut rules = RuleCollection::new();
        rules.compile(glob("/foo.md"), RepName::default_rep(), |ctx| {
            ctx.filter("erb", FilterParams::new());
            ctx.layout("/default.*", FilterParams::new())?;
            ctx.filter("typohero", FilterParams::new());
            Ok(())
        });
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);
        let seq = calc
            .action_sequence_for_rep(&item("/foo.md", false), &RepName::default_rep())
            .unwrap();

        assert_eq!(
            seq.actions(),
            &[
                snap(&["raw"], &[]),
                filter("erb"),
                snap(&["pre"], &[]),
                ProcessingAction::Layout {
                    identifier: "/default.*".into(),
                    params: FilterParams::new(),
                },
                filter("typohero"),
                snap(&["post", "last"], &[]),
            ]
        );
    }

    #[test]
    fn empty_rule_coalesces_into_one_snapshot() {
        let mut rules = RuleCollection::new();
        rules.compile(glob("/**/*"), RepName::default_rep(), |_| Ok(()));
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);
        let seq = calc
            .action_sequence_for_rep(&item("/a.md", false), &RepName::default_rep())
            .unwrap();
        assert_eq!(seq.actions(), &[snap(&["raw", "last", "pre"], &[])]);
    }

    #[test]
    fn routing_rules_fill_missing_paths() {
        let mut rules = RuleCollection::new();
        rules
            .compile(glob("/**/*"), RepName::default_rep(), |ctx| {
                ctx.filter("erb", FilterParams::new());
                ctx.write_path("/explicit.html")
            })
            .route(
                glob("/**/*"),
                RepName::default_rep(),
                SnapshotName::last(),
                |ctx| Ok(Some(format!("{}.html", ctx.item().identifier().without_ext()))),
            );
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);
        let seq = calc
            .action_sequence_for_rep(&item("/a.md", false), &RepName::default_rep())
            .unwrap();
        assert_eq!(
            seq.actions(),
            &[
                snap(&["raw"], &[]),
                filter("erb"),
                snap(&["_0", "last", "pre"], &["/explicit.html"]),
            ]
        );
        assert_eq!(
            seq.serialize().paths().into_iter().collect::<Vec<_>>(),
            vec!["/explicit.html"]
        );
    }

    #[test]
    fn routed_snapshot_without_explicit_path() {
        let mut rules = RuleCollection::new();
        rules
            .compile(glob("/**/*"), RepName::default_rep(), |ctx| {
                ctx.filter("erb", FilterParams::new());
                Ok(())
            })
            .route(
                glob("/**/*"),
                RepName::default_rep(),
                SnapshotName::last(),
                |_| Ok(Some("/a/index.html".into())),
            );
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);
        let seq = calc
            .action_sequence_for_rep(&item("/a.md", false), &RepName::default_rep())
            .unwrap();
        assert_eq!(seq.actions()[2], snap(&["last", "pre"], &["/a/index.html"]));
    }

    #[test]
    fn no_rule_is_an_error() {
        let rules = RuleCollection::new();
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);
        let err = calc
            .action_sequence_for_rep(&item("/a.md", false), &RepName::default_rep())
            .unwrap_err();
        assert!(matches!(err, RuleError::NoApplicableRule { .. }));
    }

    #[test]
    fn explicit_post_with_layout_is_duplicate() {
        let mut rules = RuleCollection::new();
        rules.compile(glob("/**/*"), RepName::default_rep(), |ctx| {
            ctx.layout("/default.*", FilterParams::new())?;
            ctx.snapshot("post", None)
        });
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);
        let err = calc
            .action_sequence_for_rep(&item("/a.md", false), &RepName::default_rep())
            .unwrap_err();
        assert!(matches!(err, RuleError::DuplicateSnapshot { .. }));
    }

    #[test]
    fn layout_sequences() {
        let mut rules = RuleCollection::new();
        let mut params = FilterParams::new();
        params.insert("mode".into(), serde_json::json!("strict"));
        rules.layout(glob("/**/*.html"), "template", params.clone());
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);

        let layout = Layout::new(Document::new(
            Identifier::new("/default.html").unwrap(),
            Content::textual("{{content}}"),
            Attributes::new(),
        ));
        assert_eq!(
            calc.action_sequence_for_layout(&layout).unwrap().actions(),
            &[ProcessingAction::Filter {
                name: "template".into(),
                params,
            }]
        );

        let other = Layout::new(Document::new(
            Identifier::new("/feed.xml").unwrap(),
            Content::textual(""),
            Attributes::new(),
        ));
        assert!(matches!(
            calc.action_sequence_for_layout(&other),
            Err(RuleError::NoApplicableLayoutRule { .. })
        ));
    }

    #[test]
    fn snapshot_defs_follow_filter_kinds() {
        let mut rules = RuleCollection::new();
        rules.compile(glob("/**/*"), RepName::default_rep(), |ctx| {
            ctx.filter("thumbnail", FilterParams::new());
            ctx.snapshot("thumb", None)?;
            ctx.filter("base64", FilterParams::new());
            Ok(())
        });
        let (filters, config) = (kinds(), Configuration::default());
        let calc = ActionSequenceCalculator::new(&rules, &filters, &config);
        let it = item("/logo.png", true);
        let seq = calc
            .action_sequence_for_rep(&it, &RepName::default_rep())
            .unwrap();
        let defs = calc.snapshot_defs_for(&it, &seq);
        let by_name = |n: &str| {
            defs.iter()
                .find(|d| d.name == SnapshotName::new(n))
                .unwrap()
                .binary
        };
        assert!(by_name("raw"));
        assert!(by_name("thumb"));
        assert!(!by_name("last"));
        assert!(!by_name("pre"));
    }
}
