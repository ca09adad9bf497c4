//! Processing actions, action sequences and their canonical serialized form.
//!
//! An [`ActionSequence`] is what a compile rule produces for one item rep:
//! the ordered list of filters, layouts and snapshots the executor applies.
//! Its serialized form, [`RuleMemory`], is persisted between runs so that a
//! change in *procedure* can be told apart from a change in *data*.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use kiln_common::canonical_json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ModelError;
use crate::reference::SnapshotName;

/// Parameters passed to a filter or layout.
pub type FilterParams = BTreeMap<String, Value>;

/// One step of an action sequence.
#[derive(Debug, Clone, PartialEq)]
pub enum ProcessingAction {
    /// Run the named filter over the current content.
    Filter {
        /// Filter name as registered in the filter registry.
        name: String,
        /// Filter parameters.
        params: FilterParams,
    },
    /// Apply the layout matching `identifier` to the current content.
    Layout {
        /// Layout identifier or pattern, such as `/default.*`.
        identifier: String,
        /// Parameters for the layout's filter.
        params: FilterParams,
    },
    /// Record the current content under one or more snapshot names.
    Snapshot {
        /// Snapshot names, in declaration order.
        names: Vec<SnapshotName>,
        /// Output paths the snapshot is written to.
        paths: Vec<String>,
    },
}

impl ProcessingAction {
    /// Returns the canonical serialized form.
    pub fn serialize(&self) -> SerializedAction {
        match self {
            ProcessingAction::Filter { name, params } => SerializedAction::Filter {
                name: name.clone(),
                params: params_json(params),
            },
            ProcessingAction::Layout { identifier, params } => SerializedAction::Layout {
                identifier: identifier.clone(),
                params: params_json(params),
            },
            ProcessingAction::Snapshot { names, paths } => SerializedAction::Snapshot {
                names: names.clone(),
                paths: paths.clone(),
            },
        }
    }
}

fn params_json(params: &FilterParams) -> String {
    canonical_json(&Value::Object(
        params.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
    ))
}

impl fmt::Display for ProcessingAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessingAction::Filter { name, params } => {
                write!(f, "filter {name} {}", params_json(params))
            }
            ProcessingAction::Layout { identifier, params } => {
                write!(f, "layout {identifier} {}", params_json(params))
            }
            ProcessingAction::Snapshot { names, paths } => {
                let names: Vec<&str> = names.iter().map(SnapshotName::as_str).collect();
                write!(f, "snapshot [{}]", names.join(", "))?;
                if !paths.is_empty() {
                    write!(f, " -> {}", paths.join(", "))?;
                }
                Ok(())
            }
        }
    }
}

/// The comparable, persistable form of a [`ProcessingAction`].
///
/// Parameters are stored as canonical JSON so that equal parameter maps always
/// serialize to equal strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SerializedAction {
    /// A filter action.
    Filter {
        /// Filter name.
        name: String,
        /// Canonical JSON of the parameters.
        params: String,
    },
    /// A layout action.
    Layout {
        /// Layout identifier or pattern.
        identifier: String,
        /// Canonical JSON of the parameters.
        params: String,
    },
    /// A snapshot action.
    Snapshot {
        /// Snapshot names.
        names: Vec<SnapshotName>,
        /// Output paths.
        paths: Vec<String>,
    },
}

/// The serialized action sequence last used for an object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleMemory {
    actions: Vec<SerializedAction>,
}

impl RuleMemory {
    /// Wraps a list of serialized actions.
    pub fn new(actions: Vec<SerializedAction>) -> Self {
        Self { actions }
    }

    /// The serialized actions.
    pub fn actions(&self) -> &[SerializedAction] {
        &self.actions
    }

    /// Returns a copy with every snapshot path removed.
    ///
    /// Two memories with equal procedural forms run the same filters and
    /// layouts in the same order and differ at most in where output goes.
    pub fn procedural(&self) -> RuleMemory {
        RuleMemory {
            actions: self
                .actions
                .iter()
                .map(|a| match a {
                    SerializedAction::Snapshot { names, .. } => SerializedAction::Snapshot {
                        names: names.clone(),
                        paths: Vec::new(),
                    },
                    other => other.clone(),
                })
                .collect(),
        }
    }

    /// Layout identifiers (or patterns) referenced by layout actions.
    pub fn layout_identifiers(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                SerializedAction::Layout { identifier, .. } => Some(identifier.as_str()),
                _ => None,
            })
            .collect()
    }

    /// All output paths, sorted and deduplicated.
    pub fn paths(&self) -> BTreeSet<&str> {
        self.actions
            .iter()
            .flat_map(|a| match a {
                SerializedAction::Snapshot { paths, .. } => paths.as_slice(),
                _ => &[],
            })
            .map(String::as_str)
            .collect()
    }
}

/// An ordered list of processing actions for one item rep or layout.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ActionSequence {
    actions: Vec<ProcessingAction>,
}

impl ActionSequence {
    /// Creates a sequence without validating snapshot names.
    ///
    /// Use [`ActionSequenceBuilder`] when building from user rules.
    pub fn new(actions: Vec<ProcessingAction>) -> Self {
        Self { actions }
    }

    /// The actions in execution order.
    pub fn actions(&self) -> &[ProcessingAction] {
        &self.actions
    }

    /// Consumes the sequence, returning its actions.
    pub fn into_actions(self) -> Vec<ProcessingAction> {
        self.actions
    }

    /// Number of actions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// Returns true if there are no actions.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Every snapshot name declared, in order.
    pub fn snapshot_names(&self) -> Vec<&SnapshotName> {
        self.actions
            .iter()
            .flat_map(|a| match a {
                ProcessingAction::Snapshot { names, .. } => names.as_slice(),
                _ => &[],
            })
            .collect()
    }

    /// Returns true if a snapshot named `name` is declared.
    pub fn has_snapshot(&self, name: &SnapshotName) -> bool {
        self.snapshot_names().contains(&name)
    }

    /// Layout identifiers referenced, in order.
    pub fn layouts(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                ProcessingAction::Layout { identifier, .. } => Some(identifier.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Filter names referenced by filter actions, in order.
    pub fn filter_names(&self) -> Vec<&str> {
        self.actions
            .iter()
            .filter_map(|a| match a {
                ProcessingAction::Filter { name, .. } => Some(name.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The full serialized form, paths included.
    pub fn serialize(&self) -> RuleMemory {
        RuleMemory::new(self.actions.iter().map(ProcessingAction::serialize).collect())
    }
}

impl fmt::Display for ActionSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, action) in self.actions.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{action}")?;
        }
        Ok(())
    }
}

/// Builds an [`ActionSequence`], rejecting repeated snapshot names.
#[derive(Debug, Default)]
pub struct ActionSequenceBuilder {
    actions: Vec<ProcessingAction>,
    snapshot_names: BTreeSet<SnapshotName>,
}

impl ActionSequenceBuilder {
    /// Creates an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a filter action.
    pub fn add_filter(&mut self, name: impl Into<String>, params: FilterParams) -> &mut Self {
        self.actions.push(ProcessingAction::Filter {
            name: name.into(),
            params,
        });
        self
    }

    /// Appends a layout action.
    pub fn add_layout(&mut self, identifier: impl Into<String>, params: FilterParams) -> &mut Self {
        self.actions.push(ProcessingAction::Layout {
            identifier: identifier.into(),
            params,
        });
        self
    }

    /// Appends a snapshot action.
    ///
    /// Fails if a snapshot with the same name was already added.
    pub fn add_snapshot(
        &mut self,
        name: SnapshotName,
        path: Option<String>,
    ) -> Result<&mut Self, ModelError> {
        if !self.snapshot_names.insert(name.clone()) {
            return Err(ModelError::DuplicateSnapshot { name });
        }
        self.actions.push(ProcessingAction::Snapshot {
            names: vec![name],
            paths: path.into_iter().collect(),
        });
        Ok(self)
    }

    /// Returns true if a snapshot named `name` was added.
    pub fn has_snapshot(&self, name: &SnapshotName) -> bool {
        self.snapshot_names.contains(name)
    }

    /// Returns true if any layout action was added.
    pub fn has_layout(&self) -> bool {
        self.actions
            .iter()
            .any(|a| matches!(a, ProcessingAction::Layout { .. }))
    }

    /// Inserts a snapshot action at `index`.
    ///
    /// Fails if a snapshot with the same name was already added.
    pub fn insert_snapshot(
        &mut self,
        index: usize,
        name: SnapshotName,
        path: Option<String>,
    ) -> Result<&mut Self, ModelError> {
        if !self.snapshot_names.insert(name.clone()) {
            return Err(ModelError::DuplicateSnapshot { name });
        }
        self.actions.insert(
            index,
            ProcessingAction::Snapshot {
                names: vec![name],
                paths: path.into_iter().collect(),
            },
        );
        Ok(self)
    }

    /// Finishes the sequence.
    pub fn build(self) -> ActionSequence {
        ActionSequence::new(self.actions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(pairs: &[(&str, Value)]) -> FilterParams {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn duplicate_snapshot_names_rejected() {
        let mut b = ActionSequenceBuilder::new();
        b.add_snapshot(SnapshotName::new("a"), None).unwrap();
        let err = b.add_snapshot(SnapshotName::new("a"), None).unwrap_err();
        assert!(matches!(err, ModelError::DuplicateSnapshot { name } if name.as_str() == "a"));
    }

    #[test]
    fn distinct_snapshot_names_accepted() {
        let mut b = ActionSequenceBuilder::new();
        b.add_snapshot(SnapshotName::new("a"), None).unwrap();
        b.add_snapshot(SnapshotName::new("b"), Some("/b.html".into()))
            .unwrap();
        let seq = b.build();
        assert_eq!(seq.len(), 2);
        assert!(seq.has_snapshot(&SnapshotName::new("b")));
    }

    #[test]
    fn serialized_params_are_canonical() {
        let a = ProcessingAction::Filter {
            name: "erb".into(),
            params: params(&[("b", json!(1)), ("a", json!({"y": 2, "x": 1}))]),
        };
        assert_eq!(
            a.serialize(),
            SerializedAction::Filter {
                name: "erb".into(),
                params: r#"{"a":{"x":1,"y":2},"b":1}"#.into(),
            }
        );
    }

    #[test]
    fn procedural_form_strips_paths() {
        let mut b = ActionSequenceBuilder::new();
        b.add_filter("erb", FilterParams::new());
        b.add_snapshot(SnapshotName::last(), Some("/a/index.html".into()))
            .unwrap();
        let full = b.build().serialize();

        let mut b2 = ActionSequenceBuilder::new();
        b2.add_filter("erb", FilterParams::new());
        b2.add_snapshot(SnapshotName::last(), Some("/a.html".into()))
            .unwrap();
        let moved = b2.build().serialize();

        assert_ne!(full, moved);
        assert_eq!(full.procedural(), moved.procedural());
        assert_eq!(full.paths().into_iter().collect::<Vec<_>>(), vec!["/a/index.html"]);
    }

    #[test]
    fn layouts_and_filters_listed() {
        let mut b = ActionSequenceBuilder::new();
        b.add_filter("erb", FilterParams::new())
            .add_layout("/default.*", FilterParams::new())
            .add_filter("typohero", FilterParams::new());
        assert!(b.has_layout());
        let seq = b.build();
        assert_eq!(seq.layouts(), vec!["/default.*"]);
        assert_eq!(seq.filter_names(), vec!["erb", "typohero"]);
        assert_eq!(seq.serialize().layout_identifiers(), vec!["/default.*"]);
    }

    #[test]
    fn insert_snapshot_before_layout() {
        let mut b = ActionSequenceBuilder::new();
        b.add_filter("erb", FilterParams::new())
            .add_layout("/default.*", FilterParams::new());
        b.insert_snapshot(1, SnapshotName::pre(), None).unwrap();
        let seq = b.build();
        assert!(matches!(
            &seq.actions()[1],
            ProcessingAction::Snapshot { names, .. } if names == &vec![SnapshotName::pre()]
        ));
    }

    #[test]
    fn display_lists_actions() {
        let mut b = ActionSequenceBuilder::new();
        b.add_filter("erb", FilterParams::new());
        b.add_snapshot(SnapshotName::last(), Some("/a.html".into()))
            .unwrap();
        assert_eq!(
            b.build().to_string(),
            "filter erb {}\nsnapshot [last] -> /a.html"
        );
    }
}
