//! The view of the site a running filter gets.

use std::path::{Path, PathBuf};

use kiln_common::Attributes;
use kiln_model::{
    Item, ItemRep, ItemRepRepo, Layout, Props, Reference, RepId, RepName, Site, SnapshotName,
};
use serde_json::{Map, Value};

use crate::dependency_tracker::DependencyTracker;
use crate::error::{FilterError, Suspension};
use crate::notifications::{Notification, NotificationCenter};
use crate::snapshots::SnapshotRepo;

/// Read-only access to the site for a running filter.
///
/// Every accessor that reads another object records a dependency on it.
/// Accessors for compiled content return [`FilterError::Suspended`] when the
/// content is not available yet; filters should pass that error on.
pub struct FilterContext<'a> {
    site: &'a Site,
    reps: &'a ItemRepRepo,
    snapshots: &'a SnapshotRepo,
    tracker: &'a mut DependencyTracker,
    notifications: &'a NotificationCenter,
    item: &'a Item,
    rep: RepId,
    content: Option<&'a str>,
    layout: Option<&'a Layout>,
    output_path: PathBuf,
}

impl<'a> FilterContext<'a> {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        site: &'a Site,
        reps: &'a ItemRepRepo,
        snapshots: &'a SnapshotRepo,
        tracker: &'a mut DependencyTracker,
        notifications: &'a NotificationCenter,
        item: &'a Item,
        rep: RepId,
        output_path: PathBuf,
    ) -> Self {
        Self {
            site,
            reps,
            snapshots,
            tracker,
            notifications,
            item,
            rep,
            content: None,
            layout: None,
            output_path,
        }
    }

    /// Exposes the item's current text as the `content` assign.
    pub(crate) fn with_content(mut self, content: Option<&'a str>) -> Self {
        self.content = content;
        self
    }

    /// Marks this filter call as rendering `layout`.
    pub(crate) fn with_layout(mut self, layout: &'a Layout) -> Self {
        self.layout = Some(layout);
        self
    }

    /// The item being compiled.
    pub fn item(&self) -> &'a Item {
        self.item
    }

    /// The rep being compiled.
    pub fn rep(&self) -> &'a ItemRep {
        self.reps.get(self.rep)
    }

    /// The layout being rendered, when called through `layout`.
    pub fn layout(&self) -> Option<&'a Layout> {
        self.layout
    }

    /// Where a filter producing binary output should write it.
    pub fn output_path(&self) -> &Path {
        &self.output_path
    }

    /// Looks up an assign by name.
    ///
    /// - `content`: the item's current text
    /// - `item`: the item's attributes plus `identifier`
    /// - `rep`: `name` and `path` of the rep
    /// - `layout`: the layout's attributes plus `identifier`
    /// - `config`: the site configuration
    pub fn get(&mut self, key: &str) -> Option<Value> {
        match key {
            "content" => self.content.map(Value::from),
            "item" => Some(document_value(
                self.item.identifier().as_str(),
                self.item.attributes(),
            )),
            "rep" => {
                let rep = self.rep();
                let mut map = Map::new();
                map.insert("name".into(), Value::from(rep.name().as_str()));
                map.insert(
                    "path".into(),
                    rep.path(&SnapshotName::last())
                        .map(Value::from)
                        .unwrap_or(Value::Null),
                );
                Some(Value::Object(map))
            }
            "layout" => {
                let layout = self.layout?;
                self.depend_on(layout.reference(), Props::attributes());
                Some(document_value(
                    layout.identifier().as_str(),
                    layout.attributes(),
                ))
            }
            "config" => {
                let config = self.site.config();
                self.depend_on(config.reference(), Props::attributes());
                Some(Value::Object(
                    config
                        .attributes()
                        .iter()
                        .map(|(k, v)| (k.clone(), v.clone()))
                        .collect(),
                ))
            }
            _ => None,
        }
    }

    /// The attributes of another item.
    pub fn attributes_of(&mut self, identifier: &str) -> Result<Attributes, FilterError> {
        let item = self.find_item(identifier)?;
        self.depend_on(item.reference(), Props::attributes());
        Ok(item.attributes().clone())
    }

    /// The raw content of another item.
    pub fn raw_content_of(&mut self, identifier: &str) -> Result<String, FilterError> {
        let item = self.find_item(identifier)?;
        self.depend_on(item.reference(), Props::raw_content());
        Ok(item.content().string()?.to_string())
    }

    /// The public path of the `last` snapshot of rep `rep` of another item.
    pub fn path_of(&mut self, identifier: &str, rep: &str) -> Result<Option<String>, FilterError> {
        let item = self.find_item(identifier)?;
        self.depend_on(item.reference(), Props::path());
        let id = self.find_rep(item, rep)?;
        Ok(self
            .reps
            .get(id)
            .path(&SnapshotName::last())
            .map(str::to_string))
    }

    /// The compiled text of snapshot `snapshot` of rep `rep` of another item.
    ///
    /// Without a snapshot name, `pre` is used when the rep declares it and
    /// `last` otherwise. The moving snapshots `pre`, `post` and `last` are
    /// only available once the rep is fully compiled; other snapshots as
    /// soon as they exist.
    pub fn compiled_content_of(
        &mut self,
        identifier: &str,
        rep: &str,
        snapshot: Option<&str>,
    ) -> Result<String, FilterError> {
        let item = self.find_item(identifier)?;
        self.depend_on(item.reference(), Props::compiled_content());
        let id = self.find_rep(item, rep)?;
        let target = self.reps.get(id);

        let snapshot = match snapshot {
            Some(name) => SnapshotName::new(name),
            None if target.has_snapshot(&SnapshotName::pre()) => SnapshotName::pre(),
            None => SnapshotName::last(),
        };
        let def = target
            .snapshot_def(&snapshot)
            .ok_or_else(|| FilterError::NoSuchSnapshot {
                rep: target.reference(),
                snapshot: snapshot.clone(),
            })?;

        let moving = snapshot == SnapshotName::pre()
            || snapshot == SnapshotName::post()
            || snapshot == SnapshotName::last();
        let usable = target.compiled || (!moving && self.snapshots.contains(id, &snapshot));
        if !usable {
            return Err(FilterError::Suspended(Suspension { rep: id }));
        }
        if def.binary {
            return Err(FilterError::BinaryContent {
                rep: target.reference(),
                snapshot,
            });
        }
        let content = self
            .snapshots
            .get(id, &snapshot)
            .ok_or_else(|| FilterError::NoSuchSnapshot {
                rep: target.reference(),
                snapshot: snapshot.clone(),
            })?;
        Ok(content.string()?.to_string())
    }

    fn find_item(&self, identifier: &str) -> Result<&'a Item, FilterError> {
        let kind = self.site.config().settings().string_pattern_type;
        self.site
            .items()
            .resolve(identifier, kind)
            .ok_or_else(|| FilterError::NoSuchItem {
                identifier: identifier.to_string(),
            })
    }

    fn find_rep(&self, item: &Item, rep: &str) -> Result<RepId, FilterError> {
        self.reps
            .find(item.identifier(), &RepName::new(rep))
            .ok_or_else(|| FilterError::NoSuchRep {
                identifier: item.identifier().to_string(),
                rep: rep.to_string(),
            })
    }

    fn depend_on(&mut self, object: Reference, props: Props) {
        if let Some(dep) = self.tracker.bounce(object, props) {
            if let Some(from) = dep.from {
                self.notifications.post(Notification::DependencyCreated {
                    from,
                    to: dep.to,
                    props: dep.props,
                });
            }
        }
    }
}

fn document_value(identifier: &str, attributes: &Attributes) -> Value {
    let mut map: Map<String, Value> = attributes
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    map.insert("identifier".into(), Value::from(identifier));
    Value::Object(map)
}
