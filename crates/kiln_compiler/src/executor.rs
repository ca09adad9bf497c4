//! Running one rep's action sequence.
//!
//! The executor applies filters, layouts and snapshots strictly in order,
//! keeping the rep's current content in flight. Every filter result is also
//! stored as the `last` snapshot. Reading content another rep has not produced
//! yet interrupts the attempt; the compiler reschedules and retries it from
//! the start.

use std::collections::HashMap;
use std::path::PathBuf;

use kiln_common::ContentHash;
use kiln_model::{
    ActionSequence, Content, FilterParams, Item, ItemRepRepo, Layout, ProcessingAction, Props,
    Reference, RepId, Site, SnapshotName,
};
use kiln_rules::FilterKind;
use tracing::trace;

use crate::dependency_tracker::DependencyTracker;
use crate::error::{FilterError, RepError};
use crate::filters::{Filter, FilterContext, FilterInput, FilterOutput, FilterRegistry};
use crate::notifications::{Notification, NotificationCenter};
use crate::snapshots::SnapshotRepo;

/// Why an attempt stopped before the end of the sequence.
#[derive(Debug)]
pub(crate) enum Interrupt {
    /// The rep needs compiled content of another rep first.
    Suspend(RepId),
    /// The rep cannot be compiled.
    Failed {
        error: RepError,
        stack: Vec<Reference>,
    },
}

impl Interrupt {
    fn failed(error: impl Into<RepError>, stack: &[Reference]) -> Self {
        Interrupt::Failed {
            error: error.into(),
            stack: stack.to_vec(),
        }
    }
}

/// Runs action sequences against the site.
pub(crate) struct Executor<'a> {
    site: &'a Site,
    filters: &'a FilterRegistry,
    layout_sequences: &'a HashMap<Reference, ActionSequence>,
    notifications: &'a NotificationCenter,
    output_dir: PathBuf,
}

impl<'a> Executor<'a> {
    /// `output_dir` receives the files written by binary filters.
    pub(crate) fn new(
        site: &'a Site,
        filters: &'a FilterRegistry,
        layout_sequences: &'a HashMap<Reference, ActionSequence>,
        notifications: &'a NotificationCenter,
        output_dir: PathBuf,
    ) -> Self {
        Self {
            site,
            filters,
            layout_sequences,
            notifications,
            output_dir,
        }
    }

    /// Compiles rep `id` from scratch, leaving its snapshots in `snapshots`.
    ///
    /// Snapshots from an earlier attempt are discarded first. On suspension
    /// the snapshots taken so far stay available, so other reps can read
    /// non-moving snapshots created before the interruption.
    pub(crate) fn compile_rep(
        &self,
        id: RepId,
        sequence: &ActionSequence,
        reps: &ItemRepRepo,
        snapshots: &mut SnapshotRepo,
        tracker: &mut DependencyTracker,
    ) -> Result<(), Interrupt> {
        let rep = reps.get(id);
        let rep_ref = rep.reference();
        let mut stack = vec![rep_ref.clone()];
        let item = self
            .site
            .items()
            .get(rep.item())
            .ok_or_else(|| {
                Interrupt::failed(
                    kiln_common::InternalError::new(format!("{rep_ref} has no item")),
                    &stack,
                )
            })?;

        self.notifications.post(Notification::CompilationStarted {
            rep: rep_ref.clone(),
        });
        snapshots.remove(id);
        tracker.enter(item.reference(), Props::none());

        let mut current = item.content().clone();
        for (index, action) in sequence.actions().iter().enumerate() {
            match action {
                ProcessingAction::Filter { name, params } => {
                    let filter = self.filters.get(name).ok_or_else(|| {
                        Interrupt::failed(RepError::UnknownFilter { name: name.clone() }, &stack)
                    })?;
                    let output_path = self.output_path(&rep_ref, index, &stack)?;
                    let text = text_of(&current, &stack)?;
                    let input = match (text, &current) {
                        (Some(text), _) => FilterInput::Text(text),
                        (None, Content::Binary { filename }) => FilterInput::Binary(filename),
                        (None, Content::Textual(_)) => {
                            return Err(Interrupt::failed(
                                kiln_common::InternalError::new("textual content without text"),
                                &stack,
                            ))
                        }
                    };
                    let ctx = FilterContext::new(
                        self.site, reps, snapshots, tracker, self.notifications, item, id,
                        output_path,
                    )
                    .with_content(text);
                    current = self.run_filter(filter, input, params, ctx, &rep_ref, &stack)?;
                    snapshots.set(id, SnapshotName::last(), current.clone());
                }
                ProcessingAction::Layout { identifier, params } => {
                    let layout = self.find_layout(identifier, &stack)?;
                    stack.push(layout.reference());
                    current = self.apply_layout(
                        layout, params, &current, item, id, index, reps, snapshots, tracker,
                        &rep_ref, &stack,
                    )?;
                    stack.pop();
                    snapshots.set(id, SnapshotName::last(), current.clone());
                }
                ProcessingAction::Snapshot { names, .. } => {
                    for name in names {
                        snapshots.set(id, name.clone(), current.clone());
                        self.notifications.post(Notification::SnapshotCreated {
                            rep: rep_ref.clone(),
                            snapshot: name.clone(),
                        });
                    }
                }
            }
        }

        tracker
            .exit(&item.reference())
            .map_err(|e| Interrupt::failed(e, &stack))?;
        self.notifications
            .post(Notification::CompilationEnded { rep: rep_ref });
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    fn apply_layout(
        &self,
        layout: &'a Layout,
        params: &FilterParams,
        current: &Content,
        item: &'a Item,
        id: RepId,
        index: usize,
        reps: &ItemRepRepo,
        snapshots: &SnapshotRepo,
        tracker: &mut DependencyTracker,
        rep_ref: &Reference,
        stack: &[Reference],
    ) -> Result<Content, Interrupt> {
        if current.is_binary() {
            return Err(Interrupt::failed(
                RepError::BinaryLayout {
                    layout: layout.identifier().to_string(),
                },
                stack,
            ));
        }
        if let Some(dep) = tracker.bounce(layout.reference(), Props::raw_content()) {
            if let Some(from) = dep.from {
                self.notifications.post(Notification::DependencyCreated {
                    from,
                    to: dep.to,
                    props: dep.props,
                });
            }
        }

        let (name, rule_params) = self
            .layout_sequences
            .get(&layout.reference())
            .and_then(|seq| {
                seq.actions().iter().find_map(|a| match a {
                    ProcessingAction::Filter { name, params } => Some((name, params)),
                    _ => None,
                })
            })
            .ok_or_else(|| {
                Interrupt::failed(
                    RepError::LayoutWithoutFilter {
                        layout: layout.identifier().to_string(),
                    },
                    stack,
                )
            })?;
        let filter = self.filters.get(name).ok_or_else(|| {
            Interrupt::failed(RepError::UnknownFilter { name: name.clone() }, stack)
        })?;

        let mut merged = rule_params.clone();
        merged.extend(params.iter().map(|(k, v)| (k.clone(), v.clone())));

        let template = layout
            .content()
            .string()
            .map_err(|e| Interrupt::failed(e, stack))?;
        let output_path = self.output_path(rep_ref, index, stack)?;
        let ctx = FilterContext::new(
            self.site, reps, snapshots, tracker, self.notifications, item, id, output_path,
        )
        .with_content(text_of(current, stack)?)
        .with_layout(layout);
        let output = self.run_filter(
            filter,
            FilterInput::Text(template),
            &merged,
            ctx,
            rep_ref,
            stack,
        )?;
        if output.is_binary() {
            return Err(Interrupt::failed(
                RepError::OutputKindMismatch {
                    filter: name.clone(),
                    expected: FilterKind::Text,
                    actual: FilterKind::Binary,
                },
                stack,
            ));
        }
        Ok(output)
    }

    fn run_filter(
        &self,
        filter: &dyn Filter,
        input: FilterInput<'_>,
        params: &FilterParams,
        mut ctx: FilterContext<'_>,
        rep_ref: &Reference,
        stack: &[Reference],
    ) -> Result<Content, Interrupt> {
        let name = filter.name().to_string();
        if filter.input_kind() != input.kind() {
            return Err(Interrupt::failed(
                RepError::InputKindMismatch {
                    filter: name,
                    expected: filter.input_kind(),
                    actual: input.kind(),
                },
                stack,
            ));
        }

        self.notifications.post(Notification::FilteringStarted {
            rep: rep_ref.clone(),
            filter: name.clone(),
        });
        trace!(rep = %rep_ref, filter = %name, "running filter");
        let result = filter.run(input, params, &mut ctx);
        self.notifications.post(Notification::FilteringEnded {
            rep: rep_ref.clone(),
            filter: name.clone(),
        });
        let output = match result {
            Ok(output) => output,
            Err(FilterError::Suspended(suspension)) => {
                return Err(Interrupt::Suspend(suspension.rep))
            }
            Err(source) => {
                return Err(Interrupt::failed(
                    RepError::Filter {
                        filter: name,
                        source,
                    },
                    stack,
                ))
            }
        };
        if output.kind() != filter.output_kind() {
            return Err(Interrupt::failed(
                RepError::OutputKindMismatch {
                    filter: name,
                    expected: filter.output_kind(),
                    actual: output.kind(),
                },
                stack,
            ));
        }
        Ok(match output {
            FilterOutput::Text(text) => Content::textual(text),
            FilterOutput::Binary(path) => Content::binary(path),
        })
    }

    fn find_layout(&self, identifier: &str, stack: &[Reference]) -> Result<&'a Layout, Interrupt> {
        let kind = self.site.config().settings().string_pattern_type;
        self.site
            .layouts()
            .resolve(identifier, kind)
            .ok_or_else(|| {
                Interrupt::failed(
                    RepError::LayoutNotFound {
                        identifier: identifier.to_string(),
                    },
                    stack,
                )
            })
    }

    /// A file name unique to the rep and the action, stable across runs.
    fn output_path(
        &self,
        rep: &Reference,
        index: usize,
        stack: &[Reference],
    ) -> Result<PathBuf, Interrupt> {
        std::fs::create_dir_all(&self.output_dir).map_err(|source| {
            Interrupt::failed(
                RepError::Io {
                    path: self.output_dir.clone(),
                    source,
                },
                stack,
            )
        })?;
        let name = ContentHash::from_bytes(format!("{rep}#{index}").as_bytes());
        Ok(self.output_dir.join(name.to_string()))
    }
}

fn text_of<'c>(content: &'c Content, stack: &[Reference]) -> Result<Option<&'c str>, Interrupt> {
    if content.is_binary() {
        return Ok(None);
    }
    content
        .string()
        .map(Some)
        .map_err(|e| Interrupt::failed(e, stack))
}
