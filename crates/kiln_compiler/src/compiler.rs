//! The compilation run.
//!
//! A run goes through these phases:
//!
//! 1. build the reps of every item and compute their action sequences,
//!    snapshot definitions and routes;
//! 2. load the stores of the previous run and compute fresh checksums;
//! 3. decide which reps are outdated;
//! 4. restore the others from the compiled-content cache;
//! 5. compile the rest, rescheduling around forward references;
//! 6. save the stores, unless a rep failed.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;

use kiln_cache::{ActionSequenceStore, ChecksumStore, LiveObjects, SiteStores};
use kiln_model::{
    ActionSequence, ItemRep, ItemRepRepo, RepId, RepName, Reference, Site,
};
use kiln_rules::{ActionSequenceCalculator, RuleCollection};
use tracing::{debug, info, warn};

use crate::dependency_tracker::DependencyTracker;
use crate::error::{CompileError, RepError, RepFailure};
use crate::executor::{Executor, Interrupt};
use crate::filters::FilterRegistry;
use crate::notifications::{Listener, Notification, NotificationCenter};
use crate::outdatedness::{OutdatednessChecker, OutdatednessContext, OutdatednessReason};
use crate::router::ItemRepRouter;
use crate::selector::ItemRepSelector;
use crate::snapshots::SnapshotRepo;
use crate::writer::{ItemRepWriter, WriteKind};

/// What a run did.
#[derive(Debug, Default)]
pub struct CompileReport {
    /// Output files that did not exist.
    pub created: Vec<PathBuf>,
    /// Output files whose content changed.
    pub updated: Vec<PathBuf>,
    /// Output files rewritten with the content they already had.
    pub identical: Vec<PathBuf>,
    /// Reps whose action sequence ran.
    pub compiled: Vec<Reference>,
    /// Reps restored from the compiled-content cache.
    pub cached: Vec<Reference>,
    /// Outdated reps and the main reason for each.
    pub outdated: Vec<(Reference, OutdatednessReason)>,
    /// Reps that could not be compiled.
    pub failures: Vec<RepFailure>,
}

impl CompileReport {
    /// Returns true if no rep failed.
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Number of files created or updated.
    pub fn written(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

/// Reps with their action sequences, routed, plus layout sequences.
struct Plan {
    reps: ItemRepRepo,
    sequences: HashMap<RepId, ActionSequence>,
    layout_sequences: HashMap<Reference, ActionSequence>,
    rule_memory: ActionSequenceStore,
}

/// Compiles a site incrementally.
pub struct Compiler {
    root: PathBuf,
    site: Site,
    rules: RuleCollection,
    filters: FilterRegistry,
    notifications: NotificationCenter,
}

impl Compiler {
    /// Creates a compiler for the site rooted at `root`, with the built-in filters.
    pub fn new(root: impl Into<PathBuf>, site: Site, rules: RuleCollection) -> Self {
        Self {
            root: root.into(),
            site,
            rules,
            filters: FilterRegistry::with_builtins(),
            notifications: NotificationCenter::new(),
        }
    }

    /// Replaces the filter registry.
    pub fn with_filters(mut self, filters: FilterRegistry) -> Self {
        self.filters = filters;
        self
    }

    /// Registers a listener for compilation notifications.
    pub fn subscribe(&mut self, listener: Box<dyn Listener>) {
        self.notifications.subscribe(listener);
    }

    /// The site being compiled.
    pub fn site(&self) -> &Site {
        &self.site
    }

    /// The site root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// The directory holding the stores.
    pub fn store_dir(&self) -> PathBuf {
        self.site.config().settings().tmp_path(&self.root)
    }

    /// The action sequence of every rep, then of every layout.
    pub fn action_sequences(&self) -> Result<Vec<(Reference, ActionSequence)>, CompileError> {
        let plan = self.plan()?;
        let mut sequences: Vec<(Reference, ActionSequence)> = plan
            .reps
            .iter()
            .filter_map(|(id, rep)| {
                plan.sequences
                    .get(&id)
                    .map(|seq| (rep.reference(), seq.clone()))
            })
            .collect();
        for layout in self.site.layouts().iter() {
            if let Some(seq) = plan.layout_sequences.get(&layout.reference()) {
                sequences.push((layout.reference(), seq.clone()));
            }
        }
        Ok(sequences)
    }

    /// Every outdated rep with all its reasons, without compiling anything.
    pub fn outdatedness(&self) -> Result<Vec<(Reference, Vec<OutdatednessReason>)>, CompileError> {
        let plan = self.plan()?;
        let stores = SiteStores::load(&self.store_dir(), &self.live_objects(&plan.reps));
        let new_checksums = ChecksumStore::for_site(&self.site)?;
        let checker = self.checker(&plan, &stores, &new_checksums);
        Ok(plan
            .reps
            .iter()
            .filter_map(|(_, rep)| {
                let mut reasons = checker.outdatedness_reasons_for(&rep.reference());
                if reasons.is_empty() {
                    reasons = checker.outdatedness_reasons_for(&rep.item_reference());
                }
                (!reasons.is_empty()).then(|| (rep.reference(), reasons))
            })
            .collect())
    }

    /// Compiles the site.
    ///
    /// Per-rep failures are collected in the report and do not stop the run.
    /// Errors in the rules, in the stores or a dependency cycle abort it.
    /// Stores are only saved when no rep failed.
    pub fn run(&self) -> Result<CompileReport, CompileError> {
        let started = Instant::now();
        let Plan {
            mut reps,
            sequences,
            layout_sequences,
            rule_memory,
        } = self.plan()?;
        let plan_view = PlanView {
            reps: &reps,
            rule_memory: &rule_memory,
        };

        let store_dir = self.store_dir();
        let mut stores = SiteStores::load(&store_dir, &self.live_objects(&reps));
        let new_checksums = ChecksumStore::for_site(&self.site)?;
        let mut report = CompileReport::default();

        let outdated = self.outdated_reps(plan_view, &stores, &new_checksums);
        let outdated_ids: HashSet<RepId> = outdated.iter().map(|(id, _)| *id).collect();
        report.outdated = outdated
            .iter()
            .map(|(id, reason)| (reps.get(*id).reference(), reason.clone()))
            .collect();

        // Dependencies are forgotten per item, so every rep of an item that
        // recompiles must recompile too, including siblings with cached content.
        let ids: Vec<RepId> = reps.ids().collect();
        let mut recompiled_items: HashSet<Reference> = HashSet::new();
        for &id in &ids {
            let rep = reps.get(id);
            if outdated_ids.contains(&id) || !stores.compiled_content.contains(&rep.reference()) {
                recompiled_items.insert(rep.item_reference());
            }
        }

        let mut snapshots = SnapshotRepo::new();
        let mut candidates: Vec<RepId> = outdated.iter().map(|(id, _)| *id).collect();
        for id in ids {
            if outdated_ids.contains(&id) {
                continue;
            }
            let reference = reps.get(id).reference();
            let cached = if recompiled_items.contains(&reps.get(id).item_reference()) {
                None
            } else {
                stores.compiled_content.get(&reference)
            };
            match cached {
                Some(contents) => {
                    snapshots.set_all(id, contents);
                    reps.get_mut(id).compiled = true;
                    self.notifications.post(Notification::CachedContentUsed {
                        rep: reference.clone(),
                    });
                    report.cached.push(reference);
                }
                None => {
                    debug!(rep = %reference, "recompiling without cached content");
                    candidates.push(id);
                }
            }
        }
        for item in &recompiled_items {
            stores.dependencies.forget_dependencies_for(item);
        }

        let executor = Executor::new(
            &self.site,
            &self.filters,
            &layout_sequences,
            &self.notifications,
            store_dir.join("filter_output"),
        );
        let writer = ItemRepWriter::new(&self.notifications);
        let mut selector = ItemRepSelector::new(candidates);
        let mut failed: HashSet<RepId> = HashSet::new();

        while let Some(id) = selector.next_rep() {
            let sequence = sequences.get(&id).ok_or_else(|| {
                kiln_common::InternalError::new(format!(
                    "{} has no action sequence",
                    reps.get(id).reference()
                ))
            })?;
            let mut tracker = DependencyTracker::new();
            let result = executor.compile_rep(id, sequence, &reps, &mut snapshots, &mut tracker);
            for dep in tracker.take_recorded() {
                if let Some(from) = &dep.from {
                    stores
                        .dependencies
                        .record_dependency(&dep.to, from, dep.props);
                }
            }

            let reference = reps.get(id).reference();
            let failure = match result {
                Ok(()) => {
                    reps.get_mut(id).compiled = true;
                    match self.finish_rep(reps.get(id), id, &snapshots, &writer, &mut stores) {
                        Ok(written) => {
                            for (path, kind) in written {
                                match kind {
                                    WriteKind::Created => report.created.push(path),
                                    WriteKind::Updated => report.updated.push(path),
                                    WriteKind::Identical => report.identical.push(path),
                                }
                            }
                            report.compiled.push(reference);
                            selector.completed();
                            continue;
                        }
                        Err(error) => RepFailure {
                            rep: reference.clone(),
                            stack: vec![reference],
                            error,
                        },
                    }
                }
                Err(Interrupt::Suspend(dep)) if failed.contains(&dep) => RepFailure {
                    rep: reference.clone(),
                    stack: vec![reference],
                    error: RepError::DependencyFailed {
                        dependency: reps.get(dep).reference(),
                    },
                },
                Err(Interrupt::Suspend(dep)) => {
                    let dependency = reps.get(dep).reference();
                    debug!(rep = %reference, %dependency, "suspended");
                    self.notifications.post(Notification::CompilationSuspended {
                        rep: reference,
                        dependency,
                    });
                    selector
                        .suspended(dep)
                        .map_err(|cycle| CompileError::DependencyCycle {
                            cycle: cycle.into_iter().map(|r| reps.get(r).reference()).collect(),
                        })?;
                    continue;
                }
                Err(Interrupt::Failed { error, stack }) => RepFailure {
                    rep: reference,
                    stack,
                    error,
                },
            };

            warn!(%failure, "failed to compile");
            reps.get_mut(id).compiled = false;
            snapshots.remove(id);
            failed.insert(id);
            report.failures.push(failure);
            selector.failed();
        }

        if report.is_success() {
            stores.save(&new_checksums, &rule_memory)?;
        } else {
            warn!(
                failures = report.failures.len(),
                "not saving stores because compilation failed"
            );
        }
        info!(
            compiled = report.compiled.len(),
            cached = report.cached.len(),
            created = report.created.len(),
            updated = report.updated.len(),
            identical = report.identical.len(),
            failed = report.failures.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "compilation finished"
        );
        Ok(report)
    }

    fn plan(&self) -> Result<Plan, CompileError> {
        let config = self.site.config();
        let settings = config.settings();
        let calculator = ActionSequenceCalculator::new(&self.rules, &self.filters, config);
        let mut router = ItemRepRouter::new(settings, settings.output_path(&self.root));

        let mut reps = ItemRepRepo::new();
        let mut sequences = HashMap::new();
        let mut rule_memory = ActionSequenceStore::new();
        for item in self.site.items().iter() {
            let mut names = self.rules.rep_names_for(item.identifier());
            if names.is_empty() {
                names.push(RepName::default_rep());
            }
            for name in names {
                let sequence = calculator.action_sequence_for_rep(item, &name)?;
                let mut rep = ItemRep::new(item.identifier().clone(), name);
                rep.snapshot_defs = calculator.snapshot_defs_for(item, &sequence);
                router.route(&mut rep, &sequence)?;
                rule_memory.set(rep.reference(), sequence.serialize());
                sequences.insert(reps.add(rep), sequence);
            }
        }

        let mut layout_sequences = HashMap::new();
        for layout in self.site.layouts().iter() {
            let sequence = calculator.action_sequence_for_layout(layout)?;
            rule_memory.set(layout.reference(), sequence.serialize());
            layout_sequences.insert(layout.reference(), sequence);
        }
        debug!(
            reps = reps.len(),
            layouts = layout_sequences.len(),
            "computed action sequences"
        );
        Ok(Plan {
            reps,
            sequences,
            layout_sequences,
            rule_memory,
        })
    }

    fn live_objects(&self, reps: &ItemRepRepo) -> LiveObjects {
        LiveObjects {
            objects: self.site.references(),
            items: self.site.items().iter().map(|i| i.reference()).collect(),
            reps: reps.iter().map(|(_, r)| r.reference()).collect(),
            layouts: self.site.layouts().iter().map(|l| l.reference()).collect(),
        }
    }

    fn checker<'a>(
        &'a self,
        plan: &'a Plan,
        stores: &'a SiteStores,
        new_checksums: &'a ChecksumStore,
    ) -> OutdatednessChecker<'a> {
        self.checker_for(
            PlanView {
                reps: &plan.reps,
                rule_memory: &plan.rule_memory,
            },
            stores,
            new_checksums,
        )
    }

    fn checker_for<'a>(
        &'a self,
        plan: PlanView<'a>,
        stores: &'a SiteStores,
        new_checksums: &'a ChecksumStore,
    ) -> OutdatednessChecker<'a> {
        OutdatednessChecker::new(OutdatednessContext {
            site: &self.site,
            reps: plan.reps,
            old_checksums: &stores.checksums,
            new_checksums,
            dependencies: &stores.dependencies,
            old_rule_memory: &stores.rule_memory,
            new_rule_memory: plan.rule_memory,
            filters: &self.filters,
        })
    }

    /// Outdated reps, in rep order, with the reason to report.
    ///
    /// Dependencies are forgotten per item before recompiling, so when one
    /// rep of an item is outdated all reps of the item are recompiled.
    fn outdated_reps(
        &self,
        plan: PlanView<'_>,
        stores: &SiteStores,
        new_checksums: &ChecksumStore,
    ) -> Vec<(RepId, OutdatednessReason)> {
        let checker = self.checker_for(plan, stores, new_checksums);
        let mut outdated = Vec::new();
        for (id, rep) in plan.reps.iter() {
            let reason = checker
                .outdatedness_reason_for(&rep.reference())
                .or_else(|| checker.outdatedness_reason_for(&rep.item_reference()));
            if let Some(reason) = reason {
                debug!(rep = %rep.reference(), %reason, "outdated");
                outdated.push((id, reason));
            }
        }
        outdated
    }

    fn finish_rep(
        &self,
        rep: &ItemRep,
        id: RepId,
        snapshots: &SnapshotRepo,
        writer: &ItemRepWriter<'_>,
        stores: &mut SiteStores,
    ) -> Result<Vec<(PathBuf, WriteKind)>, RepError> {
        let contents = snapshots.get_all(id).cloned().unwrap_or_default();
        let written = writer.write_all(rep, &contents)?;
        stores.compiled_content.set(&rep.reference(), &contents)?;
        Ok(written)
    }
}

/// The parts of a [`Plan`] outdatedness checks read.
#[derive(Clone, Copy)]
struct PlanView<'a> {
    reps: &'a ItemRepRepo,
    rule_memory: &'a ActionSequenceStore,
}
