//! Deciding which objects must be recompiled.
//!
//! An object is outdated for a *basic* reason (see [`rules`]) or because an
//! object it depends on changed in an aspect it depends on. A rep's status
//! covers its item's content and attributes; an item is outdated when any of
//! its reps is.

mod reason;
pub mod rules;

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use kiln_model::{Dependency, Reference};

pub use reason::{OutdatednessReason, OutdatednessStatus};
pub use rules::{OutdatednessContext, OutdatednessRule, OutdatednessRules};

/// Computes and memoizes outdatedness for the objects of one run.
pub struct OutdatednessChecker<'a> {
    ctx: OutdatednessContext<'a>,
    rules: OutdatednessRules,
    basic: RefCell<HashMap<Reference, OutdatednessStatus>>,
    by_dependencies: RefCell<HashMap<Reference, bool>>,
}

impl<'a> OutdatednessChecker<'a> {
    /// Creates a checker using the built-in rules.
    pub fn new(ctx: OutdatednessContext<'a>) -> Self {
        Self::with_rules(ctx, OutdatednessRules::builtin())
    }

    /// Creates a checker using `rules`.
    pub fn with_rules(ctx: OutdatednessContext<'a>, rules: OutdatednessRules) -> Self {
        Self {
            ctx,
            rules,
            basic: RefCell::new(HashMap::new()),
            by_dependencies: RefCell::new(HashMap::new()),
        }
    }

    /// The most important reason `object` is outdated, if any.
    ///
    /// Basic reasons come first, in rule order, then
    /// [`DependenciesOutdated`](OutdatednessReason::DependenciesOutdated), then
    /// [`UsesAlwaysOutdatedFilter`](OutdatednessReason::UsesAlwaysOutdatedFilter).
    pub fn outdatedness_reason_for(&self, object: &Reference) -> Option<OutdatednessReason> {
        self.outdatedness_reasons_for(object).into_iter().next()
    }

    /// Every reason found for `object`, most important first.
    pub fn outdatedness_reasons_for(&self, object: &Reference) -> Vec<OutdatednessReason> {
        let status = self.basic_status_for(object);
        let (standing, mut reasons): (Vec<_>, Vec<_>) = status
            .reasons()
            .iter()
            .cloned()
            .partition(|r| *r == OutdatednessReason::UsesAlwaysOutdatedFilter);
        if self.outdated_due_to_dependencies(object) {
            reasons.push(OutdatednessReason::DependenciesOutdated);
        }
        reasons.extend(standing);
        reasons
    }

    /// Returns true if `object` has any reason to be recompiled.
    pub fn is_outdated(&self, object: &Reference) -> bool {
        self.outdatedness_reason_for(object).is_some()
    }

    /// The status from basic rules alone.
    ///
    /// Rules whose affected props are all already covered are skipped.
    pub fn basic_status_for(&self, object: &Reference) -> OutdatednessStatus {
        if let Some(status) = self.basic.borrow().get(object) {
            return status.clone();
        }
        let status = match object {
            Reference::Item(id) => {
                let mut status = OutdatednessStatus::new();
                for &rep in self.ctx.reps.reps_for_item(id) {
                    status.merge(&self.basic_status_for(&self.ctx.reps.get(rep).reference()));
                }
                status
            }
            other => {
                let mut status = OutdatednessStatus::new();
                for rule in self.rules.iter() {
                    if !rule.applies_to(other.kind()) || status.props().contains(rule.affects()) {
                        continue;
                    }
                    if let Some(reason) = rule.apply(other, &self.ctx) {
                        status.add(reason);
                    }
                }
                status
            }
        };
        self.basic
            .borrow_mut()
            .insert(object.clone(), status.clone());
        status
    }

    /// Returns true if a dependency of `object` (or of its item) makes it outdated.
    pub fn outdated_due_to_dependencies(&self, object: &Reference) -> bool {
        self.due_to_dependencies(object, &mut HashSet::new())
    }

    fn due_to_dependencies(&self, object: &Reference, processed: &mut HashSet<Reference>) -> bool {
        let object = match object {
            Reference::ItemRep(id, _) => Reference::Item(id.clone()),
            other => other.clone(),
        };
        if let Some(&outdated) = self.by_dependencies.borrow().get(&object) {
            return outdated;
        }
        // A dependency cycle is not outdated on its own account.
        if !processed.insert(object.clone()) {
            return false;
        }

        let outdated = self
            .ctx
            .dependencies
            .dependencies_causing_outdatedness_of(&object)
            .iter()
            .any(|dep| {
                self.dependency_causes_outdatedness(dep)
                    || (dep.props.compiled_content
                        && dep
                            .from
                            .as_ref()
                            .is_some_and(|from| self.due_to_dependencies(from, processed)))
            });
        self.by_dependencies.borrow_mut().insert(object, outdated);
        outdated
    }

    fn dependency_causes_outdatedness(&self, dep: &Dependency) -> bool {
        match &dep.from {
            None => true,
            Some(from) => !self
                .basic_status_for(from)
                .props()
                .intersect(dep.props)
                .is_empty(),
        }
    }
}
