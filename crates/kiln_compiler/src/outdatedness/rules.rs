//! The basic outdatedness rules.
//!
//! Each rule looks at one object in isolation, comparing the stores of the
//! previous run with the current site. Dependencies are handled by the
//! [`OutdatednessChecker`](super::OutdatednessChecker), not by rules.

use kiln_cache::{modified_attribute_keys, ActionSequenceStore, ChecksumStore, DependencyStore};
use kiln_model::{ItemRepRepo, ObjectKind, Props, Reference, RuleMemory, SerializedAction, Site};

use super::reason::OutdatednessReason;
use crate::filters::FilterRegistry;

/// Everything rules compare.
pub struct OutdatednessContext<'a> {
    /// The current site.
    pub site: &'a Site,
    /// Reps of the current run, routed.
    pub reps: &'a ItemRepRepo,
    /// Digests from the previous run.
    pub old_checksums: &'a ChecksumStore,
    /// Digests of the current site.
    pub new_checksums: &'a ChecksumStore,
    /// The dependency graph from the previous run.
    pub dependencies: &'a DependencyStore,
    /// Rule memories from the previous run.
    pub old_rule_memory: &'a ActionSequenceStore,
    /// Rule memories of the current run, for reps and layouts.
    pub new_rule_memory: &'a ActionSequenceStore,
    /// The filters in use.
    pub filters: &'a FilterRegistry,
}

impl OutdatednessContext<'_> {
    /// The object whose checksums describe `object`: reps use their item's.
    fn checksum_subject(object: &Reference) -> Reference {
        match object {
            Reference::ItemRep(id, _) => Reference::Item(id.clone()),
            other => other.clone(),
        }
    }
}

/// One basic outdatedness check.
pub trait OutdatednessRule {
    /// The name of the reason this rule produces.
    fn name(&self) -> &'static str;

    /// The aspects the produced reason makes outdated.
    fn affects(&self) -> Props;

    /// Returns true if the rule is evaluated for objects of `kind`.
    fn applies_to(&self, kind: ObjectKind) -> bool;

    /// Checks `object`.
    fn apply(&self, object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason>;
}

/// A code snippet's digest differs, or a snippet was removed.
pub struct CodeSnippetsModified;

impl OutdatednessRule for CodeSnippetsModified {
    fn name(&self) -> &'static str {
        "code_snippets_modified"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::CodeSnippetsModified.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::ItemRep
    }

    fn apply(&self, _object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let changed = ctx.site.code_snippets().iter().any(|snippet| {
            let r = snippet.reference();
            ctx.old_checksums.checksum_for(&r) != ctx.new_checksums.checksum_for(&r)
        });
        let removed = ctx
            .old_checksums
            .references()
            .filter(|r| matches!(r, Reference::CodeSnippet(_)))
            .any(|r| ctx.new_checksums.get(r).is_none());
        (changed || removed).then_some(OutdatednessReason::CodeSnippetsModified)
    }
}

/// The configuration's digest differs.
pub struct ConfigurationModified;

impl OutdatednessRule for ConfigurationModified {
    fn name(&self) -> &'static str {
        "configuration_modified"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::ConfigurationModified.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::ItemRep
    }

    fn apply(&self, _object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let r = Reference::Configuration;
        (ctx.old_checksums.checksum_for(&r) != ctx.new_checksums.checksum_for(&r))
            .then_some(OutdatednessReason::ConfigurationModified)
    }
}

/// The action sequence changed, ignoring output paths, or one of the layouts
/// it used last time had its own sequence changed.
pub struct RulesModified;

impl RulesModified {
    fn memory_modified(old: Option<&RuleMemory>, new: Option<&RuleMemory>) -> bool {
        match (old, new) {
            (Some(old), Some(new)) => old.procedural() != new.procedural(),
            _ => true,
        }
    }
}

impl OutdatednessRule for RulesModified {
    fn name(&self) -> &'static str {
        "rules_modified"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::RulesModified.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        matches!(kind, ObjectKind::ItemRep | ObjectKind::Layout)
    }

    fn apply(&self, object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let old = ctx.old_rule_memory.get(object);
        if Self::memory_modified(old, ctx.new_rule_memory.get(object)) {
            return Some(OutdatednessReason::RulesModified);
        }

        let kind = ctx.site.config().settings().string_pattern_type;
        let layout_modified = old
            .into_iter()
            .flat_map(RuleMemory::layout_identifiers)
            .filter_map(|id| ctx.site.layouts().resolve(id, kind))
            .any(|layout| {
                let r = layout.reference();
                Self::memory_modified(ctx.old_rule_memory.get(&r), ctx.new_rule_memory.get(&r))
            });
        layout_modified.then_some(OutdatednessReason::RulesModified)
    }
}

/// The raw content's digest differs.
pub struct ContentModified;

impl OutdatednessRule for ContentModified {
    fn name(&self) -> &'static str {
        "content_modified"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::ContentModified.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        matches!(kind, ObjectKind::ItemRep | ObjectKind::Layout)
    }

    fn apply(&self, object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let r = OutdatednessContext::checksum_subject(object);
        (ctx.old_checksums.content_checksum_for(&r) != ctx.new_checksums.content_checksum_for(&r))
            .then_some(OutdatednessReason::ContentModified)
    }
}

/// The attributes' digest differs. Reports the changed keys when the
/// previous per-key digests are known.
pub struct AttributesModified;

impl OutdatednessRule for AttributesModified {
    fn name(&self) -> &'static str {
        "attributes_modified"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::AttributesModified { keys: Vec::new() }.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        matches!(
            kind,
            ObjectKind::ItemRep | ObjectKind::Layout | ObjectKind::Configuration
        )
    }

    fn apply(&self, object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let r = OutdatednessContext::checksum_subject(object);
        let old = ctx.old_checksums.attributes_checksum_for(&r);
        if old == ctx.new_checksums.attributes_checksum_for(&r) {
            return None;
        }
        let keys = match (
            old.and(ctx.old_checksums.each_attribute_checksums_for(&r)),
            ctx.new_checksums.each_attribute_checksums_for(&r),
        ) {
            (Some(old), Some(new)) => modified_attribute_keys(old, new),
            _ => Vec::new(),
        };
        Some(OutdatednessReason::AttributesModified { keys })
    }
}

/// An output file of the rep is missing.
pub struct NotWritten;

impl OutdatednessRule for NotWritten {
    fn name(&self) -> &'static str {
        "not_written"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::NotWritten.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::ItemRep
    }

    fn apply(&self, object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let id = ctx.reps.find_reference(object)?;
        let missing = ctx
            .reps
            .get(id)
            .raw_paths
            .values()
            .flatten()
            .any(|path| !path.is_file());
        missing.then_some(OutdatednessReason::NotWritten)
    }
}

/// The set of output paths changed.
pub struct PathsModified;

impl OutdatednessRule for PathsModified {
    fn name(&self) -> &'static str {
        "paths_modified"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::PathsModified.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        kind == ObjectKind::ItemRep
    }

    fn apply(&self, object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let old = ctx.old_rule_memory.get(object)?;
        let new = ctx.new_rule_memory.get(object)?;
        (old.paths() != new.paths()).then_some(OutdatednessReason::PathsModified)
    }
}

/// The action sequence runs a filter that is always outdated.
pub struct UsesAlwaysOutdatedFilter;

impl OutdatednessRule for UsesAlwaysOutdatedFilter {
    fn name(&self) -> &'static str {
        "uses_always_outdated_filter"
    }

    fn affects(&self) -> Props {
        OutdatednessReason::UsesAlwaysOutdatedFilter.affects()
    }

    fn applies_to(&self, kind: ObjectKind) -> bool {
        matches!(kind, ObjectKind::ItemRep | ObjectKind::Layout)
    }

    fn apply(&self, object: &Reference, ctx: &OutdatednessContext<'_>) -> Option<OutdatednessReason> {
        let memory = ctx.new_rule_memory.get(object)?;
        let uses = memory.actions().iter().any(|a| match a {
            SerializedAction::Filter { name, .. } => ctx.filters.is_always_outdated(name),
            _ => false,
        });
        uses.then_some(OutdatednessReason::UsesAlwaysOutdatedFilter)
    }
}

/// The basic rules in priority order.
pub struct OutdatednessRules {
    rules: Vec<Box<dyn OutdatednessRule>>,
}

impl OutdatednessRules {
    /// Creates an empty rule list.
    pub fn new() -> Self {
        Self { rules: Vec::new() }
    }

    /// The built-in rules, in priority order.
    pub fn builtin() -> Self {
        let mut rules = Self::new();
        rules
            .register(Box::new(CodeSnippetsModified))
            .register(Box::new(ConfigurationModified))
            .register(Box::new(RulesModified))
            .register(Box::new(ContentModified))
            .register(Box::new(AttributesModified))
            .register(Box::new(NotWritten))
            .register(Box::new(PathsModified))
            .register(Box::new(UsesAlwaysOutdatedFilter));
        rules
    }

    /// Appends a rule with the lowest priority so far.
    pub fn register(&mut self, rule: Box<dyn OutdatednessRule>) -> &mut Self {
        self.rules.push(rule);
        self
    }

    /// The rules in priority order.
    pub fn iter(&self) -> impl Iterator<Item = &dyn OutdatednessRule> {
        self.rules.iter().map(|r| r.as_ref())
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl Default for OutdatednessRules {
    fn default() -> Self {
        Self::builtin()
    }
}
