//! The rule collection: compilation, routing and layout rules.
//!
//! Rules are matched against identifiers in declaration order and the first
//! match wins. There is no fallthrough.

use std::fmt;

use kiln_common::{Identifier, Pattern};
use kiln_model::{FilterParams, Item, RepName, SnapshotName};

use crate::context::{RouteContext, RuleContext};
use crate::error::RuleError;

/// The body of a compilation rule.
pub type CompileFn = Box<dyn Fn(&mut RuleContext<'_>) -> Result<(), RuleError>>;

/// The body of a routing rule. `None` means "do not write this snapshot".
pub type RouteFn = Box<dyn Fn(&RouteContext<'_>) -> Result<Option<String>, RuleError>>;

/// Compiles matching items into one rep.
pub struct CompileRule {
    pattern: Pattern,
    rep_name: RepName,
    body: CompileFn,
}

impl CompileRule {
    /// The identifier pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// The rep this rule compiles.
    pub fn rep_name(&self) -> &RepName {
        &self.rep_name
    }

    /// Runs the body against a recording context.
    pub fn apply(&self, ctx: &mut RuleContext<'_>) -> Result<(), RuleError> {
        (self.body)(ctx)
    }
}

/// Picks the output path of one snapshot of matching reps.
pub struct RoutingRule {
    pattern: Pattern,
    rep_name: RepName,
    snapshot: SnapshotName,
    body: RouteFn,
}

impl RoutingRule {
    /// The identifier pattern.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Runs the body.
    pub fn apply(&self, ctx: &RouteContext<'_>) -> Result<Option<String>, RuleError> {
        (self.body)(ctx)
    }
}

/// Maps matching layouts to the filter that renders them.
#[derive(Debug)]
pub struct LayoutRule {
    pattern: Pattern,
    filter: String,
    params: FilterParams,
}

impl LayoutRule {
    /// The filter name.
    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// The filter parameters.
    pub fn params(&self) -> &FilterParams {
        &self.params
    }
}

/// All rules of a site, in declaration order.
#[derive(Default)]
pub struct RuleCollection {
    compile: Vec<CompileRule>,
    route: Vec<RoutingRule>,
    layout: Vec<LayoutRule>,
}

impl RuleCollection {
    /// Creates an empty collection.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a compilation rule for rep `rep_name` of items matching `pattern`.
    pub fn compile<F>(&mut self, pattern: Pattern, rep_name: RepName, body: F) -> &mut Self
    where
        F: Fn(&mut RuleContext<'_>) -> Result<(), RuleError> + 'static,
    {
        self.compile.push(CompileRule {
            pattern,
            rep_name,
            body: Box::new(body),
        });
        self
    }

    /// Adds a routing rule for snapshot `snapshot` of rep `rep_name`.
    pub fn route<F>(
        &mut self,
        pattern: Pattern,
        rep_name: RepName,
        snapshot: SnapshotName,
        body: F,
    ) -> &mut Self
    where
        F: Fn(&RouteContext<'_>) -> Result<Option<String>, RuleError> + 'static,
    {
        self.route.push(RoutingRule {
            pattern,
            rep_name,
            snapshot,
            body: Box::new(body),
        });
        self
    }

    /// Adds a layout rule.
    pub fn layout(
        &mut self,
        pattern: Pattern,
        filter: impl Into<String>,
        params: FilterParams,
    ) -> &mut Self {
        self.layout.push(LayoutRule {
            pattern,
            filter: filter.into(),
            params,
        });
        self
    }

    /// Copies matching items to the output unchanged, at their identifier.
    pub fn passthrough(&mut self, pattern: Pattern) -> &mut Self {
        self.compile(pattern.clone(), RepName::default_rep(), |_| Ok(()));
        self.route(
            pattern,
            RepName::default_rep(),
            SnapshotName::last(),
            |ctx| Ok(Some(ctx.item().identifier().to_string())),
        );
        self
    }

    /// The first compilation rule for rep `rep_name` of `item`.
    pub fn compilation_rule_for(&self, item: &Identifier, rep_name: &RepName) -> Option<&CompileRule> {
        self.compile
            .iter()
            .find(|r| &r.rep_name == rep_name && r.pattern.matches(item))
    }

    /// The reps `item` has: one per distinct rep name among matching
    /// compilation rules, in rule order.
    pub fn rep_names_for(&self, item: &Identifier) -> Vec<RepName> {
        let mut names: Vec<RepName> = Vec::new();
        for rule in self.compile.iter().filter(|r| r.pattern.matches(item)) {
            if !names.contains(&rule.rep_name) {
                names.push(rule.rep_name.clone());
            }
        }
        names
    }

    /// The first routing rule for `snapshot` of rep `rep_name` of `item`.
    pub fn routing_rule_for(
        &self,
        item: &Identifier,
        rep_name: &RepName,
        snapshot: &SnapshotName,
    ) -> Option<&RoutingRule> {
        self.route.iter().find(|r| {
            &r.rep_name == rep_name && &r.snapshot == snapshot && r.pattern.matches(item)
        })
    }

    /// The first layout rule matching `layout`.
    pub fn layout_rule_for(&self, layout: &Identifier) -> Option<&LayoutRule> {
        self.layout.iter().find(|r| r.pattern.matches(layout))
    }

    /// Runs the routing rule for `snapshot` of `rep_name` of `item`, if any.
    pub fn route_for(
        &self,
        item: &Item,
        rep_name: &RepName,
        snapshot: &SnapshotName,
        config: &kiln_model::Configuration,
    ) -> Result<Option<String>, RuleError> {
        let Some(rule) = self.routing_rule_for(item.identifier(), rep_name, snapshot) else {
            return Ok(None);
        };
        let ctx = RouteContext {
            item,
            rep_name,
            snapshot,
            config,
        };
        let path = rule.apply(&ctx)?;
        if let Some(path) = &path {
            if !path.starts_with('/') {
                return Err(RuleError::RouteWithoutSlash {
                    rep: format!("{} ({})", item.identifier(), rep_name),
                    path: path.clone(),
                });
            }
        }
        Ok(path)
    }

    /// Number of rules of all kinds.
    pub fn len(&self) -> usize {
        self.compile.len() + self.route.len() + self.layout.len()
    }

    /// Returns true if there are no rules.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RuleCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let compile: Vec<String> = self
            .compile
            .iter()
            .map(|r| format!("{} ({})", r.pattern, r.rep_name))
            .collect();
        let route: Vec<String> = self
            .route
            .iter()
            .map(|r| format!("{} ({}, {})", r.pattern, r.rep_name, r.snapshot))
            .collect();
        f.debug_struct("RuleCollection")
            .field("compile", &compile)
            .field("route", &route)
            .field("layout", &self.layout)
            .finish()
    }
}
