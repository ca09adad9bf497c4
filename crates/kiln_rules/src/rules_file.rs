//! The declarative rules file.
//!
//! ```toml
//! [[compile]]
//! pattern = "/blog/**/*.md"
//! actions = [
//!     { filter = "template" },
//!     { layout = "/post.*" },
//! ]
//!
//! [[route]]
//! pattern = "/blog/**/*.md"
//! path = "{without_ext}/index.html"
//!
//! [[layout]]
//! pattern = "/**/*.html"
//! filter = "template"
//!
//! [[passthrough]]
//! pattern = "/assets/**/*"
//! ```
//!
//! Each table compiles into the same closures a Rust caller would register on
//! a [`RuleCollection`]. Route paths may use the placeholders `{identifier}`,
//! `{without_ext}`, `{ext}`, `{basename}` and `{rep}`; a route without a
//! `path` suppresses output for that snapshot.

use std::path::Path;

use kiln_common::{Identifier, Pattern, StringPatternType};
use kiln_model::{FilterParams, RepName, SnapshotName};
use serde::Deserialize;
use tracing::debug;

use crate::collection::RuleCollection;
use crate::context::RuleContext;
use crate::error::RuleError;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RulesFile {
    #[serde(default)]
    compile: Vec<CompileSpec>,
    #[serde(default)]
    route: Vec<RouteSpec>,
    #[serde(default)]
    layout: Vec<LayoutSpec>,
    #[serde(default)]
    passthrough: Vec<PassthroughSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CompileSpec {
    pattern: String,
    #[serde(default = "default_rep")]
    rep: String,
    #[serde(default)]
    actions: Vec<ActionSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum ActionSpec {
    Filter {
        filter: String,
        #[serde(default)]
        params: FilterParams,
    },
    Layout {
        layout: String,
        #[serde(default)]
        params: FilterParams,
    },
    Snapshot {
        snapshot: String,
        #[serde(default)]
        path: Option<String>,
    },
    Write {
        write: String,
    },
    WriteExt {
        write_ext: String,
    },
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RouteSpec {
    pattern: String,
    #[serde(default = "default_rep")]
    rep: String,
    #[serde(default = "default_snapshot")]
    snapshot: String,
    #[serde(default)]
    path: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct LayoutSpec {
    pattern: String,
    filter: String,
    #[serde(default)]
    params: FilterParams,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct PassthroughSpec {
    pattern: String,
}

fn default_rep() -> String {
    "default".to_string()
}

fn default_snapshot() -> String {
    "last".to_string()
}

/// Loads the rules file at `path`.
pub fn load_rules(path: &Path, kind: StringPatternType) -> Result<RuleCollection, RuleError> {
    let text = std::fs::read_to_string(path).map_err(|source| RuleError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rules(&text, kind).map_err(|e| match e {
        RuleError::Parse { message, .. } => RuleError::Parse {
            path: path.to_path_buf(),
            message,
        },
        other => other,
    })
}

/// Parses rules from TOML text. Plain pattern strings are read as `kind`.
pub fn parse_rules(text: &str, kind: StringPatternType) -> Result<RuleCollection, RuleError> {
    let file: RulesFile = toml::from_str(text).map_err(|e| RuleError::Parse {
        path: Default::default(),
        message: e.to_string(),
    })?;

    let mut rules = RuleCollection::new();
    for entry in file.compile {
        let actions = entry.actions;
        rules.compile(
            Pattern::parse(&entry.pattern, kind)?,
            RepName::new(&entry.rep),
            move |ctx| apply_actions(ctx, &actions),
        );
    }
    for entry in file.route {
        let template = entry.path;
        rules.route(
            Pattern::parse(&entry.pattern, kind)?,
            RepName::new(&entry.rep),
            SnapshotName::new(&entry.snapshot),
            move |ctx| {
                Ok(template
                    .as_deref()
                    .map(|t| expand_route(t, ctx.item().identifier(), ctx.rep_name())))
            },
        );
    }
    for entry in file.layout {
        rules.layout(Pattern::parse(&entry.pattern, kind)?, entry.filter, entry.params);
    }
    for entry in file.passthrough {
        rules.passthrough(Pattern::parse(&entry.pattern, kind)?);
    }
    debug!(rules = rules.len(), "parsed rules");
    Ok(rules)
}

fn apply_actions(ctx: &mut RuleContext<'_>, actions: &[ActionSpec]) -> Result<(), RuleError> {
    for action in actions {
        match action {
            ActionSpec::Filter { filter, params } => ctx.filter(filter, params.clone()),
            ActionSpec::Layout { layout, params } => ctx.layout(layout, params.clone())?,
            ActionSpec::Snapshot { snapshot, path } => ctx.snapshot(snapshot, path.as_deref())?,
            ActionSpec::Write { write } => ctx.write_path(write)?,
            ActionSpec::WriteExt { write_ext } => ctx.write_ext(write_ext)?,
        }
    }
    Ok(())
}

/// Substitutes route placeholders.
fn expand_route(template: &str, identifier: &Identifier, rep: &RepName) -> String {
    template
        .replace("{identifier}", identifier.as_str())
        .replace("{without_ext}", identifier.without_ext())
        .replace("{ext}", identifier.ext().unwrap_or_default())
        .replace("{basename}", identifier.basename())
        .replace("{rep}", rep.as_str())
}
