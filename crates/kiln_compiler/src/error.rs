//! Error types for compilation.
//!
//! Errors fall into three layers. [`FilterError`] is what a filter or a
//! [`FilterContext`](crate::FilterContext) accessor returns. [`RepError`] is a
//! failure of one item rep: it is reported in the run's
//! [`CompileReport`](crate::CompileReport) and other reps keep compiling.
//! [`CompileError`] aborts the whole run.

use std::fmt;
use std::path::PathBuf;

use kiln_cache::CacheError;
use kiln_common::InternalError;
use kiln_model::{ModelError, Reference, RepId, SnapshotName};
use kiln_rules::{FilterKind, RuleError};

/// A request for content that another rep has not produced yet.
///
/// Returned inside [`FilterError::Suspended`] by the content accessors of
/// [`FilterContext`](crate::FilterContext). Filters propagate it with `?`;
/// the compiler then compiles the other rep first and retries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Suspension {
    pub(crate) rep: RepId,
}

impl fmt::Display for Suspension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "waiting for item rep #{}", self.rep.index())
    }
}

/// Errors returned by filters and by the accessors they call.
#[derive(Debug, thiserror::Error)]
pub enum FilterError {
    /// The filter rejected its input.
    #[error("{message}")]
    Failed {
        /// What went wrong.
        message: String,
    },

    /// A file could not be read or written.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Content could not be read.
    #[error(transparent)]
    Content(#[from] ModelError),

    /// No item has the requested identifier.
    #[error("no item with identifier {identifier}")]
    NoSuchItem {
        /// The requested identifier.
        identifier: String,
    },

    /// The item has no rep with the requested name.
    #[error("item {identifier} has no rep named {rep}")]
    NoSuchRep {
        /// The item.
        identifier: String,
        /// The requested rep name.
        rep: String,
    },

    /// The rep declares no snapshot with the requested name.
    #[error("{rep} has no snapshot named {snapshot}")]
    NoSuchSnapshot {
        /// The rep.
        rep: Reference,
        /// The requested snapshot.
        snapshot: SnapshotName,
    },

    /// Compiled content of a binary snapshot was requested as text.
    #[error("cannot read compiled content of binary snapshot {snapshot} of {rep}")]
    BinaryContent {
        /// The rep.
        rep: Reference,
        /// The snapshot.
        snapshot: SnapshotName,
    },

    /// The requested content is not available yet.
    #[error("{0}")]
    Suspended(Suspension),
}

impl FilterError {
    /// Creates a [`FilterError::Failed`].
    pub fn failed(message: impl Into<String>) -> Self {
        FilterError::Failed {
            message: message.into(),
        }
    }
}

/// A failure confined to one item rep.
#[derive(Debug, thiserror::Error)]
pub enum RepError {
    /// An action names a filter that is not registered.
    #[error("unknown filter '{name}'")]
    UnknownFilter {
        /// The filter name.
        name: String,
    },

    /// The current content does not match the filter's input kind.
    #[error("filter '{filter}' expects {expected} input but the content is {actual}")]
    InputKindMismatch {
        /// The filter name.
        filter: String,
        /// The kind the filter accepts.
        expected: FilterKind,
        /// The kind of the current content.
        actual: FilterKind,
    },

    /// The filter produced content of another kind than it declares.
    #[error("filter '{filter}' declares {expected} output but produced {actual}")]
    OutputKindMismatch {
        /// The filter name.
        filter: String,
        /// The declared output kind.
        expected: FilterKind,
        /// The kind actually produced.
        actual: FilterKind,
    },

    /// A filter returned an error.
    #[error("filter '{filter}' failed: {source}")]
    Filter {
        /// The filter name.
        filter: String,
        /// The filter's error.
        source: FilterError,
    },

    /// No layout matches the identifier given to `layout`.
    #[error("no layout matches '{identifier}'")]
    LayoutNotFound {
        /// The identifier or pattern.
        identifier: String,
    },

    /// `layout` was applied to binary content.
    #[error("cannot lay out binary content with layout {layout}")]
    BinaryLayout {
        /// The layout.
        layout: String,
    },

    /// The layout's action sequence has no filter.
    #[error("layout {layout} has no filter")]
    LayoutWithoutFilter {
        /// The layout.
        layout: String,
    },

    /// The rep needs content from a rep that failed.
    #[error("depends on {dependency}, which failed to compile")]
    DependencyFailed {
        /// The failed rep.
        dependency: Reference,
    },

    /// Content of the item or layout could not be read.
    #[error(transparent)]
    Content(#[from] ModelError),

    /// A directory for filter output could not be created.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// Compiled content could not be cached.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// Compiled content could not be written to the output directory.
    #[error("failed to write {path}: {source}")]
    Write {
        /// The output file.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// An invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

/// A rep that failed to compile, with the objects being compiled at the time.
#[derive(Debug)]
pub struct RepFailure {
    /// The failed rep.
    pub rep: Reference,
    /// The compilation stack: the rep, then any layout being applied.
    pub stack: Vec<Reference>,
    /// What went wrong.
    pub error: RepError,
}

impl fmt::Display for RepFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.rep, self.error)?;
        if self.stack.len() > 1 {
            let stack: Vec<String> = self.stack.iter().map(ToString::to_string).collect();
            write!(f, " (while compiling {})", stack.join(" > "))?;
        }
        Ok(())
    }
}

/// Errors that abort a compilation run.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// Rules could not be evaluated.
    #[error(transparent)]
    Rules(#[from] RuleError),

    /// A store could not be read or written.
    #[error(transparent)]
    Cache(#[from] CacheError),

    /// The site could not be loaded.
    #[error(transparent)]
    Model(#[from] ModelError),

    /// Two reps are routed to the same output path.
    #[error("{first} and {second} are both routed to {path}")]
    IdenticalRoutes {
        /// The contested path.
        path: String,
        /// The rep routed there first.
        first: Reference,
        /// The other rep.
        second: Reference,
    },

    /// Reps need each other's compiled content.
    #[error("dependency cycle: {}", format_cycle(.cycle))]
    DependencyCycle {
        /// The reps in the cycle, each waiting on the next.
        cycle: Vec<Reference>,
    },

    /// An invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

fn format_cycle(cycle: &[Reference]) -> String {
    let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = parts.first().cloned() {
        parts.push(first);
    }
    parts.join(" -> ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;
    use kiln_model::RepName;

    fn rep(id: &str) -> Reference {
        Reference::ItemRep(Identifier::new(id).unwrap(), RepName::default_rep())
    }

    #[test]
    fn cycle_display_closes_the_loop() {
        let err = CompileError::DependencyCycle {
            cycle: vec![rep("/a.md"), rep("/b.md")],
        };
        assert_eq!(
            err.to_string(),
            "dependency cycle: item_rep:/a.md:default -> item_rep:/b.md:default -> item_rep:/a.md:default"
        );
    }

    #[test]
    fn failure_display_includes_layout_stack() {
        let failure = RepFailure {
            rep: rep("/a.md"),
            stack: vec![
                rep("/a.md"),
                Reference::Layout(Identifier::new("/default.html").unwrap()),
            ],
            error: RepError::UnknownFilter {
                name: "nope".into(),
            },
        };
        let text = failure.to_string();
        assert!(text.starts_with("item_rep:/a.md:default: unknown filter 'nope'"));
        assert!(text.ends_with("(while compiling item_rep:/a.md:default > layout:/default.html)"));
    }
}
