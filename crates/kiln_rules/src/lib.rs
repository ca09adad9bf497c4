//! Rules: which actions each item rep goes through, and where it is written.
//!
//! A [`RuleCollection`] holds compilation, routing and layout rules, either
//! registered as Rust closures or loaded from a TOML rules file. The
//! [`ActionSequenceCalculator`] runs a rep's compilation rule against a
//! recording [`RuleContext`] and normalizes the result into the
//! [`ActionSequence`](kiln_model::ActionSequence) the executor replays.

#![warn(missing_docs)]

pub mod calculator;
pub mod collection;
pub mod compact;
pub mod context;
pub mod error;
pub mod filters;
pub mod rules_file;

pub use calculator::ActionSequenceCalculator;
pub use collection::{CompileFn, CompileRule, LayoutRule, RouteFn, RoutingRule, RuleCollection};
pub use compact::compact_snapshots;
pub use context::{RouteContext, RuleContext};
pub use error::RuleError;
pub use filters::{FilterKind, FilterLookup};
pub use rules_file::{load_rules, parse_rules};
