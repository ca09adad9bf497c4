//! The incremental compiler.
//!
//! [`Compiler::run`] decides which item reps are outdated, recompiles those
//! through their action sequences, restores the rest from the compiled-content
//! cache and writes routed snapshots to the output directory. Reps that need
//! another rep's compiled content are suspended and retried once the
//! dependency is done; dependencies discovered along the way are recorded for
//! the next run.

#![warn(missing_docs)]

pub mod compiler;
pub mod dependency_tracker;
pub mod error;
mod executor;
pub mod filters;
pub mod notifications;
pub mod outdatedness;
pub mod router;
pub mod selector;
pub mod snapshots;
pub mod writer;

pub use compiler::{CompileReport, Compiler};
pub use dependency_tracker::DependencyTracker;
pub use error::{CompileError, FilterError, RepError, RepFailure, Suspension};
pub use filters::{Filter, FilterContext, FilterInput, FilterOutput, FilterRegistry};
pub use notifications::{
    Listener, Notification, NotificationCenter, NotificationLog, TracingListener,
};
pub use outdatedness::{
    OutdatednessChecker, OutdatednessContext, OutdatednessReason, OutdatednessRule,
    OutdatednessRules,
};
pub use router::ItemRepRouter;
pub use selector::ItemRepSelector;
pub use snapshots::SnapshotRepo;
pub use writer::{ItemRepWriter, WriteKind};
