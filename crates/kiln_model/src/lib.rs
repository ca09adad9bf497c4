//! The site model seen by the incremental compiler.
//!
//! Items and layouts are immutable documents identified by path-like
//! identifiers. Each item is compiled through one or more item reps, each
//! driven by an [`ActionSequence`] of filters, layouts and snapshots. Every
//! object that can cause outdatedness is named by a serializable
//! [`Reference`], and dependencies between objects are qualified by [`Props`].

#![warn(missing_docs)]

pub mod action;
pub mod content;
pub mod data_source;
pub mod dependency;
pub mod document;
pub mod error;
pub mod item_rep;
pub mod props;
pub mod reference;
pub mod site;

pub use action::{
    ActionSequence, ActionSequenceBuilder, FilterParams, ProcessingAction, RuleMemory,
    SerializedAction,
};
pub use content::{Content, TextualContent};
pub use data_source::{DataSource, FilesystemDataSource, SiteData};
pub use dependency::Dependency;
pub use document::{CodeSnippet, Configuration, Document, Item, Layout};
pub use error::ModelError;
pub use item_rep::{ItemRep, ItemRepRepo, RepId, SnapshotDef};
pub use props::Props;
pub use reference::{ObjectKind, Reference, RepName, SnapshotName};
pub use site::{DocumentCollection, Site, SiteObject};
