//! Filters: named content transforms.
//!
//! A [`Filter`] declares whether it reads and writes text or a binary file.
//! The executor checks the current content against the declared input kind
//! before calling it, and checks the result against the declared output kind.
//! Filters receive their parameters and input by shared reference and cannot
//! change either.

mod builtin;
mod context;

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

use kiln_model::FilterParams;
use kiln_rules::{FilterKind, FilterLookup};

pub use builtin::{CopyFilter, IdentityFilter, ShellFilter, TemplateFilter};
pub use context::FilterContext;

use crate::error::FilterError;

/// The content handed to a filter.
#[derive(Debug, Clone, Copy)]
pub enum FilterInput<'a> {
    /// Text.
    Text(&'a str),
    /// A binary file.
    Binary(&'a Path),
}

impl FilterInput<'_> {
    /// The kind of this input.
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterInput::Text(_) => FilterKind::Text,
            FilterInput::Binary(_) => FilterKind::Binary,
        }
    }
}

/// The content a filter produces.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterOutput {
    /// Text.
    Text(String),
    /// A binary file, usually at [`FilterContext::output_path`].
    Binary(PathBuf),
}

impl FilterOutput {
    /// The kind of this output.
    pub fn kind(&self) -> FilterKind {
        match self {
            FilterOutput::Text(_) => FilterKind::Text,
            FilterOutput::Binary(_) => FilterKind::Binary,
        }
    }
}

/// A named content transform.
pub trait Filter {
    /// The name rules refer to this filter by.
    fn name(&self) -> &str;

    /// The kind of content this filter reads.
    fn input_kind(&self) -> FilterKind {
        FilterKind::Text
    }

    /// The kind of content this filter produces.
    fn output_kind(&self) -> FilterKind {
        FilterKind::Text
    }

    /// Whether output can change without any tracked input changing, which
    /// makes every rep using this filter outdated on every run.
    fn always_outdated(&self) -> bool {
        false
    }

    /// Transforms `input`.
    fn run(
        &self,
        input: FilterInput<'_>,
        params: &FilterParams,
        ctx: &mut FilterContext<'_>,
    ) -> Result<FilterOutput, FilterError>;
}

/// The filters available to a compilation, by name.
#[derive(Default)]
pub struct FilterRegistry {
    filters: BTreeMap<String, Box<dyn Filter>>,
}

impl FilterRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the built-in filters.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IdentityFilter));
        registry.register(Box::new(TemplateFilter));
        registry.register(Box::new(CopyFilter));
        registry.register(Box::new(ShellFilter));
        registry
    }

    /// Adds a filter, replacing any filter of the same name.
    pub fn register(&mut self, filter: Box<dyn Filter>) -> &mut Self {
        self.filters.insert(filter.name().to_string(), filter);
        self
    }

    /// Looks up a filter.
    pub fn get(&self, name: &str) -> Option<&dyn Filter> {
        self.filters.get(name).map(|f| f.as_ref())
    }

    /// Returns true if `name` is registered and always outdated.
    pub fn is_always_outdated(&self, name: &str) -> bool {
        self.get(name).is_some_and(|f| f.always_outdated())
    }

    /// Registered filter names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.filters.keys().map(String::as_str)
    }
}

impl FilterLookup for FilterRegistry {
    fn filter_kinds(&self, name: &str) -> Option<(FilterKind, FilterKind)> {
        self.get(name).map(|f| (f.input_kind(), f.output_kind()))
    }
}

impl fmt::Debug for FilterRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.filters.keys()).finish()
    }
}
