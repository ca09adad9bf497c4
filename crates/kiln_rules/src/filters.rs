//! What rule evaluation needs to know about filters.

/// Whether a filter consumes or produces text or a binary file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
    /// Textual content.
    Text,
    /// A binary file.
    Binary,
}

impl FilterKind {
    /// The kind matching a binary flag.
    pub fn from_binary(binary: bool) -> Self {
        if binary {
            FilterKind::Binary
        } else {
            FilterKind::Text
        }
    }

    /// Returns true for [`FilterKind::Binary`].
    pub fn is_binary(self) -> bool {
        self == FilterKind::Binary
    }
}

impl std::fmt::Display for FilterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FilterKind::Text => "text",
            FilterKind::Binary => "binary",
        })
    }
}

/// Looks up the declared input and output kinds of a filter by name.
///
/// Implemented by the compiler's filter registry. Used to work out which
/// snapshots of a rep hold binary content.
pub trait FilterLookup {
    /// Returns `(input, output)` kinds, or `None` for an unknown filter.
    fn filter_kinds(&self, name: &str) -> Option<(FilterKind, FilterKind)>;
}
