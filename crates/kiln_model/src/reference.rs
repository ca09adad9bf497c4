//! Stable references to site objects, and the names used for reps and snapshots.

use std::fmt;
use std::sync::Arc;

use kiln_common::Identifier;
use serde::{Deserialize, Serialize};

macro_rules! name_type {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Creates a name from a string.
            pub fn new(s: impl AsRef<str>) -> Self {
                Self(Arc::from(s.as_ref()))
            }

            /// Returns the name as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, ":{}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self::new(s)
            }
        }
    };
}

name_type!(
    /// The name of an item representation, such as `default` or `rss`.
    RepName
);

name_type!(
    /// The name of a snapshot, such as `raw`, `pre`, `post` or `last`.
    SnapshotName
);

impl RepName {
    /// The representation every compile rule targets unless told otherwise.
    pub fn default_rep() -> Self {
        Self::new("default")
    }
}

impl SnapshotName {
    /// Content as loaded, before any filter.
    pub fn raw() -> Self {
        Self::new("raw")
    }

    /// Content right before the first layout.
    pub fn pre() -> Self {
        Self::new("pre")
    }

    /// Content right after the last layout.
    pub fn post() -> Self {
        Self::new("post")
    }

    /// Content at the end of the action sequence.
    pub fn last() -> Self {
        Self::new("last")
    }

    /// The auto-generated name of the `n`th `write` call.
    pub fn write(n: usize) -> Self {
        Self::new(format!("_{n}"))
    }
}

/// A stable, serializable reference to a site object.
///
/// This is the vertex type of the dependency graph and the key of every
/// persisted store. It survives across runs because it names objects by
/// identifier, never by memory address.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reference {
    /// An item.
    Item(Identifier),
    /// A layout.
    Layout(Identifier),
    /// The site configuration.
    Configuration,
    /// A code snippet, by filename.
    CodeSnippet(String),
    /// One representation of an item.
    ItemRep(Identifier, RepName),
}

impl Reference {
    /// Returns the kind of object referenced.
    pub fn kind(&self) -> ObjectKind {
        match self {
            Reference::Item(_) => ObjectKind::Item,
            Reference::Layout(_) => ObjectKind::Layout,
            Reference::Configuration => ObjectKind::Configuration,
            Reference::CodeSnippet(_) => ObjectKind::CodeSnippet,
            Reference::ItemRep(..) => ObjectKind::ItemRep,
        }
    }

    /// Returns the identifier of the referenced item or layout, if any.
    pub fn identifier(&self) -> Option<&Identifier> {
        match self {
            Reference::Item(id) | Reference::Layout(id) | Reference::ItemRep(id, _) => Some(id),
            Reference::Configuration | Reference::CodeSnippet(_) => None,
        }
    }
}

impl fmt::Display for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reference::Item(id) => write!(f, "item:{id}"),
            Reference::Layout(id) => write!(f, "layout:{id}"),
            Reference::Configuration => f.write_str("configuration"),
            Reference::CodeSnippet(name) => write!(f, "code_snippet:{name}"),
            Reference::ItemRep(id, rep) => write!(f, "item_rep:{id}:{rep}"),
        }
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// The kinds of object a [`Reference`] can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    /// An item.
    Item,
    /// A layout.
    Layout,
    /// The site configuration.
    Configuration,
    /// A code snippet.
    CodeSnippet,
    /// An item representation.
    ItemRep,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn display_forms() {
        assert_eq!(Reference::Item(id("/foo.md")).to_string(), "item:/foo.md");
        assert_eq!(
            Reference::Layout(id("/default.html")).to_string(),
            "layout:/default.html"
        );
        assert_eq!(Reference::Configuration.to_string(), "configuration");
        assert_eq!(
            Reference::CodeSnippet("lib/helpers.rb".into()).to_string(),
            "code_snippet:lib/helpers.rb"
        );
        assert_eq!(
            Reference::ItemRep(id("/foo.md"), RepName::default_rep()).to_string(),
            "item_rep:/foo.md:default"
        );
    }

    #[test]
    fn item_and_layout_with_same_identifier_differ() {
        assert_ne!(Reference::Item(id("/x")), Reference::Layout(id("/x")));
    }

    #[test]
    fn serde_roundtrip_is_stable() {
        let r = Reference::ItemRep(id("/a.md"), RepName::new("rss"));
        let json = serde_json::to_string(&r).unwrap();
        let back: Reference = serde_json::from_str(&json).unwrap();
        assert_eq!(back, r);
    }

    #[test]
    fn snapshot_names() {
        assert_eq!(SnapshotName::write(3).as_str(), "_3");
        assert_eq!(format!("{:?}", SnapshotName::last()), ":last");
        assert_eq!(SnapshotName::from("pre"), SnapshotName::pre());
    }

    #[test]
    fn kind_and_identifier() {
        let r = Reference::ItemRep(id("/a.md"), RepName::default_rep());
        assert_eq!(r.kind(), ObjectKind::ItemRep);
        assert_eq!(r.identifier(), Some(&id("/a.md")));
        assert_eq!(Reference::Configuration.identifier(), None);
    }
}
