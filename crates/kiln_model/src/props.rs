//! Dependency aspects.

use serde::{Deserialize, Serialize};

/// Which aspects of an object a dependency (or an outdatedness reason) covers.
///
/// The four flags are independent. Merging is per-field OR, so recording the
/// same dependency twice can only widen it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Props {
    /// The raw (uncompiled) content.
    pub raw_content: bool,
    /// The attributes.
    pub attributes: bool,
    /// The compiled content of any snapshot.
    pub compiled_content: bool,
    /// The output path.
    pub path: bool,
}

impl Props {
    /// No aspects.
    pub const fn none() -> Self {
        Self {
            raw_content: false,
            attributes: false,
            compiled_content: false,
            path: false,
        }
    }

    /// All four aspects.
    pub const fn all() -> Self {
        Self {
            raw_content: true,
            attributes: true,
            compiled_content: true,
            path: true,
        }
    }

    /// Only the raw content.
    pub const fn raw_content() -> Self {
        Self {
            raw_content: true,
            ..Self::none()
        }
    }

    /// Only the attributes.
    pub const fn attributes() -> Self {
        Self {
            attributes: true,
            ..Self::none()
        }
    }

    /// Only the compiled content.
    pub const fn compiled_content() -> Self {
        Self {
            compiled_content: true,
            ..Self::none()
        }
    }

    /// Only the path.
    pub const fn path() -> Self {
        Self {
            path: true,
            ..Self::none()
        }
    }

    /// Per-field OR.
    #[must_use]
    pub const fn merge(self, other: Props) -> Props {
        Props {
            raw_content: self.raw_content || other.raw_content,
            attributes: self.attributes || other.attributes,
            compiled_content: self.compiled_content || other.compiled_content,
            path: self.path || other.path,
        }
    }

    /// Per-field AND.
    #[must_use]
    pub const fn intersect(self, other: Props) -> Props {
        Props {
            raw_content: self.raw_content && other.raw_content,
            attributes: self.attributes && other.attributes,
            compiled_content: self.compiled_content && other.compiled_content,
            path: self.path && other.path,
        }
    }

    /// Returns true if no aspect is active.
    pub const fn is_empty(self) -> bool {
        !(self.raw_content || self.attributes || self.compiled_content || self.path)
    }

    /// Returns true if every aspect active in `other` is active here too.
    pub const fn contains(self, other: Props) -> bool {
        (self.raw_content || !other.raw_content)
            && (self.attributes || !other.attributes)
            && (self.compiled_content || !other.compiled_content)
            && (self.path || !other.path)
    }

    /// Names of the active aspects, in declaration order.
    pub fn active(self) -> Vec<&'static str> {
        let mut names = Vec::new();
        if self.raw_content {
            names.push("raw_content");
        }
        if self.attributes {
            names.push("attributes");
        }
        if self.compiled_content {
            names.push("compiled_content");
        }
        if self.path {
            names.push("path");
        }
        names
    }
}

impl std::fmt::Display for Props {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{{{}}}", self.active().join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn every_props() -> Vec<Props> {
        (0u8..16)
            .map(|bits| Props {
                raw_content: bits & 1 != 0,
                attributes: bits & 2 != 0,
                compiled_content: bits & 4 != 0,
                path: bits & 8 != 0,
            })
            .collect()
    }

    #[test]
    fn merge_is_commutative_associative_idempotent() {
        let all = every_props();
        for &a in &all {
            assert_eq!(a.merge(a), a);
            for &b in &all {
                assert_eq!(a.merge(b), b.merge(a));
                for &c in &all {
                    assert_eq!(a.merge(b).merge(c), a.merge(b.merge(c)));
                }
            }
        }
    }

    #[test]
    fn merge_with_none_is_identity() {
        for p in every_props() {
            assert_eq!(p.merge(Props::none()), p);
            assert_eq!(p.merge(Props::all()), Props::all());
        }
    }

    #[test]
    fn intersect_and_contains() {
        let rc = Props::raw_content().merge(Props::compiled_content());
        assert_eq!(rc.intersect(Props::compiled_content()), Props::compiled_content());
        assert!(rc.intersect(Props::path()).is_empty());
        assert!(Props::all().contains(rc));
        assert!(!rc.contains(Props::path()));
        assert!(rc.contains(Props::none()));
    }

    #[test]
    fn active_names() {
        assert!(Props::none().active().is_empty());
        assert_eq!(
            Props::all().active(),
            vec!["raw_content", "attributes", "compiled_content", "path"]
        );
        assert_eq!(format!("{}", Props::path()), "{path}");
    }
}
