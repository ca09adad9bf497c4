//! Path-like identifiers naming items and layouts.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Errors produced when constructing an [`Identifier`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdentifierError {
    /// The identifier does not begin with a slash.
    #[error("invalid identifier '{0}': identifiers must start with a slash")]
    MissingLeadingSlash(String),
}

/// A path-like identifier such as `/blog/hello.md`.
///
/// Identifiers are cheap to clone (reference counted) and compare by string
/// value. Documents are identified solely by their identifier.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Identifier(Arc<str>);

impl Identifier {
    /// Creates an identifier, rejecting strings that do not start with `/`.
    pub fn new(s: impl AsRef<str>) -> Result<Self, IdentifierError> {
        let s = s.as_ref();
        if !s.starts_with('/') {
            return Err(IdentifierError::MissingLeadingSlash(s.to_string()));
        }
        Ok(Self(Arc::from(s)))
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the final path component.
    pub fn basename(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or("")
    }

    /// Returns the extension of the final component, without the dot.
    pub fn ext(&self) -> Option<&str> {
        let base = self.basename();
        match base.rfind('.') {
            Some(0) | None => None,
            Some(idx) => Some(&base[idx + 1..]),
        }
    }

    /// Returns the identifier with the extension of the final component removed.
    pub fn without_ext(&self) -> &str {
        match self.ext() {
            Some(ext) => &self.0[..self.0.len() - ext.len() - 1],
            None => &self.0,
        }
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identifier({})", self.0)
    }
}

impl Serialize for Identifier {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for Identifier {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Identifier::new(s).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn requires_leading_slash() {
        assert!(Identifier::new("/foo.md").is_ok());
        assert_eq!(
            Identifier::new("foo.md").unwrap_err(),
            IdentifierError::MissingLeadingSlash("foo.md".to_string())
        );
    }

    #[test]
    fn ext_and_without_ext() {
        let id = Identifier::new("/blog/hello.world.md").unwrap();
        assert_eq!(id.ext(), Some("md"));
        assert_eq!(id.without_ext(), "/blog/hello.world");
        assert_eq!(id.basename(), "hello.world.md");
    }

    #[test]
    fn no_extension() {
        let id = Identifier::new("/about/").unwrap();
        assert_eq!(id.ext(), None);
        assert_eq!(id.without_ext(), "/about/");

        let dotfile = Identifier::new("/.htaccess").unwrap();
        assert_eq!(dotfile.ext(), None);
    }

    #[test]
    fn equality_by_string() {
        let a = Identifier::new("/a.md").unwrap();
        let b = Identifier::new("/a.md").unwrap();
        assert_eq!(a, b);
        assert_eq!(format!("{a}"), "/a.md");
    }

    #[test]
    fn serde_roundtrip_and_validation() {
        let id = Identifier::new("/x.html").unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"/x.html\"");
        let back: Identifier = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
        assert!(serde_json::from_str::<Identifier>("\"nope\"").is_err());
    }
}
