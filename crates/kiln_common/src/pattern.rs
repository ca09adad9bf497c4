//! Identifier patterns used by rules and by `Site::find_all`.
//!
//! Three flavours exist:
//!
//! - **Glob**: `*` matches within one path segment, `**` crosses segments,
//!   `{a,b}` alternates. Backed by `globset`.
//! - **Regex**: an unanchored regular expression, written `%r{...}` when given
//!   as a plain string.
//! - **Legacy**: `/foo/*/` style, where `*` matches any run of characters and
//!   `+` matches at least one. Legacy patterns are compared against the
//!   identifier with its extension stripped and a trailing slash added.

use std::fmt;

use globset::{GlobBuilder, GlobMatcher};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::identifier::Identifier;

/// Errors produced when compiling a [`Pattern`].
#[derive(Debug, thiserror::Error)]
pub enum PatternError {
    /// A glob pattern failed to compile.
    #[error("invalid glob pattern '{pattern}': {source}")]
    Glob {
        /// The offending pattern.
        pattern: String,
        /// The underlying globset error.
        source: globset::Error,
    },
    /// A regular expression failed to compile.
    #[error("invalid regex pattern '{pattern}': {source}")]
    Regex {
        /// The offending pattern.
        pattern: String,
        /// The underlying regex error.
        source: regex::Error,
    },
}

/// How plain pattern strings are interpreted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StringPatternType {
    /// Shell-style globs (the default).
    #[default]
    Glob,
    /// Legacy `*`/`+` wildcard patterns.
    Legacy,
}

/// A compiled identifier pattern.
#[derive(Clone)]
pub enum Pattern {
    /// A glob pattern.
    Glob {
        /// The pattern as written.
        source: String,
        /// The compiled matcher.
        matcher: GlobMatcher,
    },
    /// A regular expression.
    Regex(Regex),
    /// A legacy wildcard pattern.
    Legacy {
        /// The pattern as written.
        source: String,
        /// The anchored regex it translates to.
        regex: Regex,
    },
}

impl Pattern {
    /// Parses a pattern string, honouring the `%r{...}` regex syntax and
    /// otherwise interpreting it according to `kind`.
    pub fn parse(s: &str, kind: StringPatternType) -> Result<Self, PatternError> {
        if let Some(inner) = s.strip_prefix("%r{").and_then(|r| r.strip_suffix('}')) {
            return Self::regex(inner);
        }
        match kind {
            StringPatternType::Glob => Self::glob(s),
            StringPatternType::Legacy => Self::legacy(s),
        }
    }

    /// Compiles a glob pattern.
    pub fn glob(s: &str) -> Result<Self, PatternError> {
        let glob = GlobBuilder::new(s)
            .literal_separator(true)
            .build()
            .map_err(|source| PatternError::Glob {
                pattern: s.to_string(),
                source,
            })?;
        Ok(Pattern::Glob {
            source: s.to_string(),
            matcher: glob.compile_matcher(),
        })
    }

    /// Compiles a regular expression pattern.
    pub fn regex(s: &str) -> Result<Self, PatternError> {
        Regex::new(s)
            .map(Pattern::Regex)
            .map_err(|source| PatternError::Regex {
                pattern: s.to_string(),
                source,
            })
    }

    /// Compiles a legacy wildcard pattern.
    pub fn legacy(s: &str) -> Result<Self, PatternError> {
        let mut normalized = String::with_capacity(s.len() + 2);
        if !s.starts_with('/') {
            normalized.push('/');
        }
        normalized.push_str(s);
        if !s.ends_with('/') {
            normalized.push('/');
        }

        let mut re = String::from("^");
        for ch in normalized.chars() {
            match ch {
                '*' => re.push_str("(.*?)"),
                '+' => re.push_str("(.+?)"),
                other => re.push_str(&regex::escape(&other.to_string())),
            }
        }
        re.push('$');

        let regex = Regex::new(&re).map_err(|source| PatternError::Regex {
            pattern: s.to_string(),
            source,
        })?;
        Ok(Pattern::Legacy {
            source: s.to_string(),
            regex,
        })
    }

    /// Returns true if `identifier` matches this pattern.
    pub fn matches(&self, identifier: &Identifier) -> bool {
        match self {
            Pattern::Glob { matcher, .. } => matcher.is_match(identifier.as_str()),
            Pattern::Regex(re) => re.is_match(identifier.as_str()),
            Pattern::Legacy { regex, .. } => {
                let base = identifier.without_ext();
                if base.ends_with('/') {
                    regex.is_match(base)
                } else {
                    regex.is_match(&format!("{base}/"))
                }
            }
        }
    }

    /// Returns the pattern as it was written.
    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Glob { source, .. } | Pattern::Legacy { source, .. } => source,
            Pattern::Regex(re) => re.as_str(),
        }
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pattern::Regex(re) => write!(f, "%r{{{}}}", re.as_str()),
            _ => f.write_str(self.as_str()),
        }
    }
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pattern({self})")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> Identifier {
        Identifier::new(s).unwrap()
    }

    #[test]
    fn glob_star_stays_in_segment() {
        let p = Pattern::glob("/*.md").unwrap();
        assert!(p.matches(&id("/foo.md")));
        assert!(!p.matches(&id("/blog/foo.md")));
    }

    #[test]
    fn glob_double_star_crosses_segments() {
        let p = Pattern::glob("/**/*.md").unwrap();
        assert!(p.matches(&id("/blog/2024/foo.md")));
        assert!(p.matches(&id("/foo.md")));
        assert!(!p.matches(&id("/foo.html")));
    }

    #[test]
    fn glob_alternation() {
        let p = Pattern::glob("/default.{html,erb}").unwrap();
        assert!(p.matches(&id("/default.html")));
        assert!(p.matches(&id("/default.erb")));
        assert!(!p.matches(&id("/default.txt")));
    }

    #[test]
    fn regex_syntax_in_plain_string() {
        let p = Pattern::parse("%r{^/blog/\\d+}", StringPatternType::Glob).unwrap();
        assert!(matches!(p, Pattern::Regex(_)));
        assert!(p.matches(&id("/blog/42-hello.md")));
        assert!(!p.matches(&id("/blog/hello.md")));
        assert_eq!(format!("{p}"), "%r{^/blog/\\d+}");
    }

    #[test]
    fn legacy_wildcards() {
        let p = Pattern::parse("/blog/*", StringPatternType::Legacy).unwrap();
        assert!(p.matches(&id("/blog/hello.md")));
        assert!(p.matches(&id("/blog/")));

        let plus = Pattern::legacy("/blog/+").unwrap();
        assert!(plus.matches(&id("/blog/hello.md")));
        assert!(!plus.matches(&id("/blog/")));
    }

    #[test]
    fn legacy_exact() {
        let p = Pattern::legacy("/about/").unwrap();
        assert!(p.matches(&id("/about.md")));
        assert!(!p.matches(&id("/about/team.md")));
    }

    #[test]
    fn invalid_patterns_error() {
        assert!(matches!(
            Pattern::glob("/[unclosed"),
            Err(PatternError::Glob { .. })
        ));
        assert!(matches!(
            Pattern::regex("(unclosed"),
            Err(PatternError::Regex { .. })
        ));
    }

    #[test]
    fn string_pattern_type_deserializes_lowercase() {
        let t: StringPatternType = serde_json::from_str("\"legacy\"").unwrap();
        assert_eq!(t, StringPatternType::Legacy);
        assert_eq!(StringPatternType::default(), StringPatternType::Glob);
    }
}
