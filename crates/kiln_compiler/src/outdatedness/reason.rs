//! Why an object is outdated.

use std::fmt;

use kiln_model::Props;

/// A reason an object must be recompiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutdatednessReason {
    /// A code snippet was added, changed or removed.
    CodeSnippetsModified,
    /// The site configuration changed.
    ConfigurationModified,
    /// The action sequence changed, or that of a layout used last time.
    RulesModified,
    /// The raw content changed.
    ContentModified,
    /// Attributes changed.
    AttributesModified {
        /// The changed keys, empty when they are unknown.
        keys: Vec<String>,
    },
    /// An output file is missing.
    NotWritten,
    /// Output paths changed.
    PathsModified,
    /// An object this one depends on is outdated.
    DependenciesOutdated,
    /// A filter in the action sequence is always outdated.
    UsesAlwaysOutdatedFilter,
}

impl OutdatednessReason {
    /// The aspects this reason makes outdated.
    pub fn affects(&self) -> Props {
        match self {
            OutdatednessReason::CodeSnippetsModified
            | OutdatednessReason::ConfigurationModified => Props::all(),
            OutdatednessReason::RulesModified => Props {
                compiled_content: true,
                path: true,
                ..Props::none()
            },
            OutdatednessReason::ContentModified => Props {
                raw_content: true,
                compiled_content: true,
                ..Props::none()
            },
            OutdatednessReason::AttributesModified { .. } => Props {
                attributes: true,
                compiled_content: true,
                ..Props::none()
            },
            OutdatednessReason::NotWritten | OutdatednessReason::UsesAlwaysOutdatedFilter => {
                Props {
                    raw_content: true,
                    attributes: true,
                    compiled_content: true,
                    path: false,
                }
            }
            OutdatednessReason::PathsModified => Props::path(),
            OutdatednessReason::DependenciesOutdated => Props::compiled_content(),
        }
    }

    /// A sentence explaining the reason.
    pub fn message(&self) -> &'static str {
        match self {
            OutdatednessReason::CodeSnippetsModified => {
                "The code snippets have been modified since the last time the site was compiled."
            }
            OutdatednessReason::ConfigurationModified => {
                "The site configuration has been modified since the last time the site was compiled."
            }
            OutdatednessReason::RulesModified => {
                "The rules file has been modified since the last time the site was compiled."
            }
            OutdatednessReason::ContentModified => {
                "The content of this item has been modified since the last time the site was compiled."
            }
            OutdatednessReason::AttributesModified { .. } => {
                "The attributes of this item have been modified since the last time the site was compiled."
            }
            OutdatednessReason::NotWritten => "This item representation has not yet been written to the output directory (but it does have a path).",
            OutdatednessReason::PathsModified => {
                "One or more output paths of this item have been modified since the last time the site was compiled."
            }
            OutdatednessReason::DependenciesOutdated => {
                "This item uses content or attributes that have changed since the last time the site was compiled."
            }
            OutdatednessReason::UsesAlwaysOutdatedFilter => {
                "This item rep uses one or more filters that cannot track dependencies, and will thus always be considered as outdated."
            }
        }
    }

    /// A short identifier for the reason.
    pub fn name(&self) -> &'static str {
        match self {
            OutdatednessReason::CodeSnippetsModified => "code_snippets_modified",
            OutdatednessReason::ConfigurationModified => "configuration_modified",
            OutdatednessReason::RulesModified => "rules_modified",
            OutdatednessReason::ContentModified => "content_modified",
            OutdatednessReason::AttributesModified { .. } => "attributes_modified",
            OutdatednessReason::NotWritten => "not_written",
            OutdatednessReason::PathsModified => "paths_modified",
            OutdatednessReason::DependenciesOutdated => "dependencies_outdated",
            OutdatednessReason::UsesAlwaysOutdatedFilter => "uses_always_outdated_filter",
        }
    }
}

impl fmt::Display for OutdatednessReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutdatednessReason::AttributesModified { keys } if !keys.is_empty() => {
                write!(f, "{} ({})", self.name(), keys.join(", "))
            }
            other => f.write_str(other.name()),
        }
    }
}

/// The reasons found for one object and the union of what they affect.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutdatednessStatus {
    reasons: Vec<OutdatednessReason>,
    props: Props,
}

impl OutdatednessStatus {
    /// A status with no reasons.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a reason, widening the affected props.
    pub fn add(&mut self, reason: OutdatednessReason) {
        self.props = self.props.merge(reason.affects());
        self.reasons.push(reason);
    }

    /// Adds every reason of `other` not already present.
    pub fn merge(&mut self, other: &OutdatednessStatus) {
        for reason in &other.reasons {
            if !self.reasons.contains(reason) {
                self.add(reason.clone());
            }
        }
    }

    /// The reasons, in rule order.
    pub fn reasons(&self) -> &[OutdatednessReason] {
        &self.reasons
    }

    /// The union of the affected props.
    pub fn props(&self) -> Props {
        self.props
    }

    /// Returns true if there is at least one reason.
    pub fn is_outdated(&self) -> bool {
        !self.reasons.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_accumulates_props() {
        let mut status = OutdatednessStatus::new();
        assert!(!status.is_outdated());
        status.add(OutdatednessReason::PathsModified);
        status.add(OutdatednessReason::ContentModified);
        assert_eq!(
            status.props(),
            Props {
                raw_content: true,
                compiled_content: true,
                path: true,
                attributes: false,
            }
        );
        assert_eq!(status.reasons().len(), 2);
    }

    #[test]
    fn merge_skips_duplicates() {
        let mut a = OutdatednessStatus::new();
        a.add(OutdatednessReason::NotWritten);
        let mut b = OutdatednessStatus::new();
        b.add(OutdatednessReason::NotWritten);
        b.add(OutdatednessReason::RulesModified);
        a.merge(&b);
        assert_eq!(
            a.reasons(),
            &[OutdatednessReason::NotWritten, OutdatednessReason::RulesModified]
        );
    }

    #[test]
    fn display_names_keys() {
        let reason = OutdatednessReason::AttributesModified {
            keys: vec!["title".into(), "tags".into()],
        };
        assert_eq!(reason.to_string(), "attributes_modified (title, tags)");
        assert_eq!(OutdatednessReason::NotWritten.to_string(), "not_written");
        assert!(Props::all().contains(OutdatednessReason::ContentModified.affects()));
    }
}
