//! Turning nested object visits into dependency edges.

use kiln_common::{InternalError, KilnResult};
use kiln_model::{Dependency, Props, Reference};

/// A stack of the objects currently being compiled.
///
/// Entering an object while another is on top records that the top depends
/// on it. Recorded edges are buffered until [`take_recorded`](Self::take_recorded),
/// so a compilation attempt can be abandoned and its edges still kept.
#[derive(Debug, Default)]
pub struct DependencyTracker {
    /// Objects being compiled, innermost last.
    stack: Vec<Reference>,
    /// Edges recorded since the last take.
    recorded: Vec<Dependency>,
}

impl DependencyTracker {
    /// Creates a tracker with an empty stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Pushes `object`. If another object was on top, it now depends on
    /// `object` in the aspects `props`.
    ///
    /// Returns the recorded edge, if any. Self-dependencies and empty props
    /// record nothing.
    pub fn enter(&mut self, object: Reference, props: Props) -> Option<Dependency> {
        let edge = match self.stack.last() {
            Some(top) if *top != object && !props.is_empty() => {
                Some(Dependency::new(Some(object.clone()), top.clone(), props))
            }
            _ => None,
        };
        if let Some(edge) = &edge {
            self.recorded.push(edge.clone());
        }
        self.stack.push(object);
        edge
    }

    /// Pops `object`, which must be on top of the stack.
    pub fn exit(&mut self, object: &Reference) -> KilnResult<()> {
        match self.stack.pop() {
            Some(top) if &top == object => Ok(()),
            Some(top) => Err(InternalError::new(format!(
                "dependency tracker: exiting {object} but {top} is on top"
            ))),
            None => Err(InternalError::new(format!(
                "dependency tracker: exiting {object} with an empty stack"
            ))),
        }
    }

    /// Enters and immediately exits `object`.
    pub fn bounce(&mut self, object: Reference, props: Props) -> Option<Dependency> {
        let edge = self.enter(object, props);
        self.stack.pop();
        edge
    }

    /// The object on top of the stack.
    pub fn top(&self) -> Option<&Reference> {
        self.stack.last()
    }

    /// Takes the edges recorded so far.
    pub fn take_recorded(&mut self) -> Vec<Dependency> {
        std::mem::take(&mut self.recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_common::Identifier;

    fn item(id: &str) -> Reference {
        Reference::Item(Identifier::new(id).unwrap())
    }

    #[test]
    fn nested_enter_records_from_inner_to_outer() {
        let mut tracker = DependencyTracker::new();
        assert_eq!(tracker.enter(item("/a.md"), Props::none()), None);
        let edge = tracker.enter(item("/b.md"), Props::compiled_content()).unwrap();
        assert_eq!(edge.from, Some(item("/b.md")));
        assert_eq!(edge.to, item("/a.md"));
        tracker.exit(&item("/b.md")).unwrap();
        tracker.exit(&item("/a.md")).unwrap();
        assert_eq!(tracker.take_recorded().len(), 1);
        assert!(tracker.take_recorded().is_empty());
    }

    #[test]
    fn bounce_leaves_stack_unchanged() {
        let mut tracker = DependencyTracker::new();
        tracker.enter(item("/a.md"), Props::none());
        tracker.bounce(item("/b.md"), Props::attributes());
        tracker.bounce(Reference::Configuration, Props::attributes());
        assert_eq!(tracker.top(), Some(&item("/a.md")));
        let recorded = tracker.take_recorded();
        assert_eq!(recorded.len(), 2);
        assert_eq!(recorded[1].from, Some(Reference::Configuration));
    }

    #[test]
    fn self_dependency_and_empty_props_ignored() {
        let mut tracker = DependencyTracker::new();
        tracker.enter(item("/a.md"), Props::none());
        assert!(tracker.bounce(item("/a.md"), Props::all()).is_none());
        assert!(tracker.bounce(item("/b.md"), Props::none()).is_none());
        assert!(tracker.take_recorded().is_empty());
    }

    #[test]
    fn mismatched_exit_is_an_internal_error() {
        let mut tracker = DependencyTracker::new();
        tracker.enter(item("/a.md"), Props::none());
        let err = tracker.exit(&item("/b.md")).unwrap_err();
        assert!(err.to_string().contains("/b.md"));
        assert!(DependencyTracker::new().exit(&item("/a.md")).is_err());
    }
}
