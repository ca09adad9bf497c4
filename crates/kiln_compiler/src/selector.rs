//! Ordering rep compilation around forward references.
//!
//! No static order is computed. A rep is attempted; if it needs a rep that
//! is not compiled yet, that rep is attempted next and the first one is
//! retried afterwards. The selector is a stack of reps in progress on top of
//! the list of initial candidates.

use std::collections::{HashSet, VecDeque};
use std::hash::Hash;

/// Picks the next rep to attempt.
///
/// Call [`next_rep`](Self::next_rep), attempt the rep, then report exactly
/// one of [`completed`](Self::completed), [`failed`](Self::failed) or
/// [`suspended`](Self::suspended).
#[derive(Debug)]
pub struct ItemRepSelector<T> {
    candidates: VecDeque<T>,
    scheduled: HashSet<T>,
    stack: Vec<T>,
}

impl<T: Clone + Eq + Hash> ItemRepSelector<T> {
    /// Creates a selector that attempts `candidates` in order.
    pub fn new(candidates: impl IntoIterator<Item = T>) -> Self {
        Self {
            candidates: candidates.into_iter().collect(),
            scheduled: HashSet::new(),
            stack: Vec::new(),
        }
    }

    /// The rep to attempt next.
    ///
    /// The most recently discovered dependency comes first, then the rep that
    /// waits on it, and so on down the stack. When the stack is empty the next
    /// candidate not yet scheduled is taken.
    pub fn next_rep(&mut self) -> Option<T> {
        if let Some(top) = self.stack.last() {
            return Some(top.clone());
        }
        while let Some(candidate) = self.candidates.pop_front() {
            if self.scheduled.insert(candidate.clone()) {
                self.stack.push(candidate.clone());
                return Some(candidate);
            }
        }
        None
    }

    /// The last rep returned compiled successfully.
    pub fn completed(&mut self) {
        self.stack.pop();
    }

    /// The last rep returned cannot be compiled.
    pub fn failed(&mut self) {
        self.stack.pop();
    }

    /// The last rep returned needs `dependency` first.
    ///
    /// Returns the cycle, starting at `dependency`, if `dependency` is already
    /// waiting (directly or not) on the rep that just suspended.
    pub fn suspended(&mut self, dependency: T) -> Result<(), Vec<T>> {
        if let Some(pos) = self.stack.iter().position(|r| *r == dependency) {
            return Err(self.stack[pos..].to_vec());
        }
        self.scheduled.insert(dependency.clone());
        self.stack.push(dependency);
        Ok(())
    }
}
