//! Dependency edges as returned by the dependency store.

use crate::props::Props;
use crate::reference::Reference;

/// A dependency of `to` on `from`: if `from` becomes outdated in one of the
/// aspects in `props`, `to` is outdated too.
///
/// `from` is `None` when the object `to` depended on no longer exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dependency {
    /// The object causing outdatedness, or `None` for a removed object.
    pub from: Option<Reference>,
    /// The dependent object.
    pub to: Reference,
    /// The aspects of `from` that `to` depends on.
    pub props: Props,
}

impl Dependency {
    /// Creates a dependency edge.
    pub fn new(from: Option<Reference>, to: Reference, props: Props) -> Self {
        Self { from, to, props }
    }
}
