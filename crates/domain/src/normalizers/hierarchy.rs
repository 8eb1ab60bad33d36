use crate::{EntityGraph, GroupKey};

use super::{EdgeChange, Normalizer};

/// Nests `child` directly under `parent`.
///
/// The caller must have rejected edges that would close a cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddGroupToGroup {
    /// Nested group.
    pub child: GroupKey,
    /// Containing group.
    pub parent: GroupKey,
}

impl AddGroupToGroup {
    /// Returns the normalizer undoing this edit.
    #[must_use]
    pub fn inverse(self) -> RemoveGroupFromGroup {
        RemoveGroupFromGroup {
            child: self.child,
            parent: self.parent,
        }
    }
}

impl Normalizer for AddGroupToGroup {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::added(graph.link(self.parent.reference(), self.child.reference()))
    }
}

/// Removes the nesting of `child` under `parent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveGroupFromGroup {
    /// Nested group.
    pub child: GroupKey,
    /// Containing group.
    pub parent: GroupKey,
}

impl Normalizer for RemoveGroupFromGroup {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::removed(graph.unlink(self.parent.reference(), self.child.reference()))
    }
}
