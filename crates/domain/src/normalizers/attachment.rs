use crate::{EntityGraph, GroupKey, RoleKey};

use super::{EdgeChange, Normalizer};

/// Attaches a role to a group so members of the group and its descendants
/// receive the role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddRoleToGroup {
    /// Attached role.
    pub role: RoleKey,
    /// Group receiving the role.
    pub group: GroupKey,
}

impl AddRoleToGroup {
    /// Returns the normalizer undoing this edit.
    #[must_use]
    pub fn inverse(self) -> RemoveRoleFromGroup {
        RemoveRoleFromGroup {
            role: self.role,
            group: self.group,
        }
    }
}

impl Normalizer for AddRoleToGroup {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::added(graph.link(self.group.reference(), self.role.reference()))
    }
}

/// Detaches a role from a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveRoleFromGroup {
    /// Attached role.
    pub role: RoleKey,
    /// Group losing the role.
    pub group: GroupKey,
}

impl Normalizer for RemoveRoleFromGroup {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::removed(graph.unlink(self.group.reference(), self.role.reference()))
    }
}
