use crate::{EntityGraph, GroupKey, RoleKey, UserKey};

use super::{EdgeChange, Normalizer};

/// Makes a user a direct member of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddUserToGroup {
    /// Member.
    pub user: UserKey,
    /// Group gaining the member.
    pub group: GroupKey,
}

impl AddUserToGroup {
    /// Returns the normalizer undoing this edit.
    #[must_use]
    pub fn inverse(self) -> RemoveUserFromGroup {
        RemoveUserFromGroup {
            user: self.user,
            group: self.group,
        }
    }
}

impl Normalizer for AddUserToGroup {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::added(graph.link(self.group.reference(), self.user.reference()))
    }
}

/// Removes a direct group membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoveUserFromGroup {
    /// Member.
    pub user: UserKey,
    /// Group losing the member.
    pub group: GroupKey,
}

impl Normalizer for RemoveUserFromGroup {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::removed(graph.unlink(self.group.reference(), self.user.reference()))
    }
}

/// Assigns a role directly to a user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignUserToRole {
    /// Assignee.
    pub user: UserKey,
    /// Assigned role.
    pub role: RoleKey,
}

impl AssignUserToRole {
    /// Returns the normalizer undoing this edit.
    #[must_use]
    pub fn inverse(self) -> UnassignUserFromRole {
        UnassignUserFromRole {
            user: self.user,
            role: self.role,
        }
    }
}

impl Normalizer for AssignUserToRole {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::added(graph.link(self.role.reference(), self.user.reference()))
    }
}

/// Removes a direct role assignment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnassignUserFromRole {
    /// Assignee.
    pub user: UserKey,
    /// Assigned role.
    pub role: RoleKey,
}

impl Normalizer for UnassignUserFromRole {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::removed(graph.unlink(self.role.reference(), self.user.reference()))
    }
}
