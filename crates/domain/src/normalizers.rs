//! Single-edge bidirectional graph edits.
//!
//! Every normalizer takes resolved keys, edits exactly one edge on both of
//! its ends and reports whether anything changed. Normalizers do not check
//! existence, duplicates or cycles and perform no I/O; callers run those
//! checks before applying one.

use serde::{Deserialize, Serialize};

use crate::EntityGraph;

mod attachment;
mod hierarchy;
mod membership;
mod permissions;

pub use attachment::{AddRoleToGroup, RemoveRoleFromGroup};
pub use hierarchy::{AddGroupToGroup, RemoveGroupFromGroup};
pub use membership::{AddUserToGroup, AssignUserToRole, RemoveUserFromGroup, UnassignUserFromRole};
pub use permissions::{AddPermissionToEntity, RemovePermissionFromEntity};

/// Effect of one normalizer application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeChange {
    /// The edge was created.
    Added,
    /// The edge was removed.
    Removed,
    /// The edge was already in the requested state.
    Unchanged,
}

impl EdgeChange {
    /// Returns whether the graph changed.
    #[must_use]
    pub fn is_effective(&self) -> bool {
        !matches!(self, Self::Unchanged)
    }

    pub(crate) fn added(changed: bool) -> Self {
        if changed { Self::Added } else { Self::Unchanged }
    }

    pub(crate) fn removed(changed: bool) -> Self {
        if changed { Self::Removed } else { Self::Unchanged }
    }
}

/// A pure, idempotent edit of one graph edge.
pub trait Normalizer {
    /// Applies the edit to `graph`.
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange;
}
