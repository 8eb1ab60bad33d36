use crate::{EntityGraph, EntityKey, Permission, PermissionKey};

use super::{EdgeChange, Normalizer};

/// Attaches a new permission to its holder and indexes it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AddPermissionToEntity {
    /// Holder of the permission.
    pub entity: EntityKey,
    /// Permission whose holder is `entity`.
    pub permission: Permission,
}

impl Normalizer for AddPermissionToEntity {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::added(graph.attach_permission(self.entity.reference(), self.permission))
    }
}

/// Detaches a permission from its holder.
///
/// The holder's scheme group disappears together with its last permission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemovePermissionFromEntity {
    /// Holder of the permission.
    pub entity: EntityKey,
    /// Permission to drop.
    pub permission: PermissionKey,
}

impl Normalizer for RemovePermissionFromEntity {
    fn apply(self, graph: &mut EntityGraph) -> EdgeChange {
        EdgeChange::removed(
            graph.detach_permission(self.entity.reference(), self.permission.id()),
        )
    }
}
