use crate::{EntityId, EntityKind, EntityRef, PermissionId};

/// Reference to an entity that was found in the graph.
///
/// Only [`crate::EntityGraph`] lookups produce keys, so normalizers never
/// receive unresolved identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EntityKey(EntityRef);

impl EntityKey {
    pub(crate) fn new(reference: EntityRef) -> Self {
        Self(reference)
    }

    /// Returns the resolved reference.
    #[must_use]
    pub fn reference(&self) -> EntityRef {
        self.0
    }
}

/// Resolved user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UserKey(EntityId);

impl UserKey {
    pub(crate) fn new(id: EntityId) -> Self {
        Self(id)
    }

    /// Returns the resolved reference.
    #[must_use]
    pub fn reference(&self) -> EntityRef {
        EntityRef::new(EntityKind::User, self.0)
    }
}

/// Resolved group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GroupKey(EntityId);

impl GroupKey {
    pub(crate) fn new(id: EntityId) -> Self {
        Self(id)
    }

    /// Returns the resolved reference.
    #[must_use]
    pub fn reference(&self) -> EntityRef {
        EntityRef::new(EntityKind::Group, self.0)
    }
}

/// Resolved role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RoleKey(EntityId);

impl RoleKey {
    pub(crate) fn new(id: EntityId) -> Self {
        Self(id)
    }

    /// Returns the resolved reference.
    #[must_use]
    pub fn reference(&self) -> EntityRef {
        EntityRef::new(EntityKind::Role, self.0)
    }
}

/// Resolved permission together with its holder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PermissionKey {
    id: PermissionId,
    holder: EntityRef,
}

impl PermissionKey {
    pub(crate) fn new(id: PermissionId, holder: EntityRef) -> Self {
        Self { id, holder }
    }

    /// Returns the permission id.
    #[must_use]
    pub fn id(&self) -> PermissionId {
        self.id
    }

    /// Returns the entity holding the permission.
    #[must_use]
    pub fn holder(&self) -> EntityRef {
        self.holder
    }
}

impl From<UserKey> for EntityKey {
    fn from(value: UserKey) -> Self {
        Self(value.reference())
    }
}

impl From<GroupKey> for EntityKey {
    fn from(value: GroupKey) -> Self {
        Self(value.reference())
    }
}

impl From<RoleKey> for EntityKey {
    fn from(value: RoleKey) -> Self {
        Self(value.reference())
    }
}
