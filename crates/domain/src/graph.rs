use std::collections::BTreeMap;

use serde::Serialize;

use crate::{
    Entity, EntityId, EntityKind, EntityRef, HttpVerb, Permission, PermissionId,
    PermissionScheme, ResourcePattern,
};

mod integrity;
mod keys;

pub use keys::{EntityKey, GroupKey, PermissionKey, RoleKey, UserKey};

/// In-memory authorization graph of one tenant.
///
/// The graph is a plain indexed container. It enforces bidirectional edge
/// bookkeeping but no business rules: existence, duplicate and cycle checks
/// belong to the caller that decides to mutate it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EntityGraph {
    users: BTreeMap<EntityId, Entity>,
    groups: BTreeMap<EntityId, Entity>,
    roles: BTreeMap<EntityId, Entity>,
    permissions: BTreeMap<PermissionId, Permission>,
    next_user_id: i64,
    next_group_id: i64,
    next_role_id: i64,
    next_permission_id: i64,
    version: u64,
}

impl EntityGraph {
    /// Creates an empty graph.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a counter bumped by every effective mutation.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Looks up one entity by kind and id.
    #[must_use]
    pub fn get(&self, kind: EntityKind, id: EntityId) -> Option<&Entity> {
        self.collection(kind).get(&id)
    }

    /// Looks up one entity by reference.
    #[must_use]
    pub fn entity(&self, reference: EntityRef) -> Option<&Entity> {
        self.get(reference.kind, reference.id)
    }

    /// Returns every entity of one kind in id order.
    pub fn entities(&self, kind: EntityKind) -> impl Iterator<Item = &Entity> {
        self.collection(kind).values()
    }

    /// Returns every user in id order.
    pub fn users(&self) -> impl Iterator<Item = &Entity> {
        self.users.values()
    }

    /// Returns every group in id order.
    pub fn groups(&self) -> impl Iterator<Item = &Entity> {
        self.groups.values()
    }

    /// Returns every role in id order.
    pub fn roles(&self) -> impl Iterator<Item = &Entity> {
        self.roles.values()
    }

    /// Returns the number of entities of one kind.
    #[must_use]
    pub fn count(&self, kind: EntityKind) -> usize {
        self.collection(kind).len()
    }

    /// Looks up one permission.
    #[must_use]
    pub fn permission(&self, id: PermissionId) -> Option<&Permission> {
        self.permissions.get(&id)
    }

    /// Returns every permission in id order.
    pub fn permissions(&self) -> impl Iterator<Item = &Permission> {
        self.permissions.values()
    }

    /// Returns the permissions directly held by an entity.
    pub fn permissions_of(&self, reference: EntityRef) -> impl Iterator<Item = &Permission> {
        self.entity(reference)
            .into_iter()
            .flat_map(|entity| entity.permission_ids())
            .filter_map(|id| self.permissions.get(&id))
    }

    /// Finds the permission occupying a (holder, resource, verb, scheme) slot.
    #[must_use]
    pub fn find_permission(
        &self,
        holder: EntityRef,
        resource: &ResourcePattern,
        verb: HttpVerb,
        scheme: PermissionScheme,
    ) -> Option<&Permission> {
        self.permissions_of(holder)
            .find(|permission| permission.same_slot(holder, resource, verb, scheme))
    }

    /// Resolves a reference into a key usable by normalizers.
    #[must_use]
    pub fn resolve(&self, reference: EntityRef) -> Option<EntityKey> {
        self.entity(reference).map(|_| EntityKey::new(reference))
    }

    /// Resolves a user id.
    #[must_use]
    pub fn resolve_user(&self, id: EntityId) -> Option<UserKey> {
        self.users.contains_key(&id).then(|| UserKey::new(id))
    }

    /// Resolves a group id.
    #[must_use]
    pub fn resolve_group(&self, id: EntityId) -> Option<GroupKey> {
        self.groups.contains_key(&id).then(|| GroupKey::new(id))
    }

    /// Resolves a role id.
    #[must_use]
    pub fn resolve_role(&self, id: EntityId) -> Option<RoleKey> {
        self.roles.contains_key(&id).then(|| RoleKey::new(id))
    }

    /// Resolves a permission id.
    #[must_use]
    pub fn resolve_permission(&self, id: PermissionId) -> Option<PermissionKey> {
        self.permissions
            .get(&id)
            .map(|permission| PermissionKey::new(id, permission.holder()))
    }

    /// Allocates the next unused id for `kind`.
    ///
    /// Ids are never handed out twice, including ids of deleted entities.
    pub fn allocate_id(&mut self, kind: EntityKind) -> EntityId {
        let counter = self.counter_mut(kind);
        *counter = (*counter).max(1);
        let value = *counter;
        *counter = counter.saturating_add(1);
        EntityId::from_counter(value)
    }

    /// Allocates the next unused permission id.
    pub fn allocate_permission_id(&mut self) -> PermissionId {
        self.next_permission_id = self.next_permission_id.max(1);
        let value = self.next_permission_id;
        self.next_permission_id = self.next_permission_id.saturating_add(1);
        PermissionId::from_counter(value)
    }

    /// Inserts a new edge-free entity or renames an existing one in place.
    ///
    /// Edges carried by `entity` are ignored; edges are only created through
    /// normalizers.
    pub fn upsert(&mut self, entity: Entity) {
        let reference = entity.reference();
        let display_name = entity.display_name().clone();
        let description = entity.description().map(str::to_owned);

        let counter = self.counter_mut(reference.kind);
        *counter = (*counter).max(reference.id.value().saturating_add(1));

        match self.collection_mut(reference.kind).get_mut(&reference.id) {
            Some(existing) => existing.rename(display_name, description),
            None => {
                self.collection_mut(reference.kind).insert(
                    reference.id,
                    Entity::new(reference, display_name).with_description(description),
                );
            }
        }
        self.version += 1;
    }

    /// Removes an entity, every edge that references it and its permissions.
    pub fn remove(&mut self, reference: EntityRef) -> Option<Entity> {
        let mut removed = self.collection_mut(reference.kind).remove(&reference.id)?;
        let (parents, children) = removed.take_edges();

        for parent in parents {
            if let Some(entity) = self.entity_mut(parent) {
                entity.remove_child(&reference);
            }
        }
        for child in children {
            if let Some(entity) = self.entity_mut(child) {
                entity.remove_parent(&reference);
            }
        }

        let permission_ids: Vec<PermissionId> = removed.permission_ids().collect();
        for permission_id in permission_ids {
            if let Some(permission) = self.permissions.remove(&permission_id) {
                removed.remove_permission(permission.scheme(), permission_id);
            }
        }

        self.version += 1;
        Some(removed)
    }

    pub(crate) fn link(&mut self, parent: EntityRef, child: EntityRef) -> bool {
        if self.entity(parent).is_none() || self.entity(child).is_none() {
            return false;
        }

        let mut changed = false;
        if let Some(entity) = self.entity_mut(parent) {
            changed |= entity.insert_child(child);
        }
        if let Some(entity) = self.entity_mut(child) {
            changed |= entity.insert_parent(parent);
        }
        if changed {
            self.version += 1;
        }

        changed
    }

    pub(crate) fn unlink(&mut self, parent: EntityRef, child: EntityRef) -> bool {
        let mut changed = false;
        if let Some(entity) = self.entity_mut(parent) {
            changed |= entity.remove_child(&child);
        }
        if let Some(entity) = self.entity_mut(child) {
            changed |= entity.remove_parent(&parent);
        }
        if changed {
            self.version += 1;
        }

        changed
    }

    pub(crate) fn attach_permission(&mut self, holder: EntityRef, permission: Permission) -> bool {
        if permission.holder() != holder || self.permissions.contains_key(&permission.id()) {
            return false;
        }

        let Some(entity) = self.entity_mut(holder) else {
            return false;
        };
        entity.insert_permission(permission.scheme(), permission.id());

        if permission.id().value() >= self.next_permission_id {
            self.next_permission_id = permission.id().value().saturating_add(1);
        }
        self.permissions.insert(permission.id(), permission);
        self.version += 1;

        true
    }

    pub(crate) fn detach_permission(
        &mut self,
        holder: EntityRef,
        permission_id: PermissionId,
    ) -> bool {
        let Some(permission) = self.permissions.get(&permission_id) else {
            return false;
        };
        if permission.holder() != holder {
            return false;
        }

        let scheme = permission.scheme();
        self.permissions.remove(&permission_id);
        if let Some(entity) = self.entity_mut(holder) {
            entity.remove_permission(scheme, permission_id);
        }
        self.version += 1;

        true
    }

    fn entity_mut(&mut self, reference: EntityRef) -> Option<&mut Entity> {
        self.collection_mut(reference.kind).get_mut(&reference.id)
    }

    fn collection(&self, kind: EntityKind) -> &BTreeMap<EntityId, Entity> {
        match kind {
            EntityKind::User => &self.users,
            EntityKind::Group => &self.groups,
            EntityKind::Role => &self.roles,
        }
    }

    fn collection_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<EntityId, Entity> {
        match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Group => &mut self.groups,
            EntityKind::Role => &mut self.roles,
        }
    }

    fn counter_mut(&mut self, kind: EntityKind) -> &mut i64 {
        match kind {
            EntityKind::User => &mut self.next_user_id,
            EntityKind::Group => &mut self.next_group_id,
            EntityKind::Role => &mut self.next_role_id,
        }
    }
}
