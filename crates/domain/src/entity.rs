use std::collections::{BTreeMap, BTreeSet};

use aclgraph_core::NonEmptyString;
use serde::{Deserialize, Serialize};

use crate::{EntityId, EntityKind, EntityRef, PermissionId, PermissionScheme};

/// One graph node: a user, group or role with its direct edges.
///
/// Edges are stored as identifier sets on both ends; the graph never holds
/// references between nodes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    reference: EntityRef,
    display_name: NonEmptyString,
    description: Option<String>,
    schemes: BTreeMap<PermissionScheme, BTreeSet<PermissionId>>,
    parents: BTreeSet<EntityRef>,
    children: BTreeSet<EntityRef>,
}

impl Entity {
    /// Creates an entity without edges.
    #[must_use]
    pub fn new(reference: EntityRef, display_name: NonEmptyString) -> Self {
        Self {
            reference,
            display_name,
            description: None,
            schemes: BTreeMap::new(),
            parents: BTreeSet::new(),
            children: BTreeSet::new(),
        }
    }

    /// Sets an optional description.
    #[must_use]
    pub fn with_description(mut self, description: Option<String>) -> Self {
        self.description = description.filter(|value| !value.trim().is_empty());
        self
    }

    /// Returns the kind-qualified reference.
    #[must_use]
    pub fn reference(&self) -> EntityRef {
        self.reference
    }

    /// Returns the node kind.
    #[must_use]
    pub fn kind(&self) -> EntityKind {
        self.reference.kind
    }

    /// Returns the identifier.
    #[must_use]
    pub fn id(&self) -> EntityId {
        self.reference.id
    }

    /// Returns the display name.
    #[must_use]
    pub fn display_name(&self) -> &NonEmptyString {
        &self.display_name
    }

    /// Returns the description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Returns direct parents.
    #[must_use]
    pub fn parents(&self) -> &BTreeSet<EntityRef> {
        &self.parents
    }

    /// Returns direct children.
    #[must_use]
    pub fn children(&self) -> &BTreeSet<EntityRef> {
        &self.children
    }

    /// Returns direct parents of one kind.
    pub fn parents_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = EntityRef> + '_ {
        self.parents
            .iter()
            .copied()
            .filter(move |parent| parent.kind == kind)
    }

    /// Returns direct children of one kind.
    pub fn children_of_kind(&self, kind: EntityKind) -> impl Iterator<Item = EntityRef> + '_ {
        self.children
            .iter()
            .copied()
            .filter(move |child| child.kind == kind)
    }

    /// Returns the permission-scheme grouping of directly held permissions.
    #[must_use]
    pub fn schemes(&self) -> &BTreeMap<PermissionScheme, BTreeSet<PermissionId>> {
        &self.schemes
    }

    /// Returns every directly held permission id.
    pub fn permission_ids(&self) -> impl Iterator<Item = PermissionId> + '_ {
        self.schemes.values().flat_map(|ids| ids.iter().copied())
    }

    /// Returns whether the entity directly holds `permission_id`.
    #[must_use]
    pub fn holds_permission(&self, permission_id: PermissionId) -> bool {
        self.schemes
            .values()
            .any(|ids| ids.contains(&permission_id))
    }

    /// Replaces name and description, keeping every edge.
    pub fn rename(&mut self, display_name: NonEmptyString, description: Option<String>) {
        self.display_name = display_name;
        self.description = description.filter(|value| !value.trim().is_empty());
    }

    pub(crate) fn insert_parent(&mut self, parent: EntityRef) -> bool {
        self.parents.insert(parent)
    }

    pub(crate) fn remove_parent(&mut self, parent: &EntityRef) -> bool {
        self.parents.remove(parent)
    }

    pub(crate) fn insert_child(&mut self, child: EntityRef) -> bool {
        self.children.insert(child)
    }

    pub(crate) fn remove_child(&mut self, child: &EntityRef) -> bool {
        self.children.remove(child)
    }

    pub(crate) fn insert_permission(
        &mut self,
        scheme: PermissionScheme,
        permission_id: PermissionId,
    ) -> bool {
        self.schemes.entry(scheme).or_default().insert(permission_id)
    }

    /// Removes a permission and drops its scheme group once empty.
    pub(crate) fn remove_permission(
        &mut self,
        scheme: PermissionScheme,
        permission_id: PermissionId,
    ) -> bool {
        let Some(ids) = self.schemes.get_mut(&scheme) else {
            return false;
        };

        let removed = ids.remove(&permission_id);
        if ids.is_empty() {
            self.schemes.remove(&scheme);
        }

        removed
    }

    pub(crate) fn take_edges(&mut self) -> (BTreeSet<EntityRef>, BTreeSet<EntityRef>) {
        (
            std::mem::take(&mut self.parents),
            std::mem::take(&mut self.children),
        )
    }
}
