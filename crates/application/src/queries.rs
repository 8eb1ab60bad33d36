//! Validated, composable read operations over one tenant graph.

use std::collections::BTreeSet;

use serde::Serialize;

use aclgraph_core::{AppError, AppResult};
use aclgraph_domain::{Entity, EntityGraph, EntityId, EntityKind, EntityRef, PermissionId};

mod hierarchy;
mod listing;
mod lookup;
mod membership;
mod permissions;

pub use hierarchy::{
    CheckGroupCycleQuery, GetAncestorsQuery, GetChildGroupsQuery, GetDescendantsQuery,
    GetParentGroupsQuery,
};
pub use listing::{
    CountEntitiesQuery, EntityFilter, EntityPage, ListEntitiesQuery, ListEntitiesWithCountQuery,
    MAX_PAGE_SIZE,
};
pub use lookup::GetEntityQuery;
pub use membership::{
    GetGroupMembersQuery, GetRoleUsersQuery, GetUserGroupsQuery, GetUserRolesQuery,
};
pub use permissions::{
    AccessDecision, CheckEntityPermissionQuery, EvaluatePermissionQuery, GetEntityPermissionsQuery,
};

/// A read operation with an explicit validation step.
///
/// `validate` runs before any traversal so malformed parameters are always
/// reported as [`AppError::Validation`].
pub trait Query {
    /// Typed result.
    type Output;

    /// Rejects missing fields, non-positive ids or paging and malformed enums.
    fn validate(&self) -> AppResult<()>;

    /// Executes against the graph. Assumes `validate` succeeded.
    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output>;

    /// Validates then executes.
    fn run(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        self.validate()?;
        self.execute(graph)
    }
}

/// Owned projection of one entity returned by queries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityView {
    /// Node kind.
    pub kind: EntityKind,
    /// Identifier.
    pub id: i64,
    /// Display name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Direct parents.
    pub parents: Vec<EntityRef>,
    /// Direct children.
    pub children: Vec<EntityRef>,
    /// Directly held permissions.
    pub permission_ids: Vec<PermissionId>,
}

impl From<&Entity> for EntityView {
    fn from(entity: &Entity) -> Self {
        Self {
            kind: entity.kind(),
            id: entity.id().value(),
            display_name: entity.display_name().as_str().to_owned(),
            description: entity.description().map(str::to_owned),
            parents: entity.parents().iter().copied().collect(),
            children: entity.children().iter().copied().collect(),
            permission_ids: entity.permission_ids().collect(),
        }
    }
}

pub(crate) fn positive_id(field: &str, value: i64) -> AppResult<EntityId> {
    EntityId::new(value).map_err(|_| {
        AppError::Validation(format!("{field} must be a positive id, got {value}"))
    })
}

pub(crate) fn required_text<'a>(field: &str, value: Option<&'a str>) -> AppResult<&'a str> {
    match value.map(str::trim) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(AppError::Validation(format!("{field} is required"))),
    }
}

pub(crate) fn existing(graph: &EntityGraph, reference: EntityRef) -> AppResult<&Entity> {
    graph
        .entity(reference)
        .ok_or_else(|| AppError::NotFound(format!("{reference} was not found")))
}

pub(crate) fn views<'a>(
    graph: &EntityGraph,
    references: impl IntoIterator<Item = &'a EntityRef>,
) -> Vec<EntityView> {
    references
        .into_iter()
        .filter_map(|reference| graph.entity(*reference))
        .map(EntityView::from)
        .collect()
}

/// Collects every entity reachable through parent edges.
///
/// The visited set keeps the walk finite and duplicate-free even if the
/// hierarchy were ever inconsistent.
pub(crate) fn ancestor_closure(graph: &EntityGraph, start: EntityRef) -> BTreeSet<EntityRef> {
    closure(graph, start, Entity::parents)
}

/// Collects every entity reachable through child edges.
pub(crate) fn descendant_closure(graph: &EntityGraph, start: EntityRef) -> BTreeSet<EntityRef> {
    closure(graph, start, Entity::children)
}

/// Walks one edge direction with an explicit stack; depth is bounded by the heap.
fn closure(
    graph: &EntityGraph,
    start: EntityRef,
    next: fn(&Entity) -> &BTreeSet<EntityRef>,
) -> BTreeSet<EntityRef> {
    let mut visited = BTreeSet::new();
    let mut pending = vec![start];

    while let Some(current) = pending.pop() {
        let Some(entity) = graph.entity(current) else {
            continue;
        };
        for reference in next(entity) {
            if visited.insert(*reference) {
                pending.push(*reference);
            }
        }
    }

    visited.remove(&start);
    visited
}

#[cfg(test)]
mod tests;
