use aclgraph_core::{AppError, AppResult};
use aclgraph_domain::{EntityGraph, EntityKind, EntityRef};

use super::{
    EntityView, Query, ancestor_closure, descendant_closure, existing, positive_id, views,
};

/// Transitive parents of an entity, optionally restricted to one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetAncestorsQuery {
    /// Start entity kind.
    pub kind: EntityKind,
    /// Start entity id.
    pub id: i64,
    /// Keep only ancestors of this kind.
    pub only: Option<EntityKind>,
}

impl Query for GetAncestorsQuery {
    type Output = Vec<EntityRef>;

    fn validate(&self) -> AppResult<()> {
        positive_id("id", self.id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let start = EntityRef::new(self.kind, positive_id("id", self.id)?);
        existing(graph, start)?;

        Ok(ancestor_closure(graph, start)
            .into_iter()
            .filter(|reference| self.only.is_none_or(|kind| reference.kind == kind))
            .collect())
    }
}

/// Transitive children of an entity, optionally restricted to one kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetDescendantsQuery {
    /// Start entity kind.
    pub kind: EntityKind,
    /// Start entity id.
    pub id: i64,
    /// Keep only descendants of this kind.
    pub only: Option<EntityKind>,
}

impl Query for GetDescendantsQuery {
    type Output = Vec<EntityRef>;

    fn validate(&self) -> AppResult<()> {
        positive_id("id", self.id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let start = EntityRef::new(self.kind, positive_id("id", self.id)?);
        existing(graph, start)?;

        Ok(descendant_closure(graph, start)
            .into_iter()
            .filter(|reference| self.only.is_none_or(|kind| reference.kind == kind))
            .collect())
    }
}

/// Direct parent groups of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetParentGroupsQuery {
    /// Group id.
    pub group_id: i64,
}

impl Query for GetParentGroupsQuery {
    type Output = Vec<EntityView>;

    fn validate(&self) -> AppResult<()> {
        positive_id("group_id", self.group_id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let group = existing(
            graph,
            EntityRef::group(positive_id("group_id", self.group_id)?),
        )?;
        let parents: Vec<EntityRef> = group.parents_of_kind(EntityKind::Group).collect();

        Ok(views(graph, &parents))
    }
}

/// Direct child groups of a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetChildGroupsQuery {
    /// Group id.
    pub group_id: i64,
}

impl Query for GetChildGroupsQuery {
    type Output = Vec<EntityView>;

    fn validate(&self) -> AppResult<()> {
        positive_id("group_id", self.group_id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let group = existing(
            graph,
            EntityRef::group(positive_id("group_id", self.group_id)?),
        )?;
        let children: Vec<EntityRef> = group.children_of_kind(EntityKind::Group).collect();

        Ok(views(graph, &children))
    }
}

/// Decides whether nesting `child_id` under `parent_id` would close a cycle.
///
/// The edge is illegal when the child is the parent itself or already appears
/// in the parent's ancestor closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckGroupCycleQuery {
    /// Proposed parent group.
    pub parent_id: i64,
    /// Proposed child group.
    pub child_id: i64,
}

impl Query for CheckGroupCycleQuery {
    type Output = bool;

    fn validate(&self) -> AppResult<()> {
        positive_id("parent_id", self.parent_id)?;
        positive_id("child_id", self.child_id)?;
        Ok(())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let parent = EntityRef::group(positive_id("parent_id", self.parent_id)?);
        let child = EntityRef::group(positive_id("child_id", self.child_id)?);
        existing(graph, parent)?;
        existing(graph, child)?;

        if parent == child {
            return Ok(true);
        }

        Ok(GetAncestorsQuery {
            kind: EntityKind::Group,
            id: self.parent_id,
            only: Some(EntityKind::Group),
        }
        .execute(graph)?
        .contains(&child))
    }
}

impl CheckGroupCycleQuery {
    /// Runs the check and converts a detected cycle into a rejection.
    pub fn ensure_acyclic(&self, graph: &EntityGraph) -> AppResult<()> {
        if self.run(graph)? {
            return Err(AppError::CycleRejected(format!(
                "nesting group {} under group {} would create a cycle",
                self.child_id, self.parent_id
            )));
        }

        Ok(())
    }
}
