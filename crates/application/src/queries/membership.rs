use std::collections::BTreeSet;

use aclgraph_core::AppResult;
use aclgraph_domain::{EntityGraph, EntityKind, EntityRef};

use super::{
    EntityView, Query, ancestor_closure, descendant_closure, existing, positive_id, views,
};

/// Groups a user belongs to, optionally including every ancestor group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetUserGroupsQuery {
    /// User id.
    pub user_id: i64,
    /// Also return ancestors of the direct groups.
    pub include_inherited: bool,
}

impl GetUserGroupsQuery {
    pub(crate) fn group_refs(&self, graph: &EntityGraph) -> AppResult<BTreeSet<EntityRef>> {
        let user = existing(graph, EntityRef::user(positive_id("user_id", self.user_id)?))?;
        let mut groups: BTreeSet<EntityRef> = user.parents_of_kind(EntityKind::Group).collect();

        if self.include_inherited {
            let direct: Vec<EntityRef> = groups.iter().copied().collect();
            for group in direct {
                groups.extend(
                    ancestor_closure(graph, group)
                        .into_iter()
                        .filter(|reference| reference.kind == EntityKind::Group),
                );
            }
        }

        Ok(groups)
    }
}

impl Query for GetUserGroupsQuery {
    type Output = Vec<EntityView>;

    fn validate(&self) -> AppResult<()> {
        positive_id("user_id", self.user_id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        Ok(views(graph, &self.group_refs(graph)?))
    }
}

/// Effective roles of a user.
///
/// Direct assignments are unioned with every role attached to a group the user
/// belongs to, directly or through the ancestor-group closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetUserRolesQuery {
    /// User id.
    pub user_id: i64,
}

impl GetUserRolesQuery {
    pub(crate) fn role_refs(&self, graph: &EntityGraph) -> AppResult<BTreeSet<EntityRef>> {
        let user = existing(graph, EntityRef::user(positive_id("user_id", self.user_id)?))?;
        let mut roles: BTreeSet<EntityRef> = user.parents_of_kind(EntityKind::Role).collect();

        let groups = GetUserGroupsQuery {
            user_id: self.user_id,
            include_inherited: true,
        }
        .group_refs(graph)?;
        for group in groups {
            if let Some(entity) = graph.entity(group) {
                roles.extend(entity.children_of_kind(EntityKind::Role));
            }
        }

        Ok(roles)
    }
}

impl Query for GetUserRolesQuery {
    type Output = Vec<EntityView>;

    fn validate(&self) -> AppResult<()> {
        positive_id("user_id", self.user_id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        Ok(views(graph, &self.role_refs(graph)?))
    }
}

/// Users of a group, optionally including users of nested groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetGroupMembersQuery {
    /// Group id.
    pub group_id: i64,
    /// Also return users of every descendant group.
    pub include_nested: bool,
}

impl Query for GetGroupMembersQuery {
    type Output = Vec<EntityView>;

    fn validate(&self) -> AppResult<()> {
        positive_id("group_id", self.group_id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let start = EntityRef::group(positive_id("group_id", self.group_id)?);
        let group = existing(graph, start)?;
        let mut users: BTreeSet<EntityRef> = group.children_of_kind(EntityKind::User).collect();

        if self.include_nested {
            for nested in descendant_closure(graph, start)
                .into_iter()
                .filter(|reference| reference.kind == EntityKind::Group)
            {
                if let Some(entity) = graph.entity(nested) {
                    users.extend(entity.children_of_kind(EntityKind::User));
                }
            }
        }

        Ok(views(graph, &users))
    }
}

/// Users holding a role, optionally including users reached through groups.
///
/// A user reaches a role through a group when the role is attached to that
/// group or to one of its ancestors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetRoleUsersQuery {
    /// Role id.
    pub role_id: i64,
    /// Also return users of groups the role is attached to.
    pub include_via_groups: bool,
}

impl Query for GetRoleUsersQuery {
    type Output = Vec<EntityView>;

    fn validate(&self) -> AppResult<()> {
        positive_id("role_id", self.role_id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let role = existing(graph, EntityRef::role(positive_id("role_id", self.role_id)?))?;
        let mut users: BTreeSet<EntityRef> = role.children_of_kind(EntityKind::User).collect();

        if self.include_via_groups {
            let mut groups: BTreeSet<EntityRef> =
                role.parents_of_kind(EntityKind::Group).collect();
            let attached: Vec<EntityRef> = groups.iter().copied().collect();
            for group in attached {
                groups.extend(
                    descendant_closure(graph, group)
                        .into_iter()
                        .filter(|reference| reference.kind == EntityKind::Group),
                );
            }
            for group in groups {
                if let Some(entity) = graph.entity(group) {
                    users.extend(entity.children_of_kind(EntityKind::User));
                }
            }
        }

        Ok(views(graph, &users))
    }
}
