use std::collections::BTreeMap;
use std::str::FromStr;

use serde::Serialize;

use aclgraph_core::AppResult;
use aclgraph_domain::{EntityGraph, EntityKind, EntityRef, HttpVerb, Permission, PermissionId};

use super::membership::{GetUserGroupsQuery, GetUserRolesQuery};
use super::{Query, ancestor_closure, existing, positive_id, required_text};

/// Direct and optionally inherited permissions of one entity.
///
/// Contributors are resolved by calling this query again with
/// `include_inherited` off, so each recursive call resolves exactly one hop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetEntityPermissionsQuery {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity id.
    pub id: i64,
    /// Union in permissions of roles and ancestor groups.
    pub include_inherited: bool,
}

impl GetEntityPermissionsQuery {
    fn direct(kind: EntityKind, id: i64) -> Self {
        Self {
            kind,
            id,
            include_inherited: false,
        }
    }

    fn contributors(&self, graph: &EntityGraph, start: EntityRef) -> AppResult<Vec<EntityRef>> {
        match self.kind {
            EntityKind::User => {
                let mut contributors: Vec<EntityRef> = GetUserRolesQuery { user_id: self.id }
                    .role_refs(graph)?
                    .into_iter()
                    .collect();
                contributors.extend(
                    GetUserGroupsQuery {
                        user_id: self.id,
                        include_inherited: true,
                    }
                    .group_refs(graph)?,
                );
                Ok(contributors)
            }
            EntityKind::Group => {
                let ancestors: Vec<EntityRef> = ancestor_closure(graph, start)
                    .into_iter()
                    .filter(|reference| reference.kind == EntityKind::Group)
                    .collect();
                let mut contributors = ancestors.clone();
                for group in std::iter::once(start).chain(ancestors) {
                    if let Some(entity) = graph.entity(group) {
                        contributors.extend(entity.children_of_kind(EntityKind::Role));
                    }
                }
                Ok(contributors)
            }
            EntityKind::Role => Ok(Vec::new()),
        }
    }
}

impl Query for GetEntityPermissionsQuery {
    type Output = Vec<Permission>;

    fn validate(&self) -> AppResult<()> {
        positive_id("id", self.id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let start = EntityRef::new(self.kind, positive_id("id", self.id)?);
        existing(graph, start)?;

        let mut collected: BTreeMap<PermissionId, Permission> = graph
            .permissions_of(start)
            .map(|permission| (permission.id(), permission.clone()))
            .collect();

        if self.include_inherited {
            for contributor in self.contributors(graph, start)? {
                let inherited = Self::direct(contributor.kind, contributor.id.value())
                    .execute(graph)?;
                collected.extend(
                    inherited
                        .into_iter()
                        .map(|permission| (permission.id(), permission)),
                );
            }
        }

        Ok(collected.into_values().collect())
    }
}

/// Outcome of evaluating one (uri, verb) pair for an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessDecision {
    /// Some matching grant exists and no matching deny does.
    pub allowed: bool,
    /// Matching permissions with the grant flag set.
    pub grants: Vec<PermissionId>,
    /// Matching permissions with the deny flag set.
    pub denies: Vec<PermissionId>,
}

/// Effective access of an entity to one uri and verb.
///
/// Deny overrides grant regardless of which ancestor contributed either.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatePermissionQuery {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity id.
    pub id: i64,
    /// Concrete requested uri.
    pub uri: String,
    /// Requested verb transport value.
    pub verb: String,
}

impl Query for EvaluatePermissionQuery {
    type Output = AccessDecision;

    fn validate(&self) -> AppResult<()> {
        positive_id("id", self.id)?;
        required_text("uri", Some(self.uri.as_str()))?;
        HttpVerb::from_str(&self.verb)?;
        Ok(())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let uri = required_text("uri", Some(self.uri.as_str()))?;
        let verb = HttpVerb::from_str(&self.verb)?;

        let effective = GetEntityPermissionsQuery {
            kind: self.kind,
            id: self.id,
            include_inherited: true,
        }
        .execute(graph)?;

        let matching: Vec<&Permission> = effective
            .iter()
            .filter(|permission| permission.applies_to(uri, verb))
            .collect();
        let grants: Vec<PermissionId> = matching
            .iter()
            .filter(|permission| permission.is_grant())
            .map(|permission| permission.id())
            .collect();
        let denies: Vec<PermissionId> = matching
            .iter()
            .filter(|permission| permission.is_deny())
            .map(|permission| permission.id())
            .collect();

        Ok(AccessDecision {
            allowed: !grants.is_empty() && denies.is_empty(),
            grants,
            denies,
        })
    }
}

/// Boolean form of [`EvaluatePermissionQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckEntityPermissionQuery {
    /// Wrapped evaluation.
    pub evaluation: EvaluatePermissionQuery,
}

impl CheckEntityPermissionQuery {
    /// Creates a check for an entity, uri and verb.
    #[must_use]
    pub fn new(kind: EntityKind, id: i64, uri: impl Into<String>, verb: impl Into<String>) -> Self {
        Self {
            evaluation: EvaluatePermissionQuery {
                kind,
                id,
                uri: uri.into(),
                verb: verb.into(),
            },
        }
    }
}

impl Query for CheckEntityPermissionQuery {
    type Output = bool;

    fn validate(&self) -> AppResult<()> {
        self.evaluation.validate()
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        Ok(self.evaluation.execute(graph)?.allowed)
    }
}
