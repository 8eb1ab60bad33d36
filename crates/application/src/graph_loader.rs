//! One-shot hydration of a tenant graph from flat relational rows.

use std::str::FromStr;
use std::sync::Arc;

use tracing::{info, warn};

use aclgraph_core::{AppError, AppResult, NonEmptyString, TenantId};
use aclgraph_domain::{
    AddGroupToGroup, AddPermissionToEntity, AddRoleToGroup, AddUserToGroup, AssignUserToRole,
    EdgeChange, Entity, EntityGraph, EntityId, EntityKind, EntityRef, HttpVerb, Normalizer,
    Permission, PermissionId, PermissionScheme, ResourcePattern,
};

use crate::graph_ports::{EntityRow, GraphSource, PermissionRow, RelationRow};
use crate::queries::CheckGroupCycleQuery;

/// Counts of what a hydration pass loaded and skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadReport {
    /// Loaded users.
    pub users: usize,
    /// Loaded groups.
    pub groups: usize,
    /// Loaded roles.
    pub roles: usize,
    /// Attached permissions.
    pub permissions: usize,
    /// Created relationship edges.
    pub edges: usize,
    /// Rows ignored because they were malformed, dangling or duplicated.
    pub skipped_rows: usize,
}

/// Builds an [`EntityGraph`] from a [`GraphSource`].
#[derive(Clone)]
pub struct GraphLoader {
    source: Arc<dyn GraphSource>,
}

#[derive(Debug, Clone, Copy)]
enum RelationCategory {
    UserGroup,
    UserRole,
    GroupRole,
    GroupParent,
}

impl RelationCategory {
    fn as_str(self) -> &'static str {
        match self {
            Self::UserGroup => "user_group",
            Self::UserRole => "user_role",
            Self::GroupRole => "group_role",
            Self::GroupParent => "group_parent",
        }
    }
}

impl GraphLoader {
    /// Creates a loader over a persistent source.
    #[must_use]
    pub fn new(source: Arc<dyn GraphSource>) -> Self {
        Self { source }
    }

    /// Loads every row of a tenant and links them into a fresh graph.
    ///
    /// Source failures abort the load. Individual rows whose endpoints are
    /// missing, that would duplicate a permission slot or that would close a
    /// group cycle are skipped and counted.
    pub async fn load(&self, tenant_id: TenantId) -> AppResult<(EntityGraph, LoadReport)> {
        let mut graph = EntityGraph::new();
        let mut report = LoadReport::default();

        for (kind, rows) in [
            (EntityKind::User, self.source.load_users(tenant_id).await?),
            (EntityKind::Group, self.source.load_groups(tenant_id).await?),
            (EntityKind::Role, self.source.load_roles(tenant_id).await?),
        ] {
            for row in rows {
                match entity_from_row(kind, row) {
                    Ok(entity) => {
                        graph.upsert(entity);
                        match kind {
                            EntityKind::User => report.users += 1,
                            EntityKind::Group => report.groups += 1,
                            EntityKind::Role => report.roles += 1,
                        }
                    }
                    Err(error) => {
                        warn!(
                            tenant_id = %tenant_id,
                            kind = %kind,
                            error = %error,
                            "skipping entity row"
                        );
                        report.skipped_rows += 1;
                    }
                }
            }
        }

        for row in self.source.load_permissions(tenant_id).await? {
            let permission_id = row.id;
            match attach_permission_row(&mut graph, row) {
                Ok(()) => report.permissions += 1,
                Err(error) => {
                    warn!(
                        tenant_id = %tenant_id,
                        permission_id,
                        error = %error,
                        "skipping permission row"
                    );
                    report.skipped_rows += 1;
                }
            }
        }

        for (category, rows) in [
            (
                RelationCategory::UserGroup,
                self.source.load_user_groups(tenant_id).await?,
            ),
            (
                RelationCategory::UserRole,
                self.source.load_user_roles(tenant_id).await?,
            ),
            (
                RelationCategory::GroupRole,
                self.source.load_group_roles(tenant_id).await?,
            ),
            (
                RelationCategory::GroupParent,
                self.source.load_group_parents(tenant_id).await?,
            ),
        ] {
            for row in rows {
                match link_relation_row(&mut graph, category, row) {
                    Ok(change) => {
                        if change.is_effective() {
                            report.edges += 1;
                        }
                    }
                    Err(error) => {
                        warn!(
                            tenant_id = %tenant_id,
                            category = category.as_str(),
                            member_id = row.member_id,
                            container_id = row.container_id,
                            error = %error,
                            "skipping relation row"
                        );
                        report.skipped_rows += 1;
                    }
                }
            }
        }

        graph.verify_integrity()?;

        info!(
            tenant_id = %tenant_id,
            users = report.users,
            groups = report.groups,
            roles = report.roles,
            permissions = report.permissions,
            edges = report.edges,
            skipped_rows = report.skipped_rows,
            "tenant graph hydrated"
        );

        Ok((graph, report))
    }
}

fn entity_from_row(kind: EntityKind, row: EntityRow) -> AppResult<Entity> {
    let id = EntityId::new(row.id)?;
    let display_name = NonEmptyString::new(row.display_name)?;

    Ok(Entity::new(EntityRef::new(kind, id), display_name).with_description(row.description))
}

fn attach_permission_row(graph: &mut EntityGraph, row: PermissionRow) -> AppResult<()> {
    let id = PermissionId::new(row.id)?;
    let holder = EntityRef::new(
        EntityKind::from_str(row.holder_kind.as_str())?,
        EntityId::new(row.holder_id)?,
    );
    let resource = ResourcePattern::new(row.resource_uri)?;
    let verb = HttpVerb::from_str(row.verb.as_str())?;
    let scheme = PermissionScheme::from_str(row.scheme.as_str())?;

    let entity = graph
        .resolve(holder)
        .ok_or_else(|| AppError::NotFound(format!("holder {holder} was not found")))?;
    if graph.permission(id).is_some() {
        return Err(AppError::Conflict(format!("permission {id} already loaded")));
    }
    if let Some(existing) = graph.find_permission(holder, &resource, verb, scheme) {
        return Err(AppError::Conflict(format!(
            "permission {id} duplicates permission {} on {holder}",
            existing.id()
        )));
    }

    let permission = Permission::new(id, holder, resource, verb, scheme, row.grant, row.deny)?;
    AddPermissionToEntity { entity, permission }.apply(graph);

    Ok(())
}

fn link_relation_row(
    graph: &mut EntityGraph,
    category: RelationCategory,
    row: RelationRow,
) -> AppResult<EdgeChange> {
    let member = EntityId::new(row.member_id)?;
    let container = EntityId::new(row.container_id)?;
    let missing = || {
        AppError::NotFound(format!(
            "{} row references a missing endpoint",
            category.as_str()
        ))
    };

    let change = match category {
        RelationCategory::UserGroup => {
            let user = graph.resolve_user(member).ok_or_else(missing)?;
            let group = graph.resolve_group(container).ok_or_else(missing)?;
            AddUserToGroup { user, group }.apply(graph)
        }
        RelationCategory::UserRole => {
            let user = graph.resolve_user(member).ok_or_else(missing)?;
            let role = graph.resolve_role(container).ok_or_else(missing)?;
            AssignUserToRole { user, role }.apply(graph)
        }
        RelationCategory::GroupRole => {
            let role = graph.resolve_role(member).ok_or_else(missing)?;
            let group = graph.resolve_group(container).ok_or_else(missing)?;
            AddRoleToGroup { role, group }.apply(graph)
        }
        RelationCategory::GroupParent => {
            let child = graph.resolve_group(member).ok_or_else(missing)?;
            let parent = graph.resolve_group(container).ok_or_else(missing)?;
            CheckGroupCycleQuery {
                parent_id: row.container_id,
                child_id: row.member_id,
            }
            .ensure_acyclic(graph)?;
            AddGroupToGroup { child, parent }.apply(graph)
        }
    };

    Ok(change)
}
