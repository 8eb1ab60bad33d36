use std::collections::{BTreeMap, BTreeSet, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;

use aclgraph_application::{
    AppliedMutation, EntityRow, GraphMutation, GraphMutationSink, GraphSource, PermissionRow,
    RelationRow,
};
use aclgraph_core::{AppError, AppResult, TenantId};
use aclgraph_domain::{EntityKind, EntityRef, Permission};

/// Relational rows of one tenant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantRows {
    users: BTreeMap<i64, EntityRow>,
    groups: BTreeMap<i64, EntityRow>,
    roles: BTreeMap<i64, EntityRow>,
    permissions: BTreeMap<i64, PermissionRow>,
    user_groups: BTreeSet<(i64, i64)>,
    user_roles: BTreeSet<(i64, i64)>,
    group_roles: BTreeSet<(i64, i64)>,
    group_parents: BTreeSet<(i64, i64)>,
}

#[derive(Debug, Clone, Copy)]
enum Relation {
    UserGroup,
    UserRole,
    GroupRole,
    GroupParent,
}

impl TenantRows {
    /// Adds or replaces a user row.
    #[must_use]
    pub fn with_user(mut self, row: EntityRow) -> Self {
        self.users.insert(row.id, row);
        self
    }

    /// Adds or replaces a group row.
    #[must_use]
    pub fn with_group(mut self, row: EntityRow) -> Self {
        self.groups.insert(row.id, row);
        self
    }

    /// Adds or replaces a role row.
    #[must_use]
    pub fn with_role(mut self, row: EntityRow) -> Self {
        self.roles.insert(row.id, row);
        self
    }

    /// Adds or replaces a permission row.
    #[must_use]
    pub fn with_permission(mut self, row: PermissionRow) -> Self {
        self.permissions.insert(row.id, row);
        self
    }

    /// Adds a user–group membership row.
    #[must_use]
    pub fn with_user_group(mut self, user_id: i64, group_id: i64) -> Self {
        self.user_groups.insert((user_id, group_id));
        self
    }

    /// Adds a user–role assignment row.
    #[must_use]
    pub fn with_user_role(mut self, user_id: i64, role_id: i64) -> Self {
        self.user_roles.insert((user_id, role_id));
        self
    }

    /// Adds a group–role attachment row.
    #[must_use]
    pub fn with_group_role(mut self, role_id: i64, group_id: i64) -> Self {
        self.group_roles.insert((role_id, group_id));
        self
    }

    /// Adds a group hierarchy row.
    #[must_use]
    pub fn with_group_parent(mut self, child_id: i64, parent_id: i64) -> Self {
        self.group_parents.insert((child_id, parent_id));
        self
    }

    fn entities_mut(&mut self, kind: EntityKind) -> &mut BTreeMap<i64, EntityRow> {
        match kind {
            EntityKind::User => &mut self.users,
            EntityKind::Group => &mut self.groups,
            EntityKind::Role => &mut self.roles,
        }
    }

    fn relation_mut(&mut self, relation: Relation) -> &mut BTreeSet<(i64, i64)> {
        match relation {
            Relation::UserGroup => &mut self.user_groups,
            Relation::UserRole => &mut self.user_roles,
            Relation::GroupRole => &mut self.group_roles,
            Relation::GroupParent => &mut self.group_parents,
        }
    }

    fn apply(&mut self, mutation: &GraphMutation) -> AppResult<()> {
        match mutation {
            GraphMutation::EntityUpserted {
                reference,
                display_name,
                description,
            } => {
                self.entities_mut(reference.kind).insert(
                    reference.id.value(),
                    EntityRow {
                        id: reference.id.value(),
                        display_name: display_name.clone(),
                        description: description.clone(),
                    },
                );
            }
            GraphMutation::EntityDeleted { reference } => self.delete(*reference),
            GraphMutation::EdgeAdded { parent, child } => {
                let (relation, row) = relation_row(*parent, *child)?;
                self.relation_mut(relation).insert(row);
            }
            GraphMutation::EdgeRemoved { parent, child } => {
                let (relation, row) = relation_row(*parent, *child)?;
                self.relation_mut(relation).remove(&row);
            }
            GraphMutation::PermissionAdded { permission } => {
                self.permissions
                    .insert(permission.id().value(), permission_row(permission));
            }
            GraphMutation::PermissionRemoved { permission_id, .. } => {
                self.permissions.remove(&permission_id.value());
            }
        }

        Ok(())
    }

    fn delete(&mut self, reference: EntityRef) {
        let id = reference.id.value();
        self.entities_mut(reference.kind).remove(&id);
        self.permissions.retain(|_, row| {
            !(row.holder_id == id && row.holder_kind == reference.kind.as_str())
        });

        let member_of = |(member, _): &(i64, i64)| *member != id;
        let container_of = |(_, container): &(i64, i64)| *container != id;
        match reference.kind {
            EntityKind::User => {
                self.user_groups.retain(member_of);
                self.user_roles.retain(member_of);
            }
            EntityKind::Group => {
                self.user_groups.retain(container_of);
                self.group_roles.retain(container_of);
                self.group_parents
                    .retain(|(child, parent)| *child != id && *parent != id);
            }
            EntityKind::Role => {
                self.user_roles.retain(container_of);
                self.group_roles.retain(member_of);
            }
        }
    }
}

fn relation_row(parent: EntityRef, child: EntityRef) -> AppResult<(Relation, (i64, i64))> {
    let relation = match (parent.kind, child.kind) {
        (EntityKind::Group, EntityKind::User) => Relation::UserGroup,
        (EntityKind::Role, EntityKind::User) => Relation::UserRole,
        (EntityKind::Group, EntityKind::Role) => Relation::GroupRole,
        (EntityKind::Group, EntityKind::Group) => Relation::GroupParent,
        _ => {
            return Err(AppError::Validation(format!(
                "{parent} may not be a parent of {child}"
            )));
        }
    };

    Ok((relation, (child.id.value(), parent.id.value())))
}

fn permission_row(permission: &Permission) -> PermissionRow {
    PermissionRow {
        id: permission.id().value(),
        holder_kind: permission.holder().kind.as_str().to_owned(),
        holder_id: permission.holder().id.value(),
        resource_uri: permission.resource().as_str().to_owned(),
        verb: permission.verb().as_str().to_owned(),
        scheme: permission.scheme().as_str().to_owned(),
        grant: permission.is_grant(),
        deny: permission.is_deny(),
    }
}

fn relation_rows(rows: &BTreeSet<(i64, i64)>) -> Vec<RelationRow> {
    rows.iter()
        .map(|(member_id, container_id)| RelationRow {
            member_id: *member_id,
            container_id: *container_id,
        })
        .collect()
}

/// In-memory graph store for development and tests.
///
/// Applied mutations are folded back into the rows, so hydrating a tenant
/// again reproduces the graph the processor built.
#[derive(Debug, Default)]
pub struct InMemoryGraphStore {
    tenants: RwLock<HashMap<TenantId, TenantRows>>,
}

impl InMemoryGraphStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tenants: RwLock::new(HashMap::new()),
        }
    }

    /// Replaces every row of a tenant.
    pub async fn seed(&self, tenant_id: TenantId, rows: TenantRows) {
        self.tenants.write().await.insert(tenant_id, rows);
    }

    /// Returns a copy of a tenant's rows.
    pub async fn rows(&self, tenant_id: TenantId) -> TenantRows {
        self.tenants
            .read()
            .await
            .get(&tenant_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn select<T>(&self, tenant_id: TenantId, project: impl Fn(&TenantRows) -> T) -> T
    where
        T: Default,
    {
        self.tenants
            .read()
            .await
            .get(&tenant_id)
            .map(project)
            .unwrap_or_default()
    }
}

#[async_trait]
impl GraphSource for InMemoryGraphStore {
    async fn load_users(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        Ok(self
            .select(tenant_id, |rows| rows.users.values().cloned().collect())
            .await)
    }

    async fn load_groups(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        Ok(self
            .select(tenant_id, |rows| rows.groups.values().cloned().collect())
            .await)
    }

    async fn load_roles(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        Ok(self
            .select(tenant_id, |rows| rows.roles.values().cloned().collect())
            .await)
    }

    async fn load_permissions(&self, tenant_id: TenantId) -> AppResult<Vec<PermissionRow>> {
        Ok(self
            .select(tenant_id, |rows| rows.permissions.values().cloned().collect())
            .await)
    }

    async fn load_user_groups(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(self
            .select(tenant_id, |rows| relation_rows(&rows.user_groups))
            .await)
    }

    async fn load_user_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(self
            .select(tenant_id, |rows| relation_rows(&rows.user_roles))
            .await)
    }

    async fn load_group_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(self
            .select(tenant_id, |rows| relation_rows(&rows.group_roles))
            .await)
    }

    async fn load_group_parents(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(self
            .select(tenant_id, |rows| relation_rows(&rows.group_parents))
            .await)
    }
}

#[async_trait]
impl GraphMutationSink for InMemoryGraphStore {
    async fn persist(&self, mutation: &AppliedMutation) -> AppResult<()> {
        self.tenants
            .write()
            .await
            .entry(mutation.tenant_id)
            .or_default()
            .apply(&mutation.mutation)
    }
}

#[cfg(test)]
mod tests;
