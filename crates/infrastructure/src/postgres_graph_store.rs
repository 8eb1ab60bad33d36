//! PostgreSQL-backed graph source and mutation sink.
//!
//! Every table is keyed by `tenant_id`; entity ids are unique per tenant and kind:
//!
//! * `acl_users`, `acl_groups`, `acl_roles` (`tenant_id`, `id`, `display_name`, `description`)
//! * `acl_permissions` (`tenant_id`, `id`, `holder_kind`, `holder_id`, `resource_uri`,
//!   `verb`, `scheme`, `is_grant`, `is_deny`)
//! * `acl_user_groups` (`user_id`, `group_id`), `acl_user_roles` (`user_id`, `role_id`),
//!   `acl_group_roles` (`role_id`, `group_id`), `acl_group_parents` (`child_id`, `parent_id`)

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::debug;

use aclgraph_application::{
    AppliedMutation, EntityRow, GraphMutation, GraphMutationSink, GraphSource, PermissionRow,
    RelationRow,
};
use aclgraph_core::{AppError, AppResult, TenantId};
use aclgraph_domain::{EntityKind, EntityRef, Permission, PermissionId};

mod sink;
mod source;

/// PostgreSQL implementation of the graph ports.
#[derive(Clone)]
pub struct PostgresGraphStore {
    pool: PgPool,
}

impl PostgresGraphStore {
    /// Creates a store with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoredEntity {
    id: i64,
    display_name: String,
    description: Option<String>,
}

impl From<StoredEntity> for EntityRow {
    fn from(row: StoredEntity) -> Self {
        Self {
            id: row.id,
            display_name: row.display_name,
            description: row.description,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoredPermission {
    id: i64,
    holder_kind: String,
    holder_id: i64,
    resource_uri: String,
    verb: String,
    scheme: String,
    is_grant: bool,
    is_deny: bool,
}

impl From<StoredPermission> for PermissionRow {
    fn from(row: StoredPermission) -> Self {
        Self {
            id: row.id,
            holder_kind: row.holder_kind,
            holder_id: row.holder_id,
            resource_uri: row.resource_uri,
            verb: row.verb,
            scheme: row.scheme,
            grant: row.is_grant,
            deny: row.is_deny,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct StoredRelation {
    member_id: i64,
    container_id: i64,
}

impl From<StoredRelation> for RelationRow {
    fn from(row: StoredRelation) -> Self {
        Self {
            member_id: row.member_id,
            container_id: row.container_id,
        }
    }
}

fn entity_table(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::User => "acl_users",
        EntityKind::Group => "acl_groups",
        EntityKind::Role => "acl_roles",
    }
}

#[async_trait]
impl GraphSource for PostgresGraphStore {
    async fn load_users(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        self.load_entities_impl(tenant_id, EntityKind::User).await
    }

    async fn load_groups(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        self.load_entities_impl(tenant_id, EntityKind::Group).await
    }

    async fn load_roles(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        self.load_entities_impl(tenant_id, EntityKind::Role).await
    }

    async fn load_permissions(&self, tenant_id: TenantId) -> AppResult<Vec<PermissionRow>> {
        self.load_permissions_impl(tenant_id).await
    }

    async fn load_user_groups(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        self.load_relations_impl(
            tenant_id,
            "user_groups",
            r#"
            SELECT user_id AS member_id, group_id AS container_id
            FROM acl_user_groups
            WHERE tenant_id = $1
            ORDER BY group_id, user_id
            "#,
        )
        .await
    }

    async fn load_user_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        self.load_relations_impl(
            tenant_id,
            "user_roles",
            r#"
            SELECT user_id AS member_id, role_id AS container_id
            FROM acl_user_roles
            WHERE tenant_id = $1
            ORDER BY role_id, user_id
            "#,
        )
        .await
    }

    async fn load_group_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        self.load_relations_impl(
            tenant_id,
            "group_roles",
            r#"
            SELECT role_id AS member_id, group_id AS container_id
            FROM acl_group_roles
            WHERE tenant_id = $1
            ORDER BY group_id, role_id
            "#,
        )
        .await
    }

    async fn load_group_parents(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        self.load_relations_impl(
            tenant_id,
            "group_parents",
            r#"
            SELECT child_id AS member_id, parent_id AS container_id
            FROM acl_group_parents
            WHERE tenant_id = $1
            ORDER BY parent_id, child_id
            "#,
        )
        .await
    }
}

#[async_trait]
impl GraphMutationSink for PostgresGraphStore {
    async fn persist(&self, applied: &AppliedMutation) -> AppResult<()> {
        let tenant_id = applied.tenant_id;
        match &applied.mutation {
            GraphMutation::EntityUpserted {
                reference,
                display_name,
                description,
            } => {
                self.upsert_entity_impl(
                    tenant_id,
                    *reference,
                    display_name,
                    description.as_deref(),
                )
                .await?
            }
            GraphMutation::EntityDeleted { reference } => {
                self.delete_entity_impl(tenant_id, *reference).await?
            }
            GraphMutation::EdgeAdded { parent, child } => {
                self.insert_edge_impl(tenant_id, *parent, *child).await?
            }
            GraphMutation::EdgeRemoved { parent, child } => {
                self.delete_edge_impl(tenant_id, *parent, *child).await?
            }
            GraphMutation::PermissionAdded { permission } => {
                self.insert_permission_impl(tenant_id, permission).await?
            }
            GraphMutation::PermissionRemoved { permission_id, .. } => {
                self.delete_permission_impl(tenant_id, *permission_id).await?
            }
        }

        debug!(
            tenant_id = %tenant_id,
            request_id = %applied.request_id,
            mutation = applied.mutation.as_str(),
            "mutation written to postgres"
        );
        Ok(())
    }
}
