use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use aclgraph_core::{AppResult, TenantId};
use aclgraph_domain::{EntityRef, Permission, PermissionId};

/// Flat user, group or role row read during hydration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRow {
    /// Stable identifier.
    pub id: i64,
    /// Display name.
    pub display_name: String,
    /// Optional description.
    pub description: Option<String>,
}

/// Permission row joined with its resource, verb and scheme records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionRow {
    /// Stable identifier.
    pub id: i64,
    /// Holder kind transport value (`user`, `group` or `role`).
    pub holder_kind: String,
    /// Holder identifier.
    pub holder_id: i64,
    /// Resource uri or pattern.
    pub resource_uri: String,
    /// Verb transport value.
    pub verb: String,
    /// Scheme transport value.
    pub scheme: String,
    /// Grant flag.
    pub grant: bool,
    /// Deny flag.
    pub deny: bool,
}

/// Relationship row linking a contained member to its container.
///
/// For user–group rows the member is the user; for user–role rows the role is
/// the container; for group–role rows the role is the member; for group
/// hierarchy rows the member is the child group.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationRow {
    /// Child end of the edge.
    pub member_id: i64,
    /// Parent end of the edge.
    pub container_id: i64,
}

/// Read port over the persistent store used once per tenant at startup.
#[async_trait]
pub trait GraphSource: Send + Sync {
    /// Lists tenant users.
    async fn load_users(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>>;

    /// Lists tenant groups.
    async fn load_groups(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>>;

    /// Lists tenant roles.
    async fn load_roles(&self, tenant_id: TenantId) -> AppResult<Vec<EntityRow>>;

    /// Lists tenant permissions joined with resource, verb and scheme.
    async fn load_permissions(&self, tenant_id: TenantId) -> AppResult<Vec<PermissionRow>>;

    /// Lists user–group membership rows.
    async fn load_user_groups(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>>;

    /// Lists user–role assignment rows.
    async fn load_user_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>>;

    /// Lists group–role attachment rows.
    async fn load_group_roles(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>>;

    /// Lists group hierarchy rows.
    async fn load_group_parents(&self, tenant_id: TenantId) -> AppResult<Vec<RelationRow>>;
}

/// One effective in-memory graph change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum GraphMutation {
    /// Entity created or renamed.
    EntityUpserted {
        /// Entity reference.
        reference: EntityRef,
        /// New display name.
        display_name: String,
        /// New description.
        description: Option<String>,
    },
    /// Entity deleted together with its edges and permissions.
    EntityDeleted {
        /// Entity reference.
        reference: EntityRef,
    },
    /// Parent/child edge created.
    EdgeAdded {
        /// Parent end.
        parent: EntityRef,
        /// Child end.
        child: EntityRef,
    },
    /// Parent/child edge removed.
    EdgeRemoved {
        /// Parent end.
        parent: EntityRef,
        /// Child end.
        child: EntityRef,
    },
    /// Permission attached.
    PermissionAdded {
        /// Attached permission.
        permission: Permission,
    },
    /// Permission detached.
    PermissionRemoved {
        /// Former holder.
        holder: EntityRef,
        /// Removed permission.
        permission_id: PermissionId,
    },
}

impl GraphMutation {
    /// Returns a stable label for logs.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityUpserted { .. } => "entity_upserted",
            Self::EntityDeleted { .. } => "entity_deleted",
            Self::EdgeAdded { .. } => "edge_added",
            Self::EdgeRemoved { .. } => "edge_removed",
            Self::PermissionAdded { .. } => "permission_added",
            Self::PermissionRemoved { .. } => "permission_removed",
        }
    }
}

/// Mutation accepted by the processor and handed to persistence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedMutation {
    /// Tenant owning the graph.
    pub tenant_id: TenantId,
    /// Correlation id of the originating command.
    pub request_id: String,
    /// Acting user of the originating command.
    pub actor_id: i64,
    /// Time the in-memory change was applied.
    pub applied_at: DateTime<Utc>,
    /// Graph version after the change.
    pub graph_version: u64,
    /// The change itself.
    pub mutation: GraphMutation,
}

/// Write port persisting accepted mutations outside the processing loop.
#[async_trait]
pub trait GraphMutationSink: Send + Sync {
    /// Durably records one applied mutation.
    async fn persist(&self, mutation: &AppliedMutation) -> AppResult<()>;
}
