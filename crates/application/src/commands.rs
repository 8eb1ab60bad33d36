//! Inbound command envelope and typed payloads.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use aclgraph_core::{AppError, AppResult};

/// Envelope of one command admitted to a tenant queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestCommand {
    /// Caller supplied correlation id.
    pub request_id: String,
    /// Time the caller issued the command.
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
    /// Acting user id.
    pub actor_id: i64,
    /// Snake case command type, see [`CommandType`].
    pub command_type: String,
    /// Command specific fields.
    #[serde(default)]
    pub payload: Value,
}

impl RequestCommand {
    /// Builds an envelope from a typed payload, stamped with the current time.
    pub fn typed<P: CommandPayload>(
        request_id: impl Into<String>,
        actor_id: i64,
        command_type: CommandType,
        payload: &P,
    ) -> AppResult<Self> {
        let payload = serde_json::to_value(payload).map_err(|error| {
            AppError::Internal(format!(
                "failed to encode {} payload: {error}",
                command_type.as_str()
            ))
        })?;

        Ok(Self {
            request_id: request_id.into(),
            timestamp: Utc::now(),
            actor_id,
            command_type: command_type.as_str().to_owned(),
            payload,
        })
    }

    /// Decodes the payload into `P`.
    pub fn decode<P: CommandPayload>(&self) -> AppResult<P> {
        let payload = if self.payload.is_null() {
            Value::Object(serde_json::Map::new())
        } else {
            self.payload.clone()
        };

        serde_json::from_value(payload).map_err(|error| {
            AppError::Validation(format!(
                "invalid payload for '{}': {error}",
                self.command_type
            ))
        })
    }
}

/// Marker for payload structs carried inside a [`RequestCommand`].
pub trait CommandPayload: Serialize + DeserializeOwned {}

/// Every command type the translator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandType {
    /// `create_user`
    CreateUser,
    /// `update_user`
    UpdateUser,
    /// `delete_user`
    DeleteUser,
    /// `add_user_to_group`
    AddUserToGroup,
    /// `remove_user_from_group`
    RemoveUserFromGroup,
    /// `assign_user_to_role`
    AssignUserToRole,
    /// `unassign_user_from_role`
    UnassignUserFromRole,
    /// `create_group`
    CreateGroup,
    /// `update_group`
    UpdateGroup,
    /// `delete_group`
    DeleteGroup,
    /// `add_group_to_group`
    AddGroupToGroup,
    /// `remove_group_from_group`
    RemoveGroupFromGroup,
    /// `create_role`
    CreateRole,
    /// `update_role`
    UpdateRole,
    /// `delete_role`
    DeleteRole,
    /// `add_role_to_group`
    AddRoleToGroup,
    /// `remove_role_from_group`
    RemoveRoleFromGroup,
    /// `grant_permission`
    GrantPermission,
    /// `deny_permission`
    DenyPermission,
    /// `remove_permission`
    RemovePermission,
    /// `get_user`
    GetUser,
    /// `get_users`
    GetUsers,
    /// `get_group`
    GetGroup,
    /// `get_groups`
    GetGroups,
    /// `get_role`
    GetRole,
    /// `get_roles`
    GetRoles,
    /// `evaluate_permission`
    EvaluatePermission,
    /// `check_permission`
    CheckPermission,
    /// `get_entity_permissions`
    GetEntityPermissions,
    /// `get_user_roles`
    GetUserRoles,
    /// `get_user_groups`
    GetUserGroups,
    /// `get_group_members`
    GetGroupMembers,
    /// `get_child_groups`
    GetChildGroups,
    /// `get_parent_groups`
    GetParentGroups,
}

impl CommandType {
    const ALL: [Self; 34] = [
        Self::CreateUser,
        Self::UpdateUser,
        Self::DeleteUser,
        Self::AddUserToGroup,
        Self::RemoveUserFromGroup,
        Self::AssignUserToRole,
        Self::UnassignUserFromRole,
        Self::CreateGroup,
        Self::UpdateGroup,
        Self::DeleteGroup,
        Self::AddGroupToGroup,
        Self::RemoveGroupFromGroup,
        Self::CreateRole,
        Self::UpdateRole,
        Self::DeleteRole,
        Self::AddRoleToGroup,
        Self::RemoveRoleFromGroup,
        Self::GrantPermission,
        Self::DenyPermission,
        Self::RemovePermission,
        Self::GetUser,
        Self::GetUsers,
        Self::GetGroup,
        Self::GetGroups,
        Self::GetRole,
        Self::GetRoles,
        Self::EvaluatePermission,
        Self::CheckPermission,
        Self::GetEntityPermissions,
        Self::GetUserRoles,
        Self::GetUserGroups,
        Self::GetGroupMembers,
        Self::GetChildGroups,
        Self::GetParentGroups,
    ];

    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreateUser => "create_user",
            Self::UpdateUser => "update_user",
            Self::DeleteUser => "delete_user",
            Self::AddUserToGroup => "add_user_to_group",
            Self::RemoveUserFromGroup => "remove_user_from_group",
            Self::AssignUserToRole => "assign_user_to_role",
            Self::UnassignUserFromRole => "unassign_user_from_role",
            Self::CreateGroup => "create_group",
            Self::UpdateGroup => "update_group",
            Self::DeleteGroup => "delete_group",
            Self::AddGroupToGroup => "add_group_to_group",
            Self::RemoveGroupFromGroup => "remove_group_from_group",
            Self::CreateRole => "create_role",
            Self::UpdateRole => "update_role",
            Self::DeleteRole => "delete_role",
            Self::AddRoleToGroup => "add_role_to_group",
            Self::RemoveRoleFromGroup => "remove_role_from_group",
            Self::GrantPermission => "grant_permission",
            Self::DenyPermission => "deny_permission",
            Self::RemovePermission => "remove_permission",
            Self::GetUser => "get_user",
            Self::GetUsers => "get_users",
            Self::GetGroup => "get_group",
            Self::GetGroups => "get_groups",
            Self::GetRole => "get_role",
            Self::GetRoles => "get_roles",
            Self::EvaluatePermission => "evaluate_permission",
            Self::CheckPermission => "check_permission",
            Self::GetEntityPermissions => "get_entity_permissions",
            Self::GetUserRoles => "get_user_roles",
            Self::GetUserGroups => "get_user_groups",
            Self::GetGroupMembers => "get_group_members",
            Self::GetChildGroups => "get_child_groups",
            Self::GetParentGroups => "get_parent_groups",
        }
    }

    /// Parses a transport value, returning `None` for unknown types.
    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|command_type| command_type.as_str() == value.trim())
    }
}

/// Payload of `create_user`, `create_group` and `create_role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateEntityPayload {
    /// Display name.
    pub display_name: Option<String>,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload of `update_user`, `update_group` and `update_role`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEntityPayload {
    /// Entity id.
    pub id: i64,
    /// New display name.
    pub display_name: Option<String>,
    /// New description.
    #[serde(default)]
    pub description: Option<String>,
}

/// Payload of delete and point lookup commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityIdPayload {
    /// Entity id.
    pub id: i64,
}

/// Payload of user–group membership commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserGroupPayload {
    /// User id.
    pub user_id: i64,
    /// Group id.
    pub group_id: i64,
}

/// Payload of user–role assignment commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserRolePayload {
    /// User id.
    pub user_id: i64,
    /// Role id.
    pub role_id: i64,
}

/// Payload of group hierarchy commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupHierarchyPayload {
    /// Child group id.
    pub child_id: i64,
    /// Parent group id.
    pub parent_id: i64,
}

/// Payload of group–role attachment commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleGroupPayload {
    /// Role id.
    pub role_id: i64,
    /// Group id.
    pub group_id: i64,
}

/// Payload of `grant_permission` and `deny_permission`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionPayload {
    /// Holder kind (`user`, `group` or `role`).
    pub entity_kind: String,
    /// Holder id.
    pub entity_id: i64,
    /// Resource uri or pattern.
    pub resource_uri: Option<String>,
    /// Verb.
    pub verb: String,
    /// Scheme, `api` when omitted.
    #[serde(default)]
    pub scheme: Option<String>,
}

/// Payload of `remove_permission`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovePermissionPayload {
    /// Holder kind.
    pub entity_kind: String,
    /// Holder id.
    pub entity_id: i64,
    /// Permission id.
    pub permission_id: i64,
}

/// Payload of `get_users`, `get_groups` and `get_roles`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntitiesPayload {
    /// One-based page.
    #[serde(default = "default_page")]
    pub page: i64,
    /// Page size.
    #[serde(default = "default_page_size")]
    pub page_size: i64,
    /// Exact display name.
    #[serde(default)]
    pub name: Option<String>,
    /// Case-insensitive display name substring.
    #[serde(default)]
    pub search: Option<String>,
    /// `id` or `name`.
    #[serde(default)]
    pub sort_by: Option<String>,
    /// `asc` or `desc`.
    #[serde(default)]
    pub direction: Option<String>,
}

impl Default for ListEntitiesPayload {
    fn default() -> Self {
        Self {
            page: default_page(),
            page_size: default_page_size(),
            name: None,
            search: None,
            sort_by: None,
            direction: None,
        }
    }
}

fn default_page() -> i64 {
    1
}

fn default_page_size() -> i64 {
    50
}

/// Payload of `evaluate_permission` and `check_permission`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionCheckPayload {
    /// Entity kind, `user` when omitted.
    #[serde(default)]
    pub entity_kind: Option<String>,
    /// Entity id.
    pub entity_id: i64,
    /// Requested uri.
    pub uri: Option<String>,
    /// Requested verb.
    pub verb: String,
}

/// Payload of `get_entity_permissions`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityPermissionsPayload {
    /// Entity kind.
    pub entity_kind: String,
    /// Entity id.
    pub entity_id: i64,
    /// Include role and ancestor permissions.
    #[serde(default)]
    pub include_inherited: bool,
}

/// Payload of `get_user_roles` and `get_user_groups`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserMembershipPayload {
    /// User id.
    pub user_id: i64,
    /// Include ancestor groups; ignored by `get_user_roles`.
    #[serde(default)]
    pub include_inherited: bool,
}

/// Payload of `get_group_members`, `get_child_groups` and `get_parent_groups`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupMembershipPayload {
    /// Group id.
    pub group_id: i64,
    /// Include users of nested groups; ignored by child/parent lookups.
    #[serde(default)]
    pub include_nested: bool,
}

impl CommandPayload for CreateEntityPayload {}
impl CommandPayload for UpdateEntityPayload {}
impl CommandPayload for EntityIdPayload {}
impl CommandPayload for UserGroupPayload {}
impl CommandPayload for UserRolePayload {}
impl CommandPayload for GroupHierarchyPayload {}
impl CommandPayload for RoleGroupPayload {}
impl CommandPayload for PermissionPayload {}
impl CommandPayload for RemovePermissionPayload {}
impl CommandPayload for ListEntitiesPayload {}
impl CommandPayload for PermissionCheckPayload {}
impl CommandPayload for EntityPermissionsPayload {}
impl CommandPayload for UserMembershipPayload {}
impl CommandPayload for GroupMembershipPayload {}
