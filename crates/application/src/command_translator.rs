//! Translation of inbound commands into validated internal operations.

use std::str::FromStr;

use aclgraph_core::{AppError, AppResult, NonEmptyString};
use aclgraph_domain::{
    EntityGraph, EntityId, EntityKind, EntityRef, EntitySortField, HttpVerb, PermissionId,
    PermissionScheme, Polarity, ResourcePattern, SortDirection,
};

use crate::commands::{
    CommandPayload, CommandType, CreateEntityPayload, EntityIdPayload, EntityPermissionsPayload,
    GroupHierarchyPayload, GroupMembershipPayload, ListEntitiesPayload, PermissionCheckPayload,
    PermissionPayload, RemovePermissionPayload, RequestCommand, RoleGroupPayload,
    UpdateEntityPayload, UserGroupPayload, UserMembershipPayload, UserRolePayload,
};
use crate::outcome::CommandOutput;
use crate::queries::{
    CheckEntityPermissionQuery, EntityFilter, EvaluatePermissionQuery, GetChildGroupsQuery,
    GetEntityPermissionsQuery, GetEntityQuery, GetGroupMembersQuery, GetParentGroupsQuery,
    GetUserGroupsQuery, GetUserRolesQuery, ListEntitiesQuery, ListEntitiesWithCountQuery, Query,
};

/// Whether an operation mutates the graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum OperationClass {
    /// Changes the graph; always runs inside the tenant processor.
    Mutation,
    /// Reads the graph only.
    Query,
}

impl OperationClass {
    /// Returns the stable label used in logs.
    #[must_use]
    pub(crate) fn as_str(&self) -> &'static str {
        match self {
            Self::Mutation => "mutation",
            Self::Query => "query",
        }
    }
}

/// One relationship edge named by raw ids, resolved by the processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeTarget {
    /// Group to user membership.
    UserGroup {
        /// Member user.
        user: EntityId,
        /// Containing group.
        group: EntityId,
    },
    /// Role to user assignment.
    UserRole {
        /// Assigned user.
        user: EntityId,
        /// Assigned role.
        role: EntityId,
    },
    /// Group to role attachment.
    RoleGroup {
        /// Attached role.
        role: EntityId,
        /// Owning group.
        group: EntityId,
    },
    /// Group hierarchy edge.
    GroupGroup {
        /// Nested group.
        child: EntityId,
        /// Containing group.
        parent: EntityId,
    },
}

impl EdgeTarget {
    /// Returns the parent end.
    #[must_use]
    pub fn parent(&self) -> EntityRef {
        match *self {
            Self::UserGroup { group, .. } | Self::RoleGroup { group, .. } => {
                EntityRef::group(group)
            }
            Self::UserRole { role, .. } => EntityRef::role(role),
            Self::GroupGroup { parent, .. } => EntityRef::group(parent),
        }
    }

    /// Returns the child end.
    #[must_use]
    pub fn child(&self) -> EntityRef {
        match *self {
            Self::UserGroup { user, .. } | Self::UserRole { user, .. } => EntityRef::user(user),
            Self::RoleGroup { role, .. } => EntityRef::role(role),
            Self::GroupGroup { child, .. } => EntityRef::group(child),
        }
    }
}

/// Graph mutation produced by the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Mutation {
    /// Create an entity with a freshly allocated id.
    CreateEntity {
        /// Kind to create.
        kind: EntityKind,
        /// Display name.
        display_name: NonEmptyString,
        /// Optional description.
        description: Option<String>,
    },
    /// Rename an existing entity.
    UpdateEntity {
        /// Target.
        reference: EntityRef,
        /// New display name.
        display_name: NonEmptyString,
        /// New description.
        description: Option<String>,
    },
    /// Delete an entity with all its edges and permissions.
    DeleteEntity {
        /// Target.
        reference: EntityRef,
    },
    /// Create a relationship edge.
    Link(EdgeTarget),
    /// Remove a relationship edge.
    Unlink(EdgeTarget),
    /// Attach a new grant or deny.
    AddPermission {
        /// Holder.
        holder: EntityRef,
        /// Resource pattern.
        resource: ResourcePattern,
        /// Verb.
        verb: HttpVerb,
        /// Scheme.
        scheme: PermissionScheme,
        /// Grant or deny.
        polarity: Polarity,
    },
    /// Detach a permission from its holder.
    RemovePermission {
        /// Holder.
        holder: EntityRef,
        /// Permission.
        permission_id: PermissionId,
    },
}

/// Read operation produced by the translator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadOperation {
    /// `get_user`, `get_group`, `get_role`.
    GetEntity(GetEntityQuery),
    /// `get_users`, `get_groups`, `get_roles`.
    ListEntities(ListEntitiesWithCountQuery),
    /// `evaluate_permission`.
    EvaluatePermission(EvaluatePermissionQuery),
    /// `check_permission`.
    CheckPermission(CheckEntityPermissionQuery),
    /// `get_entity_permissions`.
    GetEntityPermissions(GetEntityPermissionsQuery),
    /// `get_user_roles`.
    GetUserRoles(GetUserRolesQuery),
    /// `get_user_groups`.
    GetUserGroups(GetUserGroupsQuery),
    /// `get_group_members`.
    GetGroupMembers(GetGroupMembersQuery),
    /// `get_child_groups`.
    GetChildGroups(GetChildGroupsQuery),
    /// `get_parent_groups`.
    GetParentGroups(GetParentGroupsQuery),
}

impl ReadOperation {
    /// Runs the wrapped query against a graph.
    pub fn run(&self, graph: &EntityGraph) -> AppResult<CommandOutput> {
        Ok(match self {
            Self::GetEntity(query) => CommandOutput::Entity {
                entity: query.run(graph)?,
            },
            Self::ListEntities(query) => CommandOutput::Page {
                page: query.run(graph)?,
            },
            Self::EvaluatePermission(query) => CommandOutput::Decision {
                decision: query.run(graph)?,
            },
            Self::CheckPermission(query) => CommandOutput::Allowed {
                allowed: query.run(graph)?,
            },
            Self::GetEntityPermissions(query) => CommandOutput::Permissions {
                permissions: query.run(graph)?,
            },
            Self::GetUserRoles(query) => CommandOutput::Entities {
                entities: query.run(graph)?,
            },
            Self::GetUserGroups(query) => CommandOutput::Entities {
                entities: query.run(graph)?,
            },
            Self::GetGroupMembers(query) => CommandOutput::Entities {
                entities: query.run(graph)?,
            },
            Self::GetChildGroups(query) => CommandOutput::Entities {
                entities: query.run(graph)?,
            },
            Self::GetParentGroups(query) => CommandOutput::Entities {
                entities: query.run(graph)?,
            },
        })
    }
}

/// Internal operation descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Graph mutation.
    Mutate(Mutation),
    /// Graph read.
    Read(ReadOperation),
}

impl Operation {
    /// Classifies the operation.
    #[must_use]
    pub(crate) fn class(&self) -> OperationClass {
        match self {
            Self::Mutate(_) => OperationClass::Mutation,
            Self::Read(_) => OperationClass::Query,
        }
    }
}

/// Maps [`RequestCommand`] envelopes to [`Operation`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandTranslator;

impl CommandTranslator {
    /// Creates a translator.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Validates the envelope, decodes the payload and builds the operation.
    ///
    /// Unknown command types yield [`AppError::UnsupportedCommand`]; malformed
    /// envelopes, payloads or enum values yield [`AppError::Validation`].
    pub fn translate(&self, command: &RequestCommand) -> AppResult<Operation> {
        if command.request_id.trim().is_empty() {
            return Err(AppError::Validation("request_id is required".to_owned()));
        }
        if command.actor_id <= 0 {
            return Err(AppError::Validation(format!(
                "actor_id must be a positive id, got {}",
                command.actor_id
            )));
        }

        let command_type = CommandType::parse(command.command_type.as_str()).ok_or_else(|| {
            AppError::UnsupportedCommand(format!(
                "command type '{}' is not supported",
                command.command_type
            ))
        })?;

        match command_type {
            CommandType::CreateUser => create(command, EntityKind::User),
            CommandType::CreateGroup => create(command, EntityKind::Group),
            CommandType::CreateRole => create(command, EntityKind::Role),
            CommandType::UpdateUser => update(command, EntityKind::User),
            CommandType::UpdateGroup => update(command, EntityKind::Group),
            CommandType::UpdateRole => update(command, EntityKind::Role),
            CommandType::DeleteUser => delete(command, EntityKind::User),
            CommandType::DeleteGroup => delete(command, EntityKind::Group),
            CommandType::DeleteRole => delete(command, EntityKind::Role),
            CommandType::AddUserToGroup => {
                user_group(command).map(Mutation::Link).map(Operation::Mutate)
            }
            CommandType::RemoveUserFromGroup => {
                user_group(command).map(Mutation::Unlink).map(Operation::Mutate)
            }
            CommandType::AssignUserToRole => {
                user_role(command).map(Mutation::Link).map(Operation::Mutate)
            }
            CommandType::UnassignUserFromRole => {
                user_role(command).map(Mutation::Unlink).map(Operation::Mutate)
            }
            CommandType::AddGroupToGroup => {
                group_group(command).map(Mutation::Link).map(Operation::Mutate)
            }
            CommandType::RemoveGroupFromGroup => {
                group_group(command).map(Mutation::Unlink).map(Operation::Mutate)
            }
            CommandType::AddRoleToGroup => {
                role_group(command).map(Mutation::Link).map(Operation::Mutate)
            }
            CommandType::RemoveRoleFromGroup => {
                role_group(command).map(Mutation::Unlink).map(Operation::Mutate)
            }
            CommandType::GrantPermission => add_permission(command, Polarity::Grant),
            CommandType::DenyPermission => add_permission(command, Polarity::Deny),
            CommandType::RemovePermission => remove_permission(command),
            CommandType::GetUser => get_entity(command, EntityKind::User),
            CommandType::GetGroup => get_entity(command, EntityKind::Group),
            CommandType::GetRole => get_entity(command, EntityKind::Role),
            CommandType::GetUsers => list_entities(command, EntityKind::User),
            CommandType::GetGroups => list_entities(command, EntityKind::Group),
            CommandType::GetRoles => list_entities(command, EntityKind::Role),
            CommandType::EvaluatePermission => {
                evaluation(command).map(|query| read(ReadOperation::EvaluatePermission(query)))
            }
            CommandType::CheckPermission => evaluation(command).map(|query| {
                read(ReadOperation::CheckPermission(CheckEntityPermissionQuery {
                    evaluation: query,
                }))
            }),
            CommandType::GetEntityPermissions => entity_permissions(command),
            CommandType::GetUserRoles => {
                let payload: UserMembershipPayload = decode(command)?;
                checked(ReadOperation::GetUserRoles(GetUserRolesQuery {
                    user_id: payload.user_id,
                }))
            }
            CommandType::GetUserGroups => {
                let payload: UserMembershipPayload = decode(command)?;
                checked(ReadOperation::GetUserGroups(GetUserGroupsQuery {
                    user_id: payload.user_id,
                    include_inherited: payload.include_inherited,
                }))
            }
            CommandType::GetGroupMembers => {
                let payload: GroupMembershipPayload = decode(command)?;
                checked(ReadOperation::GetGroupMembers(GetGroupMembersQuery {
                    group_id: payload.group_id,
                    include_nested: payload.include_nested,
                }))
            }
            CommandType::GetChildGroups => {
                let payload: GroupMembershipPayload = decode(command)?;
                checked(ReadOperation::GetChildGroups(GetChildGroupsQuery {
                    group_id: payload.group_id,
                }))
            }
            CommandType::GetParentGroups => {
                let payload: GroupMembershipPayload = decode(command)?;
                checked(ReadOperation::GetParentGroups(GetParentGroupsQuery {
                    group_id: payload.group_id,
                }))
            }
        }
    }
}

fn decode<P: CommandPayload>(command: &RequestCommand) -> AppResult<P> {
    command.decode()
}

fn read(operation: ReadOperation) -> Operation {
    Operation::Read(operation)
}

/// Runs query validation up front so malformed reads are rejected at translation.
fn checked(operation: ReadOperation) -> AppResult<Operation> {
    match &operation {
        ReadOperation::GetEntity(query) => query.validate()?,
        ReadOperation::ListEntities(query) => query.validate()?,
        ReadOperation::EvaluatePermission(query) => query.validate()?,
        ReadOperation::CheckPermission(query) => query.validate()?,
        ReadOperation::GetEntityPermissions(query) => query.validate()?,
        ReadOperation::GetUserRoles(query) => query.validate()?,
        ReadOperation::GetUserGroups(query) => query.validate()?,
        ReadOperation::GetGroupMembers(query) => query.validate()?,
        ReadOperation::GetChildGroups(query) => query.validate()?,
        ReadOperation::GetParentGroups(query) => query.validate()?,
    }

    Ok(read(operation))
}

fn id_field(field: &str, value: i64) -> AppResult<EntityId> {
    EntityId::new(value)
        .map_err(|_| AppError::Validation(format!("{field} must be a positive id, got {value}")))
}

fn display_name(value: Option<String>) -> AppResult<NonEmptyString> {
    NonEmptyString::new(value.unwrap_or_default())
        .map_err(|_| AppError::Validation("display_name is required".to_owned()))
}

fn description(value: Option<String>) -> Option<String> {
    value
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty())
}

fn entity_kind(value: &str) -> AppResult<EntityKind> {
    EntityKind::from_str(value.trim().to_ascii_lowercase().as_str())
}

fn create(command: &RequestCommand, kind: EntityKind) -> AppResult<Operation> {
    let payload: CreateEntityPayload = decode(command)?;

    Ok(Operation::Mutate(Mutation::CreateEntity {
        kind,
        display_name: display_name(payload.display_name)?,
        description: description(payload.description),
    }))
}

fn update(command: &RequestCommand, kind: EntityKind) -> AppResult<Operation> {
    let payload: UpdateEntityPayload = decode(command)?;

    Ok(Operation::Mutate(Mutation::UpdateEntity {
        reference: EntityRef::new(kind, id_field("id", payload.id)?),
        display_name: display_name(payload.display_name)?,
        description: description(payload.description),
    }))
}

fn delete(command: &RequestCommand, kind: EntityKind) -> AppResult<Operation> {
    let payload: EntityIdPayload = decode(command)?;

    Ok(Operation::Mutate(Mutation::DeleteEntity {
        reference: EntityRef::new(kind, id_field("id", payload.id)?),
    }))
}

fn user_group(command: &RequestCommand) -> AppResult<EdgeTarget> {
    let payload: UserGroupPayload = decode(command)?;

    Ok(EdgeTarget::UserGroup {
        user: id_field("user_id", payload.user_id)?,
        group: id_field("group_id", payload.group_id)?,
    })
}

fn user_role(command: &RequestCommand) -> AppResult<EdgeTarget> {
    let payload: UserRolePayload = decode(command)?;

    Ok(EdgeTarget::UserRole {
        user: id_field("user_id", payload.user_id)?,
        role: id_field("role_id", payload.role_id)?,
    })
}

fn group_group(command: &RequestCommand) -> AppResult<EdgeTarget> {
    let payload: GroupHierarchyPayload = decode(command)?;

    Ok(EdgeTarget::GroupGroup {
        child: id_field("child_id", payload.child_id)?,
        parent: id_field("parent_id", payload.parent_id)?,
    })
}

fn role_group(command: &RequestCommand) -> AppResult<EdgeTarget> {
    let payload: RoleGroupPayload = decode(command)?;

    Ok(EdgeTarget::RoleGroup {
        role: id_field("role_id", payload.role_id)?,
        group: id_field("group_id", payload.group_id)?,
    })
}

fn add_permission(command: &RequestCommand, polarity: Polarity) -> AppResult<Operation> {
    let payload: PermissionPayload = decode(command)?;
    let resource_uri = payload
        .resource_uri
        .ok_or_else(|| AppError::Validation("resource_uri is required".to_owned()))?;
    let scheme = match payload.scheme.as_deref() {
        Some(scheme) => PermissionScheme::from_str(scheme)?,
        None => PermissionScheme::Api,
    };

    Ok(Operation::Mutate(Mutation::AddPermission {
        holder: EntityRef::new(
            entity_kind(payload.entity_kind.as_str())?,
            id_field("entity_id", payload.entity_id)?,
        ),
        resource: ResourcePattern::new(resource_uri)?,
        verb: HttpVerb::from_str(payload.verb.as_str())?,
        scheme,
        polarity,
    }))
}

fn remove_permission(command: &RequestCommand) -> AppResult<Operation> {
    let payload: RemovePermissionPayload = decode(command)?;
    let permission_id = PermissionId::new(payload.permission_id).map_err(|_| {
        AppError::Validation(format!(
            "permission_id must be a positive id, got {}",
            payload.permission_id
        ))
    })?;

    Ok(Operation::Mutate(Mutation::RemovePermission {
        holder: EntityRef::new(
            entity_kind(payload.entity_kind.as_str())?,
            id_field("entity_id", payload.entity_id)?,
        ),
        permission_id,
    }))
}

fn get_entity(command: &RequestCommand, kind: EntityKind) -> AppResult<Operation> {
    let payload: EntityIdPayload = decode(command)?;

    checked(ReadOperation::GetEntity(GetEntityQuery {
        kind,
        id: payload.id,
    }))
}

fn list_entities(command: &RequestCommand, kind: EntityKind) -> AppResult<Operation> {
    let payload: ListEntitiesPayload = decode(command)?;
    let sort_by = match payload.sort_by.as_deref() {
        Some(value) => EntitySortField::from_str(value.trim())?,
        None => EntitySortField::default(),
    };
    let direction = match payload.direction.as_deref() {
        Some(value) => SortDirection::from_str(value.trim())?,
        None => SortDirection::default(),
    };

    checked(ReadOperation::ListEntities(ListEntitiesWithCountQuery {
        listing: ListEntitiesQuery {
            kind,
            filter: EntityFilter {
                name: payload.name,
                search: payload.search,
            },
            page: payload.page,
            page_size: payload.page_size,
            sort_by,
            direction,
        },
    }))
}

fn evaluation(command: &RequestCommand) -> AppResult<EvaluatePermissionQuery> {
    let payload: PermissionCheckPayload = decode(command)?;
    let kind = match payload.entity_kind.as_deref() {
        Some(value) => entity_kind(value)?,
        None => EntityKind::User,
    };
    let query = EvaluatePermissionQuery {
        kind,
        id: payload.entity_id,
        uri: payload.uri.unwrap_or_default(),
        verb: payload.verb,
    };
    query.validate()?;

    Ok(query)
}

fn entity_permissions(command: &RequestCommand) -> AppResult<Operation> {
    let payload: EntityPermissionsPayload = decode(command)?;

    checked(ReadOperation::GetEntityPermissions(
        GetEntityPermissionsQuery {
            kind: entity_kind(payload.entity_kind.as_str())?,
            id: payload.entity_id,
            include_inherited: payload.include_inherited,
        },
    ))
}

#[cfg(test)]
mod tests;
