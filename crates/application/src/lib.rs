//! Application services and ports.

#![forbid(unsafe_code)]

mod command_processor;
mod command_queue;
mod command_translator;
mod commands;
mod graph_loader;
mod graph_ports;
mod outcome;
mod persistence;
mod queries;
mod tenant_registry;

pub use command_processor::{
    CommandProcessor, InFlightCommand, InternalErrorPolicy, ProcessorChannels, ProcessorExit,
    ProcessorLiveness, ProcessorReport, ProcessorSettings, ProcessorState, ReadConsistency,
    ShutdownPolicy,
};
pub use command_queue::{
    CommandQueue, CommandStream, DEFAULT_QUEUE_CAPACITY, QueuedCommand, TryEnqueueError,
    command_queue,
};
pub use command_translator::{CommandTranslator, EdgeTarget, Mutation, Operation, ReadOperation};
pub use commands::{
    CommandPayload, CommandType, CreateEntityPayload, EntityIdPayload, EntityPermissionsPayload,
    GroupHierarchyPayload, GroupMembershipPayload, ListEntitiesPayload, PermissionCheckPayload,
    PermissionPayload, RemovePermissionPayload, RequestCommand, RoleGroupPayload,
    UpdateEntityPayload, UserGroupPayload, UserMembershipPayload, UserRolePayload,
};
pub use graph_loader::{GraphLoader, LoadReport};
pub use graph_ports::{
    AppliedMutation, EntityRow, GraphMutation, GraphMutationSink, GraphSource, PermissionRow,
    RelationRow,
};
pub use outcome::{CommandOutcome, CommandOutput, CommandReply, OutcomeStatus};
pub use persistence::{PersistenceReport, persistence_channel, run_persistence};
pub use queries::{
    AccessDecision, CheckEntityPermissionQuery, CheckGroupCycleQuery, CountEntitiesQuery,
    EntityFilter, EntityPage, EntityView, EvaluatePermissionQuery, GetAncestorsQuery,
    GetChildGroupsQuery, GetDescendantsQuery, GetEntityPermissionsQuery, GetEntityQuery,
    GetGroupMembersQuery, GetParentGroupsQuery, GetRoleUsersQuery, GetUserGroupsQuery,
    GetUserRolesQuery, ListEntitiesQuery, ListEntitiesWithCountQuery, MAX_PAGE_SIZE, Query,
};
pub use tenant_registry::{StalledTenant, TenantHandle, TenantRegistry, TenantStopReport};
