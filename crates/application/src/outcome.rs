use serde::Serialize;

use aclgraph_core::{AppError, AppResult, ErrorKind};
use aclgraph_domain::{EdgeChange, EntityRef, Permission, PermissionId};

use crate::queries::{AccessDecision, EntityPage, EntityView};

/// Successful result of one command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommandOutput {
    /// Entity created or updated.
    EntitySaved {
        /// Stored entity.
        entity: EntityView,
        /// Graph version after the mutation.
        graph_version: u64,
    },
    /// Entity deleted with its edges and permissions.
    EntityDeleted {
        /// Deleted entity.
        reference: EntityRef,
        /// Graph version after the mutation.
        graph_version: u64,
    },
    /// Relationship edge created or removed.
    EdgeChanged {
        /// Parent end.
        parent: EntityRef,
        /// Child end.
        child: EntityRef,
        /// Applied change.
        change: EdgeChange,
        /// Graph version after the mutation.
        graph_version: u64,
    },
    /// Permission attached.
    PermissionAttached {
        /// Attached permission.
        permission: Permission,
        /// Graph version after the mutation.
        graph_version: u64,
    },
    /// Permission detached.
    PermissionDetached {
        /// Former holder.
        holder: EntityRef,
        /// Removed permission.
        permission_id: PermissionId,
        /// Graph version after the mutation.
        graph_version: u64,
    },
    /// Single entity lookup.
    Entity {
        /// Found entity.
        entity: EntityView,
    },
    /// Unpaged entity list.
    Entities {
        /// Entities in id order.
        entities: Vec<EntityView>,
    },
    /// Paged listing.
    Page {
        /// Page with total.
        page: EntityPage,
    },
    /// Permission list.
    Permissions {
        /// Permissions in id order.
        permissions: Vec<Permission>,
    },
    /// Full access evaluation.
    Decision {
        /// Evaluation result.
        decision: AccessDecision,
    },
    /// Boolean access check.
    Allowed {
        /// Whether access is allowed.
        allowed: bool,
    },
}

/// Reply delivered to the producer of one command.
pub type CommandReply = AppResult<CommandOutput>;

/// Reportable outcome of one processed command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CommandOutcome {
    /// Correlation id of the command.
    pub request_id: String,
    /// Command type transport value.
    pub command_type: String,
    /// Completion or rejection.
    #[serde(flatten)]
    pub status: OutcomeStatus,
}

/// Completion state of a [`CommandOutcome`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// The command completed.
    Completed {
        /// Command result.
        output: CommandOutput,
    },
    /// The command was rejected without changing the graph.
    Rejected {
        /// Classified error code.
        error_kind: ErrorKind,
        /// Human readable detail.
        message: String,
    },
}

impl CommandOutcome {
    /// Builds an outcome from a processor reply.
    #[must_use]
    pub fn from_reply(
        request_id: impl Into<String>,
        command_type: impl Into<String>,
        reply: CommandReply,
    ) -> Self {
        let status = match reply {
            Ok(output) => OutcomeStatus::Completed { output },
            Err(error) => OutcomeStatus::rejected(&error),
        };

        Self {
            request_id: request_id.into(),
            command_type: command_type.into(),
            status,
        }
    }

    /// Returns whether the command completed.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self.status, OutcomeStatus::Completed { .. })
    }
}

impl OutcomeStatus {
    fn rejected(error: &AppError) -> Self {
        Self::Rejected {
            error_kind: error.kind(),
            message: error.to_string(),
        }
    }
}
