use std::str::FromStr;

use aclgraph_core::AppError;

use crate::command_queue::DEFAULT_QUEUE_CAPACITY;

/// What happens to queued commands when a tenant is cancelled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ShutdownPolicy {
    /// Close the queue for writes, then process everything already queued.
    #[default]
    DrainAndComplete,
    /// Close the queue for writes and reject everything already queued.
    DrainAndDiscard,
}

/// Where query commands read the graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadConsistency {
    /// Queries run inside the processor, ordered with mutations.
    #[default]
    Sequential,
    /// Queries run in the caller on the latest published snapshot.
    Snapshot,
}

/// How the processor reacts to an unexpected failure of one command.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InternalErrorPolicy {
    /// Reply with the error and keep draining.
    #[default]
    IsolateCommand,
    /// Reply with the error and stop the tenant loop.
    StopTenant,
}

/// Validated runtime settings shared by every tenant processor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProcessorSettings {
    /// Bounded queue capacity.
    pub queue_capacity: usize,
    /// Shutdown behavior.
    pub shutdown_policy: ShutdownPolicy,
    /// Read routing.
    pub read_consistency: ReadConsistency,
    /// Unexpected failure behavior.
    pub internal_error_policy: InternalErrorPolicy,
    /// Run the full graph integrity check after every mutation.
    pub verify_integrity: bool,
    /// Publish a snapshot after every drained burst even for sequential reads.
    ///
    /// Snapshot reads always publish. Otherwise the graph is published once,
    /// when the processor stops.
    pub publish_snapshots: bool,
}

impl Default for ProcessorSettings {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            shutdown_policy: ShutdownPolicy::default(),
            read_consistency: ReadConsistency::default(),
            internal_error_policy: InternalErrorPolicy::default(),
            verify_integrity: false,
            publish_snapshots: false,
        }
    }
}

impl ProcessorSettings {
    /// Whether the processor publishes snapshots while it runs.
    #[must_use]
    pub fn publishes_snapshots(&self) -> bool {
        self.publish_snapshots || self.read_consistency == ReadConsistency::Snapshot
    }
}

impl ShutdownPolicy {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DrainAndComplete => "drain_and_complete",
            Self::DrainAndDiscard => "drain_and_discard",
        }
    }
}

impl FromStr for ShutdownPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "drain_and_complete" => Ok(Self::DrainAndComplete),
            "drain_and_discard" => Ok(Self::DrainAndDiscard),
            _ => Err(AppError::Validation(format!(
                "unknown shutdown policy '{value}'"
            ))),
        }
    }
}

impl ReadConsistency {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sequential => "sequential",
            Self::Snapshot => "snapshot",
        }
    }
}

impl FromStr for ReadConsistency {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "sequential" => Ok(Self::Sequential),
            "snapshot" => Ok(Self::Snapshot),
            _ => Err(AppError::Validation(format!(
                "unknown read consistency '{value}'"
            ))),
        }
    }
}

impl InternalErrorPolicy {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IsolateCommand => "isolate_command",
            Self::StopTenant => "stop_tenant",
        }
    }
}

impl FromStr for InternalErrorPolicy {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim() {
            "isolate_command" => Ok(Self::IsolateCommand),
            "stop_tenant" => Ok(Self::StopTenant),
            _ => Err(AppError::Validation(format!(
                "unknown internal error policy '{value}'"
            ))),
        }
    }
}
