//! Single-writer processing loop of one tenant graph.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use aclgraph_core::{AppError, TenantId};
use aclgraph_domain::EntityGraph;

use crate::command_queue::{CommandStream, QueuedCommand};
use crate::command_translator::{CommandTranslator, Operation};
use crate::commands::RequestCommand;
use crate::graph_ports::{AppliedMutation, GraphMutation};
use crate::outcome::CommandOutput;

mod execution;
mod liveness;
mod settings;

pub use liveness::{InFlightCommand, ProcessorLiveness, ProcessorState};
pub use settings::{InternalErrorPolicy, ProcessorSettings, ReadConsistency, ShutdownPolicy};

/// Why a processor loop exited.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProcessorExit {
    /// The tenant was cancelled and the queue handled per shutdown policy.
    Cancelled {
        /// Commands processed after cancellation.
        completed: usize,
        /// Commands rejected unprocessed after cancellation.
        discarded: usize,
    },
    /// Every producer handle was dropped.
    QueueClosed,
    /// A fatal failure stopped the loop.
    Fatal(AppError),
}

/// Final counters of one processor run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessorReport {
    /// Exit reason.
    pub exit: ProcessorExit,
    /// Completed commands.
    pub processed: u64,
    /// Rejected or failed commands.
    pub rejected: u64,
    /// Graph version at exit.
    pub graph_version: u64,
}

/// Observation channels published by a processor.
#[derive(Debug, Clone)]
pub struct ProcessorChannels {
    /// Latest graph snapshot, republished after every drained burst of mutations
    /// when [`ProcessorSettings::publishes_snapshots`] holds, and once at stop.
    pub snapshots: watch::Receiver<Arc<EntityGraph>>,
    /// Progress counters and current state.
    pub liveness: watch::Receiver<ProcessorLiveness>,
}

enum CommandFailure {
    Rejected(AppError),
    Internal(AppError),
    Integrity(AppError),
}

impl CommandFailure {
    fn classify(error: AppError) -> Self {
        match error {
            AppError::Internal(_) => Self::Internal(error),
            other => Self::Rejected(other),
        }
    }

    fn into_error(self) -> AppError {
        match self {
            Self::Rejected(error) | Self::Internal(error) | Self::Integrity(error) => error,
        }
    }
}

/// Owner and only writer of one tenant's [`EntityGraph`].
pub struct CommandProcessor {
    tenant_id: TenantId,
    graph: EntityGraph,
    stream: CommandStream,
    translator: CommandTranslator,
    settings: ProcessorSettings,
    cancel: CancellationToken,
    snapshots: watch::Sender<Arc<EntityGraph>>,
    liveness: watch::Sender<ProcessorLiveness>,
    persistence: Option<mpsc::UnboundedSender<AppliedMutation>>,
    published_version: u64,
    processed: u64,
    rejected: u64,
}

impl CommandProcessor {
    /// Creates a processor that takes ownership of `graph`.
    ///
    /// Accepted mutations are handed to `persistence` when present.
    #[must_use]
    pub fn new(
        tenant_id: TenantId,
        graph: EntityGraph,
        stream: CommandStream,
        cancel: CancellationToken,
        settings: ProcessorSettings,
        persistence: Option<mpsc::UnboundedSender<AppliedMutation>>,
    ) -> (Self, ProcessorChannels) {
        let published_version = graph.version();
        let (snapshots, snapshot_receiver) = watch::channel(Arc::new(graph.clone()));
        let (liveness, liveness_receiver) =
            watch::channel(ProcessorLiveness::started(Instant::now()));

        (
            Self {
                tenant_id,
                graph,
                stream,
                translator: CommandTranslator::new(),
                settings,
                cancel,
                snapshots,
                liveness,
                persistence,
                published_version,
                processed: 0,
                rejected: 0,
            },
            ProcessorChannels {
                snapshots: snapshot_receiver,
                liveness: liveness_receiver,
            },
        )
    }

    /// Drains the queue until cancellation, queue closure or a fatal failure.
    pub async fn run(mut self) -> ProcessorReport {
        info!(
            tenant_id = %self.tenant_id,
            shutdown_policy = self.settings.shutdown_policy.as_str(),
            internal_error_policy = self.settings.internal_error_policy.as_str(),
            verify_integrity = self.settings.verify_integrity,
            publish_snapshots = self.settings.publishes_snapshots(),
            "command processor started"
        );

        let exit = loop {
            self.set_state(ProcessorState::Idle);
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => None,
                next = self.stream.recv() => Some(next),
            };

            let queued = match next {
                None => break self.shutdown().await,
                Some(None) => break ProcessorExit::QueueClosed,
                Some(Some(queued)) => queued,
            };

            if let Err(fatal) = self.process(queued) {
                break self.stop_fatal(fatal);
            }
            if self.settings.publishes_snapshots() && self.stream.is_empty() {
                self.publish_snapshot();
            }
        };

        self.publish_snapshot();
        self.set_state(ProcessorState::Stopped);

        match &exit {
            ProcessorExit::Fatal(reason) => error!(
                tenant_id = %self.tenant_id,
                error = %reason,
                processed = self.processed,
                "command processor stopped after fatal failure"
            ),
            _ => info!(
                tenant_id = %self.tenant_id,
                processed = self.processed,
                rejected = self.rejected,
                "command processor stopped"
            ),
        }

        ProcessorReport {
            exit,
            processed: self.processed,
            rejected: self.rejected,
            graph_version: self.graph.version(),
        }
    }

    /// Processes one command; returns `Err` only when the loop must stop.
    fn process(&mut self, queued: QueuedCommand) -> Result<(), AppError> {
        self.set_state(ProcessorState::Draining);
        self.liveness.send_modify(|liveness| {
            liveness.in_flight = Some(InFlightCommand {
                request_id: queued.command.request_id.clone(),
                command_type: queued.command.command_type.clone(),
                started_at: Instant::now(),
            });
        });

        let result = self.handle(&queued.command);

        self.set_state(ProcessorState::Reporting);
        let (reply, fatal) = match result {
            Ok(output) => {
                self.processed += 1;
                debug!(
                    tenant_id = %self.tenant_id,
                    request_id = %queued.command.request_id,
                    command_type = %queued.command.command_type,
                    "command completed"
                );
                (Ok(output), None)
            }
            Err(failure) => {
                self.rejected += 1;
                let fatal = self.report_failure(&queued.command, &failure);
                let error = failure.into_error();
                let fatal = fatal.then(|| error.clone());
                (Err(error), fatal)
            }
        };

        self.liveness.send_modify(|liveness| {
            liveness.processed = self.processed;
            liveness.rejected = self.rejected;
            liveness.last_progress_at = Instant::now();
            liveness.in_flight = None;
        });
        queued.respond(reply);

        match fatal {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn handle(&mut self, command: &RequestCommand) -> Result<CommandOutput, CommandFailure> {
        self.set_state(ProcessorState::Translating);
        let operation = self
            .translator
            .translate(command)
            .map_err(CommandFailure::classify)?;
        debug!(
            tenant_id = %self.tenant_id,
            request_id = %command.request_id,
            operation = operation.class().as_str(),
            "command translated"
        );

        match operation {
            Operation::Read(read) => {
                self.set_state(ProcessorState::Executing);
                read.run(&self.graph).map_err(CommandFailure::classify)
            }
            Operation::Mutate(mutation) => {
                self.set_state(ProcessorState::Validating);
                let validated =
                    execution::validate(&self.graph, mutation).map_err(CommandFailure::classify)?;

                self.set_state(ProcessorState::Executing);
                let applied = execution::execute(&mut self.graph, validated)
                    .map_err(CommandFailure::Internal)?;

                if self.settings.verify_integrity {
                    self.graph
                        .verify_integrity()
                        .map_err(CommandFailure::Integrity)?;
                }

                self.hand_off(command, applied.changes);
                Ok(applied.output)
            }
        }
    }

    /// Logs a failed command and decides whether it is fatal.
    fn report_failure(&self, command: &RequestCommand, failure: &CommandFailure) -> bool {
        match failure {
            CommandFailure::Rejected(reason) => {
                warn!(
                    tenant_id = %self.tenant_id,
                    request_id = %command.request_id,
                    command_type = %command.command_type,
                    error_kind = reason.kind().as_str(),
                    error = %reason,
                    "command rejected"
                );
                false
            }
            CommandFailure::Internal(reason) => {
                error!(
                    tenant_id = %self.tenant_id,
                    request_id = %command.request_id,
                    command_type = %command.command_type,
                    error_kind = reason.kind().as_str(),
                    error = %reason,
                    policy = self.settings.internal_error_policy.as_str(),
                    "command failed unexpectedly"
                );
                self.settings.internal_error_policy == InternalErrorPolicy::StopTenant
            }
            CommandFailure::Integrity(reason) => {
                error!(
                    tenant_id = %self.tenant_id,
                    request_id = %command.request_id,
                    command_type = %command.command_type,
                    error_kind = reason.kind().as_str(),
                    error = %reason,
                    "graph integrity violated"
                );
                true
            }
        }
    }

    fn hand_off(&self, command: &RequestCommand, changes: Vec<GraphMutation>) {
        let Some(persistence) = &self.persistence else {
            return;
        };

        for mutation in changes {
            let applied = AppliedMutation {
                tenant_id: self.tenant_id,
                request_id: command.request_id.clone(),
                actor_id: command.actor_id,
                applied_at: Utc::now(),
                graph_version: self.graph.version(),
                mutation,
            };
            if persistence.send(applied).is_err() {
                warn!(
                    tenant_id = %self.tenant_id,
                    request_id = %command.request_id,
                    "persistence task is gone; mutation kept in memory only"
                );
            }
        }
    }

    async fn shutdown(&mut self) -> ProcessorExit {
        self.stream.close();
        info!(
            tenant_id = %self.tenant_id,
            queued = self.stream.len(),
            policy = self.settings.shutdown_policy.as_str(),
            "command processor shutting down"
        );

        match self.settings.shutdown_policy {
            ShutdownPolicy::DrainAndComplete => {
                let mut completed = 0;
                while let Some(queued) = self.stream.recv().await {
                    if let Err(fatal) = self.process(queued) {
                        return self.stop_fatal(fatal);
                    }
                    completed += 1;
                }
                ProcessorExit::Cancelled {
                    completed,
                    discarded: 0,
                }
            }
            ShutdownPolicy::DrainAndDiscard => ProcessorExit::Cancelled {
                completed: 0,
                discarded: self.discard_remaining(),
            },
        }
    }

    fn stop_fatal(&mut self, reason: AppError) -> ProcessorExit {
        self.cancel.cancel();
        self.stream.close();
        let discarded = self.discard_remaining();
        warn!(
            tenant_id = %self.tenant_id,
            discarded,
            "tenant stopped; queued commands rejected"
        );

        ProcessorExit::Fatal(reason)
    }

    fn discard_remaining(&mut self) -> usize {
        let mut discarded = 0;
        while let Some(queued) = self.stream.try_recv() {
            queued.respond(Err(AppError::Unavailable(format!(
                "tenant {} is shutting down",
                self.tenant_id
            ))));
            discarded += 1;
        }
        discarded
    }

    fn publish_snapshot(&mut self) {
        let version = self.graph.version();
        if version == self.published_version {
            return;
        }

        self.snapshots.send_replace(Arc::new(self.graph.clone()));
        self.published_version = version;
        debug!(
            tenant_id = %self.tenant_id,
            graph_version = version,
            "graph snapshot published"
        );
    }

    fn set_state(&self, state: ProcessorState) {
        self.liveness.send_if_modified(|liveness| {
            if liveness.state == state {
                return false;
            }
            debug!(
                tenant_id = %self.tenant_id,
                from = liveness.state.as_str(),
                to = state.as_str(),
                "processor state changed"
            );
            liveness.state = state;
            true
        });
    }
}
