//! Per-tenant runtimes: one graph, one queue and one processor each.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use aclgraph_core::{AppError, AppResult, TenantId};
use aclgraph_domain::EntityGraph;

use crate::command_processor::{
    CommandProcessor, InFlightCommand, ProcessorLiveness, ProcessorReport, ProcessorSettings,
    ProcessorState, ReadConsistency,
};
use crate::command_queue::{CommandQueue, command_queue};
use crate::command_translator::{CommandTranslator, Operation};
use crate::commands::RequestCommand;
use crate::graph_loader::{GraphLoader, LoadReport};
use crate::graph_ports::GraphMutationSink;
use crate::outcome::CommandReply;
use crate::persistence::{PersistenceReport, persistence_channel, run_persistence};
use crate::queries::Query;

/// Cheap, cloneable access point to one running tenant.
#[derive(Debug, Clone)]
pub struct TenantHandle {
    tenant_id: TenantId,
    queue: CommandQueue,
    snapshots: watch::Receiver<Arc<EntityGraph>>,
    liveness: watch::Receiver<ProcessorLiveness>,
    read_consistency: ReadConsistency,
    publishes_snapshots: bool,
}

impl TenantHandle {
    /// Returns the tenant.
    #[must_use]
    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    /// Returns the producer side of the tenant queue.
    #[must_use]
    pub fn queue(&self) -> &CommandQueue {
        &self.queue
    }

    /// Runs a command and waits for its reply.
    ///
    /// With [`ReadConsistency::Snapshot`] queries are answered from the latest
    /// published snapshot without entering the queue; everything else is
    /// serialized through the processor.
    pub async fn execute(&self, command: RequestCommand) -> CommandReply {
        if self.read_consistency == ReadConsistency::Snapshot
            && let Operation::Read(read) = CommandTranslator::new().translate(&command)?
        {
            return read.run(&self.snapshot());
        }

        self.queue.submit(command).await
    }

    /// Admits a command without waiting for its reply.
    pub async fn enqueue(&self, command: RequestCommand) -> AppResult<()> {
        self.queue.enqueue(command).await
    }

    /// Returns the latest published graph snapshot.
    ///
    /// Without snapshot publishing this is the hydrated graph until the
    /// tenant stops.
    #[must_use]
    pub fn snapshot(&self) -> Arc<EntityGraph> {
        self.snapshots.borrow().clone()
    }

    /// Runs a typed query against the latest snapshot.
    pub fn query<Q: Query>(&self, query: &Q) -> AppResult<Q::Output> {
        query.run(&self.snapshot())
    }

    /// Returns the processor's latest progress counters.
    #[must_use]
    pub fn liveness(&self) -> ProcessorLiveness {
        self.liveness.borrow().clone()
    }

    /// Waits until a snapshot at least as new as `version` is published.
    ///
    /// Fails fast when the tenant does not publish snapshots while running.
    pub async fn wait_for_version(&mut self, version: u64) -> AppResult<Arc<EntityGraph>> {
        let tenant_id = self.tenant_id;
        if !self.publishes_snapshots && self.snapshots.borrow().version() < version {
            return Err(AppError::Validation(format!(
                "tenant {tenant_id} publishes snapshots only when it stops"
            )));
        }
        self.snapshots
            .wait_for(|graph| graph.version() >= version)
            .await
            .map(|graph| graph.clone())
            .map_err(|_| AppError::Unavailable(format!("tenant {tenant_id} has stopped")))
    }
}

/// What stopping a tenant produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantStopReport {
    /// Processor exit and counters.
    pub processor: ProcessorReport,
    /// Persistence counters, when a sink is configured.
    pub persistence: Option<PersistenceReport>,
}

/// Tenant currently stuck on one command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StalledTenant {
    /// Tenant.
    pub tenant_id: TenantId,
    /// The command it is holding.
    pub command: InFlightCommand,
}

struct TenantRuntime {
    handle: TenantHandle,
    cancel: CancellationToken,
    processor: JoinHandle<ProcessorReport>,
    persistence: Option<JoinHandle<PersistenceReport>>,
}

/// Registry of running tenants.
pub struct TenantRegistry {
    loader: GraphLoader,
    sink: Option<Arc<dyn GraphMutationSink>>,
    settings: ProcessorSettings,
    shutdown: CancellationToken,
    tenants: Mutex<HashMap<TenantId, TenantRuntime>>,
}

impl TenantRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(
        loader: GraphLoader,
        sink: Option<Arc<dyn GraphMutationSink>>,
        settings: ProcessorSettings,
    ) -> Self {
        Self {
            loader,
            sink,
            settings,
            shutdown: CancellationToken::new(),
            tenants: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the processor settings shared by every tenant.
    #[must_use]
    pub fn settings(&self) -> ProcessorSettings {
        self.settings
    }

    /// Loads a tenant graph and starts its processor.
    pub async fn hydrate(&self, tenant_id: TenantId) -> AppResult<LoadReport> {
        self.ensure_absent(tenant_id).await?;
        let (graph, report) = self.loader.load(tenant_id).await?;
        self.spawn(tenant_id, graph).await?;

        Ok(report)
    }

    /// Starts a processor over an already built graph.
    pub async fn spawn(&self, tenant_id: TenantId, graph: EntityGraph) -> AppResult<TenantHandle> {
        let mut tenants = self.tenants.lock().await;
        if tenants.contains_key(&tenant_id) {
            return Err(already_running(tenant_id));
        }

        let cancel = self.shutdown.child_token();
        let (queue, stream) =
            command_queue(tenant_id, self.settings.queue_capacity, cancel.clone());

        let (sender, persistence) = match &self.sink {
            Some(sink) => {
                let (sender, receiver) = persistence_channel();
                let task = tokio::spawn(run_persistence(sink.clone(), receiver));
                (Some(sender), Some(task))
            }
            None => (None, None),
        };

        let graph_version = graph.version();
        let (processor, channels) = CommandProcessor::new(
            tenant_id,
            graph,
            stream,
            cancel.clone(),
            self.settings,
            sender,
        );
        let handle = TenantHandle {
            tenant_id,
            queue,
            snapshots: channels.snapshots,
            liveness: channels.liveness,
            read_consistency: self.settings.read_consistency,
            publishes_snapshots: self.settings.publishes_snapshots(),
        };

        tenants.insert(
            tenant_id,
            TenantRuntime {
                handle: handle.clone(),
                cancel,
                processor: tokio::spawn(processor.run()),
                persistence,
            },
        );
        info!(
            tenant_id = %tenant_id,
            graph_version,
            queue_capacity = self.settings.queue_capacity,
            read_consistency = self.settings.read_consistency.as_str(),
            "tenant runtime started"
        );

        Ok(handle)
    }

    /// Returns the handle of a running tenant.
    pub async fn handle(&self, tenant_id: TenantId) -> AppResult<TenantHandle> {
        let tenants = self.tenants.lock().await;
        let runtime = tenants.get(&tenant_id).ok_or_else(|| {
            AppError::Unavailable(format!("tenant {tenant_id} is not hydrated"))
        })?;

        if runtime.cancel.is_cancelled()
            || runtime.handle.liveness.borrow().state == ProcessorState::Stopped
        {
            return Err(AppError::Unavailable(format!("tenant {tenant_id} has stopped")));
        }

        Ok(runtime.handle.clone())
    }

    /// Lists registered tenants in id order.
    pub async fn tenant_ids(&self) -> Vec<TenantId> {
        let mut tenant_ids: Vec<TenantId> = self.tenants.lock().await.keys().copied().collect();
        tenant_ids.sort();
        tenant_ids
    }

    /// Lists tenants that have held one command longer than `threshold`.
    pub async fn stalled_tenants(&self, threshold: Duration) -> Vec<StalledTenant> {
        let now = Instant::now();
        let tenants = self.tenants.lock().await;

        let mut stalled: Vec<StalledTenant> = tenants
            .iter()
            .filter_map(|(tenant_id, runtime)| {
                let liveness = runtime.handle.liveness();
                if !liveness.is_stalled(threshold, now) {
                    return None;
                }
                liveness.in_flight.map(|command| StalledTenant {
                    tenant_id: *tenant_id,
                    command,
                })
            })
            .collect();
        stalled.sort_by_key(|tenant| tenant.tenant_id);
        stalled
    }

    /// Cancels one tenant and waits for its processor and persistence to finish.
    pub async fn stop(&self, tenant_id: TenantId) -> AppResult<TenantStopReport> {
        let runtime = self
            .tenants
            .lock()
            .await
            .remove(&tenant_id)
            .ok_or_else(|| AppError::NotFound(format!("tenant {tenant_id} is not registered")))?;

        runtime.cancel.cancel();
        finish(tenant_id, runtime).await
    }

    /// Cancels every tenant and waits for all of them.
    pub async fn stop_all(&self) -> Vec<(TenantId, AppResult<TenantStopReport>)> {
        self.shutdown.cancel();
        let runtimes: Vec<(TenantId, TenantRuntime)> =
            self.tenants.lock().await.drain().collect();

        let mut reports = Vec::with_capacity(runtimes.len());
        for (tenant_id, runtime) in runtimes {
            reports.push((tenant_id, finish(tenant_id, runtime).await));
        }
        reports.sort_by_key(|(tenant_id, _)| *tenant_id);
        reports
    }

    async fn ensure_absent(&self, tenant_id: TenantId) -> AppResult<()> {
        if self.tenants.lock().await.contains_key(&tenant_id) {
            return Err(already_running(tenant_id));
        }
        Ok(())
    }
}

async fn finish(tenant_id: TenantId, runtime: TenantRuntime) -> AppResult<TenantStopReport> {
    let TenantRuntime {
        handle,
        processor,
        persistence,
        ..
    } = runtime;
    drop(handle);

    let processor = processor.await.map_err(|error| {
        AppError::Internal(format!("processor task of tenant {tenant_id} failed: {error}"))
    })?;

    let persistence = match persistence {
        Some(task) => Some(task.await.map_err(|error| {
            AppError::Internal(format!(
                "persistence task of tenant {tenant_id} failed: {error}"
            ))
        })?),
        None => None,
    };

    if persistence.is_some_and(|report| report.failed > 0) {
        warn!(
            tenant_id = %tenant_id,
            "some mutations were not persisted before shutdown"
        );
    }
    info!(
        tenant_id = %tenant_id,
        processed = processor.processed,
        rejected = processor.rejected,
        graph_version = processor.graph_version,
        "tenant runtime stopped"
    );

    Ok(TenantStopReport {
        processor,
        persistence,
    })
}

fn already_running(tenant_id: TenantId) -> AppError {
    AppError::Conflict(format!("tenant {tenant_id} is already running"))
}

#[cfg(test)]
mod tests;
