//! Write-behind task persisting accepted mutations.

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::graph_ports::{AppliedMutation, GraphMutationSink};

/// Counters reported when the persistence channel closes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PersistenceReport {
    /// Mutations the sink accepted.
    pub persisted: u64,
    /// Mutations the sink refused.
    pub failed: u64,
}

/// Creates the channel a processor hands accepted mutations to.
#[must_use]
pub fn persistence_channel() -> (
    mpsc::UnboundedSender<AppliedMutation>,
    mpsc::UnboundedReceiver<AppliedMutation>,
) {
    mpsc::unbounded_channel()
}

/// Drains `receiver` into `sink` in arrival order until every sender is dropped.
///
/// Sink failures are logged and counted; the in-memory graph stays authoritative.
pub async fn run_persistence(
    sink: Arc<dyn GraphMutationSink>,
    mut receiver: mpsc::UnboundedReceiver<AppliedMutation>,
) -> PersistenceReport {
    let mut report = PersistenceReport::default();

    while let Some(applied) = receiver.recv().await {
        match sink.persist(&applied).await {
            Ok(()) => {
                report.persisted += 1;
                debug!(
                    tenant_id = %applied.tenant_id,
                    request_id = %applied.request_id,
                    mutation = applied.mutation.as_str(),
                    graph_version = applied.graph_version,
                    "mutation persisted"
                );
            }
            Err(error) => {
                report.failed += 1;
                warn!(
                    tenant_id = %applied.tenant_id,
                    request_id = %applied.request_id,
                    mutation = applied.mutation.as_str(),
                    error_kind = error.kind().as_str(),
                    error = %error,
                    "failed to persist mutation"
                );
            }
        }
    }

    report
}
