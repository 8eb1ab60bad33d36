//! ACL graph engine runtime.
//!
//! Hydrates the configured tenants, then reads one JSON command per stdin line
//! and writes one JSON outcome per stdout line. A command line is a
//! `RequestCommand` with an extra `tenant_id` field:
//!
//! ```text
//! {"tenant_id": "...", "request_id": "r1", "actor_id": 1, "command_type": "get_users"}
//! ```

#![forbid(unsafe_code)]

mod engine_config;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use aclgraph_application::{
    CommandOutcome, GraphLoader, GraphMutationSink, GraphSource, RequestCommand, TenantHandle,
    TenantRegistry,
};
use aclgraph_core::{AppError, AppResult, TenantId};
use aclgraph_infrastructure::{InMemoryGraphStore, PostgresGraphStore};

use serde::Deserialize;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};

use crate::engine_config::{EngineConfig, init_tracing};

#[derive(Debug, Deserialize)]
struct FeedLine {
    tenant_id: TenantId,
    #[serde(flatten)]
    command: RequestCommand,
}

struct TenantFeed {
    commands: mpsc::UnboundedSender<RequestCommand>,
    task: JoinHandle<()>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    dotenvy::dotenv().ok();
    init_tracing();

    let config = EngineConfig::load()?;
    let registry = Arc::new(build_registry(&config).await?);

    for tenant_id in &config.tenant_ids {
        let report = registry.hydrate(*tenant_id).await?;
        info!(
            tenant_id = %tenant_id,
            users = report.users,
            groups = report.groups,
            roles = report.roles,
            permissions = report.permissions,
            edges = report.edges,
            skipped_rows = report.skipped_rows,
            "tenant hydrated"
        );
    }

    info!(
        tenants = config.tenant_ids.len(),
        queue_capacity = config.settings.queue_capacity,
        shutdown_policy = config.settings.shutdown_policy.as_str(),
        read_consistency = config.settings.read_consistency.as_str(),
        internal_error_policy = config.settings.internal_error_policy.as_str(),
        publish_snapshots = config.settings.publishes_snapshots(),
        "aclgraph-engine started"
    );

    let (outcomes, outcome_receiver) = mpsc::unbounded_channel();
    let writer = tokio::spawn(write_outcomes(outcome_receiver));
    let monitor = tokio::spawn(monitor_liveness(
        registry.clone(),
        config.stall_threshold,
        config.liveness_interval,
    ));

    tokio::select! {
        result = feed_commands(registry.clone(), outcomes) => {
            if let Err(error) = result {
                warn!(error = %error, "command feed failed");
            }
            info!("command feed closed");
        }
        result = tokio::signal::ctrl_c() => {
            if let Err(error) = result {
                warn!(error = %error, "failed to listen for shutdown signal");
            }
            info!("shutdown signal received");
        }
    }

    monitor.abort();
    for (tenant_id, result) in registry.stop_all().await {
        match result {
            Ok(report) => info!(
                tenant_id = %tenant_id,
                exit = ?report.processor.exit,
                processed = report.processor.processed,
                rejected = report.processor.rejected,
                graph_version = report.processor.graph_version,
                persisted = report.persistence.map_or(0, |persistence| persistence.persisted),
                "tenant stopped"
            ),
            Err(error) => warn!(tenant_id = %tenant_id, error = %error, "tenant stop failed"),
        }
    }

    writer
        .await
        .map_err(|error| AppError::Internal(format!("outcome writer panicked: {error}")))?
}

async fn connect_pool(database_url: &str) -> AppResult<PgPool> {
    PgPoolOptions::new()
        .max_connections(5)
        .connect(database_url)
        .await
        .map_err(|error| AppError::Internal(format!("failed to connect to database: {error}")))
}

async fn build_registry(config: &EngineConfig) -> AppResult<TenantRegistry> {
    let (source, sink): (Arc<dyn GraphSource>, Arc<dyn GraphMutationSink>) =
        match config.database_url.as_deref() {
            Some(database_url) => {
                let store = Arc::new(PostgresGraphStore::new(connect_pool(database_url).await?));
                let source: Arc<dyn GraphSource> = store.clone();
                let sink: Arc<dyn GraphMutationSink> = store;
                (source, sink)
            }
            None => {
                warn!("DATABASE_URL is not set, tenants start from an empty in-memory store");
                let store = Arc::new(InMemoryGraphStore::new());
                let source: Arc<dyn GraphSource> = store.clone();
                let sink: Arc<dyn GraphMutationSink> = store;
                (source, sink)
            }
        };

    Ok(TenantRegistry::new(
        GraphLoader::new(source),
        Some(sink),
        config.settings,
    ))
}

/// Reads stdin until EOF and waits for every routed command to be answered.
async fn feed_commands(
    registry: Arc<TenantRegistry>,
    outcomes: mpsc::UnboundedSender<CommandOutcome>,
) -> AppResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut feeds: HashMap<TenantId, TenantFeed> = HashMap::new();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|error| AppError::Internal(format!("failed to read stdin: {error}")))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let FeedLine { tenant_id, command } = match serde_json::from_str::<FeedLine>(&line) {
            Ok(feed_line) => feed_line,
            Err(error) => {
                let error = AppError::Validation(format!("malformed command line: {error}"));
                warn!(error = %error, "command line rejected");
                let _ = outcomes.send(CommandOutcome::from_reply("", "", Err(error)));
                continue;
            }
        };

        if !feeds.contains_key(&tenant_id) {
            match registry.handle(tenant_id).await {
                Ok(handle) => {
                    feeds.insert(tenant_id, spawn_feed(handle, outcomes.clone()));
                }
                Err(error) => {
                    warn!(
                        tenant_id = %tenant_id,
                        request_id = %command.request_id,
                        error = %error,
                        "command routed to unavailable tenant"
                    );
                    let _ = outcomes.send(CommandOutcome::from_reply(
                        command.request_id,
                        command.command_type,
                        Err(error),
                    ));
                    continue;
                }
            }
        }

        if let Some(feed) = feeds.get(&tenant_id)
            && let Err(rejected) = feed.commands.send(command)
        {
            let command = rejected.0;
            let _ = outcomes.send(CommandOutcome::from_reply(
                command.request_id,
                command.command_type,
                Err(AppError::Unavailable(format!("tenant {tenant_id} feed stopped"))),
            ));
        }
    }

    for feed in feeds.into_values() {
        drop(feed.commands);
        if let Err(error) = feed.task.await {
            warn!(error = %error, "tenant feed task failed");
        }
    }

    Ok(())
}

/// Submits one tenant's commands in arrival order.
fn spawn_feed(handle: TenantHandle, outcomes: mpsc::UnboundedSender<CommandOutcome>) -> TenantFeed {
    let (commands, mut receiver) = mpsc::unbounded_channel::<RequestCommand>();
    let task = tokio::spawn(async move {
        while let Some(command) = receiver.recv().await {
            let request_id = command.request_id.clone();
            let command_type = command.command_type.clone();
            let reply = handle.execute(command).await;
            if outcomes
                .send(CommandOutcome::from_reply(request_id, command_type, reply))
                .is_err()
            {
                break;
            }
        }
    });

    TenantFeed { commands, task }
}

async fn write_outcomes(mut outcomes: mpsc::UnboundedReceiver<CommandOutcome>) -> AppResult<()> {
    let mut stdout = tokio::io::stdout();

    while let Some(outcome) = outcomes.recv().await {
        let mut line = serde_json::to_string(&outcome)
            .map_err(|error| AppError::Internal(format!("failed to encode outcome: {error}")))?;
        line.push('\n');
        stdout
            .write_all(line.as_bytes())
            .await
            .map_err(|error| AppError::Internal(format!("failed to write stdout: {error}")))?;
        stdout
            .flush()
            .await
            .map_err(|error| AppError::Internal(format!("failed to flush stdout: {error}")))?;
    }

    Ok(())
}

async fn monitor_liveness(registry: Arc<TenantRegistry>, threshold: Duration, period: Duration) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        interval.tick().await;
        for stalled in registry.stalled_tenants(threshold).await {
            warn!(
                tenant_id = %stalled.tenant_id,
                request_id = %stalled.command.request_id,
                command_type = %stalled.command.command_type,
                elapsed_ms = u64::try_from(stalled.command.started_at.elapsed().as_millis())
                    .unwrap_or(u64::MAX),
                "tenant processor stalled"
            );
        }
    }
}
