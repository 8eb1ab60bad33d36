use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;

use aclgraph_core::{AppError, AppResult, TenantId};
use aclgraph_domain::EntityGraph;

use crate::command_processor::{ProcessorExit, ProcessorSettings, ReadConsistency};
use crate::commands::{
    CommandType, EntityIdPayload, GroupHierarchyPayload, RequestCommand, UserGroupPayload,
};
use crate::graph_loader::GraphLoader;
use crate::graph_ports::{
    AppliedMutation, EntityRow, GraphMutationSink, GraphSource, PermissionRow, RelationRow,
};
use crate::outcome::CommandOutput;
use crate::queries::{CheckGroupCycleQuery, GetUserGroupsQuery};

use super::TenantRegistry;

/// Every tenant starts with groups Eng(1) > Payments(2) and user Ada(1).
struct SeededSource;

fn row(id: i64, display_name: &str) -> EntityRow {
    EntityRow {
        id,
        display_name: display_name.to_owned(),
        description: None,
    }
}

#[async_trait]
impl GraphSource for SeededSource {
    async fn load_users(&self, _tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        Ok(vec![row(1, "Ada")])
    }

    async fn load_groups(&self, _tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        Ok(vec![row(1, "Eng"), row(2, "Payments")])
    }

    async fn load_roles(&self, _tenant_id: TenantId) -> AppResult<Vec<EntityRow>> {
        Ok(Vec::new())
    }

    async fn load_permissions(&self, _tenant_id: TenantId) -> AppResult<Vec<PermissionRow>> {
        Ok(Vec::new())
    }

    async fn load_user_groups(&self, _tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(Vec::new())
    }

    async fn load_user_roles(&self, _tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(Vec::new())
    }

    async fn load_group_roles(&self, _tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(Vec::new())
    }

    async fn load_group_parents(&self, _tenant_id: TenantId) -> AppResult<Vec<RelationRow>> {
        Ok(vec![RelationRow {
            member_id: 2,
            container_id: 1,
        }])
    }
}

#[derive(Default)]
struct RecordingSink {
    applied: Mutex<Vec<AppliedMutation>>,
}

#[async_trait]
impl GraphMutationSink for RecordingSink {
    async fn persist(&self, mutation: &AppliedMutation) -> AppResult<()> {
        self.applied.lock().await.push(mutation.clone());
        Ok(())
    }
}

fn registry(settings: ProcessorSettings, sink: Option<Arc<RecordingSink>>) -> TenantRegistry {
    let sink = sink.map(|sink| sink as Arc<dyn GraphMutationSink>);
    TenantRegistry::new(GraphLoader::new(Arc::new(SeededSource)), sink, settings)
}

fn join(request_id: &str, user_id: i64, group_id: i64) -> RequestCommand {
    RequestCommand::typed(
        request_id,
        1,
        CommandType::AddUserToGroup,
        &UserGroupPayload { user_id, group_id },
    )
    .unwrap_or_else(|_| unreachable!())
}

#[tokio::test]
async fn hydrated_tenant_accepts_commands_and_refuses_a_second_hydration() {
    let settings = ProcessorSettings {
        publish_snapshots: true,
        ..ProcessorSettings::default()
    };
    let registry = registry(settings, None);
    let tenant_id = TenantId::new();

    let report = registry.hydrate(tenant_id).await;
    assert!(matches!(report, Ok(loaded) if loaded.groups == 2 && loaded.edges == 1));
    assert!(matches!(
        registry.hydrate(tenant_id).await,
        Err(AppError::Conflict(_))
    ));

    let mut handle = registry
        .handle(tenant_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    let version = match handle.execute(join("req-1", 1, 2)).await {
        Ok(CommandOutput::EdgeChanged { graph_version, .. }) => graph_version,
        _ => unreachable!(),
    };
    assert!(handle.wait_for_version(version).await.is_ok());

    let groups = handle.query(&GetUserGroupsQuery {
        user_id: 1,
        include_inherited: true,
    });
    assert_eq!(groups.map(|groups| groups.len()), Ok(2));
}

#[tokio::test]
async fn unknown_tenants_are_unavailable() {
    let registry = registry(ProcessorSettings::default(), None);

    assert!(matches!(
        registry.handle(TenantId::new()).await,
        Err(AppError::Unavailable(_))
    ));
    assert!(matches!(
        registry.stop(TenantId::new()).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn tenants_never_share_graph_state() {
    let registry = registry(ProcessorSettings::default(), None);
    let (first, second) = (TenantId::new(), TenantId::new());
    assert!(registry.hydrate(first).await.is_ok());
    assert!(registry.spawn(second, EntityGraph::new()).await.is_ok());

    let first_handle = registry.handle(first).await.unwrap_or_else(|_| unreachable!());
    let second_handle = registry.handle(second).await.unwrap_or_else(|_| unreachable!());
    assert!(first_handle.execute(join("req-1", 1, 1)).await.is_ok());

    assert!(matches!(
        second_handle.execute(join("req-1", 1, 1)).await,
        Err(AppError::NotFound(_))
    ));
    assert_eq!(second_handle.snapshot().version(), 0);

    let mut expected = vec![first, second];
    expected.sort();
    assert_eq!(registry.tenant_ids().await, expected);
}

#[tokio::test]
async fn snapshot_reads_bypass_the_queue() {
    let settings = ProcessorSettings {
        read_consistency: ReadConsistency::Snapshot,
        ..ProcessorSettings::default()
    };
    let registry = registry(settings, None);
    let tenant_id = TenantId::new();
    assert!(registry.hydrate(tenant_id).await.is_ok());
    let mut handle = registry.handle(tenant_id).await.unwrap_or_else(|_| unreachable!());

    let nested = RequestCommand::typed(
        "nest",
        1,
        CommandType::AddGroupToGroup,
        &GroupHierarchyPayload {
            child_id: 1,
            parent_id: 2,
        },
    )
    .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        handle.execute(nested).await,
        Err(AppError::CycleRejected(_))
    ));

    let version = match handle.execute(join("req-1", 1, 2)).await {
        Ok(CommandOutput::EdgeChanged { graph_version, .. }) => graph_version,
        _ => unreachable!(),
    };
    let snapshot = tokio::time::timeout(Duration::from_secs(1), handle.wait_for_version(version))
        .await
        .unwrap_or_else(|_| unreachable!());
    assert!(matches!(snapshot, Ok(graph) if graph.version() >= version));

    let lookup = RequestCommand::typed("get", 1, CommandType::GetGroup, &EntityIdPayload { id: 2 })
        .unwrap_or_else(|_| unreachable!());
    assert!(matches!(
        handle.execute(lookup).await,
        Ok(CommandOutput::Entity { entity }) if entity.display_name == "Payments"
    ));
    assert_eq!(
        handle.query(&CheckGroupCycleQuery {
            parent_id: 2,
            child_id: 1,
        }),
        Ok(true)
    );
}

#[tokio::test]
async fn stopping_a_tenant_flushes_persistence_and_unregisters_it() {
    let sink = Arc::new(RecordingSink::default());
    let registry = registry(ProcessorSettings::default(), Some(sink.clone()));
    let tenant_id = TenantId::new();
    assert!(registry.hydrate(tenant_id).await.is_ok());
    let handle = registry.handle(tenant_id).await.unwrap_or_else(|_| unreachable!());

    assert!(handle.execute(join("req-1", 1, 2)).await.is_ok());
    assert!(handle.execute(join("req-2", 1, 2)).await.is_err());

    let report = registry
        .stop(tenant_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert!(matches!(report.processor.exit, ProcessorExit::Cancelled { .. }));
    assert_eq!(report.processor.processed, 1);
    assert_eq!(report.processor.rejected, 1);
    assert_eq!(report.persistence.map(|persisted| persisted.persisted), Some(1));
    assert_eq!(sink.applied.lock().await.len(), 1);

    assert!(matches!(
        registry.handle(tenant_id).await,
        Err(AppError::Unavailable(_))
    ));
    assert!(matches!(
        handle.execute(join("req-3", 1, 1)).await,
        Err(AppError::Unavailable(_))
    ));
}

#[tokio::test]
async fn stop_all_stops_every_tenant() {
    let registry = registry(ProcessorSettings::default(), None);
    for _ in 0..3 {
        assert!(registry.hydrate(TenantId::new()).await.is_ok());
    }

    let reports = registry.stop_all().await;

    assert_eq!(reports.len(), 3);
    assert!(reports.iter().all(|(_, report)| report.is_ok()));
    assert!(registry.tenant_ids().await.is_empty());
    assert!(registry.stalled_tenants(Duration::ZERO).await.is_empty());
}

#[tokio::test]
async fn sequential_tenants_publish_their_graph_only_when_stopped() {
    let registry = registry(ProcessorSettings::default(), None);
    let tenant_id = TenantId::new();
    assert!(registry.hydrate(tenant_id).await.is_ok());
    let mut handle = registry.handle(tenant_id).await.unwrap_or_else(|_| unreachable!());
    let hydrated = handle.snapshot().version();

    let version = match handle.execute(join("req-1", 1, 2)).await {
        Ok(CommandOutput::EdgeChanged { graph_version, .. }) => graph_version,
        _ => unreachable!(),
    };
    assert!(matches!(
        handle.execute(join("req-2", 1, 1)).await,
        Ok(CommandOutput::EdgeChanged { .. })
    ));

    assert_eq!(handle.snapshot().version(), hydrated);
    assert!(matches!(
        handle.wait_for_version(version).await,
        Err(AppError::Validation(_))
    ));
    assert!(handle.wait_for_version(hydrated).await.is_ok());

    let report = registry
        .stop(tenant_id)
        .await
        .unwrap_or_else(|_| unreachable!());
    assert_eq!(handle.snapshot().version(), report.processor.graph_version);
    assert_eq!(
        handle.query(&GetUserGroupsQuery {
            user_id: 1,
            include_inherited: false,
        })
        .map(|groups| groups.len()),
        Ok(2)
    );
}
