use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use aclgraph_application::{
    AppliedMutation, CommandOutput, CommandType, CreateEntityPayload, EntityRow, GraphLoader,
    GraphMutation, GraphMutationSink, GraphSource, GroupHierarchyPayload, PermissionPayload,
    PermissionRow, ProcessorSettings, RequestCommand, TenantRegistry, UserGroupPayload,
};
use aclgraph_core::{AppError, TenantId};
use aclgraph_domain::{EntityId, EntityKind, EntityRef};

use super::{InMemoryGraphStore, TenantRows};

fn row(id: i64, display_name: &str) -> EntityRow {
    EntityRow {
        id,
        display_name: display_name.to_owned(),
        description: None,
    }
}

fn id(value: i64) -> EntityId {
    EntityId::new(value).unwrap_or_else(|_| unreachable!())
}

fn applied(tenant_id: TenantId, mutation: GraphMutation) -> AppliedMutation {
    AppliedMutation {
        tenant_id,
        request_id: "req-1".to_owned(),
        actor_id: 1,
        applied_at: Utc::now(),
        graph_version: 1,
        mutation,
    }
}

fn seeded() -> TenantRows {
    TenantRows::default()
        .with_user(row(1, "Ada"))
        .with_group(row(1, "Eng"))
        .with_group(row(2, "Payments"))
        .with_role(row(1, "Reader"))
        .with_user_group(1, 2)
        .with_user_role(1, 1)
        .with_group_role(1, 1)
        .with_group_parent(2, 1)
        .with_permission(PermissionRow {
            id: 1,
            holder_kind: "role".to_owned(),
            holder_id: 1,
            resource_uri: "/api/orders/**".to_owned(),
            verb: "GET".to_owned(),
            scheme: "api".to_owned(),
            grant: true,
            deny: false,
        })
}

#[tokio::test]
async fn seeded_rows_are_served_per_tenant() {
    let store = InMemoryGraphStore::new();
    let tenant_id = TenantId::from_uuid(Uuid::from_u128(7));
    store.seed(tenant_id, seeded()).await;

    let groups = store.load_groups(tenant_id).await.unwrap_or_default();
    let parents = store.load_group_parents(tenant_id).await.unwrap_or_default();
    let other = store.load_users(TenantId::new()).await.unwrap_or_default();

    assert_eq!(groups.len(), 2);
    assert_eq!(parents.len(), 1);
    assert_eq!((parents[0].member_id, parents[0].container_id), (2, 1));
    assert!(other.is_empty());
}

#[tokio::test]
async fn deleting_a_group_drops_its_rows_and_edges() {
    let store = InMemoryGraphStore::new();
    let tenant_id = TenantId::new();
    store.seed(tenant_id, seeded()).await;

    let result = store
        .persist(&applied(
            tenant_id,
            GraphMutation::EntityDeleted {
                reference: EntityRef::group(id(1)),
            },
        ))
        .await;

    assert!(result.is_ok());
    let rows = store.rows(tenant_id).await;
    assert_eq!(rows.groups.len(), 1);
    assert!(rows.group_parents.is_empty());
    assert!(rows.group_roles.is_empty());
    assert_eq!(rows.user_groups.len(), 1);
    assert_eq!(rows.permissions.len(), 1);
}

#[tokio::test]
async fn edges_between_incompatible_kinds_are_refused() {
    let store = InMemoryGraphStore::new();

    let result = store
        .persist(&applied(
            TenantId::new(),
            GraphMutation::EdgeAdded {
                parent: EntityRef::user(id(1)),
                child: EntityRef::group(id(1)),
            },
        ))
        .await;

    assert!(matches!(result, Err(AppError::Validation(_))));
}

#[tokio::test]
async fn persisted_mutations_reproduce_the_graph_on_rehydration() {
    let store = Arc::new(InMemoryGraphStore::new());
    let tenant_id = TenantId::new();
    store.seed(tenant_id, seeded()).await;
    let registry = TenantRegistry::new(
        GraphLoader::new(store.clone()),
        Some(store.clone()),
        ProcessorSettings::default(),
    );
    assert!(registry.hydrate(tenant_id).await.is_ok());
    let handle = registry
        .handle(tenant_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    let create = RequestCommand::typed(
        "create",
        1,
        CommandType::CreateGroup,
        &CreateEntityPayload {
            display_name: Some("Ledger".to_owned()),
            description: Some("general ledger team".to_owned()),
        },
    )
    .unwrap_or_else(|_| unreachable!());
    let ledger = match handle.execute(create).await {
        Ok(CommandOutput::EntitySaved { entity, .. }) => entity.id,
        _ => unreachable!(),
    };
    let commands = [
        RequestCommand::typed(
            "nest",
            1,
            CommandType::AddGroupToGroup,
            &GroupHierarchyPayload {
                child_id: ledger,
                parent_id: 2,
            },
        ),
        RequestCommand::typed(
            "leave",
            1,
            CommandType::RemoveUserFromGroup,
            &UserGroupPayload {
                user_id: 1,
                group_id: 2,
            },
        ),
        RequestCommand::typed(
            "deny",
            1,
            CommandType::DenyPermission,
            &PermissionPayload {
                entity_kind: "group".to_owned(),
                entity_id: ledger,
                resource_uri: Some("/api/orders/{id}".to_owned()),
                verb: "DELETE".to_owned(),
                scheme: None,
            },
        ),
    ];
    for command in commands {
        let command = command.unwrap_or_else(|_| unreachable!());
        assert!(handle.execute(command).await.is_ok());
    }
    let stopped = registry.stop(tenant_id).await;
    assert!(matches!(
        stopped,
        Ok(report) if report.persistence.is_some_and(|persisted| persisted.failed == 0)
    ));
    let live = handle.snapshot();

    let (reloaded, report) = GraphLoader::new(store.clone())
        .load(tenant_id)
        .await
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(report.skipped_rows, 0);
    for kind in EntityKind::all() {
        let expected: Vec<_> = live.entities(*kind).cloned().collect();
        let actual: Vec<_> = reloaded.entities(*kind).cloned().collect();
        assert_eq!(actual, expected);
    }
    assert_eq!(reloaded.permissions().count(), live.permissions().count());
}
