use serde_json::json;

use aclgraph_core::AppError;
use aclgraph_domain::{
    EntityId, EntityKind, EntityRef, EntitySortField, HttpVerb, PermissionScheme, Polarity,
    SortDirection,
};

use crate::commands::{CommandType, RequestCommand, UserGroupPayload};

use super::{CommandTranslator, EdgeTarget, Mutation, Operation, OperationClass, ReadOperation};

fn command(command_type: &str, payload: serde_json::Value) -> RequestCommand {
    RequestCommand {
        request_id: "req-1".to_owned(),
        timestamp: chrono::Utc::now(),
        actor_id: 1,
        command_type: command_type.to_owned(),
        payload,
    }
}

fn id(value: i64) -> EntityId {
    EntityId::new(value).unwrap_or_else(|_| unreachable!())
}

#[test]
fn typed_membership_command_becomes_link_mutation() {
    let command = RequestCommand::typed(
        "req-7",
        3,
        CommandType::AddUserToGroup,
        &UserGroupPayload {
            user_id: 4,
            group_id: 9,
        },
    )
    .unwrap_or_else(|_| unreachable!());

    let operation = CommandTranslator::new()
        .translate(&command)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(operation.class(), OperationClass::Mutation);
    assert_eq!(
        operation,
        Operation::Mutate(Mutation::Link(EdgeTarget::UserGroup {
            user: id(4),
            group: id(9),
        }))
    );
}

#[test]
fn edge_targets_expose_parent_and_child_ends() {
    let nesting = EdgeTarget::GroupGroup {
        child: id(2),
        parent: id(1),
    };
    let assignment = EdgeTarget::UserRole {
        user: id(5),
        role: id(3),
    };

    assert_eq!(nesting.parent(), EntityRef::group(id(1)));
    assert_eq!(nesting.child(), EntityRef::group(id(2)));
    assert_eq!(assignment.parent(), EntityRef::role(id(3)));
    assert_eq!(assignment.child(), EntityRef::user(id(5)));
}

#[test]
fn deny_permission_parses_verb_scheme_and_pattern() {
    let operation = CommandTranslator::new().translate(&command(
        "deny_permission",
        json!({
            "entity_kind": "Role",
            "entity_id": 2,
            "resource_uri": "/api/orders/{id}",
            "verb": "delete",
            "scheme": "db",
        }),
    ));

    let Ok(Operation::Mutate(Mutation::AddPermission {
        holder,
        resource,
        verb,
        scheme,
        polarity,
    })) = operation
    else {
        unreachable!()
    };
    assert_eq!(holder, EntityRef::role(id(2)));
    assert_eq!(resource.as_str(), "/api/orders/{id}");
    assert_eq!(verb, HttpVerb::Delete);
    assert_eq!(scheme, PermissionScheme::Database);
    assert_eq!(polarity, Polarity::Deny);
}

#[test]
fn listing_command_uses_defaults_and_parses_sorting() {
    let defaults = CommandTranslator::new()
        .translate(&command("get_groups", serde_json::Value::Null))
        .unwrap_or_else(|_| unreachable!());
    let sorted = CommandTranslator::new()
        .translate(&command(
            "get_users",
            json!({
                "page": 2,
                "page_size": 5,
                "sort_by": "name",
                "direction": "desc",
                "search": "ad"
            }),
        ))
        .unwrap_or_else(|_| unreachable!());

    let Operation::Read(ReadOperation::ListEntities(defaults)) = defaults else {
        unreachable!()
    };
    let Operation::Read(ReadOperation::ListEntities(sorted)) = sorted else {
        unreachable!()
    };
    assert_eq!(defaults.listing.kind, EntityKind::Group);
    assert_eq!(defaults.listing.page, 1);
    assert_eq!(defaults.listing.page_size, 50);
    assert_eq!(sorted.listing.sort_by, EntitySortField::Name);
    assert_eq!(sorted.listing.direction, SortDirection::Desc);
    assert_eq!(sorted.listing.filter.search.as_deref(), Some("ad"));
}

#[test]
fn check_permission_defaults_to_user_entities() {
    let operation = CommandTranslator::new()
        .translate(&command(
            "check_permission",
            json!({"entity_id": 1, "uri": "/api/x", "verb": "GET"}),
        ))
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(operation.class(), OperationClass::Query);
    let Operation::Read(ReadOperation::CheckPermission(query)) = operation else {
        unreachable!()
    };
    assert_eq!(query.evaluation.kind, EntityKind::User);
}

#[test]
fn unknown_command_type_is_unsupported() {
    let result = CommandTranslator::new().translate(&command("merge_tenants", json!({})));

    assert!(matches!(result, Err(AppError::UnsupportedCommand(_))));
}

#[test]
fn malformed_envelopes_and_payloads_fail_validation() {
    let translator = CommandTranslator::new();
    let mut missing_request_id = command("get_user", json!({"id": 1}));
    missing_request_id.request_id = " ".to_owned();
    let mut bad_actor = command("get_user", json!({"id": 1}));
    bad_actor.actor_id = 0;

    for result in [
        translator.translate(&missing_request_id),
        translator.translate(&bad_actor),
        translator.translate(&command("get_user", json!({"id": -4}))),
        translator.translate(&command("add_user_to_group", json!({"user_id": 1}))),
        translator.translate(&command("create_group", json!({"display_name": "  "}))),
        translator.translate(&command(
            "grant_permission",
            json!({"entity_kind": "user", "entity_id": 1, "resource_uri": "/a", "verb": "FETCH"}),
        )),
        translator.translate(&command(
            "grant_permission",
            json!({"entity_kind": "tenant", "entity_id": 1, "resource_uri": "/a", "verb": "GET"}),
        )),
        translator.translate(&command("get_roles", json!({"page_size": 1000}))),
        translator.translate(&command("get_roles", json!({"sort_by": "size"}))),
    ] {
        assert!(matches!(result, Err(AppError::Validation(_))), "{result:?}");
    }
}
