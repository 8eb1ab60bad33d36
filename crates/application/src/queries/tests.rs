use aclgraph_core::{AppError, NonEmptyString};
use aclgraph_domain::{
    AddGroupToGroup, AddPermissionToEntity, AddRoleToGroup, AddUserToGroup, AssignUserToRole,
    Entity, EntityGraph, EntityId, EntityKind, EntityRef, EntitySortField, HttpVerb, Normalizer,
    Permission, PermissionId, PermissionScheme, Polarity, ResourcePattern, SortDirection,
};

use super::{
    CheckEntityPermissionQuery, CheckGroupCycleQuery, CountEntitiesQuery, EntityFilter,
    EvaluatePermissionQuery, GetAncestorsQuery, GetChildGroupsQuery, GetDescendantsQuery,
    GetEntityPermissionsQuery, GetEntityQuery, GetGroupMembersQuery, GetParentGroupsQuery,
    GetRoleUsersQuery, GetUserGroupsQuery, GetUserRolesQuery, ListEntitiesQuery,
    ListEntitiesWithCountQuery, Query,
};

fn id(value: i64) -> EntityId {
    EntityId::new(value).unwrap_or_else(|_| unreachable!())
}

fn add(graph: &mut EntityGraph, reference: EntityRef, display_name: &str) {
    graph.upsert(Entity::new(
        reference,
        NonEmptyString::new(display_name).unwrap_or_else(|_| unreachable!()),
    ));
}

fn nest(graph: &mut EntityGraph, child: i64, parent: i64) {
    let (Some(child), Some(parent)) = (
        graph.resolve_group(id(child)),
        graph.resolve_group(id(parent)),
    ) else {
        unreachable!()
    };
    AddGroupToGroup { child, parent }.apply(graph);
}

fn join(graph: &mut EntityGraph, user: i64, group: i64) {
    let (Some(user), Some(group)) = (graph.resolve_user(id(user)), graph.resolve_group(id(group)))
    else {
        unreachable!()
    };
    AddUserToGroup { user, group }.apply(graph);
}

fn attach(graph: &mut EntityGraph, role: i64, group: i64) {
    let (Some(role), Some(group)) = (graph.resolve_role(id(role)), graph.resolve_group(id(group)))
    else {
        unreachable!()
    };
    AddRoleToGroup { role, group }.apply(graph);
}

fn assign(graph: &mut EntityGraph, user: i64, role: i64) {
    let (Some(user), Some(role)) = (graph.resolve_user(id(user)), graph.resolve_role(id(role)))
    else {
        unreachable!()
    };
    AssignUserToRole { user, role }.apply(graph);
}

fn permit(
    graph: &mut EntityGraph,
    holder: EntityRef,
    uri: &str,
    verb: HttpVerb,
    polarity: Polarity,
) -> PermissionId {
    let Some(entity) = graph.resolve(holder) else {
        unreachable!()
    };
    let permission_id = graph.allocate_permission_id();
    AddPermissionToEntity {
        entity,
        permission: Permission::with_polarity(
            permission_id,
            holder,
            ResourcePattern::new(uri).unwrap_or_else(|_| unreachable!()),
            verb,
            PermissionScheme::Api,
            polarity,
        ),
    }
    .apply(graph);
    permission_id
}

/// Eng(1) > Payments(2) > Ledger(3); user 1 in Ledger, role 1 on Eng.
fn organisation() -> EntityGraph {
    let mut graph = EntityGraph::new();
    add(&mut graph, EntityRef::group(id(1)), "Eng");
    add(&mut graph, EntityRef::group(id(2)), "Payments");
    add(&mut graph, EntityRef::group(id(3)), "Ledger");
    add(&mut graph, EntityRef::user(id(1)), "ada");
    add(&mut graph, EntityRef::user(id(2)), "grace");
    add(&mut graph, EntityRef::role(id(1)), "reader");
    add(&mut graph, EntityRef::role(id(2)), "auditor");
    nest(&mut graph, 2, 1);
    nest(&mut graph, 3, 2);
    join(&mut graph, 1, 3);
    join(&mut graph, 2, 1);
    attach(&mut graph, 1, 1);
    assign(&mut graph, 2, 2);
    graph
}

fn ids<T>(items: &[T], id_of: impl Fn(&T) -> i64) -> Vec<i64> {
    items.iter().map(id_of).collect()
}

#[test]
fn child_and_parent_groups_reflect_nesting() {
    let mut graph = EntityGraph::new();
    add(&mut graph, EntityRef::group(id(1)), "Eng");
    add(&mut graph, EntityRef::group(id(2)), "Payments");
    nest(&mut graph, 2, 1);

    let children = GetChildGroupsQuery { group_id: 1 }
        .run(&graph)
        .unwrap_or_else(|_| unreachable!());
    let parents = GetParentGroupsQuery { group_id: 2 }
        .run(&graph)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        children
            .iter()
            .map(|view| view.display_name.as_str())
            .collect::<Vec<_>>(),
        vec!["Payments"]
    );
    assert_eq!(
        parents
            .iter()
            .map(|view| view.display_name.as_str())
            .collect::<Vec<_>>(),
        vec!["Eng"]
    );
}

#[test]
fn reverse_nesting_is_detected_as_cycle() {
    let mut graph = EntityGraph::new();
    add(&mut graph, EntityRef::group(id(1)), "Eng");
    add(&mut graph, EntityRef::group(id(2)), "Payments");
    nest(&mut graph, 2, 1);

    let reverse = CheckGroupCycleQuery {
        parent_id: 2,
        child_id: 1,
    };
    let forward_sibling = CheckGroupCycleQuery {
        parent_id: 1,
        child_id: 2,
    };

    assert_eq!(reverse.run(&graph), Ok(true));
    assert!(matches!(
        reverse.ensure_acyclic(&graph),
        Err(AppError::CycleRejected(_))
    ));
    assert_eq!(forward_sibling.run(&graph), Ok(false));
    assert_eq!(
        CheckGroupCycleQuery {
            parent_id: 1,
            child_id: 1,
        }
        .run(&graph),
        Ok(true)
    );
}

#[test]
fn ancestors_and_descendants_walk_the_whole_hierarchy() {
    let graph = organisation();

    let ancestors = GetAncestorsQuery {
        kind: EntityKind::User,
        id: 1,
        only: Some(EntityKind::Group),
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let descendants = GetDescendantsQuery {
        kind: EntityKind::Group,
        id: 1,
        only: None,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        ancestors,
        vec![
            EntityRef::group(id(1)),
            EntityRef::group(id(2)),
            EntityRef::group(id(3)),
        ]
    );
    assert!(descendants.contains(&EntityRef::group(id(3))));
    assert!(descendants.contains(&EntityRef::user(id(1))));
    assert!(descendants.contains(&EntityRef::role(id(1))));
    assert!(!descendants.contains(&EntityRef::group(id(1))));
}

#[test]
fn deep_group_chains_are_walked_without_exhausting_the_stack() {
    const DEPTH: i64 = 50_000;
    let mut graph = EntityGraph::new();
    add(&mut graph, EntityRef::group(id(1)), "root");
    for group in 2..=DEPTH {
        add(&mut graph, EntityRef::group(id(group)), "level");
        nest(&mut graph, group, group - 1);
    }
    assert!(graph.verify_integrity().is_ok());

    let ancestors = GetAncestorsQuery {
        kind: EntityKind::Group,
        id: DEPTH,
        only: None,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let descendants = GetDescendantsQuery {
        kind: EntityKind::Group,
        id: 1,
        only: Some(EntityKind::Group),
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let closes_loop = CheckGroupCycleQuery {
        parent_id: DEPTH,
        child_id: 1,
    }
    .run(&graph);

    let expected = usize::try_from(DEPTH - 1).unwrap_or_else(|_| unreachable!());
    assert_eq!(ancestors.len(), expected);
    assert_eq!(descendants.len(), expected);
    assert_eq!(closes_loop, Ok(true));
}

#[test]
fn user_groups_and_roles_follow_the_ancestor_closure() {
    let graph = organisation();

    let direct = GetUserGroupsQuery {
        user_id: 1,
        include_inherited: false,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let inherited = GetUserGroupsQuery {
        user_id: 1,
        include_inherited: true,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let roles = GetUserRolesQuery { user_id: 1 }
        .run(&graph)
        .unwrap_or_else(|_| unreachable!());
    let direct_roles = GetUserRolesQuery { user_id: 2 }
        .run(&graph)
        .unwrap_or_else(|_| unreachable!());

    assert_eq!(ids(&direct, |view| view.id), vec![3]);
    assert_eq!(ids(&inherited, |view| view.id), vec![1, 2, 3]);
    assert_eq!(ids(&roles, |view| view.id), vec![1]);
    assert_eq!(ids(&direct_roles, |view| view.id), vec![1, 2]);
}

#[test]
fn group_members_and_role_users_include_nested_paths() {
    let graph = organisation();

    let direct_members = GetGroupMembersQuery {
        group_id: 1,
        include_nested: false,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let nested_members = GetGroupMembersQuery {
        group_id: 1,
        include_nested: true,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let role_users = GetRoleUsersQuery {
        role_id: 1,
        include_via_groups: true,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let assigned_only = GetRoleUsersQuery {
        role_id: 2,
        include_via_groups: false,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(ids(&direct_members, |view| view.id), vec![2]);
    assert_eq!(ids(&nested_members, |view| view.id), vec![1, 2]);
    assert_eq!(ids(&role_users, |view| view.id), vec![1, 2]);
    assert_eq!(ids(&assigned_only, |view| view.id), vec![2]);
}

#[test]
fn user_inherits_role_permission_through_group() {
    let mut graph = EntityGraph::new();
    add(&mut graph, EntityRef::user(id(1)), "ada");
    add(&mut graph, EntityRef::group(id(1)), "G");
    add(&mut graph, EntityRef::role(id(1)), "R");
    join(&mut graph, 1, 1);
    attach(&mut graph, 1, 1);
    let granted = permit(
        &mut graph,
        EntityRef::role(id(1)),
        "/api/x",
        HttpVerb::Get,
        Polarity::Grant,
    );

    let inherited = GetEntityPermissionsQuery {
        kind: EntityKind::User,
        id: 1,
        include_inherited: true,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let direct = GetEntityPermissionsQuery {
        kind: EntityKind::User,
        id: 1,
        include_inherited: false,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(ids(&inherited, |permission| permission.id().value()), vec![granted.value()]);
    assert!(direct.is_empty());
    assert_eq!(
        CheckEntityPermissionQuery::new(EntityKind::User, 1, "/api/x", "GET").run(&graph),
        Ok(true)
    );
}

#[test]
fn direct_deny_overrides_inherited_grant() {
    let mut graph = EntityGraph::new();
    add(&mut graph, EntityRef::user(id(1)), "ada");
    add(&mut graph, EntityRef::group(id(1)), "G");
    add(&mut graph, EntityRef::role(id(1)), "R");
    join(&mut graph, 1, 1);
    attach(&mut graph, 1, 1);
    let granted = permit(
        &mut graph,
        EntityRef::role(id(1)),
        "/api/x",
        HttpVerb::Get,
        Polarity::Grant,
    );
    let denied = permit(
        &mut graph,
        EntityRef::user(id(1)),
        "/api/x",
        HttpVerb::Get,
        Polarity::Deny,
    );

    let decision = EvaluatePermissionQuery {
        kind: EntityKind::User,
        id: 1,
        uri: "/api/x".to_owned(),
        verb: "GET".to_owned(),
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());

    assert!(!decision.allowed);
    assert_eq!(decision.grants, vec![granted]);
    assert_eq!(decision.denies, vec![denied]);
    assert_eq!(
        CheckEntityPermissionQuery::new(EntityKind::User, 1, "/api/x", "GET").run(&graph),
        Ok(false)
    );
}

#[test]
fn group_inherits_from_ancestor_groups_and_their_roles() {
    let mut graph = organisation();
    let eng_grant = permit(
        &mut graph,
        EntityRef::group(id(1)),
        "/api/reports/**",
        HttpVerb::Get,
        Polarity::Grant,
    );
    let role_grant = permit(
        &mut graph,
        EntityRef::role(id(1)),
        "/api/ledger/{entry}",
        HttpVerb::Any,
        Polarity::Grant,
    );

    let ledger = GetEntityPermissionsQuery {
        kind: EntityKind::Group,
        id: 3,
        include_inherited: true,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let role_only = GetEntityPermissionsQuery {
        kind: EntityKind::Role,
        id: 2,
        include_inherited: true,
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(
        ids(&ledger, |permission| permission.id().value()),
        vec![eng_grant.value(), role_grant.value()]
    );
    assert!(role_only.is_empty());
    assert_eq!(
        CheckEntityPermissionQuery::new(EntityKind::User, 1, "/api/ledger/42", "DELETE")
            .run(&graph),
        Ok(true)
    );
    assert_eq!(
        CheckEntityPermissionQuery::new(EntityKind::User, 1, "/api/reports/q1/summary", "POST")
            .run(&graph),
        Ok(false)
    );
}

#[test]
fn no_matching_permission_is_not_allowed() {
    let graph = organisation();

    let decision = EvaluatePermissionQuery {
        kind: EntityKind::User,
        id: 1,
        uri: "/api/unknown".to_owned(),
        verb: "get".to_owned(),
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());

    assert!(!decision.allowed);
    assert!(decision.grants.is_empty());
}

#[test]
fn validation_runs_before_traversal() {
    let graph = EntityGraph::new();

    assert!(matches!(
        GetEntityQuery::user(0).run(&graph),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        GetEntityQuery::user(7).run(&graph),
        Err(AppError::NotFound(_))
    ));
    assert!(matches!(
        EvaluatePermissionQuery {
            kind: EntityKind::User,
            id: 1,
            uri: "/api/x".to_owned(),
            verb: "FETCH".to_owned(),
        }
        .run(&graph),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        CheckEntityPermissionQuery::new(EntityKind::User, 1, "  ", "GET").run(&graph),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        ListEntitiesQuery::first_page(EntityKind::User, 0).run(&graph),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        ListEntitiesQuery::first_page(EntityKind::User, 501).run(&graph),
        Err(AppError::Validation(_))
    ));
    assert!(matches!(
        ListEntitiesQuery {
            page: 0,
            ..ListEntitiesQuery::first_page(EntityKind::User, 10)
        }
        .run(&graph),
        Err(AppError::Validation(_))
    ));
}

#[test]
fn listing_filters_sorts_and_pages() {
    let mut graph = EntityGraph::new();
    for (value, display_name) in [(1, "delta"), (2, "Alpha"), (3, "charlie"), (4, "bravo")] {
        add(&mut graph, EntityRef::group(id(value)), display_name);
    }

    let by_name = ListEntitiesQuery {
        sort_by: EntitySortField::Name,
        ..ListEntitiesQuery::first_page(EntityKind::Group, 2)
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let second_page_desc = ListEntitiesQuery {
        page: 2,
        direction: SortDirection::Desc,
        ..ListEntitiesQuery::first_page(EntityKind::Group, 3)
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());
    let searched = CountEntitiesQuery {
        kind: EntityKind::Group,
        filter: EntityFilter {
            name: None,
            search: Some("A".to_owned()),
        },
    }
    .run(&graph);
    let exact = CountEntitiesQuery {
        kind: EntityKind::Group,
        filter: EntityFilter {
            name: Some("bravo".to_owned()),
            search: None,
        },
    }
    .run(&graph);

    assert_eq!(ids(&by_name, |view| view.id), vec![2, 4]);
    assert_eq!(ids(&second_page_desc, |view| view.id), vec![1]);
    assert_eq!(searched, Ok(4));
    assert_eq!(exact, Ok(1));
}

#[test]
fn listing_with_count_reports_unpaged_total() {
    let mut graph = EntityGraph::new();
    for value in 1..=7 {
        add(&mut graph, EntityRef::user(id(value)), &format!("user-{value}"));
    }

    let page = ListEntitiesWithCountQuery {
        listing: ListEntitiesQuery {
            page: 3,
            ..ListEntitiesQuery::first_page(EntityKind::User, 3)
        },
    }
    .run(&graph)
    .unwrap_or_else(|_| unreachable!());

    assert_eq!(page.total, 7);
    assert_eq!(ids(&page.items, |view| view.id), vec![7]);
    assert_eq!(page.page, 3);
}
