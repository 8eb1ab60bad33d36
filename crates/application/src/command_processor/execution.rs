//! Pre-mutation validation and normalizer dispatch.
//!
//! `validate` never touches the graph mutably; `execute` only runs on a
//! validated mutation, so a rejected command leaves no partial edge behind.

use aclgraph_core::{AppError, AppResult, NonEmptyString};
use aclgraph_domain::{
    AddGroupToGroup, AddPermissionToEntity, AddRoleToGroup, AddUserToGroup, AssignUserToRole,
    EdgeChange, Entity, EntityGraph, EntityKey, EntityKind, EntityRef, GroupKey, HttpVerb,
    Normalizer, Permission, PermissionKey, PermissionScheme, Polarity, RemovePermissionFromEntity,
    ResourcePattern, RoleKey, UserKey,
};

use crate::command_translator::{EdgeTarget, Mutation};
use crate::graph_ports::GraphMutation;
use crate::outcome::CommandOutput;
use crate::queries::{CheckGroupCycleQuery, EntityView};

#[derive(Debug, Clone, Copy)]
pub(super) enum ResolvedEdge {
    UserGroup(UserKey, GroupKey),
    UserRole(UserKey, RoleKey),
    RoleGroup(RoleKey, GroupKey),
    GroupGroup { child: GroupKey, parent: GroupKey },
}

#[derive(Debug, Clone)]
pub(super) enum ValidatedMutation {
    Create {
        kind: EntityKind,
        display_name: NonEmptyString,
        description: Option<String>,
    },
    Update {
        entity: EntityKey,
        display_name: NonEmptyString,
        description: Option<String>,
    },
    Delete(EntityKey),
    Link(ResolvedEdge),
    Unlink(ResolvedEdge),
    AddPermission {
        entity: EntityKey,
        resource: ResourcePattern,
        verb: HttpVerb,
        scheme: PermissionScheme,
        polarity: Polarity,
    },
    RemovePermission {
        entity: EntityKey,
        permission: PermissionKey,
    },
}

#[derive(Debug)]
pub(super) struct Applied {
    pub(super) output: CommandOutput,
    pub(super) changes: Vec<GraphMutation>,
}

pub(super) fn validate(graph: &EntityGraph, mutation: Mutation) -> AppResult<ValidatedMutation> {
    match mutation {
        Mutation::CreateEntity {
            kind,
            display_name,
            description,
        } => Ok(ValidatedMutation::Create {
            kind,
            display_name,
            description,
        }),
        Mutation::UpdateEntity {
            reference,
            display_name,
            description,
        } => Ok(ValidatedMutation::Update {
            entity: resolve(graph, reference)?,
            display_name,
            description,
        }),
        Mutation::DeleteEntity { reference } => {
            Ok(ValidatedMutation::Delete(resolve(graph, reference)?))
        }
        Mutation::Link(target) => {
            let edge = resolve_edge(graph, target)?;
            if edge_exists(graph, target) {
                return Err(AppError::Conflict(format!(
                    "{} is already a child of {}",
                    target.child(),
                    target.parent()
                )));
            }
            if let EdgeTarget::GroupGroup { child, parent } = target {
                CheckGroupCycleQuery {
                    parent_id: parent.value(),
                    child_id: child.value(),
                }
                .ensure_acyclic(graph)?;
            }
            Ok(ValidatedMutation::Link(edge))
        }
        Mutation::Unlink(target) => {
            let edge = resolve_edge(graph, target)?;
            if !edge_exists(graph, target) {
                return Err(AppError::NotFound(format!(
                    "{} is not a child of {}",
                    target.child(),
                    target.parent()
                )));
            }
            Ok(ValidatedMutation::Unlink(edge))
        }
        Mutation::AddPermission {
            holder,
            resource,
            verb,
            scheme,
            polarity,
        } => {
            let entity = resolve(graph, holder)?;
            if let Some(existing) = graph.find_permission(holder, &resource, verb, scheme) {
                return Err(AppError::Conflict(format!(
                    "{holder} already holds permission {} for {verb} {resource} ({scheme})",
                    existing.id()
                )));
            }
            Ok(ValidatedMutation::AddPermission {
                entity,
                resource,
                verb,
                scheme,
                polarity,
            })
        }
        Mutation::RemovePermission {
            holder,
            permission_id,
        } => {
            let entity = resolve(graph, holder)?;
            let permission = graph
                .resolve_permission(permission_id)
                .filter(|permission| permission.holder() == holder)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "permission {permission_id} is not held by {holder}"
                    ))
                })?;
            Ok(ValidatedMutation::RemovePermission { entity, permission })
        }
    }
}

pub(super) fn execute(graph: &mut EntityGraph, mutation: ValidatedMutation) -> AppResult<Applied> {
    match mutation {
        ValidatedMutation::Create {
            kind,
            display_name,
            description,
        } => {
            let reference = EntityRef::new(kind, graph.allocate_id(kind));
            graph.upsert(Entity::new(reference, display_name).with_description(description));
            saved(graph, reference)
        }
        ValidatedMutation::Update {
            entity,
            display_name,
            description,
        } => {
            let reference = entity.reference();
            graph.upsert(Entity::new(reference, display_name).with_description(description));
            saved(graph, reference)
        }
        ValidatedMutation::Delete(entity) => {
            let reference = entity.reference();
            graph.remove(reference).ok_or_else(|| {
                AppError::Internal(format!("validated entity {reference} vanished before delete"))
            })?;
            Ok(Applied {
                output: CommandOutput::EntityDeleted {
                    reference,
                    graph_version: graph.version(),
                },
                changes: vec![GraphMutation::EntityDeleted { reference }],
            })
        }
        ValidatedMutation::Link(edge) => {
            let (parent, child) = edge_ends(edge);
            let change = link(graph, edge);
            expect_change(change, EdgeChange::Added, parent, child)?;
            Ok(Applied {
                output: CommandOutput::EdgeChanged {
                    parent,
                    child,
                    change,
                    graph_version: graph.version(),
                },
                changes: vec![GraphMutation::EdgeAdded { parent, child }],
            })
        }
        ValidatedMutation::Unlink(edge) => {
            let (parent, child) = edge_ends(edge);
            let change = unlink(graph, edge);
            expect_change(change, EdgeChange::Removed, parent, child)?;
            Ok(Applied {
                output: CommandOutput::EdgeChanged {
                    parent,
                    child,
                    change,
                    graph_version: graph.version(),
                },
                changes: vec![GraphMutation::EdgeRemoved { parent, child }],
            })
        }
        ValidatedMutation::AddPermission {
            entity,
            resource,
            verb,
            scheme,
            polarity,
        } => {
            let permission = Permission::with_polarity(
                graph.allocate_permission_id(),
                entity.reference(),
                resource,
                verb,
                scheme,
                polarity,
            );
            let change = AddPermissionToEntity {
                entity,
                permission: permission.clone(),
            }
            .apply(graph);
            if change != EdgeChange::Added {
                return Err(AppError::Internal(format!(
                    "permission {} was not attached to {}",
                    permission.id(),
                    entity.reference()
                )));
            }
            Ok(Applied {
                output: CommandOutput::PermissionAttached {
                    permission: permission.clone(),
                    graph_version: graph.version(),
                },
                changes: vec![GraphMutation::PermissionAdded { permission }],
            })
        }
        ValidatedMutation::RemovePermission { entity, permission } => {
            let change = RemovePermissionFromEntity { entity, permission }.apply(graph);
            if change != EdgeChange::Removed {
                return Err(AppError::Internal(format!(
                    "permission {} was not detached from {}",
                    permission.id(),
                    entity.reference()
                )));
            }
            Ok(Applied {
                output: CommandOutput::PermissionDetached {
                    holder: entity.reference(),
                    permission_id: permission.id(),
                    graph_version: graph.version(),
                },
                changes: vec![GraphMutation::PermissionRemoved {
                    holder: entity.reference(),
                    permission_id: permission.id(),
                }],
            })
        }
    }
}

fn resolve(graph: &EntityGraph, reference: EntityRef) -> AppResult<EntityKey> {
    graph.resolve(reference).ok_or_else(|| not_found(reference))
}

fn not_found(reference: EntityRef) -> AppError {
    AppError::NotFound(format!("{reference} was not found"))
}

fn resolve_edge(graph: &EntityGraph, target: EdgeTarget) -> AppResult<ResolvedEdge> {
    let (parent, child) = (target.parent(), target.child());

    Ok(match target {
        EdgeTarget::UserGroup { user, group } => ResolvedEdge::UserGroup(
            graph.resolve_user(user).ok_or_else(|| not_found(child))?,
            graph.resolve_group(group).ok_or_else(|| not_found(parent))?,
        ),
        EdgeTarget::UserRole { user, role } => ResolvedEdge::UserRole(
            graph.resolve_user(user).ok_or_else(|| not_found(child))?,
            graph.resolve_role(role).ok_or_else(|| not_found(parent))?,
        ),
        EdgeTarget::RoleGroup { role, group } => ResolvedEdge::RoleGroup(
            graph.resolve_role(role).ok_or_else(|| not_found(child))?,
            graph.resolve_group(group).ok_or_else(|| not_found(parent))?,
        ),
        EdgeTarget::GroupGroup {
            child: child_id,
            parent: parent_id,
        } => ResolvedEdge::GroupGroup {
            child: graph.resolve_group(child_id).ok_or_else(|| not_found(child))?,
            parent: graph.resolve_group(parent_id).ok_or_else(|| not_found(parent))?,
        },
    })
}

fn edge_exists(graph: &EntityGraph, target: EdgeTarget) -> bool {
    graph
        .entity(target.parent())
        .is_some_and(|parent| parent.children().contains(&target.child()))
}

fn edge_ends(edge: ResolvedEdge) -> (EntityRef, EntityRef) {
    match edge {
        ResolvedEdge::UserGroup(user, group) => (group.reference(), user.reference()),
        ResolvedEdge::UserRole(user, role) => (role.reference(), user.reference()),
        ResolvedEdge::RoleGroup(role, group) => (group.reference(), role.reference()),
        ResolvedEdge::GroupGroup { child, parent } => (parent.reference(), child.reference()),
    }
}

fn link(graph: &mut EntityGraph, edge: ResolvedEdge) -> EdgeChange {
    match edge {
        ResolvedEdge::UserGroup(user, group) => AddUserToGroup { user, group }.apply(graph),
        ResolvedEdge::UserRole(user, role) => AssignUserToRole { user, role }.apply(graph),
        ResolvedEdge::RoleGroup(role, group) => AddRoleToGroup { role, group }.apply(graph),
        ResolvedEdge::GroupGroup { child, parent } => {
            AddGroupToGroup { child, parent }.apply(graph)
        }
    }
}

fn unlink(graph: &mut EntityGraph, edge: ResolvedEdge) -> EdgeChange {
    match edge {
        ResolvedEdge::UserGroup(user, group) => {
            AddUserToGroup { user, group }.inverse().apply(graph)
        }
        ResolvedEdge::UserRole(user, role) => {
            AssignUserToRole { user, role }.inverse().apply(graph)
        }
        ResolvedEdge::RoleGroup(role, group) => {
            AddRoleToGroup { role, group }.inverse().apply(graph)
        }
        ResolvedEdge::GroupGroup { child, parent } => {
            AddGroupToGroup { child, parent }.inverse().apply(graph)
        }
    }
}

fn expect_change(
    change: EdgeChange,
    expected: EdgeChange,
    parent: EntityRef,
    child: EntityRef,
) -> AppResult<()> {
    if change == expected {
        return Ok(());
    }

    Err(AppError::Internal(format!(
        "edge {parent} -> {child} reported {change:?} instead of {expected:?}"
    )))
}

fn saved(graph: &EntityGraph, reference: EntityRef) -> AppResult<Applied> {
    let entity = graph.entity(reference).ok_or_else(|| {
        AppError::Internal(format!("entity {reference} missing right after upsert"))
    })?;

    Ok(Applied {
        output: CommandOutput::EntitySaved {
            entity: EntityView::from(entity),
            graph_version: graph.version(),
        },
        changes: vec![GraphMutation::EntityUpserted {
            reference,
            display_name: entity.display_name().as_str().to_owned(),
            description: entity.description().map(str::to_owned),
        }],
    })
}
