//! Authorization graph entities, invariants and normalizers.

#![forbid(unsafe_code)]

mod entity;
mod graph;
mod identity;
mod listing;
mod normalizers;
mod permission;

pub use entity::Entity;
pub use graph::{EntityGraph, EntityKey, GroupKey, PermissionKey, RoleKey, UserKey};
pub use identity::{EntityId, EntityKind, EntityRef, PermissionId};
pub use listing::{EntitySortField, SortDirection};
pub use normalizers::{
    AddGroupToGroup, AddPermissionToEntity, AddRoleToGroup, AddUserToGroup, AssignUserToRole,
    EdgeChange, Normalizer, RemoveGroupFromGroup, RemovePermissionFromEntity,
    RemoveRoleFromGroup, RemoveUserFromGroup, UnassignUserFromRole,
};
pub use permission::{HttpVerb, Permission, PermissionScheme, Polarity, ResourcePattern};
