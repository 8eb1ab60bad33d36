use std::fmt::{Display, Formatter};
use std::str::FromStr;

use aclgraph_core::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Stable identifier of a user, group or role within one tenant and kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityId(i64);

impl EntityId {
    /// Creates a validated positive entity identifier.
    pub fn new(value: i64) -> AppResult<Self> {
        if value <= 0 {
            return Err(AppError::Validation(format!(
                "entity id must be positive, got {value}"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the raw integer value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }

    pub(crate) fn from_counter(value: i64) -> Self {
        Self(value.max(1))
    }
}

impl Display for EntityId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Stable identifier of a permission within one tenant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionId(i64);

impl PermissionId {
    /// Creates a validated positive permission identifier.
    pub fn new(value: i64) -> AppResult<Self> {
        if value <= 0 {
            return Err(AppError::Validation(format!(
                "permission id must be positive, got {value}"
            )));
        }

        Ok(Self(value))
    }

    /// Returns the raw integer value.
    #[must_use]
    pub fn value(&self) -> i64 {
        self.0
    }

    pub(crate) fn from_counter(value: i64) -> Self {
        Self(value.max(1))
    }
}

impl Display for PermissionId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Graph node variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Leaf principal; never has children.
    User,
    /// Hierarchical container of groups, roles and users.
    Group,
    /// Permission bundle attached to groups and assigned to users.
    Role,
}

impl EntityKind {
    /// Returns the stable transport value.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Group => "group",
            Self::Role => "role",
        }
    }

    /// Returns all kinds.
    #[must_use]
    pub fn all() -> &'static [Self] {
        &[Self::User, Self::Group, Self::Role]
    }

    /// Returns whether `self` may be the parent end of an edge to `child`.
    #[must_use]
    pub fn may_parent(&self, child: EntityKind) -> bool {
        matches!(
            (self, child),
            (Self::Group, Self::Group)
                | (Self::Group, Self::Role)
                | (Self::Group, Self::User)
                | (Self::Role, Self::User)
        )
    }
}

impl Display for EntityKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        formatter.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Self::User),
            "group" => Ok(Self::Group),
            "role" => Ok(Self::Role),
            _ => Err(AppError::Validation(format!(
                "unknown entity kind '{value}'"
            ))),
        }
    }
}

/// Kind-qualified reference to one graph node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Node variant.
    pub kind: EntityKind,
    /// Identifier within the variant.
    pub id: EntityId,
}

impl EntityRef {
    /// Creates a reference from kind and id.
    #[must_use]
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    /// Creates a user reference.
    #[must_use]
    pub fn user(id: EntityId) -> Self {
        Self::new(EntityKind::User, id)
    }

    /// Creates a group reference.
    #[must_use]
    pub fn group(id: EntityId) -> Self {
        Self::new(EntityKind::Group, id)
    }

    /// Creates a role reference.
    #[must_use]
    pub fn role(id: EntityId) -> Self {
        Self::new(EntityKind::Role, id)
    }
}

impl Display for EntityRef {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{} {}", self.kind, self.id)
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::{EntityId, EntityKind, PermissionId};

    #[test]
    fn non_positive_ids_are_rejected() {
        assert!(EntityId::new(0).is_err());
        assert!(EntityId::new(-3).is_err());
        assert!(PermissionId::new(0).is_err());
        assert_eq!(EntityId::new(7).map(|id| id.value()), Ok(7));
    }

    #[test]
    fn only_hierarchy_edges_are_allowed() {
        assert!(EntityKind::Group.may_parent(EntityKind::Group));
        assert!(EntityKind::Group.may_parent(EntityKind::User));
        assert!(EntityKind::Role.may_parent(EntityKind::User));
        assert!(!EntityKind::User.may_parent(EntityKind::Group));
        assert!(!EntityKind::Role.may_parent(EntityKind::Group));
        assert!(!EntityKind::Role.may_parent(EntityKind::Role));
    }

    #[test]
    fn entity_kind_parses_transport_values() {
        assert_eq!(EntityKind::from_str("group"), Ok(EntityKind::Group));
        assert!(EntityKind::from_str("team").is_err());
    }
}
