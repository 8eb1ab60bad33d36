use aclgraph_core::AppResult;
use aclgraph_domain::{EntityGraph, EntityKind, EntityRef};

use super::{EntityView, Query, existing, positive_id};

/// Point lookup of one user, group or role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GetEntityQuery {
    /// Entity kind.
    pub kind: EntityKind,
    /// Entity id.
    pub id: i64,
}

impl GetEntityQuery {
    /// Looks up a user.
    #[must_use]
    pub fn user(id: i64) -> Self {
        Self {
            kind: EntityKind::User,
            id,
        }
    }

    /// Looks up a group.
    #[must_use]
    pub fn group(id: i64) -> Self {
        Self {
            kind: EntityKind::Group,
            id,
        }
    }

    /// Looks up a role.
    #[must_use]
    pub fn role(id: i64) -> Self {
        Self {
            kind: EntityKind::Role,
            id,
        }
    }
}

impl Query for GetEntityQuery {
    type Output = EntityView;

    fn validate(&self) -> AppResult<()> {
        positive_id("id", self.id).map(|_| ())
    }

    fn execute(&self, graph: &EntityGraph) -> AppResult<Self::Output> {
        let reference = EntityRef::new(self.kind, positive_id("id", self.id)?);
        existing(graph, reference).map(EntityView::from)
    }
}
