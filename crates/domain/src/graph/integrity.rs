use std::collections::BTreeMap;

use aclgraph_core::{AppError, AppResult};

use crate::{EntityId, EntityKind, EntityRef};

use super::EntityGraph;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Visit {
    InProgress,
    Done,
}

impl EntityGraph {
    /// Verifies every structural invariant of the graph.
    ///
    /// Returns the first violation found as an internal error.
    pub fn verify_integrity(&self) -> AppResult<()> {
        for kind in EntityKind::all() {
            for entity in self.entities(*kind) {
                let reference = entity.reference();

                for parent in entity.parents() {
                    if !parent.kind.may_parent(reference.kind) {
                        return Err(violation(format!(
                            "{parent} may not be a parent of {reference}"
                        )));
                    }
                    let back_edge = self
                        .entity(*parent)
                        .is_some_and(|stored| stored.children().contains(&reference));
                    if !back_edge {
                        return Err(violation(format!(
                            "{reference} lists parent {parent} without a matching child edge"
                        )));
                    }
                }

                for child in entity.children() {
                    let back_edge = self
                        .entity(*child)
                        .is_some_and(|stored| stored.parents().contains(&reference));
                    if !back_edge {
                        return Err(violation(format!(
                            "{reference} lists child {child} without a matching parent edge"
                        )));
                    }
                }

                for (scheme, ids) in entity.schemes() {
                    if ids.is_empty() {
                        return Err(violation(format!(
                            "{reference} keeps an empty '{scheme}' scheme group"
                        )));
                    }
                    for id in ids {
                        let consistent = self.permission(*id).is_some_and(|permission| {
                            permission.holder() == reference && permission.scheme() == *scheme
                        });
                        if !consistent {
                            return Err(violation(format!(
                                "{reference} references permission {id} it does not hold"
                            )));
                        }
                    }
                }
            }
        }

        for permission in self.permissions() {
            let held = self
                .entity(permission.holder())
                .is_some_and(|entity| entity.holds_permission(permission.id()));
            if !held {
                return Err(violation(format!(
                    "permission {} is not attached to its holder {}",
                    permission.id(),
                    permission.holder()
                )));
            }
        }

        self.verify_group_hierarchy_is_acyclic()
    }

    fn verify_group_hierarchy_is_acyclic(&self) -> AppResult<()> {
        let mut visits: BTreeMap<EntityId, Visit> = BTreeMap::new();

        for group in self.groups() {
            if visits.contains_key(&group.id()) {
                continue;
            }

            let mut stack: Vec<(EntityRef, bool)> = vec![(group.reference(), false)];
            while let Some((current, expanded)) = stack.pop() {
                if expanded {
                    visits.insert(current.id, Visit::Done);
                    continue;
                }

                match visits.get(&current.id) {
                    Some(Visit::Done) => continue,
                    Some(Visit::InProgress) => continue,
                    None => {}
                }

                visits.insert(current.id, Visit::InProgress);
                stack.push((current, true));

                let Some(entity) = self.entity(current) else {
                    continue;
                };
                for child in entity.children_of_kind(EntityKind::Group) {
                    match visits.get(&child.id) {
                        Some(Visit::InProgress) => {
                            return Err(violation(format!(
                                "group hierarchy contains a cycle through {child}"
                            )));
                        }
                        Some(Visit::Done) => {}
                        None => stack.push((child, false)),
                    }
                }
            }
        }

        Ok(())
    }
}

fn violation(detail: String) -> AppError {
    AppError::Internal(format!("graph integrity violated: {detail}"))
}
