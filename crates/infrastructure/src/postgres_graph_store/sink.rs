use super::*;

/// Relation table, member column and container column of one edge kind.
fn edge_table(
    parent: EntityRef,
    child: EntityRef,
) -> AppResult<(&'static str, &'static str, &'static str)> {
    match (parent.kind, child.kind) {
        (EntityKind::Group, EntityKind::User) => Ok(("acl_user_groups", "user_id", "group_id")),
        (EntityKind::Role, EntityKind::User) => Ok(("acl_user_roles", "user_id", "role_id")),
        (EntityKind::Group, EntityKind::Role) => Ok(("acl_group_roles", "role_id", "group_id")),
        (EntityKind::Group, EntityKind::Group) => {
            Ok(("acl_group_parents", "child_id", "parent_id"))
        }
        _ => Err(AppError::Validation(format!("{parent} may not be a parent of {child}"))),
    }
}

/// Relation columns that reference an entity of `kind`.
fn referencing_columns(kind: EntityKind) -> &'static [(&'static str, &'static str)] {
    match kind {
        EntityKind::User => &[("acl_user_groups", "user_id"), ("acl_user_roles", "user_id")],
        EntityKind::Group => &[
            ("acl_user_groups", "group_id"),
            ("acl_group_roles", "group_id"),
            ("acl_group_parents", "child_id"),
            ("acl_group_parents", "parent_id"),
        ],
        EntityKind::Role => &[("acl_user_roles", "role_id"), ("acl_group_roles", "role_id")],
    }
}

impl PostgresGraphStore {
    pub(super) async fn upsert_entity_impl(
        &self,
        tenant_id: TenantId,
        reference: EntityRef,
        display_name: &str,
        description: Option<&str>,
    ) -> AppResult<()> {
        let statement = format!(
            r#"
            INSERT INTO {} (tenant_id, id, display_name, description)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (tenant_id, id)
            DO UPDATE SET display_name = EXCLUDED.display_name,
                          description = EXCLUDED.description
            "#,
            entity_table(reference.kind)
        );

        sqlx::query(statement.as_str())
            .bind(tenant_id.as_uuid())
            .bind(reference.id.value())
            .bind(display_name)
            .bind(description)
            .execute(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to save {reference}: {error}")))?;

        Ok(())
    }

    pub(super) async fn delete_entity_impl(
        &self,
        tenant_id: TenantId,
        reference: EntityRef,
    ) -> AppResult<()> {
        let mut transaction =
            self.pool.begin().await.map_err(|error| {
                AppError::Internal(format!("failed to begin transaction: {error}"))
            })?;

        for (table, column) in referencing_columns(reference.kind) {
            let statement = format!("DELETE FROM {table} WHERE tenant_id = $1 AND {column} = $2");
            sqlx::query(statement.as_str())
                .bind(tenant_id.as_uuid())
                .bind(reference.id.value())
                .execute(&mut *transaction)
                .await
                .map_err(|error| {
                    AppError::Internal(format!(
                        "failed to unlink {reference} from {table}: {error}"
                    ))
                })?;
        }

        sqlx::query(
            r#"
            DELETE FROM acl_permissions
            WHERE tenant_id = $1 AND holder_kind = $2 AND holder_id = $3
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(reference.kind.as_str())
        .bind(reference.id.value())
        .execute(&mut *transaction)
        .await
        .map_err(|error| {
            AppError::Internal(format!("failed to delete permissions of {reference}: {error}"))
        })?;

        let statement = format!(
            "DELETE FROM {} WHERE tenant_id = $1 AND id = $2",
            entity_table(reference.kind)
        );
        sqlx::query(statement.as_str())
            .bind(tenant_id.as_uuid())
            .bind(reference.id.value())
            .execute(&mut *transaction)
            .await
            .map_err(|error| AppError::Internal(format!("failed to delete {reference}: {error}")))?;

        transaction.commit().await.map_err(|error| {
            AppError::Internal(format!("failed to commit transaction: {error}"))
        })?;

        Ok(())
    }

    pub(super) async fn insert_edge_impl(
        &self,
        tenant_id: TenantId,
        parent: EntityRef,
        child: EntityRef,
    ) -> AppResult<()> {
        let (table, member, container) = edge_table(parent, child)?;
        let statement = format!(
            r#"
            INSERT INTO {table} (tenant_id, {member}, {container})
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#
        );

        sqlx::query(statement.as_str())
            .bind(tenant_id.as_uuid())
            .bind(child.id.value())
            .bind(parent.id.value())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to link {child} under {parent}: {error}"))
            })?;

        Ok(())
    }

    pub(super) async fn delete_edge_impl(
        &self,
        tenant_id: TenantId,
        parent: EntityRef,
        child: EntityRef,
    ) -> AppResult<()> {
        let (table, member, container) = edge_table(parent, child)?;
        let statement = format!(
            "DELETE FROM {table} WHERE tenant_id = $1 AND {member} = $2 AND {container} = $3"
        );

        sqlx::query(statement.as_str())
            .bind(tenant_id.as_uuid())
            .bind(child.id.value())
            .bind(parent.id.value())
            .execute(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to unlink {child} from {parent}: {error}"))
            })?;

        Ok(())
    }

    pub(super) async fn insert_permission_impl(
        &self,
        tenant_id: TenantId,
        permission: &Permission,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO acl_permissions (
                tenant_id, id, holder_kind, holder_id, resource_uri, verb, scheme, is_grant, is_deny
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(permission.id().value())
        .bind(permission.holder().kind.as_str())
        .bind(permission.holder().id.value())
        .bind(permission.resource().as_str())
        .bind(permission.verb().as_str())
        .bind(permission.scheme().as_str())
        .bind(permission.is_grant())
        .bind(permission.is_deny())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to save permission {}: {error}",
                permission.id()
            ))
        })?;

        Ok(())
    }

    pub(super) async fn delete_permission_impl(
        &self,
        tenant_id: TenantId,
        permission_id: PermissionId,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM acl_permissions
            WHERE tenant_id = $1 AND id = $2
            "#,
        )
        .bind(tenant_id.as_uuid())
        .bind(permission_id.value())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete permission {permission_id}: {error}"
            ))
        })?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use aclgraph_core::AppError;
    use aclgraph_domain::{EntityId, EntityKind, EntityRef};

    use super::{edge_table, referencing_columns};

    fn id(value: i64) -> EntityId {
        EntityId::new(value).unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn edges_map_to_their_relation_tables() {
        assert_eq!(
            edge_table(EntityRef::role(id(1)), EntityRef::user(id(2))),
            Ok(("acl_user_roles", "user_id", "role_id"))
        );
        assert_eq!(
            edge_table(EntityRef::group(id(1)), EntityRef::group(id(2))),
            Ok(("acl_group_parents", "child_id", "parent_id"))
        );
        assert!(matches!(
            edge_table(EntityRef::role(id(1)), EntityRef::group(id(2))),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn group_deletion_clears_both_hierarchy_columns() {
        let columns = referencing_columns(EntityKind::Group);

        assert!(columns.contains(&("acl_group_parents", "child_id")));
        assert!(columns.contains(&("acl_group_parents", "parent_id")));
    }
}
