use super::*;

impl PostgresGraphStore {
    pub(super) async fn load_entities_impl(
        &self,
        tenant_id: TenantId,
        kind: EntityKind,
    ) -> AppResult<Vec<EntityRow>> {
        let statement = format!(
            r#"
            SELECT id, display_name, description
            FROM {}
            WHERE tenant_id = $1
            ORDER BY id
            "#,
            entity_table(kind)
        );

        let rows = sqlx::query_as::<_, StoredEntity>(statement.as_str())
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| AppError::Internal(format!("failed to load {kind} rows: {error}")))?;

        Ok(rows.into_iter().map(EntityRow::from).collect())
    }

    pub(super) async fn load_permissions_impl(
        &self,
        tenant_id: TenantId,
    ) -> AppResult<Vec<PermissionRow>> {
        let rows = sqlx::query_as::<_, StoredPermission>(
            r#"
            SELECT id, holder_kind, holder_id, resource_uri, verb, scheme, is_grant, is_deny
            FROM acl_permissions
            WHERE tenant_id = $1
            ORDER BY id
            "#,
        )
        .bind(tenant_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|error| AppError::Internal(format!("failed to load permission rows: {error}")))?;

        Ok(rows.into_iter().map(PermissionRow::from).collect())
    }

    pub(super) async fn load_relations_impl(
        &self,
        tenant_id: TenantId,
        category: &str,
        statement: &str,
    ) -> AppResult<Vec<RelationRow>> {
        let rows = sqlx::query_as::<_, StoredRelation>(statement)
            .bind(tenant_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|error| {
                AppError::Internal(format!("failed to load {category} rows: {error}"))
            })?;

        Ok(rows.into_iter().map(RelationRow::from).collect())
    }
}
