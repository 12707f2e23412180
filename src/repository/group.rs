//! Group / GroupMembership repository (§3 Group, §4.3 reconciliation).

use sqlx::{PgPool, Row};

use crate::models::{Group, GroupId, GroupMembership, SourceId};
use crate::Result;

fn row_to_group(row: sqlx::postgres::PgRow) -> Result<Group> {
    Ok(Group {
        id: GroupId::from(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        created_at: row.try_get("created_at")?,
    })
}

fn row_to_membership(row: sqlx::postgres::PgRow) -> Result<GroupMembership> {
    Ok(GroupMembership {
        source_id: SourceId::from(row.try_get::<String, _>("source_id")?),
        group_id: GroupId::from(row.try_get::<String, _>("group_id")?),
        group_name: row.try_get("group_name")?,
        enabled: row.try_get("enabled")?,
        custom_properties: row.try_get("custom_properties")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

#[derive(Clone)]
pub struct GroupRepository {
    pool: PgPool,
}

impl GroupRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Find a group by exact name, if one already exists.
    pub async fn find_by_name<'e, E>(&self, executor: E, name: &str) -> Result<Option<Group>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query("SELECT id, name, created_at FROM groups WHERE name = $1")
            .bind(name)
            .fetch_optional(executor)
            .await?;
        row.map(row_to_group).transpose()
    }

    /// Delete a group that no longer has any membership and no direct
    /// channels assigned (§4.3 edge case: "last source drops a group").
    pub async fn delete_if_orphaned(&self, id: &GroupId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            DELETE FROM groups
            WHERE id = $1
              AND NOT EXISTS (SELECT 1 FROM group_memberships WHERE group_id = $1)
              AND NOT EXISTS (SELECT 1 FROM channels WHERE group_id = $1)
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn find_membership<'e, E>(
        &self,
        executor: E,
        source_id: &SourceId,
        group_id: &GroupId,
    ) -> Result<Option<GroupMembership>>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query(
            r#"
            SELECT source_id, group_id, group_name, enabled, custom_properties, created_at, updated_at
            FROM group_memberships WHERE source_id = $1 AND group_id = $2
            "#,
        )
        .bind(source_id.as_str())
        .bind(group_id.as_str())
        .fetch_optional(executor)
        .await?;
        row.map(row_to_membership).transpose()
    }

    pub async fn list_memberships_for_source(
        &self,
        source_id: &SourceId,
    ) -> Result<Vec<GroupMembership>> {
        let rows = sqlx::query(
            r#"
            SELECT source_id, group_id, group_name, enabled, custom_properties, created_at, updated_at
            FROM group_memberships WHERE source_id = $1
            "#,
        )
        .bind(source_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(row_to_membership).collect()
    }

    pub async fn upsert_membership_with_executor<'e, E>(
        &self,
        executor: E,
        membership: &GroupMembership,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO group_memberships
                (source_id, group_id, group_name, enabled, custom_properties, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (source_id, group_id) DO UPDATE SET
                group_name = EXCLUDED.group_name,
                custom_properties = EXCLUDED.custom_properties,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(membership.source_id.as_str())
        .bind(membership.group_id.as_str())
        .bind(&membership.group_name)
        .bind(membership.enabled)
        .bind(&membership.custom_properties)
        .bind(membership.created_at)
        .bind(membership.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete_membership_with_executor<'e, E>(
        &self,
        executor: E,
        source_id: &SourceId,
        group_id: &GroupId,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query("DELETE FROM group_memberships WHERE source_id = $1 AND group_id = $2")
            .bind(source_id.as_str())
            .bind(group_id.as_str())
            .execute(executor)
            .await?;
        Ok(())
    }
}
