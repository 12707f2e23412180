//! Source repository: CRUD plus the status/progress writebacks the
//! orchestrator issues between pipeline stages (§4.1, §4.9).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::error::Error;
use crate::models::{Source, SourceEndpoint, SourceId, SourceKind, SourceStatus, StreamFilter};
use crate::Result;

fn row_to_source(row: sqlx::postgres::PgRow) -> Result<Source> {
    let urls: serde_json::Value = row.try_get("urls")?;
    let urls: Vec<String> = serde_json::from_value(urls)?;
    let filters: serde_json::Value = row.try_get("filters")?;
    let filters: Vec<StreamFilter> = serde_json::from_value(filters)?;
    let kind: String = row.try_get("kind")?;
    let kind = match kind.as_str() {
        "catalog" => SourceKind::Catalog,
        _ => SourceKind::Playlist,
    };
    let status: String = row.try_get("status")?;
    let refresh_interval_hours: i32 = row.try_get("refresh_interval_hours")?;
    let retention_days: i32 = row.try_get("retention_days")?;

    Ok(Source {
        id: SourceId::from(row.try_get::<String, _>("id")?),
        name: row.try_get("name")?,
        kind,
        endpoint: SourceEndpoint {
            urls,
            local_file_path: row.try_get("local_file_path")?,
        },
        username: row.try_get("username")?,
        password: row.try_get("password")?,
        user_agent: row.try_get("user_agent")?,
        refresh_interval_hours: refresh_interval_hours.max(0) as u32,
        enabled: row.try_get("enabled")?,
        retention_days: retention_days.max(0) as u32,
        status: SourceStatus::from_str_lenient(&status),
        last_message: row.try_get("last_message")?,
        filters,
        options: row.try_get("options")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const SELECT_SOURCE_COLUMNS: &str = r"
    id, name, kind, urls, local_file_path, username, password, user_agent,
    refresh_interval_hours, enabled, retention_days, status, last_message,
    filters, options, created_at, updated_at";

#[derive(Clone)]
pub struct SourceRepository {
    pool: PgPool,
}

impl SourceRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, source: &Source) -> Result<()> {
        self.create_with_executor(&self.pool, source).await
    }

    pub async fn create_with_executor<'e, E>(&self, executor: E, source: &Source) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let kind = match source.kind {
            SourceKind::Playlist => "playlist",
            SourceKind::Catalog => "catalog",
        };
        sqlx::query(
            r#"
            INSERT INTO sources (
                id, name, kind, urls, local_file_path, username, password, user_agent,
                refresh_interval_hours, enabled, retention_days, status, last_message,
                filters, options, created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
            "#,
        )
        .bind(source.id.as_str())
        .bind(&source.name)
        .bind(kind)
        .bind(serde_json::to_value(&source.endpoint.urls)?)
        .bind(&source.endpoint.local_file_path)
        .bind(&source.username)
        .bind(&source.password)
        .bind(&source.user_agent)
        .bind(i32::try_from(source.refresh_interval_hours).unwrap_or(i32::MAX))
        .bind(source.enabled)
        .bind(i32::try_from(source.retention_days).unwrap_or(i32::MAX))
        .bind(source.status.as_str())
        .bind(&source.last_message)
        .bind(serde_json::to_value(&source.filters)?)
        .bind(&source.options)
        .bind(source.created_at)
        .bind(source.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn get_by_id(&self, id: &SourceId) -> Result<Source> {
        let query = format!("SELECT {SELECT_SOURCE_COLUMNS} FROM sources WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;
        row_to_source(row)
    }

    pub async fn get_by_id_optional(&self, id: &SourceId) -> Result<Option<Source>> {
        let query = format!("SELECT {SELECT_SOURCE_COLUMNS} FROM sources WHERE id = $1");
        let row = sqlx::query(&query)
            .bind(id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_source).transpose()
    }

    pub async fn list_enabled(&self) -> Result<Vec<Source>> {
        let query =
            format!("SELECT {SELECT_SOURCE_COLUMNS} FROM sources WHERE enabled = true ORDER BY name");
        let rows = sqlx::query(&query).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_source).collect()
    }

    pub async fn list_due_for_refresh(&self, now: DateTime<Utc>) -> Result<Vec<Source>> {
        let query = format!(
            "SELECT {SELECT_SOURCE_COLUMNS} FROM sources \
             WHERE enabled = true \
               AND status NOT IN ('fetching', 'parsing') \
               AND updated_at <= $1 - make_interval(hours => refresh_interval_hours) \
             ORDER BY updated_at ASC"
        );
        let rows = sqlx::query(&query).bind(now).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_source).collect()
    }

    /// Atomically claim a source for refresh: only transitions `idle`/`success`/`error`
    /// sources to `fetching`, returning `false` if another worker already claimed it.
    pub async fn try_claim_for_refresh(&self, id: &SourceId) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sources
            SET status = 'fetching', updated_at = now()
            WHERE id = $1 AND status NOT IN ('fetching', 'parsing')
            "#,
        )
        .bind(id.as_str())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    pub async fn update_status(
        &self,
        id: &SourceId,
        status: SourceStatus,
        message: &str,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE sources SET status = $2, last_message = $3, updated_at = now() WHERE id = $1",
        )
        .bind(id.as_str())
        .bind(status.as_str())
        .bind(message)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, id: &SourceId) -> Result<()> {
        let result = sqlx::query("DELETE FROM sources WHERE id = $1")
            .bind(id.as_str())
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(Error::NotFound(format!("source {id} not found")));
        }
        Ok(())
    }
}
