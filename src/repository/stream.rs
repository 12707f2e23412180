//! Stream repository: content-addressed upsert and batched writes (§4.4).

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row};

use crate::models::{GroupId, SourceId, Stream, StreamId};
use crate::Result;

fn row_to_stream(row: sqlx::postgres::PgRow) -> Result<Stream> {
    Ok(Stream {
        id: StreamId::from(row.try_get::<String, _>("id")?),
        stream_hash: row.try_get("stream_hash")?,
        name: row.try_get("name")?,
        url: row.try_get("url")?,
        logo_url: row.try_get("logo_url")?,
        tvg_id: row.try_get("tvg_id")?,
        source_id: SourceId::from(row.try_get::<String, _>("source_id")?),
        group_id: GroupId::from(row.try_get::<String, _>("group_id")?),
        custom_properties: row.try_get("custom_properties")?,
        last_seen: row.try_get("last_seen")?,
        updated_at: row.try_get("updated_at")?,
        created_at: row.try_get("created_at")?,
    })
}

const SELECT_STREAM_COLUMNS: &str = r"
    id, stream_hash, name, url, logo_url, tvg_id, source_id, group_id,
    custom_properties, last_seen, updated_at, created_at";

#[derive(Clone)]
pub struct StreamRepository {
    pool: PgPool,
}

impl StreamRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_hash(&self, stream_hash: &str) -> Result<Option<Stream>> {
        let query = format!("SELECT {SELECT_STREAM_COLUMNS} FROM streams WHERE stream_hash = $1");
        let row = sqlx::query(&query)
            .bind(stream_hash)
            .fetch_optional(&self.pool)
            .await?;
        row.map(row_to_stream).transpose()
    }

    /// Look up a stream by its durable id rather than its (possibly stale,
    /// already-rewritten) hash — the rehasher needs this to re-fetch a
    /// survivor whose hash it just updated in a prior loop iteration.
    pub async fn find_by_id(&self, id: &StreamId) -> Result<Option<Stream>> {
        let query = format!("SELECT {SELECT_STREAM_COLUMNS} FROM streams WHERE id = $1");
        let row = sqlx::query(&query).bind(id.as_str()).fetch_optional(&self.pool).await?;
        row.map(row_to_stream).transpose()
    }

    /// Fetch every stream matching any hash in `hashes` in one round trip —
    /// the batched counterpart of `find_by_hash` the Stream Upserter uses to
    /// resolve a whole batch's existing rows without one query per hash.
    pub async fn find_by_hashes(&self, hashes: &[String]) -> Result<Vec<Stream>> {
        if hashes.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!("SELECT {SELECT_STREAM_COLUMNS} FROM streams WHERE stream_hash = ANY($1)");
        let rows = sqlx::query(&query).bind(hashes).fetch_all(&self.pool).await?;
        rows.into_iter().map(row_to_stream).collect()
    }

    /// Multi-row `VALUES` batch insert, grounded in the same batching shape
    /// the upsert pipeline uses for bulk catalog/playlist ingestion.
    pub async fn create_batch_with_executor<'e, E>(
        &self,
        executor: E,
        streams: &[Stream],
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        if streams.is_empty() {
            return Ok(());
        }

        let mut builder = sqlx::QueryBuilder::new(
            "INSERT INTO streams \
             (id, stream_hash, name, url, logo_url, tvg_id, source_id, group_id, \
              custom_properties, last_seen, updated_at, created_at) VALUES ",
        );
        let mut separated = builder.separated(", ");
        for stream in streams {
            separated.push("(");
            separated.push_bind_unseparated(stream.id.as_str());
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(&stream.stream_hash);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(&stream.name);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(&stream.url);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(&stream.logo_url);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(&stream.tvg_id);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(stream.source_id.as_str());
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(stream.group_id.as_str());
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(&stream.custom_properties);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(stream.last_seen);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(stream.updated_at);
            separated.push_unseparated(", ");
            separated.push_bind_unseparated(stream.created_at);
            separated.push_unseparated(")");
        }

        builder.push(" ON CONFLICT (stream_hash) DO NOTHING");

        builder.build().execute(executor).await?;
        Ok(())
    }

    pub async fn update_with_executor<'e, E>(&self, executor: E, stream: &Stream) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE streams SET
                name = $2, url = $3, logo_url = $4, tvg_id = $5, group_id = $6,
                custom_properties = $7, last_seen = $8, updated_at = $9
            WHERE id = $1
            "#,
        )
        .bind(stream.id.as_str())
        .bind(&stream.name)
        .bind(&stream.url)
        .bind(&stream.logo_url)
        .bind(&stream.tvg_id)
        .bind(stream.group_id.as_str())
        .bind(&stream.custom_properties)
        .bind(stream.last_seen)
        .bind(stream.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Stamp `last_seen` only, without disturbing `updated_at` — the "seen
    /// again, unchanged" path of the upsert loop (§4.4 step 3a).
    pub async fn touch_last_seen_batch_with_executor<'e, E>(
        &self,
        executor: E,
        ids: &[StreamId],
        at: DateTime<Utc>,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        if ids.is_empty() {
            return Ok(());
        }
        let id_strs: Vec<&str> = ids.iter().map(StreamId::as_str).collect();
        sqlx::query("UPDATE streams SET last_seen = $1 WHERE id = ANY($2)")
            .bind(at)
            .bind(&id_strs[..])
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Streams belonging to `source_id` and `group_id` currently visible to
    /// this refresh (`last_seen >= scan_start`), ordered by `id` — the
    /// insertion-order basis for the auto-channel projector's `provider`
    /// sort (§4.6 step 2).
    pub async fn list_for_source_group_since(
        &self,
        source_id: &SourceId,
        group_id: &GroupId,
        scan_start: DateTime<Utc>,
    ) -> Result<Vec<Stream>> {
        let query = format!(
            "SELECT {SELECT_STREAM_COLUMNS} FROM streams \
             WHERE source_id = $1 AND group_id = $2 AND last_seen >= $3 ORDER BY id"
        );
        let rows = sqlx::query(&query)
            .bind(source_id.as_str())
            .bind(group_id.as_str())
            .bind(scan_start)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_stream).collect()
    }

    /// Stale-prune candidates: streams belonging to `source_id` whose
    /// `last_seen` predates the current refresh cycle's start (§4.5).
    pub async fn find_stale(
        &self,
        source_id: &SourceId,
        cycle_started_at: DateTime<Utc>,
    ) -> Result<Vec<Stream>> {
        let query = format!(
            "SELECT {SELECT_STREAM_COLUMNS} FROM streams WHERE source_id = $1 AND last_seen < $2"
        );
        let rows = sqlx::query(&query)
            .bind(source_id.as_str())
            .bind(cycle_started_at)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_stream).collect()
    }

    pub async fn delete_batch_with_executor<'e, E>(&self, executor: E, ids: &[StreamId]) -> Result<u64>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        if ids.is_empty() {
            return Ok(0);
        }
        let id_strs: Vec<&str> = ids.iter().map(StreamId::as_str).collect();
        let result = sqlx::query("DELETE FROM streams WHERE id = ANY($1)")
            .bind(&id_strs[..])
            .execute(executor)
            .await?;
        Ok(result.rows_affected())
    }

    /// Streams owned by `source_id` whose group is not in the currently
    /// enabled set (§4.5 first delete rule: disabled-group membership).
    pub async fn find_in_disabled_groups(
        &self,
        source_id: &SourceId,
        enabled_group_ids: &[GroupId],
    ) -> Result<Vec<Stream>> {
        let enabled: Vec<&str> = enabled_group_ids.iter().map(GroupId::as_str).collect();
        let query = format!(
            "SELECT {SELECT_STREAM_COLUMNS} FROM streams \
             WHERE source_id = $1 AND NOT (group_id = ANY($2))"
        );
        let rows = sqlx::query(&query)
            .bind(source_id.as_str())
            .bind(&enabled[..])
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_stream).collect()
    }

    /// Every stream in the system, for the rehash operation (§4.7), ordered
    /// so batches are stable across a resumed run.
    pub async fn list_all_ordered(&self, after_id: Option<&StreamId>, limit: i64) -> Result<Vec<Stream>> {
        let query = format!(
            "SELECT {SELECT_STREAM_COLUMNS} FROM streams \
             WHERE ($1::text IS NULL OR id > $1) ORDER BY id LIMIT $2"
        );
        let rows = sqlx::query(&query)
            .bind(after_id.map(StreamId::as_str))
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter().map(row_to_stream).collect()
    }

    pub async fn update_hash_with_executor<'e, E>(
        &self,
        executor: E,
        id: &StreamId,
        new_hash: &str,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query("UPDATE streams SET stream_hash = $2 WHERE id = $1")
            .bind(id.as_str())
            .bind(new_hash)
            .execute(executor)
            .await?;
        Ok(())
    }
}
