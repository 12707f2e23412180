//! Channel / ChannelStream / ChannelProfileMembership repository (§4.6).

use sqlx::{PgPool, Row};

use crate::models::{
    Channel, ChannelId, ChannelProfileId, ChannelProfileMembership, ChannelStream, EpgDataId,
    GroupId, LogoId, SourceId, StreamId, StreamProfileId,
};
use crate::Result;

fn row_to_channel(row: sqlx::postgres::PgRow) -> Result<Channel> {
    Ok(Channel {
        id: ChannelId::from(row.try_get::<String, _>("id")?),
        uuid: row.try_get("uuid")?,
        channel_number: row.try_get("channel_number")?,
        name: row.try_get("name")?,
        tvg_id: row.try_get("tvg_id")?,
        guide_station_id: row.try_get("guide_station_id")?,
        logo_id: row
            .try_get::<Option<String>, _>("logo_id")?
            .map(LogoId::from),
        epg_data_id: row
            .try_get::<Option<String>, _>("epg_data_id")?
            .map(EpgDataId::from),
        group_id: GroupId::from(row.try_get::<String, _>("group_id")?),
        stream_profile_id: row
            .try_get::<Option<String>, _>("stream_profile_id")?
            .map(StreamProfileId::from),
        auto_created: row.try_get("auto_created")?,
        auto_created_by: row
            .try_get::<Option<String>, _>("auto_created_by")?
            .map(SourceId::from),
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

const SELECT_CHANNEL_COLUMNS: &str = r"
    id, uuid, channel_number, name, tvg_id, guide_station_id, logo_id, epg_data_id,
    group_id, stream_profile_id, auto_created, auto_created_by, created_at, updated_at";

#[derive(Clone)]
pub struct ChannelRepository {
    pool: PgPool,
}

impl ChannelRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Reverse-traverses `ChannelStream` edges to map each stream belonging
    /// to `source_id`/`group_id` to the auto-created channel it feeds, if
    /// any (§4.6 step 3). A stream with no such edge is absent from the map.
    pub async fn map_streams_to_auto_created_channels(
        &self,
        source_id: &SourceId,
        group_id: &GroupId,
    ) -> Result<Vec<(StreamId, Channel)>> {
        let query = format!(
            "SELECT cs.stream_id AS __stream_id, {cols} FROM channel_streams cs \
             JOIN channels c ON c.id = cs.channel_id \
             JOIN streams s ON s.id = cs.stream_id \
             WHERE c.auto_created = true AND c.auto_created_by = $1 \
               AND s.source_id = $1 AND s.group_id = $2",
            cols = SELECT_CHANNEL_COLUMNS
                .split(", ")
                .map(|c| format!("c.{c}"))
                .collect::<Vec<_>>()
                .join(", ")
        );
        let rows = sqlx::query(&query)
            .bind(source_id.as_str())
            .bind(group_id.as_str())
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|row| {
                let stream_id = StreamId::from(row.try_get::<String, _>("__stream_id")?);
                let channel = row_to_channel(row)?;
                Ok((stream_id, channel))
            })
            .collect()
    }

    /// Every `ChannelStream` edge pointing at `stream_id`, for the rehasher's
    /// merge step (§4.7: repoint or drop edges on a surviving stream).
    pub async fn list_channel_streams_for_stream(&self, stream_id: &StreamId) -> Result<Vec<ChannelStream>> {
        let rows = sqlx::query(
            "SELECT channel_id, stream_id, \"order\" FROM channel_streams WHERE stream_id = $1",
        )
        .bind(stream_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|row| {
                Ok(ChannelStream {
                    channel_id: ChannelId::from(row.try_get::<String, _>("channel_id")?),
                    stream_id: StreamId::from(row.try_get::<String, _>("stream_id")?),
                    order: row.try_get("order")?,
                })
            })
            .collect()
    }

    pub async fn channel_stream_edge_exists_with_executor<'e, E>(
        &self,
        executor: E,
        channel_id: &ChannelId,
        stream_id: &StreamId,
    ) -> Result<bool>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        let row = sqlx::query(
            "SELECT EXISTS(SELECT 1 FROM channel_streams WHERE channel_id = $1 AND stream_id = $2) AS e",
        )
        .bind(channel_id.as_str())
        .bind(stream_id.as_str())
        .fetch_one(executor)
        .await?;
        Ok(row.try_get("e")?)
    }

    pub async fn delete_channel_stream_edge_with_executor<'e, E>(
        &self,
        executor: E,
        channel_id: &ChannelId,
        stream_id: &StreamId,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query("DELETE FROM channel_streams WHERE channel_id = $1 AND stream_id = $2")
            .bind(channel_id.as_str())
            .bind(stream_id.as_str())
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn repoint_channel_stream_with_executor<'e, E>(
        &self,
        executor: E,
        channel_id: &ChannelId,
        old_stream_id: &StreamId,
        new_stream_id: &StreamId,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            "UPDATE channel_streams SET stream_id = $3 WHERE channel_id = $1 AND stream_id = $2",
        )
        .bind(channel_id.as_str())
        .bind(old_stream_id.as_str())
        .bind(new_stream_id.as_str())
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn insert_channel_stream_with_executor<'e, E>(
        &self,
        executor: E,
        member: &ChannelStream,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            "INSERT INTO channel_streams (channel_id, stream_id, \"order\") VALUES ($1, $2, $3) \
             ON CONFLICT DO NOTHING",
        )
        .bind(member.channel_id.as_str())
        .bind(member.stream_id.as_str())
        .bind(member.order)
        .execute(executor)
        .await?;
        Ok(())
    }

    /// Channel numbers within `group_id` held by channels this Source did
    /// not auto-create — they block those numbers during renumbering
    /// (§4.6 step 4: "channels not created by this Source").
    pub async fn blocked_numbers_in_group(
        &self,
        group_id: &GroupId,
        source_id: &SourceId,
    ) -> Result<Vec<f64>> {
        let rows = sqlx::query(
            "SELECT channel_number FROM channels \
             WHERE group_id = $1 AND NOT (auto_created = true AND auto_created_by = $2)",
        )
        .bind(group_id.as_str())
        .bind(source_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(|r| Ok(r.try_get("channel_number")?)).collect()
    }

    pub async fn insert_with_executor<'e, E>(&self, executor: E, channel: &Channel) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO channels
                (id, uuid, channel_number, name, tvg_id, guide_station_id, logo_id, epg_data_id,
                 group_id, stream_profile_id, auto_created, auto_created_by, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            "#,
        )
        .bind(channel.id.as_str())
        .bind(channel.uuid)
        .bind(channel.channel_number)
        .bind(&channel.name)
        .bind(&channel.tvg_id)
        .bind(&channel.guide_station_id)
        .bind(channel.logo_id.as_ref().map(LogoId::as_str))
        .bind(channel.epg_data_id.as_ref().map(EpgDataId::as_str))
        .bind(channel.group_id.as_str())
        .bind(channel.stream_profile_id.as_ref().map(StreamProfileId::as_str))
        .bind(channel.auto_created)
        .bind(channel.auto_created_by.as_ref().map(SourceId::as_str))
        .bind(channel.created_at)
        .bind(channel.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn update_with_executor<'e, E>(&self, executor: E, channel: &Channel) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            UPDATE channels SET
                channel_number = $2, name = $3, tvg_id = $4, guide_station_id = $5,
                logo_id = $6, epg_data_id = $7, group_id = $8, stream_profile_id = $9,
                updated_at = $10
            WHERE id = $1
            "#,
        )
        .bind(channel.id.as_str())
        .bind(channel.channel_number)
        .bind(&channel.name)
        .bind(&channel.tvg_id)
        .bind(&channel.guide_station_id)
        .bind(channel.logo_id.as_ref().map(LogoId::as_str))
        .bind(channel.epg_data_id.as_ref().map(EpgDataId::as_str))
        .bind(channel.group_id.as_str())
        .bind(channel.stream_profile_id.as_ref().map(StreamProfileId::as_str))
        .bind(channel.updated_at)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn delete_with_executor<'e, E>(&self, executor: E, id: &ChannelId) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query("DELETE FROM channels WHERE id = $1")
            .bind(id.as_str())
            .execute(executor)
            .await?;
        Ok(())
    }

    pub async fn set_profile_membership_with_executor<'e, E>(
        &self,
        executor: E,
        membership: &ChannelProfileMembership,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO channel_profile_memberships (profile_id, channel_id, enabled)
            VALUES ($1, $2, $3)
            ON CONFLICT (profile_id, channel_id) DO UPDATE SET enabled = EXCLUDED.enabled
            "#,
        )
        .bind(membership.profile_id.as_str())
        .bind(membership.channel_id.as_str())
        .bind(membership.enabled)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn list_profile_ids_for_channel(
        &self,
        channel_id: &ChannelId,
    ) -> Result<Vec<ChannelProfileId>> {
        let rows = sqlx::query(
            "SELECT profile_id FROM channel_profile_memberships WHERE channel_id = $1 AND enabled = true",
        )
        .bind(channel_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter()
            .map(|r| r.try_get::<String, _>("profile_id").map(ChannelProfileId::from).map_err(Into::into))
            .collect()
    }
}
