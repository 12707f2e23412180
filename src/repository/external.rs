//! Read-only lookups against external collaborator tables (§3): stream
//! profiles, channel profiles, logos, EPG data. The core binds these by id
//! but never writes them, so each repository here is fetch-only.

use sqlx::{PgPool, Row};

use crate::models::{ChannelProfile, ChannelProfileId, EpgData, EpgDataId, Logo, LogoId, StreamProfile, StreamProfileId};
use crate::Result;

#[derive(Clone)]
pub struct StreamProfileRepository {
    pool: PgPool,
}

impl StreamProfileRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn list_all(&self) -> Result<Vec<StreamProfile>> {
        let rows = sqlx::query("SELECT id, name FROM stream_profiles")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| {
                Ok(StreamProfile {
                    id: StreamProfileId::from(r.try_get::<String, _>("id")?),
                    name: r.try_get("name")?,
                })
            })
            .collect()
    }

    pub async fn exists(&self, id: &StreamProfileId) -> Result<bool> {
        let row = sqlx::query("SELECT EXISTS(SELECT 1 FROM stream_profiles WHERE id = $1) AS e")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(row.try_get("e")?)
    }
}

#[derive(Clone)]
pub struct ChannelProfileRepository {
    pool: PgPool,
}

impl ChannelProfileRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// All profiles, used when a group membership's `channel_profile_ids`
    /// option is empty (§4.6 step 1: "empty ⇒ all").
    pub async fn list_all(&self) -> Result<Vec<ChannelProfile>> {
        let rows = sqlx::query("SELECT id, name FROM channel_profiles")
            .fetch_all(&self.pool)
            .await?;
        rows.into_iter()
            .map(|r| {
                Ok(ChannelProfile {
                    id: ChannelProfileId::from(r.try_get::<String, _>("id")?),
                    name: r.try_get("name")?,
                })
            })
            .collect()
    }
}

#[derive(Clone)]
pub struct LogoRepository {
    pool: PgPool,
}

impl LogoRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Resolve (or lazily create) the logo row for a stream's logo url,
    /// so the auto-channel projector can bind `Channel::logo_id` to it
    /// (§4.6 step 5: "logo (derived from stream logo url)").
    pub async fn get_or_create_by_url(&self, url: &str) -> Result<Logo> {
        if let Some(row) = sqlx::query("SELECT id, url FROM logos WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(Logo {
                id: LogoId::from(row.try_get::<String, _>("id")?),
                url: row.try_get("url")?,
            });
        }
        let id = LogoId::new();
        sqlx::query("INSERT INTO logos (id, url) VALUES ($1, $2) ON CONFLICT (url) DO NOTHING")
            .bind(id.as_str())
            .bind(url)
            .execute(&self.pool)
            .await?;
        if let Some(row) = sqlx::query("SELECT id, url FROM logos WHERE url = $1")
            .bind(url)
            .fetch_optional(&self.pool)
            .await?
        {
            return Ok(Logo {
                id: LogoId::from(row.try_get::<String, _>("id")?),
                url: row.try_get("url")?,
            });
        }
        Ok(Logo { id, url: url.to_string() })
    }
}

#[derive(Clone)]
pub struct EpgDataRepository {
    pool: PgPool,
}

impl EpgDataRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// First `EPGData` row matching a stream's `tvg_id` (§4.6 step 5: "else
    /// first EPGData matching stream tvg-id").
    pub async fn find_first_by_tvg_id(&self, tvg_id: &str) -> Result<Option<EpgData>> {
        let row = sqlx::query("SELECT id, tvg_id FROM epg_data WHERE tvg_id = $1 ORDER BY id LIMIT 1")
            .bind(tvg_id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| {
            Ok(EpgData {
                id: EpgDataId::from(r.try_get::<String, _>("id")?),
                tvg_id: r.try_get("tvg_id")?,
            })
        })
        .transpose()
    }
}
