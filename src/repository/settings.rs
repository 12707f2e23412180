//! GlobalSettings repository: a singleton row holding the cluster-wide hash
//! key list the rehash operation (§4.7) rewrites in place.

use sqlx::{PgPool, Row};

use crate::models::GlobalSettings;
use crate::Result;

#[derive(Clone)]
pub struct SettingsRepository {
    pool: PgPool,
}

impl SettingsRepository {
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get(&self) -> Result<GlobalSettings> {
        let row = sqlx::query("SELECT hash_key_list FROM global_settings WHERE id = 1")
            .fetch_optional(&self.pool)
            .await?;
        match row {
            Some(row) => {
                let raw: serde_json::Value = row.try_get("hash_key_list")?;
                Ok(GlobalSettings {
                    hash_key_list: serde_json::from_value(raw)?,
                })
            }
            None => Ok(GlobalSettings::default()),
        }
    }

    /// Persist a new hash key list. The caller (rehasher) is responsible for
    /// holding the cluster-exclusive lock for the whole rehash operation;
    /// this write alone is not the linearization point.
    pub async fn set_hash_key_list_with_executor<'e, E>(
        &self,
        executor: E,
        settings: &GlobalSettings,
    ) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = sqlx::Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO global_settings (id, hash_key_list) VALUES (1, $1)
            ON CONFLICT (id) DO UPDATE SET hash_key_list = EXCLUDED.hash_key_list
            "#,
        )
        .bind(serde_json::to_value(&settings.hash_key_list)?)
        .execute(executor)
        .await?;
        Ok(())
    }
}
