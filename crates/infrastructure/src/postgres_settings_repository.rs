use async_trait::async_trait;
use dirsync_application::SettingsRepository;
use dirsync_core::{AppError, AppResult};
use dirsync_domain::SettingKey;
use sqlx::PgPool;

/// PostgreSQL-backed settings repository.
#[derive(Clone)]
pub struct PostgresSettingsRepository {
    pool: PgPool,
}

impl PostgresSettingsRepository {
    /// Creates a repository with the provided connection pool.
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SettingsRepository for PostgresSettingsRepository {
    async fn get(&self, key: SettingKey) -> AppResult<Option<String>> {
        sqlx::query_scalar::<_, String>(
            r#"
            SELECT value
            FROM sync_settings
            WHERE key = $1
            "#,
        )
        .bind(key.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to read setting '{}': {error}",
                key.as_str()
            ))
        })
    }

    async fn set(&self, key: SettingKey, value: &str) -> AppResult<()> {
        sqlx::query(
            r#"
            INSERT INTO sync_settings (key, value)
            VALUES ($1, $2)
            ON CONFLICT (key)
            DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = now()
            "#,
        )
        .bind(key.as_str())
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to store setting '{}': {error}",
                key.as_str()
            ))
        })?;

        Ok(())
    }

    async fn delete(&self, key: SettingKey) -> AppResult<()> {
        sqlx::query(
            r#"
            DELETE FROM sync_settings
            WHERE key = $1
            "#,
        )
        .bind(key.as_str())
        .execute(&self.pool)
        .await
        .map_err(|error| {
            AppError::Internal(format!(
                "failed to delete setting '{}': {error}",
                key.as_str()
            ))
        })?;

        Ok(())
    }
}
