use async_trait::async_trait;
use dirsync_core::AppResult;
use dirsync_domain::SettingKey;

/// Repository port for persisted sync settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    /// Returns a stored value.
    async fn get(&self, key: SettingKey) -> AppResult<Option<String>>;

    /// Stores a value, replacing any previous one.
    async fn set(&self, key: SettingKey, value: &str) -> AppResult<()>;

    /// Removes a stored value.
    async fn delete(&self, key: SettingKey) -> AppResult<()>;
}
