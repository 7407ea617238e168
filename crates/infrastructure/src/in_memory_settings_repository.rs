use std::collections::HashMap;

use async_trait::async_trait;
use dirsync_application::SettingsRepository;
use dirsync_core::AppResult;
use dirsync_domain::SettingKey;
use tokio::sync::RwLock;

/// In-memory settings repository implementation.
#[derive(Debug, Default)]
pub struct InMemorySettingsRepository {
    values: RwLock<HashMap<SettingKey, String>>,
}

impl InMemorySettingsRepository {
    /// Creates an empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self {
            values: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl SettingsRepository for InMemorySettingsRepository {
    async fn get(&self, key: SettingKey) -> AppResult<Option<String>> {
        Ok(self.values.read().await.get(&key).cloned())
    }

    async fn set(&self, key: SettingKey, value: &str) -> AppResult<()> {
        self.values.write().await.insert(key, value.to_owned());
        Ok(())
    }

    async fn delete(&self, key: SettingKey) -> AppResult<()> {
        self.values.write().await.remove(&key);
        Ok(())
    }
}
