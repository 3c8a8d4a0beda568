//! 用户设置持久化
//!
//! 设置通过注入的 `KeyValueStore` 读写，不使用全局状态。

use crate::social::platform::PlatformCapabilities;
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{Pool, Sqlite};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// 键值存储接口
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> Result<()>;
    async fn remove(&self, key: &str) -> Result<()>;
}

/// 内存实现
#[derive(Default)]
pub struct MemoryKeyValueStore {
    entries: RwLock<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}

/// SQLite 实现（`app_settings` 表）
pub struct SqliteKeyValueStore {
    db: Pool<Sqlite>,
}

impl SqliteKeyValueStore {
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl KeyValueStore for SqliteKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        sqlx::query_scalar("SELECT value FROM app_settings WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.db)
            .await
            .context("读取设置失败")
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO app_settings (key, value) VALUES (?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.db)
        .await
        .context("保存设置失败")?;
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<()> {
        sqlx::query("DELETE FROM app_settings WHERE key = ?")
            .bind(key)
            .execute(&self.db)
            .await
            .context("删除设置失败")?;
        Ok(())
    }
}

pub mod keys {
    pub const LANGUAGE: &str = "language";
    pub const CITY: &str = "city";
    pub const PLATFORM: &str = "platform";
}

/// 应用设置
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppSettings {
    pub language: String,
    pub city: Option<String>,
    pub platform: PlatformCapabilities,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            language: "en".to_string(),
            city: None,
            platform: PlatformCapabilities::Web,
        }
    }
}

impl AppSettings {
    /// 读取设置，缺失或无法解析的项使用默认值
    pub async fn load(store: &dyn KeyValueStore) -> Result<Self> {
        let mut settings = Self::default();
        if let Some(language) = store.get(keys::LANGUAGE).await? {
            settings.language = language;
        }
        settings.city = store.get(keys::CITY).await?.filter(|c| !c.is_empty());
        if let Some(raw) = store.get(keys::PLATFORM).await? {
            match raw.parse() {
                Ok(platform) => settings.platform = platform,
                Err(e) => warn!("[Settings] 忽略无效的平台设置 {}: {:?}", raw, e),
            }
        }
        debug!("[Settings] 已加载设置: {:?}", settings);
        Ok(settings)
    }

    pub async fn save(&self, store: &dyn KeyValueStore) -> Result<()> {
        store.set(keys::LANGUAGE, &self.language).await?;
        match &self.city {
            Some(city) => store.set(keys::CITY, city).await?,
            None => store.remove(keys::CITY).await?,
        }
        store.set(keys::PLATFORM, self.platform.as_str()).await?;
        Ok(())
    }
}
