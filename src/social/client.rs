//! Laten 客户端核心实现模块
//!
//! 按配置创建远端存储，并把推荐、今晚精选、为你推荐、埋点、实时订阅组装在一起。

use crate::social::analytics::AnalyticsRecorder;
use crate::social::clock::{Clock, SystemClock};
use crate::social::for_you::{ForYouFeed, ForYouSection, DEFAULT_FOR_YOU_LIMIT};
use crate::social::models::TonightEvent;
use crate::social::platform::PlatformCapabilities;
use crate::social::realtime::RealtimeHub;
use crate::social::settings::{
    keys, AppSettings, KeyValueStore, MemoryKeyValueStore, SqliteKeyValueStore,
};
use crate::social::store::{RemoteStore, RestStore, RestStoreConfig, SqliteStore};
use crate::social::suggestion::{FriendSuggester, SuggestedUser, SuggestionConfig};
use crate::social::tonight::{TonightPicks, DEFAULT_TONIGHT_LIMIT};
use anyhow::Result;
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// 后端类型
#[derive(Clone, Debug)]
pub enum Backend {
    /// 托管后端（PostgREST 风格）
    Rest(RestStoreConfig),
    /// 本地 SQLite 镜像，例如 `sqlite://laten.db?mode=rwc`
    Sqlite { db_url: String },
}

/// 首页各区块参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ComposerConfig {
    pub suggestion: SuggestionConfig,
    pub tonight_limit: usize,
    pub for_you_limit: usize,
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            suggestion: SuggestionConfig::default(),
            tonight_limit: DEFAULT_TONIGHT_LIMIT,
            for_you_limit: DEFAULT_FOR_YOU_LIMIT,
        }
    }
}

/// 客户端配置
#[derive(Clone, Debug)]
pub struct ClientConfig {
    /// 当前登录用户，未登录为 None
    pub user_id: Option<String>,
    pub backend: Backend,
    pub platform: PlatformCapabilities,
    pub composer: ComposerConfig,
}

impl ClientConfig {
    /// 创建默认配置
    pub fn new(user_id: Option<String>, backend: Backend) -> Self {
        Self {
            user_id,
            backend,
            platform: PlatformCapabilities::Web,
            composer: ComposerConfig::default(),
        }
    }
}

/// 首页数据
#[derive(Debug, Clone, Serialize)]
pub struct HomeFeed {
    pub suggestions: Vec<SuggestedUser>,
    pub tonight: Vec<TonightEvent>,
    pub for_you: ForYouSection,
}

/// Laten 客户端
pub struct LatenClient {
    config: ClientConfig,
    store: Arc<dyn RemoteStore>,
    suggester: FriendSuggester,
    tonight: TonightPicks,
    for_you: ForYouFeed,
    analytics: AnalyticsRecorder,
    realtime: RealtimeHub,
    // SQLite 后端落盘，其余后端只保存在内存中
    settings_store: Arc<dyn KeyValueStore>,
}

impl LatenClient {
    /// 按配置创建客户端（使用设备本地时钟）
    pub async fn connect(config: ClientConfig) -> Result<Self> {
        let (store, settings_store): (Arc<dyn RemoteStore>, Arc<dyn KeyValueStore>) =
            match &config.backend {
                Backend::Rest(rest) => (
                    Arc::new(RestStore::new(rest.clone())?),
                    Arc::new(MemoryKeyValueStore::new()),
                ),
                Backend::Sqlite { db_url } => {
                    let sqlite = SqliteStore::connect(db_url).await?;
                    let kv: Arc<dyn KeyValueStore> =
                        Arc::new(SqliteKeyValueStore::new(sqlite.pool().clone()));
                    (Arc::new(sqlite), kv)
                }
            };
        let mut client = Self::with_store(config, store, Arc::new(SystemClock));
        client.settings_store = settings_store;
        Ok(client)
    }

    /// 使用已有存储与时钟创建客户端
    pub fn with_store(
        config: ClientConfig,
        store: Arc<dyn RemoteStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        info!(
            "[Client] 创建客户端，用户ID: {:?}, 平台: {}",
            config.user_id, config.platform
        );
        let composer = config.composer;
        Self {
            suggester: FriendSuggester::with_config(store.clone(), composer.suggestion),
            tonight: TonightPicks::with_limit(store.clone(), clock, composer.tonight_limit),
            for_you: ForYouFeed::with_limit(store.clone(), composer.for_you_limit),
            analytics: AnalyticsRecorder::new(store.clone()),
            realtime: RealtimeHub::new(),
            settings_store: Arc::new(MemoryKeyValueStore::new()),
            store,
            config,
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn user_id(&self) -> Option<&str> {
        self.config.user_id.as_deref()
    }

    pub fn platform(&self) -> PlatformCapabilities {
        self.config.platform
    }

    pub fn store(&self) -> &Arc<dyn RemoteStore> {
        &self.store
    }

    pub fn analytics(&self) -> &AnalyticsRecorder {
        &self.analytics
    }

    pub fn realtime(&self) -> &RealtimeHub {
        &self.realtime
    }

    /// 可能认识的人
    pub async fn suggestions(&self, city: Option<&str>, limit: Option<usize>) -> Vec<SuggestedUser> {
        self.suggester.suggest(self.user_id(), city, limit).await
    }

    /// 今晚精选
    pub async fn tonight(&self) -> Vec<TonightEvent> {
        self.tonight.load().await
    }

    /// 为你推荐
    pub async fn for_you(&self) -> ForYouSection {
        self.for_you.load(self.user_id()).await
    }

    /// 并发拉取首页三个区块，各区块独立降级
    pub async fn home_feed(&self, city: Option<&str>) -> HomeFeed {
        let (suggestions, tonight, for_you) =
            tokio::join!(self.suggestions(city, None), self.tonight(), self.for_you());
        info!(
            "[Client] ✅ 首页数据: 推荐 {} 人, 今晚 {} 个活动, 为你推荐可见: {}",
            suggestions.len(),
            tonight.len(),
            for_you.is_visible()
        );
        HomeFeed {
            suggestions,
            tonight,
            for_you,
        }
    }

    /// 读取设置；尚未保存过平台时取配置中的平台
    pub async fn load_settings(&self) -> Result<AppSettings> {
        let kv = self.settings_store.as_ref();
        let mut settings = AppSettings::load(kv).await?;
        if kv.get(keys::PLATFORM).await?.is_none() {
            settings.platform = self.config.platform;
        }
        Ok(settings)
    }

    pub async fn save_settings(&self, settings: &AppSettings) -> Result<()> {
        settings.save(self.settings_store.as_ref()).await?;
        info!("[Client] 设置已保存: {:?}", settings);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::clock::FixedClock;
    use crate::social::store::sqlite::fixtures::*;
    use chrono::DateTime;
    use std::sync::Once;

    static INIT_LOGGER: Once = Once::new();

    fn init_test_logger() {
        INIT_LOGGER.call_once(|| {
            use tracing_subscriber::prelude::*;
            use tracing_subscriber::EnvFilter;

            let filter_layer = EnvFilter::new("info,laten_sdk_core=debug,sqlx=warn");

            let fmt_layer = tracing_subscriber::fmt::layer()
                .with_file(true)
                .with_line_number(true)
                .with_target(false)
                .with_test_writer();

            tracing_subscriber::registry()
                .with(filter_layer)
                .with(fmt_layer)
                .init();
        });
    }

    async fn seeded_store() -> SqliteStore {
        let store = memory_store().await;
        add_users(
            &store,
            &[("me", Some("Berlin")), ("b", Some("Berlin")), ("c", Some("Berlin"))],
        )
        .await;
        follow(&store, "me", "b").await;
        follow(&store, "b", "c").await;
        store
            .upsert_event(&event("tonight", "2024-01-01T23:30:00Z", true))
            .await
            .unwrap();
        store
            .upsert_event(&event("tomorrow", "2024-01-02T00:30:00Z", true))
            .await
            .unwrap();
        store
            .upsert_recommendation("me", "tomorrow", 81, 0)
            .await
            .unwrap();
        store
    }

    #[tokio::test]
    async fn home_feed_composes_all_sections() {
        init_test_logger();
        let store = seeded_store().await;
        let clock = Arc::new(FixedClock(
            DateTime::parse_from_rfc3339("2024-01-01T22:00:00Z").unwrap(),
        ));
        let config = ClientConfig::new(
            Some("me".into()),
            Backend::Sqlite {
                db_url: "sqlite::memory:".into(),
            },
        );
        let client = LatenClient::with_store(config, Arc::new(store), clock);

        let feed = client.home_feed(Some("Berlin")).await;
        assert_eq!(feed.suggestions.len(), 1);
        assert_eq!(feed.suggestions[0].user.id, "c");
        assert_eq!(feed.suggestions[0].mutual_friends, 1);
        assert_eq!(feed.tonight.len(), 1);
        assert_eq!(feed.tonight[0].event.id, "tonight");
        match &feed.for_you {
            ForYouSection::Events(list) => {
                assert_eq!(list[0].event.id, "tomorrow");
                assert_eq!(list[0].relevance_score, 81);
            }
            other => panic!("unexpected section: {:?}", other),
        }
    }

    #[tokio::test]
    async fn anonymous_client_gets_empty_personal_sections() {
        init_test_logger();
        let store = seeded_store().await;
        let clock = Arc::new(FixedClock(
            DateTime::parse_from_rfc3339("2024-01-01T22:00:00Z").unwrap(),
        ));
        let config = ClientConfig::new(
            None,
            Backend::Sqlite {
                db_url: "sqlite::memory:".into(),
            },
        );
        let client = LatenClient::with_store(config, Arc::new(store), clock);

        let feed = client.home_feed(None).await;
        assert!(feed.suggestions.is_empty());
        assert_eq!(feed.tonight.len(), 1);
        assert_eq!(feed.for_you, ForYouSection::Placeholder);
    }

    #[tokio::test]
    async fn sqlite_backend_persists_settings() {
        init_test_logger();
        let mut config = ClientConfig::new(
            Some("me".into()),
            Backend::Sqlite {
                db_url: "sqlite::memory:".into(),
            },
        );
        config.platform = PlatformCapabilities::IosNative;
        let client = LatenClient::connect(config).await.unwrap();

        let settings = AppSettings {
            language: "es".into(),
            city: Some("Madrid".into()),
            platform: client.platform(),
        };
        client.save_settings(&settings).await.unwrap();
        assert_eq!(client.load_settings().await.unwrap(), settings);
    }

    #[tokio::test]
    async fn rest_backend_uses_config_platform_for_settings() {
        let mut config = ClientConfig::new(
            None,
            Backend::Rest(RestStoreConfig::new(
                "https://api.example.com".into(),
                "anon".into(),
            )),
        );
        config.platform = PlatformCapabilities::AndroidNative;
        let client = LatenClient::connect(config).await.unwrap();
        let settings = client.load_settings().await.unwrap();
        assert_eq!(settings.platform, PlatformCapabilities::AndroidNative);
        assert_eq!(settings.language, "en");
    }

    #[tokio::test]
    async fn rest_backend_keeps_saved_settings_in_memory() {
        let config = ClientConfig::new(
            Some("me".into()),
            Backend::Rest(RestStoreConfig::new(
                "https://api.example.com".into(),
                "anon".into(),
            )),
        );
        let client = LatenClient::connect(config).await.unwrap();

        let settings = AppSettings {
            language: "de".into(),
            city: Some("Berlin".into()),
            platform: PlatformCapabilities::Web,
        };
        client.save_settings(&settings).await.unwrap();
        assert_eq!(client.load_settings().await.unwrap(), settings);
    }
}
