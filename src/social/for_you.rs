//! "为你推荐"区块
//!
//! 列表与相关度分数都由服务端给出，客户端不重新排序。
//! 这里只决定区块的呈现：展示列表、展示引导占位，或整体隐藏。

use crate::social::models::{tables, PersonalizedEvent, UserPreference};
use crate::social::store::{fetch_or_empty, rpc, RemoteStore, RowQuery};
use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, warn};

/// 默认拉取条数
pub const DEFAULT_FOR_YOU_LIMIT: usize = 20;

/// 区块呈现方式
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "events", rename_all = "snake_case")]
pub enum ForYouSection {
    /// 按服务端顺序展示
    Events(Vec<PersonalizedEvent>),
    /// 用户还没有任何个性化信号，展示引导说明
    Placeholder,
    /// 有信号但没有结果，不展示
    Hidden,
}

impl ForYouSection {
    pub fn is_visible(&self) -> bool {
        !matches!(self, ForYouSection::Hidden)
    }
}

/// 决定区块呈现
pub fn compose_for_you(events: Vec<PersonalizedEvent>, has_signal: bool) -> ForYouSection {
    if !events.is_empty() {
        ForYouSection::Events(events)
    } else if has_signal {
        ForYouSection::Hidden
    } else {
        ForYouSection::Placeholder
    }
}

/// 个性化推荐服务
pub struct ForYouFeed {
    store: Arc<dyn RemoteStore>,
    limit: usize,
}

impl ForYouFeed {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_limit(store, DEFAULT_FOR_YOU_LIMIT)
    }

    pub fn with_limit(store: Arc<dyn RemoteStore>, limit: usize) -> Self {
        Self { store, limit }
    }

    /// 拉取服务端推荐列表
    async fn fetch_events(&self, user_id: &str) -> Result<Vec<PersonalizedEvent>> {
        let value = self
            .store
            .rpc_call(
                rpc::GET_PERSONALIZED_EVENTS,
                json!({ "user_id": user_id, "limit": self.limit }),
            )
            .await?;
        if value.is_null() {
            return Ok(Vec::new());
        }
        let mut events: Vec<PersonalizedEvent> =
            serde_json::from_value(value).context("解析个性化推荐失败")?;
        events.truncate(self.limit);
        Ok(events)
    }

    /// 用户是否已有个性化信号（偏好设置）
    async fn has_signal(&self, user_id: &str) -> bool {
        let q = RowQuery::table(tables::USER_PREFERENCES)
            .eq("user_id", user_id)
            .limit(1);
        let rows: Vec<UserPreference> =
            fetch_or_empty(self.store.as_ref(), &q, "个性化信号").await;
        !rows.is_empty()
    }

    /// 生成区块；未登录时直接展示引导占位，不发请求
    pub async fn load(&self, user_id: Option<&str>) -> ForYouSection {
        let me = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => return ForYouSection::Placeholder,
        };

        let events = match self.fetch_events(me).await {
            Ok(events) => events,
            Err(e) => {
                warn!("[ForYou] 拉取个性化推荐失败，按空数据处理: {:?}", e);
                Vec::new()
            }
        };
        let has_signal = if events.is_empty() {
            self.has_signal(me).await
        } else {
            true
        };

        let section = compose_for_you(events, has_signal);
        info!(
            "[ForYou] 用户 {} 的推荐区块: {}",
            me,
            match &section {
                ForYouSection::Events(list) => format!("{} 个活动", list.len()),
                ForYouSection::Placeholder => "引导占位".to_string(),
                ForYouSection::Hidden => "隐藏".to_string(),
            }
        );
        section
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::store::sqlite::fixtures::{event, memory_store};
    use crate::social::store::testing::FailingStore;

    fn ids(section: &ForYouSection) -> Vec<String> {
        match section {
            ForYouSection::Events(list) => list.iter().map(|e| e.event.id.clone()).collect(),
            _ => Vec::new(),
        }
    }

    #[test]
    fn compose_covers_three_states() {
        let pe = PersonalizedEvent {
            event: event("e1", "2024-01-01T23:00:00Z", true),
            relevance_score: 40,
        };
        assert_eq!(
            compose_for_you(vec![pe.clone()], false),
            ForYouSection::Events(vec![pe])
        );
        assert_eq!(compose_for_you(vec![], false), ForYouSection::Placeholder);
        assert_eq!(compose_for_you(vec![], true), ForYouSection::Hidden);
        assert!(!ForYouSection::Hidden.is_visible());
    }

    #[tokio::test]
    async fn keeps_upstream_order_even_when_scores_disagree() {
        let store = memory_store().await;
        for (id, score, rank) in [("low", 10, 0), ("high", 95, 1), ("mid", 50, 2)] {
            store
                .upsert_event(&event(id, "2024-01-01T23:00:00Z", true))
                .await
                .unwrap();
            store.upsert_recommendation("me", id, score, rank).await.unwrap();
        }
        let feed = ForYouFeed::new(Arc::new(store));

        let section = feed.load(Some("me")).await;
        assert_eq!(ids(&section), vec!["low", "high", "mid"]);
        if let ForYouSection::Events(list) = &section {
            assert_eq!(list[1].relevance_score, 95);
        }
    }

    #[tokio::test]
    async fn empty_result_depends_on_signal() {
        let store = memory_store().await;
        store
            .upsert_preference(&UserPreference {
                user_id: "tuned".into(),
                favorite_genres: Some("techno".into()),
                favorite_city: None,
            })
            .await
            .unwrap();
        let feed = ForYouFeed::new(Arc::new(store));

        assert_eq!(feed.load(Some("tuned")).await, ForYouSection::Hidden);
        assert_eq!(feed.load(Some("fresh")).await, ForYouSection::Placeholder);
        assert_eq!(feed.load(None).await, ForYouSection::Placeholder);
    }

    #[tokio::test]
    async fn respects_limit() {
        let store = memory_store().await;
        for rank in 0..5 {
            let id = format!("e{}", rank);
            store
                .upsert_event(&event(&id, "2024-01-01T23:00:00Z", true))
                .await
                .unwrap();
            store.upsert_recommendation("me", &id, 50, rank).await.unwrap();
        }
        let feed = ForYouFeed::with_limit(Arc::new(store), 3);
        assert_eq!(ids(&feed.load(Some("me")).await), vec!["e0", "e1", "e2"]);
    }

    #[tokio::test]
    async fn backend_failure_degrades_to_placeholder() {
        let feed = ForYouFeed::new(Arc::new(FailingStore::unreachable(memory_store().await)));
        assert_eq!(feed.load(Some("me")).await, ForYouSection::Placeholder);
    }
}
