//! 好友推荐服务层
//!
//! 组合关注关系、共同报名、同城三路信号，为当前用户生成"可能认识的人"列表。
//! 每一路信号拉取失败都只记录日志并按空数据处理，永远不向调用方返回错误。

use crate::social::models::{
    connection_status, rsvp_status, tables, Connection, EventParticipation, User,
};
use crate::social::store::{fetch_or_empty, RemoteStore, RowQuery};
use crate::social::suggestion::models::{SuggestedUser, SuggestionConfig};
use crate::social::suggestion::scorer::{rank_candidates, union_candidates, Tally};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info};

/// 好友推荐器
pub struct FriendSuggester {
    store: Arc<dyn RemoteStore>,
    config: SuggestionConfig,
}

impl FriendSuggester {
    /// 使用默认配置创建
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self::with_config(store, SuggestionConfig::default())
    }

    pub fn with_config(store: Arc<dyn RemoteStore>, config: SuggestionConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &SuggestionConfig {
        &self.config
    }

    /// 生成推荐列表
    ///
    /// - `user_id` 为空：直接返回空列表，不发起任何请求
    /// - 图关系与共同活动都没有候选人：退化为同城（或任意城市）用户，计数全为 0
    /// - 否则按分数降序返回前 `limit` 个
    pub async fn suggest(
        &self,
        user_id: Option<&str>,
        city: Option<&str>,
        limit: Option<usize>,
    ) -> Vec<SuggestedUser> {
        let me = match user_id {
            Some(id) if !id.is_empty() => id,
            _ => {
                debug!("[Suggest] 未登录，跳过推荐");
                return Vec::new();
            }
        };
        let limit = limit.unwrap_or(self.config.default_limit);
        if limit == 0 {
            return Vec::new();
        }

        info!(
            "[Suggest] 🔄 开始计算推荐，用户ID: {}, 城市: {:?}, 条数: {}",
            me, city, limit
        );

        // 1. 排除集合 = 自己 + 已关注
        let followees = self.followee_ids(me).await;
        let mut exclusion: HashSet<String> = followees.iter().cloned().collect();
        exclusion.insert(me.to_string());
        let excluded = sorted_ids(&exclusion);

        // 2-3. 共同报名
        let event_ids = self.rsvp_event_ids(me).await;
        let common_events = if event_ids.is_empty() {
            Tally::new()
        } else {
            self.common_event_tally(&event_ids, &exclusion, &excluded)
                .await
        };

        // 4. 共同关注（好友的好友）
        let mutual_friends = if followees.is_empty() {
            Tally::new()
        } else {
            self.mutual_friend_tally(&followees, &exclusion, &excluded)
                .await
        };

        // 5. 候选池
        let candidates = union_candidates(&common_events, &mutual_friends);
        debug!(
            "[Suggest]   共同活动候选: {}, 共同关注候选: {}, 合并后: {}",
            common_events.len(),
            mutual_friends.len(),
            candidates.len()
        );
        if candidates.is_empty() {
            return self.city_fallback(city, &excluded, limit).await;
        }

        // 6. 截断候选池后拉取资料
        let capped: Vec<String> = candidates
            .into_iter()
            .take(self.config.candidate_cap)
            .collect();
        let profiles = self.profiles_in_order(&capped).await;

        // 7. 打分排序
        let ranked = rank_candidates(
            profiles,
            common_events.counts(),
            mutual_friends.counts(),
            city,
            &self.config.weights,
            limit,
        );
        info!("[Suggest] ✅ 推荐完成，返回 {} 人", ranked.len());
        ranked
    }

    /// 当前用户已关注的 id（不区分状态）
    async fn followee_ids(&self, me: &str) -> Vec<String> {
        let q = RowQuery::table(tables::CONNECTIONS).eq("follower_id", me);
        let rows: Vec<Connection> = fetch_or_empty(self.store.as_ref(), &q, "已关注列表").await;
        let mut seen = HashSet::new();
        rows.into_iter()
            .map(|c| c.following_id)
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// 当前用户报名（going）的活动 id
    async fn rsvp_event_ids(&self, me: &str) -> Vec<String> {
        let q = RowQuery::table(tables::EVENT_RSVPS)
            .eq("user_id", me)
            .eq("status", rsvp_status::GOING);
        let rows: Vec<EventParticipation> =
            fetch_or_empty(self.store.as_ref(), &q, "我的报名").await;
        let mut seen = HashSet::new();
        rows.into_iter()
            .map(|p| p.event_id)
            .filter(|id| seen.insert(id.clone()))
            .collect()
    }

    /// 同场活动的其他报名者，按活动数计数
    async fn common_event_tally(
        &self,
        event_ids: &[String],
        exclusion: &HashSet<String>,
        excluded: &[String],
    ) -> Tally {
        let q = RowQuery::table(tables::EVENT_RSVPS)
            .in_list("event_id", event_ids.iter().map(String::as_str))
            .eq("status", rsvp_status::GOING)
            .not_in("user_id", excluded.iter().map(String::as_str));
        let rows: Vec<EventParticipation> =
            fetch_or_empty(self.store.as_ref(), &q, "同场报名者").await;

        let mut tally = Tally::new();
        for p in rows.iter().filter(|p| !exclusion.contains(&p.user_id)) {
            tally.add(&p.user_id, &p.event_id);
        }
        tally
    }

    /// 已关注用户的关注对象（active），按中间好友数计数
    async fn mutual_friend_tally(
        &self,
        followees: &[String],
        exclusion: &HashSet<String>,
        excluded: &[String],
    ) -> Tally {
        let q = RowQuery::table(tables::CONNECTIONS)
            .in_list("follower_id", followees.iter().map(String::as_str))
            .eq("status", connection_status::ACTIVE)
            .not_in("following_id", excluded.iter().map(String::as_str));
        let rows: Vec<Connection> = fetch_or_empty(self.store.as_ref(), &q, "好友的关注").await;

        let mut tally = Tally::new();
        for c in rows
            .iter()
            .filter(|c| c.is_active() && !exclusion.contains(&c.following_id))
        {
            tally.add(&c.following_id, &c.follower_id);
        }
        tally
    }

    /// 按候选顺序返回资料（缺失的候选直接跳过）
    async fn profiles_in_order(&self, ids: &[String]) -> Vec<User> {
        let q = RowQuery::table(tables::PROFILES).in_list("id", ids.iter().map(String::as_str));
        let rows: Vec<User> = fetch_or_empty(self.store.as_ref(), &q, "候选人资料").await;
        let mut by_id: HashMap<String, User> =
            rows.into_iter().map(|u| (u.id.clone(), u)).collect();
        ids.iter().filter_map(|id| by_id.remove(id)).collect()
    }

    /// 无候选时的降级：同城（未指定城市则任意城市）的其他用户
    async fn city_fallback(
        &self,
        city: Option<&str>,
        excluded: &[String],
        limit: usize,
    ) -> Vec<SuggestedUser> {
        let mut q = RowQuery::table(tables::PROFILES)
            .not_in("id", excluded.iter().map(String::as_str))
            .limit(limit);
        if let Some(city) = city {
            q = q.eq("city", city);
        }
        let rows: Vec<User> = fetch_or_empty(self.store.as_ref(), &q, "同城用户").await;
        let result: Vec<SuggestedUser> = rows
            .into_iter()
            .filter(|u| !excluded.contains(&u.id))
            .take(limit)
            .map(SuggestedUser::unscored)
            .collect();
        info!(
            "[Suggest] 无图关系候选，降级为同城推荐，返回 {} 人",
            result.len()
        );
        result
    }
}

fn sorted_ids(set: &HashSet<String>) -> Vec<String> {
    let mut ids: Vec<String> = set.iter().cloned().collect();
    ids.sort();
    ids
}
