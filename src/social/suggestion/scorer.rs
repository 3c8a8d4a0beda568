//! 候选人计数与排序（纯函数，不访问存储）

use crate::social::models::User;
use crate::social::suggestion::models::{ScoreWeights, SuggestedUser};
use std::collections::{HashMap, HashSet};

/// 按 id 计数，同一 (id, 来源) 只记一次，并保留首次出现顺序
#[derive(Debug, Default, Clone)]
pub struct Tally {
    counts: HashMap<String, u32>,
    order: Vec<String>,
    seen: HashSet<(String, String)>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// 记一次 `id`（经由 `via`：活动 id 或中间好友 id）
    pub fn add(&mut self, id: &str, via: &str) {
        if !self.seen.insert((id.to_string(), via.to_string())) {
            return;
        }
        if !self.counts.contains_key(id) {
            self.order.push(id.to_string());
        }
        *self.counts.entry(id.to_string()).or_insert(0) += 1;
    }

    pub fn get(&self, id: &str) -> u32 {
        self.counts.get(id).copied().unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// 按首次出现顺序返回 id
    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn counts(&self) -> &HashMap<String, u32> {
        &self.counts
    }
}

/// 合并两组候选 id（去重，先 a 后 b）
pub fn union_candidates(a: &Tally, b: &Tally) -> Vec<String> {
    let mut seen = HashSet::new();
    a.ids()
        .iter()
        .chain(b.ids())
        .filter(|id| seen.insert(id.as_str()))
        .cloned()
        .collect()
}

/// 打分并排序
///
/// 分数高的在前；分数相同保持 `profiles` 中的原始顺序（稳定排序）。
/// 结果截断到 `limit`，分数不出现在输出中。
pub fn rank_candidates(
    profiles: Vec<User>,
    common_events: &HashMap<String, u32>,
    mutual_friends: &HashMap<String, u32>,
    city: Option<&str>,
    weights: &ScoreWeights,
    limit: usize,
) -> Vec<SuggestedUser> {
    let mut scored: Vec<(u32, SuggestedUser)> = profiles
        .into_iter()
        .map(|user| {
            let events = common_events.get(&user.id).copied().unwrap_or(0);
            let mutual = mutual_friends.get(&user.id).copied().unwrap_or(0);
            let same_city = matches!((city, user.city.as_deref()), (Some(want), Some(have)) if want == have);
            let score = weights.score(events, mutual, same_city);
            (
                score,
                SuggestedUser {
                    user,
                    mutual_friends: mutual,
                    common_events: events,
                },
            )
        })
        .collect();

    // slice::sort_by 是稳定排序
    scored.sort_by(|a, b| b.0.cmp(&a.0));
    scored.into_iter().take(limit).map(|(_, s)| s).collect()
}
