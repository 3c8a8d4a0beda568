//! 好友推荐模型定义

use crate::social::models::User;
use serde::{Deserialize, Serialize};

/// 推荐结果：用户资料 + 两个计数（排序分数不对外暴露）
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SuggestedUser {
    #[serde(flatten)]
    pub user: User,
    /// 共同关注（我关注的人中有多少人关注了他）
    pub mutual_friends: u32,
    /// 共同报名的活动数
    pub common_events: u32,
}

impl SuggestedUser {
    /// 降级路径使用：计数全为 0
    pub fn unscored(user: User) -> Self {
        Self {
            user,
            mutual_friends: 0,
            common_events: 0,
        }
    }
}

/// 打分权重
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreWeights {
    pub common_events: u32,
    pub mutual_friends: u32,
    pub same_city: u32,
}

impl Default for ScoreWeights {
    fn default() -> Self {
        Self {
            common_events: 3,
            mutual_friends: 2,
            same_city: 1,
        }
    }
}

impl ScoreWeights {
    /// score = w_events * common_events + w_mutual * mutual_friends + w_city * same_city
    ///
    /// 权重来自外部配置，溢出时饱和到 `u32::MAX`。
    pub fn score(&self, common_events: u32, mutual_friends: u32, same_city: bool) -> u32 {
        self.common_events
            .saturating_mul(common_events)
            .saturating_add(self.mutual_friends.saturating_mul(mutual_friends))
            .saturating_add(self.same_city.saturating_mul(u32::from(same_city)))
    }
}

/// 好友推荐配置
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SuggestionConfig {
    pub weights: ScoreWeights,
    /// 拉取资料前候选人数上限，用于限制查询开销
    pub candidate_cap: usize,
    /// 调用方未指定 limit 时的默认条数
    pub default_limit: usize,
}

impl Default for SuggestionConfig {
    fn default() -> Self {
        Self {
            weights: ScoreWeights::default(),
            candidate_cap: 20,
            default_limit: 5,
        }
    }
}
