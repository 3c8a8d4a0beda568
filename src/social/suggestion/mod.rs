//! 好友推荐模块
//!
//! 根据共同报名、共同关注、同城三路信号为用户推荐可关注的人

pub mod models;
pub mod scorer;
pub mod service;

// 重新导出主要类型
pub use models::{ScoreWeights, SuggestedUser, SuggestionConfig};
pub use scorer::{rank_candidates, Tally};
pub use service::FriendSuggester;
