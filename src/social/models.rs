//! 后端记录模型（用户、关注关系、报名、活动）

use crate::social::serialization::{deserialize_bool_or_int, deserialize_relevance};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// 表名
pub mod tables {
    pub const PROFILES: &str = "profiles";
    pub const CONNECTIONS: &str = "connections";
    pub const EVENT_RSVPS: &str = "event_rsvps";
    pub const EVENTS: &str = "events";
    pub const USER_PREFERENCES: &str = "user_preferences";
}

/// 关注关系状态
pub mod connection_status {
    pub const ACTIVE: &str = "active";
}

/// 报名状态
pub mod rsvp_status {
    pub const GOING: &str = "going";
}

/// 用户资料
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
}

/// 关注关系（follower → following 的有向边）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    pub follower_id: String,
    pub following_id: String,
    #[serde(default)]
    pub status: String,
}

impl Connection {
    pub fn is_active(&self) -> bool {
        self.status == connection_status::ACTIVE
    }
}

/// 活动报名（RSVP）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventParticipation {
    pub user_id: String,
    pub event_id: String,
    #[serde(default)]
    pub status: String,
}

/// 活动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default, deserialize_with = "deserialize_bool_or_int")]
    pub is_active: bool,
}

/// 带服务端相关度分数（0-100）的活动，顺序以服务端返回为准
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizedEvent {
    #[serde(flatten)]
    pub event: Event,
    #[serde(
        rename = "relevanceScore",
        alias = "relevance_score",
        default,
        deserialize_with = "deserialize_relevance"
    )]
    pub relevance_score: u8,
}

/// 今晚可去的活动（开始时间落在 [now, 今日结束] 内）
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TonightEvent {
    #[serde(flatten)]
    pub event: Event,
}

/// 个性化信号（用户偏好设置）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub user_id: String,
    #[serde(default)]
    pub favorite_genres: Option<String>,
    #[serde(default)]
    pub favorite_city: Option<String>,
}

/// 时间戳统一格式（毫秒精度、`Z` 结尾），远端比较与本地文本比较都依赖这一格式
pub fn format_timestamp(t: &DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn event_decodes_from_sqlite_row() {
        let ev: Event = serde_json::from_value(json!({
            "id": "e1",
            "title": "Warehouse",
            "venue": null,
            "city": "Berlin",
            "start_time": "2024-01-01T23:30:00.000Z",
            "is_active": 1
        }))
        .unwrap();
        assert!(ev.is_active);
        assert_eq!(format_timestamp(&ev.start_time), "2024-01-01T23:30:00.000Z");
    }

    #[test]
    fn personalized_event_keeps_flattened_event_fields() {
        let pe: PersonalizedEvent = serde_json::from_value(json!({
            "id": "e9",
            "title": "Rooftop",
            "start_time": "2024-01-02T20:00:00Z",
            "is_active": true,
            "relevanceScore": 87
        }))
        .unwrap();
        assert_eq!(pe.event.id, "e9");
        assert_eq!(pe.relevance_score, 87);
    }
}
