//! 深链接解析
//!
//! 支持 `laten://<kind>/<id>` 与 `https://<host>/<kind>/<id>` 两种形式，
//! kind 为 event / user / club。

use serde::Serialize;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum DeepLink {
    Event(String),
    User(String),
    Club(String),
}

pub const APP_SCHEME: &str = "laten";

impl DeepLink {
    pub fn parse(uri: &str) -> Option<Self> {
        let url = Url::parse(uri.trim()).ok()?;
        let path: Vec<&str> = url
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();

        // laten://event/e1 中 kind 落在 host 位置
        let (kind, id) = match url.scheme() {
            APP_SCHEME => match (url.host_str(), path.as_slice()) {
                (Some(kind), [id]) => (kind, *id),
                _ => return None,
            },
            "http" | "https" => match path.as_slice() {
                [kind, id] if url.host_str().is_some() => (*kind, *id),
                _ => return None,
            },
            _ => return None,
        };

        let id = id.to_string();
        match kind.to_ascii_lowercase().as_str() {
            "event" | "events" => Some(DeepLink::Event(id)),
            "user" | "users" | "profile" => Some(DeepLink::User(id)),
            "club" | "clubs" => Some(DeepLink::Club(id)),
            _ => None,
        }
    }
}
