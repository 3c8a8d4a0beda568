//! 埋点计数（通过后端 RPC 自增），失败只记日志

use crate::social::store::{rpc, RemoteStore};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, warn};

/// 计数器种类
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    EventView,
    ProfileView,
    TicketClick,
}

impl Counter {
    pub fn as_str(&self) -> &'static str {
        match self {
            Counter::EventView => "event_view",
            Counter::ProfileView => "profile_view",
            Counter::TicketClick => "ticket_click",
        }
    }
}

impl fmt::Display for Counter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

pub struct AnalyticsRecorder {
    store: Arc<dyn RemoteStore>,
}

impl AnalyticsRecorder {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self { store }
    }

    /// 自增计数器，返回是否成功
    pub async fn record(&self, counter: Counter, target_id: &str) -> bool {
        let args = json!({ "counter": counter.as_str(), "target_id": target_id });
        match self.store.rpc_call(rpc::INCREMENT_COUNTER, args).await {
            Ok(value) => {
                debug!("[Analytics] {} {} -> {}", counter, target_id, value);
                true
            }
            Err(e) => {
                warn!("[Analytics] 计数失败 {} {}: {:?}", counter, target_id, e);
                false
            }
        }
    }
}
