//! 实时变更监听器回调接口

use crate::social::realtime::hub::Topic;
use async_trait::async_trait;

/// 实时变更监听器（行变更、深链接打开等）
#[async_trait]
pub trait ChangeListener: Send + Sync {
    /// 收到变更，`payload` 为 JSON 字符串
    async fn on_change(&self, topic: &Topic, payload: String);
}

/// 默认空实现（无操作）
pub struct EmptyChangeListener;

#[async_trait]
impl ChangeListener for EmptyChangeListener {
    async fn on_change(&self, _topic: &Topic, _payload: String) {}
}
