//! 订阅中心：按主题登记监听器，分发变更

use crate::social::realtime::deeplink::DeepLink;
use crate::social::realtime::listener::ChangeListener;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use tracing::{debug, info, warn};

/// 订阅主题
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    /// 某张表的行变更
    Table(String),
    /// 深链接打开
    DeepLink,
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    entries: HashMap<Topic, Vec<(u64, Arc<dyn ChangeListener>)>>,
}

fn lock(registry: &Mutex<Registry>) -> MutexGuard<'_, Registry> {
    registry.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// 订阅中心
#[derive(Clone, Default)]
pub struct RealtimeHub {
    registry: Arc<Mutex<Registry>>,
}

impl RealtimeHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// 订阅主题；返回的句柄被释放时自动取消
    pub fn subscribe(&self, topic: Topic, listener: Arc<dyn ChangeListener>) -> Subscription {
        let mut registry = lock(&self.registry);
        registry.next_id += 1;
        let id = registry.next_id;
        registry
            .entries
            .entry(topic.clone())
            .or_default()
            .push((id, listener));
        debug!("[Realtime] 订阅 {:?}，订阅ID: {}", topic, id);

        Subscription {
            id,
            topic,
            registry: Arc::downgrade(&self.registry),
            released: false,
        }
    }

    /// 当前主题上的监听器数
    pub fn listener_count(&self, topic: &Topic) -> usize {
        lock(&self.registry)
            .entries
            .get(topic)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// 分发变更，返回送达的监听器数
    pub async fn publish(&self, topic: &Topic, payload: &str) -> usize {
        // 先复制一份监听器列表，回调期间不持有锁
        let listeners: Vec<Arc<dyn ChangeListener>> = lock(&self.registry)
            .entries
            .get(topic)
            .map(|list| list.iter().map(|(_, l)| l.clone()).collect())
            .unwrap_or_default();

        for listener in &listeners {
            listener.on_change(topic, payload.to_string()).await;
        }
        debug!("[Realtime] {:?} 分发给 {} 个监听器", topic, listeners.len());
        listeners.len()
    }

    /// 解析深链接并分发；无法识别的链接返回 None
    pub async fn open_deep_link(&self, uri: &str) -> Option<DeepLink> {
        let Some(link) = DeepLink::parse(uri) else {
            warn!("[Realtime] 无法识别的深链接: {}", uri);
            return None;
        };
        match serde_json::to_string(&link) {
            Ok(json) => {
                info!("[Realtime] 打开深链接: {}", uri);
                self.publish(&Topic::DeepLink, &json).await;
            }
            Err(e) => warn!("[Realtime] 序列化深链接失败: {:?}", e),
        }
        Some(link)
    }
}

/// 订阅句柄
pub struct Subscription {
    id: u64,
    topic: Topic,
    registry: Weak<Mutex<Registry>>,
    released: bool,
}

impl Subscription {
    pub fn topic(&self) -> &Topic {
        &self.topic
    }

    /// 主动取消订阅
    pub fn unsubscribe(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        // 订阅中心已销毁时无需处理
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut guard = lock(&registry);
        if let Some(list) = guard.entries.get_mut(&self.topic) {
            list.retain(|(id, _)| *id != self.id);
            if list.is_empty() {
                guard.entries.remove(&self.topic);
            }
        }
        debug!("[Realtime] 取消订阅 {:?}，订阅ID: {}", self.topic, self.id);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<(Topic, String)>>,
    }

    #[async_trait]
    impl ChangeListener for Recorder {
        async fn on_change(&self, topic: &Topic, payload: String) {
            self.seen.lock().unwrap().push((topic.clone(), payload));
        }
    }

    fn events_topic() -> Topic {
        Topic::Table("events".to_string())
    }

    #[tokio::test]
    async fn delivers_only_to_matching_topic() {
        let hub = RealtimeHub::new();
        let rec = Arc::new(Recorder::default());
        let _events = hub.subscribe(events_topic(), rec.clone());
        let _other = hub.subscribe(Topic::Table("profiles".into()), Arc::new(Recorder::default()));

        assert_eq!(hub.publish(&events_topic(), r#"{"id":"e1"}"#).await, 1);
        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[(events_topic(), r#"{"id":"e1"}"#.to_string())]);
    }

    #[tokio::test]
    async fn dropping_handle_releases_subscription() {
        let hub = RealtimeHub::new();
        let rec = Arc::new(Recorder::default());
        {
            let _sub = hub.subscribe(events_topic(), rec.clone());
            assert_eq!(hub.listener_count(&events_topic()), 1);
        }
        assert_eq!(hub.listener_count(&events_topic()), 0);
        assert_eq!(hub.publish(&events_topic(), "{}").await, 0);
        assert!(rec.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unsubscribe_removes_only_its_own_listener() {
        let hub = RealtimeHub::new();
        let first = hub.subscribe(events_topic(), Arc::new(Recorder::default()));
        let _second = hub.subscribe(events_topic(), Arc::new(Recorder::default()));
        assert_eq!(first.topic(), &events_topic());

        first.unsubscribe();
        assert_eq!(hub.listener_count(&events_topic()), 1);
    }

    #[test]
    fn handle_outliving_hub_is_harmless() {
        let hub = RealtimeHub::new();
        let sub = hub.subscribe(Topic::DeepLink, Arc::new(Recorder::default()));
        drop(hub);
        drop(sub);
    }

    #[tokio::test]
    async fn deep_links_are_parsed_and_published() {
        let hub = RealtimeHub::new();
        let rec = Arc::new(Recorder::default());
        let _sub = hub.subscribe(Topic::DeepLink, rec.clone());

        let link = hub.open_deep_link("laten://event/abc").await;
        assert_eq!(link, Some(DeepLink::Event("abc".into())));
        assert!(hub.open_deep_link("laten://nowhere").await.is_none());

        let seen = rec.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, r#"{"kind":"event","id":"abc"}"#);
    }
}
