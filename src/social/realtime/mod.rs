//! 实时订阅模块
//!
//! 订阅返回 `Subscription` 句柄，句柄释放即取消订阅。

pub mod deeplink;
pub mod hub;
pub mod listener;

pub use deeplink::DeepLink;
pub use hub::{RealtimeHub, Subscription, Topic};
pub use listener::{ChangeListener, EmptyChangeListener};
