pub mod analytics;
pub mod client;
pub mod clock;
pub mod db;
pub mod for_you;
pub mod models;
pub mod platform;
pub mod realtime;
pub mod serialization;
pub mod settings;
pub mod store;
pub mod suggestion;
pub mod tonight;

// 重新导出客户端相关类型
pub use client::{Backend, ClientConfig, ComposerConfig, HomeFeed, LatenClient};
