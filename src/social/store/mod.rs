//! 远端存储能力
//!
//! 业务层只依赖 `RemoteStore`：结构化行查询 + RPC 调用。
//! 托管后端走 `RestStore`，本地镜像和测试走 `SqliteStore`。

pub mod query;
pub mod rest;
pub mod sqlite;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

pub use query::{Filter, Order, RowQuery};
pub use rest::{RestStore, RestStoreConfig};
pub use sqlite::SqliteStore;

/// 后端 RPC 名称
pub mod rpc {
    pub const GET_PERSONALIZED_EVENTS: &str = "get_personalized_events";
    pub const INCREMENT_COUNTER: &str = "increment_counter";
}

/// 远端存储接口
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// 按条件查询行，每行是一个带字段名的 JSON 对象
    async fn query_rows(&self, query: &RowQuery) -> Result<Vec<Value>>;

    /// 调用具名 RPC
    async fn rpc_call(&self, name: &str, args: Value) -> Result<Value>;
}

/// 查询并反序列化为具体记录类型
pub async fn fetch_rows<T: DeserializeOwned>(
    store: &dyn RemoteStore,
    query: &RowQuery,
) -> Result<Vec<T>> {
    let rows = store.query_rows(query).await?;
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).with_context(|| format!("解析 {} 行失败", query.table))
        })
        .collect()
}

/// 查询失败时记录日志并按空数据处理
///
/// 单个信号拉取失败只降低结果质量，不中断整体计算。
pub async fn fetch_or_empty<T: DeserializeOwned>(
    store: &dyn RemoteStore,
    query: &RowQuery,
    step: &str,
) -> Vec<T> {
    match fetch_rows(store, query).await {
        Ok(rows) => {
            debug!("[Store] {} 返回 {} 行", step, rows.len());
            rows
        }
        Err(e) => {
            warn!("[Store] {} 拉取失败，按空数据处理: {:?}", step, e);
            Vec::new()
        }
    }
}
