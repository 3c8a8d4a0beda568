//! 托管后端 HTTP 客户端（PostgREST 风格）
//!
//! 负责把 `RowQuery` 编码为查询参数并请求 `/rest/v1/{table}`，
//! RPC 走 `/rest/v1/rpc/{name}`。

use crate::social::store::query::{Filter, RowQuery};
use crate::social::store::RemoteStore;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info};
use uuid::Uuid;

/// REST 存储配置
#[derive(Clone, Debug)]
pub struct RestStoreConfig {
    /// 后端基础地址，例如 `https://xyz.backend.example`
    pub api_base_url: String,
    /// 项目公开 key
    pub api_key: String,
    /// 登录后的访问 token，未登录时使用 api_key
    pub access_token: Option<String>,
}

impl RestStoreConfig {
    pub fn new(api_base_url: String, api_key: String) -> Self {
        Self {
            api_base_url,
            api_key,
            access_token: None,
        }
    }
}

/// 基于 reqwest 的远端存储
pub struct RestStore {
    client: reqwest::Client,
    api_base_url: String,
}

impl RestStore {
    /// 创建 REST 存储（认证头通过 default_headers 自动添加）
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let bearer = format!(
            "Bearer {}",
            config.access_token.as_deref().unwrap_or(&config.api_key)
        );
        let client = reqwest::ClientBuilder::new()
            .default_headers({
                let mut headers = reqwest::header::HeaderMap::new();
                headers.insert(
                    reqwest::header::HeaderName::from_static("apikey"),
                    reqwest::header::HeaderValue::from_str(&config.api_key)
                        .context("无效的 api key")?,
                );
                headers.insert(
                    reqwest::header::AUTHORIZATION,
                    reqwest::header::HeaderValue::from_str(&bearer)
                        .context("无效的 access token")?,
                );
                headers
            })
            .build()
            .context("创建 HTTP 客户端失败")?;

        info!("[RestStore] 创建 REST 存储: {}", config.api_base_url);
        Ok(Self {
            client,
            api_base_url: config.api_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: &str) -> String {
        format!("{}/rest/v1/{}", self.api_base_url, table)
    }

    fn rpc_url(&self, name: &str) -> String {
        format!("{}/rest/v1/rpc/{}", self.api_base_url, name)
    }

    /// 读取响应并检查状态码，返回解析后的 JSON
    async fn read_json(response: reqwest::Response, operation_name: &str) -> Result<Value> {
        let status = response.status();
        let body_bytes = response.bytes().await.context("读取响应 body 失败")?;
        let body_str = String::from_utf8_lossy(&body_bytes);
        debug!("[RestStore] {}响应 Body: {}", operation_name, body_str);

        if !status.is_success() {
            error!(
                "[RestStore] {}请求失败，HTTP状态: {}, 响应: {}",
                operation_name, status, body_str
            );
            return Err(anyhow::anyhow!("HTTP 错误 {}: {}", status, body_str));
        }

        if body_bytes.is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&body_bytes).map_err(|e| {
            error!(
                "[RestStore] {}反序列化失败: {:?}\n原始响应: {}",
                operation_name, e, body_str
            );
            anyhow::anyhow!("反序列化响应失败: {:?}", e)
        })
    }
}

/// 把 JSON 值编码为 PostgREST 参数值
fn encode_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// 列表值需要加引号，避免值中的逗号被当成分隔符
fn encode_list(values: &[Value]) -> String {
    let items: Vec<String> = values
        .iter()
        .map(|v| match v {
            Value::String(s) => format!("\"{}\"", s.replace('"', "\\\"")),
            other => encode_value(other),
        })
        .collect();
    format!("({})", items.join(","))
}

/// 把 `RowQuery` 编码为查询参数
pub(crate) fn encode_query(query: &RowQuery) -> Vec<(String, String)> {
    let mut params = vec![("select".to_string(), "*".to_string())];
    for filter in &query.filters {
        let value = match filter {
            Filter::Eq(_, v) => format!("eq.{}", encode_value(v)),
            Filter::Neq(_, v) => format!("neq.{}", encode_value(v)),
            Filter::In(_, vs) => format!("in.{}", encode_list(vs)),
            Filter::NotIn(_, vs) => format!("not.in.{}", encode_list(vs)),
            Filter::Gt(_, v) => format!("gt.{}", encode_value(v)),
            Filter::Gte(_, v) => format!("gte.{}", encode_value(v)),
            Filter::Lt(_, v) => format!("lt.{}", encode_value(v)),
            Filter::Lte(_, v) => format!("lte.{}", encode_value(v)),
        };
        params.push((filter.column().to_string(), value));
    }
    if let Some((column, order)) = &query.order {
        params.push(("order".to_string(), format!("{}.{}", column, order.as_str())));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

#[async_trait]
impl RemoteStore for RestStore {
    async fn query_rows(&self, query: &RowQuery) -> Result<Vec<Value>> {
        let operation_id = Uuid::new_v4().to_string();
        let url = self.table_url(&query.table);
        let params = encode_query(query);

        info!("[RestStore] 📡 查询 {}", query.table);
        debug!("[RestStore]   请求URL: {}, 参数: {:?}", url, params);
        debug!("[RestStore]   操作ID: {}", operation_id);

        let response = self
            .client
            .get(&url)
            .header("Accept", "application/json")
            .header("operationID", &operation_id)
            .query(&params)
            .send()
            .await
            .context("请求失败")?;

        match Self::read_json(response, &format!("查询 {} ", query.table)).await? {
            Value::Array(rows) => {
                info!("[RestStore] ✅ {} 返回 {} 行", query.table, rows.len());
                Ok(rows)
            }
            Value::Null => Ok(Vec::new()),
            other => Err(anyhow::anyhow!("期望 JSON 数组，实际为: {}", other)),
        }
    }

    async fn rpc_call(&self, name: &str, args: Value) -> Result<Value> {
        let operation_id = Uuid::new_v4().to_string();
        let url = self.rpc_url(name);

        info!("[RestStore] 📡 调用 RPC {}", name);
        debug!("[RestStore]   请求URL: {}, 操作ID: {}", url, operation_id);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("operationID", &operation_id)
            .json(&args)
            .send()
            .await
            .context("请求失败")?;

        Self::read_json(response, &format!("RPC {} ", name)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::social::store::query::Order;

    #[test]
    fn encodes_postgrest_filters() {
        let q = RowQuery::table("event_rsvps")
            .in_list("event_id", ["e1", "e,2"])
            .not_in("user_id", ["me"])
            .eq("status", "going")
            .gte("start_time", "2024-01-01T22:00:00.000Z")
            .eq("is_active", true)
            .order_by("start_time", Order::Asc)
            .limit(10);

        let params = encode_query(&q);
        assert_eq!(
            params,
            vec![
                ("select".to_string(), "*".to_string()),
                ("event_id".to_string(), "in.(\"e1\",\"e,2\")".to_string()),
                ("user_id".to_string(), "not.in.(\"me\")".to_string()),
                ("status".to_string(), "eq.going".to_string()),
                (
                    "start_time".to_string(),
                    "gte.2024-01-01T22:00:00.000Z".to_string()
                ),
                ("is_active".to_string(), "eq.true".to_string()),
                ("order".to_string(), "start_time.asc".to_string()),
                ("limit".to_string(), "10".to_string()),
            ]
        );
    }

    #[test]
    fn trims_trailing_slash_from_base_url() {
        let store = RestStore::new(RestStoreConfig::new(
            "https://api.example.com/".to_string(),
            "anon".to_string(),
        ))
        .unwrap();
        assert_eq!(
            store.table_url("profiles"),
            "https://api.example.com/rest/v1/profiles"
        );
        assert_eq!(
            store.rpc_url("increment_counter"),
            "https://api.example.com/rest/v1/rpc/increment_counter"
        );
    }
}
