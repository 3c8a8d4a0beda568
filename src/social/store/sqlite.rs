//! 本地 SQLite 镜像存储
//!
//! 实现与托管后端相同的 `RemoteStore` 语义：表名和列名走白名单，
//! 查询结果用 `json_object(...)` 投影成 JSON 行。
//! 同时提供写入镜像数据的 upsert 接口（演示数据导入、测试夹具）。

use crate::social::db::create_sqlite_pool_with_migration;
use crate::social::models::{
    format_timestamp, tables, Connection, Event, EventParticipation, User, UserPreference,
};
use crate::social::store::query::{Filter, RowQuery};
use crate::social::store::{rpc, RemoteStore};
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use sqlx::{Pool, QueryBuilder, Row, Sqlite};
use tracing::{debug, info};

/// 可查询的表及其列（白名单）
const TABLE_COLUMNS: &[(&str, &[&str])] = &[
    (tables::PROFILES, &["id", "display_name", "avatar_url", "city"]),
    (tables::CONNECTIONS, &["follower_id", "following_id", "status"]),
    (tables::EVENT_RSVPS, &["user_id", "event_id", "status"]),
    (
        tables::EVENTS,
        &["id", "title", "venue", "city", "start_time", "is_active"],
    ),
    (
        tables::USER_PREFERENCES,
        &["user_id", "favorite_genres", "favorite_city"],
    ),
];

fn table_columns(table: &str) -> Result<&'static [&'static str]> {
    TABLE_COLUMNS
        .iter()
        .find(|(name, _)| *name == table)
        .map(|(_, columns)| *columns)
        .ok_or_else(|| anyhow::anyhow!("未知的表: {}", table))
}

fn check_column(table: &str, columns: &[&str], column: &str) -> Result<()> {
    if !columns.contains(&column) {
        bail!("表 {} 不存在列: {}", table, column);
    }
    Ok(())
}

fn push_value<'a>(qb: &mut QueryBuilder<'a, Sqlite>, value: &Value) -> Result<()> {
    match value {
        Value::String(s) => {
            qb.push_bind(s.clone());
        }
        Value::Bool(b) => {
            qb.push_bind(i64::from(*b));
        }
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                qb.push_bind(i);
            } else if let Some(f) = n.as_f64() {
                qb.push_bind(f);
            } else {
                bail!("不支持的数值: {}", n);
            }
        }
        other => bail!("不支持的过滤值: {}", other),
    }
    Ok(())
}

fn push_list<'a>(
    qb: &mut QueryBuilder<'a, Sqlite>,
    column: &str,
    values: &[Value],
    negate: bool,
) -> Result<()> {
    if values.is_empty() {
        // 空列表：IN () 恒假，NOT IN () 恒真
        qb.push(if negate { "1 = 1" } else { "1 = 0" });
        return Ok(());
    }
    qb.push(column);
    qb.push(if negate { " NOT IN (" } else { " IN (" });
    for (i, v) in values.iter().enumerate() {
        if i > 0 {
            qb.push(", ");
        }
        push_value(qb, v)?;
    }
    qb.push(")");
    Ok(())
}

/// 把 `RowQuery` 编译为参数化 SQL
pub(crate) fn build_select(query: &RowQuery) -> Result<QueryBuilder<'static, Sqlite>> {
    let columns = table_columns(&query.table)?;

    let projection = columns
        .iter()
        .map(|c| format!("'{}', {}", c, c))
        .collect::<Vec<_>>()
        .join(", ");
    let mut qb = QueryBuilder::new(format!(
        "SELECT json_object({}) AS row FROM {}",
        projection, query.table
    ));

    for (i, filter) in query.filters.iter().enumerate() {
        let column = filter.column();
        check_column(&query.table, columns, column)?;
        qb.push(if i == 0 { " WHERE " } else { " AND " });
        match filter {
            Filter::In(_, values) => push_list(&mut qb, column, values, false)?,
            Filter::NotIn(_, values) => push_list(&mut qb, column, values, true)?,
            Filter::Eq(_, v)
            | Filter::Neq(_, v)
            | Filter::Gt(_, v)
            | Filter::Gte(_, v)
            | Filter::Lt(_, v)
            | Filter::Lte(_, v) => {
                let op = match filter {
                    Filter::Eq(..) => " = ",
                    Filter::Neq(..) => " <> ",
                    Filter::Gt(..) => " > ",
                    Filter::Gte(..) => " >= ",
                    Filter::Lt(..) => " < ",
                    _ => " <= ",
                };
                qb.push(column);
                qb.push(op);
                push_value(&mut qb, v)?;
            }
        }
    }

    if let Some((column, order)) = &query.order {
        check_column(&query.table, columns, column)?;
        qb.push(format!(" ORDER BY {} {}", column, order.as_str().to_uppercase()));
    }
    if let Some(limit) = query.limit {
        qb.push(" LIMIT ");
        qb.push_bind(limit as i64);
    }
    Ok(qb)
}

/// SQLite 镜像存储
#[derive(Clone)]
pub struct SqliteStore {
    db: Pool<Sqlite>,
}

impl SqliteStore {
    /// 使用已有连接池创建
    pub fn new(db: Pool<Sqlite>) -> Self {
        Self { db }
    }

    /// 连接数据库并执行迁移
    pub async fn connect(db_url: &str) -> Result<Self> {
        let db = create_sqlite_pool_with_migration(db_url).await?;
        Ok(Self::new(db))
    }

    /// 底层连接池
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.db
    }

    /// 插入或更新用户资料
    pub async fn upsert_profile(&self, user: &User) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO profiles (id, display_name, avatar_url, city)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                display_name = excluded.display_name,
                avatar_url = excluded.avatar_url,
                city = excluded.city
            "#,
        )
        .bind(&user.id)
        .bind(&user.display_name)
        .bind(&user.avatar_url)
        .bind(&user.city)
        .execute(&self.db)
        .await
        .context("插入或更新用户资料失败")?;
        Ok(())
    }

    /// 插入或更新关注关系
    pub async fn upsert_connection(&self, c: &Connection) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO connections (follower_id, following_id, status)
            VALUES (?, ?, ?)
            ON CONFLICT(follower_id, following_id) DO UPDATE SET
                status = excluded.status
            "#,
        )
        .bind(&c.follower_id)
        .bind(&c.following_id)
        .bind(&c.status)
        .execute(&self.db)
        .await
        .context("插入或更新关注关系失败")?;
        Ok(())
    }

    /// 插入或更新活动报名
    pub async fn upsert_rsvp(&self, p: &EventParticipation) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_rsvps (user_id, event_id, status)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id, event_id) DO UPDATE SET
                status = excluded.status
            "#,
        )
        .bind(&p.user_id)
        .bind(&p.event_id)
        .bind(&p.status)
        .execute(&self.db)
        .await
        .context("插入或更新活动报名失败")?;
        Ok(())
    }

    /// 插入或更新活动
    pub async fn upsert_event(&self, e: &Event) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO events (id, title, venue, city, start_time, is_active)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                venue = excluded.venue,
                city = excluded.city,
                start_time = excluded.start_time,
                is_active = excluded.is_active
            "#,
        )
        .bind(&e.id)
        .bind(&e.title)
        .bind(&e.venue)
        .bind(&e.city)
        .bind(format_timestamp(&e.start_time))
        .bind(if e.is_active { 1 } else { 0 })
        .execute(&self.db)
        .await
        .context("插入或更新活动失败")?;
        Ok(())
    }

    /// 插入或更新用户偏好
    pub async fn upsert_preference(&self, p: &UserPreference) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO user_preferences (user_id, favorite_genres, favorite_city)
            VALUES (?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                favorite_genres = excluded.favorite_genres,
                favorite_city = excluded.favorite_city
            "#,
        )
        .bind(&p.user_id)
        .bind(&p.favorite_genres)
        .bind(&p.favorite_city)
        .execute(&self.db)
        .await
        .context("插入或更新用户偏好失败")?;
        Ok(())
    }

    /// 写入一条服务端个性化推荐结果
    pub async fn upsert_recommendation(
        &self,
        user_id: &str,
        event_id: &str,
        relevance_score: i64,
        rank: i64,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO event_recommendations (user_id, event_id, relevance_score, rank)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id, event_id) DO UPDATE SET
                relevance_score = excluded.relevance_score,
                rank = excluded.rank
            "#,
        )
        .bind(user_id)
        .bind(event_id)
        .bind(relevance_score)
        .bind(rank)
        .execute(&self.db)
        .await
        .context("写入个性化推荐失败")?;
        Ok(())
    }

    /// 读取计数器当前值（不存在时为 0）
    pub async fn counter_value(&self, counter: &str, target_id: &str) -> Result<i64> {
        let value: Option<i64> = sqlx::query_scalar(
            "SELECT value FROM analytics_counters WHERE counter = ? AND target_id = ?",
        )
        .bind(counter)
        .bind(target_id)
        .fetch_optional(&self.db)
        .await
        .context("查询计数器失败")?;
        Ok(value.unwrap_or(0))
    }

    async fn rpc_personalized_events(&self, args: &Value) -> Result<Value> {
        let user_id = args
            .get("user_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("缺少参数 user_id"))?;
        let limit = args.get("limit").and_then(Value::as_i64).unwrap_or(20);

        let rows = sqlx::query(
            r#"
            SELECT json_object(
                'id', e.id,
                'title', e.title,
                'venue', e.venue,
                'city', e.city,
                'start_time', e.start_time,
                'is_active', e.is_active,
                'relevanceScore', r.relevance_score
            ) AS row
            FROM event_recommendations r
            JOIN events e ON e.id = r.event_id
            WHERE r.user_id = ?
            ORDER BY r.rank ASC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await
        .context("查询个性化推荐失败")?;

        let events = rows
            .into_iter()
            .map(|r| {
                let raw: String = r.get("row");
                serde_json::from_str::<Value>(&raw).context("解析推荐行失败")
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Value::Array(events))
    }

    async fn rpc_increment_counter(&self, args: &Value) -> Result<Value> {
        let counter = args
            .get("counter")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("缺少参数 counter"))?;
        let target_id = args
            .get("target_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("缺少参数 target_id"))?;

        let value: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO analytics_counters (counter, target_id, value)
            VALUES (?, ?, 1)
            ON CONFLICT(counter, target_id) DO UPDATE SET
                value = value + 1
            RETURNING value
            "#,
        )
        .bind(counter)
        .bind(target_id)
        .fetch_one(&self.db)
        .await
        .context("更新计数器失败")?;
        Ok(json!(value))
    }
}

#[async_trait]
impl RemoteStore for SqliteStore {
    async fn query_rows(&self, query: &RowQuery) -> Result<Vec<Value>> {
        let mut qb = build_select(query)?;
        debug!("[SqliteStore] SQL: {}", qb.sql());

        let rows = qb
            .build()
            .fetch_all(&self.db)
            .await
            .with_context(|| format!("查询 {} 失败", query.table))?;

        let values = rows
            .into_iter()
            .map(|r| {
                let raw: String = r.try_get("row")?;
                serde_json::from_str::<Value>(&raw).context("解析行 JSON 失败")
            })
            .collect::<Result<Vec<_>>>()?;

        debug!("[SqliteStore] {} 返回 {} 行", query.table, values.len());
        Ok(values)
    }

    async fn rpc_call(&self, name: &str, args: Value) -> Result<Value> {
        info!("[SqliteStore] 调用 RPC {}", name);
        match name {
            rpc::GET_PERSONALIZED_EVENTS => self.rpc_personalized_events(&args).await,
            rpc::INCREMENT_COUNTER => self.rpc_increment_counter(&args).await,
            other => bail!("未知的 RPC: {}", other),
        }
    }
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;
    use crate::social::store::fetch_rows;
    use crate::social::store::query::Order;

    #[tokio::test]
    async fn filters_orders_and_limits_rows() {
        let store = memory_store().await;
        add_users(
            &store,
            &[("a", Some("Berlin")), ("b", Some("Paris")), ("c", Some("Berlin")), ("d", None)],
        )
        .await;

        let q = RowQuery::table(tables::PROFILES)
            .eq("city", "Berlin")
            .not_in("id", ["a"])
            .order_by("id", Order::Asc);
        let users: Vec<User> = fetch_rows(&store, &q).await.unwrap();
        assert_eq!(
            users.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
            vec!["c"]
        );

        let q = RowQuery::table(tables::PROFILES)
            .in_list("id", ["a", "b", "d"])
            .order_by("id", Order::Desc)
            .limit(2);
        let users: Vec<User> = fetch_rows(&store, &q).await.unwrap();
        assert_eq!(
            users.iter().map(|u| u.id.as_str()).collect::<Vec<_>>(),
            vec!["d", "b"]
        );
    }

    #[tokio::test]
    async fn empty_lists_behave_like_postgrest() {
        let store = memory_store().await;
        add_users(&store, &[("a", None), ("b", None)]).await;

        let none = RowQuery::table(tables::PROFILES).in_list("id", Vec::<String>::new());
        assert!(store.query_rows(&none).await.unwrap().is_empty());

        let all = RowQuery::table(tables::PROFILES).not_in("id", Vec::<String>::new());
        assert_eq!(store.query_rows(&all).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn boolean_and_time_range_filters() {
        let store = memory_store().await;
        store
            .upsert_event(&event("early", "2024-01-01T20:00:00Z", true))
            .await
            .unwrap();
        store
            .upsert_event(&event("late", "2024-01-01T23:30:00Z", true))
            .await
            .unwrap();
        store
            .upsert_event(&event("off", "2024-01-01T23:00:00Z", false))
            .await
            .unwrap();

        let q = RowQuery::table(tables::EVENTS)
            .eq("is_active", true)
            .gte("start_time", "2024-01-01T22:00:00.000Z")
            .order_by("start_time", Order::Asc);
        let events: Vec<Event> = fetch_rows(&store, &q).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].id, "late");
        assert!(events[0].is_active);
    }

    #[tokio::test]
    async fn rejects_unknown_tables_and_columns() {
        let store = memory_store().await;
        let err = store
            .query_rows(&RowQuery::table("sqlite_master"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("未知的表"));

        let err = store
            .query_rows(&RowQuery::table(tables::PROFILES).eq("id; DROP TABLE profiles", "x"))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("不存在列"));
    }

    #[tokio::test]
    async fn increment_counter_rpc_accumulates() {
        let store = memory_store().await;
        let args = json!({ "counter": "event_view", "target_id": "e1" });
        assert_eq!(
            store.rpc_call(rpc::INCREMENT_COUNTER, args.clone()).await.unwrap(),
            json!(1)
        );
        assert_eq!(
            store.rpc_call(rpc::INCREMENT_COUNTER, args).await.unwrap(),
            json!(2)
        );
        assert_eq!(store.counter_value("event_view", "e1").await.unwrap(), 2);
        assert!(store.rpc_call("drop_everything", json!({})).await.is_err());
    }
}
