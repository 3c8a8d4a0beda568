//! 今晚精选：从现在到今天结束（设备本地时间）之间开始的活动
//!
//! "今天结束"固定为当天 23:59:59.999，不按场馆时区校正。
//! 23:59:59 开始的活动算今晚，次日 00:00:00 开始的不算。

use crate::social::clock::Clock;
use crate::social::models::{format_timestamp, tables, Event, TonightEvent};
use crate::social::store::{fetch_or_empty, Order, RemoteStore, RowQuery};
use chrono::{DateTime, FixedOffset, Utc};
use std::sync::Arc;
use tracing::info;

/// 默认最多返回的活动数
pub const DEFAULT_TONIGHT_LIMIT: usize = 10;

/// `now` 所在本地日期的 23:59:59.999（与 `now` 同一偏移）
pub fn end_of_day(now: &DateTime<FixedOffset>) -> DateTime<FixedOffset> {
    now.date_naive()
        .and_hms_milli_opt(23, 59, 59, 999)
        .and_then(|naive| naive.and_local_timezone(*now.offset()).single())
        .unwrap_or(*now)
}

/// 在给定活动中挑出今晚的：有效、开始时间在 [now, end_of_day]，按开始时间升序，最多 `limit` 个
pub fn select_tonight(
    events: Vec<Event>,
    now: &DateTime<FixedOffset>,
    limit: usize,
) -> Vec<TonightEvent> {
    let from = now.with_timezone(&Utc);
    let to = end_of_day(now).with_timezone(&Utc);

    let mut picked: Vec<Event> = events
        .into_iter()
        .filter(|e| e.is_active && e.start_time >= from && e.start_time <= to)
        .collect();
    picked.sort_by_key(|e| e.start_time);
    picked
        .into_iter()
        .take(limit)
        .map(|event| TonightEvent { event })
        .collect()
}

/// 今晚精选服务
pub struct TonightPicks {
    store: Arc<dyn RemoteStore>,
    clock: Arc<dyn Clock>,
    limit: usize,
}

impl TonightPicks {
    pub fn new(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>) -> Self {
        Self::with_limit(store, clock, DEFAULT_TONIGHT_LIMIT)
    }

    pub fn with_limit(store: Arc<dyn RemoteStore>, clock: Arc<dyn Clock>, limit: usize) -> Self {
        Self {
            store,
            clock,
            limit,
        }
    }

    /// 拉取今晚精选，失败时返回空列表
    pub async fn load(&self) -> Vec<TonightEvent> {
        let now = self.clock.now();
        let eod = end_of_day(&now);
        let q = RowQuery::table(tables::EVENTS)
            .eq("is_active", true)
            .gte("start_time", format_timestamp(&now.with_timezone(&Utc)))
            .lte("start_time", format_timestamp(&eod.with_timezone(&Utc)))
            .order_by("start_time", Order::Asc)
            .limit(self.limit);

        let events: Vec<Event> = fetch_or_empty(self.store.as_ref(), &q, "今晚活动").await;
        // 服务端已过滤，这里再按同一规则校验一遍
        let picks = select_tonight(events, &now, self.limit);
        info!(
            "[Tonight] 今晚精选 {} 个活动（{} ~ {}）",
            picks.len(),
            now,
            eod
        );
        picks
    }
}
