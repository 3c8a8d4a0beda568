//! 时钟抽象，"现在"由调用方注入，便于按设备本地时间计算与测试

use chrono::{DateTime, FixedOffset, Local};

pub trait Clock: Send + Sync {
    /// 带本地时区偏移的当前时间
    fn now(&self) -> DateTime<FixedOffset>;
}

/// 设备本地时间
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<FixedOffset> {
        Local::now().fixed_offset()
    }
}

/// 固定时间（测试、回放）
pub struct FixedClock(pub DateTime<FixedOffset>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<FixedOffset> {
        self.0
    }
}
