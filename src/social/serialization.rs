//! 后端字段反序列化工具
//!
//! 托管后端与本地 SQLite 镜像返回的 JSON 形态不完全一致（布尔值可能是 0/1，
//! 分数可能越界或为 null），这里统一做兼容处理。

use serde::{Deserialize, Deserializer};

/// 反序列化布尔字段，兼容 `true/false`、`0/1` 与 null（视为 false）
pub(crate) fn deserialize_bool_or_int<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrInt {
        Bool(bool),
        Int(i64),
    }

    let opt = Option::<BoolOrInt>::deserialize(deserializer)?;
    Ok(match opt {
        Some(BoolOrInt::Bool(b)) => b,
        Some(BoolOrInt::Int(i)) => i != 0,
        None => false,
    })
}

/// 反序列化相关度分数，截断到 0..=100（null 视为 0）
pub(crate) fn deserialize_relevance<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let opt = Option::<f64>::deserialize(deserializer)?;
    let raw = opt.unwrap_or(0.0);
    if raw.is_nan() {
        return Ok(0);
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}
