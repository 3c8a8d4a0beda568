//! 运行平台能力
//!
//! 启动时解析一次，之后作为配置传给各业务模块。

use anyhow::bail;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlatformCapabilities {
    #[default]
    Web,
    IosNative,
    AndroidNative,
}

impl PlatformCapabilities {
    pub fn is_native(&self) -> bool {
        !matches!(self, PlatformCapabilities::Web)
    }

    /// 系统推送（原生壳才有）
    pub fn supports_push(&self) -> bool {
        self.is_native()
    }

    /// 生物识别解锁
    pub fn supports_biometrics(&self) -> bool {
        self.is_native()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PlatformCapabilities::Web => "web",
            PlatformCapabilities::IosNative => "ios",
            PlatformCapabilities::AndroidNative => "android",
        }
    }
}

impl fmt::Display for PlatformCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlatformCapabilities {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "web" => Ok(PlatformCapabilities::Web),
            "ios" | "ios_native" => Ok(PlatformCapabilities::IosNative),
            "android" | "android_native" => Ok(PlatformCapabilities::AndroidNative),
            other => bail!("未知的平台: {}", other),
        }
    }
}
